// Core types and storage for the sweet-spot screener: domain records, the
// candidate lifecycle, feed ingestion and the SQLite store.

pub mod candidate;
pub mod db;
pub mod ingest;
pub mod model;
pub mod store;
