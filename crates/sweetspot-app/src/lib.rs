// Library root for the sweetspot binary: configuration and the commands the
// CLI dispatches to.

pub mod config;
pub mod runner;
