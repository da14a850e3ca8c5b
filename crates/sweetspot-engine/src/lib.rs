// Sweet-spot screening engine: windows, eligibility, projection,
// live-line reconciliation, bounce-back detection and finalization.

pub mod archetype;
pub mod bounce_back;
pub mod categories;
pub mod context;
pub mod error;
pub mod finalize;
pub mod hit_rate;
pub mod opponent;
pub mod pipeline;
pub mod projection;
pub mod reconcile;
pub mod settings;
pub mod stats;

pub use categories::{CategoryRuleSet, RuleSetError};
pub use pipeline::{Pipeline, RunReport, RunRequest};
pub use settings::EngineSettings;
