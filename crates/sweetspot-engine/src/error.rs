// Error taxonomy for a screening run.
//
// None of these abort a run on their own: the pipeline logs them, counts
// them in the report and moves on to the next player.

use sweetspot_core::candidate::TransitionError;
use sweetspot_core::model::Metric;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// An upstream read failed. The affected feed is treated as empty.
    #[error("failed to fetch {feed}: {message}")]
    DataFetch { feed: &'static str, message: String },

    #[error("player {player_id} has {found} usable {metric} games, need {required}")]
    InsufficientSample {
        player_id: String,
        metric: Metric,
        found: usize,
        required: usize,
    },

    #[error("no upcoming game/line for player {player_id} ({metric})")]
    NoUpcomingGame { player_id: String, metric: Metric },

    /// The window cannot support a confidence score (non-positive mean).
    #[error("inconsistent window for player {player_id} ({metric}): {message}")]
    ValidationInconsistency {
        player_id: String,
        metric: Metric,
        message: String,
    },

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
}
