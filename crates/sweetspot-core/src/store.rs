// Seams between the screening engine and whatever store backs it.
//
// Reads are query-style and idempotent; writes replace one analysis date's
// candidate set in bounded batches.

use anyhow::Result;
use chrono::NaiveDate;

use crate::candidate::Candidate;
use crate::model::{GameEnvironment, LiveLine, MatchupHistory, PerformanceRecord, RoleAssignment};

/// Read-only access to the upstream feeds.
pub trait StatSource {
    /// Performance records with `from <= game_date <= to`.
    fn performance_records(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<PerformanceRecord>>;

    fn role_assignments(&self) -> Result<Vec<RoleAssignment>>;

    fn matchup_history(&self) -> Result<Vec<MatchupHistory>>;

    fn game_environments(&self, game_date: NaiveDate) -> Result<Vec<GameEnvironment>>;

    fn live_lines(&self) -> Result<Vec<LiveLine>>;
}

/// Destination for finalized candidates.
pub trait CandidateSink {
    /// Remove every candidate stored for `analysis_date`. Returns the number
    /// of rows removed.
    fn clear_candidates(&self, analysis_date: NaiveDate) -> Result<usize>;

    /// Write one batch. A batch either commits entirely or not at all.
    fn write_batch(&self, batch: &[Candidate]) -> Result<()>;
}
