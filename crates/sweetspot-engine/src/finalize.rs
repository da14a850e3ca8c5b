// Deduplication, ranking and persistence of a run's candidates.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sweetspot_core::candidate::Candidate;
use sweetspot_core::model::Metric;
use sweetspot_core::store::CandidateSink;
use tracing::{error, info, warn};

/// Active first, then higher confidence.
fn rank_order(a: &Candidate, b: &Candidate) -> Ordering {
    b.is_active()
        .cmp(&a.is_active())
        .then_with(|| b.confidence.total_cmp(&a.confidence))
}

/// Collapse to one candidate per (player, metric), inactive ones included.
/// Among equals the earlier candidate wins.
pub fn dedupe(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut best: HashMap<(String, Metric), Candidate> = HashMap::new();
    for candidate in candidates {
        let key = candidate.group_key();
        let replace = best
            .get(&key)
            .map_or(true, |current| rank_order(&candidate, current) == Ordering::Less);
        if replace {
            best.insert(key, candidate);
        }
    }
    let mut out: Vec<Candidate> = best.into_values().collect();
    rank(&mut out);
    out
}

/// Sort for output. Ties break on player id then metric so output is stable.
pub fn rank(candidates: &mut [Candidate]) {
    candidates.sort_by(|a, b| {
        rank_order(a, b)
            .then_with(|| a.player_id.cmp(&b.player_id))
            .then_with(|| a.metric.cmp(&b.metric))
    });
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistSummary {
    pub cleared: usize,
    pub persisted: usize,
    pub failed_batches: usize,
}

/// Replace the stored set for `analysis_date` with `candidates`.
///
/// A failed batch is logged and counted; later batches still run. If the
/// date cannot be cleared nothing is written and every batch counts as
/// failed.
pub fn persist(
    sink: &dyn CandidateSink,
    analysis_date: NaiveDate,
    candidates: &[Candidate],
    batch_size: usize,
) -> PersistSummary {
    let batch_size = batch_size.max(1);
    let batches = candidates.len().div_ceil(batch_size);
    let mut summary = PersistSummary::default();

    match sink.clear_candidates(analysis_date) {
        Ok(n) => summary.cleared = n,
        Err(e) => {
            error!("failed to clear candidates for {analysis_date}: {e:#}");
            summary.failed_batches = batches;
            return summary;
        }
    }

    for (index, batch) in candidates.chunks(batch_size).enumerate() {
        match sink.write_batch(batch) {
            Ok(()) => summary.persisted += batch.len(),
            Err(e) => {
                warn!(batch = index, size = batch.len(), "candidate batch failed: {e:#}");
                summary.failed_batches += 1;
            }
        }
    }

    info!(
        %analysis_date,
        cleared = summary.cleared,
        persisted = summary.persisted,
        failed_batches = summary.failed_batches,
        "candidates persisted"
    );
    summary
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};
    use sweetspot_core::candidate::{CandidateState, EligibilityPath, WindowStats};
    use sweetspot_core::db::Database;
    use sweetspot_core::model::{Direction, RoleTag};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 20).unwrap()
    }

    fn candidate(player: &str, metric: Metric, category: &str, active: bool, confidence: f64) -> Candidate {
        Candidate {
            analysis_date: date(),
            player_id: player.into(),
            player_name: player.into(),
            team: "BOS".into(),
            metric,
            category: category.into(),
            direction: Direction::Over,
            threshold: Some(9.5),
            hit_rate: 0.6,
            window: WindowStats {
                values: vec![10.0; 5],
                sample_size: 5,
                median: 10.0,
                mean: 10.0,
                stddev: 0.0,
                min: 10.0,
                max: 10.0,
            },
            season_avg: None,
            confidence,
            eligibility: EligibilityPath::Range,
            role: RoleTag::Unknown,
            role_caution: None,
            projection: None,
            live_line: None,
            live_hit_rate: None,
            gate_hit_rate: None,
            required_hit_rate: None,
            risk: None,
            state: if active {
                CandidateState::Active
            } else {
                CandidateState::Inactive
            },
            inactive_reason: None,
        }
    }

    #[test]
    fn dedupe_prefers_active_then_confidence() {
        let out = dedupe(vec![
            candidate("a", Metric::Rebounds, "X", false, 0.85),
            candidate("a", Metric::Rebounds, "Y", true, 0.60),
            candidate("a", Metric::Rebounds, "Z", true, 0.70),
            candidate("a", Metric::Points, "X", false, 0.50),
            candidate("b", Metric::Rebounds, "X", true, 0.65),
        ]);
        assert_eq!(out.len(), 3);
        let a_reb = out
            .iter()
            .find(|c| c.player_id == "a" && c.metric == Metric::Rebounds)
            .unwrap();
        assert_eq!(a_reb.category, "Z");

        // Ranked: active by confidence, then inactive.
        let order: Vec<_> = out.iter().map(|c| (c.player_id.as_str(), c.metric)).collect();
        assert_eq!(
            order,
            vec![("a", Metric::Rebounds), ("b", Metric::Rebounds), ("a", Metric::Points)]
        );
    }

    #[test]
    fn dedupe_keeps_first_on_exact_tie() {
        let out = dedupe(vec![
            candidate("a", Metric::Assists, "FIRST", true, 0.7),
            candidate("a", Metric::Assists, "SECOND", true, 0.7),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].category, "FIRST");
    }

    #[test]
    fn persist_replaces_date_in_batches() {
        let db = Database::open(":memory:").unwrap();
        let old = vec![candidate("old", Metric::Points, "X", true, 0.5)];
        persist(&db, date(), &old, 10);

        let fresh: Vec<_> = (0..7)
            .map(|i| candidate(&format!("p{i}"), Metric::Rebounds, "X", i % 2 == 0, 0.5))
            .collect();
        let summary = persist(&db, date(), &fresh, 3);
        assert_eq!(summary.cleared, 1);
        assert_eq!(summary.persisted, 7);
        assert_eq!(summary.failed_batches, 0);

        let stored = db.load_candidates(date()).unwrap();
        assert_eq!(stored.len(), 7);
        assert!(stored.iter().all(|c| c.player_id != "old"));
    }

    /// Fails every second batch.
    struct FlakySink {
        calls: Mutex<usize>,
        written: Mutex<usize>,
    }

    impl CandidateSink for FlakySink {
        fn clear_candidates(&self, _: NaiveDate) -> Result<usize> {
            Ok(0)
        }

        fn write_batch(&self, batch: &[Candidate]) -> Result<()> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls % 2 == 0 {
                return Err(anyhow!("disk full"));
            }
            *self.written.lock().unwrap() += batch.len();
            Ok(())
        }
    }

    #[test]
    fn failed_batch_does_not_block_later_batches() {
        let sink = FlakySink {
            calls: Mutex::new(0),
            written: Mutex::new(0),
        };
        let rows: Vec<_> = (0..10)
            .map(|i| candidate(&format!("p{i}"), Metric::Points, "X", true, 0.5))
            .collect();
        let summary = persist(&sink, date(), &rows, 3);
        // Batches of 3, 3, 3, 1: the second and fourth fail.
        assert_eq!(summary.failed_batches, 2);
        assert_eq!(summary.persisted, 6);
        assert_eq!(*sink.calls.lock().unwrap(), 4);
        assert_eq!(*sink.written.lock().unwrap(), 6);
    }

    struct UnclearableSink;

    impl CandidateSink for UnclearableSink {
        fn clear_candidates(&self, _: NaiveDate) -> Result<usize> {
            Err(anyhow!("locked"))
        }

        fn write_batch(&self, _: &[Candidate]) -> Result<()> {
            panic!("must not write after a failed clear");
        }
    }

    #[test]
    fn failed_clear_writes_nothing() {
        let rows: Vec<_> = (0..5)
            .map(|i| candidate(&format!("p{i}"), Metric::Points, "X", true, 0.5))
            .collect();
        let summary = persist(&UnclearableSink, date(), &rows, 2);
        assert_eq!(summary.persisted, 0);
        assert_eq!(summary.failed_batches, 3);
    }
}
