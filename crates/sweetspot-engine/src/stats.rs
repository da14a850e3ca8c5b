// Stat aggregation: rolling windows and season baselines per player/metric.
//
// Pure transformation over performance records already loaded for the run.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use sweetspot_core::candidate::WindowStats;
use sweetspot_core::model::{Metric, PerformanceRecord};
use tracing::debug;

use crate::settings::WindowSettings;

// ---------------------------------------------------------------------------
// Descriptive statistics
// ---------------------------------------------------------------------------

/// Median of `values`: the middle value for odd counts, the mean of the two
/// middle values for even counts. Empty input yields 0.0.
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation (divides by n, not n - 1).
pub fn population_stddev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Summarize a window given most-recent-first. `None` for an empty window.
pub fn window_stats(values: Vec<f64>) -> Option<WindowStats> {
    if values.is_empty() {
        return None;
    }
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some(WindowStats {
        sample_size: values.len(),
        median: median(&values),
        mean: mean(&values),
        stddev: population_stddev(&values),
        min,
        max,
        values,
    })
}

// ---------------------------------------------------------------------------
// Per-player aggregation
// ---------------------------------------------------------------------------

/// Everything the evaluator needs to know about one player's recent form.
#[derive(Debug, Clone)]
pub struct PlayerWindow {
    pub player_id: String,
    pub player_name: String,
    /// Team from the most recent game.
    pub team: String,
    pub windows: BTreeMap<Metric, WindowStats>,
    /// Season-to-date average per metric.
    pub season_avg: BTreeMap<Metric, f64>,
}

impl PlayerWindow {
    pub fn window(&self, metric: Metric) -> Option<&WindowStats> {
        self.windows.get(&metric)
    }

    pub fn season_avg(&self, metric: Metric) -> Option<f64> {
        self.season_avg.get(&metric).copied()
    }
}

/// Outcome of aggregating one run's records.
#[derive(Debug, Default)]
pub struct Aggregation {
    pub players: Vec<PlayerWindow>,
    /// Players with some recent games but fewer than the minimum window.
    pub insufficient: usize,
}

/// Build rolling windows as of `analysis_date` (games strictly before it).
///
/// The window holds the most recent `target_size` qualifying games within
/// `lookback_days`; players with fewer than `min_size` are skipped. Games
/// under `min_minutes` count as did-not-play and are ignored everywhere.
pub fn aggregate(
    records: &[PerformanceRecord],
    analysis_date: NaiveDate,
    settings: &WindowSettings,
) -> Aggregation {
    let window_start = analysis_date - Duration::days(i64::from(settings.lookback_days));
    let season_start = analysis_date - Duration::days(i64::from(settings.season_lookback_days));

    let mut by_player: BTreeMap<&str, Vec<&PerformanceRecord>> = BTreeMap::new();
    for record in records {
        if record.game_date >= analysis_date || record.game_date < season_start {
            continue;
        }
        if record.minutes < settings.min_minutes {
            continue;
        }
        by_player.entry(record.player_id.as_str()).or_default().push(record);
    }

    let mut out = Aggregation::default();
    for (player_id, mut games) in by_player {
        games.sort_by(|a, b| b.game_date.cmp(&a.game_date));

        let recent: Vec<&PerformanceRecord> = games
            .iter()
            .copied()
            .filter(|g| g.game_date >= window_start)
            .take(settings.target_size)
            .collect();
        if recent.len() < settings.min_size {
            if !recent.is_empty() {
                out.insufficient += 1;
            }
            debug!(
                player_id,
                games = recent.len(),
                required = settings.min_size,
                "skipping player with short window"
            );
            continue;
        }

        let latest = recent[0];
        let mut windows = BTreeMap::new();
        let mut season_avg = BTreeMap::new();
        for metric in Metric::ALL {
            let values: Vec<f64> = recent.iter().map(|g| g.value(metric)).collect();
            if let Some(stats) = window_stats(values) {
                windows.insert(metric, stats);
            }
            let season: Vec<f64> = games.iter().map(|g| g.value(metric)).collect();
            season_avg.insert(metric, mean(&season));
        }

        out.players.push(PlayerWindow {
            player_id: player_id.to_string(),
            player_name: latest.player_name.clone(),
            team: latest.team.clone(),
            windows,
            season_avg,
        });
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
