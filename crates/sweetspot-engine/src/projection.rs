// True-value projection: rolling median nudged by matchup and pace.
//
// Each signal only applies when its supporting data exists. A projection
// never rejects a candidate; it annotates it.

use sweetspot_core::candidate::{Projection, ProjectionSource};
use sweetspot_core::model::{GameEnvironment, MatchupHistory};

use crate::settings::ProjectionSettings;

pub fn round_to_half(value: f64) -> f64 {
    (value * 2.0).round() / 2.0
}

/// Inputs for one projection. `matchup` and `environment` are the records
/// for the upcoming opponent, when known.
pub struct ProjectionInputs<'a> {
    pub base: f64,
    pub opponent: Option<&'a str>,
    pub matchup: Option<&'a MatchupHistory>,
    pub environment: Option<&'a GameEnvironment>,
    pub live_line: Option<f64>,
}

pub fn project(inputs: &ProjectionInputs<'_>, settings: &ProjectionSettings) -> Projection {
    let base = inputs.base;

    let (matchup_adjustment, source) = match inputs.matchup {
        Some(m) if m.games >= settings.min_matchup_games => {
            let source = if m.games >= settings.strong_matchup_games {
                ProjectionSource::MatchupStrong
            } else {
                ProjectionSource::Matchup
            };
            (settings.matchup_weight * (m.avg_value - base), source)
        }
        _ => (0.0, ProjectionSource::Median),
    };

    let pace_adjustment = inputs
        .environment
        .and_then(|e| e.pace_rating)
        .filter(|p| *p > 0.0)
        .map(|pace| settings.pace_weight * (pace / 100.0 - 1.0) * base)
        .unwrap_or(0.0);

    let value = round_to_half(base + matchup_adjustment + pace_adjustment);
    Projection {
        base,
        matchup_adjustment,
        pace_adjustment,
        value,
        source,
        opponent: inputs.opponent.map(String::from),
        edge: inputs.live_line.map(|line| value - line),
    }
}
