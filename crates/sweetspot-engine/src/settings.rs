// Tunable engine parameters.
//
// Every field has a default so a config file only needs to name the values
// it overrides. Validation lives with the config loader.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    pub window: WindowSettings,
    pub projection: ProjectionSettings,
    pub confidence: ConfidenceSettings,
    pub reconcile: ReconcileSettings,
    pub bounce_back: BounceBackSettings,
    pub persist: PersistSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    /// Trailing days of box scores used for the rolling window.
    pub lookback_days: u32,
    /// Trailing days used for the season baseline.
    pub season_lookback_days: u32,
    pub target_size: usize,
    pub min_size: usize,
    /// Games under this many minutes are treated as did-not-play.
    pub min_minutes: f64,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            lookback_days: 30,
            season_lookback_days: 180,
            target_size: 10,
            min_size: 5,
            min_minutes: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectionSettings {
    pub matchup_weight: f64,
    pub pace_weight: f64,
    /// Prior meetings needed before matchup history is used at all.
    pub min_matchup_games: u32,
    /// Prior meetings at which the matchup signal is tagged strong.
    pub strong_matchup_games: u32,
}

impl Default for ProjectionSettings {
    fn default() -> Self {
        Self {
            matchup_weight: 0.30,
            pace_weight: 0.15,
            min_matchup_games: 2,
            strong_matchup_games: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceSettings {
    pub hit_rate_weight: f64,
    pub consistency_weight: f64,
    /// Hard cap applied to every confidence score.
    pub ceiling: f64,
    /// Multiplicative discount per game a window falls short of the target
    /// size. Zero disables the discount.
    pub partial_window_discount: f64,
}

impl Default for ConfidenceSettings {
    fn default() -> Self {
        Self {
            hit_rate_weight: 0.6,
            consistency_weight: 0.4,
            ceiling: 0.90,
            partial_window_discount: 0.02,
        }
    }
}

/// Risk bands for optimal categories: the recalculated hit rate only
/// annotates, it never gates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimalRiskBands {
    /// Recalculated hit rate at or above this is `LOW`.
    pub low_at: f64,
    /// At or above this (and below `low_at`) is `MEDIUM`; anything lower is
    /// `HIGH`.
    pub medium_at: f64,
}

impl Default for OptimalRiskBands {
    fn default() -> Self {
        Self {
            low_at: 0.60,
            medium_at: 0.45,
        }
    }
}

/// Escalation bands for legacy big-stat categories that failed the live
/// gate but stay active in their original direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyRiskBands {
    pub medium_at: f64,
    pub high_at: f64,
    /// Below this even a big-stat pick is deactivated; between this and
    /// `high_at` it is `EXTREME`.
    pub extreme_floor: f64,
}

impl Default for LegacyRiskBands {
    fn default() -> Self {
        Self {
            medium_at: 0.45,
            high_at: 0.30,
            extreme_floor: 0.20,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileSettings {
    pub optimal: OptimalRiskBands,
    pub legacy: LegacyRiskBands,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BounceBackSettings {
    pub min_gap: f64,
    pub min_zscore: f64,
    pub max_line_gap: f64,
    pub due_band_low: f64,
    pub due_band_high: f64,
    /// Season average must be at least this fraction of the live line.
    pub season_to_line_ratio: f64,
}

impl Default for BounceBackSettings {
    fn default() -> Self {
        Self {
            min_gap: 1.5,
            min_zscore: 0.5,
            max_line_gap: 2.0,
            due_band_low: 0.20,
            due_band_high: 0.50,
            season_to_line_ratio: 0.95,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistSettings {
    pub batch_size: usize,
}

impl Default for PersistSettings {
    fn default() -> Self {
        Self { batch_size: 50 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let text = r#"
[bounce_back]
min_gap = 2.5

[persist]
batch_size = 10
"#;
        let settings: EngineSettings = toml::from_str(text).unwrap();
        assert!((settings.bounce_back.min_gap - 2.5).abs() < f64::EPSILON);
        assert!((settings.bounce_back.min_zscore - 0.5).abs() < f64::EPSILON);
        assert_eq!(settings.persist.batch_size, 10);
        assert_eq!(settings.window, WindowSettings::default());
    }

    #[test]
    fn empty_toml_is_all_defaults() {
        let settings: EngineSettings = toml::from_str("").unwrap();
        assert_eq!(settings, EngineSettings::default());
    }
}
