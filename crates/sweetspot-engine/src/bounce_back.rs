// Bounce-back detection: a contrarian over on players running cold.
//
// All four gates must hold. The pick is always on the over side since the
// thesis is a return up to the season baseline.

use sweetspot_core::candidate::WindowStats;
use sweetspot_core::model::Direction;

use crate::hit_rate::hit_rate;
use crate::settings::BounceBackSettings;

const STDEV_EPSILON: f64 = 1e-9;

/// A reversion signal that cleared every gate.
#[derive(Debug, Clone, PartialEq)]
pub struct BounceBack {
    pub direction: Direction,
    pub gap: f64,
    pub zscore: f64,
    /// Window hit rate at the live line on the reversion side.
    pub hit_rate: f64,
    pub confidence: f64,
}

/// The first gate that failed.
#[derive(Debug, Clone, PartialEq)]
pub enum BounceBackMiss {
    NoSeasonBaseline,
    GapTooSmall { gap: f64 },
    ZScoreTooSmall { zscore: f64 },
    LineTooFarFromSeason { distance: f64 },
    NotDue { hit_rate: f64 },
    SeasonBelowLine { season_avg: f64 },
}

impl std::fmt::Display for BounceBackMiss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BounceBackMiss::NoSeasonBaseline => write!(f, "no season baseline"),
            BounceBackMiss::GapTooSmall { gap } => write!(f, "season gap {gap:.2} too small"),
            BounceBackMiss::ZScoreTooSmall { zscore } => write!(f, "z-score {zscore:.2} too small"),
            BounceBackMiss::LineTooFarFromSeason { distance } => {
                write!(f, "line {distance:.2} away from season average")
            }
            BounceBackMiss::NotDue { hit_rate } => {
                write!(f, "recent hit rate {hit_rate:.2} outside due band")
            }
            BounceBackMiss::SeasonBelowLine { season_avg } => {
                write!(f, "season average {season_avg:.2} too far below line")
            }
        }
    }
}

pub fn detect(
    window: &WindowStats,
    season_avg: Option<f64>,
    live_line: f64,
    settings: &BounceBackSettings,
    ceiling: f64,
) -> Result<BounceBack, BounceBackMiss> {
    let season_avg = season_avg.ok_or(BounceBackMiss::NoSeasonBaseline)?;

    let gap = season_avg - window.mean;
    if gap < settings.min_gap {
        return Err(BounceBackMiss::GapTooSmall { gap });
    }

    let zscore = if window.stddev < STDEV_EPSILON {
        0.0
    } else {
        gap / window.stddev
    };
    if zscore < settings.min_zscore {
        return Err(BounceBackMiss::ZScoreTooSmall { zscore });
    }

    let distance = (live_line - season_avg).abs();
    if distance > settings.max_line_gap {
        return Err(BounceBackMiss::LineTooFarFromSeason { distance });
    }

    let direction = Direction::Over;
    let rate = hit_rate(&window.values, direction, live_line);
    if rate < settings.due_band_low || rate > settings.due_band_high {
        return Err(BounceBackMiss::NotDue { hit_rate: rate });
    }
    if season_avg < live_line * settings.season_to_line_ratio {
        return Err(BounceBackMiss::SeasonBelowLine { season_avg });
    }

    let confidence = (0.5 + 0.15 * zscore + 0.5 * (season_avg - live_line) / live_line)
        .clamp(0.0, ceiling);
    Ok(BounceBack {
        direction,
        gap,
        zscore,
        hit_rate: rate,
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::window_stats;

    // Mean 14, population stddev 2, three of ten games over 16.
    const COLD: [f64; 10] = [17.0, 17.0, 17.0, 12.0, 12.0, 13.0, 13.0, 13.0, 13.0, 13.0];

    fn cold_window() -> WindowStats {
        window_stats(COLD.to_vec()).unwrap()
    }

    #[test]
    fn cold_window_fixture_is_what_it_claims() {
        let w = cold_window();
        assert!((w.mean - 14.0).abs() < 1e-9);
        assert!((w.stddev - 2.0).abs() < 1e-9);
    }

    #[test]
    fn emits_over_with_expected_confidence() {
        let bb = detect(&cold_window(), Some(18.0), 16.0, &BounceBackSettings::default(), 0.90)
            .unwrap();
        assert_eq!(bb.direction, Direction::Over);
        assert!((bb.zscore - 2.0).abs() < 1e-9);
        assert!((bb.hit_rate - 0.3).abs() < 1e-9);
        // 0.5 + 0.15 * 2 + 0.5 * 2 / 16
        assert!((bb.confidence - 0.8625).abs() < 1e-9);
    }

    #[test]
    fn confidence_clamped_to_ceiling() {
        let w = window_stats(vec![17.0, 17.0, 17.0, 11.0, 11.0, 12.0, 12.0, 12.0, 12.0, 12.0]).unwrap();
        // Gap 4.7, stddev ~2.45: z ~1.92, confidence ~0.83 before the cap.
        let bb = detect(&w, Some(18.0), 16.5, &BounceBackSettings::default(), 0.80).unwrap();
        assert_eq!(bb.confidence, 0.80);
    }

    #[test]
    fn gap_gate() {
        let miss = detect(&cold_window(), Some(15.0), 16.0, &BounceBackSettings::default(), 0.9)
            .unwrap_err();
        assert!(matches!(miss, BounceBackMiss::GapTooSmall { .. }));
    }

    #[test]
    fn zscore_gate() {
        let settings = BounceBackSettings {
            min_zscore: 2.5,
            ..BounceBackSettings::default()
        };
        let miss = detect(&cold_window(), Some(18.0), 16.0, &settings, 0.9).unwrap_err();
        assert!(matches!(miss, BounceBackMiss::ZScoreTooSmall { .. }));

        // A flat window has no measurable spread.
        let flat = window_stats(vec![14.0; 10]).unwrap();
        let miss = detect(&flat, Some(18.0), 16.0, &BounceBackSettings::default(), 0.9)
            .unwrap_err();
        assert!(matches!(miss, BounceBackMiss::ZScoreTooSmall { .. }));
    }

    #[test]
    fn line_distance_gate() {
        let miss = detect(&cold_window(), Some(18.0), 20.5, &BounceBackSettings::default(), 0.9)
            .unwrap_err();
        assert!(matches!(miss, BounceBackMiss::LineTooFarFromSeason { .. }));
    }

    #[test]
    fn due_band_gate() {
        // Over 16.5: still three hits. Over 17: none, below the band.
        let miss = detect(&cold_window(), Some(18.0), 17.0, &BounceBackSettings::default(), 0.9)
            .unwrap_err();
        assert!(matches!(miss, BounceBackMiss::NotDue { hit_rate } if hit_rate == 0.0));
    }

    #[test]
    fn season_to_line_gate() {
        let settings = BounceBackSettings {
            season_to_line_ratio: 1.2,
            ..BounceBackSettings::default()
        };
        let miss = detect(&cold_window(), Some(18.0), 16.0, &settings, 0.9).unwrap_err();
        assert!(matches!(miss, BounceBackMiss::SeasonBelowLine { .. }));
    }

    #[test]
    fn missing_season_baseline() {
        assert_eq!(
            detect(&cold_window(), None, 16.0, &BounceBackSettings::default(), 0.9),
            Err(BounceBackMiss::NoSeasonBaseline)
        );
    }
}
