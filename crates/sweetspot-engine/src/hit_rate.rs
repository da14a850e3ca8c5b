// Hit-rate evaluation and threshold selection.
//
// Turns one player's window plus one category into either a range-eligible
// candidate, a line-pending candidate, or a reason it was dropped.

use chrono::NaiveDate;
use sweetspot_core::candidate::{
    Candidate, CandidateState, EligibilityPath, Transition, WindowStats,
};
use sweetspot_core::model::Direction;
use tracing::debug;

use crate::archetype::{ArchetypeClassifier, RoleCheck};
use crate::categories::Category;
use crate::error::PipelineError;
use crate::settings::ConfidenceSettings;
use crate::stats::PlayerWindow;

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Fraction of `values` clearing `threshold` in `direction`.
pub fn hit_rate(values: &[f64], direction: Direction, threshold: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let hits = values
        .iter()
        .filter(|v| direction.clears(**v, threshold))
        .count();
    hits as f64 / values.len() as f64
}

/// Best threshold meeting `min_hit_rate`: highest hit rate, ties going to the
/// harder line (highest for over, lowest for under).
pub fn select_threshold(
    values: &[f64],
    thresholds: &[f64],
    direction: Direction,
    min_hit_rate: f64,
) -> Option<(f64, f64)> {
    let mut best: Option<(f64, f64)> = None;
    for &threshold in thresholds {
        let rate = hit_rate(values, direction, threshold);
        if rate < min_hit_rate {
            continue;
        }
        let better = match best {
            None => true,
            Some((best_threshold, best_rate)) => {
                rate > best_rate
                    || (rate == best_rate
                        && match direction {
                            Direction::Over => threshold > best_threshold,
                            Direction::Under => threshold < best_threshold,
                        })
            }
        };
        if better {
            best = Some((threshold, rate));
        }
    }
    best
}

/// Confidence from hit rate and window consistency, discounted for short
/// windows and clamped to the ceiling. `None` when the window mean is not
/// positive.
pub fn confidence(
    hit_rate: f64,
    window: &WindowStats,
    target_size: usize,
    settings: &ConfidenceSettings,
) -> Option<f64> {
    if window.mean <= 0.0 {
        return None;
    }
    let consistency = (1.0 - window.stddev / window.mean).max(0.0);
    let raw = settings.hit_rate_weight * hit_rate + settings.consistency_weight * consistency;
    let missing = target_size.saturating_sub(window.sample_size) as f64;
    let discount = (1.0 - settings.partial_window_discount * missing).max(0.0);
    Some((raw * discount).clamp(0.0, settings.ceiling))
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum Evaluation {
    /// `RANGE_ELIGIBLE` or `LINE_PENDING`.
    Candidate(Box<Candidate>),
    /// In range, but no threshold met the minimum hit rate.
    BelowThreshold,
    /// Out of range with no line-eligibility fallback.
    OutOfRange,
    RoleBlocked(String),
    /// No window for the category's metric.
    NoWindow,
    Rejected(PipelineError),
}

/// Shared inputs for evaluating one player against many categories.
pub struct Evaluator<'a> {
    pub analysis_date: NaiveDate,
    pub classifier: &'a ArchetypeClassifier,
    pub confidence: &'a ConfidenceSettings,
    pub target_size: usize,
}

impl Evaluator<'_> {
    pub fn evaluate(&self, player: &PlayerWindow, category: &Category) -> Evaluation {
        let Some(window) = player.window(category.metric) else {
            return Evaluation::NoWindow;
        };

        let in_range = category.avg_in_range(window.mean);
        if !in_range && category.line_range.is_none() {
            return Evaluation::OutOfRange;
        }

        let role_check = self.classifier.validate(&player.player_id, category);
        let role_caution = match role_check {
            RoleCheck::Fail(reason) => {
                debug!(player = %player.player_id, category = %category.name, %reason, "role blocked");
                return Evaluation::RoleBlocked(reason);
            }
            RoleCheck::Caution(note) => Some(note),
            RoleCheck::Pass => None,
        };

        let mut candidate = Candidate {
            analysis_date: self.analysis_date,
            player_id: player.player_id.clone(),
            player_name: player.player_name.clone(),
            team: player.team.clone(),
            metric: category.metric,
            category: category.name.clone(),
            direction: category.direction,
            threshold: None,
            hit_rate: 0.0,
            window: window.clone(),
            season_avg: player.season_avg(category.metric),
            confidence: 0.0,
            eligibility: EligibilityPath::LinePending,
            role: self.classifier.role_of(&player.player_id),
            role_caution,
            projection: None,
            live_line: None,
            live_hit_rate: None,
            gate_hit_rate: None,
            required_hit_rate: None,
            risk: None,
            state: CandidateState::Pending,
            inactive_reason: None,
        };

        if !in_range {
            // Pending -> LinePending is always legal.
            if let Err(e) = candidate.apply(Transition::Defer) {
                return Evaluation::Rejected(e.into());
            }
            return Evaluation::Candidate(Box::new(candidate));
        }

        let Some((threshold, rate)) = select_threshold(
            &window.values,
            &category.thresholds,
            category.direction,
            category.min_hit_rate,
        ) else {
            return Evaluation::BelowThreshold;
        };

        let Some(score) = confidence(rate, window, self.target_size, self.confidence) else {
            return Evaluation::Rejected(PipelineError::ValidationInconsistency {
                player_id: player.player_id.clone(),
                metric: category.metric,
                message: format!("window mean {} is not positive", window.mean),
            });
        };

        candidate.threshold = Some(threshold);
        candidate.hit_rate = rate;
        candidate.confidence = score;
        candidate.eligibility = EligibilityPath::Range;
        if let Err(e) = candidate.apply(Transition::Qualify) {
            return Evaluation::Rejected(e.into());
        }
        Evaluation::Candidate(Box::new(candidate))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
