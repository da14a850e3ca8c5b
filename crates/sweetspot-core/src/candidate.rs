// Sweet-spot candidates and their lifecycle.
//
// A candidate moves through exactly one path:
//
//   Pending -> {RangeEligible | LinePending} -> Validated -> {Active | Inactive}
//
// with a short-circuit to Inactive from either eligibility state when no live
// line exists. `Candidate::apply` is the only place state changes.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Direction, Metric, RoleTag};

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// How a candidate qualified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EligibilityPath {
    /// Window average inside the category's eligible range.
    Range,
    /// Outside the average range; waiting for an actual line.
    LinePending,
    /// Rescued from `LinePending` by the reversion thesis.
    BounceBack,
    /// Rescued from `LinePending` because the live line sits in range.
    LineEligible,
}

impl EligibilityPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            EligibilityPath::Range => "RANGE",
            EligibilityPath::LinePending => "LINE_PENDING",
            EligibilityPath::BounceBack => "BOUNCE_BACK",
            EligibilityPath::LineEligible => "LINE_ELIGIBLE",
        }
    }
}

/// Risk annotation attached during live-line reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
    Extreme,
}

impl RiskTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Low => "LOW",
            RiskTier::Medium => "MEDIUM",
            RiskTier::High => "HIGH",
            RiskTier::Extreme => "EXTREME",
        }
    }
}

/// Derived statistics over a rolling window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    /// Window values, most recent game first.
    pub values: Vec<f64>,
    pub sample_size: usize,
    pub median: f64,
    pub mean: f64,
    /// Population standard deviation.
    pub stddev: f64,
    pub min: f64,
    pub max: f64,
}

/// Where a projection's signal came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectionSource {
    /// Rolling median only.
    Median,
    /// Matchup history with a small number of prior meetings.
    Matchup,
    /// Matchup history deep enough to trust.
    MatchupStrong,
}

/// Blended point estimate with its per-signal breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub base: f64,
    pub matchup_adjustment: f64,
    pub pace_adjustment: f64,
    /// `base + adjustments`, rounded to the nearest half.
    pub value: f64,
    pub source: ProjectionSource,
    pub opponent: Option<String>,
    /// `value - live line` (sign follows the metric, not the pick direction).
    pub edge: Option<f64>,
}

/// The market line a candidate was reconciled against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineSnapshot {
    pub line: f64,
    pub over_price: Option<i32>,
    pub under_price: Option<i32>,
    pub book: String,
    pub opponent: Option<String>,
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CandidateState {
    Pending,
    RangeEligible,
    LinePending,
    Validated,
    Active,
    Inactive,
}

impl fmt::Display for CandidateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CandidateState::Pending => "PENDING",
            CandidateState::RangeEligible => "RANGE_ELIGIBLE",
            CandidateState::LinePending => "LINE_PENDING",
            CandidateState::Validated => "VALIDATED",
            CandidateState::Active => "ACTIVE",
            CandidateState::Inactive => "INACTIVE",
        };
        f.write_str(label)
    }
}

/// Events that drive a candidate through its lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Average in range and a threshold qualified.
    Qualify,
    /// Out of average range; defer until a line is known.
    Defer,
    /// A live line was found and the hit rate recomputed.
    Validate,
    Activate,
    Deactivate(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid candidate transition {event:?} from state {from}")]
pub struct TransitionError {
    pub from: CandidateState,
    pub event: Transition,
}

impl CandidateState {
    /// The single authoritative transition table.
    pub fn next(self, event: &Transition) -> Result<CandidateState, TransitionError> {
        use CandidateState::*;
        let next = match (self, event) {
            (Pending, Transition::Qualify) => RangeEligible,
            (Pending, Transition::Defer) => LinePending,
            (RangeEligible | LinePending, Transition::Validate) => Validated,
            (Validated, Transition::Activate) => Active,
            (RangeEligible | LinePending | Validated, Transition::Deactivate(_)) => Inactive,
            _ => {
                return Err(TransitionError {
                    from: self,
                    event: event.clone(),
                })
            }
        };
        Ok(next)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CandidateState::Active | CandidateState::Inactive)
    }
}

// ---------------------------------------------------------------------------
// Candidate
// ---------------------------------------------------------------------------

/// One player/metric/category recommendation produced by a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub analysis_date: NaiveDate,
    pub player_id: String,
    pub player_name: String,
    pub team: String,
    pub metric: Metric,
    pub category: String,
    pub direction: Direction,
    /// Threshold chosen at selection time (or the live line once a
    /// line-pending candidate is rescued).
    pub threshold: Option<f64>,
    /// Window hit rate at `threshold`.
    pub hit_rate: f64,
    pub window: WindowStats,
    pub season_avg: Option<f64>,
    pub confidence: f64,
    pub eligibility: EligibilityPath,
    pub role: RoleTag,
    /// Set when the role check passed only because the role is unknown.
    pub role_caution: Option<String>,
    pub projection: Option<Projection>,
    pub live_line: Option<LineSnapshot>,
    /// Window hit rate recomputed at the live line.
    pub live_hit_rate: Option<f64>,
    /// The hit rate the acceptance policy actually gated on.
    pub gate_hit_rate: Option<f64>,
    /// The minimum that gate required.
    pub required_hit_rate: Option<f64>,
    pub risk: Option<RiskTier>,
    pub state: CandidateState,
    pub inactive_reason: Option<String>,
}

impl Candidate {
    pub fn is_active(&self) -> bool {
        self.state == CandidateState::Active
    }

    /// Apply a lifecycle event, recording the reason on deactivation.
    pub fn apply(&mut self, event: Transition) -> Result<(), TransitionError> {
        let next = self.state.next(&event)?;
        if let Transition::Deactivate(reason) = event {
            self.inactive_reason = Some(reason);
        }
        self.state = next;
        Ok(())
    }

    /// Key used to collapse candidates during finalization.
    pub fn group_key(&self) -> (String, Metric) {
        (self.player_id.clone(), self.metric)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
