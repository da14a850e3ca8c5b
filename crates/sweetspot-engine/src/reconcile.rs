// Live-line reconciliation.
//
// Every evaluated candidate passes through here exactly once and leaves in a
// terminal state. Range candidates are gated by their category's acceptance
// policy; line-pending candidates are either rescued onto the live line,
// handed to the bounce-back detector, or deactivated.

use sweetspot_core::candidate::{
    Candidate, CandidateState, EligibilityPath, LineSnapshot, RiskTier, Transition,
    TransitionError,
};
use tracing::debug;

use crate::bounce_back;
use crate::categories::{AcceptancePolicy, Category};
use crate::context::ResolvedLine;
use crate::error::PipelineError;
use crate::hit_rate::{confidence, hit_rate};
use crate::settings::EngineSettings;

pub const NO_LINE_REASON: &str = "no upcoming game/line";

/// How a candidate left reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Active,
    LineEligible,
    BounceBack,
    NoUpcomingGame,
    Rejected,
}

/// Result of a policy gate: the rate gated on, the minimum it needed and,
/// when the candidate survives, its risk tier.
struct Gate {
    gate_rate: f64,
    required: f64,
    risk: Option<RiskTier>,
    reason: String,
}

pub struct Reconciler<'a> {
    pub settings: &'a EngineSettings,
}

impl Reconciler<'_> {
    pub fn reconcile(
        &self,
        candidate: &mut Candidate,
        category: &Category,
        line: Option<&ResolvedLine>,
    ) -> Result<Outcome, PipelineError> {
        let Some(resolved) = line else {
            candidate.apply(Transition::Deactivate(NO_LINE_REASON.to_string()))?;
            debug!(player = %candidate.player_id, category = %category.name, "no live line");
            return Ok(Outcome::NoUpcomingGame);
        };

        let offered = resolved.line.line;
        candidate.live_line = Some(LineSnapshot {
            line: offered,
            over_price: resolved.line.over_price,
            under_price: resolved.line.under_price,
            book: resolved.line.book.clone(),
            opponent: resolved.opponent.clone(),
        });
        let live_rate = hit_rate(&candidate.window.values, candidate.direction, offered);
        candidate.live_hit_rate = Some(live_rate);

        match candidate.state {
            CandidateState::RangeEligible => self.reconcile_range(candidate, category, offered, live_rate),
            CandidateState::LinePending => self.reconcile_pending(candidate, category, offered, live_rate),
            other => Err(TransitionError {
                from: other,
                event: Transition::Validate,
            }
            .into()),
        }
    }

    fn reconcile_range(
        &self,
        candidate: &mut Candidate,
        category: &Category,
        offered: f64,
        live_rate: f64,
    ) -> Result<Outcome, PipelineError> {
        candidate.apply(Transition::Validate)?;
        let gate = self.gate(category, offered, candidate.hit_rate, live_rate);
        candidate.gate_hit_rate = Some(gate.gate_rate);
        candidate.required_hit_rate = Some(gate.required);

        match gate.risk {
            Some(risk) => {
                candidate.risk = Some(risk);
                candidate.apply(Transition::Activate)?;
                debug!(
                    player = %candidate.player_id,
                    category = %category.name,
                    line = offered,
                    live_rate,
                    risk = risk.as_str(),
                    "candidate activated"
                );
                Ok(Outcome::Active)
            }
            None => {
                candidate.apply(Transition::Deactivate(gate.reason))?;
                Ok(Outcome::Rejected)
            }
        }
    }

    fn reconcile_pending(
        &self,
        candidate: &mut Candidate,
        category: &Category,
        offered: f64,
        live_rate: f64,
    ) -> Result<Outcome, PipelineError> {
        candidate.apply(Transition::Validate)?;

        // A rescued line becomes the chosen threshold, so it must also clear
        // the category minimum even where a tier floor sits lower.
        let required = category.floor_for_line(offered).max(category.min_hit_rate);
        let mut reason = if !category.line_in_range(offered) {
            format!("line {offered} outside eligibility range")
        } else if live_rate < required {
            format!("live hit rate {live_rate:.2} below {required:.2} at line {offered}")
        } else {
            match confidence(
                live_rate,
                &candidate.window,
                self.settings.window.target_size,
                &self.settings.confidence,
            ) {
                Some(score) => {
                    candidate.threshold = Some(offered);
                    candidate.hit_rate = live_rate;
                    candidate.confidence = score;
                    candidate.eligibility = EligibilityPath::LineEligible;
                    candidate.gate_hit_rate = Some(live_rate);
                    candidate.required_hit_rate = Some(required);
                    candidate.risk = Some(RiskTier::Low);
                    candidate.apply(Transition::Activate)?;
                    return Ok(Outcome::LineEligible);
                }
                None => format!("window mean {} is not positive", candidate.window.mean),
            }
        };

        if category.supports_reversion {
            match bounce_back::detect(
                &candidate.window,
                candidate.season_avg,
                offered,
                &self.settings.bounce_back,
                self.settings.confidence.ceiling,
            ) {
                Ok(signal) => {
                    candidate.direction = signal.direction;
                    candidate.threshold = Some(offered);
                    candidate.hit_rate = signal.hit_rate;
                    candidate.live_hit_rate = Some(signal.hit_rate);
                    candidate.confidence = signal.confidence;
                    candidate.eligibility = EligibilityPath::BounceBack;
                    candidate.gate_hit_rate = Some(signal.hit_rate);
                    candidate.required_hit_rate = Some(self.settings.bounce_back.due_band_low);
                    candidate.risk = Some(RiskTier::Medium);
                    candidate.apply(Transition::Activate)?;
                    debug!(
                        player = %candidate.player_id,
                        category = %category.name,
                        zscore = signal.zscore,
                        "bounce-back emitted"
                    );
                    return Ok(Outcome::BounceBack);
                }
                Err(miss) => {
                    reason = format!("{reason}; no bounce-back: {miss}");
                }
            }
        }

        candidate.apply(Transition::Deactivate(reason))?;
        Ok(Outcome::Rejected)
    }

    fn gate(&self, category: &Category, offered: f64, original_rate: f64, live_rate: f64) -> Gate {
        let bands = &self.settings.reconcile;
        match &category.policy {
            AcceptancePolicy::Tiered { .. } => {
                let required = category.floor_for_line(offered);
                if live_rate >= required {
                    Gate {
                        gate_rate: live_rate,
                        required,
                        risk: Some(RiskTier::Low),
                        reason: String::new(),
                    }
                } else {
                    Gate {
                        gate_rate: live_rate,
                        required,
                        risk: None,
                        reason: format!(
                            "live hit rate {live_rate:.2} below tier floor {required:.2} at line {offered}"
                        ),
                    }
                }
            }
            AcceptancePolicy::Optimal => {
                let required = category.min_hit_rate;
                if original_rate < required {
                    return Gate {
                        gate_rate: original_rate,
                        required,
                        risk: None,
                        reason: format!("window hit rate {original_rate:.2} below {required:.2}"),
                    };
                }
                let risk = if live_rate >= bands.optimal.low_at {
                    RiskTier::Low
                } else if live_rate >= bands.optimal.medium_at {
                    RiskTier::Medium
                } else {
                    RiskTier::High
                };
                Gate {
                    gate_rate: original_rate,
                    required,
                    risk: Some(risk),
                    reason: String::new(),
                }
            }
            AcceptancePolicy::Legacy { big_stat } => {
                let required = category.min_hit_rate;
                if live_rate >= required {
                    return Gate {
                        gate_rate: live_rate,
                        required,
                        risk: Some(RiskTier::Low),
                        reason: String::new(),
                    };
                }
                let legacy = &bands.legacy;
                if *big_stat && live_rate >= legacy.extreme_floor {
                    let risk = if live_rate >= legacy.medium_at {
                        RiskTier::Medium
                    } else if live_rate >= legacy.high_at {
                        RiskTier::High
                    } else {
                        RiskTier::Extreme
                    };
                    // Escalated picks are held to the extreme floor.
                    return Gate {
                        gate_rate: live_rate,
                        required: legacy.extreme_floor,
                        risk: Some(risk),
                        reason: String::new(),
                    };
                }
                Gate {
                    gate_rate: live_rate,
                    required,
                    risk: None,
                    reason: format!("live hit rate {live_rate:.2} below {required:.2} at line {offered}"),
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
