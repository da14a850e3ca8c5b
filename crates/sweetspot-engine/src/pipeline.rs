// The screening run: aggregate, evaluate, project, reconcile, finalize.
//
// Each player is screened independently across the rayon pool against the
// shared, read-only run context. Everything that mutates the store happens
// after the fan-out, on the calling thread.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use sweetspot_core::candidate::{Candidate, EligibilityPath, RiskTier};
use sweetspot_core::model::{Direction, Metric, RoleTag};
use sweetspot_core::store::{CandidateSink, StatSource};
use tracing::{debug, info, warn};

use crate::categories::{CategoryRuleSet, RuleSetError};
use crate::context::RunContext;
use crate::error::PipelineError;
use crate::finalize::{dedupe, persist};
use crate::hit_rate::{Evaluation, Evaluator};
use crate::projection::{project, ProjectionInputs};
use crate::reconcile::{Outcome, Reconciler};
use crate::settings::EngineSettings;
use crate::stats::PlayerWindow;

// ---------------------------------------------------------------------------
// Request / report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    pub analysis_date: NaiveDate,
    /// Restrict the run to one category.
    pub category: Option<String>,
    /// Replace every category's minimum hit rate for this run.
    pub min_hit_rate: Option<f64>,
    /// Ignore a cached report for the same date.
    #[serde(default)]
    pub force_refresh: bool,
}

impl RunRequest {
    pub fn for_date(analysis_date: NaiveDate) -> Self {
        Self {
            analysis_date,
            category: None,
            min_hit_rate: None,
            force_refresh: false,
        }
    }

    /// Whether a report produced for `other` answers this request.
    pub fn same_filters(&self, other: &RunRequest) -> bool {
        self.analysis_date == other.analysis_date
            && self.category == other.category
            && self.min_hit_rate == other.min_hit_rate
    }
}

/// One active recommendation as it appears in the response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pick {
    pub player_id: String,
    pub player_name: String,
    pub team: String,
    pub metric: Metric,
    pub direction: Direction,
    pub threshold: Option<f64>,
    pub hit_rate: f64,
    pub confidence: f64,
    pub eligibility: EligibilityPath,
    pub role: RoleTag,
    pub role_caution: Option<String>,
    pub risk: Option<RiskTier>,
    pub live_line: Option<f64>,
    pub book: Option<String>,
    pub opponent: Option<String>,
    pub projected_value: Option<f64>,
    pub edge: Option<f64>,
}

impl From<&Candidate> for Pick {
    fn from(c: &Candidate) -> Self {
        Pick {
            player_id: c.player_id.clone(),
            player_name: c.player_name.clone(),
            team: c.team.clone(),
            metric: c.metric,
            direction: c.direction,
            threshold: c.threshold,
            hit_rate: c.hit_rate,
            confidence: c.confidence,
            eligibility: c.eligibility,
            role: c.role,
            role_caution: c.role_caution.clone(),
            risk: c.risk,
            live_line: c.live_line.as_ref().map(|l| l.line),
            book: c.live_line.as_ref().map(|l| l.book.clone()),
            opponent: c
                .live_line
                .as_ref()
                .and_then(|l| l.opponent.clone())
                .or_else(|| c.projection.as_ref().and_then(|p| p.opponent.clone())),
            projected_value: c.projection.as_ref().map(|p| p.value),
            edge: c.projection.as_ref().and_then(|p| p.edge),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Tally {
    dropped_below_threshold: usize,
    no_upcoming_game: usize,
    bounce_back: usize,
    line_eligible: usize,
    role_blocked: usize,
    rejected: usize,
    inconsistent: usize,
}

impl Tally {
    fn merge(&mut self, other: &Tally) {
        self.dropped_below_threshold += other.dropped_below_threshold;
        self.no_upcoming_game += other.no_upcoming_game;
        self.bounce_back += other.bounce_back;
        self.line_eligible += other.line_eligible;
        self.role_blocked += other.role_blocked;
        self.rejected += other.rejected;
        self.inconsistent += other.inconsistent;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub analysis_date: NaiveDate,
    pub request: RunRequest,
    pub rules_version: String,
    /// Players with a usable window.
    pub total_analyzed: usize,
    pub insufficient_sample: usize,
    pub dropped_below_threshold: usize,
    pub no_upcoming_game: usize,
    pub bounce_back: usize,
    pub line_eligible: usize,
    pub role_blocked: usize,
    /// Validated against a live line but failed the category policy.
    pub rejected_by_policy: usize,
    pub inconsistent: usize,
    pub fetch_errors: Vec<String>,
    pub candidates: usize,
    pub active: usize,
    pub persisted: usize,
    pub failed_batches: usize,
    /// Set when this report was served from the cache.
    #[serde(default)]
    pub cached: bool,
    pub picks: BTreeMap<String, Vec<Pick>>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

pub struct Pipeline<'a> {
    pub rules: &'a CategoryRuleSet,
    pub settings: &'a EngineSettings,
}

impl Pipeline<'_> {
    /// Run one screening pass and replace the stored candidates for the
    /// request's date. Only an invalid request fails the run.
    pub fn run(
        &self,
        source: &dyn StatSource,
        sink: &dyn CandidateSink,
        request: &RunRequest,
    ) -> Result<RunReport, RuleSetError> {
        let rules = self
            .rules
            .for_request(request.category.as_deref(), request.min_hit_rate)?;
        info!(
            date = %request.analysis_date,
            categories = rules.len(),
            version = %rules.version,
            "starting sweet-spot run"
        );

        let ctx = RunContext::load(source, request.analysis_date, &self.settings.window);
        let (candidates, tally) = self.screen(&ctx, &rules);

        let total_candidates = candidates.len();
        let finalized = dedupe(candidates);
        let summary = persist(
            sink,
            request.analysis_date,
            &finalized,
            self.settings.persist.batch_size,
        );

        let mut picks: BTreeMap<String, Vec<Pick>> = BTreeMap::new();
        for c in finalized.iter().filter(|c| c.is_active()) {
            picks.entry(c.category.clone()).or_default().push(Pick::from(c));
        }
        let active = picks.values().map(Vec::len).sum();

        let report = RunReport {
            analysis_date: request.analysis_date,
            request: request.clone(),
            rules_version: rules.version.clone(),
            total_analyzed: ctx.aggregation.players.len(),
            insufficient_sample: ctx.aggregation.insufficient,
            dropped_below_threshold: tally.dropped_below_threshold,
            no_upcoming_game: tally.no_upcoming_game,
            bounce_back: tally.bounce_back,
            line_eligible: tally.line_eligible,
            role_blocked: tally.role_blocked,
            rejected_by_policy: tally.rejected,
            inconsistent: tally.inconsistent,
            fetch_errors: ctx.fetch_errors.iter().map(ToString::to_string).collect(),
            candidates: total_candidates,
            active,
            persisted: summary.persisted,
            failed_batches: summary.failed_batches,
            cached: false,
            picks,
        };
        info!(
            analyzed = report.total_analyzed,
            candidates = report.candidates,
            active = report.active,
            bounce_back = report.bounce_back,
            line_eligible = report.line_eligible,
            failed_batches = report.failed_batches,
            "sweet-spot run complete"
        );
        Ok(report)
    }

    /// Fan out over players. Output order follows the aggregation order, so
    /// runs over the same inputs are reproducible.
    fn screen(&self, ctx: &RunContext, rules: &CategoryRuleSet) -> (Vec<Candidate>, Tally) {
        let results: Vec<(Vec<Candidate>, Tally)> = ctx
            .aggregation
            .players
            .par_iter()
            .map(|player| self.screen_player(ctx, rules, player))
            .collect();

        let mut all = Vec::new();
        let mut tally = Tally::default();
        for (candidates, t) in results {
            all.extend(candidates);
            tally.merge(&t);
        }
        (all, tally)
    }

    fn screen_player(
        &self,
        ctx: &RunContext,
        rules: &CategoryRuleSet,
        player: &PlayerWindow,
    ) -> (Vec<Candidate>, Tally) {
        let evaluator = Evaluator {
            analysis_date: ctx.analysis_date,
            classifier: &ctx.classifier,
            confidence: &self.settings.confidence,
            target_size: self.settings.window.target_size,
        };
        let reconciler = Reconciler {
            settings: self.settings,
        };

        let mut out = Vec::new();
        let mut tally = Tally::default();
        for category in rules.iter() {
            let mut candidate = match evaluator.evaluate(player, category) {
                Evaluation::Candidate(c) => *c,
                Evaluation::BelowThreshold => {
                    tally.dropped_below_threshold += 1;
                    continue;
                }
                Evaluation::RoleBlocked(_) => {
                    tally.role_blocked += 1;
                    continue;
                }
                Evaluation::OutOfRange => continue,
                Evaluation::NoWindow => {
                    debug!(
                        "{}",
                        PipelineError::InsufficientSample {
                            player_id: player.player_id.clone(),
                            metric: category.metric,
                            found: 0,
                            required: self.settings.window.min_size,
                        }
                    );
                    continue;
                }
                Evaluation::Rejected(e) => {
                    debug!("{e}");
                    tally.inconsistent += 1;
                    continue;
                }
            };

            let line = ctx.line_for(&player.player_id, category.metric);
            let opponent = line.and_then(|l| l.opponent.as_deref());
            candidate.projection = Some(project(
                &ProjectionInputs {
                    base: candidate.window.median,
                    opponent,
                    matchup: opponent
                        .and_then(|o| ctx.matchup(&player.player_id, category.metric, o)),
                    environment: opponent.and_then(|o| ctx.environment_for(o)),
                    live_line: line.map(|l| l.line.line),
                },
                &self.settings.projection,
            ));

            match reconciler.reconcile(&mut candidate, category, line) {
                Ok(Outcome::Active) => {}
                Ok(Outcome::LineEligible) => tally.line_eligible += 1,
                Ok(Outcome::BounceBack) => tally.bounce_back += 1,
                Ok(Outcome::NoUpcomingGame) => {
                    debug!(
                        "{}",
                        PipelineError::NoUpcomingGame {
                            player_id: player.player_id.clone(),
                            metric: category.metric,
                        }
                    );
                    tally.no_upcoming_game += 1;
                }
                Ok(Outcome::Rejected) => tally.rejected += 1,
                Err(e) => {
                    warn!(player = %player.player_id, category = %category.name, "{e}");
                    tally.inconsistent += 1;
                    continue;
                }
            }
            out.push(candidate);
        }
        (out, tally)
    }
}
