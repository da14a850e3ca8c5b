// Read-only lookup tables for one run.
//
// Every upstream feed is read exactly once here. A failed read is logged and
// the feed treated as empty so the rest of the run can proceed; the failure
// is surfaced in the run report.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use sweetspot_core::model::{GameEnvironment, LiveLine, MatchupHistory, Metric, PerformanceRecord};
use sweetspot_core::store::StatSource;
use tracing::{info, warn};

use crate::archetype::ArchetypeClassifier;
use crate::error::PipelineError;
use crate::opponent::{canonical_team, resolve_opponent};
use crate::settings::WindowSettings;
use crate::stats::{aggregate, Aggregation};

/// A live line with its opponent already resolved.
#[derive(Debug, Clone)]
pub struct ResolvedLine {
    pub line: LiveLine,
    pub opponent: Option<String>,
}

pub struct RunContext {
    pub analysis_date: NaiveDate,
    pub aggregation: Aggregation,
    pub classifier: ArchetypeClassifier,
    matchups: HashMap<(String, Metric, String), MatchupHistory>,
    environments: Vec<GameEnvironment>,
    lines: HashMap<(String, Metric), ResolvedLine>,
    pub fetch_errors: Vec<PipelineError>,
}

fn fetch<T>(
    feed: &'static str,
    result: anyhow::Result<Vec<T>>,
    errors: &mut Vec<PipelineError>,
) -> Vec<T> {
    match result {
        Ok(rows) => rows,
        Err(e) => {
            warn!(feed, "data fetch failed, continuing without it: {e:#}");
            errors.push(PipelineError::DataFetch {
                feed,
                message: format!("{e:#}"),
            });
            Vec::new()
        }
    }
}

impl RunContext {
    pub fn load(
        source: &dyn StatSource,
        analysis_date: NaiveDate,
        window: &WindowSettings,
    ) -> RunContext {
        let mut errors = Vec::new();

        let from = analysis_date - Duration::days(i64::from(window.season_lookback_days));
        let to = analysis_date - Duration::days(1);
        let records = fetch(
            "performance records",
            source.performance_records(from, to),
            &mut errors,
        );
        let roles = fetch("role assignments", source.role_assignments(), &mut errors);
        let matchups = fetch("matchup history", source.matchup_history(), &mut errors);
        let environments = fetch(
            "game environments",
            source.game_environments(analysis_date),
            &mut errors,
        );
        let lines = fetch("live lines", source.live_lines(), &mut errors);

        let ctx = RunContext::from_parts(
            analysis_date,
            &records,
            window,
            ArchetypeClassifier::new(&roles),
            matchups,
            environments,
            lines,
            errors,
        );
        info!(
            players = ctx.aggregation.players.len(),
            records = records.len(),
            lines = ctx.lines.len(),
            environments = ctx.environments.len(),
            fetch_errors = ctx.fetch_errors.len(),
            "run context loaded"
        );
        ctx
    }

    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        analysis_date: NaiveDate,
        records: &[PerformanceRecord],
        window: &WindowSettings,
        classifier: ArchetypeClassifier,
        matchups: Vec<MatchupHistory>,
        environments: Vec<GameEnvironment>,
        lines: Vec<LiveLine>,
        fetch_errors: Vec<PipelineError>,
    ) -> RunContext {
        let aggregation = aggregate(records, analysis_date, window);

        let teams: HashMap<&str, &str> = aggregation
            .players
            .iter()
            .map(|p| (p.player_id.as_str(), p.team.as_str()))
            .collect();

        let mut resolved = HashMap::new();
        for line in lines {
            let key = (line.player_id.clone(), line.metric);
            if resolved.contains_key(&key) {
                warn!(player = %line.player_id, metric = %line.metric, "duplicate live line ignored");
                continue;
            }
            let team = teams.get(line.player_id.as_str()).copied();
            let opponent = resolve_opponent(&line, team);
            resolved.insert(key, ResolvedLine { line, opponent });
        }

        let matchups = matchups
            .into_iter()
            .map(|m| ((m.player_id.clone(), m.metric, canonical_team(&m.opponent)), m))
            .collect();

        let environments = environments
            .into_iter()
            .map(|e| GameEnvironment {
                home_team: canonical_team(&e.home_team),
                away_team: canonical_team(&e.away_team),
                ..e
            })
            .collect();

        RunContext {
            analysis_date,
            aggregation,
            classifier,
            matchups,
            environments,
            lines: resolved,
            fetch_errors,
        }
    }

    pub fn line_for(&self, player_id: &str, metric: Metric) -> Option<&ResolvedLine> {
        self.lines.get(&(player_id.to_string(), metric))
    }

    pub fn matchup(&self, player_id: &str, metric: Metric, opponent: &str) -> Option<&MatchupHistory> {
        self.matchups
            .get(&(player_id.to_string(), metric, canonical_team(opponent)))
    }

    /// The environment record for the game `team` plays on the analysis date.
    pub fn environment_for(&self, team: &str) -> Option<&GameEnvironment> {
        let team = canonical_team(team);
        self.environments
            .iter()
            .filter(|e| e.game_date == self.analysis_date)
            .find(|e| e.involves(&team))
    }
}
