// Feed ingestion and validation.
//
// Reads the upstream CSV feeds (box scores, roles, matchup aggregates, game
// environments, live lines) into typed records. Malformed rows are rejected
// here with a warning so nothing downstream has to re-check them.

use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::warn;

use crate::model::{
    GameEnvironment, LiveLine, MatchupHistory, Metric, PerformanceRecord, RoleAssignment, RoleTag,
    StatLine,
};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },
}

// ---------------------------------------------------------------------------
// Raw CSV serde structs (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawPerformance {
    player_id: String,
    #[serde(default)]
    player_name: String,
    team: String,
    game_date: String,
    #[serde(alias = "min")]
    minutes: f64,
    #[serde(alias = "pts")]
    points: f64,
    #[serde(alias = "reb")]
    rebounds: f64,
    #[serde(alias = "ast")]
    assists: f64,
    #[serde(default, alias = "fg3m", alias = "3pm")]
    threes: f64,
    #[serde(default, alias = "stl")]
    steals: f64,
    #[serde(default, alias = "blk")]
    blocks: f64,
    #[serde(default, alias = "tov")]
    turnovers: f64,
}

#[derive(Debug, Deserialize)]
struct RawRole {
    player_id: String,
    #[serde(alias = "archetype")]
    role: String,
}

#[derive(Debug, Deserialize)]
struct RawMatchup {
    player_id: String,
    metric: String,
    opponent: String,
    #[serde(alias = "games_played")]
    games: f64,
    avg_value: f64,
    min_value: f64,
    max_value: f64,
}

#[derive(Debug, Deserialize)]
struct RawEnvironment {
    game_date: String,
    home_team: String,
    away_team: String,
    #[serde(default, alias = "vegas_total")]
    total: Option<f64>,
    #[serde(default)]
    spread: Option<f64>,
    #[serde(default)]
    pace_rating: Option<f64>,
    #[serde(default)]
    pace_class: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawLine {
    player_id: String,
    #[serde(alias = "prop_type")]
    metric: String,
    #[serde(alias = "current_line")]
    line: f64,
    #[serde(default)]
    over_price: Option<i32>,
    #[serde(default)]
    under_price: Option<i32>,
    #[serde(default, alias = "bookmaker")]
    book: String,
    #[serde(default)]
    opponent: Option<String>,
    #[serde(default)]
    game_description: Option<String>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Returns true if all given f64 values are finite (not NaN or Infinity).
fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Trim an optional free-text field; blank becomes `None`.
fn non_blank(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Reader-based loaders (enable testing without temp files)
// ---------------------------------------------------------------------------

pub fn performance_from_reader<R: Read>(rdr: R) -> Result<Vec<PerformanceRecord>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut records = Vec::new();
    for result in reader.deserialize::<RawPerformance>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!("skipping malformed performance row: {}", e);
                continue;
            }
        };
        let player_id = raw.player_id.trim().to_string();
        if player_id.is_empty() {
            warn!("skipping performance row with empty player_id");
            continue;
        }
        let Some(game_date) = parse_date(&raw.game_date) else {
            warn!("skipping performance row for '{}': bad game_date '{}'", player_id, raw.game_date);
            continue;
        };
        let numbers = [
            raw.minutes,
            raw.points,
            raw.rebounds,
            raw.assists,
            raw.threes,
            raw.steals,
            raw.blocks,
            raw.turnovers,
        ];
        if !all_finite(&numbers) || numbers.iter().any(|v| *v < 0.0) {
            warn!("skipping performance row for '{}' on {}: non-finite or negative stat", player_id, game_date);
            continue;
        }
        let player_name = match raw.player_name.trim() {
            "" => player_id.clone(),
            name => name.to_string(),
        };
        records.push(PerformanceRecord {
            player_id,
            player_name,
            team: raw.team.trim().to_ascii_uppercase(),
            game_date,
            minutes: raw.minutes,
            stats: StatLine {
                points: raw.points,
                rebounds: raw.rebounds,
                assists: raw.assists,
                threes: raw.threes,
                steals: raw.steals,
                blocks: raw.blocks,
                turnovers: raw.turnovers,
            },
        });
    }
    Ok(records)
}

pub fn roles_from_reader<R: Read>(rdr: R) -> Result<Vec<RoleAssignment>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut roles = Vec::new();
    for result in reader.deserialize::<RawRole>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!("skipping malformed role row: {}", e);
                continue;
            }
        };
        let player_id = raw.player_id.trim().to_string();
        if player_id.is_empty() {
            warn!("skipping role row with empty player_id");
            continue;
        }
        match raw.role.parse::<RoleTag>() {
            Ok(role) => roles.push(RoleAssignment { player_id, role }),
            Err(e) => warn!("skipping role row for '{}': {}", player_id, e),
        }
    }
    Ok(roles)
}

pub fn matchups_from_reader<R: Read>(rdr: R) -> Result<Vec<MatchupHistory>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut rows = Vec::new();
    for result in reader.deserialize::<RawMatchup>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!("skipping malformed matchup row: {}", e);
                continue;
            }
        };
        let player_id = raw.player_id.trim().to_string();
        let opponent = raw.opponent.trim().to_ascii_uppercase();
        if player_id.is_empty() || opponent.is_empty() {
            warn!("skipping matchup row with empty player_id or opponent");
            continue;
        }
        let metric = match raw.metric.parse::<Metric>() {
            Ok(m) => m,
            Err(e) => {
                warn!("skipping matchup row for '{}': {}", player_id, e);
                continue;
            }
        };
        if !all_finite(&[raw.games, raw.avg_value, raw.min_value, raw.max_value]) || raw.games < 0.0 {
            warn!("skipping matchup row for '{}' vs {}: non-finite value", player_id, opponent);
            continue;
        }
        rows.push(MatchupHistory {
            player_id,
            metric,
            opponent,
            games: raw.games.round() as u32,
            avg_value: raw.avg_value,
            min_value: raw.min_value,
            max_value: raw.max_value,
        });
    }
    Ok(rows)
}

pub fn environments_from_reader<R: Read>(rdr: R) -> Result<Vec<GameEnvironment>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut rows = Vec::new();
    for result in reader.deserialize::<RawEnvironment>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!("skipping malformed environment row: {}", e);
                continue;
            }
        };
        let Some(game_date) = parse_date(&raw.game_date) else {
            warn!("skipping environment row: bad game_date '{}'", raw.game_date);
            continue;
        };
        let home_team = raw.home_team.trim().to_ascii_uppercase();
        let away_team = raw.away_team.trim().to_ascii_uppercase();
        if home_team.is_empty() || away_team.is_empty() {
            warn!("skipping environment row on {}: missing team", game_date);
            continue;
        }
        let optional = [raw.total, raw.spread, raw.pace_rating];
        if optional.iter().flatten().any(|v| !v.is_finite()) {
            warn!("skipping environment row {} @ {}: non-finite value", away_team, home_team);
            continue;
        }
        if raw.pace_rating.is_some_and(|p| p <= 0.0) {
            warn!("skipping environment row {} @ {}: non-positive pace rating", away_team, home_team);
            continue;
        }
        rows.push(GameEnvironment {
            game_date,
            home_team,
            away_team,
            total: raw.total,
            spread: raw.spread,
            pace_rating: raw.pace_rating,
            pace_class: non_blank(raw.pace_class),
        });
    }
    Ok(rows)
}

pub fn lines_from_reader<R: Read>(rdr: R) -> Result<Vec<LiveLine>, csv::Error> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut lines = Vec::new();
    for result in reader.deserialize::<RawLine>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!("skipping malformed line row: {}", e);
                continue;
            }
        };
        let player_id = raw.player_id.trim().to_string();
        if player_id.is_empty() {
            warn!("skipping line row with empty player_id");
            continue;
        }
        let metric = match raw.metric.parse::<Metric>() {
            Ok(m) => m,
            Err(e) => {
                warn!("skipping line row for '{}': {}", player_id, e);
                continue;
            }
        };
        if !raw.line.is_finite() || raw.line <= 0.0 {
            warn!("skipping line row for '{}' {}: invalid line {}", player_id, metric, raw.line);
            continue;
        }
        lines.push(LiveLine {
            player_id,
            metric,
            line: raw.line,
            over_price: raw.over_price,
            under_price: raw.under_price,
            book: raw.book.trim().to_string(),
            opponent: non_blank(raw.opponent).map(|o| o.to_ascii_uppercase()),
            game_description: non_blank(raw.game_description),
        });
    }
    Ok(lines)
}

// ---------------------------------------------------------------------------
// Public path-based loaders
// ---------------------------------------------------------------------------

fn load_from_path<T>(
    path: &Path,
    parse: impl FnOnce(std::fs::File) -> Result<Vec<T>, csv::Error>,
) -> Result<Vec<T>, IngestError> {
    let file = std::fs::File::open(path).map_err(|e| IngestError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    parse(file).map_err(|e| IngestError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}

pub fn load_performance(path: &Path) -> Result<Vec<PerformanceRecord>, IngestError> {
    load_from_path(path, performance_from_reader)
}

pub fn load_roles(path: &Path) -> Result<Vec<RoleAssignment>, IngestError> {
    load_from_path(path, roles_from_reader)
}

pub fn load_matchups(path: &Path) -> Result<Vec<MatchupHistory>, IngestError> {
    load_from_path(path, matchups_from_reader)
}

pub fn load_environments(path: &Path) -> Result<Vec<GameEnvironment>, IngestError> {
    load_from_path(path, environments_from_reader)
}

pub fn load_lines(path: &Path) -> Result<Vec<LiveLine>, IngestError> {
    load_from_path(path, lines_from_reader)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
