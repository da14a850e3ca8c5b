// SQLite persistence layer for feeds, candidates and run state.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

use crate::candidate::Candidate;
use crate::model::{
    GameEnvironment, LiveLine, MatchupHistory, Metric, PerformanceRecord, RoleAssignment, RoleTag,
    StatLine,
};
use crate::store::{CandidateSink, StatSource};

/// Dates are stored as ISO-8601 text so they sort and compare in SQL.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// SQLite-backed store for upstream feeds, finalized candidates and
/// key-value run state.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS performance_records (
                player_id   TEXT NOT NULL,
                player_name TEXT NOT NULL,
                team        TEXT NOT NULL,
                game_date   TEXT NOT NULL,
                minutes     REAL NOT NULL,
                points      REAL NOT NULL,
                rebounds    REAL NOT NULL,
                assists     REAL NOT NULL,
                threes      REAL NOT NULL,
                steals      REAL NOT NULL,
                blocks      REAL NOT NULL,
                turnovers   REAL NOT NULL,
                PRIMARY KEY (player_id, game_date)
            );

            CREATE TABLE IF NOT EXISTS player_roles (
                player_id TEXT PRIMARY KEY,
                role      TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS matchup_history (
                player_id TEXT NOT NULL,
                metric    TEXT NOT NULL,
                opponent  TEXT NOT NULL,
                games     INTEGER NOT NULL,
                avg_value REAL NOT NULL,
                min_value REAL NOT NULL,
                max_value REAL NOT NULL,
                PRIMARY KEY (player_id, metric, opponent)
            );

            CREATE TABLE IF NOT EXISTS game_environments (
                game_date   TEXT NOT NULL,
                home_team   TEXT NOT NULL,
                away_team   TEXT NOT NULL,
                total       REAL,
                spread      REAL,
                pace_rating REAL,
                pace_class  TEXT,
                PRIMARY KEY (game_date, home_team, away_team)
            );

            CREATE TABLE IF NOT EXISTS live_lines (
                player_id        TEXT NOT NULL,
                metric           TEXT NOT NULL,
                line             REAL NOT NULL,
                over_price       INTEGER,
                under_price      INTEGER,
                book             TEXT NOT NULL,
                opponent         TEXT,
                game_description TEXT,
                PRIMARY KEY (player_id, metric)
            );

            CREATE TABLE IF NOT EXISTS sweet_spot_candidates (
                analysis_date TEXT NOT NULL,
                player_id     TEXT NOT NULL,
                metric        TEXT NOT NULL,
                category      TEXT NOT NULL,
                direction     TEXT NOT NULL,
                threshold     REAL,
                confidence    REAL NOT NULL,
                eligibility   TEXT NOT NULL,
                risk          TEXT,
                active        INTEGER NOT NULL,
                payload       TEXT NOT NULL,
                PRIMARY KEY (analysis_date, player_id, metric, category)
            );

            CREATE TABLE IF NOT EXISTS run_state (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )
        .context("failed to create database schema")?;

        conn.execute_batch(
            "CREATE INDEX IF NOT EXISTS idx_performance_game_date ON performance_records(game_date);
             CREATE INDEX IF NOT EXISTS idx_candidates_date ON sweet_spot_candidates(analysis_date);",
        )
        .context("failed to create indexes")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Feed imports
    // ------------------------------------------------------------------

    /// Insert performance records in a single transaction. Re-importing the
    /// same (player, date) replaces the earlier row.
    pub fn import_performance(&self, records: &[PerformanceRecord]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin import transaction")?;
        for r in records {
            tx.execute(
                "INSERT OR REPLACE INTO performance_records
                    (player_id, player_name, team, game_date, minutes,
                     points, rebounds, assists, threes, steals, blocks, turnovers)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    r.player_id,
                    r.player_name,
                    r.team,
                    r.game_date.format(DATE_FORMAT).to_string(),
                    r.minutes,
                    r.stats.points,
                    r.stats.rebounds,
                    r.stats.assists,
                    r.stats.threes,
                    r.stats.steals,
                    r.stats.blocks,
                    r.stats.turnovers,
                ],
            )
            .context("failed to insert performance record")?;
        }
        tx.commit().context("failed to commit performance import")?;
        Ok(records.len())
    }

    /// Replace the whole role table. Role assignments are a snapshot feed,
    /// so players missing from the new snapshot fall back to `UNKNOWN`.
    pub fn import_roles(&self, roles: &[RoleAssignment]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin import transaction")?;
        tx.execute("DELETE FROM player_roles", [])
            .context("failed to clear player roles")?;
        for r in roles {
            tx.execute(
                "INSERT OR REPLACE INTO player_roles (player_id, role) VALUES (?1, ?2)",
                params![r.player_id, r.role.as_str()],
            )
            .context("failed to insert role assignment")?;
        }
        tx.commit().context("failed to commit role import")?;
        Ok(roles.len())
    }

    pub fn import_matchups(&self, rows: &[MatchupHistory]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin import transaction")?;
        for m in rows {
            tx.execute(
                "INSERT OR REPLACE INTO matchup_history
                    (player_id, metric, opponent, games, avg_value, min_value, max_value)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    m.player_id,
                    m.metric.as_str(),
                    m.opponent,
                    m.games,
                    m.avg_value,
                    m.min_value,
                    m.max_value,
                ],
            )
            .context("failed to insert matchup history")?;
        }
        tx.commit().context("failed to commit matchup import")?;
        Ok(rows.len())
    }

    pub fn import_environments(&self, rows: &[GameEnvironment]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin import transaction")?;
        for g in rows {
            tx.execute(
                "INSERT OR REPLACE INTO game_environments
                    (game_date, home_team, away_team, total, spread, pace_rating, pace_class)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    g.game_date.format(DATE_FORMAT).to_string(),
                    g.home_team,
                    g.away_team,
                    g.total,
                    g.spread,
                    g.pace_rating,
                    g.pace_class,
                ],
            )
            .context("failed to insert game environment")?;
        }
        tx.commit().context("failed to commit environment import")?;
        Ok(rows.len())
    }

    /// Replace the live-line board. Lines that are no longer offered must
    /// disappear, so the table is cleared first.
    pub fn import_lines(&self, lines: &[LiveLine]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin import transaction")?;
        tx.execute("DELETE FROM live_lines", [])
            .context("failed to clear live lines")?;
        for l in lines {
            tx.execute(
                "INSERT OR REPLACE INTO live_lines
                    (player_id, metric, line, over_price, under_price, book, opponent, game_description)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    l.player_id,
                    l.metric.as_str(),
                    l.line,
                    l.over_price,
                    l.under_price,
                    l.book,
                    l.opponent,
                    l.game_description,
                ],
            )
            .context("failed to insert live line")?;
        }
        tx.commit().context("failed to commit line import")?;
        Ok(lines.len())
    }

    // ------------------------------------------------------------------
    // Candidates
    // ------------------------------------------------------------------

    /// Load the stored candidate set for a date, active first then by
    /// confidence.
    pub fn load_candidates(&self, analysis_date: NaiveDate) -> Result<Vec<Candidate>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT payload FROM sweet_spot_candidates
                 WHERE analysis_date = ?1
                 ORDER BY active DESC, confidence DESC",
            )
            .context("failed to prepare load_candidates query")?;

        let payloads = stmt
            .query_map(
                params![analysis_date.format(DATE_FORMAT).to_string()],
                |row| row.get::<_, String>(0),
            )
            .context("failed to query candidates")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map candidate rows")?;

        payloads
            .iter()
            .map(|p| serde_json::from_str::<Candidate>(p).context("failed to deserialize candidate payload"))
            .collect()
    }

    // ------------------------------------------------------------------
    // Run state (key-value)
    // ------------------------------------------------------------------

    /// Persist an arbitrary JSON value under `key`. Uses INSERT OR REPLACE so
    /// repeated saves overwrite the previous value.
    pub fn save_state(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let conn = self.conn();
        let json_str =
            serde_json::to_string(value).context("failed to serialize state value")?;
        conn.execute(
            "INSERT OR REPLACE INTO run_state (key, value) VALUES (?1, ?2)",
            params![key, json_str],
        )
        .context("failed to save state")?;
        Ok(())
    }

    /// Load a previously saved JSON value by `key`. Returns `None` if the key
    /// does not exist.
    pub fn load_state(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT value FROM run_state WHERE key = ?1")
            .context("failed to prepare load_state query")?;

        let mut rows = stmt
            .query_map(params![key], |row| row.get::<_, String>(0))
            .context("failed to query run state")?;

        match rows.next() {
            Some(row_result) => {
                let json_str = row_result.context("failed to read state row")?;
                let value: serde_json::Value = serde_json::from_str(&json_str)
                    .context("failed to deserialize state value")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Row mapping helpers
// ---------------------------------------------------------------------------

fn parse_date(raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_metric(raw: &str) -> rusqlite::Result<Metric> {
    raw.parse::<Metric>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, e)),
        )
    })
}

fn performance_from_row(row: &Row<'_>) -> rusqlite::Result<PerformanceRecord> {
    let game_date: String = row.get(3)?;
    Ok(PerformanceRecord {
        player_id: row.get(0)?,
        player_name: row.get(1)?,
        team: row.get(2)?,
        game_date: parse_date(&game_date)?,
        minutes: row.get(4)?,
        stats: StatLine {
            points: row.get(5)?,
            rebounds: row.get(6)?,
            assists: row.get(7)?,
            threes: row.get(8)?,
            steals: row.get(9)?,
            blocks: row.get(10)?,
            turnovers: row.get(11)?,
        },
    })
}

// ---------------------------------------------------------------------------
// Trait implementations
// ---------------------------------------------------------------------------

impl StatSource for Database {
    fn performance_records(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<PerformanceRecord>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT player_id, player_name, team, game_date, minutes,
                        points, rebounds, assists, threes, steals, blocks, turnovers
                 FROM performance_records
                 WHERE game_date >= ?1 AND game_date <= ?2
                 ORDER BY player_id, game_date DESC",
            )
            .context("failed to prepare performance query")?;

        let records = stmt
            .query_map(
                params![
                    from.format(DATE_FORMAT).to_string(),
                    to.format(DATE_FORMAT).to_string()
                ],
                performance_from_row,
            )
            .context("failed to query performance records")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map performance rows")?;
        Ok(records)
    }

    fn role_assignments(&self) -> Result<Vec<RoleAssignment>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT player_id, role FROM player_roles")
            .context("failed to prepare role query")?;

        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .context("failed to query roles")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map role rows")?;

        // Stored roles went through ingestion validation; anything that no
        // longer parses is treated as unassigned.
        Ok(rows
            .into_iter()
            .map(|(player_id, role)| RoleAssignment {
                player_id,
                role: role.parse().unwrap_or(RoleTag::Unknown),
            })
            .collect())
    }

    fn matchup_history(&self) -> Result<Vec<MatchupHistory>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT player_id, metric, opponent, games, avg_value, min_value, max_value
                 FROM matchup_history",
            )
            .context("failed to prepare matchup query")?;

        let rows = stmt
            .query_map([], |row| {
                let metric: String = row.get(1)?;
                Ok(MatchupHistory {
                    player_id: row.get(0)?,
                    metric: parse_metric(&metric)?,
                    opponent: row.get(2)?,
                    games: row.get(3)?,
                    avg_value: row.get(4)?,
                    min_value: row.get(5)?,
                    max_value: row.get(6)?,
                })
            })
            .context("failed to query matchup history")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map matchup rows")?;
        Ok(rows)
    }

    fn game_environments(&self, game_date: NaiveDate) -> Result<Vec<GameEnvironment>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT game_date, home_team, away_team, total, spread, pace_rating, pace_class
                 FROM game_environments WHERE game_date = ?1",
            )
            .context("failed to prepare environment query")?;

        let rows = stmt
            .query_map(params![game_date.format(DATE_FORMAT).to_string()], |row| {
                let date: String = row.get(0)?;
                Ok(GameEnvironment {
                    game_date: parse_date(&date)?,
                    home_team: row.get(1)?,
                    away_team: row.get(2)?,
                    total: row.get(3)?,
                    spread: row.get(4)?,
                    pace_rating: row.get(5)?,
                    pace_class: row.get(6)?,
                })
            })
            .context("failed to query game environments")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map environment rows")?;
        Ok(rows)
    }

    fn live_lines(&self) -> Result<Vec<LiveLine>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT player_id, metric, line, over_price, under_price, book, opponent, game_description
                 FROM live_lines",
            )
            .context("failed to prepare live line query")?;

        let rows = stmt
            .query_map([], |row| {
                let metric: String = row.get(1)?;
                Ok(LiveLine {
                    player_id: row.get(0)?,
                    metric: parse_metric(&metric)?,
                    line: row.get(2)?,
                    over_price: row.get(3)?,
                    under_price: row.get(4)?,
                    book: row.get(5)?,
                    opponent: row.get(6)?,
                    game_description: row.get(7)?,
                })
            })
            .context("failed to query live lines")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map live line rows")?;
        Ok(rows)
    }
}

impl CandidateSink for Database {
    fn clear_candidates(&self, analysis_date: NaiveDate) -> Result<usize> {
        let conn = self.conn();
        let removed = conn
            .execute(
                "DELETE FROM sweet_spot_candidates WHERE analysis_date = ?1",
                params![analysis_date.format(DATE_FORMAT).to_string()],
            )
            .context("failed to clear candidates")?;
        Ok(removed)
    }

    fn write_batch(&self, batch: &[Candidate]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin candidate batch")?;
        for c in batch {
            let payload =
                serde_json::to_string(c).context("failed to serialize candidate")?;
            tx.execute(
                "INSERT OR REPLACE INTO sweet_spot_candidates
                    (analysis_date, player_id, metric, category, direction, threshold,
                     confidence, eligibility, risk, active, payload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    c.analysis_date.format(DATE_FORMAT).to_string(),
                    c.player_id,
                    c.metric.as_str(),
                    c.category,
                    c.direction.as_str(),
                    c.threshold,
                    c.confidence,
                    c.eligibility.as_str(),
                    c.risk.map(|r| r.as_str()),
                    c.is_active(),
                    payload,
                ],
            )
            .context("failed to insert candidate")?;
        }
        tx.commit().context("failed to commit candidate batch")?;
        Ok(())
    }
}
