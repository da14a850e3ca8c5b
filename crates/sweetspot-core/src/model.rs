// Domain records shared by the store, the ingestion layer and the engine.
//
// Everything here is plain data: feed records are validated into these types
// at the ingestion boundary and never mutated afterwards.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Metric
// ---------------------------------------------------------------------------

/// A tracked box-score metric, including the combined "combo" props.
///
/// Serialized under its canonical name; deserialization goes through
/// `FromStr`, so config files and stored rows may use any accepted alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Metric {
    Points,
    Rebounds,
    Assists,
    Threes,
    Steals,
    Blocks,
    Turnovers,
    PointsRebounds,
    PointsAssists,
    ReboundsAssists,
    PointsReboundsAssists,
}

impl Metric {
    pub const ALL: [Metric; 11] = [
        Metric::Points,
        Metric::Rebounds,
        Metric::Assists,
        Metric::Threes,
        Metric::Steals,
        Metric::Blocks,
        Metric::Turnovers,
        Metric::PointsRebounds,
        Metric::PointsAssists,
        Metric::ReboundsAssists,
        Metric::PointsReboundsAssists,
    ];

    /// Canonical snake_case name, as stored and as written in config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Points => "points",
            Metric::Rebounds => "rebounds",
            Metric::Assists => "assists",
            Metric::Threes => "threes",
            Metric::Steals => "steals",
            Metric::Blocks => "blocks",
            Metric::Turnovers => "turnovers",
            Metric::PointsRebounds => "points_rebounds",
            Metric::PointsAssists => "points_assists",
            Metric::ReboundsAssists => "rebounds_assists",
            Metric::PointsReboundsAssists => "points_rebounds_assists",
        }
    }

    /// Extract this metric's value from a box-score line.
    pub fn value_from(&self, stats: &StatLine) -> f64 {
        match self {
            Metric::Points => stats.points,
            Metric::Rebounds => stats.rebounds,
            Metric::Assists => stats.assists,
            Metric::Threes => stats.threes,
            Metric::Steals => stats.steals,
            Metric::Blocks => stats.blocks,
            Metric::Turnovers => stats.turnovers,
            Metric::PointsRebounds => stats.points + stats.rebounds,
            Metric::PointsAssists => stats.points + stats.assists,
            Metric::ReboundsAssists => stats.rebounds + stats.assists,
            Metric::PointsReboundsAssists => stats.points + stats.rebounds + stats.assists,
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    /// Accepts the canonical names plus the short forms odds feeds use
    /// (`pts`, `reb`, `3pm`, `pra`, `pts+reb`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        let metric = match normalized.as_str() {
            "points" | "pts" | "player_points" => Metric::Points,
            "rebounds" | "reb" | "rebs" | "player_rebounds" => Metric::Rebounds,
            "assists" | "ast" | "asts" | "player_assists" => Metric::Assists,
            "threes" | "3pm" | "threes_made" | "player_threes" => Metric::Threes,
            "steals" | "stl" => Metric::Steals,
            "blocks" | "blk" => Metric::Blocks,
            "turnovers" | "tov" | "to" => Metric::Turnovers,
            "points_rebounds" | "pts+reb" | "pr" => Metric::PointsRebounds,
            "points_assists" | "pts+ast" | "pa" => Metric::PointsAssists,
            "rebounds_assists" | "reb+ast" | "ra" => Metric::ReboundsAssists,
            "points_rebounds_assists" | "pts+reb+ast" | "pra" => Metric::PointsReboundsAssists,
            _ => return Err(format!("unknown metric '{s}'")),
        };
        Ok(metric)
    }
}

impl TryFrom<String> for Metric {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Metric> for String {
    fn from(metric: Metric) -> String {
        metric.as_str().to_string()
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Which side of a threshold a pick is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Over,
    Under,
}

impl Direction {
    /// Whether `value` clears `threshold` on this side. Pushes never clear.
    pub fn clears(&self, value: f64, threshold: f64) -> bool {
        match self {
            Direction::Over => value > threshold,
            Direction::Under => value < threshold,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Over => "over",
            Direction::Under => "under",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "over" | "o" => Ok(Direction::Over),
            "under" | "u" => Ok(Direction::Under),
            _ => Err(format!("unknown direction '{s}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Role tags
// ---------------------------------------------------------------------------

/// Closed set of player archetypes. Players without an assignment are
/// `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleTag {
    EliteRebounder,
    GlassCleaner,
    RimProtector,
    StretchBig,
    PrimaryHandler,
    Playmaker,
    ComboGuard,
    ThreeAndD,
    VolumeScorer,
    RolePlayer,
    Unknown,
}

impl RoleTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleTag::EliteRebounder => "ELITE_REBOUNDER",
            RoleTag::GlassCleaner => "GLASS_CLEANER",
            RoleTag::RimProtector => "RIM_PROTECTOR",
            RoleTag::StretchBig => "STRETCH_BIG",
            RoleTag::PrimaryHandler => "PRIMARY_HANDLER",
            RoleTag::Playmaker => "PLAYMAKER",
            RoleTag::ComboGuard => "COMBO_GUARD",
            RoleTag::ThreeAndD => "THREE_AND_D",
            RoleTag::VolumeScorer => "VOLUME_SCORER",
            RoleTag::RolePlayer => "ROLE_PLAYER",
            RoleTag::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for RoleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoleTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        let role = match normalized.as_str() {
            "ELITE_REBOUNDER" => RoleTag::EliteRebounder,
            "GLASS_CLEANER" => RoleTag::GlassCleaner,
            "RIM_PROTECTOR" => RoleTag::RimProtector,
            "STRETCH_BIG" => RoleTag::StretchBig,
            "PRIMARY_HANDLER" => RoleTag::PrimaryHandler,
            "PLAYMAKER" => RoleTag::Playmaker,
            "COMBO_GUARD" => RoleTag::ComboGuard,
            "THREE_AND_D" | "3_AND_D" => RoleTag::ThreeAndD,
            "VOLUME_SCORER" => RoleTag::VolumeScorer,
            "ROLE_PLAYER" => RoleTag::RolePlayer,
            "UNKNOWN" => RoleTag::Unknown,
            _ => return Err(format!("unknown role tag '{s}'")),
        };
        Ok(role)
    }
}

// ---------------------------------------------------------------------------
// External records
// ---------------------------------------------------------------------------

/// Raw box-score counts for one game.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatLine {
    pub points: f64,
    pub rebounds: f64,
    pub assists: f64,
    pub threes: f64,
    pub steals: f64,
    pub blocks: f64,
    pub turnovers: f64,
}

/// One game played by one player. Append-only upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    pub player_id: String,
    pub player_name: String,
    /// Team abbreviation the player suited up for in this game.
    pub team: String,
    pub game_date: NaiveDate,
    pub minutes: f64,
    pub stats: StatLine,
}

impl PerformanceRecord {
    pub fn value(&self, metric: Metric) -> f64 {
        metric.value_from(&self.stats)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub player_id: String,
    pub role: RoleTag,
}

/// A player's history against one specific opponent for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchupHistory {
    pub player_id: String,
    pub metric: Metric,
    pub opponent: String,
    pub games: u32,
    pub avg_value: f64,
    pub min_value: f64,
    pub max_value: f64,
}

/// Schedule-level context for one game on a given date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEnvironment {
    pub game_date: NaiveDate,
    pub home_team: String,
    pub away_team: String,
    pub total: Option<f64>,
    pub spread: Option<f64>,
    /// Possessions-per-48 style rating where 100 is league average.
    pub pace_rating: Option<f64>,
    pub pace_class: Option<String>,
}

impl GameEnvironment {
    pub fn involves(&self, team: &str) -> bool {
        self.home_team.eq_ignore_ascii_case(team) || self.away_team.eq_ignore_ascii_case(team)
    }
}

/// A currently offered market threshold for a player/metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveLine {
    pub player_id: String,
    pub metric: Metric,
    pub line: f64,
    pub over_price: Option<i32>,
    pub under_price: Option<i32>,
    pub book: String,
    /// Structured opponent identifier when the feed supplies one.
    pub opponent: Option<String>,
    /// Free-form "AWAY @ HOME" description, kept for fallback parsing.
    pub game_description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_deserializes_from_feed_aliases() {
        let parsed: Vec<Metric> = serde_json::from_str(r#"["ast", "pra", "pts+reb", "Threes"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![
                Metric::Assists,
                Metric::PointsReboundsAssists,
                Metric::PointsRebounds,
                Metric::Threes,
            ]
        );
        assert!(serde_json::from_str::<Metric>(r#""dunks""#).is_err());
    }

    #[test]
    fn metric_serializes_canonical_name() {
        let json = serde_json::to_string(&Metric::PointsReboundsAssists).unwrap();
        assert_eq!(json, r#""points_rebounds_assists""#);
        let back: Metric = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Metric::PointsReboundsAssists);
    }

    #[test]
    fn environment_involves_matches_either_side() {
        let env = GameEnvironment {
            game_date: NaiveDate::from_ymd_opt(2026, 1, 20).unwrap(),
            home_team: "NYK".into(),
            away_team: "BOS".into(),
            total: None,
            spread: None,
            pace_rating: None,
            pace_class: None,
        };
        assert!(env.involves("nyk"));
        assert!(env.involves("BOS"));
        assert!(!env.involves("MIA"));
    }
}
