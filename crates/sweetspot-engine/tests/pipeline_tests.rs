// End-to-end screening runs against an in-memory store.
//
// Each test imports a small slate through the store's import methods, runs
// the full pipeline and checks both the report and the persisted candidate
// set.

use std::collections::HashSet;

use chrono::{Duration, NaiveDate};
use sweetspot_core::candidate::{CandidateState, EligibilityPath, ProjectionSource, RiskTier};
use sweetspot_core::db::Database;
use sweetspot_core::model::{
    Direction, GameEnvironment, LiveLine, MatchupHistory, Metric, PerformanceRecord,
    RoleAssignment, RoleTag, StatLine,
};
use sweetspot_engine::{CategoryRuleSet, EngineSettings, Pipeline, RunReport, RunRequest};

// ===========================================================================
// Fixtures
// ===========================================================================

const RULES: &str = r#"
version = "it-1"

[[category]]
name = "REB_LEGACY"
metric = "rebounds"
avg_range = [8.0, 12.0]
thresholds = [9.5, 10.5]
direction = "over"
min_hit_rate = 0.55
blocked_roles = ["STRETCH_BIG"]
policy = { kind = "legacy", big_stat = true }

[[category]]
name = "REB_OPTIMAL"
metric = "rebounds"
avg_range = [8.0, 12.0]
thresholds = [9.5, 10.5]
direction = "over"
min_hit_rate = 0.55
blocked_roles = ["STRETCH_BIG"]
policy = { kind = "optimal" }

[[category]]
name = "SCORER_OVER"
metric = "points"
avg_range = [18.0, 40.0]
thresholds = [17.5, 19.5, 21.5]
direction = "over"
min_hit_rate = 0.6
supports_reversion = true
line_range = [14.5, 35.5]
policy = { kind = "legacy", big_stat = true }
"#;

const REBOUNDS: [f64; 10] = [10.0, 9.0, 11.0, 8.0, 12.0, 9.0, 10.0, 11.0, 9.0, 10.0];
const COLD_POINTS: [f64; 10] = [17.0, 17.0, 17.0, 12.0, 12.0, 13.0, 13.0, 13.0, 13.0, 13.0];

fn analysis_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 20).unwrap()
}

fn rules() -> CategoryRuleSet {
    CategoryRuleSet::from_toml_str(RULES).unwrap()
}

/// Games on consecutive days ending the day before `end`, most recent first.
fn games(
    player: &str,
    team: &str,
    end: NaiveDate,
    points: &[f64],
    rebounds: &[f64],
) -> Vec<PerformanceRecord> {
    points
        .iter()
        .zip(rebounds)
        .enumerate()
        .map(|(i, (&pts, &reb))| PerformanceRecord {
            player_id: player.into(),
            player_name: format!("Player {player}"),
            team: team.into(),
            game_date: end - Duration::days(i as i64 + 1),
            minutes: 32.0,
            stats: StatLine {
                points: pts,
                rebounds: reb,
                assists: 3.0,
                ..StatLine::default()
            },
        })
        .collect()
}

fn line(player: &str, metric: Metric, value: f64, description: &str) -> LiveLine {
    LiveLine {
        player_id: player.into(),
        metric,
        line: value,
        over_price: Some(-110),
        under_price: Some(-110),
        book: "consensus".into(),
        opponent: None,
        game_description: Some(description.into()),
    }
}

/// A slate covering the range, blocked-role, no-line and bounce-back paths.
fn seeded_db() -> Database {
    let db = Database::open(":memory:").unwrap();
    let date = analysis_date();

    let mut records = Vec::new();
    // Rebounding big: in range for rebounds, far out of range for points.
    records.extend(games("big", "BOS", date, &[6.0; 10], &REBOUNDS));
    // Same production, but a stretch big.
    records.extend(games("stretch", "MIA", date, &[6.0; 10], &REBOUNDS));
    // In range for rebounds but nothing offered.
    records.extend(games("noline", "DEN", date, &[6.0; 10], &REBOUNDS));
    // Cold scorer: recent mean 14, season mean 18 once older games count.
    records.extend(games("cold", "LAL", date, &COLD_POINTS, &[4.0; 10]));
    records.extend(games(
        "cold",
        "LAL",
        date - Duration::days(60),
        &[22.0; 10],
        &[4.0; 10],
    ));
    db.import_performance(&records).unwrap();

    db.import_roles(&[
        RoleAssignment { player_id: "big".into(), role: RoleTag::EliteRebounder },
        RoleAssignment { player_id: "stretch".into(), role: RoleTag::StretchBig },
        RoleAssignment { player_id: "cold".into(), role: RoleTag::VolumeScorer },
    ])
    .unwrap();

    db.import_lines(&[
        line("big", Metric::Rebounds, 10.5, "BOS @ NY"),
        line("stretch", Metric::Rebounds, 10.5, "MIA vs CHI"),
        line("cold", Metric::Points, 16.0, "LAL vs. GS"),
    ])
    .unwrap();

    db.import_matchups(&[MatchupHistory {
        player_id: "big".into(),
        metric: Metric::Rebounds,
        opponent: "NYK".into(),
        games: 6,
        avg_value: 13.0,
        min_value: 9.0,
        max_value: 16.0,
    }])
    .unwrap();

    db.import_environments(&[GameEnvironment {
        game_date: date,
        home_team: "NYK".into(),
        away_team: "BOS".into(),
        total: Some(224.5),
        spread: Some(-2.5),
        pace_rating: Some(100.0),
        pace_class: Some("AVERAGE".into()),
    }])
    .unwrap();

    db
}

fn run(db: &Database, request: &RunRequest) -> RunReport {
    let rules = rules();
    let settings = EngineSettings::default();
    Pipeline {
        rules: &rules,
        settings: &settings,
    }
    .run(db, db, request)
    .unwrap()
}

fn only(category: &str) -> RunRequest {
    RunRequest {
        category: Some(category.into()),
        ..RunRequest::for_date(analysis_date())
    }
}

// ===========================================================================
// Scenarios
// ===========================================================================

#[test]
fn legacy_big_stat_keeps_failing_line_active_with_high_risk() {
    let db = seeded_db();
    let report = run(&db, &only("REB_LEGACY"));

    let picks = &report.picks["REB_LEGACY"];
    let big = picks.iter().find(|p| p.player_id == "big").unwrap();
    assert_eq!(big.direction, Direction::Over);
    assert_eq!(big.threshold, Some(9.5));
    assert_eq!(big.risk, Some(RiskTier::High));
    assert_eq!(big.live_line, Some(10.5));
    assert!((big.confidence - 0.714).abs() < 1e-3);

    let stored = db.load_candidates(analysis_date()).unwrap();
    let big = stored.iter().find(|c| c.player_id == "big").unwrap();
    assert!((big.live_hit_rate.unwrap() - 0.3).abs() < 1e-9);
    assert!((big.gate_hit_rate.unwrap() - 0.3).abs() < 1e-9);
}

#[test]
fn optimal_gates_on_window_rate_and_prices_risk_from_live_rate() {
    let db = seeded_db();
    let report = run(&db, &only("REB_OPTIMAL"));

    let big = report.picks["REB_OPTIMAL"]
        .iter()
        .find(|p| p.player_id == "big")
        .unwrap();
    assert_eq!(big.risk, Some(RiskTier::High));

    let stored = db.load_candidates(analysis_date()).unwrap();
    let big = stored.iter().find(|c| c.player_id == "big").unwrap();
    assert_eq!(big.gate_hit_rate, Some(0.6));
    assert_eq!(big.required_hit_rate, Some(0.55));
}

#[test]
fn blocked_role_is_never_a_candidate() {
    let db = seeded_db();
    let report = run(&db, &only("REB_LEGACY"));

    assert_eq!(report.role_blocked, 1);
    assert!(report
        .picks
        .values()
        .flatten()
        .all(|p| p.player_id != "stretch"));
    let stored = db.load_candidates(analysis_date()).unwrap();
    assert!(stored.iter().all(|c| c.player_id != "stretch"));
}

#[test]
fn missing_line_is_kept_inactive_for_audit() {
    let db = seeded_db();
    let report = run(&db, &only("REB_LEGACY"));
    assert_eq!(report.no_upcoming_game, 1);

    let stored = db.load_candidates(analysis_date()).unwrap();
    let noline = stored.iter().find(|c| c.player_id == "noline").unwrap();
    assert_eq!(noline.state, CandidateState::Inactive);
    assert_eq!(noline.inactive_reason.as_deref(), Some("no upcoming game/line"));
}

#[test]
fn cold_scorer_emits_bounce_back_over() {
    let db = seeded_db();
    let report = run(&db, &only("SCORER_OVER"));
    assert_eq!(report.bounce_back, 1);

    let cold = report.picks["SCORER_OVER"]
        .iter()
        .find(|p| p.player_id == "cold")
        .unwrap();
    assert_eq!(cold.eligibility, EligibilityPath::BounceBack);
    assert_eq!(cold.direction, Direction::Over);
    assert_eq!(cold.threshold, Some(16.0));
    assert_eq!(cold.opponent.as_deref(), Some("GSW"));
    assert!((cold.confidence - 0.8625).abs() < 1e-9);
}

#[test]
fn bounce_back_suppressed_when_line_drifts_from_season() {
    let db = seeded_db();
    // 20.5 is 2.5 from the season average: only the line-distance gate fails.
    db.import_lines(&[line("cold", Metric::Points, 20.5, "LAL vs. GS")])
        .unwrap();
    let report = run(&db, &only("SCORER_OVER"));
    assert_eq!(report.bounce_back, 0);
    assert!(report.picks.get("SCORER_OVER").is_none());

    let stored = db.load_candidates(analysis_date()).unwrap();
    let cold = stored.iter().find(|c| c.player_id == "cold").unwrap();
    assert!(!cold.is_active());
    assert!(cold.inactive_reason.as_deref().unwrap().contains("bounce-back"));
}

/// A slate holding only the cold scorer: ten recent games, ten older games
/// sixty days back at `older_points`, and one points line.
fn cold_slate(recent: &[f64], older_points: f64, line_value: f64) -> Database {
    let db = Database::open(":memory:").unwrap();
    let date = analysis_date();
    let mut records = games("cold", "LAL", date, recent, &[4.0; 10]);
    records.extend(games(
        "cold",
        "LAL",
        date - Duration::days(60),
        &[older_points; 10],
        &[4.0; 10],
    ));
    db.import_performance(&records).unwrap();
    db.import_roles(&[RoleAssignment { player_id: "cold".into(), role: RoleTag::VolumeScorer }])
        .unwrap();
    db.import_lines(&[line("cold", Metric::Points, line_value, "LAL vs. GS")])
        .unwrap();
    db
}

#[test]
fn each_bounce_back_gate_alone_suppresses_emission() {
    // Every mutated row keeps the recent mean at 14 and breaks exactly one
    // gate relative to the emitting baseline row.
    let wide = [30.0, 30.0, 30.0, 7.0, 7.0, 7.0, 7.0, 7.0, 7.0, 8.0];
    let spiky = [20.0, 20.0, 20.0, 11.0, 11.0, 11.0, 11.0, 12.0, 12.0, 12.0];
    let cases: [(&str, &[f64], f64, f64, Option<&str>); 6] = [
        ("baseline", &COLD_POINTS, 22.0, 16.0, None),
        // Season 15: only one point above the recent mean.
        ("gap", &COLD_POINTS, 16.0, 16.0, Some("season gap")),
        // Stddev near 10.5 puts the z-score under 0.5.
        ("zscore", &wide, 22.0, 16.0, Some("z-score")),
        ("line distance", &COLD_POINTS, 22.0, 20.5, Some("away from season average")),
        // Nothing in the window clears 17.5.
        ("due band", &COLD_POINTS, 22.0, 17.5, Some("outside due band")),
        // 18 is under 0.95 * 19.5 while 0.3 of the window clears 19.5.
        ("season to line", &spiky, 22.0, 19.5, Some("too far below line")),
    ];

    for (label, recent, older, line_value, miss) in cases {
        let db = cold_slate(recent, older, line_value);
        let report = run(&db, &only("SCORER_OVER"));
        let stored = db.load_candidates(analysis_date()).unwrap();
        let cold = stored.iter().find(|c| c.player_id == "cold").unwrap();

        match miss {
            None => {
                assert_eq!(report.bounce_back, 1, "{label}");
                assert_eq!(cold.eligibility, EligibilityPath::BounceBack, "{label}");
                assert!(cold.is_active(), "{label}");
            }
            Some(expected) => {
                assert_eq!(report.bounce_back, 0, "{label}");
                assert!(!cold.is_active(), "{label}");
                let reason = cold.inactive_reason.as_deref().unwrap();
                assert!(reason.contains(expected), "{label}: {reason}");
            }
        }
    }
}

#[test]
fn projection_uses_resolved_opponent_history() {
    let db = seeded_db();
    run(&db, &only("REB_LEGACY"));
    let stored = db.load_candidates(analysis_date()).unwrap();
    let big = stored.iter().find(|c| c.player_id == "big").unwrap();
    let projection = big.projection.as_ref().unwrap();
    assert_eq!(projection.opponent.as_deref(), Some("NYK"));
    assert_eq!(projection.source, ProjectionSource::MatchupStrong);
    // Median 10 + 0.30 * (13 - 10), neutral pace.
    assert!((projection.matchup_adjustment - 0.9).abs() < 1e-9);
    assert_eq!(projection.pace_adjustment, 0.0);
    assert_eq!(projection.value, 11.0);
    assert_eq!(projection.edge, Some(0.5));
}

// ===========================================================================
// Properties over a full run
// ===========================================================================

#[test]
fn full_run_invariants_hold() {
    let db = seeded_db();
    let report = run(&db, &RunRequest::for_date(analysis_date()));
    let ceiling = EngineSettings::default().confidence.ceiling;

    let stored = db.load_candidates(analysis_date()).unwrap();
    assert_eq!(stored.len(), report.persisted);

    let mut keys = HashSet::new();
    for c in &stored {
        assert!(keys.insert((c.player_id.clone(), c.metric)), "duplicate {c:?}");
        assert!(c.confidence <= ceiling);
        assert!(c.state.is_terminal());
        if c.is_active() {
            assert!(c.gate_hit_rate.unwrap() >= c.required_hit_rate.unwrap());
            assert_ne!(c.role, RoleTag::StretchBig);
        }
    }

    // Active first, then by confidence.
    for pair in stored.windows(2) {
        assert!(pair[0].is_active() >= pair[1].is_active());
        if pair[0].is_active() == pair[1].is_active() {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }
    assert_eq!(report.total_analyzed, 4);
    assert_eq!(report.failed_batches, 0);
}

#[test]
fn rerun_supersedes_previous_candidates() {
    let db = seeded_db();
    run(&db, &RunRequest::for_date(analysis_date()));
    let before = db.load_candidates(analysis_date()).unwrap().len();
    assert!(before > 1);

    let report = run(&db, &only("SCORER_OVER"));
    let after = db.load_candidates(analysis_date()).unwrap();
    assert_eq!(after.len(), report.persisted);
    assert!(after.iter().all(|c| c.category == "SCORER_OVER"));
}

#[test]
fn min_hit_rate_override_drops_marginal_thresholds() {
    let db = seeded_db();
    let request = RunRequest {
        min_hit_rate: Some(0.7),
        ..only("REB_OPTIMAL")
    };
    let report = run(&db, &request);
    // 0.6 at 9.5 no longer qualifies for any rebounder in range.
    assert_eq!(report.dropped_below_threshold, 2);
    assert!(report.picks.is_empty());
}

#[test]
fn empty_store_produces_empty_report() {
    let db = Database::open(":memory:").unwrap();
    let report = run(&db, &RunRequest::for_date(analysis_date()));
    assert_eq!(report.total_analyzed, 0);
    assert_eq!(report.persisted, 0);
    assert!(report.picks.is_empty());
    assert!(report.fetch_errors.is_empty());
}
