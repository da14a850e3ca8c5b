// Command implementations behind the CLI: feed import and cached runs.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::ValueEnum;
use sweetspot_core::db::Database;
use sweetspot_core::ingest;
use sweetspot_engine::{CategoryRuleSet, EngineSettings, Pipeline, RunReport, RunRequest};
use tracing::{debug, info, warn};

/// Upstream feeds that can be loaded from CSV.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Feed {
    Performance,
    Roles,
    Matchups,
    Environments,
    Lines,
}

/// Parse one CSV feed and load it into the store. Returns the number of
/// records written.
pub fn import_feed(db: &Database, feed: Feed, path: &Path) -> Result<usize> {
    let written = match feed {
        Feed::Performance => {
            let rows = ingest::load_performance(path)?;
            db.import_performance(&rows)?
        }
        Feed::Roles => {
            let rows = ingest::load_roles(path)?;
            db.import_roles(&rows)?
        }
        Feed::Matchups => {
            let rows = ingest::load_matchups(path)?;
            db.import_matchups(&rows)?
        }
        Feed::Environments => {
            let rows = ingest::load_environments(path)?;
            db.import_environments(&rows)?
        }
        Feed::Lines => {
            let rows = ingest::load_lines(path)?;
            db.import_lines(&rows)?
        }
    };
    info!(?feed, path = %path.display(), written, "feed imported");
    Ok(written)
}

pub fn cache_key(analysis_date: NaiveDate) -> String {
    format!("report:{analysis_date}")
}

/// Serve the cached report for the request's date when it was produced with
/// the same filters, otherwise run the pipeline and cache the new report.
pub fn run_cached(
    db: &Database,
    rules: &CategoryRuleSet,
    settings: &EngineSettings,
    request: &RunRequest,
) -> Result<RunReport> {
    let key = cache_key(request.analysis_date);

    if !request.force_refresh {
        if let Some(value) = db.load_state(&key)? {
            match serde_json::from_value::<RunReport>(value) {
                Ok(mut report) if report.request.same_filters(request) => {
                    info!(date = %request.analysis_date, "serving cached report");
                    report.cached = true;
                    return Ok(report);
                }
                Ok(_) => debug!("cached report was built with different filters"),
                Err(e) => warn!("ignoring unreadable cached report: {e}"),
            }
        }
    }

    let pipeline = Pipeline { rules, settings };
    let report = pipeline
        .run(db, db, request)
        .context("sweet-spot run failed")?;
    let value = serde_json::to_value(&report).context("failed to serialize run report")?;
    db.save_state(&key, &value)?;
    Ok(report)
}
