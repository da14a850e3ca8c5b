// Configuration loading and parsing (sweetspot.toml, categories.toml).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use sweetspot_engine::categories::{CategoryRuleSet, RuleSetError};
use sweetspot_engine::settings::EngineSettings;
use thiserror::Error;
use tracing::info;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    /// Resolved SQLite path.
    pub db_path: PathBuf,
    pub engine: EngineSettings,
    pub rules: CategoryRuleSet,
}

// ---------------------------------------------------------------------------
// sweetspot.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for sweetspot.toml. Engine sections sit at the
/// top level next to `[store]`.
#[derive(Debug, Clone, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    store: StoreSection,
    #[serde(flatten)]
    engine: EngineSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct StoreSection {
    #[serde(default)]
    path: String,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/sweetspot.toml` and `config/categories.toml`
/// relative to `base_dir`. Does not copy defaults; prefer `load_config()`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- sweetspot.toml (required) ---
    let settings_path = config_dir.join("sweetspot.toml");
    let settings_text = read_file(&settings_path)?;
    let settings: SettingsFile =
        toml::from_str(&settings_text).map_err(|e| ConfigError::ParseError {
            path: settings_path.clone(),
            source: e,
        })?;

    // --- categories.toml (required) ---
    let categories_path = config_dir.join("categories.toml");
    let categories_text = read_file(&categories_path)?;
    let rules = CategoryRuleSet::from_toml_str(&categories_text).map_err(|e| match e {
        RuleSetError::Parse(source) => ConfigError::ParseError {
            path: categories_path.clone(),
            source,
        },
        RuleSetError::Invalid {
            category,
            field,
            message,
        } => ConfigError::ValidationError {
            field: format!("categories.{category}.{field}"),
            message,
        },
        RuleSetError::UnknownCategory(name) => ConfigError::ValidationError {
            field: "categories".into(),
            message: format!("unknown category `{name}`"),
        },
    })?;

    validate(&settings.engine)?;

    let config = Config {
        db_path: resolve_db_path(base_dir, &settings.store.path)?,
        engine: settings.engine,
        rules,
    };
    Ok(config)
}

/// Seed `config/` from the shipped `defaults/`. Returns the files written,
/// in name order. `.example` files are skipped and existing config files are
/// never touched.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    match (defaults_dir.is_dir(), config_dir.is_dir()) {
        (true, _) => {}
        (false, true) => return Ok(Vec::new()),
        (false, false) => {
            return Err(copy_error(format!(
                "no defaults/ or config/ under {}; run sweetspot from the project root",
                base_dir.display()
            )))
        }
    }

    std::fs::create_dir_all(&config_dir)
        .map_err(|e| copy_error(format!("cannot create {}: {e}", config_dir.display())))?;

    let mut seeded = Vec::new();
    for source in shipped_defaults(&defaults_dir)? {
        let Some(name) = source.file_name() else {
            continue;
        };
        let target = config_dir.join(name);
        if seed_file(&source, &target)? {
            info!("seeded {} from defaults", target.display());
            seeded.push(target);
        }
    }
    Ok(seeded)
}

/// Regular files under `defaults/` that should land in `config/`.
fn shipped_defaults(defaults_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let listing = std::fs::read_dir(defaults_dir)
        .map_err(|e| copy_error(format!("cannot list {}: {e}", defaults_dir.display())))?;

    let mut files = Vec::new();
    for entry in listing {
        let path = entry
            .map_err(|e| copy_error(format!("cannot list {}: {e}", defaults_dir.display())))?
            .path();
        let is_example = path.extension().is_some_and(|ext| ext == "example");
        if path.is_file() && !is_example {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Copy `source` to `target` unless `target` already exists. Returns whether
/// anything was written.
fn seed_file(source: &Path, target: &Path) -> Result<bool, ConfigError> {
    let mut dest = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
    {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(copy_error(format!("cannot create {}: {e}", target.display()))),
    };
    let mut src = std::fs::File::open(source)
        .map_err(|e| copy_error(format!("cannot read {}: {e}", source.display())))?;
    std::io::copy(&mut src, &mut dest)
        .map_err(|e| copy_error(format!("cannot write {}: {e}", target.display())))?;
    Ok(true)
}

fn copy_error(message: String) -> ConfigError {
    ConfigError::DefaultsCopyError { message }
}

/// Load config relative to the current working directory, copying defaults
/// first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

/// Empty means the platform data directory; relative paths are taken from
/// `base_dir`.
fn resolve_db_path(base_dir: &Path, raw: &str) -> Result<PathBuf, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() {
        let dirs = directories::ProjectDirs::from("", "", "sweetspot").ok_or_else(|| {
            ConfigError::ValidationError {
                field: "store.path".into(),
                message: "empty and no home directory to fall back to".into(),
            }
        })?;
        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir).map_err(|e| ConfigError::ValidationError {
            field: "store.path".into(),
            message: format!("failed to create {}: {e}", data_dir.display()),
        })?;
        return Ok(data_dir.join("sweetspot.db"));
    }
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(base_dir.join(path))
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn unit_interval(field: &str, value: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigError::ValidationError {
            field: field.into(),
            message: format!("must be between 0.0 and 1.0 inclusive, got {value}"),
        });
    }
    Ok(())
}

fn validate(engine: &EngineSettings) -> Result<(), ConfigError> {
    // Window
    let w = &engine.window;
    if w.min_size == 0 {
        return Err(ConfigError::ValidationError {
            field: "window.min_size".into(),
            message: "must be > 0".into(),
        });
    }
    if w.target_size < w.min_size {
        return Err(ConfigError::ValidationError {
            field: "window.target_size".into(),
            message: format!("must be >= window.min_size ({}), got {}", w.min_size, w.target_size),
        });
    }
    if w.lookback_days == 0 {
        return Err(ConfigError::ValidationError {
            field: "window.lookback_days".into(),
            message: "must be > 0".into(),
        });
    }
    if w.season_lookback_days < w.lookback_days {
        return Err(ConfigError::ValidationError {
            field: "window.season_lookback_days".into(),
            message: format!(
                "must be >= window.lookback_days ({}), got {}",
                w.lookback_days, w.season_lookback_days
            ),
        });
    }
    if w.min_minutes < 0.0 {
        return Err(ConfigError::ValidationError {
            field: "window.min_minutes".into(),
            message: format!("must be >= 0, got {}", w.min_minutes),
        });
    }

    // Projection
    let p = &engine.projection;
    unit_interval("projection.matchup_weight", p.matchup_weight)?;
    unit_interval("projection.pace_weight", p.pace_weight)?;
    if p.strong_matchup_games < p.min_matchup_games {
        return Err(ConfigError::ValidationError {
            field: "projection.strong_matchup_games".into(),
            message: "must be >= projection.min_matchup_games".into(),
        });
    }

    // Confidence
    let c = &engine.confidence;
    unit_interval("confidence.hit_rate_weight", c.hit_rate_weight)?;
    unit_interval("confidence.consistency_weight", c.consistency_weight)?;
    unit_interval("confidence.ceiling", c.ceiling)?;
    unit_interval("confidence.partial_window_discount", c.partial_window_discount)?;
    if (c.hit_rate_weight + c.consistency_weight - 1.0).abs() > 1e-6 {
        return Err(ConfigError::ValidationError {
            field: "confidence.consistency_weight".into(),
            message: "hit_rate_weight and consistency_weight must sum to 1.0".into(),
        });
    }

    // Reconcile bands must be ordered
    let o = &engine.reconcile.optimal;
    unit_interval("reconcile.optimal.low_at", o.low_at)?;
    unit_interval("reconcile.optimal.medium_at", o.medium_at)?;
    if o.medium_at > o.low_at {
        return Err(ConfigError::ValidationError {
            field: "reconcile.optimal.medium_at".into(),
            message: "must be <= reconcile.optimal.low_at".into(),
        });
    }
    let l = &engine.reconcile.legacy;
    unit_interval("reconcile.legacy.medium_at", l.medium_at)?;
    unit_interval("reconcile.legacy.high_at", l.high_at)?;
    unit_interval("reconcile.legacy.extreme_floor", l.extreme_floor)?;
    if !(l.extreme_floor <= l.high_at && l.high_at <= l.medium_at) {
        return Err(ConfigError::ValidationError {
            field: "reconcile.legacy".into(),
            message: "bands must satisfy extreme_floor <= high_at <= medium_at".into(),
        });
    }

    // Bounce-back
    let b = &engine.bounce_back;
    let positive: &[(&str, f64)] = &[
        ("bounce_back.min_gap", b.min_gap),
        ("bounce_back.min_zscore", b.min_zscore),
        ("bounce_back.max_line_gap", b.max_line_gap),
        ("bounce_back.season_to_line_ratio", b.season_to_line_ratio),
    ];
    for (name, val) in positive {
        if *val <= 0.0 {
            return Err(ConfigError::ValidationError {
                field: name.to_string(),
                message: format!("must be > 0, got {val}"),
            });
        }
    }
    unit_interval("bounce_back.due_band_low", b.due_band_low)?;
    unit_interval("bounce_back.due_band_high", b.due_band_high)?;
    if b.due_band_low > b.due_band_high {
        return Err(ConfigError::ValidationError {
            field: "bounce_back.due_band_low".into(),
            message: "must be <= bounce_back.due_band_high".into(),
        });
    }

    if engine.persist.batch_size == 0 {
        return Err(ConfigError::ValidationError {
            field: "persist.batch_size".into(),
            message: "must be > 0".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Workspace root holding `defaults/` (cargo runs tests from the crate
    /// directory).
    fn project_root() -> PathBuf {
        let cwd = std::env::current_dir().unwrap();
        cwd.ancestors()
            .find(|dir| dir.join("defaults/categories.toml").exists())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| panic!("Cannot locate defaults/ directory from CWD {:?}", cwd))
    }

    /// Fresh temp dir with the shipped defaults copied into `config/`.
    fn scratch(name: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(format!("sweetspot_config_{name}"));
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        let root = project_root();
        for file in ["sweetspot.toml", "categories.toml"] {
            fs::copy(root.join("defaults").join(file), tmp.join("config").join(file)).unwrap();
        }
        tmp
    }

    #[test]
    fn load_valid_config_from_defaults() {
        let tmp = scratch("valid");
        let config = load_config_from(&tmp).expect("should load valid config");

        assert_eq!(config.db_path, tmp.join("sweetspot.db"));
        assert_eq!(config.engine, EngineSettings::default());
        assert!(config.rules.get("BIG_REBOUNDER_OVER").is_some());
        assert!(config.rules.iter().any(|c| c.supports_reversion));

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_categories_file_is_reported() {
        let tmp = scratch("missing_categories");
        fs::remove_file(tmp.join("config/categories.toml")).unwrap();
        let err = load_config_from(&tmp).unwrap_err();
        match err {
            ConfigError::FileNotFound { path } => assert!(path.ends_with("categories.toml")),
            other => panic!("expected FileNotFound, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn invalid_setting_names_the_field() {
        let tmp = scratch("bad_ceiling");
        fs::write(
            tmp.join("config/sweetspot.toml"),
            "[confidence]\nceiling = 1.5\n",
        )
        .unwrap();
        let err = load_config_from(&tmp).unwrap_err();
        match err {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, "confidence.ceiling"),
            other => panic!("expected ValidationError, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn invalid_category_names_category_and_field() {
        let tmp = scratch("bad_category");
        fs::write(
            tmp.join("config/categories.toml"),
            r#"
version = "1"
[[category]]
name = "EMPTY"
metric = "points"
avg_range = [10.0, 20.0]
thresholds = []
direction = "over"
min_hit_rate = 0.6
"#,
        )
        .unwrap();
        let err = load_config_from(&tmp).unwrap_err();
        match err {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "categories.EMPTY.thresholds")
            }
            other => panic!("expected ValidationError, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let tmp = scratch("malformed");
        fs::write(tmp.join("config/sweetspot.toml"), "[window\nlookback_days = 3").unwrap();
        assert!(matches!(
            load_config_from(&tmp),
            Err(ConfigError::ParseError { .. })
        ));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_copies_missing_and_keeps_existing() {
        let tmp = std::env::temp_dir().join("sweetspot_config_ensure");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("defaults")).unwrap();
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("defaults/sweetspot.toml"), "# default").unwrap();
        fs::write(tmp.join("defaults/categories.toml"), "# default").unwrap();
        fs::write(tmp.join("defaults/secrets.toml.example"), "# template").unwrap();
        fs::write(tmp.join("config/sweetspot.toml"), "# edited").unwrap();

        let copied = ensure_config_files(&tmp).unwrap();
        assert_eq!(copied, vec![tmp.join("config/categories.toml")]);
        assert_eq!(
            fs::read_to_string(tmp.join("config/sweetspot.toml")).unwrap(),
            "# edited"
        );
        assert!(!tmp.join("config/secrets.toml.example").exists());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_seeds_fresh_config_dir_in_name_order() {
        let tmp = std::env::temp_dir().join("sweetspot_config_seed_fresh");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("defaults/nested")).unwrap();
        fs::write(tmp.join("defaults/sweetspot.toml"), "[store]\npath = \"\"\n").unwrap();
        fs::write(tmp.join("defaults/categories.toml"), "version = \"x\"\n").unwrap();

        let copied = ensure_config_files(&tmp).unwrap();
        assert_eq!(
            copied,
            vec![tmp.join("config/categories.toml"), tmp.join("config/sweetspot.toml")]
        );
        assert_eq!(
            fs::read_to_string(tmp.join("config/sweetspot.toml")).unwrap(),
            "[store]\npath = \"\"\n"
        );
        assert!(!tmp.join("config/nested").exists());

        // Second call has nothing left to seed.
        assert!(ensure_config_files(&tmp).unwrap().is_empty());

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_errors_without_either_directory() {
        let tmp = std::env::temp_dir().join("sweetspot_config_nothing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();
        assert!(matches!(
            ensure_config_files(&tmp),
            Err(ConfigError::DefaultsCopyError { .. })
        ));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn absolute_store_path_is_kept() {
        let base = Path::new("/srv/sweetspot");
        assert_eq!(
            resolve_db_path(base, "/var/lib/sweetspot.db").unwrap(),
            PathBuf::from("/var/lib/sweetspot.db")
        );
        assert_eq!(
            resolve_db_path(base, "data/s.db").unwrap(),
            base.join("data/s.db")
        );
    }
}
