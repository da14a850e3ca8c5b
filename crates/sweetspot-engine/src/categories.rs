// Category rule set: the static, versioned table of screening categories.
//
// Loaded from `categories.toml`. A run may narrow it to one category or
// override minimum hit rates, which produces a derived copy; the loaded
// table itself is never mutated.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sweetspot_core::model::{Direction, Metric, RoleTag};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RuleSetError {
    #[error("failed to parse category rule set: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("category `{category}` field `{field}`: {message}")]
    Invalid {
        category: String,
        field: String,
        message: String,
    },

    #[error("unknown category `{0}`")]
    UnknownCategory(String),
}

fn invalid(category: &str, field: &str, message: impl Into<String>) -> RuleSetError {
    RuleSetError::Invalid {
        category: category.to_string(),
        field: field.to_string(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Acceptance policy
// ---------------------------------------------------------------------------

/// A named hit-rate floor that applies once the offered line reaches
/// `min_line`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierFloor {
    pub name: String,
    pub min_line: f64,
    pub min_hit_rate: f64,
}

/// How the live-line reconciler decides activation for a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AcceptancePolicy {
    /// Hard gate on the recalculated hit rate; the floor drops as the line
    /// rises. Lines below every floor use the category minimum.
    Tiered { floors: Vec<TierFloor> },
    /// Gate on the original window hit rate; the recalculated rate only sets
    /// the risk tier.
    Optimal,
    /// Gate on the recalculated rate. A failing big-stat pick stays active
    /// with an escalating risk tier.
    Legacy {
        #[serde(default)]
        big_stat: bool,
    },
}

impl Default for AcceptancePolicy {
    fn default() -> Self {
        AcceptancePolicy::Legacy { big_stat: false }
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub metric: Metric,
    /// Inclusive window-average range for the `RANGE` path.
    pub avg_range: (f64, f64),
    pub thresholds: Vec<f64>,
    pub direction: Direction,
    pub min_hit_rate: f64,
    /// Empty means no requirement.
    #[serde(default)]
    pub required_roles: Vec<RoleTag>,
    #[serde(default)]
    pub blocked_roles: Vec<RoleTag>,
    #[serde(default)]
    pub supports_reversion: bool,
    /// Inclusive live-line range for the `LINE_PENDING` path. Categories
    /// without one discard out-of-range players.
    #[serde(default)]
    pub line_range: Option<(f64, f64)>,
    #[serde(default)]
    pub policy: AcceptancePolicy,
}

impl Category {
    pub fn avg_in_range(&self, avg: f64) -> bool {
        avg >= self.avg_range.0 && avg <= self.avg_range.1
    }

    pub fn line_in_range(&self, line: f64) -> bool {
        self.line_range
            .is_some_and(|(lo, hi)| line >= lo && line <= hi)
    }

    /// The hit rate a tiered category requires at `line`. For other
    /// policies this is simply the category minimum.
    pub fn floor_for_line(&self, line: f64) -> f64 {
        match &self.policy {
            AcceptancePolicy::Tiered { floors } => floors
                .iter()
                .filter(|f| line >= f.min_line)
                .last()
                .map(|f| f.min_hit_rate)
                .unwrap_or(self.min_hit_rate),
            _ => self.min_hit_rate,
        }
    }

    fn validate(&self) -> Result<(), RuleSetError> {
        let name = self.name.as_str();
        if name.trim().is_empty() {
            return Err(invalid("<unnamed>", "name", "must not be empty"));
        }
        let (lo, hi) = self.avg_range;
        if !(lo.is_finite() && hi.is_finite()) || lo > hi || lo < 0.0 {
            return Err(invalid(name, "avg_range", format!("invalid range [{lo}, {hi}]")));
        }
        if self.thresholds.is_empty() {
            return Err(invalid(name, "thresholds", "must list at least one threshold"));
        }
        if let Some(t) = self.thresholds.iter().find(|t| !t.is_finite() || **t <= 0.0) {
            return Err(invalid(name, "thresholds", format!("must be > 0, got {t}")));
        }
        if !(0.0..=1.0).contains(&self.min_hit_rate) {
            return Err(invalid(
                name,
                "min_hit_rate",
                format!("must be between 0.0 and 1.0, got {}", self.min_hit_rate),
            ));
        }
        if let Some(role) = self
            .required_roles
            .iter()
            .find(|r| self.blocked_roles.contains(r))
        {
            return Err(invalid(
                name,
                "blocked_roles",
                format!("{role} is both required and blocked"),
            ));
        }
        if let Some((lo, hi)) = self.line_range {
            if !(lo.is_finite() && hi.is_finite()) || lo > hi || lo <= 0.0 {
                return Err(invalid(name, "line_range", format!("invalid range [{lo}, {hi}]")));
            }
        }
        if self.supports_reversion && self.line_range.is_none() {
            return Err(invalid(
                name,
                "line_range",
                "reversion categories need a line range to route players to LINE_PENDING",
            ));
        }
        if let AcceptancePolicy::Tiered { floors } = &self.policy {
            if floors.is_empty() {
                return Err(invalid(name, "policy.floors", "tiered policy needs at least one floor"));
            }
            for pair in floors.windows(2) {
                if pair[1].min_line <= pair[0].min_line {
                    return Err(invalid(
                        name,
                        "policy.floors",
                        "floors must be sorted by strictly increasing min_line",
                    ));
                }
                if pair[1].min_hit_rate > pair[0].min_hit_rate {
                    return Err(invalid(
                        name,
                        "policy.floors",
                        format!(
                            "floor `{}` requires more than the lower-line floor `{}`",
                            pair[1].name, pair[0].name
                        ),
                    ));
                }
            }
            if let Some(f) = floors.iter().find(|f| !(0.0..=1.0).contains(&f.min_hit_rate)) {
                return Err(invalid(
                    name,
                    "policy.floors",
                    format!("floor `{}` hit rate out of range", f.name),
                ));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Rule set
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRuleSet {
    pub version: String,
    #[serde(rename = "category", default)]
    pub categories: Vec<Category>,
}

impl CategoryRuleSet {
    /// Parse and validate a rule set from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, RuleSetError> {
        let rules: CategoryRuleSet = toml::from_str(text)?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn validate(&self) -> Result<(), RuleSetError> {
        let mut seen = HashSet::new();
        for category in &self.categories {
            category.validate()?;
            if !seen.insert(category.name.as_str()) {
                return Err(invalid(&category.name, "name", "duplicate category name"));
            }
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Category> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Derive the rule set for a single run: optionally keep one category and
    /// optionally replace every minimum hit rate, tier floors included.
    pub fn for_request(
        &self,
        only: Option<&str>,
        min_hit_rate: Option<f64>,
    ) -> Result<CategoryRuleSet, RuleSetError> {
        let mut categories: Vec<Category> = match only {
            Some(name) => {
                let category = self
                    .get(name)
                    .ok_or_else(|| RuleSetError::UnknownCategory(name.to_string()))?;
                vec![category.clone()]
            }
            None => self.categories.clone(),
        };
        if let Some(rate) = min_hit_rate {
            if !(0.0..=1.0).contains(&rate) {
                return Err(invalid(
                    "<request>",
                    "min_hit_rate",
                    format!("must be between 0.0 and 1.0, got {rate}"),
                ));
            }
            for category in &mut categories {
                category.min_hit_rate = rate;
                if let AcceptancePolicy::Tiered { floors } = &mut category.policy {
                    for floor in floors.iter_mut() {
                        floor.min_hit_rate = rate;
                    }
                }
            }
        }
        Ok(CategoryRuleSet {
            version: self.version.clone(),
            categories,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
