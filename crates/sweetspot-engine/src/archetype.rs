// Archetype classifier: player -> role lookup and category role checks.

use std::collections::HashMap;

use sweetspot_core::model::{RoleAssignment, RoleTag};

use crate::categories::Category;

/// Result of checking a player's role against a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleCheck {
    Pass,
    /// Passed only because the role is unassigned.
    Caution(String),
    Fail(String),
}

impl RoleCheck {
    pub fn passed(&self) -> bool {
        !matches!(self, RoleCheck::Fail(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ArchetypeClassifier {
    roles: HashMap<String, RoleTag>,
}

impl ArchetypeClassifier {
    pub fn new(assignments: &[RoleAssignment]) -> Self {
        let roles = assignments
            .iter()
            .map(|a| (a.player_id.clone(), a.role))
            .collect();
        Self { roles }
    }

    pub fn role_of(&self, player_id: &str) -> RoleTag {
        self.roles.get(player_id).copied().unwrap_or(RoleTag::Unknown)
    }

    /// Blocked roles fail immediately. With a required set, the role must be
    /// in it; an unknown role passes with a caution.
    pub fn validate(&self, player_id: &str, category: &Category) -> RoleCheck {
        let role = self.role_of(player_id);
        if category.blocked_roles.contains(&role) {
            return RoleCheck::Fail(format!("role {role} is blocked for {}", category.name));
        }
        if category.required_roles.is_empty() || category.required_roles.contains(&role) {
            return RoleCheck::Pass;
        }
        if role == RoleTag::Unknown {
            return RoleCheck::Caution(format!(
                "role unknown; {} expects one of {}",
                category.name,
                category
                    .required_roles
                    .iter()
                    .map(RoleTag::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        RoleCheck::Fail(format!("role {role} not eligible for {}", category.name))
    }
}
