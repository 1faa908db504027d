//! Callers of administrative operations.

use serde::{Deserialize, Serialize};

/// Role on whose behalf an administrative call runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub name: String,
    pub superuser: bool,
    /// Roles this principal is a member of.
    #[serde(default)]
    pub member_of: Vec<String>,
}

impl Principal {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            superuser: false,
            member_of: Vec::new(),
        }
    }

    #[must_use]
    pub fn superuser(name: impl Into<String>) -> Self {
        Self {
            superuser: true,
            ..Self::new(name)
        }
    }

    /// Grants membership in `role`.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.member_of.push(role.into());
        self
    }

    /// Whether this principal holds the privileges of `role`.
    #[must_use]
    pub fn has_privileges_of(&self, role: &str) -> bool {
        self.superuser || self.name == role || self.member_of.iter().any(|r| r == role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privileges_follow_ownership_and_membership() {
        assert!(Principal::new("alice").has_privileges_of("alice"));
        assert!(!Principal::new("bob").has_privileges_of("alice"));
        assert!(Principal::new("bob")
            .with_role("alice")
            .has_privileges_of("alice"));
        assert!(Principal::superuser("postgres").has_privileges_of("alice"));
    }
}
