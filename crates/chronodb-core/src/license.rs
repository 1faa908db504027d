//! License entitlement records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Edition a license grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseEdition {
    /// Open-source features only.
    ApacheOnly,
    /// Community features.
    Community,
    /// Enterprise features, possibly time limited.
    Enterprise,
}

/// The license currently installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseInfo {
    pub edition: LicenseEdition,
    /// `None` for licenses that never expire.
    pub expires_at: Option<DateTime<Utc>>,
}

impl LicenseInfo {
    #[must_use]
    pub fn enterprise(expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            edition: LicenseEdition::Enterprise,
            expires_at,
        }
    }

    #[must_use]
    pub fn community() -> Self {
        Self {
            edition: LicenseEdition::Community,
            expires_at: None,
        }
    }

    /// Whether the license has passed its end time at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(end) if end <= now)
    }

    /// Whether enterprise features may run at `now`.
    #[must_use]
    pub fn enterprise_enabled_at(&self, now: DateTime<Utc>) -> bool {
        self.edition == LicenseEdition::Enterprise && !self.is_expired_at(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn expired_enterprise_license_is_not_enabled() {
        let now = Utc::now();
        let license = LicenseInfo::enterprise(Some(now - Duration::days(1)));
        assert!(license.is_expired_at(now));
        assert!(!license.enterprise_enabled_at(now));
    }

    #[test]
    fn perpetual_enterprise_license_is_enabled() {
        let license = LicenseInfo::enterprise(None);
        assert!(license.enterprise_enabled_at(Utc::now()));
        assert!(!LicenseInfo::community().enterprise_enabled_at(Utc::now()));
    }
}
