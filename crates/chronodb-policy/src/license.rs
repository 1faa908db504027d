use std::sync::Arc;

use chrono::Duration;
use chronodb_core::config::LicenseConfig;
use chronodb_core::{Clock, CoreError, CoreResult, JobType, LicenseEdition, LicenseProvider};

/// Entitlement checks applied before gated policy work runs.
pub struct LicenseGate {
    provider: Arc<dyn LicenseProvider>,
    clock: Arc<dyn Clock>,
    warning_window: Duration,
}

impl LicenseGate {
    pub fn new(
        provider: Arc<dyn LicenseProvider>,
        clock: Arc<dyn Clock>,
        config: &LicenseConfig,
    ) -> Self {
        Self {
            provider,
            clock,
            warning_window: Duration::days(config.expiration_warning_days),
        }
    }

    /// Whether running `job_type` needs an enterprise entitlement.
    #[must_use]
    pub fn requires_license(&self, job_type: JobType) -> bool {
        match job_type {
            JobType::Reorder | JobType::DropChunks => true,
            JobType::ContinuousAggregate => false,
        }
    }

    /// Fails unless an unexpired enterprise license is installed.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::LicenseRequired` otherwise.
    pub fn enforce_enterprise_enabled(&self) -> CoreResult<()> {
        let license = self.provider.current_license();
        if license.enterprise_enabled_at(self.clock.now()) {
            return Ok(());
        }

        tracing::debug!(edition = ?license.edition, "enterprise license check failed");
        Err(CoreError::license_required(
            "this functionality requires an active enterprise license",
        ))
    }

    /// Logs a warning when the enterprise license has expired or is about to.
    ///
    /// Returns whether a warning was emitted.
    pub fn print_expiration_warning_if_needed(&self) -> bool {
        let license = self.provider.current_license();
        let Some(expires_at) = license.expires_at else {
            return false;
        };
        if license.edition != LicenseEdition::Enterprise {
            return false;
        }

        let now = self.clock.now();
        if expires_at <= now {
            tracing::warn!(
                expired_at = %expires_at.to_rfc3339(),
                "enterprise license expired; enterprise features are disabled"
            );
            true
        } else if expires_at - now <= self.warning_window {
            tracing::warn!(
                expires_at = %expires_at.to_rfc3339(),
                days_left = (expires_at - now).num_days(),
                "enterprise license will expire soon"
            );
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use chronodb_core::LicenseInfo;

    struct FixedLicense(LicenseInfo);

    impl LicenseProvider for FixedLicense {
        fn current_license(&self) -> LicenseInfo {
            self.0.clone()
        }
    }

    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.0
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 7, 1, 0, 0, 0).unwrap()
    }

    fn gate(license: LicenseInfo) -> LicenseGate {
        LicenseGate::new(
            Arc::new(FixedLicense(license)),
            Arc::new(FixedClock(now())),
            &LicenseConfig::default(),
        )
    }

    #[test]
    fn only_chunk_policies_need_enterprise() {
        let gate = gate(LicenseInfo::community());
        assert!(gate.requires_license(JobType::Reorder));
        assert!(gate.requires_license(JobType::DropChunks));
        assert!(!gate.requires_license(JobType::ContinuousAggregate));
    }

    #[test]
    fn community_license_is_rejected() {
        let err = gate(LicenseInfo::community())
            .enforce_enterprise_enabled()
            .unwrap_err();
        assert_eq!(err.code(), "license_required");
    }

    #[test]
    fn expired_enterprise_license_is_rejected() {
        let gate = gate(LicenseInfo::enterprise(Some(now() - Duration::hours(1))));
        assert!(gate.enforce_enterprise_enabled().is_err());
        assert!(gate.print_expiration_warning_if_needed());
    }

    #[test]
    fn warning_window_follows_config() {
        assert!(gate(LicenseInfo::enterprise(Some(now() + Duration::days(3))))
            .print_expiration_warning_if_needed());
        assert!(!gate(LicenseInfo::enterprise(Some(now() + Duration::days(30))))
            .print_expiration_warning_if_needed());
        assert!(!gate(LicenseInfo::enterprise(None)).print_expiration_warning_if_needed());

        let gate = gate(LicenseInfo::enterprise(Some(now() + Duration::days(3))));
        assert!(gate.enforce_enterprise_enabled().is_ok());
    }
}
