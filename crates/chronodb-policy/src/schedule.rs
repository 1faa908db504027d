use std::sync::Arc;

use chronodb_core::{
    AlteredSchedule, CoreError, CoreResult, JobCatalog, JobId, Principal, ScheduleUpdate,
    TransactionControl,
};

use crate::license::LicenseGate;
use crate::transaction::{SnapshotMode, TransactionScope};

/// Administrative changes to a policy job's schedule.
pub struct ScheduleService {
    session: Arc<dyn TransactionControl>,
    jobs: Arc<dyn JobCatalog>,
    license: Arc<LicenseGate>,
}

impl ScheduleService {
    pub fn new(
        session: Arc<dyn TransactionControl>,
        jobs: Arc<dyn JobCatalog>,
        license: Arc<LicenseGate>,
    ) -> Self {
        Self {
            session,
            jobs,
            license,
        }
    }

    /// Overwrites the supplied schedule fields of job `job_id`.
    ///
    /// Returns `Ok(None)` when the job does not exist and `if_exists` is set.
    ///
    /// # Errors
    ///
    /// - `LicenseRequired` without an active enterprise license, whatever the job type
    /// - `NotFound` for a missing job when `if_exists` is not set
    /// - `InsufficientPrivilege` unless `principal` holds the owner's privileges
    /// - `ValidationError` for negative durations or `max_retries < -1`
    pub async fn alter_job_schedule(
        &self,
        principal: &Principal,
        job_id: JobId,
        update: ScheduleUpdate,
        if_exists: bool,
    ) -> CoreResult<Option<AlteredSchedule>> {
        self.license.enforce_enterprise_enabled()?;
        self.license.print_expiration_warning_if_needed();
        update.validate()?;

        let scope = TransactionScope::enter(&*self.session, SnapshotMode::None).await?;
        let result = self.alter(principal, job_id, &update, if_exists).await;
        scope.finish(result).await
    }

    async fn alter(
        &self,
        principal: &Principal,
        job_id: JobId,
        update: &ScheduleUpdate,
        if_exists: bool,
    ) -> CoreResult<Option<AlteredSchedule>> {
        let Some(mut job) = self.jobs.find_job(job_id).await? else {
            if if_exists {
                tracing::info!(
                    job_id = %job_id,
                    "cannot alter policy schedule, policy #{job_id} not found, skipping"
                );
                return Ok(None);
            }
            return Err(CoreError::not_found("policy", job_id.to_string()));
        };

        if !principal.has_privileges_of(&job.owner) {
            return Err(CoreError::insufficient_privilege(format!(
                "insufficient permissions to alter job {job_id}: must be a member of the owner role \"{}\"",
                job.owner
            )));
        }

        if update.is_empty() {
            tracing::debug!(job_id = %job_id, "no schedule fields supplied, nothing to alter");
            return Ok(Some(AlteredSchedule::from(&job)));
        }

        update.apply(&mut job);
        self.jobs.update_job(&job).await?;

        tracing::info!(
            job_id = %job_id,
            principal = %principal.name,
            "altered policy schedule"
        );
        Ok(Some(AlteredSchedule::from(&job)))
    }
}
