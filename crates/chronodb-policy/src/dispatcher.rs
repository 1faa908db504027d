use std::collections::HashMap;
use std::sync::Arc;

use chronodb_core::metrics::{POLICY_EXECUTIONS, POLICY_EXECUTION_DURATION};
use chronodb_core::{CoreError, CoreResult, Job, JobType, TransactionControl};
use tracing::Instrument;

use crate::executors::PolicyExecutor;
use crate::fast_restart::FastRestart;
use crate::license::LicenseGate;
use crate::outcome::PolicyOutcome;
use crate::transaction::TransactionScope;

/// Entry point the scheduler calls for every policy job.
pub struct PolicyDispatcher {
    session: Arc<dyn TransactionControl>,
    license: Arc<LicenseGate>,
    fast_restart: FastRestart,
    executors: HashMap<JobType, Arc<dyn PolicyExecutor>>,
}

impl PolicyDispatcher {
    /// Creates a dispatcher routing each job type to the executor that
    /// reports it. A later executor for the same type replaces an earlier one.
    pub fn new(
        session: Arc<dyn TransactionControl>,
        license: Arc<LicenseGate>,
        fast_restart: FastRestart,
        executors: impl IntoIterator<Item = Arc<dyn PolicyExecutor>>,
    ) -> Self {
        let executors: HashMap<_, _> = executors
            .into_iter()
            .map(|executor| (executor.job_type(), executor))
            .collect();
        for job_type in JobType::ALL {
            if !executors.contains_key(&job_type) {
                tracing::warn!(
                    job_type = %job_type,
                    "no executor registered, {} jobs will fail",
                    job_type.display_name()
                );
            }
        }
        Self {
            session,
            license,
            fast_restart,
            executors,
        }
    }

    /// Runs `job` and acts on its outcome.
    ///
    /// A no-op run is a success. When the executor asks for an immediate
    /// re-run the job's next start is moved back in the executor's
    /// transaction, so a failed reschedule rolls the run back with it.
    pub async fn execute(&self, job: &Job) -> CoreResult<PolicyOutcome> {
        let span = tracing::info_span!("policy_job", job_id = %job.id, job_type = %job.job_type);
        self.execute_inner(job).instrument(span).await
    }

    async fn execute_inner(&self, job: &Job) -> CoreResult<PolicyOutcome> {
        let job_type = job.resolve_type()?;

        if self.license.requires_license(job_type) {
            self.license.enforce_enterprise_enabled()?;
        }
        self.license.print_expiration_warning_if_needed();

        let executor = self.executors.get(&job_type).ok_or_else(|| {
            CoreError::internal(format!(
                "no executor registered for job type \"{job_type}\""
            ))
        })?;

        let timer = POLICY_EXECUTION_DURATION
            .with_label_values(&[job_type.as_str()])
            .start_timer();
        let scope = TransactionScope::enter(&*self.session, executor.snapshot_mode()).await?;
        let result = self
            .execute_in_scope(executor.as_ref(), job, job_type, scope.session())
            .await;
        let result = scope.finish(result).await;
        timer.observe_duration();

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(err) => {
                POLICY_EXECUTIONS
                    .with_label_values(&[job_type.as_str(), "error"])
                    .inc();
                return Err(err);
            }
        };
        POLICY_EXECUTIONS
            .with_label_values(&[job_type.as_str(), outcome.as_str()])
            .inc();
        tracing::debug!(outcome = %outcome, "policy job finished");
        Ok(outcome)
    }

    async fn execute_in_scope(
        &self,
        executor: &dyn PolicyExecutor,
        job: &Job,
        job_type: JobType,
        session: &dyn TransactionControl,
    ) -> CoreResult<PolicyOutcome> {
        let outcome = executor.execute(job, session).await?;
        if outcome == PolicyOutcome::NeedsImmediateRerun {
            self.fast_restart.request(job, job_type).await?;
        }
        Ok(outcome)
    }

    /// Scheduler-facing wrapper: `true` when the job ran without a fatal error.
    pub async fn run(&self, job: &Job) -> bool {
        match self.execute(job).await {
            Ok(_) => true,
            Err(err) => {
                tracing::error!(
                    job_id = %job.id,
                    job_type = %job.job_type,
                    code = err.code(),
                    error = %err,
                    "policy job failed"
                );
                false
            }
        }
    }
}
