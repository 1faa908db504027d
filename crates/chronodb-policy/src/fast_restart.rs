use std::sync::Arc;

use chronodb_core::metrics::FAST_RESTARTS;
use chronodb_core::{CoreError, CoreResult, Job, JobStatStore, JobType};

/// Reschedules a job to run again right away.
pub struct FastRestart {
    job_stats: Arc<dyn JobStatStore>,
}

impl FastRestart {
    pub fn new(job_stats: Arc<dyn JobStatStore>) -> Self {
        Self { job_stats }
    }

    /// Moves the job's next start back to the start of its current run,
    /// which the scheduler treats as already due.
    pub async fn request(&self, job: &Job, job_type: JobType) -> CoreResult<()> {
        let stat = self
            .job_stats
            .find_job_stat(job.id)
            .await?
            .ok_or_else(|| CoreError::not_found("job stat", job.id.to_string()))?;

        self.job_stats.set_next_start(job.id, stat.last_start).await?;

        FAST_RESTARTS.with_label_values(&[job_type.as_str()]).inc();
        tracing::info!(
            job_id = %job.id,
            next_start = %stat.last_start.to_rfc3339(),
            "the {} job is scheduled to run again immediately",
            job_type.display_name()
        );
        Ok(())
    }
}
