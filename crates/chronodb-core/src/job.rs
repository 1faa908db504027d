//! Background job records as stored in the job catalog.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::ids::JobId;

/// Job types the policy engine knows how to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    /// Cluster one chunk at a time on a configured index.
    Reorder,
    /// Remove chunks older than a retention window.
    DropChunks,
    /// Materialize a continuous aggregate.
    ContinuousAggregate,
}

impl JobType {
    /// All job types, in catalog order.
    pub const ALL: [JobType; 3] = [
        JobType::Reorder,
        JobType::DropChunks,
        JobType::ContinuousAggregate,
    ];

    /// Returns the catalog tag for this type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Reorder => "reorder",
            JobType::DropChunks => "drop_chunks",
            JobType::ContinuousAggregate => "continuous_aggregate",
        }
    }

    /// Human-readable name used in log lines.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            JobType::Reorder => "reorder",
            JobType::DropChunks => "drop_chunks",
            JobType::ContinuousAggregate => "materialize continuous aggregate",
        }
    }
}

impl FromStr for JobType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reorder" => Ok(JobType::Reorder),
            "drop_chunks" => Ok(JobType::DropChunks),
            "continuous_aggregate" => Ok(JobType::ContinuousAggregate),
            other => Err(CoreError::internal(format!(
                "scheduler tried to run an invalid job type: \"{other}\""
            ))),
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A background job row.
///
/// `job_type` keeps the raw catalog tag; resolving it into a [`JobType`] is
/// the dispatcher's job so that unknown tags surface as an execution error
/// rather than a load error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub application_name: String,
    pub job_type: String,
    pub schedule_interval: Duration,
    pub max_runtime: Duration,
    /// Retries before giving up; `-1` retries forever.
    pub max_retries: i32,
    pub retry_period: Duration,
    /// Role that owns the job; checked before schedule changes.
    pub owner: String,
}

impl Job {
    /// Creates a job with the catalog defaults for its type.
    #[must_use]
    pub fn new(id: JobId, job_type: JobType, owner: impl Into<String>) -> Self {
        let (application_name, schedule_interval) = match job_type {
            JobType::Reorder => ("Reorder Background Job", Duration::days(4)),
            JobType::DropChunks => ("Drop Chunks Background Job", Duration::days(1)),
            JobType::ContinuousAggregate => {
                ("Continuous Aggregate Background Job", Duration::hours(1))
            }
        };
        Self {
            id,
            application_name: format!("{application_name} [{id}]"),
            job_type: job_type.as_str().to_string(),
            schedule_interval,
            max_runtime: Duration::zero(),
            max_retries: -1,
            retry_period: Duration::minutes(5),
            owner: owner.into(),
        }
    }

    /// Resolves the catalog tag into a known job type.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Internal` for tags the engine does not handle.
    pub fn resolve_type(&self) -> Result<JobType, CoreError> {
        self.job_type.parse()
    }
}

/// Run statistics the scheduler keeps for each job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobStat {
    pub job_id: JobId,
    pub last_start: DateTime<Utc>,
    pub last_finish: Option<DateTime<Utc>>,
    pub next_start: DateTime<Utc>,
    pub total_runs: i64,
}

/// Partial update of a job's schedule. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleUpdate {
    pub schedule_interval: Option<Duration>,
    pub max_runtime: Option<Duration>,
    pub max_retries: Option<i32>,
    pub retry_period: Option<Duration>,
}

impl ScheduleUpdate {
    /// Returns `true` when no field would change.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schedule_interval.is_none()
            && self.max_runtime.is_none()
            && self.max_retries.is_none()
            && self.retry_period.is_none()
    }

    /// Checks the supplied values before they reach the catalog.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::ValidationError` for negative durations or a retry
    /// count below `-1`.
    pub fn validate(&self) -> Result<(), CoreError> {
        let durations = [
            ("schedule_interval", self.schedule_interval),
            ("max_runtime", self.max_runtime),
            ("retry_period", self.retry_period),
        ];
        for (field, value) in durations {
            if matches!(value, Some(d) if d < Duration::zero()) {
                return Err(CoreError::ValidationError(format!(
                    "{field} must not be negative"
                )));
            }
        }
        if matches!(self.max_retries, Some(n) if n < -1) {
            return Err(CoreError::ValidationError(
                "max_retries must be -1 or greater".to_string(),
            ));
        }
        Ok(())
    }

    /// Applies the supplied fields to `job`.
    pub fn apply(&self, job: &mut Job) {
        if let Some(interval) = self.schedule_interval {
            job.schedule_interval = interval;
        }
        if let Some(runtime) = self.max_runtime {
            job.max_runtime = runtime;
        }
        if let Some(retries) = self.max_retries {
            job.max_retries = retries;
        }
        if let Some(period) = self.retry_period {
            job.retry_period = period;
        }
    }
}

/// Schedule fields returned after an alteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlteredSchedule {
    pub job_id: JobId,
    pub schedule_interval: Duration,
    pub max_runtime: Duration,
    pub max_retries: i32,
    pub retry_period: Duration,
}

impl From<&Job> for AlteredSchedule {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            schedule_interval: job.schedule_interval,
            max_runtime: job.max_runtime,
            max_retries: job.max_retries,
            retry_period: job.retry_period,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_type_round_trips_through_tag() {
        for job_type in JobType::ALL {
            assert_eq!(job_type.as_str().parse::<JobType>().unwrap(), job_type);
        }
    }

    #[test]
    fn unknown_tag_is_internal_error() {
        let err = "telemetry_and_version_check_if_enabled"
            .parse::<JobType>()
            .unwrap_err();
        assert_eq!(err.code(), "internal_error");
        assert!(err.to_string().contains("invalid job type"));
    }

    #[test]
    fn schedule_update_applies_only_supplied_fields() {
        let mut job = Job::new(JobId::new(1000), JobType::Reorder, "postgres");
        let before = job.clone();

        let update = ScheduleUpdate {
            max_retries: Some(5),
            ..Default::default()
        };
        update.apply(&mut job);

        assert_eq!(job.max_retries, 5);
        assert_eq!(job.schedule_interval, before.schedule_interval);
        assert_eq!(job.max_runtime, before.max_runtime);
        assert_eq!(job.retry_period, before.retry_period);
    }

    #[test]
    fn schedule_update_rejects_negative_values() {
        let update = ScheduleUpdate {
            retry_period: Some(Duration::seconds(-1)),
            ..Default::default()
        };
        assert!(update.validate().is_err());

        let update = ScheduleUpdate {
            max_retries: Some(-2),
            ..Default::default()
        };
        assert!(update.validate().is_err());

        let update = ScheduleUpdate {
            max_retries: Some(-1),
            ..Default::default()
        };
        assert!(update.validate().is_ok());
        assert!(ScheduleUpdate::default().is_empty());
    }
}
