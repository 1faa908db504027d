use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chronodb_core::metrics::POLICY_CHUNKS_PROCESSED;
use chronodb_core::{
    CoreError, CoreResult, DropChunks, IntegerNow, Job, JobType, PartitionType, RetentionWindow,
    TimeCutoff, TransactionControl,
};

use super::PolicyExecutor;
use crate::context::PolicyContext;
use crate::outcome::PolicyOutcome;
use crate::transaction::SnapshotMode;

/// Drops chunks that fall entirely outside a retention window.
pub struct DropChunksExecutor {
    ctx: PolicyContext,
    drop_chunks: Arc<dyn DropChunks>,
    integer_now: Arc<dyn IntegerNow>,
}

impl DropChunksExecutor {
    pub fn new(
        ctx: PolicyContext,
        drop_chunks: Arc<dyn DropChunks>,
        integer_now: Arc<dyn IntegerNow>,
    ) -> Self {
        Self {
            ctx,
            drop_chunks,
            integer_now,
        }
    }

    async fn drop_old_chunks(&self, job: &Job) -> CoreResult<PolicyOutcome> {
        let job_id = job.id;
        let policy = self
            .ctx
            .policies
            .find_drop_chunks_policy(job_id)
            .await?
            .ok_or_else(|| {
                CoreError::internal(format!(
                    "could not run drop_chunks policy #{job_id} because no args in policy table"
                ))
            })?;

        let hypertable = self
            .ctx
            .hypertables
            .get_hypertable(policy.hypertable_id)
            .await?
            .ok_or_else(|| {
                CoreError::hypertable_not_found(format!(
                    "could not run drop_chunks policy #{job_id} because hypertable #{} no longer exists",
                    policy.hypertable_id
                ))
            })?;
        let open_dimension = hypertable.open_dimension(0).ok_or_else(|| {
            CoreError::hypertable_not_found(format!(
                "could not run drop_chunks policy #{job_id} because \"{}\" is not a hypertable",
                hypertable.qualified_name()
            ))
        })?;
        let partition_type = open_dimension.column_type;

        let integer_now = match policy.older_than {
            RetentionWindow::Integer(_) if partition_type.is_integer() => {
                self.integer_now
                    .integer_now(&hypertable, open_dimension)
                    .await?
            }
            _ => None,
        };

        let cutoff = retention_cutoff(
            policy.older_than,
            partition_type,
            self.ctx.clock.now(),
            integer_now,
        )?;

        let dropped = self
            .drop_chunks
            .drop_chunks(&hypertable, cutoff, partition_type, policy.cascade_options())
            .await?;

        POLICY_CHUNKS_PROCESSED
            .with_label_values(&["drop_chunks"])
            .inc_by(dropped.len() as u64);
        tracing::info!(
            job_id = %job_id,
            hypertable = %hypertable.qualified_name(),
            older_than = %cutoff,
            dropped = dropped.len(),
            "completed dropping chunks"
        );
        Ok(PolicyOutcome::Completed)
    }
}

#[async_trait]
impl PolicyExecutor for DropChunksExecutor {
    fn job_type(&self) -> JobType {
        JobType::DropChunks
    }

    fn snapshot_mode(&self) -> SnapshotMode {
        SnapshotMode::PushActive
    }

    async fn execute(
        &self,
        job: &Job,
        _session: &dyn TransactionControl,
    ) -> CoreResult<PolicyOutcome> {
        self.drop_old_chunks(job).await
    }
}

/// Converts a retention window into a cutoff typed like the partitioning
/// column.
///
/// `integer_now` is the current value of an integer time column and is only
/// consulted for integer partition types. Chunks are dropped only when they
/// end at or before the cutoff, so a chunk holding any value in
/// `(integer_now - n, integer_now]` is kept.
///
/// # Errors
///
/// Returns `CoreError::ValidationError` when the window does not fit the
/// column type or the subtraction overflows, and `CoreError::InvalidState`
/// when an integer column has no current value.
pub fn retention_cutoff(
    window: RetentionWindow,
    partition_type: PartitionType,
    now: DateTime<Utc>,
    integer_now: Option<i64>,
) -> CoreResult<TimeCutoff> {
    let out_of_range = || CoreError::ValidationError("older_than is out of range".to_string());

    match (window, partition_type) {
        (RetentionWindow::Integer(n), ty) if ty.is_integer() => {
            let current = integer_now.ok_or_else(|| {
                CoreError::invalid_state(format!(
                    "integer_now function must be set for a {ty} time column"
                ))
            })?;
            current
                .checked_sub(n)
                .map(TimeCutoff::Integer)
                .ok_or_else(out_of_range)
        }
        (RetentionWindow::Interval(interval), ty) if !ty.is_integer() => {
            let cutoff = now.checked_sub_signed(interval).ok_or_else(out_of_range)?;
            Ok(match ty {
                PartitionType::Date => TimeCutoff::Date(cutoff.date_naive()),
                PartitionType::Timestamp => TimeCutoff::Timestamp(cutoff.naive_utc()),
                _ => TimeCutoff::TimestampTz(cutoff),
            })
        }
        (RetentionWindow::Interval(_), ty) => Err(CoreError::ValidationError(format!(
            "older_than must be an integer for a {ty} time column"
        ))),
        (RetentionWindow::Integer(_), ty) => Err(CoreError::ValidationError(format!(
            "older_than must be an interval for a {ty} time column"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, TimeZone};
    use proptest::prelude::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 7, 10, 6, 30, 0).unwrap()
    }

    #[test]
    fn interval_cutoff_follows_column_type() {
        let window = RetentionWindow::Interval(Duration::days(7));

        assert_eq!(
            retention_cutoff(window, PartitionType::TimestampTz, now(), None).unwrap(),
            TimeCutoff::TimestampTz(Utc.with_ymd_and_hms(2019, 7, 3, 6, 30, 0).unwrap())
        );
        assert_eq!(
            retention_cutoff(window, PartitionType::Timestamp, now(), None).unwrap(),
            TimeCutoff::Timestamp(
                NaiveDate::from_ymd_opt(2019, 7, 3)
                    .unwrap()
                    .and_hms_opt(6, 30, 0)
                    .unwrap()
            )
        );
        assert_eq!(
            retention_cutoff(window, PartitionType::Date, now(), None).unwrap(),
            TimeCutoff::Date(NaiveDate::from_ymd_opt(2019, 7, 3).unwrap())
        );
    }

    #[test]
    fn integer_cutoff_subtracts_from_integer_now() {
        let cutoff = retention_cutoff(
            RetentionWindow::Integer(100),
            PartitionType::BigInt,
            now(),
            Some(1_000),
        )
        .unwrap();
        assert_eq!(cutoff, TimeCutoff::Integer(900));
    }

    #[test]
    fn missing_integer_now_is_invalid_state() {
        let err = retention_cutoff(
            RetentionWindow::Integer(100),
            PartitionType::Integer,
            now(),
            None,
        )
        .unwrap_err();
        assert_eq!(err.code(), "invalid_state");
        assert!(err.to_string().contains("integer_now function must be set"));
    }

    proptest! {
        #[test]
        fn chunks_inside_the_window_are_never_below_the_cutoff(
            current in -1_000_000i64..1_000_000,
            older_than in 0i64..10_000,
            interval in 1i64..5_000,
            offset in 0i64..10_000,
        ) {
            let cutoff = retention_cutoff(
                RetentionWindow::Integer(older_than),
                PartitionType::BigInt,
                now(),
                Some(current),
            )
            .unwrap();
            let TimeCutoff::Integer(cutoff) = cutoff else {
                panic!("integer column produced {cutoff:?}");
            };

            // A chunk holding the value `current - offset`, which lies in
            // `(current - older_than, current]` whenever `offset < older_than`.
            let value = current - offset;
            let range_start = value.div_euclid(interval) * interval;
            let range_end = range_start + interval;
            if offset < older_than {
                prop_assert!(range_end > cutoff);
            }
        }
    }

    #[test]
    fn mismatched_window_is_rejected() {
        let err = retention_cutoff(
            RetentionWindow::Interval(Duration::days(1)),
            PartitionType::Integer,
            now(),
            Some(10),
        )
        .unwrap_err();
        assert_eq!(err.code(), "validation_error");

        let err = retention_cutoff(
            RetentionWindow::Integer(10),
            PartitionType::TimestampTz,
            now(),
            None,
        )
        .unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn integer_overflow_is_rejected() {
        let err = retention_cutoff(
            RetentionWindow::Integer(i64::MAX),
            PartitionType::BigInt,
            now(),
            Some(-10),
        )
        .unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }
}
