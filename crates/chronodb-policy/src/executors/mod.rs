//! Executors for the policy job types.

mod drop_chunks;
mod materialize;
mod reorder;

pub use drop_chunks::{retention_cutoff, DropChunksExecutor};
pub use materialize::MaterializeExecutor;
pub use reorder::ReorderExecutor;

use async_trait::async_trait;
use chronodb_core::{CoreResult, Job, JobType, TransactionControl};

use crate::outcome::PolicyOutcome;
use crate::transaction::SnapshotMode;

/// Runs one policy job type.
///
/// The dispatcher enters the transaction scope before calling
/// [`execute`](Self::execute) and settles it afterwards. Executors never
/// write the job's schedule; a [`PolicyOutcome::NeedsImmediateRerun`] is
/// acted on by the dispatcher inside the same scope.
#[async_trait]
pub trait PolicyExecutor: Send + Sync {
    /// Job type this executor handles.
    fn job_type(&self) -> JobType;

    /// Snapshot pinned when the scope opens its own transaction.
    fn snapshot_mode(&self) -> SnapshotMode {
        SnapshotMode::None
    }

    /// `session` is the one the scope was entered on.
    async fn execute(&self, job: &Job, session: &dyn TransactionControl)
        -> CoreResult<PolicyOutcome>;
}
