use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CoreResult;
use crate::hypertable::{
    Chunk, ChunkIndexMapping, Dimension, DimensionSlice, Hypertable, PartitionType, TimeCutoff,
};
use crate::ids::{ChunkId, DimensionId, HypertableId, JobId, MaterializationId, SliceId};
use crate::job::{Job, JobStat};
use crate::license::LicenseInfo;
use crate::policy::{CascadeOptions, DropChunksPolicy, ReorderPolicy};

/// Catalog interface for background job rows.
#[async_trait]
pub trait JobCatalog: Send + Sync {
    /// Fetches a job by its identifier.
    async fn find_job(&self, job_id: JobId) -> CoreResult<Option<Job>>;

    /// Persists every schedule field of an existing job.
    async fn update_job(&self, job: &Job) -> CoreResult<()>;
}

/// Run statistics owned by the scheduler.
#[async_trait]
pub trait JobStatStore: Send + Sync {
    /// Fetches the run statistics of a job.
    async fn find_job_stat(&self, job_id: JobId) -> CoreResult<Option<JobStat>>;

    /// Overwrites the next scheduled start of a job.
    async fn set_next_start(&self, job_id: JobId, next_start: DateTime<Utc>) -> CoreResult<()>;
}

/// Per-job policy arguments.
#[async_trait]
pub trait PolicyCatalog: Send + Sync {
    /// Reorder policy arguments for a job.
    async fn find_reorder_policy(&self, job_id: JobId) -> CoreResult<Option<ReorderPolicy>>;

    /// Retention policy arguments for a job.
    async fn find_drop_chunks_policy(&self, job_id: JobId) -> CoreResult<Option<DropChunksPolicy>>;

    /// Continuous aggregate materialized by a job.
    async fn find_materialization_by_job(
        &self,
        job_id: JobId,
    ) -> CoreResult<Option<MaterializationId>>;
}

/// Hypertable, dimension and chunk metadata.
#[async_trait]
pub trait HypertableCatalog: Send + Sync {
    /// Fetches a hypertable with its dimensions.
    async fn get_hypertable(&self, hypertable_id: HypertableId) -> CoreResult<Option<Hypertable>>;

    /// Lists the slices of a dimension ordered by `range_start` ascending.
    async fn dimension_slices(&self, dimension_id: DimensionId) -> CoreResult<Vec<DimensionSlice>>;

    /// Lists the chunks constrained by a slice, ordered by chunk id.
    async fn chunk_ids_in_slice(&self, slice_id: SliceId) -> CoreResult<Vec<ChunkId>>;

    /// Fetches a chunk by its identifier.
    async fn get_chunk(&self, chunk_id: ChunkId) -> CoreResult<Option<Chunk>>;

    /// Resolves the chunk-local index backing a hypertable-level index.
    async fn chunk_index_by_hypertable_index(
        &self,
        chunk_id: ChunkId,
        hypertable_index_name: &str,
    ) -> CoreResult<Option<ChunkIndexMapping>>;
}

/// History of which chunks each job has processed.
#[async_trait]
pub trait ChunkStatsStore: Send + Sync {
    /// Whether `job_id` has already run against `chunk_id`.
    async fn has_job_run(&self, job_id: JobId, chunk_id: ChunkId) -> CoreResult<bool>;

    /// Records a successful run of `job_id` against `chunk_id`.
    async fn record_job_run(
        &self,
        job_id: JobId,
        chunk_id: ChunkId,
        ran_at: DateTime<Utc>,
    ) -> CoreResult<()>;
}

/// Transaction control of the session the engine runs in.
#[async_trait]
pub trait TransactionControl: Send + Sync {
    /// Whether a transaction is currently open.
    async fn is_in_transaction(&self) -> bool;

    /// Opens a transaction. Fails if one is already open.
    async fn start_transaction(&self) -> CoreResult<()>;

    /// Commits the open transaction.
    async fn commit_transaction(&self) -> CoreResult<()>;

    /// Rolls back the open transaction.
    async fn abort_transaction(&self) -> CoreResult<()>;

    /// Pins a read snapshot for the rest of the transaction.
    async fn push_active_snapshot(&self) -> CoreResult<()>;

    /// Releases the snapshot pinned by [`push_active_snapshot`](Self::push_active_snapshot).
    async fn pop_active_snapshot(&self) -> CoreResult<()>;
}

/// Clusters a single chunk on one of its indexes.
#[async_trait]
pub trait ReorderChunk: Send + Sync {
    async fn reorder_chunk(
        &self,
        hypertable: &Hypertable,
        chunk: &Chunk,
        index: &ChunkIndexMapping,
    ) -> CoreResult<()>;
}

/// Removes chunks entirely older than a cutoff.
#[async_trait]
pub trait DropChunks: Send + Sync {
    /// Returns the chunks that were dropped.
    async fn drop_chunks(
        &self,
        hypertable: &Hypertable,
        older_than: TimeCutoff,
        partition_type: PartitionType,
        cascade: CascadeOptions,
    ) -> CoreResult<Vec<Chunk>>;
}

/// Current value of an integer time column.
///
/// Integer-partitioned tables have no wall clock; each one registers a
/// function that reports "now" in the column's own units.
#[async_trait]
pub trait IntegerNow: Send + Sync {
    /// Returns `None` when no such function is registered for `dimension`.
    async fn integer_now(
        &self,
        hypertable: &Hypertable,
        dimension: &Dimension,
    ) -> CoreResult<Option<i64>>;
}

/// Continuous aggregate materialization engine.
///
/// Implementations manage their own transactions and must be called
/// outside of one.
#[async_trait]
pub trait Materializer: Send + Sync {
    /// Returns `true` when all pending work was materialized.
    async fn materialize(&self, materialization_id: MaterializationId, verbose: bool)
        -> CoreResult<bool>;
}

/// Source of the installed license.
pub trait LicenseProvider: Send + Sync {
    fn current_license(&self) -> LicenseInfo;
}

/// Wall-clock time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
