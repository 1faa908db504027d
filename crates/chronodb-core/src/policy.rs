//! Per-job policy arguments.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ChunkId, HypertableId, JobId};

/// Arguments of a reorder policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReorderPolicy {
    pub job_id: JobId,
    pub hypertable_id: HypertableId,
    /// Name of the hypertable-level index chunks are clustered on.
    pub hypertable_index_name: String,
}

/// Age past which chunks are dropped.
///
/// Time and date keyed hypertables use an interval; integer keyed ones use
/// a distance in the column's own units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionWindow {
    Interval(Duration),
    Integer(i64),
}

/// Arguments of a drop_chunks (retention) policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropChunksPolicy {
    pub job_id: JobId,
    pub hypertable_id: HypertableId,
    pub older_than: RetentionWindow,
    pub cascade: bool,
    pub cascade_to_materializations: bool,
}

impl DropChunksPolicy {
    #[must_use]
    pub fn cascade_options(&self) -> CascadeOptions {
        CascadeOptions {
            cascade: self.cascade,
            cascade_to_materializations: self.cascade_to_materializations,
        }
    }
}

/// What else goes when a chunk is dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeOptions {
    /// Drop objects that depend on the chunk.
    pub cascade: bool,
    /// Also drop the matching continuous aggregate materializations.
    pub cascade_to_materializations: bool,
}

/// Record of a job having processed a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkStat {
    pub job_id: JobId,
    pub chunk_id: ChunkId,
    pub num_times_job_run: i32,
    pub last_time_job_run: DateTime<Utc>,
}
