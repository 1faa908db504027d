//! Core domain types and traits for the ChronoDB background policy engine.

pub mod config;
pub mod error;
pub mod hypertable;
pub mod ids;
pub mod job;
pub mod license;
pub mod metrics;
pub mod policy;
pub mod principal;
pub mod traits;

pub use config::ChronoConfig;
pub use error::{CoreError, CoreResult};
pub use hypertable::{
    Chunk, ChunkIndexMapping, Dimension, DimensionKind, DimensionSlice, Hypertable,
    PartitionType, TimeCutoff,
};
pub use ids::{ChunkId, DimensionId, HypertableId, JobId, MaterializationId, SliceId};
pub use job::{AlteredSchedule, Job, JobStat, JobType, ScheduleUpdate};
pub use license::{LicenseEdition, LicenseInfo};
pub use policy::{CascadeOptions, ChunkStat, DropChunksPolicy, ReorderPolicy, RetentionWindow};
pub use principal::Principal;
pub use traits::{
    ChunkStatsStore, Clock, DropChunks, HypertableCatalog, IntegerNow, JobCatalog, JobStatStore,
    LicenseProvider, Materializer, PolicyCatalog, ReorderChunk, SystemClock, TransactionControl,
};
