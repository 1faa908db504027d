//! Background policy engine for ChronoDB.
//!
//! The scheduler hands a [`Job`](chronodb_core::Job) to the
//! [`PolicyDispatcher`], which checks licensing, runs the matching executor
//! inside a [`TransactionScope`] and reschedules the job immediately when the
//! executor reports unfinished work. [`ScheduleService`] implements the
//! administrative schedule change.

mod context;
mod dispatcher;
mod engine;
pub mod executors;
mod fast_restart;
mod license;
mod outcome;
mod schedule;
pub mod selection;
pub mod telemetry;
pub mod transaction;

pub use context::PolicyContext;
pub use dispatcher::PolicyDispatcher;
pub use engine::{PolicyEngine, PolicyPrimitives};
pub use executors::{DropChunksExecutor, MaterializeExecutor, PolicyExecutor, ReorderExecutor};
pub use fast_restart::FastRestart;
pub use license::LicenseGate;
pub use outcome::PolicyOutcome;
pub use schedule::ScheduleService;
pub use selection::{ChunkSelector, REORDER_SKIP_RECENT_DIM_SLICES_N};
pub use transaction::{SnapshotMode, TransactionScope};
