//! SQLite catalog adapters for the ChronoDB background policy engine.

mod chunk_stats_repository;
mod hypertable_repository;
mod job_repository;
mod policy_repository;
mod session;
mod util;

pub use chunk_stats_repository::SqliteChunkStatsRepository;
pub use hypertable_repository::SqliteHypertableRepository;
pub use job_repository::SqliteJobRepository;
pub use policy_repository::SqlitePolicyRepository;
pub use session::SqliteSession;
pub use util::{create_sqlite_pool, run_migrations};

/// Embedded SQL migrations for the catalog database.
pub const MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
