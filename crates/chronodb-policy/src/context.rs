use std::sync::Arc;

use chronodb_core::{
    ChunkStatsStore, Clock, HypertableCatalog, JobCatalog, JobStatStore, PolicyCatalog,
    SystemClock, TransactionControl,
};

/// Catalog handles shared by every part of the engine.
///
/// All handles are expected to run on the same session so that a transaction
/// opened through `session` covers every catalog read and write.
#[derive(Clone)]
pub struct PolicyContext {
    pub session: Arc<dyn TransactionControl>,
    pub jobs: Arc<dyn JobCatalog>,
    pub job_stats: Arc<dyn JobStatStore>,
    pub policies: Arc<dyn PolicyCatalog>,
    pub hypertables: Arc<dyn HypertableCatalog>,
    pub chunk_stats: Arc<dyn ChunkStatsStore>,
    pub clock: Arc<dyn Clock>,
}

impl PolicyContext {
    pub fn new(
        session: Arc<dyn TransactionControl>,
        jobs: Arc<dyn JobCatalog>,
        job_stats: Arc<dyn JobStatStore>,
        policies: Arc<dyn PolicyCatalog>,
        hypertables: Arc<dyn HypertableCatalog>,
        chunk_stats: Arc<dyn ChunkStatsStore>,
    ) -> Self {
        Self {
            session,
            jobs,
            job_stats,
            policies,
            hypertables,
            chunk_stats,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replaces the wall clock, mostly for tests.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
