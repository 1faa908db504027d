use std::sync::Arc;

use async_trait::async_trait;
use chronodb_core::{
    CoreError, CoreResult, Job, JobType, MaterializationId, Materializer, TransactionControl,
};

use super::PolicyExecutor;
use crate::context::PolicyContext;
use crate::outcome::PolicyOutcome;

/// Materializes a continuous aggregate.
///
/// The materialization engine manages its own transactions, so the executor
/// commits whatever transaction it runs in before calling it and opens a
/// fresh one afterwards. A caller that invoked the job inside a transaction
/// block gets a new transaction back, not its original one.
pub struct MaterializeExecutor {
    ctx: PolicyContext,
    materializer: Arc<dyn Materializer>,
    verbose: bool,
}

impl MaterializeExecutor {
    pub fn new(ctx: PolicyContext, materializer: Arc<dyn Materializer>, verbose: bool) -> Self {
        Self {
            ctx,
            materializer,
            verbose,
        }
    }

    async fn materialize_outside_transaction(
        &self,
        session: &dyn TransactionControl,
        materialization_id: MaterializationId,
    ) -> CoreResult<bool> {
        if session.is_in_transaction().await {
            return Err(CoreError::invalid_state(
                "continuous aggregate materialization must run outside of a transaction",
            ));
        }
        self.materializer
            .materialize(materialization_id, self.verbose)
            .await
    }
}

#[async_trait]
impl PolicyExecutor for MaterializeExecutor {
    fn job_type(&self) -> JobType {
        JobType::ContinuousAggregate
    }

    async fn execute(
        &self,
        job: &Job,
        session: &dyn TransactionControl,
    ) -> CoreResult<PolicyOutcome> {
        let materialization_id = self
            .ctx
            .policies
            .find_materialization_by_job(job.id)
            .await?
            .ok_or_else(|| {
                CoreError::internal(format!(
                    "cannot find continuous aggregate for job {}",
                    job.id
                ))
            })?;

        session.commit_transaction().await?;
        let finished = self.materialize_outside_transaction(session, materialization_id).await;
        session.start_transaction().await?;

        if finished? {
            Ok(PolicyOutcome::Completed)
        } else {
            tracing::debug!(
                job_id = %job.id,
                materialization_id = %materialization_id,
                "materialization left work behind"
            );
            Ok(PolicyOutcome::NeedsImmediateRerun)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::tests::RecordingSession;
    use crate::transaction::{SnapshotMode, TransactionScope};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use chronodb_core::{
        Chunk, ChunkId, ChunkIndexMapping, ChunkStatsStore, DimensionId, DimensionSlice, DropChunksPolicy, Hypertable, HypertableCatalog, HypertableId, JobCatalog,
        JobId, JobStat, JobStatStore, MaterializationId, PolicyCatalog, ReorderPolicy, SliceId,
    };
    use parking_lot::Mutex;

    /// Catalog double that only knows the job -> materialization mapping.
    struct StaticCatalog;

    #[async_trait]
    impl PolicyCatalog for StaticCatalog {
        async fn find_reorder_policy(&self, _: JobId) -> CoreResult<Option<ReorderPolicy>> {
            Ok(None)
        }

        async fn find_drop_chunks_policy(&self, _: JobId) -> CoreResult<Option<DropChunksPolicy>> {
            Ok(None)
        }

        async fn find_materialization_by_job(
            &self,
            job_id: JobId,
        ) -> CoreResult<Option<MaterializationId>> {
            Ok((job_id == JobId::new(1000)).then(|| MaterializationId::new(7)))
        }
    }

    #[async_trait]
    impl HypertableCatalog for StaticCatalog {
        async fn get_hypertable(&self, _: HypertableId) -> CoreResult<Option<Hypertable>> {
            Ok(None)
        }

        async fn dimension_slices(&self, _: DimensionId) -> CoreResult<Vec<DimensionSlice>> {
            Ok(Vec::new())
        }

        async fn chunk_ids_in_slice(&self, _: SliceId) -> CoreResult<Vec<ChunkId>> {
            Ok(Vec::new())
        }

        async fn get_chunk(&self, _: ChunkId) -> CoreResult<Option<Chunk>> {
            Ok(None)
        }

        async fn chunk_index_by_hypertable_index(
            &self,
            _: ChunkId,
            _: &str,
        ) -> CoreResult<Option<ChunkIndexMapping>> {
            Ok(None)
        }
    }

    #[async_trait]
    impl ChunkStatsStore for StaticCatalog {
        async fn has_job_run(&self, _: JobId, _: ChunkId) -> CoreResult<bool> {
            Ok(false)
        }

        async fn record_job_run(
            &self,
            _: JobId,
            _: ChunkId,
            _: DateTime<Utc>,
        ) -> CoreResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl JobCatalog for StaticCatalog {
        async fn find_job(&self, _: JobId) -> CoreResult<Option<Job>> {
            Ok(None)
        }

        async fn update_job(&self, _: &Job) -> CoreResult<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl JobStatStore for StaticCatalog {
        async fn find_job_stat(&self, _: JobId) -> CoreResult<Option<JobStat>> {
            Ok(None)
        }

        async fn set_next_start(
            &self,
            _: JobId,
            _: DateTime<Utc>,
        ) -> CoreResult<()> {
            Ok(())
        }
    }

    /// Materializer double that checks it runs outside a transaction.
    struct CheckingMaterializer {
        session: Arc<RecordingSession>,
        finished: Option<bool>,
        saw_transaction: Mutex<Option<bool>>,
    }

    #[async_trait]
    impl Materializer for CheckingMaterializer {
        async fn materialize(&self, id: MaterializationId, verbose: bool) -> CoreResult<bool> {
            assert_eq!(id, MaterializationId::new(7));
            assert!(verbose);
            let in_transaction = self.session.is_in_transaction().await;
            *self.saw_transaction.lock() = Some(in_transaction);
            self.finished
                .ok_or_else(|| CoreError::StorageError("materialization failed".to_string()))
        }
    }

    fn executor(
        session: Arc<RecordingSession>,
        finished: Option<bool>,
    ) -> (MaterializeExecutor, Arc<CheckingMaterializer>) {
        let catalog = Arc::new(StaticCatalog);
        let ctx = PolicyContext::new(
            session.clone(),
            catalog.clone(),
            catalog.clone(),
            catalog.clone(),
            catalog.clone(),
            catalog,
        );
        let materializer = Arc::new(CheckingMaterializer {
            session,
            finished,
            saw_transaction: Mutex::new(None),
        });
        (
            MaterializeExecutor::new(ctx, materializer.clone(), true),
            materializer,
        )
    }

    /// Runs the executor the way the dispatcher does.
    async fn execute_in_scope(
        executor: &MaterializeExecutor,
        session: &RecordingSession,
        job_id: i32,
    ) -> CoreResult<PolicyOutcome> {
        let job = Job::new(JobId::new(job_id), JobType::ContinuousAggregate, "postgres");
        let scope = TransactionScope::enter(session, SnapshotMode::None).await?;
        let result = executor.execute(&job, scope.session()).await;
        scope.finish(result).await
    }

    #[tokio::test]
    async fn engine_runs_between_transactions() {
        let session = Arc::new(RecordingSession::default());
        let (executor, materializer) = executor(session.clone(), Some(true));

        let outcome = execute_in_scope(&executor, &session, 1000).await.unwrap();

        assert_eq!(outcome, PolicyOutcome::Completed);
        assert_eq!(*materializer.saw_transaction.lock(), Some(false));
        assert_eq!(session.calls(), vec!["start", "commit", "start", "commit"]);
    }

    #[tokio::test]
    async fn unfinished_materialization_asks_for_rerun() {
        let session = Arc::new(RecordingSession::default());
        let (executor, _) = executor(session.clone(), Some(false));

        let outcome = execute_in_scope(&executor, &session, 1000).await.unwrap();
        assert_eq!(outcome, PolicyOutcome::NeedsImmediateRerun);
    }

    #[tokio::test]
    async fn caller_gets_a_fresh_transaction_back() {
        let session = Arc::new(RecordingSession::in_transaction());
        let (executor, materializer) = executor(session.clone(), Some(true));

        execute_in_scope(&executor, &session, 1000).await.unwrap();

        assert_eq!(*materializer.saw_transaction.lock(), Some(false));
        assert_eq!(session.calls(), vec!["commit", "start"]);
        assert!(session.is_in_transaction().await);
    }

    #[tokio::test]
    async fn failed_materialization_restores_transaction_boundary() {
        let session = Arc::new(RecordingSession::in_transaction());
        let (executor, _) = executor(session.clone(), None);

        let err = execute_in_scope(&executor, &session, 1000).await.unwrap_err();

        assert_eq!(err.code(), "storage_error");
        assert!(session.is_in_transaction().await);
    }

    #[tokio::test]
    async fn missing_aggregate_is_internal_error() {
        let session = Arc::new(RecordingSession::default());
        let (executor, _) = executor(session.clone(), Some(true));

        let err = execute_in_scope(&executor, &session, 42).await.unwrap_err();

        assert_eq!(err.code(), "internal_error");
        assert!(err.to_string().contains("cannot find continuous aggregate for job 42"));
        assert_eq!(session.calls(), vec!["start", "abort"]);
    }
}
