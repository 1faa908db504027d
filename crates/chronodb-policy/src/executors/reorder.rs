use std::sync::Arc;

use async_trait::async_trait;
use chronodb_core::metrics::POLICY_CHUNKS_PROCESSED;
use chronodb_core::{CoreError, CoreResult, Job, JobType, ReorderChunk, TransactionControl};

use super::PolicyExecutor;
use crate::context::PolicyContext;
use crate::outcome::PolicyOutcome;
use crate::selection::ChunkSelector;

/// Clusters one old chunk per run on the policy's index.
pub struct ReorderExecutor {
    ctx: PolicyContext,
    selector: ChunkSelector,
    reorder: Arc<dyn ReorderChunk>,
    fast_continue: bool,
}

impl ReorderExecutor {
    pub fn new(ctx: PolicyContext, reorder: Arc<dyn ReorderChunk>, fast_continue: bool) -> Self {
        let selector = ChunkSelector::new(ctx.hypertables.clone(), ctx.chunk_stats.clone());
        Self {
            ctx,
            selector,
            reorder,
            fast_continue,
        }
    }

    async fn reorder_next_chunk(&self, job: &Job) -> CoreResult<PolicyOutcome> {
        let job_id = job.id;
        let policy = self
            .ctx
            .policies
            .find_reorder_policy(job_id)
            .await?
            .ok_or_else(|| {
                CoreError::internal(format!(
                    "could not run reorder policy #{job_id} because no args in policy table"
                ))
            })?;

        let hypertable = self
            .ctx
            .hypertables
            .get_hypertable(policy.hypertable_id)
            .await?
            .ok_or_else(|| {
                CoreError::hypertable_not_found(format!(
                    "could not run reorder policy #{job_id} because hypertable {} does not exist",
                    policy.hypertable_id
                ))
            })?;

        let Some(chunk_id) = self.selector.select_chunk(job_id, &hypertable).await? else {
            tracing::info!(
                job_id = %job_id,
                hypertable = %hypertable.qualified_name(),
                "no chunks need reordering for hypertable {}",
                hypertable.qualified_name()
            );
            return Ok(PolicyOutcome::NoWork);
        };

        let chunk = self
            .ctx
            .hypertables
            .get_chunk(chunk_id)
            .await?
            .ok_or_else(|| CoreError::not_found("chunk", chunk_id.to_string()))?;

        // The policy names the hypertable index; the primitive needs the
        // chunk's own copy of it.
        let index = self
            .ctx
            .hypertables
            .chunk_index_by_hypertable_index(chunk_id, &policy.hypertable_index_name)
            .await?
            .ok_or_else(|| {
                CoreError::not_found(
                    "chunk index",
                    format!("{} on {}", policy.hypertable_index_name, chunk.qualified_name()),
                )
            })?;

        tracing::info!(
            job_id = %job_id,
            chunk = %chunk.qualified_name(),
            index = %index.index_name,
            "reordering chunk {}",
            chunk.qualified_name()
        );
        self.reorder.reorder_chunk(&hypertable, &chunk, &index).await?;
        tracing::info!(
            job_id = %job_id,
            chunk = %chunk.qualified_name(),
            "completed reordering chunk {}",
            chunk.qualified_name()
        );
        POLICY_CHUNKS_PROCESSED.with_label_values(&["reorder"]).inc();

        self.ctx
            .chunk_stats
            .record_job_run(job_id, chunk_id, self.ctx.clock.now())
            .await?;

        if self.fast_continue && self.selector.select_chunk(job_id, &hypertable).await?.is_some() {
            return Ok(PolicyOutcome::NeedsImmediateRerun);
        }
        Ok(PolicyOutcome::Completed)
    }
}

#[async_trait]
impl PolicyExecutor for ReorderExecutor {
    fn job_type(&self) -> JobType {
        JobType::Reorder
    }

    async fn execute(
        &self,
        job: &Job,
        _session: &dyn TransactionControl,
    ) -> CoreResult<PolicyOutcome> {
        self.reorder_next_chunk(job).await
    }
}
