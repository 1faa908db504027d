use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chronodb_core::{ChunkId, ChunkStat, ChunkStatsStore, CoreResult, JobId};
use sqlx::{query, query_scalar, Row};

use crate::session::SqliteSession;
use crate::util::{decode_timestamp, encode_timestamp, map_sqlx_error, storage_error};

/// SQLite-backed record of the chunks each policy job has processed.
pub struct SqliteChunkStatsRepository {
    session: Arc<SqliteSession>,
}

impl SqliteChunkStatsRepository {
    /// Creates a new repository on the provided session.
    pub fn new(session: Arc<SqliteSession>) -> Self {
        Self { session }
    }

    /// Fetches the stat row for a job/chunk pair.
    pub async fn find_chunk_stat(
        &self,
        job_id: JobId,
        chunk_id: ChunkId,
    ) -> CoreResult<Option<ChunkStat>> {
        let mut conn = self.session.connection().await?;
        let row = query(
            r#"
            SELECT job_id, chunk_id, num_times_job_run, last_time_job_run
              FROM bgw_policy_chunk_stats
             WHERE job_id = ?1
               AND chunk_id = ?2
            "#,
        )
        .bind(job_id.get())
        .bind(chunk_id.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        let last_time_job_run: String = row.try_get("last_time_job_run").map_err(storage_error)?;
        Ok(Some(ChunkStat {
            job_id: JobId::new(row.try_get("job_id").map_err(storage_error)?),
            chunk_id: ChunkId::new(row.try_get("chunk_id").map_err(storage_error)?),
            num_times_job_run: row.try_get("num_times_job_run").map_err(storage_error)?,
            last_time_job_run: decode_timestamp("last_time_job_run", &last_time_job_run)?,
        }))
    }
}

#[async_trait]
impl ChunkStatsStore for SqliteChunkStatsRepository {
    async fn has_job_run(&self, job_id: JobId, chunk_id: ChunkId) -> CoreResult<bool> {
        let mut conn = self.session.connection().await?;
        let found: Option<i32> = query_scalar(
            r#"
            SELECT 1
              FROM bgw_policy_chunk_stats
             WHERE job_id = ?1
               AND chunk_id = ?2
            "#,
        )
        .bind(job_id.get())
        .bind(chunk_id.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage_error)?;

        Ok(found.is_some())
    }

    async fn record_job_run(
        &self,
        job_id: JobId,
        chunk_id: ChunkId,
        ran_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        let mut conn = self.session.connection().await?;
        query(
            r#"
            INSERT INTO bgw_policy_chunk_stats (job_id, chunk_id, num_times_job_run, last_time_job_run)
            VALUES (?1, ?2, 1, ?3)
            ON CONFLICT (job_id, chunk_id) DO UPDATE
               SET num_times_job_run = bgw_policy_chunk_stats.num_times_job_run + 1,
                   last_time_job_run = excluded.last_time_job_run
            "#,
        )
        .bind(job_id.get())
        .bind(chunk_id.get())
        .bind(encode_timestamp(ran_at))
        .execute(&mut *conn)
        .await
        .map(|_| ())
        .map_err(|err| map_sqlx_error("chunk stat", format!("{job_id}/{chunk_id}"), err))
    }
}
