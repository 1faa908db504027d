use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chronodb_core::{CoreError, CoreResult, Job, JobCatalog, JobId, JobStat, JobStatStore};
use sqlx::sqlite::SqliteRow;
use sqlx::{query, Row};

use crate::session::SqliteSession;
use crate::util::{
    decode_duration, decode_timestamp, encode_duration, encode_timestamp, map_sqlx_error,
    storage_error,
};

/// SQLite-backed repository for background jobs and their run statistics.
pub struct SqliteJobRepository {
    session: Arc<SqliteSession>,
}

impl SqliteJobRepository {
    /// Creates a new repository on the provided session.
    pub fn new(session: Arc<SqliteSession>) -> Self {
        Self { session }
    }

    /// Inserts a job row.
    pub async fn create_job(&self, job: &Job) -> CoreResult<()> {
        let schedule_interval = encode_duration("schedule_interval", job.schedule_interval)?;
        let max_runtime = encode_duration("max_runtime", job.max_runtime)?;
        let retry_period = encode_duration("retry_period", job.retry_period)?;

        let mut conn = self.session.connection().await?;
        query(
            r#"
            INSERT INTO bgw_job (
                id,
                application_name,
                job_type,
                schedule_interval_us,
                max_runtime_us,
                max_retries,
                retry_period_us,
                owner
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(job.id.get())
        .bind(&job.application_name)
        .bind(&job.job_type)
        .bind(schedule_interval)
        .bind(max_runtime)
        .bind(job.max_retries)
        .bind(retry_period)
        .bind(&job.owner)
        .execute(&mut *conn)
        .await
        .map(|_| ())
        .map_err(|err| map_sqlx_error("job", job.id.to_string(), err))
    }

    /// Deletes a job; policy arguments and statistics cascade.
    pub async fn delete_job(&self, job_id: JobId) -> CoreResult<()> {
        let mut conn = self.session.connection().await?;
        let result = query("DELETE FROM bgw_job WHERE id = ?1")
            .bind(job_id.get())
            .execute(&mut *conn)
            .await
            .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("job", job_id.to_string()));
        }
        Ok(())
    }

    /// Records the start of a run, as the scheduler does before invoking a job.
    pub async fn record_job_start(
        &self,
        job_id: JobId,
        started_at: DateTime<Utc>,
        next_start: DateTime<Utc>,
    ) -> CoreResult<()> {
        let mut conn = self.session.connection().await?;
        query(
            r#"
            INSERT INTO bgw_job_stat (job_id, last_start, next_start, total_runs)
            VALUES (?1, ?2, ?3, 1)
            ON CONFLICT (job_id) DO UPDATE
               SET last_start = excluded.last_start,
                   next_start = excluded.next_start,
                   total_runs = bgw_job_stat.total_runs + 1
            "#,
        )
        .bind(job_id.get())
        .bind(encode_timestamp(started_at))
        .bind(encode_timestamp(next_start))
        .execute(&mut *conn)
        .await
        .map(|_| ())
        .map_err(|err| map_sqlx_error("job stat", job_id.to_string(), err))
    }

    fn map_job(row: SqliteRow) -> CoreResult<Job> {
        Ok(Job {
            id: JobId::new(row.try_get("id").map_err(storage_error)?),
            application_name: row.try_get("application_name").map_err(storage_error)?,
            job_type: row.try_get("job_type").map_err(storage_error)?,
            schedule_interval: decode_duration(
                row.try_get("schedule_interval_us").map_err(storage_error)?,
            ),
            max_runtime: decode_duration(row.try_get("max_runtime_us").map_err(storage_error)?),
            max_retries: row.try_get("max_retries").map_err(storage_error)?,
            retry_period: decode_duration(
                row.try_get("retry_period_us").map_err(storage_error)?,
            ),
            owner: row.try_get("owner").map_err(storage_error)?,
        })
    }

    fn map_job_stat(row: SqliteRow) -> CoreResult<JobStat> {
        let last_start: String = row.try_get("last_start").map_err(storage_error)?;
        let last_finish: Option<String> = row.try_get("last_finish").map_err(storage_error)?;
        let next_start: String = row.try_get("next_start").map_err(storage_error)?;

        Ok(JobStat {
            job_id: JobId::new(row.try_get("job_id").map_err(storage_error)?),
            last_start: decode_timestamp("last_start", &last_start)?,
            last_finish: last_finish
                .map(|value| decode_timestamp("last_finish", &value))
                .transpose()?,
            next_start: decode_timestamp("next_start", &next_start)?,
            total_runs: row.try_get("total_runs").map_err(storage_error)?,
        })
    }
}

#[async_trait]
impl JobCatalog for SqliteJobRepository {
    async fn find_job(&self, job_id: JobId) -> CoreResult<Option<Job>> {
        let mut conn = self.session.connection().await?;
        let row = query(
            r#"
            SELECT id,
                   application_name,
                   job_type,
                   schedule_interval_us,
                   max_runtime_us,
                   max_retries,
                   retry_period_us,
                   owner
              FROM bgw_job
             WHERE id = ?1
            "#,
        )
        .bind(job_id.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage_error)?;

        row.map(Self::map_job).transpose()
    }

    async fn update_job(&self, job: &Job) -> CoreResult<()> {
        let schedule_interval = encode_duration("schedule_interval", job.schedule_interval)?;
        let max_runtime = encode_duration("max_runtime", job.max_runtime)?;
        let retry_period = encode_duration("retry_period", job.retry_period)?;

        let mut conn = self.session.connection().await?;
        let result = query(
            r#"
            UPDATE bgw_job
               SET application_name = ?2,
                   schedule_interval_us = ?3,
                   max_runtime_us = ?4,
                   max_retries = ?5,
                   retry_period_us = ?6
             WHERE id = ?1
            "#,
        )
        .bind(job.id.get())
        .bind(&job.application_name)
        .bind(schedule_interval)
        .bind(max_runtime)
        .bind(job.max_retries)
        .bind(retry_period)
        .execute(&mut *conn)
        .await
        .map_err(|err| map_sqlx_error("job", job.id.to_string(), err))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("job", job.id.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl JobStatStore for SqliteJobRepository {
    async fn find_job_stat(&self, job_id: JobId) -> CoreResult<Option<JobStat>> {
        let mut conn = self.session.connection().await?;
        let row = query(
            r#"
            SELECT job_id,
                   last_start,
                   last_finish,
                   next_start,
                   total_runs
              FROM bgw_job_stat
             WHERE job_id = ?1
            "#,
        )
        .bind(job_id.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage_error)?;

        row.map(Self::map_job_stat).transpose()
    }

    async fn set_next_start(&self, job_id: JobId, next_start: DateTime<Utc>) -> CoreResult<()> {
        let mut conn = self.session.connection().await?;
        let result = query(
            r#"
            UPDATE bgw_job_stat
               SET next_start = ?2
             WHERE job_id = ?1
            "#,
        )
        .bind(job_id.get())
        .bind(encode_timestamp(next_start))
        .execute(&mut *conn)
        .await
        .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("job stat", job_id.to_string()));
        }
        Ok(())
    }
}
