use std::sync::Arc;

use async_trait::async_trait;
use chronodb_core::{
    CoreError, CoreResult, DropChunksPolicy, HypertableId, JobId, MaterializationId,
    PolicyCatalog, ReorderPolicy, RetentionWindow,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{query, query_scalar, Row};

use crate::session::SqliteSession;
use crate::util::{decode_duration, encode_duration, map_sqlx_error, storage_error};

/// SQLite-backed repository for per-job policy arguments.
pub struct SqlitePolicyRepository {
    session: Arc<SqliteSession>,
}

impl SqlitePolicyRepository {
    /// Creates a new repository on the provided session.
    pub fn new(session: Arc<SqliteSession>) -> Self {
        Self { session }
    }

    /// Stores the arguments of a reorder policy.
    pub async fn create_reorder_policy(&self, policy: &ReorderPolicy) -> CoreResult<()> {
        let mut conn = self.session.connection().await?;
        query(
            r#"
            INSERT INTO bgw_policy_reorder (job_id, hypertable_id, hypertable_index_name)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(policy.job_id.get())
        .bind(policy.hypertable_id.get())
        .bind(&policy.hypertable_index_name)
        .execute(&mut *conn)
        .await
        .map(|_| ())
        .map_err(|err| map_sqlx_error("reorder policy", policy.job_id.to_string(), err))
    }

    /// Stores the arguments of a drop_chunks policy.
    pub async fn create_drop_chunks_policy(&self, policy: &DropChunksPolicy) -> CoreResult<()> {
        let (older_than_us, older_than_integer) = match policy.older_than {
            RetentionWindow::Interval(interval) => {
                (Some(encode_duration("older_than", interval)?), None)
            }
            RetentionWindow::Integer(value) => (None, Some(value)),
        };

        let mut conn = self.session.connection().await?;
        query(
            r#"
            INSERT INTO bgw_policy_drop_chunks (
                job_id,
                hypertable_id,
                older_than_us,
                older_than_integer,
                cascade_objects,
                cascade_to_materializations
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(policy.job_id.get())
        .bind(policy.hypertable_id.get())
        .bind(older_than_us)
        .bind(older_than_integer)
        .bind(policy.cascade)
        .bind(policy.cascade_to_materializations)
        .execute(&mut *conn)
        .await
        .map(|_| ())
        .map_err(|err| map_sqlx_error("drop_chunks policy", policy.job_id.to_string(), err))
    }

    /// Registers the continuous aggregate a job materializes.
    pub async fn create_continuous_aggregate(
        &self,
        materialization_id: MaterializationId,
        job_id: JobId,
        user_view_schema: &str,
        user_view_name: &str,
    ) -> CoreResult<()> {
        let mut conn = self.session.connection().await?;
        query(
            r#"
            INSERT INTO continuous_agg (mat_hypertable_id, job_id, user_view_schema, user_view_name)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(materialization_id.get())
        .bind(job_id.get())
        .bind(user_view_schema)
        .bind(user_view_name)
        .execute(&mut *conn)
        .await
        .map(|_| ())
        .map_err(|err| {
            map_sqlx_error("continuous aggregate", materialization_id.to_string(), err)
        })
    }

    fn map_reorder(row: SqliteRow) -> CoreResult<ReorderPolicy> {
        Ok(ReorderPolicy {
            job_id: JobId::new(row.try_get("job_id").map_err(storage_error)?),
            hypertable_id: HypertableId::new(row.try_get("hypertable_id").map_err(storage_error)?),
            hypertable_index_name: row
                .try_get("hypertable_index_name")
                .map_err(storage_error)?,
        })
    }

    fn map_drop_chunks(row: SqliteRow) -> CoreResult<DropChunksPolicy> {
        let job_id = JobId::new(row.try_get("job_id").map_err(storage_error)?);
        let older_than_us: Option<i64> = row.try_get("older_than_us").map_err(storage_error)?;
        let older_than_integer: Option<i64> =
            row.try_get("older_than_integer").map_err(storage_error)?;

        let older_than = match (older_than_us, older_than_integer) {
            (Some(micros), None) => RetentionWindow::Interval(decode_duration(micros)),
            (None, Some(value)) => RetentionWindow::Integer(value),
            _ => {
                return Err(CoreError::internal(format!(
                    "drop_chunks policy #{job_id} has an ambiguous older_than"
                )))
            }
        };

        Ok(DropChunksPolicy {
            job_id,
            hypertable_id: HypertableId::new(row.try_get("hypertable_id").map_err(storage_error)?),
            older_than,
            cascade: row.try_get("cascade_objects").map_err(storage_error)?,
            cascade_to_materializations: row
                .try_get("cascade_to_materializations")
                .map_err(storage_error)?,
        })
    }
}

#[async_trait]
impl PolicyCatalog for SqlitePolicyRepository {
    async fn find_reorder_policy(&self, job_id: JobId) -> CoreResult<Option<ReorderPolicy>> {
        let mut conn = self.session.connection().await?;
        let row = query(
            r#"
            SELECT job_id, hypertable_id, hypertable_index_name
              FROM bgw_policy_reorder
             WHERE job_id = ?1
            "#,
        )
        .bind(job_id.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage_error)?;

        row.map(Self::map_reorder).transpose()
    }

    async fn find_drop_chunks_policy(&self, job_id: JobId) -> CoreResult<Option<DropChunksPolicy>> {
        let mut conn = self.session.connection().await?;
        let row = query(
            r#"
            SELECT job_id,
                   hypertable_id,
                   older_than_us,
                   older_than_integer,
                   cascade_objects,
                   cascade_to_materializations
              FROM bgw_policy_drop_chunks
             WHERE job_id = ?1
            "#,
        )
        .bind(job_id.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage_error)?;

        row.map(Self::map_drop_chunks).transpose()
    }

    async fn find_materialization_by_job(
        &self,
        job_id: JobId,
    ) -> CoreResult<Option<MaterializationId>> {
        let mut conn = self.session.connection().await?;
        let id: Option<i32> = query_scalar(
            r#"
            SELECT mat_hypertable_id
              FROM continuous_agg
             WHERE job_id = ?1
            "#,
        )
        .bind(job_id.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage_error)?;

        Ok(id.map(MaterializationId::new))
    }
}
