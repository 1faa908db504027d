use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chronodb_core::{
    Chunk, ChunkId, ChunkIndexMapping, CoreError, CoreResult, Dimension, DimensionId,
    DimensionKind, DimensionSlice, Hypertable, HypertableCatalog, HypertableId, PartitionType,
    SliceId,
};
use sqlx::sqlite::SqliteRow;
use sqlx::{query, query_scalar, Row};

use crate::session::SqliteSession;
use crate::util::{map_sqlx_error, storage_error};

/// SQLite-backed repository for hypertable, dimension and chunk metadata.
pub struct SqliteHypertableRepository {
    session: Arc<SqliteSession>,
}

impl SqliteHypertableRepository {
    /// Creates a new repository on the provided session.
    pub fn new(session: Arc<SqliteSession>) -> Self {
        Self { session }
    }

    /// Inserts a hypertable together with its dimensions.
    pub async fn create_hypertable(&self, hypertable: &Hypertable) -> CoreResult<()> {
        let mut conn = self.session.connection().await?;
        query(
            r#"
            INSERT INTO hypertable (id, schema_name, table_name)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(hypertable.id.get())
        .bind(&hypertable.schema_name)
        .bind(&hypertable.table_name)
        .execute(&mut *conn)
        .await
        .map_err(|err| map_sqlx_error("hypertable", hypertable.qualified_name(), err))?;

        for dimension in &hypertable.dimensions {
            let (interval_length, num_slices) = match dimension.kind {
                DimensionKind::Open { interval_length } => (Some(interval_length), None),
                DimensionKind::Closed { num_slices } => (None, Some(num_slices)),
            };
            query(
                r#"
                INSERT INTO dimension (
                    id,
                    hypertable_id,
                    column_name,
                    column_type,
                    interval_length,
                    num_slices
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(dimension.id.get())
            .bind(hypertable.id.get())
            .bind(&dimension.column_name)
            .bind(dimension.column_type.as_str())
            .bind(interval_length)
            .bind(num_slices)
            .execute(&mut *conn)
            .await
            .map_err(|err| map_sqlx_error("dimension", dimension.id.to_string(), err))?;
        }
        Ok(())
    }

    /// Deletes a hypertable; dimensions, slices and chunks cascade.
    pub async fn delete_hypertable(&self, hypertable_id: HypertableId) -> CoreResult<()> {
        let mut conn = self.session.connection().await?;
        let result = query("DELETE FROM hypertable WHERE id = ?1")
            .bind(hypertable_id.get())
            .execute(&mut *conn)
            .await
            .map_err(storage_error)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("hypertable", hypertable_id.to_string()));
        }
        Ok(())
    }

    /// Inserts a slice `[range_start, range_end)` of a dimension.
    pub async fn create_slice(
        &self,
        dimension_id: DimensionId,
        range_start: i64,
        range_end: i64,
    ) -> CoreResult<DimensionSlice> {
        let mut conn = self.session.connection().await?;
        let result = query(
            r#"
            INSERT INTO dimension_slice (dimension_id, range_start, range_end)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(dimension_id.get())
        .bind(range_start)
        .bind(range_end)
        .execute(&mut *conn)
        .await
        .map_err(|err| {
            map_sqlx_error("dimension slice", format!("[{range_start}, {range_end})"), err)
        })?;

        let id = i32::try_from(result.last_insert_rowid())
            .map_err(|_| CoreError::internal("dimension slice id exceeds 32-bit range"))?;
        Ok(DimensionSlice {
            id: SliceId::new(id),
            dimension_id,
            range_start,
            range_end,
        })
    }

    /// Inserts a chunk constrained by the given slices.
    pub async fn create_chunk(
        &self,
        chunk: &Chunk,
        slices: &[SliceId],
    ) -> CoreResult<()> {
        let mut conn = self.session.connection().await?;
        query(
            r#"
            INSERT INTO chunk (id, hypertable_id, schema_name, table_name)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(chunk.id.get())
        .bind(chunk.hypertable_id.get())
        .bind(&chunk.schema_name)
        .bind(&chunk.table_name)
        .execute(&mut *conn)
        .await
        .map_err(|err| map_sqlx_error("chunk", chunk.qualified_name(), err))?;

        for slice_id in slices {
            query(
                r#"
                INSERT INTO chunk_constraint (chunk_id, dimension_slice_id)
                VALUES (?1, ?2)
                "#,
            )
            .bind(chunk.id.get())
            .bind(slice_id.get())
            .execute(&mut *conn)
            .await
            .map_err(|err| map_sqlx_error("chunk constraint", chunk.id.to_string(), err))?;
        }
        Ok(())
    }

    /// Deletes a chunk and any slices no other chunk references.
    pub async fn delete_chunk(&self, chunk_id: ChunkId) -> CoreResult<()> {
        let mut conn = self.session.connection().await?;
        let slice_ids: Vec<i32> = query_scalar(
            r#"
            SELECT dimension_slice_id
              FROM chunk_constraint
             WHERE chunk_id = ?1
            "#,
        )
        .bind(chunk_id.get())
        .fetch_all(&mut *conn)
        .await
        .map_err(storage_error)?;

        let result = query("DELETE FROM chunk WHERE id = ?1")
            .bind(chunk_id.get())
            .execute(&mut *conn)
            .await
            .map_err(storage_error)?;
        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("chunk", chunk_id.to_string()));
        }

        for slice_id in slice_ids {
            query(
                r#"
                DELETE FROM dimension_slice
                 WHERE id = ?1
                   AND NOT EXISTS (
                       SELECT 1 FROM chunk_constraint WHERE dimension_slice_id = ?1
                   )
                "#,
            )
            .bind(slice_id)
            .execute(&mut *conn)
            .await
            .map_err(storage_error)?;
        }
        Ok(())
    }

    /// Registers the chunk-local index backing a hypertable index.
    pub async fn create_chunk_index(&self, mapping: &ChunkIndexMapping) -> CoreResult<()> {
        let mut conn = self.session.connection().await?;
        query(
            r#"
            INSERT INTO chunk_index (chunk_id, index_name, hypertable_id, hypertable_index_name)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(mapping.chunk_id.get())
        .bind(&mapping.index_name)
        .bind(mapping.hypertable_id.get())
        .bind(&mapping.hypertable_index_name)
        .execute(&mut *conn)
        .await
        .map(|_| ())
        .map_err(|err| map_sqlx_error("chunk index", mapping.index_name.clone(), err))
    }

    fn map_dimension(row: SqliteRow) -> CoreResult<Dimension> {
        let column_type: String = row.try_get("column_type").map_err(storage_error)?;
        let interval_length: Option<i64> = row.try_get("interval_length").map_err(storage_error)?;
        let num_slices: Option<i16> = row.try_get("num_slices").map_err(storage_error)?;
        let id = DimensionId::new(row.try_get("id").map_err(storage_error)?);

        let kind = match (interval_length, num_slices) {
            (Some(interval_length), None) => DimensionKind::Open { interval_length },
            (None, Some(num_slices)) => DimensionKind::Closed { num_slices },
            _ => {
                return Err(CoreError::internal(format!(
                    "dimension {id} is neither open nor closed"
                )))
            }
        };

        Ok(Dimension {
            id,
            hypertable_id: HypertableId::new(row.try_get("hypertable_id").map_err(storage_error)?),
            column_name: row.try_get("column_name").map_err(storage_error)?,
            column_type: PartitionType::from_str(&column_type)?,
            kind,
        })
    }

    fn map_chunk(row: SqliteRow) -> CoreResult<Chunk> {
        Ok(Chunk {
            id: ChunkId::new(row.try_get("id").map_err(storage_error)?),
            hypertable_id: HypertableId::new(row.try_get("hypertable_id").map_err(storage_error)?),
            schema_name: row.try_get("schema_name").map_err(storage_error)?,
            table_name: row.try_get("table_name").map_err(storage_error)?,
        })
    }
}

#[async_trait]
impl HypertableCatalog for SqliteHypertableRepository {
    async fn get_hypertable(&self, hypertable_id: HypertableId) -> CoreResult<Option<Hypertable>> {
        let mut conn = self.session.connection().await?;
        let Some(row) = query(
            r#"
            SELECT id, schema_name, table_name
              FROM hypertable
             WHERE id = ?1
            "#,
        )
        .bind(hypertable_id.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage_error)?
        else {
            return Ok(None);
        };

        let dimensions = query(
            r#"
            SELECT id,
                   hypertable_id,
                   column_name,
                   column_type,
                   interval_length,
                   num_slices
              FROM dimension
             WHERE hypertable_id = ?1
          ORDER BY id ASC
            "#,
        )
        .bind(hypertable_id.get())
        .fetch_all(&mut *conn)
        .await
        .map_err(storage_error)?
        .into_iter()
        .map(Self::map_dimension)
        .collect::<CoreResult<Vec<_>>>()?;

        Ok(Some(Hypertable {
            id: HypertableId::new(row.try_get("id").map_err(storage_error)?),
            schema_name: row.try_get("schema_name").map_err(storage_error)?,
            table_name: row.try_get("table_name").map_err(storage_error)?,
            dimensions,
        }))
    }

    async fn dimension_slices(&self, dimension_id: DimensionId) -> CoreResult<Vec<DimensionSlice>> {
        let mut conn = self.session.connection().await?;
        let rows = query(
            r#"
            SELECT id, dimension_id, range_start, range_end
              FROM dimension_slice
             WHERE dimension_id = ?1
          ORDER BY range_start ASC, range_end ASC, id ASC
            "#,
        )
        .bind(dimension_id.get())
        .fetch_all(&mut *conn)
        .await
        .map_err(storage_error)?;

        rows.into_iter()
            .map(|row| {
                Ok(DimensionSlice {
                    id: SliceId::new(row.try_get("id").map_err(storage_error)?),
                    dimension_id: DimensionId::new(
                        row.try_get("dimension_id").map_err(storage_error)?,
                    ),
                    range_start: row.try_get("range_start").map_err(storage_error)?,
                    range_end: row.try_get("range_end").map_err(storage_error)?,
                })
            })
            .collect::<CoreResult<Vec<_>>>()
    }

    async fn chunk_ids_in_slice(&self, slice_id: SliceId) -> CoreResult<Vec<ChunkId>> {
        let mut conn = self.session.connection().await?;
        let ids: Vec<i32> = query_scalar(
            r#"
            SELECT chunk_id
              FROM chunk_constraint
             WHERE dimension_slice_id = ?1
          ORDER BY chunk_id ASC
            "#,
        )
        .bind(slice_id.get())
        .fetch_all(&mut *conn)
        .await
        .map_err(storage_error)?;

        Ok(ids.into_iter().map(ChunkId::new).collect())
    }

    async fn get_chunk(&self, chunk_id: ChunkId) -> CoreResult<Option<Chunk>> {
        let mut conn = self.session.connection().await?;
        let row = query(
            r#"
            SELECT id, hypertable_id, schema_name, table_name
              FROM chunk
             WHERE id = ?1
            "#,
        )
        .bind(chunk_id.get())
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage_error)?;

        row.map(Self::map_chunk).transpose()
    }

    async fn chunk_index_by_hypertable_index(
        &self,
        chunk_id: ChunkId,
        hypertable_index_name: &str,
    ) -> CoreResult<Option<ChunkIndexMapping>> {
        let mut conn = self.session.connection().await?;
        let row = query(
            r#"
            SELECT chunk_id, index_name, hypertable_id, hypertable_index_name
              FROM chunk_index
             WHERE chunk_id = ?1
               AND hypertable_index_name = ?2
            "#,
        )
        .bind(chunk_id.get())
        .bind(hypertable_index_name)
        .fetch_optional(&mut *conn)
        .await
        .map_err(storage_error)?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(ChunkIndexMapping {
            chunk_id: ChunkId::new(row.try_get("chunk_id").map_err(storage_error)?),
            hypertable_id: HypertableId::new(row.try_get("hypertable_id").map_err(storage_error)?),
            hypertable_index_name: row
                .try_get("hypertable_index_name")
                .map_err(storage_error)?,
            index_name: row.try_get("index_name").map_err(storage_error)?,
        }))
    }
}
