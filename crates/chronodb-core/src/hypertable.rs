//! Hypertable, dimension and chunk metadata.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::ids::{ChunkId, DimensionId, HypertableId, SliceId};

/// Column type of a partitioning column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartitionType {
    SmallInt,
    Integer,
    BigInt,
    Date,
    Timestamp,
    TimestampTz,
}

impl PartitionType {
    /// Returns the catalog spelling.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionType::SmallInt => "smallint",
            PartitionType::Integer => "integer",
            PartitionType::BigInt => "bigint",
            PartitionType::Date => "date",
            PartitionType::Timestamp => "timestamp",
            PartitionType::TimestampTz => "timestamptz",
        }
    }

    /// Integer-valued time column.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            PartitionType::SmallInt | PartitionType::Integer | PartitionType::BigInt
        )
    }
}

impl FromStr for PartitionType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "smallint" => Ok(PartitionType::SmallInt),
            "integer" => Ok(PartitionType::Integer),
            "bigint" => Ok(PartitionType::BigInt),
            "date" => Ok(PartitionType::Date),
            "timestamp" => Ok(PartitionType::Timestamp),
            "timestamptz" => Ok(PartitionType::TimestampTz),
            other => Err(CoreError::invalid_state(format!(
                "unsupported partition type `{other}`"
            ))),
        }
    }
}

impl fmt::Display for PartitionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a dimension divides its key space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DimensionKind {
    /// Range partitioning with fixed-width intervals (usually time).
    Open { interval_length: i64 },
    /// Hash partitioning into a fixed number of slices.
    Closed { num_slices: i16 },
}

/// A partitioning axis of a hypertable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dimension {
    pub id: DimensionId,
    pub hypertable_id: HypertableId,
    pub column_name: String,
    pub column_type: PartitionType,
    pub kind: DimensionKind,
}

impl Dimension {
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self.kind, DimensionKind::Open { .. })
    }
}

/// A logical table split into chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hypertable {
    pub id: HypertableId,
    pub schema_name: String,
    pub table_name: String,
    /// Dimensions in creation order.
    pub dimensions: Vec<Dimension>,
}

impl Hypertable {
    /// Returns the `n`-th open dimension (0 is the primary time dimension).
    #[must_use]
    pub fn open_dimension(&self, n: usize) -> Option<&Dimension> {
        self.dimensions.iter().filter(|d| d.is_open()).nth(n)
    }

    /// `schema.table` for log lines and error messages.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema_name, self.table_name)
    }
}

/// A contiguous range `[range_start, range_end)` of one dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimensionSlice {
    pub id: SliceId,
    pub dimension_id: DimensionId,
    pub range_start: i64,
    pub range_end: i64,
}

/// A physical partition of a hypertable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: ChunkId,
    pub hypertable_id: HypertableId,
    pub schema_name: String,
    pub table_name: String,
}

impl Chunk {
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema_name, self.table_name)
    }
}

/// Chunk-local index backing a hypertable-level index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkIndexMapping {
    pub chunk_id: ChunkId,
    pub hypertable_id: HypertableId,
    pub hypertable_index_name: String,
    pub index_name: String,
}

/// Retention cutoff typed by the partitioning column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeCutoff {
    Integer(i64),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
}

impl fmt::Display for TimeCutoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeCutoff::Integer(value) => write!(f, "{value}"),
            TimeCutoff::Date(date) => write!(f, "{date}"),
            TimeCutoff::Timestamp(ts) => write!(f, "{ts}"),
            TimeCutoff::TimestampTz(ts) => write!(f, "{}", ts.to_rfc3339()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dimension(id: i32, kind: DimensionKind) -> Dimension {
        Dimension {
            id: DimensionId::new(id),
            hypertable_id: HypertableId::new(1),
            column_name: format!("col{id}"),
            column_type: PartitionType::TimestampTz,
            kind,
        }
    }

    #[test]
    fn open_dimension_skips_closed_dimensions() {
        let table = Hypertable {
            id: HypertableId::new(1),
            schema_name: "public".into(),
            table_name: "metrics".into(),
            dimensions: vec![
                dimension(1, DimensionKind::Closed { num_slices: 4 }),
                dimension(2, DimensionKind::Open { interval_length: 10 }),
            ],
        };
        assert_eq!(table.open_dimension(0).unwrap().id, DimensionId::new(2));
        assert!(table.open_dimension(1).is_none());
        assert_eq!(table.qualified_name(), "public.metrics");
    }

    #[test]
    fn partition_type_parses_catalog_spelling() {
        assert_eq!("bigint".parse::<PartitionType>().unwrap(), PartitionType::BigInt);
        assert!(PartitionType::SmallInt.is_integer());
        assert!(!PartitionType::Date.is_integer());
        assert!("interval".parse::<PartitionType>().is_err());
    }
}
