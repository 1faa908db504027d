use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Creates an identifier from its catalog value.
            #[must_use]
            pub const fn new(value: i32) -> Self {
                Self(value)
            }

            /// Returns the raw catalog value, suitable for SQLite bindings.
            #[must_use]
            pub const fn get(self) -> i32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(s.parse()?))
            }
        }

        impl From<i32> for $name {
            fn from(value: i32) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i32 {
            fn from(value: $name) -> Self {
                value.0
            }
        }
    };
}

define_id!(JobId, "Identifier of a background job.");
define_id!(HypertableId, "Identifier of a hypertable.");
define_id!(DimensionId, "Identifier of a partitioning dimension.");
define_id!(SliceId, "Identifier of a dimension slice.");
define_id!(ChunkId, "Identifier of a chunk.");
define_id!(
    MaterializationId,
    "Identifier of a continuous aggregate's materialization hypertable."
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_through_strings() {
        let id: JobId = "1000".parse().unwrap();
        assert_eq!(id, JobId::new(1000));
        assert_eq!(id.to_string(), "1000");
        assert_eq!(i32::from(id), 1000);
    }

    #[test]
    fn ids_order_by_value() {
        assert!(ChunkId::new(3) < ChunkId::new(10));
    }
}
