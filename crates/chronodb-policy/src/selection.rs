use std::sync::Arc;

use chronodb_core::{
    ChunkId, ChunkStatsStore, CoreError, CoreResult, DimensionSlice, Hypertable,
    HypertableCatalog, JobId,
};

/// Number of newest time slices a reorder policy never touches.
///
/// Slice count stands in for chunk count here; with space partitioning
/// several chunks share one time slice, so the cut is approximate.
pub const REORDER_SKIP_RECENT_DIM_SLICES_N: usize = 3;

/// Picks the next chunk a reorder job should cluster.
pub struct ChunkSelector {
    hypertables: Arc<dyn HypertableCatalog>,
    chunk_stats: Arc<dyn ChunkStatsStore>,
}

impl ChunkSelector {
    pub fn new(
        hypertables: Arc<dyn HypertableCatalog>,
        chunk_stats: Arc<dyn ChunkStatsStore>,
    ) -> Self {
        Self {
            hypertables,
            chunk_stats,
        }
    }

    /// Returns the oldest chunk past the recent-slice cutoff that `job_id`
    /// has never processed.
    pub async fn select_chunk(
        &self,
        job_id: JobId,
        hypertable: &Hypertable,
    ) -> CoreResult<Option<ChunkId>> {
        let time_dimension = hypertable.open_dimension(0).ok_or_else(|| {
            CoreError::invalid_state(format!(
                "hypertable {} has no open dimension",
                hypertable.qualified_name()
            ))
        })?;

        let slices = self.hypertables.dimension_slices(time_dimension.id).await?;
        for slice in eligible_slices(&slices) {
            for chunk_id in self.hypertables.chunk_ids_in_slice(slice.id).await? {
                if !self.chunk_stats.has_job_run(job_id, chunk_id).await? {
                    tracing::debug!(
                        job_id = %job_id,
                        chunk_id = %chunk_id,
                        range_start = slice.range_start,
                        "selected chunk for reorder"
                    );
                    return Ok(Some(chunk_id));
                }
            }
        }
        Ok(None)
    }
}

/// `range_start` of the newest slice that is old enough to reorder.
///
/// `slices` must be ordered by `range_start` ascending.
#[must_use]
pub fn reorder_threshold(slices: &[DimensionSlice]) -> Option<i64> {
    slices
        .iter()
        .rev()
        .nth(REORDER_SKIP_RECENT_DIM_SLICES_N)
        .map(|slice| slice.range_start)
}

/// Slices whose chunks may be reordered, oldest first.
#[must_use]
pub fn eligible_slices(slices: &[DimensionSlice]) -> Vec<&DimensionSlice> {
    let Some(threshold) = reorder_threshold(slices) else {
        return Vec::new();
    };
    let mut eligible: Vec<_> = slices
        .iter()
        .filter(|slice| slice.range_start <= threshold)
        .collect();
    eligible.sort_by_key(|slice| (slice.range_start, slice.id));
    eligible
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronodb_core::{DimensionId, SliceId};
    use proptest::prelude::*;

    fn slices(starts: &[i64]) -> Vec<DimensionSlice> {
        let mut sorted = starts.to_vec();
        sorted.sort_unstable();
        sorted
            .into_iter()
            .enumerate()
            .map(|(i, start)| DimensionSlice {
                id: SliceId::new(i as i32 + 1),
                dimension_id: DimensionId::new(1),
                range_start: start,
                range_end: start + 10,
            })
            .collect()
    }

    #[test]
    fn three_newest_slices_are_skipped() {
        let all = slices(&[0, 10, 20, 30, 40]);
        assert_eq!(reorder_threshold(&all), Some(10));

        let eligible: Vec<_> = eligible_slices(&all).iter().map(|s| s.range_start).collect();
        assert_eq!(eligible, vec![0, 10]);
    }

    #[test]
    fn three_slices_leave_nothing_to_reorder() {
        assert_eq!(reorder_threshold(&slices(&[0, 10, 20])), None);
        assert!(eligible_slices(&slices(&[0, 10, 20])).is_empty());
        assert!(eligible_slices(&[]).is_empty());
    }

    proptest! {
        #[test]
        fn fewer_than_four_slices_never_yield_a_threshold(
            starts in proptest::collection::btree_set(any::<i32>(), 0..4)
        ) {
            let starts: Vec<i64> = starts.into_iter().map(i64::from).collect();
            prop_assert!(eligible_slices(&slices(&starts)).is_empty());
        }

        #[test]
        fn newest_slices_are_never_eligible(
            starts in proptest::collection::btree_set(any::<i32>(), 4..40)
        ) {
            let starts: Vec<i64> = starts.into_iter().map(i64::from).collect();
            let all = slices(&starts);
            let eligible = eligible_slices(&all);

            prop_assert_eq!(eligible.len(), all.len() - REORDER_SKIP_RECENT_DIM_SLICES_N);
            for recent in &all[all.len() - REORDER_SKIP_RECENT_DIM_SLICES_N..] {
                prop_assert!(eligible.iter().all(|s| s.id != recent.id));
            }
            prop_assert!(eligible.windows(2).all(|w| w[0].range_start <= w[1].range_start));
        }
    }
}
