//! Splits a conceptual dataset of `total_items` into one contiguous slice per
//! worker.
//!
//! Every worker receives exactly `floor(total_items / worker_count)` items.
//! The remainder is never assigned to anyone: with 10 items and 3 workers,
//! item 9 is left unprocessed. Callers that depend on exact counts rely on
//! this, so it is kept as is.

use crate::{Error, Result};
use core::ops::Range;

/// The slice of the dataset owned by a single worker for the whole run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorkPartition {
    pub worker_index: usize,
    pub partition_size: u64,
    pub worker_count: usize,
}

impl WorkPartition {
    /// Index of the first dataset item owned by this partition.
    pub const fn first_item(&self) -> u64 {
        self.worker_index as u64 * self.partition_size
    }

    /// Half-open range of dataset items owned by this partition.
    pub const fn items(&self) -> Range<u64> {
        let start = self.first_item();
        start..start + self.partition_size
    }
}

/// Number of items each worker processes.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] when `worker_count` is zero.
pub fn partition_size(total_items: u64, worker_count: usize) -> Result<u64> {
    if worker_count == 0 {
        return Err(Error::invalid_config("worker count must be greater than 0"));
    }
    Ok(total_items / worker_count as u64)
}

/// Number of items left over after partitioning. These are never processed.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] when `worker_count` is zero.
pub fn unassigned_items(total_items: u64, worker_count: usize) -> Result<u64> {
    let size = partition_size(total_items, worker_count)?;
    Ok(total_items - size * worker_count as u64)
}

/// Builds the partition for every worker index in `0..worker_count`.
///
/// # Errors
///
/// Returns [`Error::InvalidConfig`] when `worker_count` is zero.
pub fn partitions(total_items: u64, worker_count: usize) -> Result<Vec<WorkPartition>> {
    let partition_size = partition_size(total_items, worker_count)?;
    Ok((0..worker_count)
        .map(|worker_index| WorkPartition {
            worker_index,
            partition_size,
            worker_count,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_workers_is_rejected() {
        assert!(matches!(
            partition_size(10, 0),
            Err(Error::InvalidConfig { .. })
        ));
        assert!(partitions(10, 0).is_err());
        assert!(unassigned_items(10, 0).is_err());
    }

    #[test]
    fn even_split_covers_everything() {
        let parts = partitions(10, 2).unwrap();
        assert_eq!(parts.len(), 2);
        assert!(parts.iter().all(|p| p.partition_size == 5));
        assert_eq!(unassigned_items(10, 2).unwrap(), 0);
    }

    #[test]
    fn remainder_is_dropped() {
        let parts = partitions(10, 3).unwrap();
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.partition_size == 3));
        assert_eq!(unassigned_items(10, 3).unwrap(), 1);
    }

    #[test]
    fn more_workers_than_items() {
        let parts = partitions(3, 8).unwrap();
        assert_eq!(parts.len(), 8);
        assert!(parts.iter().all(|p| p.items().is_empty()));
        assert_eq!(unassigned_items(3, 8).unwrap(), 3);
    }

    #[test]
    fn slices_are_contiguous_and_disjoint() {
        let parts = partitions(103, 4).unwrap();
        let mut next = 0;
        for (i, part) in parts.iter().enumerate() {
            assert_eq!(part.worker_index, i);
            assert_eq!(part.worker_count, 4);
            assert_eq!(part.items().start, next);
            next = part.items().end;
        }
        assert_eq!(next, 100);
    }

    #[test]
    fn assigned_plus_unassigned_is_total() {
        for total in [0_u64, 1, 7, 10, 99, 1_000, 1_000_003] {
            for workers in 1..=17_usize {
                let assigned: u64 = partitions(total, workers)
                    .unwrap()
                    .iter()
                    .map(|p| p.partition_size)
                    .sum();
                assert_eq!(assigned, total - total % workers as u64);
                assert_eq!(
                    assigned + unassigned_items(total, workers).unwrap(),
                    total
                );
            }
        }
    }
}
