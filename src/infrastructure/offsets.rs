use std::collections::{BTreeSet, HashMap};

/// Tracks which offsets of each partition are still being processed so that
/// only a contiguous prefix of finished messages is ever committed.
///
/// Workers finish out of order. Committing offset `n` tells the broker that
/// everything below `n` is handled, so the commit position may only move up
/// to the lowest offset that is still in flight.
#[derive(Debug, Default)]
pub struct OffsetTracker {
    partitions: HashMap<i32, PartitionOffsets>,
}

#[derive(Debug, Default)]
struct PartitionOffsets {
    in_flight: BTreeSet<i64>,
    highest_done: Option<i64>,
    committed: Option<i64>,
}

impl OffsetTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, partition: i32, offset: i64) {
        let entry = self.partitions.entry(partition).or_default();
        // The consumer went back (rebalance or restart of the partition); the
        // old bookkeeping no longer describes what the broker will send.
        if entry.committed.is_some_and(|committed| offset < committed) {
            *entry = PartitionOffsets::default();
        }
        entry.committed.get_or_insert(offset);
        entry.in_flight.insert(offset);
    }

    /// Mark `offset` finished. Returns the offset to commit (the next one to
    /// read) if the commit position moved forward.
    pub fn complete(&mut self, partition: i32, offset: i64) -> Option<i64> {
        let entry = self.partitions.get_mut(&partition)?;
        if !entry.in_flight.remove(&offset) {
            return None;
        }
        entry.highest_done = Some(entry.highest_done.map_or(offset, |h| h.max(offset)));

        let next = match entry.in_flight.first() {
            Some(&lowest) => lowest,
            None => entry.highest_done? + 1,
        };
        if entry.committed.is_some_and(|committed| next <= committed) {
            return None;
        }
        entry.committed = Some(next);
        Some(next)
    }

    pub fn in_flight(&self) -> usize {
        self.partitions.values().map(|p| p.in_flight.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_order_completion_commits_each_offset() {
        let mut tracker = OffsetTracker::new();
        tracker.begin(0, 10);
        tracker.begin(0, 11);
        assert_eq!(tracker.complete(0, 10), Some(11));
        assert_eq!(tracker.complete(0, 11), Some(12));
        assert_eq!(tracker.in_flight(), 0);
    }

    #[test]
    fn out_of_order_completion_waits_for_the_gap() {
        let mut tracker = OffsetTracker::new();
        for offset in 0..3 {
            tracker.begin(0, offset);
        }
        assert_eq!(tracker.complete(0, 2), None);
        assert_eq!(tracker.complete(0, 1), None);
        assert_eq!(tracker.complete(0, 0), Some(3));
    }

    #[test]
    fn unfinished_offset_pins_the_commit_position() {
        let mut tracker = OffsetTracker::new();
        for offset in 5..9 {
            tracker.begin(0, offset);
        }
        assert_eq!(tracker.complete(0, 5), Some(6));
        // 6 never finishes, e.g. its store write kept failing until shutdown.
        assert_eq!(tracker.complete(0, 7), None);
        assert_eq!(tracker.complete(0, 8), None);
        assert_eq!(tracker.in_flight(), 1);
    }

    #[test]
    fn partitions_are_independent() {
        let mut tracker = OffsetTracker::new();
        tracker.begin(0, 0);
        tracker.begin(1, 100);
        assert_eq!(tracker.complete(1, 100), Some(101));
        assert_eq!(tracker.complete(0, 0), Some(1));
    }

    #[test]
    fn unknown_offsets_are_ignored() {
        let mut tracker = OffsetTracker::new();
        assert_eq!(tracker.complete(3, 1), None);
        tracker.begin(0, 1);
        assert_eq!(tracker.complete(0, 2), None);
    }

    #[test]
    fn rewind_resets_the_partition() {
        let mut tracker = OffsetTracker::new();
        tracker.begin(0, 10);
        assert_eq!(tracker.complete(0, 10), Some(11));
        tracker.begin(0, 4);
        assert_eq!(tracker.complete(0, 4), Some(5));
    }
}
