//! Bounded, priority-aware queue of pending samples.
//!
//! Backpressure policy for a real-time filter: staleness is worse than
//! incompleteness, so under pressure the newest sample wins. A
//! high-priority arrival displaces the oldest normal-priority resident;
//! any other arrival displaces the oldest resident outright.

use std::collections::VecDeque;

use crate::capture::Sample;

/// FIFO-per-priority queue with most-recent-wins eviction.
#[derive(Debug)]
pub struct ProcessingQueue {
    items: VecDeque<Sample>,
    capacity: usize,
    /// Total samples admitted (for metrics).
    total_enqueued: u64,
    /// Total samples evicted under pressure.
    total_evicted: u64,
}

impl ProcessingQueue {
    /// Creates a queue holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            total_enqueued: 0,
            total_evicted: 0,
        }
    }

    /// Admits a sample, evicting one resident when at capacity.
    ///
    /// Returns the evicted sample so the caller can release its element's
    /// in-flight state; eviction is a terminal outcome for that sample.
    pub fn enqueue(&mut self, sample: Sample) -> Option<Sample> {
        let evicted = if self.items.len() >= self.capacity {
            let victim = if sample.priority().is_high() {
                self.items
                    .iter()
                    .position(|s| !s.priority().is_high())
                    .unwrap_or(0)
            } else {
                0
            };
            self.items.remove(victim)
        } else {
            None
        };

        if let Some(victim) = &evicted {
            self.total_evicted += 1;
            tracing::trace!(
                sample = %victim.sample_id(),
                queue_len = self.items.len(),
                "Evicted stale sample"
            );
        }

        self.items.push_back(sample);
        self.total_enqueued += 1;
        evicted
    }

    /// Pops the next sample: high priority first, oldest first per class.
    pub fn dequeue(&mut self) -> Option<Sample> {
        let index = self
            .items
            .iter()
            .position(|s| s.priority().is_high())
            .unwrap_or(0);
        self.items.remove(index)
    }

    /// Samples currently resident.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True when nothing is queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Configured capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total samples ever admitted.
    pub fn total_enqueued(&self) -> u64 {
        self.total_enqueued
    }

    /// Total samples evicted under pressure.
    pub fn total_evicted(&self) -> u64 {
        self.total_evicted
    }

    /// Drops every queued sample, returning them so per-element state can
    /// be released (disable or page teardown).
    pub fn clear(&mut self) -> Vec<Sample> {
        self.items.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{Priority, SampleImage};
    use crate::surface::{ElementId, ElementKind};
    use proptest::prelude::*;
    use std::time::Instant;

    fn sample(sequence: u64, priority: Priority) -> Sample {
        Sample::new(
            sequence,
            ElementId::new(sequence),
            ElementKind::Image,
            priority,
            SampleImage {
                jpeg: vec![0xFF, 0xD8, 0xFF, 0xD9],
                width: 1,
                height: 1,
            },
            Instant::now(),
        )
    }

    #[test]
    fn test_capacity_never_exceeded() {
        let mut queue = ProcessingQueue::new(3);
        for seq in 0..4 {
            queue.enqueue(sample(seq, Priority::Normal));
        }

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.total_evicted(), 1);
    }

    #[test]
    fn test_all_normal_evicts_oldest() {
        let mut queue = ProcessingQueue::new(2);
        queue.enqueue(sample(1, Priority::Normal));
        queue.enqueue(sample(2, Priority::Normal));

        let evicted = queue.enqueue(sample(3, Priority::Normal)).unwrap();

        assert_eq!(evicted.sequence(), 1);
        assert_eq!(queue.dequeue().unwrap().sequence(), 2);
        assert_eq!(queue.dequeue().unwrap().sequence(), 3);
    }

    #[test]
    fn test_high_arrival_displaces_normal_resident() {
        let mut queue = ProcessingQueue::new(3);
        queue.enqueue(sample(1, Priority::High));
        queue.enqueue(sample(2, Priority::Normal));
        queue.enqueue(sample(3, Priority::Normal));

        let evicted = queue.enqueue(sample(4, Priority::High)).unwrap();

        // The oldest normal resident goes, never the high one.
        assert_eq!(evicted.sequence(), 2);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_high_arrival_into_all_high_evicts_oldest() {
        let mut queue = ProcessingQueue::new(2);
        queue.enqueue(sample(1, Priority::High));
        queue.enqueue(sample(2, Priority::High));

        let evicted = queue.enqueue(sample(3, Priority::High)).unwrap();
        assert_eq!(evicted.sequence(), 1);
    }

    #[test]
    fn test_dequeue_priority_then_fifo() {
        let mut queue = ProcessingQueue::new(10);
        queue.enqueue(sample(1, Priority::Normal));
        queue.enqueue(sample(2, Priority::High));
        queue.enqueue(sample(3, Priority::Normal));
        queue.enqueue(sample(4, Priority::High));

        let order: Vec<u64> = std::iter::from_fn(|| queue.dequeue())
            .map(|s| s.sequence())
            .collect();

        assert_eq!(order, vec![2, 4, 1, 3]);
    }

    #[test]
    fn test_clear_returns_residents() {
        let mut queue = ProcessingQueue::new(4);
        queue.enqueue(sample(1, Priority::Normal));
        queue.enqueue(sample(2, Priority::High));

        let drained = queue.clear();

        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty());
    }

    proptest! {
        #[test]
        fn prop_len_bounded_and_accounted(priorities in prop::collection::vec(prop::bool::ANY, 0..64)) {
            let mut queue = ProcessingQueue::new(5);
            for (seq, is_high) in priorities.into_iter().enumerate() {
                let priority = if is_high { Priority::High } else { Priority::Normal };
                queue.enqueue(sample(seq as u64, priority));
                prop_assert!(queue.len() <= 5);
            }
            prop_assert_eq!(
                queue.total_enqueued() - queue.total_evicted(),
                queue.len() as u64
            );
        }

        #[test]
        fn prop_high_arrival_always_displaces_normal(filler in prop::collection::vec(prop::bool::ANY, 5)) {
            let mut queue = ProcessingQueue::new(5);
            let normals = filler.iter().filter(|is_high| !**is_high).count();
            for (seq, is_high) in filler.iter().enumerate() {
                let priority = if *is_high { Priority::High } else { Priority::Normal };
                queue.enqueue(sample(seq as u64, priority));
            }

            let evicted = queue.enqueue(sample(99, Priority::High)).unwrap();
            if normals > 0 {
                prop_assert!(!evicted.priority().is_high());
            }
        }
    }
}
