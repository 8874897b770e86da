use std::collections::VecDeque;

/// A fixed-capacity, oldest-first sequence of samples.
///
/// Backs both the raw and normalized per-metric sequences in
/// [`crate::detector::host_metrics::HostMetrics`]. Pushing past capacity
/// drops the oldest entry, and shrinking capacity (via [`RingBuffer::set_capacity`],
/// used by reconfiguration) trims from the front immediately rather than
/// waiting for the next push — this bounds memory at `O(hosts × metrics ×
/// MaxSamples)` regardless of how often reconfiguration shrinks the window.
#[derive(Debug, Clone)]
pub struct RingBuffer {
    capacity: usize,
    data: VecDeque<f64>,
}

impl RingBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            data: VecDeque::with_capacity(capacity),
        }
    }

    pub fn seeded(capacity: usize, value: f64) -> Self {
        let mut buf = Self::with_capacity(capacity);
        buf.push(value);
        buf
    }

    pub fn push(&mut self, value: f64) {
        if self.data.len() == self.capacity {
            self.data.pop_front();
        }
        self.data.push_back(value);
    }

    pub fn last(&self) -> Option<f64> {
        self.data.back().copied()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.data.iter().copied()
    }

    pub fn sum(&self) -> f64 {
        self.iter().sum()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Resizes capacity, dropping oldest entries immediately if shrinking.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity.max(1);
        while self.data.len() > self.capacity {
            self.data.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_evicts_oldest_once_full() {
        let mut buf = RingBuffer::with_capacity(3);
        buf.push(1.0);
        buf.push(2.0);
        buf.push(3.0);
        buf.push(4.0);
        assert_eq!(buf.iter().collect::<Vec<_>>(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn shrinking_capacity_trims_from_front_immediately() {
        let mut buf = RingBuffer::with_capacity(5);
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            buf.push(v);
        }
        buf.set_capacity(3);
        assert_eq!(buf.iter().collect::<Vec<_>>(), vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn growing_capacity_keeps_existing_entries() {
        let mut buf = RingBuffer::with_capacity(2);
        buf.push(1.0);
        buf.push(2.0);
        buf.set_capacity(4);
        buf.push(3.0);
        assert_eq!(buf.iter().collect::<Vec<_>>(), vec![1.0, 2.0, 3.0]);
    }
}
