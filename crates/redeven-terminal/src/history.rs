use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// One stamped output chunk retained in a session's history ring.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryChunk {
    /// Strictly increasing per-session sequence number.
    pub sequence: u64,
    /// When this chunk was produced.
    pub timestamp_ms: i64,
    /// The raw PTY output bytes.
    pub bytes: Vec<u8>,
}

/// A bounded, sequence-stamped ring of recent PTY output, evicting the
/// oldest chunks once `budget_bytes` is exceeded.
///
/// Sequence numbers are monotonic and gap-free while a chunk is held in
/// memory; [`HistoryRing::clear`] drops all retained chunks but the
/// sequence counter keeps counting up rather than resetting to `1`.
#[derive(Debug)]
pub struct HistoryRing {
    budget_bytes: usize,
    total_bytes: usize,
    next_sequence: u64,
    chunks: VecDeque<HistoryChunk>,
}

impl HistoryRing {
    /// Create an empty ring with the given byte budget.
    #[must_use]
    pub fn new(budget_bytes: usize) -> Self {
        Self { budget_bytes, total_bytes: 0, next_sequence: 1, chunks: VecDeque::new() }
    }

    /// Stamp and append `bytes`, evicting the oldest chunks if the budget
    /// is exceeded. Returns the stamped chunk.
    pub fn push(&mut self, bytes: Vec<u8>, timestamp_ms: i64) -> HistoryChunk {
        let chunk = HistoryChunk { sequence: self.next_sequence, timestamp_ms, bytes };
        self.next_sequence = self.next_sequence.saturating_add(1);
        self.total_bytes = self.total_bytes.saturating_add(chunk.bytes.len());
        self.chunks.push_back(chunk.clone());

        while self.total_bytes > self.budget_bytes {
            let Some(evicted) = self.chunks.pop_front() else { break };
            self.total_bytes = self.total_bytes.saturating_sub(evicted.bytes.len());
        }

        chunk
    }

    /// Return the retained chunks intersecting `[start..=end]`, in
    /// increasing-sequence order. `end == 0` means "up to latest".
    #[must_use]
    pub fn range(&self, start: u64, end: u64) -> Vec<HistoryChunk> {
        let end = if end == 0 { u64::MAX } else { end };
        self.chunks.iter().filter(|chunk| chunk.sequence >= start && chunk.sequence <= end).cloned().collect()
    }

    /// Drop all retained chunks without touching the sequence counter.
    pub fn clear(&mut self) {
        self.chunks.clear();
        self.total_bytes = 0;
    }

    /// Total bytes currently retained.
    #[must_use]
    pub const fn total_bytes(&self) -> usize {
        self.total_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_are_gap_free_while_retained() {
        let mut ring = HistoryRing::new(1_000_000);
        for i in 0..5 {
            let chunk = ring.push(vec![i], 0);
            assert_eq!(chunk.sequence, u64::from(i) + 1);
        }
    }

    #[test]
    fn eviction_drops_oldest_first() {
        let mut ring = HistoryRing::new(10);
        for _ in 0..5 {
            ring.push(vec![0_u8; 4], 0);
        }
        assert!(ring.total_bytes() <= 10);
        let retained = ring.range(1, 0);
        assert!(retained.first().unwrap().sequence > 1);
    }

    #[test]
    fn range_intersects_retained_with_request() {
        let mut ring = HistoryRing::new(1_000_000);
        for _ in 0..1000 {
            ring.push(vec![0_u8], 0);
        }
        let chunks = ring.range(401, 1000);
        assert_eq!(chunks.len(), 600);
        assert_eq!(chunks.first().unwrap().sequence, 401);
        assert_eq!(chunks.last().unwrap().sequence, 1000);
    }

    #[test]
    fn clear_drops_history_but_sequence_keeps_increasing() {
        let mut ring = HistoryRing::new(1_000_000);
        ring.push(vec![1], 0);
        ring.push(vec![2], 0);
        ring.clear();
        assert_eq!(ring.total_bytes(), 0);
        assert!(ring.range(1, 0).is_empty());
        let chunk = ring.push(vec![3], 0);
        assert_eq!(chunk.sequence, 3);
    }

    #[test]
    fn end_zero_means_up_to_latest() {
        let mut ring = HistoryRing::new(1_000_000);
        ring.push(vec![1], 0);
        ring.push(vec![2], 0);
        assert_eq!(ring.range(1, 0).len(), 2);
    }
}
