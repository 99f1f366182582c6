//! Bounded history of recently processed payloads.
//!
//! Items are ordered by recency: the head (front) is the payload pushed most
//! recently, the tail (back) the oldest one still retained. The encoder keeps
//! the bound equal to the configured RED distance, so once the history is
//! full the tail is exactly `distance` frames behind the current one.

use bytes::Bytes;
use std::collections::VecDeque;

/// A payload retained for possible reuse as a redundant block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryItem {
    // ---
    /// Payload type of the frame the payload came from
    pub payload_type: u8,

    /// RTP timestamp of that frame
    pub timestamp: u32,

    /// The payload itself (shared with whatever was forwarded)
    pub payload: Bytes,
}

/// Ring of the most recent payloads, newest first.
#[derive(Debug, Default)]
pub struct HistoryBuffer {
    // ---
    items: VecDeque<HistoryItem>,
}

impl HistoryBuffer {
    // ---
    /// Creates an empty history.
    pub fn new() -> Self {
        // ---
        Self::default()
    }

    /// Number of retained payloads.
    pub fn len(&self) -> usize {
        // ---
        self.items.len()
    }

    /// Returns `true` if nothing is retained.
    pub fn is_empty(&self) -> bool {
        // ---
        self.items.is_empty()
    }

    /// Records a payload at the head of the history.
    ///
    /// With `bound == 0` the payload is dropped without being retained. When
    /// the history already holds `bound` items the oldest slot is recycled
    /// for the new payload instead of growing the buffer.
    pub fn push(&mut self, payload_type: u8, timestamp: u32, payload: Bytes, bound: usize) {
        // ---
        if bound == 0 {
            return;
        }

        if self.items.len() >= bound {
            self.trim(bound);
            if let Some(mut slot) = self.items.pop_back() {
                slot.payload_type = payload_type;
                slot.timestamp = timestamp;
                slot.payload = payload;
                self.items.push_front(slot);
                return;
            }
        }

        self.items.push_front(HistoryItem {
            payload_type,
            timestamp,
            payload,
        });
    }

    /// Evicts from the tail until at most `bound` items remain.
    pub fn trim(&mut self, bound: usize) {
        // ---
        if self.items.len() > bound {
            self.items.truncate(bound);
        }
    }

    /// The oldest retained payload, which the encoder carries as the
    /// redundant block.
    ///
    /// With a full history this is the payload from `bound` frames ago;
    /// during warm-up it is the furthest-back payload available so far.
    pub fn oldest(&self) -> Option<&HistoryItem> {
        // ---
        self.items.back()
    }

    /// The most recently pushed payload.
    pub fn newest(&self) -> Option<&HistoryItem> {
        // ---
        self.items.front()
    }

    /// Iterates from newest to oldest.
    pub fn iter(&self) -> impl Iterator<Item = &HistoryItem> {
        // ---
        self.items.iter()
    }

    /// Drops everything.
    pub fn clear(&mut self) {
        // ---
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    fn push_ts(history: &mut HistoryBuffer, ts: u32, bound: usize) {
        history.push(96, ts, Bytes::from(ts.to_be_bytes().to_vec()), bound);
    }

    fn timestamps(history: &HistoryBuffer) -> Vec<u32> {
        history.iter().map(|item| item.timestamp).collect()
    }

    #[test]
    fn test_zero_bound_retains_nothing() {
        // ---
        let mut history = HistoryBuffer::new();
        push_ts(&mut history, 100, 0);

        assert!(history.is_empty());
        assert!(history.oldest().is_none());
    }

    #[test]
    fn test_push_orders_newest_first() {
        // ---
        let mut history = HistoryBuffer::new();
        for ts in [100, 200, 300] {
            push_ts(&mut history, ts, 3);
        }

        assert_eq!(timestamps(&history), vec![300, 200, 100]);
        assert_eq!(history.newest().map(|i| i.timestamp), Some(300));
        assert_eq!(history.oldest().map(|i| i.timestamp), Some(100));
    }

    #[test]
    fn test_push_at_capacity_evicts_oldest() {
        // ---
        let mut history = HistoryBuffer::new();
        for ts in [100, 200, 300, 400] {
            push_ts(&mut history, ts, 2);
        }

        assert_eq!(timestamps(&history), vec![400, 300]);
        let candidate = history.oldest().expect("candidate");
        assert_eq!(candidate.timestamp, 300);
        assert_eq!(&candidate.payload[..], &300u32.to_be_bytes());
    }

    #[test]
    fn test_push_with_smaller_bound_than_contents() {
        // ---
        let mut history = HistoryBuffer::new();
        for ts in [1, 2, 3, 4] {
            push_ts(&mut history, ts, 4);
        }
        push_ts(&mut history, 5, 2);

        assert_eq!(timestamps(&history), vec![5, 4]);
    }

    #[test]
    fn test_trim_is_idempotent() {
        // ---
        let mut history = HistoryBuffer::new();
        for ts in [1, 2, 3] {
            push_ts(&mut history, ts, 3);
        }

        history.trim(5);
        assert_eq!(history.len(), 3);

        history.trim(1);
        history.trim(1);
        assert_eq!(timestamps(&history), vec![3]);

        history.trim(0);
        assert!(history.is_empty());
    }

    #[test]
    fn test_retained_payload_is_shared_not_copied() {
        // ---
        let payload = Bytes::from_static(b"opus-frame");
        let mut history = HistoryBuffer::new();
        history.push(111, 960, payload.clone(), 1);

        let item = history.newest().expect("item");
        assert_eq!(item.payload.as_ptr(), payload.as_ptr());
    }
}
