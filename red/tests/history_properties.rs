//! Property tests for the history bound and recency ordering.

use bytes::Bytes;
use proptest::prelude::*;
use rtp_red::HistoryBuffer;

#[derive(Debug, Clone)]
enum Op {
    Push(usize),
    Trim(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0usize..8).prop_map(Op::Push),
        1 => (0usize..8).prop_map(Op::Trim),
    ]
}

proptest! {
    /// Trim-then-push with the same bound, as the encoder does per frame,
    /// never leaves more items than that bound.
    #[test]
    fn prop_history_never_exceeds_bound(ops in prop::collection::vec(op(), 0..64)) {
        let mut history = HistoryBuffer::new();
        for (ts, op) in ops.into_iter().enumerate() {
            match op {
                Op::Push(bound) => {
                    history.trim(bound);
                    history.push(96, ts as u32, Bytes::new(), bound);
                    prop_assert!(history.len() <= bound);
                }
                Op::Trim(bound) => {
                    history.trim(bound);
                    prop_assert!(history.len() <= bound);
                }
            }
        }
    }

    /// With increasing timestamps the head is always the latest push and the
    /// tail is the oldest one the bound still allows.
    #[test]
    fn prop_history_keeps_recency_order(
        bound in 1usize..8,
        count in 1usize..40,
    ) {
        let mut history = HistoryBuffer::new();
        for i in 0..count {
            history.push(96, (i as u32) * 960, Bytes::new(), bound);

            prop_assert_eq!(history.newest().map(|item| item.timestamp), Some(i as u32 * 960));

            let oldest = i.saturating_sub(bound - 1);
            prop_assert_eq!(
                history.oldest().map(|item| item.timestamp),
                Some(oldest as u32 * 960)
            );

            let timestamps: Vec<u32> = history.iter().map(|item| item.timestamp).collect();
            prop_assert!(timestamps.windows(2).all(|w| w[0] > w[1]));
        }
    }
}
