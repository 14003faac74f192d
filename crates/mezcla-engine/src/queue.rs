//! Bounded block handoff between the mixer and the output pump.
//!
//! Two bounded channels form a single-producer/single-consumer loop: the
//! mixer takes an empty block from the free lane, fills it, and commits it
//! to the filled lane; the pump drains the filled lane and recycles blocks
//! back. All blocks are allocated up front, so the steady-state mix path
//! never touches the heap. When every block is in flight the mixer parks
//! on the free lane, which is the queue-full backpressure of the design.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::time::Duration;

/// Mixer side of the handoff.
pub(crate) struct BlockProducer {
    filled: Sender<Vec<f32>>,
    free: Receiver<Vec<f32>>,
}

/// Pump side of the handoff.
pub(crate) struct BlockConsumer {
    filled: Receiver<Vec<f32>>,
    free: Sender<Vec<f32>>,
}

/// Create a handoff of `blocks` preallocated interleaved blocks of
/// `samples_per_block` samples each.
pub(crate) fn block_queue(
    blocks: usize,
    samples_per_block: usize,
) -> (BlockProducer, BlockConsumer) {
    let (filled_tx, filled_rx) = bounded(blocks);
    let (free_tx, free_rx) = bounded(blocks);
    for _ in 0..blocks {
        free_tx
            .send(vec![0.0; samples_per_block])
            .expect("free lane sized to hold every block");
    }
    (
        BlockProducer {
            filled: filled_tx,
            free: free_rx,
        },
        BlockConsumer {
            filled: filled_rx,
            free: free_tx,
        },
    )
}

impl BlockProducer {
    /// Take an empty block, waiting up to `timeout` for one to come back.
    ///
    /// `None` means the queue is still full (or the consumer is gone); the
    /// caller should re-check its running flag and try again.
    pub(crate) fn begin(&self, timeout: Duration) -> Option<Vec<f32>> {
        match self.free.recv_timeout(timeout) {
            Ok(block) => Some(block),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Hand a filled block to the consumer. Returns `false` if the consumer
    /// side has shut down.
    pub(crate) fn commit(&self, block: Vec<f32>) -> bool {
        self.filled.send(block).is_ok()
    }
}

impl BlockConsumer {
    /// Take the next filled block, waiting up to `timeout`.
    pub(crate) fn next(&self, timeout: Duration) -> Option<Vec<f32>> {
        match self.filled.recv_timeout(timeout) {
            Ok(block) => Some(block),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Return a drained block to the free lane.
    pub(crate) fn recycle(&self, block: Vec<f32>) {
        let _ = self.free.send(block);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(50);

    #[test]
    fn blocks_round_trip() {
        let (producer, consumer) = block_queue(2, 4);

        let mut block = producer.begin(TIMEOUT).unwrap();
        block.fill(0.5);
        assert!(producer.commit(block));

        let got = consumer.next(TIMEOUT).unwrap();
        assert_eq!(got, vec![0.5; 4]);
        consumer.recycle(got);

        // The recycled block comes back to the producer.
        assert!(producer.begin(TIMEOUT).is_some());
    }

    #[test]
    fn producer_blocks_when_all_blocks_in_flight() {
        let (producer, _consumer) = block_queue(2, 4);
        let a = producer.begin(TIMEOUT).unwrap();
        let b = producer.begin(TIMEOUT).unwrap();
        producer.commit(a);
        producer.commit(b);
        // Nothing recycled: the free lane is empty.
        assert!(producer.begin(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn consumer_times_out_on_empty_queue() {
        let (_producer, consumer) = block_queue(2, 4);
        assert!(consumer.next(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn preallocated_block_count_matches() {
        let (producer, _consumer) = block_queue(3, 8);
        assert!(producer.begin(TIMEOUT).is_some());
        assert!(producer.begin(TIMEOUT).is_some());
        assert!(producer.begin(TIMEOUT).is_some());
        assert!(producer.begin(Duration::from_millis(10)).is_none());
    }
}
