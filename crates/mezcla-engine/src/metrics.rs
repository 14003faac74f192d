//! Per-block engine metrics.
//!
//! Updated by the mixer after every master block and by the output pump on
//! write failures; readable from any thread.

use mezcla_core::{block_peak, block_rms};
use parking_lot::Mutex;

/// Ballistic peak decay applied before taking the max with the block peak.
const PEAK_DECAY: f32 = 0.95;

/// A point-in-time copy of the engine metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    /// Ballistic peak per channel (decayed, then maxed with each block).
    pub peak: [f32; 2],
    /// RMS per channel, recomputed each block.
    pub rms: [f32; 2],
    /// Blocks whose pre-limiter absolute peak reached 1.0.
    pub clip_count: u64,
    /// Output writes that failed; each one is a dropped block.
    pub underrun_count: u64,
    /// Mix wall time over the period duration, in percent.
    pub cpu_usage: f32,
}

/// Shared metrics store.
#[derive(Debug, Default)]
pub struct Metrics {
    inner: Mutex<MetricsSnapshot>,
}

impl Metrics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Copy out the current values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        *self.inner.lock()
    }

    /// Zero everything.
    pub fn reset(&self) {
        *self.inner.lock() = MetricsSnapshot::default();
    }

    /// Observe one mixed master block.
    ///
    /// `pre_limiter_peak` is the absolute max after the master volume scale
    /// but before the limiter; `left`/`right` are the delivered samples.
    pub(crate) fn record_block(
        &self,
        left: &[f32],
        right: &[f32],
        pre_limiter_peak: f32,
        cpu_usage: f32,
    ) {
        let mut inner = self.inner.lock();
        for (ch, block) in [left, right].into_iter().enumerate() {
            inner.peak[ch] = (inner.peak[ch] * PEAK_DECAY).max(block_peak(block));
            inner.rms[ch] = block_rms(block);
        }
        if pre_limiter_peak >= 1.0 {
            inner.clip_count += 1;
        }
        inner.cpu_usage = cpu_usage;
    }

    /// Count one failed output write.
    pub(crate) fn record_underrun(&self) {
        self.inner.lock().underrun_count += 1;
    }
}
