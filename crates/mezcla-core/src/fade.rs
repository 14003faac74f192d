//! Sample-counted cosine volume fades.
//!
//! A [`Fade`] ramps a value from where it was when the ramp started to a
//! target over a fixed number of samples, following a raised-cosine curve.
//! The mixer reads the value once per block (at block start) and advances
//! the counter by one period afterwards, so the sequence of block-start
//! values is what playback observes. After `total` samples the value equals
//! the target exactly.

use crate::math::cosine_step;
use libm::roundf;

/// Convert a fade duration in seconds to a sample count at the engine rate.
///
/// This is `round(seconds * sample_rate)`. Negative durations count as zero.
#[inline]
pub fn fade_length(seconds: f32, sample_rate: u32) -> u64 {
    roundf(seconds.max(0.0) * sample_rate as f32) as u64
}

/// A cosine ramp between a start value and a target.
///
/// With no ramp in flight the fade just holds its target. Starting a new
/// ramp re-anchors the start at the current (possibly mid-ramp) value, so
/// chained fades never jump.
///
/// # Example
///
/// ```rust
/// use mezcla_core::Fade;
///
/// let mut volume = Fade::new(1.0);
/// volume.ramp_to(0.0, 4410); // 100 ms at 44.1 kHz
///
/// // Per block: read, then advance.
/// let gain = volume.value();
/// volume.advance(1024);
/// assert!(volume.value() < gain);
/// ```
#[derive(Debug, Clone)]
pub struct Fade {
    /// Value at ramp start.
    start: f32,
    /// Value at ramp end; also the held value when settled.
    target: f32,
    /// Ramp length in samples. 0 means settled.
    total: u64,
    /// Samples elapsed since ramp start.
    counter: u64,
}

impl Fade {
    /// Create a settled fade holding `value`.
    pub fn new(value: f32) -> Self {
        Self {
            start: value,
            target: value,
            total: 0,
            counter: 0,
        }
    }

    /// Current value, interpolated along the cosine curve.
    ///
    /// Returns the target exactly once the counter has run out.
    #[inline]
    pub fn value(&self) -> f32 {
        if self.total == 0 || self.counter >= self.total {
            self.target
        } else {
            let t = cosine_step(self.counter as f32 / self.total as f32);
            self.start + (self.target - self.start) * t
        }
    }

    /// The value this fade is heading towards (or holding).
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// Set the value immediately, cancelling any ramp in flight.
    pub fn set(&mut self, value: f32) {
        self.start = value;
        self.target = value;
        self.total = 0;
        self.counter = 0;
    }

    /// Start a ramp from the current value to `target` over `samples`.
    ///
    /// A zero-length ramp is an immediate set.
    pub fn ramp_to(&mut self, target: f32, samples: u64) {
        if samples == 0 {
            self.set(target);
            return;
        }
        self.start = self.value();
        self.target = target;
        self.total = samples;
        self.counter = 0;
    }

    /// Advance the ramp by `samples`.
    ///
    /// Returns `true` exactly once, on the advance that completes the ramp.
    /// Settled fades return `false`.
    pub fn advance(&mut self, samples: u64) -> bool {
        if self.is_settled() {
            return false;
        }
        self.counter = self.counter.saturating_add(samples);
        if self.counter >= self.total {
            self.start = self.target;
            self.total = 0;
            self.counter = 0;
            true
        } else {
            false
        }
    }

    /// Whether no ramp is in flight.
    #[inline]
    pub fn is_settled(&self) -> bool {
        self.total == 0 || self.counter >= self.total
    }
}
