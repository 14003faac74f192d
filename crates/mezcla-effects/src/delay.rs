//! Single-tap delay effect.
//!
//! One tap into a persistent input ring per channel:
//!
//! ```text
//! y[n] = x[n] + wet_level * feedback * x[n - round(delay_time * rate)]
//! ```
//!
//! `delay_time` is in seconds and is converted with the engine rate, never
//! a hard-coded one. The ring holds up to [`MAX_DELAY_SECS`] of history.

use libm::roundf;
use mezcla_core::{BlockEffect, DelayRing, ModParams};

/// Maximum delay time in seconds; sizes the rings at construction.
pub const MAX_DELAY_SECS: f32 = 2.0;

/// Single-tap delay.
///
/// ## Parameters
///
/// | Name | Range | Default |
/// |------|-------|---------|
/// | `delay_time` | 0.0–2.0 s | 0.3 |
/// | `feedback` | 0.0–1.0 | 0.4 |
/// | `wet_level` | 0.0–1.0 | 0.5 |
pub struct Delay {
    params: ModParams,
    sample_rate: f32,
    ring_l: DelayRing,
    ring_r: DelayRing,
}

impl Delay {
    /// Create a delay at the given engine rate with default parameters.
    pub fn new(sample_rate: u32) -> Self {
        let capacity = (MAX_DELAY_SECS * sample_rate as f32) as usize + 1;
        Self {
            params: ModParams::new(&[
                ("delay_time", 0.3),
                ("feedback", 0.4),
                ("wet_level", 0.5),
            ]),
            sample_rate: sample_rate as f32,
            ring_l: DelayRing::new(capacity),
            ring_r: DelayRing::new(capacity),
        }
    }

    #[inline]
    fn process_channel(ring: &mut DelayRing, block: &mut [f32], tap: usize, level: f32) {
        for sample in block.iter_mut() {
            let x = *sample;
            ring.write(x);
            *sample = x + level * ring.tap(tap);
        }
    }
}

impl BlockEffect for Delay {
    fn name(&self) -> &'static str {
        "delay"
    }

    fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        let time = self.params.value("delay_time").clamp(0.0, MAX_DELAY_SECS);
        let feedback = self.params.value("feedback").clamp(0.0, 1.0);
        let wet = self.params.value("wet_level").clamp(0.0, 1.0);

        let tap = (roundf(time * self.sample_rate) as usize).min(self.ring_l.capacity() - 1);
        let level = wet * feedback;

        Self::process_channel(&mut self.ring_l, left, tap, level);
        Self::process_channel(&mut self.ring_r, right, tap, level);

        self.params.advance(left.len() as u64);
    }

    fn reset(&mut self) {
        self.ring_l.clear();
        self.ring_r.clear();
    }

    fn params_mut(&mut self) -> Option<&mut ModParams> {
        Some(&mut self.params)
    }
}
