//! Dynamics compressor with a per-sample envelope follower.
//!
//! When the envelope exceeds `threshold` the output level follows
//! `threshold + (env - threshold) / ratio`, i.e. a 1/ratio slope above the
//! knee in the linear domain.

use mezcla_core::{BlockEffect, EnvelopeFollower, ModParams};

/// Dynamics compressor.
///
/// ## Parameters
///
/// | Name | Range | Default |
/// |------|-------|---------|
/// | `threshold` | 0.001–1.0 (linear) | 0.5 |
/// | `ratio` | 1.0–20.0 | 4.0 |
/// | `attack` | 0.0001–0.5 s | 0.01 |
/// | `release` | 0.001–2.0 s | 0.1 |
pub struct Compressor {
    params: ModParams,
    follower_l: EnvelopeFollower,
    follower_r: EnvelopeFollower,
    /// Attack/release currently installed in the followers.
    cached_times: (f32, f32),
}

impl Compressor {
    /// Create a compressor at the given engine rate with default parameters.
    pub fn new(sample_rate: u32) -> Self {
        let attack = 0.01;
        let release = 0.1;
        Self {
            params: ModParams::new(&[
                ("threshold", 0.5),
                ("ratio", 4.0),
                ("attack", attack),
                ("release", release),
            ]),
            follower_l: EnvelopeFollower::new(sample_rate as f32, attack, release),
            follower_r: EnvelopeFollower::new(sample_rate as f32, attack, release),
            cached_times: (attack, release),
        }
    }

    #[inline]
    fn process_channel(
        follower: &mut EnvelopeFollower,
        block: &mut [f32],
        threshold: f32,
        ratio: f32,
    ) {
        for sample in block.iter_mut() {
            let x = *sample;
            let env = follower.process(x);
            if env > threshold {
                let reduced = threshold + (env - threshold) / ratio;
                *sample = x * (reduced / env);
            }
        }
    }
}

impl BlockEffect for Compressor {
    fn name(&self) -> &'static str {
        "compressor"
    }

    fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        let threshold = self.params.value("threshold").clamp(0.001, 1.0);
        let ratio = self.params.value("ratio").clamp(1.0, 20.0);
        let attack = self.params.value("attack").clamp(0.0001, 0.5);
        let release = self.params.value("release").clamp(0.001, 2.0);

        if (attack, release) != self.cached_times {
            self.follower_l.set_times(attack, release);
            self.follower_r.set_times(attack, release);
            self.cached_times = (attack, release);
        }

        Self::process_channel(&mut self.follower_l, left, threshold, ratio);
        Self::process_channel(&mut self.follower_r, right, threshold, ratio);

        self.params.advance(left.len() as u64);
    }

    fn reset(&mut self) {
        self.follower_l.reset();
        self.follower_r.reset();
    }

    fn params_mut(&mut self) -> Option<&mut ModParams> {
        Some(&mut self.params)
    }
}
