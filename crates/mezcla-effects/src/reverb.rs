//! Fixed-tap reverb with persistent delay rings.
//!
//! Three taps per channel, decayed and damped, blended with the dry
//! signal:
//!
//! ```text
//! y[n] = dry_level * x[n]
//!      + wet_level * room_size * sum_k decay_k * (1 - damping) * x[n - d_k]
//! ```
//!
//! The tap history lives in per-channel [`DelayRing`]s that survive across
//! blocks, so tails are not truncated at block boundaries. Tap offsets are
//! tuned at a 44.1 kHz reference and scaled to the engine rate.

use libm::roundf;
use mezcla_core::{BlockEffect, DelayRing, ModParams};

/// Tap delays in frames at the 44.1 kHz reference rate.
const TAP_FRAMES_44K: [usize; 3] = [1323, 2205, 3087];

/// Base decay per tap, before damping.
const TAP_DECAYS: [f32; 3] = [0.6, 0.4, 0.3];

/// Reference sample rate for the tap constants.
const REFERENCE_RATE: f32 = 44100.0;

/// Scale a tap offset from the 44.1 kHz reference to the target rate.
fn scale_to_rate(frames: usize, target_rate: f32) -> usize {
    (roundf(frames as f32 * target_rate / REFERENCE_RATE) as usize).max(1)
}

/// Fixed-tap reverb.
///
/// ## Parameters
///
/// | Name | Range | Default |
/// |------|-------|---------|
/// | `room_size` | 0.0–1.0 | 0.5 |
/// | `damping` | 0.0–1.0 | 0.5 |
/// | `wet_level` | 0.0–1.0 | 0.5 |
/// | `dry_level` | 0.0–1.0 | 1.0 |
pub struct Reverb {
    params: ModParams,
    taps: [usize; 3],
    ring_l: DelayRing,
    ring_r: DelayRing,
}

impl Reverb {
    /// Create a reverb at the given engine rate with default parameters.
    pub fn new(sample_rate: u32) -> Self {
        let taps: [usize; 3] =
            core::array::from_fn(|i| scale_to_rate(TAP_FRAMES_44K[i], sample_rate as f32));
        let capacity = taps[2] + 1;
        Self {
            params: ModParams::new(&[
                ("room_size", 0.5),
                ("damping", 0.5),
                ("wet_level", 0.5),
                ("dry_level", 1.0),
            ]),
            taps,
            ring_l: DelayRing::new(capacity),
            ring_r: DelayRing::new(capacity),
        }
    }

    #[inline]
    fn process_channel(
        ring: &mut DelayRing,
        block: &mut [f32],
        taps: &[usize; 3],
        decays: &[f32; 3],
        room: f32,
        wet: f32,
        dry: f32,
    ) {
        for sample in block.iter_mut() {
            let x = *sample;
            ring.write(x);
            let mut wet_sum = 0.0f32;
            for (tap, decay) in taps.iter().zip(decays.iter()) {
                wet_sum += decay * ring.tap(*tap);
            }
            *sample = dry * x + wet * wet_sum * room;
        }
    }
}

impl BlockEffect for Reverb {
    fn name(&self) -> &'static str {
        "reverb"
    }

    fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        let room = self.params.value("room_size").clamp(0.0, 1.0);
        let damping = self.params.value("damping").clamp(0.0, 1.0);
        let wet = self.params.value("wet_level").max(0.0);
        let dry = self.params.value("dry_level").max(0.0);
        let decays: [f32; 3] = core::array::from_fn(|i| TAP_DECAYS[i] * (1.0 - damping));

        Self::process_channel(&mut self.ring_l, left, &self.taps, &decays, room, wet, dry);
        Self::process_channel(&mut self.ring_r, right, &self.taps, &decays, room, wet, dry);

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
