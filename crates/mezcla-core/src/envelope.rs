//! Envelope follower for tracking signal amplitude.
//!
//! Used by the compressor's per-sample gain computer.

use libm::expf;

/// Peak envelope follower with separate attack and release ballistics.
///
/// Exponential smoothing with the attack coefficient while the rectified
/// input rises above the envelope, and the release coefficient while it
/// falls below.
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    envelope: f32,
    attack_coeff: f32,
    release_coeff: f32,
    sample_rate: f32,
}

impl EnvelopeFollower {
    /// Create a follower with the given attack/release times in seconds.
    pub fn new(sample_rate: f32, attack_secs: f32, release_secs: f32) -> Self {
        let mut follower = Self {
            envelope: 0.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            sample_rate,
        };
        follower.set_times(attack_secs, release_secs);
        follower
    }

    /// Update attack and release times in seconds.
    ///
    /// The coefficient is `exp(-1 / (secs * sample_rate))`; times at or
    /// below one sample respond instantly.
    pub fn set_times(&mut self, attack_secs: f32, release_secs: f32) {
        self.attack_coeff = Self::coeff(attack_secs, self.sample_rate);
        self.release_coeff = Self::coeff(release_secs, self.sample_rate);
    }

    fn coeff(secs: f32, sample_rate: f32) -> f32 {
        let samples = secs * sample_rate;
        if samples < 1.0 {
            0.0
        } else {
            expf(-1.0 / samples)
        }
    }

    /// Process one sample and return the current envelope level.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let rectified = input.abs();
        let coeff = if rectified > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = coeff * self.envelope + (1.0 - coeff) * rectified;
        self.envelope
    }

    /// Current envelope level without advancing.
    pub fn level(&self) -> f32 {
        self.envelope
    }

    /// Reset the envelope to zero.
    pub fn reset(&mut self) {
        self.envelope = 0.0;
    }
}
