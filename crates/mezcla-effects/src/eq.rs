//! Order-4 Butterworth EQ blend.
//!
//! Filters the signal with a two-section Butterworth cascade of the chosen
//! band kind, then blends the filtered difference back in proportion to
//! the gain:
//!
//! ```text
//! y = x + (filt(x) - x) * (10^(gain/20) - 1)
//! ```
//!
//! At 0 dB the blend factor is zero and the effect is a bit-exact
//! passthrough. The coefficient design lives in [`mezcla_core::biquad`].

use mezcla_core::{
    Biquad, BlockEffect, FilterKind, ModParams, butterworth_coefficients, db_gain_delta,
};

/// Modulable EQ filter with a fixed band kind.
///
/// ## Parameters
///
/// | Name | Range | Default |
/// |------|-------|---------|
/// | `frequency` | 20 Hz – 0.49 × rate | 1000.0 |
/// | `q` | 0.1–20.0 | 0.707 |
/// | `gain` | −24.0–24.0 dB | 0.0 |
pub struct EqFilter {
    params: ModParams,
    kind: FilterKind,
    sample_rate: f32,
    // Two cascade sections per channel.
    sections_l: [Biquad; 2],
    sections_r: [Biquad; 2],
    /// (frequency, q) currently installed in the sections.
    cached_design: (f32, f32),
}

impl EqFilter {
    /// Create an EQ of the given band kind at the engine rate.
    pub fn new(sample_rate: u32, kind: FilterKind) -> Self {
        let frequency = 1000.0;
        let q = core::f32::consts::FRAC_1_SQRT_2;
        let mut eq = Self {
            params: ModParams::new(&[("frequency", frequency), ("q", q), ("gain", 0.0)]),
            kind,
            sample_rate: sample_rate as f32,
            sections_l: [Biquad::new(), Biquad::new()],
            sections_r: [Biquad::new(), Biquad::new()],
            cached_design: (0.0, 0.0),
        };
        eq.install_coefficients(frequency, q);
        eq
    }

    /// The band kind this instance was built with.
    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    fn install_coefficients(&mut self, frequency: f32, q: f32) {
        let coeffs = butterworth_coefficients(self.kind, frequency, q, self.sample_rate);
        for (section, c) in self.sections_l.iter_mut().zip(coeffs.iter()) {
            section.set_coefficients(*c);
        }
        for (section, c) in self.sections_r.iter_mut().zip(coeffs.iter()) {
            section.set_coefficients(*c);
        }
        self.cached_design = (frequency, q);
    }

    #[inline]
    fn process_channel(sections: &mut [Biquad; 2], block: &mut [f32], blend: f32) {
        for sample in block.iter_mut() {
            let x = *sample;
            let mut filtered = x;
            for section in sections.iter_mut() {
                filtered = section.process(filtered);
            }
            *sample = x + (filtered - x) * blend;
        }
    }
}

impl BlockEffect for EqFilter {
    fn name(&self) -> &'static str {
        "eq_filter"
    }

    fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        let frequency = self
            .params
            .value("frequency")
            .clamp(20.0, self.sample_rate * 0.49);
        let q = self.params.value("q").clamp(0.1, 20.0);
        let gain = self.params.value("gain").clamp(-24.0, 24.0);

        if (frequency, q) != self.cached_design {
            self.install_coefficients(frequency, q);
        }
        let blend = db_gain_delta(gain);

        Self::process_channel(&mut self.sections_l, left, blend);
        Self::process_channel(&mut self.sections_r, right, blend);

        self.params.advance(left.len() as u64);
    }

    fn reset(&mut self) {
        for section in self.sections_l.iter_mut().chain(self.sections_r.iter_mut()) {
            section.clear();
        }
    }

    fn params_mut(&mut self) -> Option<&mut ModParams> {
        Some(&mut self.params)
    }
}
