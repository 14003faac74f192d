//! Modulable effect parameters with cosine ramps.
//!
//! A modulable effect holds its numeric parameters in a [`ModParams`] map.
//! `update` sets new targets and starts a single shared ramp; each block
//! the owner advances the counter by one period and reads interpolated
//! values. After the ramp runs out every parameter equals its target
//! exactly, so coefficient recomputation can stop.

use crate::math::cosine_step;

#[derive(Debug, Clone)]
struct Slot {
    /// Value at ramp start.
    start: f32,
    target: f32,
}

/// Named f32 parameters sharing one cosine ramp.
///
/// Parameter names are fixed at construction; updates that mention unknown
/// names are ignored (logged at debug level), matching the control-plane
/// rule that range and key deviations never error.
///
/// # Example
///
/// ```rust
/// use mezcla_core::ModParams;
///
/// let mut params = ModParams::new(&[("wet_level", 0.5), ("room_size", 0.7)]);
/// params.update(&[("wet_level", 1.0)], 44100);
///
/// params.advance(22050);
/// let halfway = params.value("wet_level");
/// assert!(halfway > 0.5 && halfway < 1.0);
///
/// params.advance(22050);
/// assert_eq!(params.value("wet_level"), 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct ModParams {
    slots: Vec<(String, Slot)>,
    /// Ramp length in samples. 0 means settled.
    total: u64,
    counter: u64,
}

impl ModParams {
    /// Create a parameter map from `(name, default)` pairs.
    pub fn new(defaults: &[(&str, f32)]) -> Self {
        Self {
            slots: defaults
                .iter()
                .map(|&(name, value)| {
                    (
                        name.to_owned(),
                        Slot {
                            start: value,
                            target: value,
                        },
                    )
                })
                .collect(),
            total: 0,
            counter: 0,
        }
    }

    /// Normalized ramp position in `[0, 1]`, eased by the cosine curve.
    #[inline]
    fn ramp_t(&self) -> f32 {
        if self.total == 0 || self.counter >= self.total {
            1.0
        } else {
            cosine_step(self.counter as f32 / self.total as f32)
        }
    }

    /// Current interpolated value of `name`.
    ///
    /// Unknown names return 0.0; effects only query the names they were
    /// constructed with.
    #[inline]
    pub fn value(&self, name: &str) -> f32 {
        let t = self.ramp_t();
        self.slots
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, slot)| slot.start + (slot.target - slot.start) * t)
            .unwrap_or(0.0)
    }

    /// Target value of `name` (the value after the ramp completes).
    #[inline]
    pub fn target(&self, name: &str) -> f32 {
        self.slots
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, slot)| slot.target)
            .unwrap_or(0.0)
    }

    /// Set one parameter immediately without disturbing the shared ramp.
    pub fn set(&mut self, name: &str, value: f32) {
        if let Some((_, slot)) = self.slots.iter_mut().find(|(n, _)| n == name) {
            slot.start = value;
            slot.target = value;
        } else {
            tracing::debug!(param = name, "ignoring unknown effect parameter");
        }
    }

    /// Set new targets and start a ramp of `ramp_samples`.
    ///
    /// Every slot re-anchors its start at the current interpolated value so
    /// back-to-back updates never jump. Names absent from `new` keep their
    /// current value as both start and target. A zero-length ramp applies
    /// the new values immediately.
    pub fn update(&mut self, new: &[(&str, f32)], ramp_samples: u64) {
        let t = self.ramp_t();
        for (_, slot) in &mut self.slots {
            let current = slot.start + (slot.target - slot.start) * t;
            slot.start = current;
            slot.target = current;
        }
        for &(name, value) in new {
            if let Some((_, slot)) = self.slots.iter_mut().find(|(n, _)| n == name) {
                slot.target = value;
            } else {
                tracing::debug!(param = name, "ignoring unknown effect parameter");
            }
        }
        if ramp_samples == 0 {
            for (_, slot) in &mut self.slots {
                slot.start = slot.target;
            }
            self.total = 0;
        } else {
            self.total = ramp_samples;
        }
        self.counter = 0;
    }

    /// Advance the shared ramp by `samples` (one period per block).
    pub fn advance(&mut self, samples: u64) {
        if self.total == 0 {
            return;
        }
        self.counter = self.counter.saturating_add(samples);
        if self.counter >= self.total {
            for (_, slot) in &mut self.slots {
                slot.start = slot.target;
            }
            self.total = 0;
            self.counter = 0;
        }
    }

    /// Whether a ramp is in flight.
    #[inline]
    pub fn is_ramping(&self) -> bool {
        self.total != 0
    }
}
