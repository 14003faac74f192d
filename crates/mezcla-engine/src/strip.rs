//! Fader/effect controls shared by groups and buses.

use mezcla_core::{BlockEffect, Fade};

/// The per-node control state every routing node carries: a volume fade,
/// an ordered effect chain, and the solo/mute flags.
pub(crate) struct Strip {
    pub(crate) volume: Fade,
    /// The user-set level volume ramps target.
    pub(crate) base_volume: f32,
    pub(crate) effects: Vec<Box<dyn BlockEffect>>,
    pub(crate) solo: bool,
    pub(crate) mute: bool,
}

impl Strip {
    pub(crate) fn new() -> Self {
        Self {
            volume: Fade::new(1.0),
            base_volume: 1.0,
            effects: Vec::new(),
            solo: false,
            mute: false,
        }
    }

    /// Set the volume (clamped to [0.0, 2.0]), ramping over `fade_samples`.
    pub(crate) fn set_volume(&mut self, volume: f32, fade_samples: u64) {
        let volume = volume.clamp(0.0, 2.0);
        self.base_volume = volume;
        if fade_samples > 0 {
            self.volume.ramp_to(volume, fade_samples);
        } else {
            self.volume.set(volume);
        }
    }

    /// Remove the effect at `index`. Returns whether one was there.
    pub(crate) fn remove_effect(&mut self, index: usize) -> bool {
        if index < self.effects.len() {
            self.effects.remove(index);
            true
        } else {
            false
        }
    }

    /// Ramp the modulable parameters of the effect at `index`. Returns
    /// `false` when the index is out of range or the effect has no
    /// parameter map.
    pub(crate) fn update_effect_params(
        &mut self,
        index: usize,
        params: &[(&str, f32)],
        ramp_samples: u64,
    ) -> bool {
        match self.effects.get_mut(index).and_then(|e| e.params_mut()) {
            Some(map) => {
                map.update(params, ramp_samples);
                true
            }
            None => false,
        }
    }
}
