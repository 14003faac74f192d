//! Main and auxiliary buses.
//!
//! A bus is an ordered collection of groups with its own volume fade,
//! effect chain, solo/mute flags, and a map of named send levels into
//! auxiliary buses. An aux bus is structurally the same type, registered
//! in the system's aux map instead of the main bus list; its groups stay
//! empty and its own sends are never walked.

use crate::group::Group;
use crate::strip::Strip;
use mezcla_core::{BlockEffect, fade_length};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub(crate) struct BusInner {
    pub(crate) groups: Vec<Arc<Group>>,
    /// `(aux bus id, send level)` in insertion order.
    pub(crate) sends: Vec<(String, f32)>,
    pub(crate) strip: Strip,
}

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// A fader/effect node grouping groups, with sends to aux buses.
pub struct Bus {
    id: String,
    sample_rate: u32,
    inner: Mutex<BusInner>,
}

impl Bus {
    /// Create an empty bus. An empty `id` gets an auto-generated one.
    pub fn new(id: impl Into<String>, sample_rate: u32) -> Arc<Self> {
        let id = id.into();
        let id = if id.is_empty() {
            format!("bus-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed))
        } else {
            id
        };
        Arc::new(Self {
            id,
            sample_rate,
            inner: Mutex::new(BusInner {
                groups: Vec::new(),
                sends: Vec::new(),
                strip: Strip::new(),
            }),
        })
    }

    /// Stable identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn inner(&self) -> MutexGuard<'_, BusInner> {
        self.inner.lock()
    }

    /// Append a group.
    pub fn add_group(&self, group: Arc<Group>) {
        self.inner.lock().groups.push(group);
    }

    /// Remove every group whose id matches. Returns whether any matched.
    pub fn remove_group(&self, id: &str) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.groups.len();
        inner.groups.retain(|g| g.id() != id);
        inner.groups.len() != before
    }

    /// Snapshot of the current groups, in order.
    pub fn groups(&self) -> Vec<Arc<Group>> {
        self.inner.lock().groups.clone()
    }

    /// Find a group by id.
    pub fn find_group(&self, id: &str) -> Option<Arc<Group>> {
        self.inner
            .lock()
            .groups
            .iter()
            .find(|g| g.id() == id)
            .cloned()
    }

    /// Set (or replace) the send level into the named aux bus. Levels
    /// clamp to [0.0, 1.0]. The send only takes effect once an aux bus
    /// with that id is registered in the system.
    pub fn add_send(&self, aux_id: impl Into<String>, level: f32) {
        let aux_id = aux_id.into();
        let level = level.clamp(0.0, 1.0);
        let mut inner = self.inner.lock();
        if let Some(entry) = inner.sends.iter_mut().find(|(id, _)| *id == aux_id) {
            entry.1 = level;
        } else {
            inner.sends.push((aux_id, level));
        }
    }

    /// Remove the send into the named aux bus. Returns whether it existed.
    pub fn remove_send(&self, aux_id: &str) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.sends.len();
        inner.sends.retain(|(id, _)| id != aux_id);
        inner.sends.len() != before
    }

    /// Snapshot of the current sends, in insertion order.
    pub fn sends(&self) -> Vec<(String, f32)> {
        self.inner.lock().sends.clone()
    }

    /// Set the bus volume (clamped to [0.0, 2.0]), optionally ramping
    /// over `fade` seconds.
    pub fn set_volume(&self, volume: f32, fade: f32) {
        self.inner
            .lock()
            .strip
            .set_volume(volume, fade_length(fade, self.sample_rate));
    }

    /// Current volume (mid-fade values included).
    pub fn volume(&self) -> f32 {
        self.inner.lock().strip.volume.value()
    }

    /// Set the solo flag. Soloing suppresses non-soloed sibling main buses.
    pub fn set_solo(&self, solo: bool) {
        self.inner.lock().strip.solo = solo;
    }

    /// Current solo flag.
    pub fn solo(&self) -> bool {
        self.inner.lock().strip.solo
    }

    /// Set the mute flag.
    pub fn set_mute(&self, mute: bool) {
        self.inner.lock().strip.mute = mute;
    }

    /// Current mute flag.
    pub fn mute(&self) -> bool {
        self.inner.lock().strip.mute
    }

    /// Append an effect to the chain.
    pub fn add_effect(&self, effect: Box<dyn BlockEffect>) {
        self.inner.lock().strip.effects.push(effect);
    }

    /// Remove the effect at `index`. Returns whether one was there.
    pub fn remove_effect(&self, index: usize) -> bool {
        self.inner.lock().strip.remove_effect(index)
    }

    /// Number of effects in the chain.
    pub fn effect_count(&self) -> usize {
        self.inner.lock().strip.effects.len()
    }

    /// Ramp the parameters of the effect at `index` over `time` seconds.
    pub fn update_effect_params(&self, index: usize, params: &[(&str, f32)], time: f32) -> bool {
        self.inner.lock().strip.update_effect_params(
            index,
            params,
            fade_length(time, self.sample_rate),
        )
    }

    /// Read one modulable parameter of the effect at `index`.
    pub fn effect_param(&self, index: usize, name: &str) -> Option<f32> {
        self.inner
            .lock()
            .strip
            .effects
            .get_mut(index)
            .and_then(|e| e.params_mut())
            .map(|p| p.value(name))
    }
}
