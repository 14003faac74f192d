//! Source groups.
//!
//! A group is an ordered collection of sources sharing a volume fade, an
//! effect chain, and solo/mute flags. All mutation serializes on the
//! group's mutex; the mixer takes the same lock when it walks the graph.

use crate::source::Source;
use crate::strip::Strip;
use mezcla_core::{BlockEffect, fade_length};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

pub(crate) struct GroupInner {
    pub(crate) sources: Vec<Arc<Source>>,
    pub(crate) strip: Strip,
}

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// A fader/effect node grouping sources.
pub struct Group {
    id: String,
    sample_rate: u32,
    inner: Mutex<GroupInner>,
}

impl Group {
    /// Create an empty group. An empty `id` gets an auto-generated one.
    pub fn new(id: impl Into<String>, sample_rate: u32) -> Arc<Self> {
        let id = id.into();
        let id = if id.is_empty() {
            format!("group-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed))
        } else {
            id
        };
        Arc::new(Self {
            id,
            sample_rate,
            inner: Mutex::new(GroupInner {
                sources: Vec::new(),
                strip: Strip::new(),
            }),
        })
    }

    /// Stable identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn inner(&self) -> MutexGuard<'_, GroupInner> {
        self.inner.lock()
    }

    /// Append a source. The caller is responsible for the engine-rate
    /// check; [`crate::System::add_to_group`] performs it.
    pub fn add_source(&self, source: Arc<Source>) {
        self.inner.lock().sources.push(source);
    }

    /// Remove every source whose id matches. Returns whether any matched.
    pub fn remove_source(&self, id: &str) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.sources.len();
        inner.sources.retain(|s| s.id() != id);
        inner.sources.len() != before
    }

    /// Snapshot of the current sources, in order.
    pub fn sources(&self) -> Vec<Arc<Source>> {
        self.inner.lock().sources.clone()
    }

    /// Find a source by id.
    pub fn find_source(&self, id: &str) -> Option<Arc<Source>> {
        self.inner
            .lock()
            .sources
            .iter()
            .find(|s| s.id() == id)
            .cloned()
    }

    /// Set the group volume (clamped to [0.0, 2.0]), optionally ramping
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

    /// Set the solo flag. Soloing suppresses non-soloed sibling groups
    /// within the same bus.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_id_when_empty() {
        let a = Group::new("", 44100);
        let b = Group::new("", 44100);
        assert!(a.id().starts_with("group-"));
        assert_ne!(a.id(), b.id());
        let named = Group::new("drums", 44100);
        assert_eq!(named.id(), "drums");
    }

    #[test]
    fn sources_add_and_remove_by_id() {
        let group = Group::new("g", 44100);
        group.add_source(Arc::new(Source::sine(441.0, 0.01, 44100, 0.5)));
        let keep = Arc::new(Source::sine(441.0, 0.01, 44100, 0.5));
        let keep_id = keep.id().to_string();
        group.add_source(keep);

        let drop_id = group.sources()[0].id().to_string();
        assert!(group.remove_source(&drop_id));
        assert!(!group.remove_source(&drop_id));
        assert_eq!(group.sources().len(), 1);
        assert!(group.find_source(&keep_id).is_some());
    }

    #[test]
    fn volume_clamps() {
        let group = Group::new("g", 44100);
        group.set_volume(5.0, 0.0);
        assert_eq!(group.volume(), 2.0);
        group.set_volume(-1.0, 0.0);
        assert_eq!(group.volume(), 0.0);
    }

    #[test]
    fn flags_toggle() {
        let group = Group::new("g", 44100);
        assert!(!group.solo() && !group.mute());
        group.set_solo(true);
        group.set_mute(true);
        assert!(group.solo() && group.mute());
    }
}
