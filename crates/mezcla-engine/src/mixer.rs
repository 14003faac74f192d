//! The block mixer.
//!
//! Once per engine period the mixer walks buses, groups, and sources into
//! a fresh master block: per-node fades advance one period, effect chains
//! apply in insertion order, sends route post-effect bus signal into aux
//! buses, and the master is scaled, limited, metered, and handed to the
//! output pump. The four scratch blocks are allocated once here and the
//! walk itself performs no heap allocation.

use crate::bus::Bus;
use crate::metrics::Metrics;
use mezcla_core::{apply_chain, block_peak, hard_clip};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

/// The routing graph shared between the control plane and the mixer.
pub(crate) struct Graph {
    /// Main buses, walked in order every period.
    pub(crate) buses: Mutex<Vec<Arc<Bus>>>,
    /// Aux buses by identifier; only reachable through sends.
    pub(crate) aux: Mutex<HashMap<String, Arc<Bus>>>,
}

impl Graph {
    pub(crate) fn new() -> Self {
        Self {
            buses: Mutex::new(Vec::new()),
            aux: Mutex::new(HashMap::new()),
        }
    }
}

/// Master output settings.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MasterState {
    /// Master volume in [0.0, 2.0].
    pub(crate) volume: f32,
    pub(crate) limiter_enabled: bool,
    /// Hard-clip bound in (0.0, 1.0].
    pub(crate) limiter_threshold: f32,
}

/// Shared master controls.
pub(crate) struct Master {
    state: Mutex<MasterState>,
}

impl Master {
    pub(crate) fn new(volume: f32, limiter_enabled: bool, limiter_threshold: f32) -> Self {
        Self {
            state: Mutex::new(MasterState {
                volume: volume.clamp(0.0, 2.0),
                limiter_enabled,
                limiter_threshold: limiter_threshold.clamp(f32::EPSILON, 1.0),
            }),
        }
    }

    pub(crate) fn snapshot(&self) -> MasterState {
        *self.state.lock()
    }

    pub(crate) fn set_volume(&self, volume: f32) {
        self.state.lock().volume = volume.clamp(0.0, 2.0);
    }

    pub(crate) fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    pub(crate) fn set_limiter(&self, enabled: bool, threshold: f32) {
        let mut state = self.state.lock();
        state.limiter_enabled = enabled;
        state.limiter_threshold = threshold.clamp(f32::EPSILON, 1.0);
    }
}

/// The periodic block engine.
pub(crate) struct Mixer {
    graph: Arc<Graph>,
    master: Arc<Master>,
    metrics: Arc<Metrics>,
    period: usize,
    period_secs: f64,

    // Preallocated planar scratch, reused every period.
    master_l: Vec<f32>,
    master_r: Vec<f32>,
    bus_l: Vec<f32>,
    bus_r: Vec<f32>,
    group_l: Vec<f32>,
    group_r: Vec<f32>,
    aux_l: Vec<f32>,
    aux_r: Vec<f32>,

    /// Reused bus snapshot so the graph lock is held only for the copy.
    bus_snapshot: Vec<Arc<Bus>>,
    aux_snapshot: Vec<Arc<Bus>>,
}

impl Mixer {
    pub(crate) fn new(
        graph: Arc<Graph>,
        master: Arc<Master>,
        metrics: Arc<Metrics>,
        sample_rate: u32,
        period: usize,
    ) -> Self {
        Self {
            graph,
            master,
            metrics,
            period,
            period_secs: period as f64 / f64::from(sample_rate),
            master_l: vec![0.0; period],
            master_r: vec![0.0; period],
            bus_l: vec![0.0; period],
            bus_r: vec![0.0; period],
            group_l: vec![0.0; period],
            group_r: vec![0.0; period],
            aux_l: vec![0.0; period],
            aux_r: vec![0.0; period],
            bus_snapshot: Vec::new(),
            aux_snapshot: Vec::new(),
        }
    }

    /// Mix one period into `out` (interleaved stereo, `period * 2` samples).
    pub(crate) fn mix_block(&mut self, out: &mut [f32]) {
        debug_assert_eq!(out.len(), self.period * 2);
        let started = Instant::now();
        let period = self.period as u64;

        self.master_l.fill(0.0);
        self.master_r.fill(0.0);

        // Snapshot the bus list; Arc clones into retained capacity.
        let mut buses = std::mem::take(&mut self.bus_snapshot);
        buses.clear();
        buses.extend(self.graph.buses.lock().iter().cloned());

        let has_solo_bus = buses.iter().any(|bus| bus.solo());

        for bus in &buses {
            let mut inner = bus.inner();
            if inner.strip.mute || (has_solo_bus && !inner.strip.solo) {
                continue;
            }

            self.bus_l.fill(0.0);
            self.bus_r.fill(0.0);
            let bus_gain = inner.strip.volume.value();
            inner.strip.volume.advance(period);

            let has_solo_group = inner.groups.iter().any(|group| group.solo());
            for group in &inner.groups {
                let mut group_inner = group.inner();
                if group_inner.strip.mute || (has_solo_group && !group_inner.strip.solo) {
                    continue;
                }

                self.group_l.fill(0.0);
                self.group_r.fill(0.0);
                let group_gain = group_inner.strip.volume.value();
                group_inner.strip.volume.advance(period);

                for source in &group_inner.sources {
                    source.mix_into(&mut self.group_l, &mut self.group_r);
                }
                apply_chain(
                    &mut group_inner.strip.effects,
                    &mut self.group_l,
                    &mut self.group_r,
                );

                for i in 0..self.period {
                    self.bus_l[i] += self.group_l[i] * group_gain;
                    self.bus_r[i] += self.group_r[i] * group_gain;
                }
            }

            apply_chain(&mut inner.strip.effects, &mut self.bus_l, &mut self.bus_r);

            // Sends route the post-effect bus signal, ahead of the bus's
            // own dry contribution.
            for (aux_id, level) in &inner.sends {
                let aux = self.graph.aux.lock().get(aux_id).cloned();
                let Some(aux) = aux else { continue };
                // A bus registered as its own aux would deadlock here.
                if Arc::ptr_eq(&aux, bus) {
                    continue;
                }
                let mut aux_inner = aux.inner();
                if aux_inner.strip.mute {
                    continue;
                }
                for i in 0..self.period {
                    self.aux_l[i] = self.bus_l[i] * level;
                    self.aux_r[i] = self.bus_r[i] * level;
                }
                apply_chain(&mut aux_inner.strip.effects, &mut self.aux_l, &mut self.aux_r);
                let aux_gain = aux_inner.strip.volume.value();
                for i in 0..self.period {
                    self.master_l[i] += self.aux_l[i] * aux_gain;
                    self.master_r[i] += self.aux_r[i] * aux_gain;
                }
            }

            for i in 0..self.period {
                self.master_l[i] += self.bus_l[i] * bus_gain;
                self.master_r[i] += self.bus_r[i] * bus_gain;
            }
        }

        buses.clear();
        self.bus_snapshot = buses;

        // Aux fades advance exactly once per period, regardless of how many
        // sends target them.
        let mut auxes = std::mem::take(&mut self.aux_snapshot);
        auxes.clear();
        auxes.extend(self.graph.aux.lock().values().cloned());
        for aux in &auxes {
            aux.inner().strip.volume.advance(period);
        }
        auxes.clear();
        self.aux_snapshot = auxes;

        // Master volume, clip detection, limiter, metering.
        let master = self.master.snapshot();
        for i in 0..self.period {
            self.master_l[i] *= master.volume;
            self.master_r[i] *= master.volume;
        }
        let pre_limiter_peak = block_peak(&self.master_l).max(block_peak(&self.master_r));
        if master.limiter_enabled {
            for s in self.master_l.iter_mut().chain(self.master_r.iter_mut()) {
                *s = hard_clip(*s, master.limiter_threshold);
            }
        }

        let cpu = (started.elapsed().as_secs_f64() / self.period_secs * 100.0) as f32;
        self.metrics
            .record_block(&self.master_l, &self.master_r, pre_limiter_peak, cpu);

        for i in 0..self.period {
            out[2 * i] = self.master_l[i];
            out[2 * i + 1] = self.master_r[i];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::Group;
    use crate::source::Source;

    const RATE: u32 = 44100;
    const PERIOD: usize = 1024;

    fn mixer_for(graph: Arc<Graph>) -> (Mixer, Arc<Metrics>) {
        let metrics = Arc::new(Metrics::new());
        let master = Arc::new(Master::new(1.0, false, 1.0));
        (
            Mixer::new(graph, master, Arc::clone(&metrics), RATE, PERIOD),
            metrics,
        )
    }

    fn sine_graph(amp: f32) -> (Arc<Graph>, Arc<Source>) {
        let graph = Arc::new(Graph::new());
        let source = Arc::new(Source::sine(441.0, 1.0, RATE, amp));
        let group = Group::new("g", RATE);
        group.add_source(Arc::clone(&source));
        let bus = Bus::new("b", RATE);
        bus.add_group(group);
        graph.buses.lock().push(bus);
        (graph, source)
    }

    #[test]
    fn empty_graph_mixes_silence() {
        let (mut mixer, metrics) = mixer_for(Arc::new(Graph::new()));
        let mut out = vec![1.0; PERIOD * 2];
        mixer.mix_block(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        let snap = metrics.snapshot();
        assert_eq!(snap.peak, [0.0; 2]);
        assert_eq!(snap.clip_count, 0);
    }

    #[test]
    fn identity_graph_is_sample_exact() {
        let (graph, source) = sine_graph(0.5);
        source.play(0.0);
        let (mut mixer, _) = mixer_for(graph);
        let mut out = vec![0.0; PERIOD * 2];
        mixer.mix_block(&mut out);

        let step = 2.0 * core::f32::consts::PI * 441.0 / RATE as f32;
        for n in 0..PERIOD {
            let expected = 0.5 * libm::sinf(step * n as f32);
            assert_eq!(out[2 * n], expected, "left sample {n}");
            assert_eq!(out[2 * n + 1], expected, "right sample {n}");
        }
    }

    #[test]
    fn muted_bus_is_skipped() {
        let (graph, source) = sine_graph(0.5);
        source.play(0.0);
        graph.buses.lock()[0].set_mute(true);
        let (mut mixer, _) = mixer_for(graph);
        let mut out = vec![0.0; PERIOD * 2];
        mixer.mix_block(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn solo_bus_suppresses_the_others() {
        let graph = Arc::new(Graph::new());
        for (id, freq) in [("a", 300.0), ("b", 500.0)] {
            let source = Arc::new(Source::sine(freq, 1.0, RATE, 0.3));
            source.play(0.0);
            let group = Group::new(format!("g-{id}"), RATE);
            group.add_source(source);
            let bus = Bus::new(id, RATE);
            bus.add_group(group);
            graph.buses.lock().push(bus);
        }
        let bus_a = graph.buses.lock()[0].clone();
        bus_a.set_solo(true);

        let (mut mixer, _) = mixer_for(graph);
        let mut out = vec![0.0; PERIOD * 2];
        mixer.mix_block(&mut out);

        let step = 2.0 * core::f32::consts::PI * 300.0 / RATE as f32;
        for n in 0..PERIOD {
            assert_eq!(out[2 * n], 0.3 * libm::sinf(step * n as f32), "only bus a");
        }
    }

    #[test]
    fn limiter_bounds_the_master() {
        let (graph, source) = sine_graph(0.5);
        source.play(0.0);
        let metrics = Arc::new(Metrics::new());
        let master = Arc::new(Master::new(2.0, true, 0.75));
        let mut mixer = Mixer::new(graph, master, Arc::clone(&metrics), RATE, PERIOD);
        let mut out = vec![0.0; PERIOD * 2];
        mixer.mix_block(&mut out);

        assert!(out.iter().all(|&s| s.abs() <= 0.75));
        // 0.5 amp * 2.0 master reaches 1.0: one clip event for the block.
        assert_eq!(metrics.snapshot().clip_count, 1);
    }

    #[test]
    fn send_to_unity_aux_doubles_the_signal() {
        let (graph, source) = sine_graph(0.25);
        source.play(0.0);
        {
            let buses = graph.buses.lock();
            buses[0].add_send("fx", 1.0);
        }
        let aux = Bus::new("fx", RATE);
        graph.aux.lock().insert("fx".into(), aux);

        let (mut mixer, _) = mixer_for(graph);
        let mut out = vec![0.0; PERIOD * 2];
        mixer.mix_block(&mut out);

        let step = 2.0 * core::f32::consts::PI * 441.0 / RATE as f32;
        for n in 0..PERIOD {
            let dry = 0.25 * libm::sinf(step * n as f32);
            assert!((out[2 * n] - 2.0 * dry).abs() < 1e-6, "dry + aux at {n}");
        }
    }

    #[test]
    fn send_to_missing_aux_is_ignored() {
        let (graph, source) = sine_graph(0.25);
        source.play(0.0);
        graph.buses.lock()[0].add_send("nowhere", 1.0);

        let (mut mixer, _) = mixer_for(graph);
        let mut out = vec![0.0; PERIOD * 2];
        mixer.mix_block(&mut out);

        let step = 2.0 * core::f32::consts::PI * 441.0 / RATE as f32;
        assert_eq!(out[2], 0.25 * libm::sinf(step));
    }

    #[test]
    fn master_volume_is_linear() {
        let (graph, source) = sine_graph(0.25);
        source.play(0.0);
        let metrics = Arc::new(Metrics::new());
        let master = Arc::new(Master::new(1.0, false, 1.0));
        let mut mixer = Mixer::new(
            Arc::clone(&graph),
            Arc::clone(&master),
            metrics,
            RATE,
            PERIOD,
        );
        let mut out_unity = vec![0.0; PERIOD * 2];
        mixer.mix_block(&mut out_unity);

        source.play(0.0); // rewind
        master.set_volume(2.0);
        let mut out_double = vec![0.0; PERIOD * 2];
        mixer.mix_block(&mut out_double);

        for (a, b) in out_unity.iter().zip(out_double.iter()) {
            assert_eq!(*b, *a * 2.0);
        }
    }

    #[test]
    fn cpu_usage_is_reported() {
        let (graph, source) = sine_graph(0.5);
        source.play(0.0);
        let (mut mixer, metrics) = mixer_for(graph);
        let mut out = vec![0.0; PERIOD * 2];
        mixer.mix_block(&mut out);
        let snap = metrics.snapshot();
        assert!(snap.cpu_usage > 0.0, "mix time was measured");
    }
}
