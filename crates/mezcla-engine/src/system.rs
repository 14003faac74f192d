//! The owning aggregate: device, graph, workers, lifecycle.
//!
//! A [`System`] owns the routing graph, the handoff queue, the master
//! controls, the metrics, and the output device. `start` spawns the mixer
//! and output pump workers; `stop` drains them and recovers the device for
//! a later restart; `close` releases the device for good.

use crate::bus::Bus;
use crate::error::{Error, Result};
use crate::group::Group;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::mixer::{Graph, Master, Mixer};
use crate::queue::block_queue;
use crate::source::Source;
use mezcla_io::{AudioFileReader, CpalOutput, OutputDevice, StreamParams};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Master limiter settings.
#[derive(Debug, Clone, Copy)]
pub struct LimiterConfig {
    /// Whether the hard clip is applied to the master block.
    pub enabled: bool,
    /// Clip bound in (0.0, 1.0].
    pub threshold: f32,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: 1.0,
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Engine sample rate in Hz; every source must match it.
    pub sample_rate: u32,
    /// Frames per mixed block.
    pub period: usize,
    /// Capacity of the mixer-to-pump handoff queue, in blocks.
    pub queue_blocks: usize,
    /// Initial master volume in [0.0, 2.0].
    pub master_volume: f32,
    /// Master limiter settings.
    pub limiter: LimiterConfig,
    /// Partial output device name for [`System::open`], or `None` for the
    /// system default.
    pub output_device: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            period: 1024,
            queue_blocks: 64,
            master_volume: 1.0,
            limiter: LimiterConfig::default(),
            output_device: None,
        }
    }
}

/// System lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed, never started.
    Fresh,
    /// Workers are live.
    Running,
    /// Stopped after running; can start again.
    Paused,
    /// Device released. Terminal.
    Closed,
}

/// How long workers wait on the queue before re-checking the running flag.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Clears the running flag when a worker exits, normally or by panic, so
/// the peer worker drains too.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        if std::thread::panicking() {
            tracing::error!("audio worker panicked; shutting the engine down");
        }
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The mixing engine.
pub struct System {
    config: EngineConfig,
    graph: Arc<Graph>,
    master: Arc<Master>,
    metrics: Arc<Metrics>,
    running: Arc<AtomicBool>,
    lifecycle: Lifecycle,
    device: Option<Box<dyn OutputDevice>>,
    mixer_worker: Option<JoinHandle<()>>,
    pump_worker: Option<JoinHandle<()>>,
    device_return: Option<mpsc::Receiver<Box<dyn OutputDevice>>>,
}

impl System {
    /// Build a system over an explicit output device.
    pub fn new(config: EngineConfig, device: Box<dyn OutputDevice>) -> Self {
        let master = Master::new(
            config.master_volume,
            config.limiter.enabled,
            config.limiter.threshold,
        );
        Self {
            graph: Arc::new(Graph::new()),
            master: Arc::new(master),
            metrics: Arc::new(Metrics::new()),
            running: Arc::new(AtomicBool::new(false)),
            lifecycle: Lifecycle::Fresh,
            device: Some(device),
            mixer_worker: None,
            pump_worker: None,
            device_return: None,
            config,
        }
    }

    /// Build a system over the cpal device named in the config.
    pub fn open(config: EngineConfig) -> Result<Self> {
        let device = CpalOutput::open(StreamParams {
            sample_rate: config.sample_rate,
            period: config.period as u32,
            channels: 2,
            device_name: config.output_device.clone(),
        })?;
        Ok(Self::new(config, Box::new(device)))
    }

    /// Engine sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Frames per mixed block.
    pub fn period(&self) -> usize {
        self.config.period
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    // ── Lifecycle ───────────────────────────────────────────────────────

    /// Spawn the mixer and output pump. Idempotent while running.
    pub fn start(&mut self) -> Result<()> {
        match self.lifecycle {
            Lifecycle::Closed => return Err(Error::Closed),
            Lifecycle::Running => return Ok(()),
            Lifecycle::Fresh | Lifecycle::Paused => {}
        }
        let device = self
            .device
            .take()
            .ok_or_else(|| Error::Audio("output device unavailable".into()))?;

        let (producer, consumer) = block_queue(self.config.queue_blocks, self.config.period * 2);
        self.running.store(true, Ordering::SeqCst);

        let mut mixer = Mixer::new(
            Arc::clone(&self.graph),
            Arc::clone(&self.master),
            Arc::clone(&self.metrics),
            self.config.sample_rate,
            self.config.period,
        );
        let running = Arc::clone(&self.running);
        let mixer_worker = std::thread::Builder::new()
            .name("mezcla-mixer".into())
            .spawn(move || {
                let _guard = RunningGuard(Arc::clone(&running));
                while running.load(Ordering::SeqCst) {
                    let Some(mut block) = producer.begin(POLL_INTERVAL) else {
                        continue;
                    };
                    mixer.mix_block(&mut block);
                    if !producer.commit(block) {
                        break;
                    }
                }
            })
            .map_err(|e| Error::Audio(e.to_string()))?;

        let running = Arc::clone(&self.running);
        let metrics = Arc::clone(&self.metrics);
        let (return_tx, return_rx) = mpsc::channel();
        let pump_worker = std::thread::Builder::new()
            .name("mezcla-pump".into())
            .spawn(move || {
                let _guard = RunningGuard(Arc::clone(&running));
                let mut device = device;
                while running.load(Ordering::SeqCst) {
                    let Some(block) = consumer.next(POLL_INTERVAL) else {
                        continue;
                    };
                    if let Err(e) = device.write(&block) {
                        metrics.record_underrun();
                        tracing::warn!(error = %e, "output write failed; block dropped");
                    }
                    consumer.recycle(block);
                }
                let _ = return_tx.send(device);
            })
            .map_err(|e| Error::Audio(e.to_string()))?;

        self.mixer_worker = Some(mixer_worker);
        self.pump_worker = Some(pump_worker);
        self.device_return = Some(return_rx);
        self.lifecycle = Lifecycle::Running;
        tracing::info!(
            sample_rate = self.config.sample_rate,
            period = self.config.period,
            "audio system started"
        );
        Ok(())
    }

    /// Clear the running flag, drain both workers, and recover the device.
    pub fn stop(&mut self) {
        if self.lifecycle != Lifecycle::Running {
            return;
        }
        self.running.store(false, Ordering::SeqCst);
        if let Some(worker) = self.mixer_worker.take() {
            let _ = worker.join();
        }
        if let Some(worker) = self.pump_worker.take() {
            let _ = worker.join();
        }
        if let Some(return_rx) = self.device_return.take()
            && let Ok(device) = return_rx.recv()
        {
            self.device = Some(device);
        }
        self.lifecycle = Lifecycle::Paused;
        tracing::info!("audio system stopped");
    }

    /// Stop if needed and release the device. Terminal.
    pub fn close(&mut self) {
        if self.lifecycle == Lifecycle::Closed {
            return;
        }
        self.stop();
        if let Some(mut device) = self.device.take() {
            device.close();
        }
        self.lifecycle = Lifecycle::Closed;
        tracing::info!("audio system closed");
    }

    // ── Graph construction ──────────────────────────────────────────────

    /// Create a group at the engine rate (not yet routed anywhere).
    pub fn create_group(&self, id: &str) -> Arc<Group> {
        Group::new(id, self.config.sample_rate)
    }

    /// Create a bus at the engine rate (not yet registered).
    pub fn create_bus(&self, id: &str) -> Arc<Bus> {
        Bus::new(id, self.config.sample_rate)
    }

    /// Register a main bus; it is walked in registration order.
    pub fn add_bus(&self, bus: Arc<Bus>) {
        self.graph.buses.lock().push(bus);
    }

    /// Remove a main bus by id. Returns whether it existed.
    pub fn remove_bus(&self, id: &str) -> bool {
        let mut buses = self.graph.buses.lock();
        let before = buses.len();
        buses.retain(|b| b.id() != id);
        buses.len() != before
    }

    /// Main buses in walk order.
    pub fn buses(&self) -> Vec<Arc<Bus>> {
        self.graph.buses.lock().clone()
    }

    /// Register an aux bus under its own id. Aux buses receive send signal
    /// only and are never walked as main buses.
    pub fn add_aux_bus(&self, bus: Arc<Bus>) {
        self.graph.aux.lock().insert(bus.id().to_string(), bus);
    }

    /// Remove an aux bus by id. Returns whether it existed.
    pub fn remove_aux_bus(&self, id: &str) -> bool {
        self.graph.aux.lock().remove(id).is_some()
    }

    /// Look up an aux bus by id.
    pub fn aux_bus(&self, id: &str) -> Option<Arc<Bus>> {
        self.graph.aux.lock().get(id).cloned()
    }

    /// Append `group` to `bus`.
    pub fn add_to_bus(&self, bus: &Bus, group: Arc<Group>) {
        bus.add_group(group);
    }

    /// Append `source` to `group`, refusing sources whose native rate
    /// differs from the engine rate.
    pub fn add_to_group(&self, group: &Group, source: Arc<Source>) -> Result<()> {
        if source.sample_rate() != self.config.sample_rate {
            return Err(Error::SampleRateMismatch {
                source_rate: source.sample_rate(),
                engine: self.config.sample_rate,
            });
        }
        group.add_source(source);
        Ok(())
    }

    // ── Source factories ────────────────────────────────────────────────

    /// Load an audio file as a source. With `stream` the file is opened
    /// for chunked decoding through a ring buffer; otherwise it is decoded
    /// fully into memory (downmixed and peak-normalized).
    ///
    /// An empty `id` gets an auto-generated one. Files whose native rate
    /// differs from the engine rate are refused.
    pub fn load_audio<P: AsRef<Path>>(&self, path: P, id: &str, stream: bool) -> Result<Arc<Source>> {
        if self.lifecycle == Lifecycle::Closed {
            return Err(Error::Closed);
        }
        let source = if stream {
            let reader = AudioFileReader::open(path)?;
            if reader.sample_rate() != self.config.sample_rate {
                return Err(Error::SampleRateMismatch {
                    source_rate: reader.sample_rate(),
                    engine: self.config.sample_rate,
                });
            }
            Source::stream(id, reader, self.config.period)
        } else {
            let decoded = mezcla_io::load_audio(path)?;
            if decoded.sample_rate != self.config.sample_rate {
                return Err(Error::SampleRateMismatch {
                    source_rate: decoded.sample_rate,
                    engine: self.config.sample_rate,
                });
            }
            Source::from_decoded(id, &decoded)
        };
        Ok(Arc::new(source))
    }

    // ── Observation ─────────────────────────────────────────────────────

    /// Find a source anywhere in the graph by id.
    pub fn find_source(&self, id: &str) -> Option<Arc<Source>> {
        let buses = self.buses();
        for bus in buses {
            for group in bus.groups() {
                if let Some(source) = group.find_source(id) {
                    return Some(source);
                }
            }
        }
        let aux: Vec<_> = self.graph.aux.lock().values().cloned().collect();
        for bus in aux {
            for group in bus.groups() {
                if let Some(source) = group.find_source(id) {
                    return Some(source);
                }
            }
        }
        None
    }

    /// Every source in the graph, main buses first.
    pub fn list_all_sources(&self) -> Vec<Arc<Source>> {
        let mut sources = Vec::new();
        for bus in self.buses() {
            for group in bus.groups() {
                sources.extend(group.sources());
            }
        }
        let aux: Vec<_> = self.graph.aux.lock().values().cloned().collect();
        for bus in aux {
            for group in bus.groups() {
                sources.extend(group.sources());
            }
        }
        sources
    }

    /// Current metrics.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Zero the metrics.
    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    /// Set the master volume, clamped to [0.0, 2.0].
    pub fn set_master_volume(&self, volume: f32) {
        self.master.set_volume(volume);
    }

    /// Current master volume.
    pub fn master_volume(&self) -> f32 {
        self.master.volume()
    }

    /// Configure the master limiter; the threshold clamps into (0.0, 1.0].
    pub fn set_limiter(&self, enabled: bool, threshold: f32) {
        self.master.set_limiter(enabled, threshold);
    }
}

impl Drop for System {
    fn drop(&mut self) {
        self.close();
    }
}
