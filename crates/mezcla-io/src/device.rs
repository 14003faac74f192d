//! Output device abstraction.
//!
//! The engine's output pump sees a single narrow contract: write one
//! interleaved stereo block, blocking until the device has room for it.
//! [`CpalOutput`] implements it over a cpal stream fed through a bounded
//! channel; [`SinkOutput`] records blocks in memory for tests.

use crate::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, SyncSender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

/// Output stream parameters.
#[derive(Debug, Clone)]
pub struct StreamParams {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Device buffer size in frames; also the engine period.
    pub period: u32,
    /// Output channel count.
    pub channels: u16,
    /// Partial device name to match, or `None` for the default device.
    pub device_name: Option<String>,
}

impl Default for StreamParams {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            period: 1024,
            channels: 2,
            device_name: None,
        }
    }
}

/// A sound-card style block sink.
///
/// `write` blocks until the device consumes, which is what paces the
/// engine at realtime; a transient failure surfaces as an `Err` that the
/// pump counts as an underrun and moves past.
pub trait OutputDevice: Send {
    /// Write one interleaved block, blocking until the device has room.
    fn write(&mut self, interleaved: &[f32]) -> Result<()>;

    /// Release the device. Further writes fail.
    fn close(&mut self);
}

/// How many blocks may sit between `write` and the audio callback.
const FEED_DEPTH: usize = 4;

/// cpal-backed output device.
///
/// The cpal stream is built and owned by a dedicated thread (streams are
/// not `Send`); this handle talks to it through a bounded channel, so the
/// handle itself can move into the engine's output pump.
pub struct CpalOutput {
    tx: Option<SyncSender<Vec<f32>>>,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl CpalOutput {
    /// Open the output device described by `params` and start its stream.
    pub fn open(params: StreamParams) -> Result<Self> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::sync_channel::<Vec<f32>>(FEED_DEPTH);
        let (ready_tx, ready_rx) = mpsc::channel::<std::result::Result<(), String>>();

        let thread_shutdown = Arc::clone(&shutdown);
        let worker = std::thread::Builder::new()
            .name("mezcla-cpal".into())
            .spawn(move || {
                let stream = match build_stream(&params, rx) {
                    Ok(stream) => {
                        let _ = ready_tx.send(Ok(()));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e.to_string()));
                        return;
                    }
                };
                while !thread_shutdown.load(Ordering::SeqCst) {
                    std::thread::park_timeout(Duration::from_millis(50));
                }
                drop(stream);
            })
            .map_err(|e| Error::Stream(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                tx: Some(tx),
                shutdown,
                worker: Some(worker),
            }),
            Ok(Err(msg)) => {
                let _ = worker.join();
                Err(Error::Stream(msg))
            }
            Err(_) => {
                let _ = worker.join();
                Err(Error::Stream("stream thread died during setup".into()))
            }
        }
    }
}

impl OutputDevice for CpalOutput {
    fn write(&mut self, interleaved: &[f32]) -> Result<()> {
        match &self.tx {
            Some(tx) => tx
                .send(interleaved.to_vec())
                .map_err(|_| Error::Stream("output stream closed".into())),
            None => Err(Error::Stream("device already closed".into())),
        }
    }

    fn close(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.tx = None;
        if let Some(worker) = self.worker.take() {
            worker.thread().unpark();
            let _ = worker.join();
        }
        tracing::info!("cpal output closed");
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.close();
        }
    }
}

fn find_output_device(host: &cpal::Host, name: Option<&str>) -> Result<cpal::Device> {
    match name {
        Some(search) => {
            let search_lower = search.to_lowercase();
            let devices = host
                .output_devices()
                .map_err(|e| Error::Stream(e.to_string()))?;
            for device in devices {
                if let Ok(dev_name) = device.name()
                    && dev_name.to_lowercase().contains(&search_lower)
                {
                    return Ok(device);
                }
            }
            Err(Error::DeviceNotFound(search.to_string()))
        }
        None => host.default_output_device().ok_or(Error::NoDevice),
    }
}

fn build_stream(
    params: &StreamParams,
    rx: mpsc::Receiver<Vec<f32>>,
) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = find_output_device(&host, params.device_name.as_deref())?;

    let config = cpal::StreamConfig {
        channels: params.channels,
        sample_rate: params.sample_rate,
        buffer_size: cpal::BufferSize::Fixed(params.period),
    };

    let mut pending: VecDeque<f32> = VecDeque::new();
    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                while pending.len() < data.len() {
                    match rx.try_recv() {
                        Ok(block) => pending.extend(block),
                        Err(_) => break,
                    }
                }
                for sample in data.iter_mut() {
                    *sample = pending.pop_front().unwrap_or(0.0);
                }
            },
            |err| tracing::warn!(error = %err, "output stream error"),
            None,
        )
        .map_err(|e| Error::Stream(e.to_string()))?;

    stream.play().map_err(|e| Error::Stream(e.to_string()))?;
    tracing::info!(
        channels = params.channels,
        sample_rate = params.sample_rate,
        period = params.period,
        "output stream started"
    );
    Ok(stream)
}

/// In-memory output device for tests.
///
/// Records every written block; a shared [`SinkCollector`] handle reads
/// them back and can inject write failures.
pub struct SinkOutput {
    blocks: Arc<Mutex<Vec<Vec<f32>>>>,
    fail_writes: Arc<AtomicBool>,
    closed: bool,
}

impl SinkOutput {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self {
            blocks: Arc::new(Mutex::new(Vec::new())),
            fail_writes: Arc::new(AtomicBool::new(false)),
            closed: false,
        }
    }

    /// A handle onto the recorded blocks, cloneable before the sink moves
    /// into the engine.
    pub fn collector(&self) -> SinkCollector {
        SinkCollector {
            blocks: Arc::clone(&self.blocks),
            fail_writes: Arc::clone(&self.fail_writes),
        }
    }
}

impl Default for SinkOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputDevice for SinkOutput {
    fn write(&mut self, interleaved: &[f32]) -> Result<()> {
        if self.closed {
            return Err(Error::Stream("sink closed".into()));
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Stream("injected write failure".into()));
        }
        self.blocks
            .lock()
            .expect("sink lock poisoned")
            .push(interleaved.to_vec());
        Ok(())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Read side of a [`SinkOutput`].
#[derive(Clone)]
pub struct SinkCollector {
    blocks: Arc<Mutex<Vec<Vec<f32>>>>,
    fail_writes: Arc<AtomicBool>,
}

impl SinkCollector {
    /// Number of blocks delivered so far.
    pub fn block_count(&self) -> usize {
        self.blocks.lock().expect("sink lock poisoned").len()
    }

    /// Copies of all delivered blocks, in delivery order.
    pub fn blocks(&self) -> Vec<Vec<f32>> {
        self.blocks.lock().expect("sink lock poisoned").clone()
    }

    /// All delivered samples concatenated.
    pub fn samples(&self) -> Vec<f32> {
        self.blocks
            .lock()
            .expect("sink lock poisoned")
            .iter()
            .flatten()
            .copied()
            .collect()
    }

    /// Make subsequent writes fail (or stop failing).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_records_blocks_in_order() {
        let mut sink = SinkOutput::new();
        let collector = sink.collector();

        sink.write(&[1.0, 2.0]).unwrap();
        sink.write(&[3.0, 4.0]).unwrap();

        assert_eq!(collector.block_count(), 2);
        assert_eq!(collector.samples(), vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn sink_injected_failures() {
        let mut sink = SinkOutput::new();
        let collector = sink.collector();

        collector.set_fail_writes(true);
        assert!(sink.write(&[0.0]).is_err());
        collector.set_fail_writes(false);
        assert!(sink.write(&[0.0]).is_ok());
        assert_eq!(collector.block_count(), 1);
    }

    #[test]
    fn sink_rejects_writes_after_close() {
        let mut sink = SinkOutput::new();
        sink.close();
        assert!(sink.write(&[0.0]).is_err());
    }

    #[test]
    fn default_stream_params() {
        let params = StreamParams::default();
        assert_eq!(params.sample_rate, 44100);
        assert_eq!(params.period, 1024);
        assert_eq!(params.channels, 2);
        assert!(params.device_name.is_none());
    }
}
