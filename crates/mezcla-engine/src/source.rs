//! Audio sources: in-memory clips, disk streams, and generated signals.
//!
//! Every source carries the same control surface and playback state; the
//! variants differ only in where frames come from. The read cursor is
//! fractional: reads use 4-point cubic interpolation and the speed
//! multiplier is the per-output-frame cursor step, so integer positions at
//! speed 1.0 reproduce the stored samples bit-exactly.

use crate::stream_buffer::StreamBuffer;
use libm::sinf;
use mezcla_core::{Fade, cubic_interpolate, fade_length};
use mezcla_io::{AudioFileReader, DecodedAudio};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Playback state of a source.
///
/// Only `Playing` sources are mixed. `Stopped` implies the cursor sits at
/// the loop start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Silent; cursor at the loop start.
    Stopped,
    /// Producing frames.
    Playing,
    /// Silent; cursor preserved.
    Paused,
}

/// Transition applied when a control-plane fade completes.
#[derive(Debug, Clone, Copy)]
enum PendingChange {
    Pause,
    Stop,
}

struct MemorySignal {
    left: Vec<f32>,
    right: Vec<f32>,
}

impl MemorySignal {
    #[inline]
    fn sample_at(&self, pos: f64) -> (f32, f32) {
        let len = self.left.len();
        if len == 0 {
            return (0.0, 0.0);
        }
        let index = pos as usize;
        let frac = (pos - index as f64) as f32;
        let i1 = index.min(len - 1);
        if frac == 0.0 {
            return (self.left[i1], self.right[i1]);
        }
        let i0 = index.saturating_sub(1);
        let i2 = (index + 1).min(len - 1);
        let i3 = (index + 2).min(len - 1);
        (
            cubic_interpolate(self.left[i0], self.left[i1], self.left[i2], self.left[i3], frac),
            cubic_interpolate(
                self.right[i0],
                self.right[i1],
                self.right[i2],
                self.right[i3],
                frac,
            ),
        )
    }
}

enum Signal {
    Memory(MemorySignal),
    Stream(StreamBuffer),
}

struct SourceInner {
    signal: Signal,
    state: PlaybackState,
    /// Fractional read cursor in frames.
    cursor: f64,
    /// Cursor step per output frame, clamped to [0.1, 4.0].
    speed: f32,
    volume: Fade,
    /// The user-set level that play/resume/fade_in ramp towards.
    base_volume: f32,
    looping: bool,
    loop_start: u64,
    loop_end: u64,
    pending: Option<PendingChange>,
}

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

fn auto_id() -> String {
    format!("source-{}", NEXT_ID.fetch_add(1, Ordering::Relaxed))
}

/// A producer of stereo frames with play/pause/seek/fade controls.
///
/// All control operations are O(1), serialize on the source's own mutex,
/// and never block on I/O: they only move the cursor, and the next mix
/// period's window request repositions the streaming ring when needed.
pub struct Source {
    id: String,
    sample_rate: u32,
    /// Total frames; `u64::MAX` for streams with unreported length.
    frames: u64,
    streaming: bool,
    inner: Mutex<SourceInner>,
}

impl Source {
    fn build(id: String, sample_rate: u32, frames: u64, signal: Signal) -> Self {
        let id = if id.is_empty() { auto_id() } else { id };
        let streaming = matches!(signal, Signal::Stream(_));
        Self {
            id,
            sample_rate,
            frames,
            streaming,
            inner: Mutex::new(SourceInner {
                signal,
                state: PlaybackState::Stopped,
                cursor: 0.0,
                speed: 1.0,
                volume: Fade::new(1.0),
                base_volume: 1.0,
                looping: false,
                loop_start: 0,
                loop_end: frames,
                pending: None,
            }),
        }
    }

    /// Build an in-memory source from a decoded file.
    ///
    /// The signal is downmixed to at most stereo (mono duplicated, extra
    /// channels dropped) and peak-normalized once if the loaded peak
    /// exceeds 1.0.
    pub fn from_decoded(id: impl Into<String>, decoded: &DecodedAudio) -> Self {
        let frames = decoded.frames();
        let (mut left, mut right) = match decoded.channels.len() {
            0 => (vec![0.0; 0], vec![0.0; 0]),
            1 => (decoded.channels[0].clone(), decoded.channels[0].clone()),
            _ => (decoded.channels[0].clone(), decoded.channels[1].clone()),
        };

        let peak = left
            .iter()
            .chain(right.iter())
            .fold(0.0f32, |p, s| p.max(s.abs()));
        if peak > 1.0 {
            let scale = 1.0 / peak;
            for s in left.iter_mut().chain(right.iter_mut()) {
                *s *= scale;
            }
            tracing::debug!(peak, "normalized in-memory source");
        }

        Self::build(
            id.into(),
            decoded.sample_rate,
            frames as u64,
            Signal::Memory(MemorySignal { left, right }),
        )
    }

    /// Build a disk-streamed source over an open reader.
    ///
    /// The ring holds about a second of audio at the native rate, never
    /// less than eight periods, and is prerolled before the source is
    /// mixed for the first time.
    pub fn stream(id: impl Into<String>, reader: AudioFileReader, period: usize) -> Self {
        let sample_rate = reader.sample_rate();
        let capacity = (sample_rate as usize).max(8 * period);
        let buffer = StreamBuffer::new(reader, capacity);
        let frames = buffer.total_frames();
        Self::build(id.into(), sample_rate, frames, Signal::Stream(buffer))
    }

    /// Generate a sine wave source.
    pub fn sine(frequency: f32, duration_secs: f32, sample_rate: u32, amplitude: f32) -> Self {
        let frames = (duration_secs.max(0.0) * sample_rate as f32) as usize;
        let step = 2.0 * core::f32::consts::PI * frequency / sample_rate as f32;
        let samples: Vec<f32> = (0..frames).map(|n| amplitude * sinf(step * n as f32)).collect();
        Self::build(
            String::new(),
            sample_rate,
            frames as u64,
            Signal::Memory(MemorySignal {
                left: samples.clone(),
                right: samples,
            }),
        )
    }

    /// Generate a white noise source (xorshift PRNG).
    pub fn white_noise(duration_secs: f32, sample_rate: u32, amplitude: f32) -> Self {
        let frames = (duration_secs.max(0.0) * sample_rate as f32) as usize;
        let mut state: u32 = 0x12345678;
        let samples: Vec<f32> = (0..frames)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                amplitude * ((state as f32 / u32::MAX as f32) * 2.0 - 1.0)
            })
            .collect();
        Self::build(
            String::new(),
            sample_rate,
            frames as u64,
            Signal::Memory(MemorySignal {
                left: samples.clone(),
                right: samples,
            }),
        )
    }

    /// Stable identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Native sample rate; must equal the engine rate to be mixed.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Total frame count (`u64::MAX` when the container did not report one).
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Whether this source streams from disk.
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Current playback state.
    pub fn state(&self) -> PlaybackState {
        self.inner.lock().state
    }

    /// Current cursor position in whole frames.
    pub fn position(&self) -> u64 {
        self.inner.lock().cursor as u64
    }

    /// Current volume (mid-fade values included).
    pub fn volume(&self) -> f32 {
        self.inner.lock().volume.value()
    }

    /// Current speed multiplier.
    pub fn speed(&self) -> f32 {
        self.inner.lock().speed
    }

    // ── Control surface ─────────────────────────────────────────────────

    /// Start playback from the loop start, optionally fading in over
    /// `fade_in` seconds.
    pub fn play(&self, fade_in: f32) {
        let mut inner = self.inner.lock();
        inner.state = PlaybackState::Playing;
        inner.cursor = inner.loop_start as f64;
        let samples = fade_length(fade_in, self.sample_rate);
        if samples > 0 {
            inner.volume.set(0.0);
            let base = inner.base_volume;
            inner.volume.ramp_to(base, samples);
        } else {
            let base = inner.base_volume;
            inner.volume.set(base);
        }
        inner.pending = None;
    }

    /// Continue playback from the preserved cursor (after a pause).
    pub fn resume(&self, fade_in: f32) {
        let mut inner = self.inner.lock();
        inner.state = PlaybackState::Playing;
        let samples = fade_length(fade_in, self.sample_rate);
        let base = inner.base_volume;
        if samples > 0 {
            inner.volume.ramp_to(base, samples);
        } else {
            inner.volume.set(base);
        }
        inner.pending = None;
    }

    /// Pause, preserving the cursor. With a fade the transition happens
    /// when the ramp reaches zero.
    pub fn pause(&self, fade_out: f32) {
        let mut inner = self.inner.lock();
        if inner.state != PlaybackState::Playing {
            return;
        }
        let samples = fade_length(fade_out, self.sample_rate);
        if samples == 0 {
            inner.state = PlaybackState::Paused;
            inner.pending = None;
        } else {
            inner.volume.ramp_to(0.0, samples);
            inner.pending = Some(PendingChange::Pause);
        }
    }

    /// Stop and rewind to the loop start. With a fade the transition
    /// happens when the ramp reaches zero.
    pub fn stop(&self, fade_out: f32) {
        let mut inner = self.inner.lock();
        let samples = fade_length(fade_out, self.sample_rate);
        if inner.state != PlaybackState::Playing || samples == 0 {
            Self::stop_now(&mut inner);
        } else {
            inner.volume.ramp_to(0.0, samples);
            inner.pending = Some(PendingChange::Stop);
        }
    }

    fn stop_now(inner: &mut SourceInner) {
        inner.state = PlaybackState::Stopped;
        inner.cursor = inner.loop_start as f64;
        inner.pending = None;
    }

    /// Move the cursor to `frame`, clamped to the loop window. Streaming
    /// sources pick the new position up at the next mix period, when the
    /// block's window request repositions the ring; the call itself never
    /// touches the decoder.
    pub fn seek(&self, frame: u64) {
        let mut inner = self.inner.lock();
        let clamped = frame.clamp(inner.loop_start, inner.loop_end);
        inner.cursor = clamped as f64;
    }

    /// Set the speed multiplier, clamped to [0.1, 4.0].
    pub fn set_speed(&self, speed: f32) {
        self.inner.lock().speed = speed.clamp(0.1, 4.0);
    }

    /// Set the volume, clamped to [0.0, 2.0], optionally ramping over
    /// `fade` seconds.
    pub fn set_volume(&self, volume: f32, fade: f32) {
        let mut inner = self.inner.lock();
        let volume = volume.clamp(0.0, 2.0);
        inner.base_volume = volume;
        let samples = fade_length(fade, self.sample_rate);
        if samples > 0 {
            inner.volume.ramp_to(volume, samples);
        } else {
            inner.volume.set(volume);
        }
    }

    /// Configure looping. `end` defaults to the source length; the window
    /// is clamped into the signal and the cursor into the window.
    pub fn set_loop(&self, enabled: bool, start: u64, end: Option<u64>) {
        let mut inner = self.inner.lock();
        let start = start.min(self.frames.saturating_sub(1));
        let end = end.unwrap_or(self.frames).clamp(start + 1, self.frames.max(start + 1));
        inner.looping = enabled;
        inner.loop_start = start;
        inner.loop_end = end;
        inner.cursor = inner.cursor.clamp(start as f64, end as f64);
    }

    /// Ramp the volume up to the user-set level over `time` seconds.
    pub fn fade_in(&self, time: f32) {
        let mut inner = self.inner.lock();
        let base = inner.base_volume;
        inner.volume.ramp_to(base, fade_length(time, self.sample_rate));
    }

    /// Ramp the volume down to zero over `time` seconds. The playback
    /// state is unchanged.
    pub fn fade_out(&self, time: f32) {
        let mut inner = self.inner.lock();
        inner.volume.ramp_to(0.0, fade_length(time, self.sample_rate));
        inner.pending = None;
    }

    /// Stop, rewind, cancel fades, and restore speed 1.0.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        Self::stop_now(&mut inner);
        inner.speed = 1.0;
        let base = inner.base_volume;
        inner.volume.set(base);
    }

    // ── Mixer interface ─────────────────────────────────────────────────

    /// Sum one period of this source into the scratch block, weighted by
    /// the block-start volume. Advances the cursor by `period x speed` and
    /// the fade by one period; applies any fade-completion transition.
    pub(crate) fn mix_into(&self, left: &mut [f32], right: &mut [f32]) {
        let mut inner = self.inner.lock();
        if inner.state != PlaybackState::Playing {
            return;
        }
        let gain = inner.volume.value();
        let period = left.len();

        let SourceInner {
            signal,
            state,
            cursor,
            speed,
            looping,
            loop_start,
            loop_end,
            ..
        } = &mut *inner;
        let step = f64::from(*speed);
        let loop_start_f = *loop_start as f64;
        let loop_end_f = *loop_end as f64;

        match signal {
            Signal::Memory(memory) => {
                for i in 0..period {
                    if *cursor >= loop_end_f {
                        if !*looping {
                            *state = PlaybackState::Stopped;
                            *cursor = loop_start_f;
                            break;
                        }
                        while *cursor >= loop_end_f {
                            *cursor = loop_start_f + (*cursor - loop_end_f);
                        }
                    }
                    let (l, r) = memory.sample_at(*cursor);
                    left[i] += l * gain;
                    right[i] += r * gain;
                    *cursor += step;
                }
            }
            Signal::Stream(buffer) => {
                // One window request per block: the cubic lookback frame,
                // the frames this block steps through, and the
                // interpolation lookahead.
                let margin = step.ceil() as usize + 4;
                let window = (period as f64 * step).ceil() as usize + margin;
                let mut window_ok =
                    buffer.ensure_window((*cursor as u64).saturating_sub(1), window);
                for i in 0..period {
                    let end = loop_end_f.min(buffer.total_frames() as f64);
                    if *cursor >= end || buffer.end_of_stream(*cursor as u64) {
                        if !*looping {
                            *state = PlaybackState::Stopped;
                            *cursor = loop_start_f;
                            break;
                        }
                        if *cursor >= end {
                            while *cursor >= end {
                                *cursor = loop_start_f + (*cursor - end);
                            }
                        } else {
                            // EOF before the reported end (or no reported
                            // end at all): wrap without an overshoot.
                            *cursor = loop_start_f;
                        }
                        // The wrap moved the read window; re-anchor it
                        // once for the remainder of the block.
                        let remaining =
                            ((period - i) as f64 * step).ceil() as usize + margin;
                        window_ok = buffer
                            .ensure_window((*cursor as u64).saturating_sub(1), remaining);
                    }
                    if !window_ok {
                        tracing::warn!(id = %self.id, "stream decode failed, stopping source");
                        *state = PlaybackState::Stopped;
                        *cursor = loop_start_f;
                        break;
                    }
                    let (l, r) = Self::sample_stream(buffer, *cursor);
                    left[i] += l * gain;
                    right[i] += r * gain;
                    *cursor += step;
                }
            }
        }

        let fade_done = inner.volume.advance(period as u64);
        if fade_done
            && let Some(pending) = inner.pending.take()
        {
            match pending {
                PendingChange::Pause => inner.state = PlaybackState::Paused,
                PendingChange::Stop => Self::stop_now(&mut inner),
            }
        }
    }

    #[inline]
    fn sample_stream(buffer: &StreamBuffer, pos: f64) -> (f32, f32) {
        let index = pos as u64;
        let frac = (pos - index as f64) as f32;
        if frac == 0.0 {
            return buffer.frame(index);
        }
        let last = buffer.total_frames().saturating_sub(1);
        let i0 = index.saturating_sub(1);
        let i2 = (index + 1).min(last);
        let i3 = (index + 2).min(last);
        let (l0, r0) = buffer.frame(i0);
        let (l1, r1) = buffer.frame(index);
        let (l2, r2) = buffer.frame(i2);
        let (l3, r3) = buffer.frame(i3);
        (
            cubic_interpolate(l0, l1, l2, l3, frac),
            cubic_interpolate(r0, r1, r2, r3, frac),
        )
    }
}
