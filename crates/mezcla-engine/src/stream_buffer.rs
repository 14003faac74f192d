//! Chunked disk-backed ring buffer for streaming sources.
//!
//! The ring holds a contiguous absolute frame range `[start, start + fill)`
//! of the underlying file. Frame `n` always lives at slot `n % capacity`,
//! so advancing the window is pure bookkeeping and never copies. Refills
//! decode synchronously on the mixer thread: whenever the frames ahead of
//! the read window drop below half the capacity, up to `capacity - fill`
//! frames are requested from the reader.
//!
//! The mixer drives the ring at block granularity: one `ensure_window`
//! call per period (plus one per mid-block loop wrap). A window outside
//! the buffered range repositions the decoder, which is how control-plane
//! seeks take effect; a seek that lands inside the buffered range costs
//! nothing, and no control call ever blocks on I/O.

use mezcla_io::AudioFileReader;

pub(crate) struct StreamBuffer {
    reader: AudioFileReader,
    left: Vec<f32>,
    right: Vec<f32>,
    capacity: usize,
    /// Absolute frame index of the oldest frame in the ring.
    start: u64,
    /// Number of valid frames from `start`.
    fill: usize,
    /// Interleaved read scratch, reused across refills.
    scratch: Vec<f32>,
    channels: usize,
    total: u64,
    eof: bool,
    failed: bool,
}

impl StreamBuffer {
    /// Wrap a reader with a ring of `capacity` frames and preroll half of it.
    pub(crate) fn new(reader: AudioFileReader, capacity: usize) -> Self {
        let channels = reader.channels().max(1);
        let total = match reader.total_frames() {
            0 => u64::MAX, // container did not report a length; rely on EOF
            n => n,
        };
        let mut buffer = Self {
            reader,
            left: vec![0.0; capacity],
            right: vec![0.0; capacity],
            capacity,
            start: 0,
            fill: 0,
            scratch: Vec::new(),
            channels,
            total,
            eof: false,
            failed: false,
        };
        buffer.refill(capacity / 2);
        buffer
    }

    /// Total frames in the stream (`u64::MAX` when the container does not
    /// report a length).
    pub(crate) fn total_frames(&self) -> u64 {
        self.total
    }

    #[inline]
    fn slot(&self, frame: u64) -> usize {
        (frame % self.capacity as u64) as usize
    }

    fn reposition(&mut self, frame: u64) {
        if let Err(e) = self.reader.seek(frame) {
            tracing::warn!(error = %e, frame, "stream seek failed");
            self.failed = true;
            return;
        }
        self.start = frame;
        self.fill = 0;
        self.eof = false;
    }

    fn refill(&mut self, target_fill: usize) {
        let target_fill = target_fill.min(self.capacity);
        while self.fill < target_fill && !self.eof && !self.failed {
            let want = self.capacity - self.fill;
            self.scratch.clear();
            match self.reader.read(want, &mut self.scratch) {
                Ok(0) => self.eof = true,
                Ok(frames) => {
                    for i in 0..frames {
                        let slot = self.slot(self.start + self.fill as u64 + i as u64);
                        let base = i * self.channels;
                        self.left[slot] = self.scratch[base];
                        // Mono duplicates; extra channels beyond two are dropped.
                        self.right[slot] = self.scratch[base + usize::from(self.channels > 1)];
                    }
                    self.fill += frames;
                    tracing::debug!(frames, fill = self.fill, "stream refill");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stream decode failed");
                    self.failed = true;
                }
            }
        }
    }

    /// Make `[window_start, window_start + frames)` (clipped to the file)
    /// available in the ring. Returns `false` once the stream has failed.
    pub(crate) fn ensure_window(&mut self, window_start: u64, frames: usize) -> bool {
        if self.failed {
            return false;
        }

        // A window outside the buffered range forces a single decoder
        // reposition; this covers backwards seeks, forward jumps, and
        // loop wraps alike.
        if window_start < self.start || window_start > self.start + self.fill as u64 {
            self.reposition(window_start);
        } else if window_start > self.start {
            // Drop frames behind the window so the ring only holds lookahead.
            let drop = (window_start - self.start) as usize;
            self.fill -= drop.min(self.fill);
            self.start = window_start;
        }

        if self.fill < self.capacity / 2 || self.fill < frames {
            self.refill(self.capacity);
        }
        !self.failed
    }

    /// Whether the decoder is exhausted and `frame` lies past the last
    /// buffered frame. Only meaningful for containers without a reported
    /// length; known lengths are checked against [`total_frames`].
    ///
    /// [`total_frames`]: Self::total_frames
    pub(crate) fn end_of_stream(&self, frame: u64) -> bool {
        self.eof && frame >= self.start + self.fill as u64
    }

    /// Read one stereo frame by absolute index. Frames outside the buffered
    /// range read as silence.
    #[inline]
    pub(crate) fn frame(&self, index: u64) -> (f32, f32) {
        if index < self.start || index >= self.start + self.fill as u64 {
            return (0.0, 0.0);
        }
        let slot = self.slot(index);
        (self.left[slot], self.right[slot])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use tempfile::TempDir;

    fn ramp_wav(dir: &TempDir, frames: usize) -> std::path::PathBuf {
        let path = dir.path().join("ramp.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 44100,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for i in 0..frames {
            writer.write_sample(i as f32).unwrap();
            writer.write_sample(-(i as f32)).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    fn open_buffer(dir: &TempDir, frames: usize, capacity: usize) -> StreamBuffer {
        let path = ramp_wav(dir, frames);
        StreamBuffer::new(AudioFileReader::open(path).unwrap(), capacity)
    }

    #[test]
    fn preroll_makes_the_head_available() {
        let dir = TempDir::new().unwrap();
        let buffer = open_buffer(&dir, 2000, 512);
        assert_eq!(buffer.frame(0), (0.0, -0.0));
        assert_eq!(buffer.frame(200).0, 200.0);
    }

    #[test]
    fn window_slides_forward_through_the_file() {
        let dir = TempDir::new().unwrap();
        let mut buffer = open_buffer(&dir, 4000, 512);

        let mut pos = 0u64;
        while pos + 128 < 4000 {
            assert!(buffer.ensure_window(pos, 128));
            assert_eq!(buffer.frame(pos).0, pos as f32);
            assert_eq!(buffer.frame(pos + 127).0, (pos + 127) as f32);
            pos += 128;
        }
    }

    #[test]
    fn backwards_window_reseeks() {
        let dir = TempDir::new().unwrap();
        let mut buffer = open_buffer(&dir, 4000, 512);
        assert!(buffer.ensure_window(3000, 128));
        assert_eq!(buffer.frame(3000).0, 3000.0);

        assert!(buffer.ensure_window(10, 128));
        assert_eq!(buffer.frame(10).0, 10.0);
    }

    #[test]
    fn forward_jump_past_the_fill_reseeks() {
        let dir = TempDir::new().unwrap();
        let mut buffer = open_buffer(&dir, 4000, 512);
        // Preroll covers the head only; a jump far past it repositions.
        assert!(buffer.ensure_window(1500, 64));
        assert_eq!(buffer.frame(1500).0, 1500.0);
        assert_eq!(buffer.frame(1563).0, 1563.0);
    }

    #[test]
    fn window_inside_the_buffered_range_keeps_the_ring() {
        let dir = TempDir::new().unwrap();
        let mut buffer = open_buffer(&dir, 4000, 512);
        assert!(buffer.ensure_window(100, 64));
        // A move that still lands inside the buffered range keeps serving
        // from the same ring; only the front bookkeeping advances.
        assert!(buffer.ensure_window(110, 64));
        assert_eq!(buffer.frame(110).0, 110.0);
        assert_eq!(buffer.frame(173).0, 173.0);
    }

    #[test]
    fn frames_outside_the_window_are_silent() {
        let dir = TempDir::new().unwrap();
        let mut buffer = open_buffer(&dir, 4000, 512);
        assert!(buffer.ensure_window(1000, 64));
        assert_eq!(buffer.frame(0), (0.0, 0.0));
    }

    #[test]
    fn reports_total_frames() {
        let dir = TempDir::new().unwrap();
        let buffer = open_buffer(&dir, 1234, 512);
        assert_eq!(buffer.total_frames(), 1234);
    }
}
