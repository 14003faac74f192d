//! Streaming file reader with seek.
//!
//! Backs the engine's disk-streamed sources: opens a file, reports its
//! shape, and serves chunked interleaved reads from the current position.
//! WAV goes through hound; OGG/MP3 through a symphonia format reader and
//! decoder pair.

use crate::{Error, Result};
use hound::SampleFormat;
use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, Decoder, DecoderOptions};
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

enum Backend {
    Wav {
        reader: hound::WavReader<BufReader<File>>,
    },
    Symphonia {
        format: Box<dyn FormatReader>,
        decoder: Box<dyn Decoder>,
        track_id: u32,
        /// Interleaved samples decoded but not yet handed out.
        pending: VecDeque<f32>,
        sample_buf: Option<SampleBuffer<f32>>,
    },
}

/// A seekable streaming decoder handle.
///
/// Reads always resume from the position after the previous read (or the
/// last seek target). A read returning 0 frames means end of stream.
pub struct AudioFileReader {
    backend: Backend,
    sample_rate: u32,
    channels: usize,
    total_frames: u64,
}

impl std::fmt::Debug for AudioFileReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioFileReader")
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("total_frames", &self.total_frames)
            .finish_non_exhaustive()
    }
}

impl AudioFileReader {
    /// Open a file for streaming.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        if ext != "wav" && !["ogg", "oga", "mp3"].contains(&ext.as_str()) {
            return Err(Error::UnsupportedFormat(ext));
        }
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }

        if ext == "wav" {
            let reader = hound::WavReader::open(path)?;
            let spec = reader.spec();
            let total_frames = u64::from(reader.duration());
            Ok(Self {
                sample_rate: spec.sample_rate,
                channels: spec.channels as usize,
                total_frames,
                backend: Backend::Wav { reader },
            })
        } else {
            Self::open_symphonia(path)
        }
    }

    fn open_symphonia(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::Decode(format!("probe failed: {e}")))?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("no audio track found".into()))?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("no decoder: {e}")))?;

        Ok(Self {
            sample_rate: codec_params.sample_rate.unwrap_or(44100),
            channels: codec_params.channels.map(|c| c.count()).unwrap_or(2),
            total_frames: codec_params.n_frames.unwrap_or(0),
            backend: Backend::Symphonia {
                format,
                decoder,
                track_id,
                pending: VecDeque::new(),
                sample_buf: None,
            },
        })
    }

    /// Native sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Native channel count.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Total frame count (0 if the container does not report one).
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Read up to `max_frames` frames, appending interleaved samples to
    /// `out`. Returns the number of frames actually read; 0 means end of
    /// stream.
    pub fn read(&mut self, max_frames: usize, out: &mut Vec<f32>) -> Result<usize> {
        match &mut self.backend {
            Backend::Wav { reader } => {
                let want = max_frames * self.channels;
                let before = out.len();
                let spec = reader.spec();
                match spec.sample_format {
                    SampleFormat::Float => {
                        for sample in reader.samples::<f32>().take(want) {
                            out.push(sample?);
                        }
                    }
                    SampleFormat::Int => {
                        let max_val = (1u32 << (spec.bits_per_sample - 1)) as f32;
                        for sample in reader.samples::<i32>().take(want) {
                            out.push(sample? as f32 / max_val);
                        }
                    }
                }
                Ok((out.len() - before) / self.channels)
            }
            Backend::Symphonia {
                format,
                decoder,
                track_id,
                pending,
                sample_buf,
            } => {
                let want = max_frames * self.channels;
                while pending.len() < want {
                    let packet = match format.next_packet() {
                        Ok(packet) => packet,
                        Err(symphonia::core::errors::Error::IoError(ref e))
                            if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                        {
                            break;
                        }
                        Err(e) => return Err(Error::Decode(format!("packet read: {e}"))),
                    };
                    if packet.track_id() != *track_id {
                        continue;
                    }
                    match decoder.decode(&packet) {
                        Ok(audio) => {
                            let buf = sample_buf.get_or_insert_with(|| {
                                SampleBuffer::new(audio.capacity() as u64, *audio.spec())
                            });
                            buf.copy_interleaved_ref(audio);
                            pending.extend(buf.samples());
                        }
                        Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
                        Err(e) => return Err(Error::Decode(format!("decode: {e}"))),
                    }
                }
                let available = pending.len() - pending.len() % self.channels;
                let take = want.min(available);
                out.extend(pending.drain(..take));
                Ok(take / self.channels)
            }
        }
    }

    /// Reposition the read cursor to `frame`.
    pub fn seek(&mut self, frame: u64) -> Result<()> {
        let landed = match &mut self.backend {
            Backend::Wav { reader } => {
                let target = frame.min(self.total_frames) as u32;
                reader.seek(target)?;
                return Ok(());
            }
            Backend::Symphonia {
                format,
                decoder,
                track_id,
                pending,
                ..
            } => {
                pending.clear();
                let seeked = format
                    .seek(
                        SeekMode::Accurate,
                        SeekTo::TimeStamp {
                            ts: frame,
                            track_id: *track_id,
                        },
                    )
                    .map_err(|e| Error::Decode(format!("seek: {e}")))?;
                decoder.reset();
                seeked.actual_ts
            }
        };

        // Coarse containers land before the target; decode and discard
        // the difference.
        if landed < frame {
            let mut scratch = Vec::new();
            let mut remaining = (frame - landed) as usize;
            while remaining > 0 {
                scratch.clear();
                let got = self.read(remaining.min(4096), &mut scratch)?;
                if got == 0 {
                    break;
                }
                remaining -= got;
            }
        }
        Ok(())
    }
}
