//! Full-file decoding to planar f32 channels.

use crate::{Error, Result};
use hound::SampleFormat;
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// A fully decoded audio file: one f32 vector per channel plus the native
/// sample rate. Channel vectors all have the same length (the frame count).
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Planar channel data.
    pub channels: Vec<Vec<f32>>,
    /// Native sample rate in Hz.
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }
}

/// File extensions handled by the symphonia path.
const SYMPHONIA_EXTENSIONS: [&str; 3] = ["ogg", "oga", "mp3"];

/// Decode a whole audio file.
///
/// WAV goes through hound, OGG/MP3 through symphonia. Missing files yield
/// [`Error::FileNotFound`]; anything with an unrecognized extension yields
/// [`Error::UnsupportedFormat`] without touching the file contents.
pub fn load_audio<P: AsRef<Path>>(path: P) -> Result<DecodedAudio> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    if ext != "wav" && !SYMPHONIA_EXTENSIONS.contains(&ext.as_str()) {
        return Err(Error::UnsupportedFormat(ext));
    }
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }

    let decoded = if ext == "wav" {
        load_wav(path)?
    } else {
        load_symphonia(path)?
    };
    tracing::debug!(
        path = %path.display(),
        frames = decoded.frames(),
        channels = decoded.channels.len(),
        rate = decoded.sample_rate,
        "decoded audio file"
    );
    Ok(decoded)
}

fn load_wav(path: &Path) -> Result<DecodedAudio> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        SampleFormat::Int => {
            let max_val = (1u32 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    Ok(deinterleave(&interleaved, channels, spec.sample_rate))
}

fn load_symphonia(path: &Path) -> Result<DecodedAudio> {
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
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Decode("no audio track found".into()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let sample_rate = codec_params.sample_rate.unwrap_or(44100);
    let channels = codec_params.channels.map(|c| c.count()).unwrap_or(2);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Decode(format!("no decoder: {e}")))?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(Error::Decode(format!("packet read: {e}"))),
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(audio) => {
                let buf = sample_buf.get_or_insert_with(|| {
                    SampleBuffer::new(audio.capacity() as u64, *audio.spec())
                });
                buf.copy_interleaved_ref(audio);
                interleaved.extend_from_slice(buf.samples());
            }
            // Skip corrupt packets; the stream continues afterwards.
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(Error::Decode(format!("decode: {e}"))),
        }
    }

    Ok(deinterleave(&interleaved, channels, sample_rate))
}

fn deinterleave(interleaved: &[f32], channels: usize, sample_rate: u32) -> DecodedAudio {
    let channels = channels.max(1);
    let frames = interleaved.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); channels];
    for frame in interleaved.chunks_exact(channels) {
        for (ch, &sample) in frame.iter().enumerate() {
            planar[ch].push(sample);
        }
    }
    DecodedAudio {
        channels: planar,
        sample_rate,
    }
}
