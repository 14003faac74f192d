//! Decoding and device I/O for the mezcla mixing engine.
//!
//! This crate provides:
//!
//! - **Full-file decoding**: [`load_audio`] reads a whole file into planar
//!   f32 channels (WAV via hound, OGG/MP3 via symphonia)
//! - **Streaming decode**: [`AudioFileReader`] for chunked reads with seek,
//!   backing the engine's disk-streamed sources
//! - **Device output**: the [`OutputDevice`] contract with a cpal-backed
//!   implementation ([`CpalOutput`]) and an in-memory recorder
//!   ([`SinkOutput`]) for tests

mod decode;
mod device;
mod reader;

pub use decode::{DecodedAudio, load_audio};
pub use device::{CpalOutput, OutputDevice, SinkCollector, SinkOutput, StreamParams};
pub use reader::AudioFileReader;

use std::path::PathBuf;

/// Error types for decoding and device I/O.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// The file extension is not a supported audio format.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// Compressed-format decode error.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Audio stream setup or runtime error.
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// No audio device available on the system.
    #[error("No audio device available")]
    NoDevice,

    /// The requested audio device was not found.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for audio I/O operations.
pub type Result<T> = std::result::Result<T, Error>;
