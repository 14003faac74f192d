//! Engine error types.

/// Errors surfaced by the engine's control surface.
///
/// Range deviations (speed, volume, send levels, effect parameters) are
/// clamped silently and never reach this type; runtime decode and device
/// write failures are swallowed locally with metrics and a log line.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Decoding or device I/O failed (file not found, unsupported format,
    /// stream setup, ...).
    #[error(transparent)]
    Io(#[from] mezcla_io::Error),

    /// A source's native rate differs from the engine rate. The engine does
    /// no resampling; such sources are refused outright.
    #[error("sample rate mismatch: source is {source_rate} Hz, engine runs at {engine} Hz")]
    SampleRateMismatch {
        /// The source's native rate.
        source_rate: u32,
        /// The engine's configured rate.
        engine: u32,
    },

    /// The system has been closed; no further operations are possible.
    #[error("audio system is closed")]
    Closed,

    /// Device or engine-internal failure.
    #[error("audio error: {0}")]
    Audio(String),
}

/// Convenience result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
