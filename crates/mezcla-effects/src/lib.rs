//! Audio effect implementations for the mezcla mixing engine.
//!
//! All four effects implement [`mezcla_core::BlockEffect`] and expose
//! their numeric parameters through a [`mezcla_core::ModParams`] map, so
//! the engine can ramp them between the current and a target value over a
//! time window:
//!
//! - [`Reverb`] — fixed-tap reverb with persistent delay rings
//!   (`room_size`, `damping`, `wet_level`, `dry_level`)
//! - [`Delay`] — single-tap delay (`delay_time`, `feedback`, `wet_level`)
//! - [`Compressor`] — envelope-follower dynamics (`threshold`, `ratio`,
//!   `attack`, `release`)
//! - [`EqFilter`] — order-4 Butterworth EQ blend (`frequency`, `q`,
//!   `gain`), with a fixed band kind per instance
//!
//! Every effect keeps independent left/right state, so each channel sees
//! the pure per-channel transform the mixer expects.

mod compressor;
mod delay;
mod eq;
mod reverb;

pub use compressor::Compressor;
pub use delay::Delay;
pub use eq::EqFilter;
pub use reverb::Reverb;
