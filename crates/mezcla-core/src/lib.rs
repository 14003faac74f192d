//! Mezcla Core - DSP and control-plane primitives for the mixing engine
//!
//! This crate provides the building blocks shared by the effect and engine
//! crates, designed for real-time block processing with zero allocation in
//! the audio path.
//!
//! # Core Abstractions
//!
//! ## Effect System
//!
//! - [`BlockEffect`] - Object-safe trait for stereo block effects
//! - [`ModParams`] - Named parameter maps with cosine ramps between the
//!   current and a target value
//!
//! ## Fades
//!
//! - [`Fade`] - Sample-counted cosine volume ramp, evaluated at block start
//!
//! ## Filters and Delay Lines
//!
//! - [`Biquad`] - Second-order IIR filter with RBJ cookbook coefficients
//! - [`butterworth_coefficients`] - Order-4 cascade design for the EQ effect
//! - [`DelayRing`] - Persistent circular delay line for reverb/delay taps
//! - [`EnvelopeFollower`] - Amplitude envelope detection for dynamics
//!
//! ## Utilities
//!
//! Math helpers: [`hard_clip`], [`cubic_interpolate`], [`block_peak`],
//! [`block_rms`], [`cosine_step`], [`db_gain_delta`].
//!
//! # Design Principles
//!
//! - **Real-time safe**: no allocations in block processing paths
//! - **Object-safe traits**: effect chains use dynamic dispatch
//! - **Engine-rate authoritative**: every sample count is derived from the
//!   configured engine rate, never a hard-coded one

pub mod biquad;
pub mod delay_line;
pub mod effect;
pub mod envelope;
pub mod fade;
pub mod math;
pub mod mod_params;

pub use biquad::{Biquad, Coefficients, FilterKind, butterworth_coefficients, design};
pub use delay_line::DelayRing;
pub use effect::{BlockEffect, apply_chain};
pub use envelope::EnvelopeFollower;
pub use fade::{Fade, fade_length};
pub use math::{
    block_peak, block_rms, cosine_step, cubic_interpolate, db_gain_delta, hard_clip,
};
pub use mod_params::ModParams;
