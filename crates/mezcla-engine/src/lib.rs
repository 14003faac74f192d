//! Mezcla Engine - real-time audio mixing.
//!
//! The engine mixes many concurrently playing sources through a
//! hierarchical routing graph, one block per period:
//!
//! ```text
//! sources -> groups -> buses --(sends)--> aux buses
//!                         \                   |
//!                          +--> master <------+--> limiter -> output pump
//! ```
//!
//! - [`Source`] - in-memory clips, disk streams, generated signals, each
//!   with play/pause/seek/fade/loop/speed controls
//! - [`Group`] / [`Bus`] - fader/effect nodes with solo/mute; buses carry
//!   named send levels into aux buses
//! - [`System`] - the owning aggregate: device, workers, master volume,
//!   limiter, metrics, lifecycle
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mezcla_engine::{EngineConfig, Source, System};
//! use std::sync::Arc;
//!
//! let mut system = System::open(EngineConfig::default())?;
//! let group = system.create_group("tones");
//! let bus = system.create_bus("main");
//!
//! let tone = Arc::new(Source::sine(440.0, 2.0, system.sample_rate(), 0.5));
//! system.add_to_group(&group, Arc::clone(&tone))?;
//! system.add_to_bus(&bus, group);
//! system.add_bus(bus);
//!
//! system.start()?;
//! tone.play(0.1);
//! # Ok::<(), mezcla_engine::Error>(())
//! ```
//!
//! # Concurrency
//!
//! Two long-lived workers (mixer and output pump) cooperate through a
//! bounded, recycled block queue; control calls may come from any thread
//! and serialize on the mutated node's own mutex. The mixer takes the
//! same per-node locks when it walks the graph, so a node is never seen
//! half-mutated, though there is no cross-node atomicity.

mod bus;
mod error;
mod group;
mod metrics;
mod mixer;
mod queue;
mod source;
mod stream_buffer;
mod strip;
mod system;

pub use bus::Bus;
pub use error::{Error, Result};
pub use group::Group;
pub use metrics::MetricsSnapshot;
pub use source::{PlaybackState, Source};
pub use system::{EngineConfig, Lifecycle, LimiterConfig, System};

// Re-export the pieces callers need to build graphs and effect chains
// without depending on every workspace crate directly.
pub use mezcla_core::{BlockEffect, FilterKind, ModParams};
pub use mezcla_effects::{Compressor, Delay, EqFilter, Reverb};
pub use mezcla_io::{OutputDevice, SinkCollector, SinkOutput};
