//! The block effect contract.
//!
//! Every routing node (group, bus, aux bus) owns an ordered chain of
//! effects. An effect transforms one channel's block of `period` samples
//! into a same-length block; stereo state is kept per channel inside the
//! effect so the left and right transforms stay independent.

use crate::mod_params::ModParams;

/// An audio effect processing stereo blocks in place.
///
/// Implementations must keep independent state per channel (two delay
/// lines, two filters, ...) so that each channel sees the pure per-channel
/// transform. Effects are owned by exactly one node and are never shared.
///
/// # Example
///
/// ```rust
/// use mezcla_core::BlockEffect;
///
/// struct Inverter;
///
/// impl BlockEffect for Inverter {
///     fn name(&self) -> &'static str {
///         "inverter"
///     }
///
///     fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
///         for s in left.iter_mut().chain(right.iter_mut()) {
///             *s = -*s;
///         }
///     }
///
///     fn reset(&mut self) {}
/// }
/// ```
pub trait BlockEffect: Send {
    /// Short stable name, used in logs.
    fn name(&self) -> &'static str;

    /// Process one period of both channels in place.
    ///
    /// `left` and `right` always have the engine period length. Modulable
    /// effects advance their parameter ramp by the block length here.
    fn process_block(&mut self, left: &mut [f32], right: &mut [f32]);

    /// Clear internal state (delay lines, filter history, envelopes)
    /// without changing parameters.
    fn reset(&mut self);

    /// Access the modulable parameter map, if this effect has one.
    ///
    /// The default is `None`; the four built-in effects all return their
    /// map so `update_effect_params` can reach it through the chain.
    fn params_mut(&mut self) -> Option<&mut ModParams> {
        None
    }
}

/// Apply a chain of effects to a stereo block in insertion order.
#[inline]
pub fn apply_chain(effects: &mut [Box<dyn BlockEffect>], left: &mut [f32], right: &mut [f32]) {
    for effect in effects {
        effect.process_block(left, right);
    }
}
