//! Small math helpers shared across the workspace.

use libm::{cosf, powf, sqrtf};

/// Cosine easing step for fades and parameter ramps.
///
/// Maps a normalized position `x` in `[0, 1]` to `0.5 * (1 - cos(pi * x))`,
/// which starts and ends with zero slope. Values outside the range are
/// clamped so a ramp that overshoots its counter still lands on the target.
#[inline]
pub fn cosine_step(x: f32) -> f32 {
    let x = x.clamp(0.0, 1.0);
    0.5 * (1.0 - cosf(core::f32::consts::PI * x))
}

/// Hard clip with sign preservation: clamps `x` to `[-limit, limit]`.
#[inline]
pub fn hard_clip(x: f32, limit: f32) -> f32 {
    x.clamp(-limit, limit)
}

/// Linear gain delta for a dB amount: `10^(db/20) - 1`.
///
/// Used by the EQ blend law `y = x + (filtered - x) * db_gain_delta(gain)`,
/// so 0 dB yields a bit-exact passthrough.
#[inline]
pub fn db_gain_delta(gain_db: f32) -> f32 {
    powf(10.0, gain_db / 20.0) - 1.0
}

/// 4-point cubic interpolation at fractional position `t` in `[0, 1)`
/// between `y1` and `y2`.
///
/// `t == 0.0` returns `y1` bit-exactly; callers relying on sample-exact
/// reads at integer positions should still take the integer fast path to
/// skip the neighbor loads.
#[inline]
pub fn cubic_interpolate(y0: f32, y1: f32, y2: f32, y3: f32, t: f32) -> f32 {
    if t == 0.0 {
        return y1;
    }
    let t2 = t * t;
    let t3 = t2 * t;

    let a0 = y3 - y2 - y0 + y1;
    let a1 = y0 - y1 - a0;
    let a2 = y2 - y0;
    let a3 = y1;

    a0 * t3 + a1 * t2 + a2 * t + a3
}

/// Absolute peak of a sample block.
#[inline]
pub fn block_peak(block: &[f32]) -> f32 {
    let mut peak = 0.0f32;
    for &s in block {
        let a = s.abs();
        if a > peak {
            peak = a;
        }
    }
    peak
}

/// Root-mean-square of a sample block. Empty blocks yield 0.
#[inline]
pub fn block_rms(block: &[f32]) -> f32 {
    if block.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = block.iter().map(|s| s * s).sum();
    sqrtf(sum_sq / block.len() as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_step_endpoints() {
        assert_eq!(cosine_step(0.0), 0.0);
        assert!((cosine_step(1.0) - 1.0).abs() < 1e-6);
        assert!((cosine_step(0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn cosine_step_clamps() {
        assert_eq!(cosine_step(-1.0), 0.0);
        assert!((cosine_step(2.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn hard_clip_preserves_sign() {
        assert_eq!(hard_clip(2.0, 0.95), 0.95);
        assert_eq!(hard_clip(-2.0, 0.95), -0.95);
        assert_eq!(hard_clip(0.5, 0.95), 0.5);
    }

    #[test]
    fn db_gain_delta_zero_db() {
        assert!(db_gain_delta(0.0).abs() < 1e-7);
        assert!((db_gain_delta(6.0) - 0.9953).abs() < 0.01);
    }

    #[test]
    fn cubic_exact_at_integers() {
        assert_eq!(cubic_interpolate(0.3, 0.7, -0.2, 0.1, 0.0), 0.7);
    }

    #[test]
    fn cubic_interpolates_midpoint_of_line() {
        // Points on a straight line interpolate linearly.
        let y = cubic_interpolate(0.0, 1.0, 2.0, 3.0, 0.5);
        assert!((y - 1.5).abs() < 1e-6);
    }

    #[test]
    fn peak_and_rms() {
        let block = [0.5, -1.0, 0.25, 0.0];
        assert_eq!(block_peak(&block), 1.0);
        let expected = ((0.25 + 1.0 + 0.0625) / 4.0f32).sqrt();
        assert!((block_rms(&block) - expected).abs() < 1e-6);
    }

    #[test]
    fn rms_of_empty_block() {
        assert_eq!(block_rms(&[]), 0.0);
    }
}
