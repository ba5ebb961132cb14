//! Waveshapers and numeric guards for feedback paths.

// -------------------------------------------------------------------------------------------------

/// Magnitude below which values are flushed to zero to avoid denormal CPU spikes.
pub const DENORMAL_THRESHOLD: f32 = 1.0e-15;

/// Flush tiny values to exactly zero.
#[inline(always)]
pub fn flush_denormal(value: f32) -> f32 {
    if value.abs() < DENORMAL_THRESHOLD {
        0.0
    } else {
        value
    }
}

/// Replace non finite values (NaN, ±inf) with silence.
#[inline(always)]
pub fn sanitize(value: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

// -------------------------------------------------------------------------------------------------

/// Soft clipper which is linear up to `threshold` and bends into a tanh knee above it.
/// The result is bounded to `[-1, 1]` for any input, NaN maps to 0.
#[inline]
pub fn soft_clip_with_threshold(value: f32, threshold: f32) -> f32 {
    debug_assert!((0.0..1.0).contains(&threshold), "Invalid threshold");
    let magnitude = value.abs();
    if magnitude <= threshold {
        value
    } else if magnitude.is_nan() {
        0.0
    } else {
        let headroom = 1.0 - threshold;
        let shaped = threshold + headroom * ((magnitude - threshold) / headroom).tanh();
        shaped.min(1.0).copysign(value)
    }
}

/// Soft clipper with the default knee at 0.9.
#[inline]
pub fn soft_clip(value: f32) -> f32 {
    soft_clip_with_threshold(value, 0.9)
}

/// Normalized tanh saturation: `tanh(k·x) / k`. With `k == 1` this is a plain tanh, larger
/// values of `k` saturate earlier and lower.
#[inline]
pub fn saturate(value: f32, k: f32) -> f32 {
    let k = k.max(1.0);
    (value * k).tanh() / k
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_clip_is_linear_below_knee() {
        for value in [-0.9, -0.5, 0.0, 0.25, 0.9] {
            assert_eq!(soft_clip(value), value);
        }
    }

    #[test]
    fn soft_clip_is_bounded_and_monotonic() {
        let mut last = soft_clip(-1000.0);
        for i in -10000..=10000 {
            let value = soft_clip(i as f32 * 0.01);
            assert!((-1.0..=1.0).contains(&value));
            assert!(value >= last);
            last = value;
        }
        assert_eq!(soft_clip(f32::INFINITY), 1.0);
        assert_eq!(soft_clip(f32::NEG_INFINITY), -1.0);
        assert_eq!(soft_clip(f32::NAN), 0.0);
    }

    #[test]
    fn saturation_shrinks_with_k() {
        assert!(saturate(0.8, 1.0) > saturate(0.8, 6.0));
        assert!((saturate(0.01, 1.0) - 0.01).abs() < 1e-5);
    }

    #[test]
    fn guards() {
        assert_eq!(flush_denormal(1e-20), 0.0);
        assert_eq!(flush_denormal(-1e-3), -1e-3);
        assert_eq!(sanitize(f32::NAN), 0.0);
        assert_eq!(sanitize(0.5), 0.5);
    }
}
