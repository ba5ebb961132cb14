//! Fractional sample interpolation kernels.

// -------------------------------------------------------------------------------------------------

/// 4-point, 3rd order Catmull-Rom interpolation between `y1` and `y2` at `fraction` (0..1).
///
/// Returns exactly `y1` for a zero fraction, so integer read positions are lossless.
#[inline(always)]
pub fn cubic(y0: f32, y1: f32, y2: f32, y3: f32, fraction: f32) -> f32 {
    let a = -0.5 * y0 + 1.5 * y1 - 1.5 * y2 + 0.5 * y3;
    let b = y0 - 2.5 * y1 + 2.0 * y2 - 0.5 * y3;
    let c = -0.5 * y0 + 0.5 * y2;
    ((a * fraction + b) * fraction + c) * fraction + y1
}

/// Linear interpolation between `y0` and `y1` at `fraction` (0..1).
#[inline(always)]
pub fn linear(y0: f32, y1: f32, fraction: f32) -> f32 {
    y0 + (y1 - y0) * fraction
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cubic_hits_sample_points() {
        assert_eq!(cubic(0.3, -0.7, 0.9, 0.1, 0.0), -0.7);
        assert!((cubic(0.3, -0.7, 0.9, 0.1, 1.0) - 0.9).abs() < 1e-6);
    }

    #[test]
    fn cubic_reproduces_lines() {
        // Catmull-Rom is exact for linear ramps
        for i in 0..=10 {
            let t = i as f32 / 10.0;
            assert!((cubic(0.0, 1.0, 2.0, 3.0, t) - (1.0 + t)).abs() < 1e-5);
        }
    }

    #[test]
    fn linear_midpoint() {
        assert_eq!(linear(1.0, 3.0, 0.5), 2.0);
    }
}
