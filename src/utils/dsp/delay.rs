//! Circular delay buffers with fractional read access.

use assume::assume;

use super::interpolation;

// -------------------------------------------------------------------------------------------------

/// Mono circular delay line with a fixed capacity and an explicit write cursor.
///
/// The buffer is allocated once in [`DelayLine::new`] and never resized. All index wrapping is
/// done by conditional add/subtract of the capacity, never by a modulo on signed values, so
/// indices are kept in `[0, capacity)` at all times.
#[derive(Debug, Default, Clone)]
pub struct DelayLine {
    buffer: Vec<f32>,
    write_pos: usize,
}

impl DelayLine {
    /// Smallest delay in samples which can be read with cubic interpolation.
    pub const MIN_CUBIC_DELAY: f32 = 2.0;
    /// Smallest delay in samples which can be read with linear interpolation.
    pub const MIN_LINEAR_DELAY: f32 = 1.0;

    /// Create a new zeroed delay line which can hold `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(4);
        Self {
            buffer: vec![0.0; capacity],
            write_pos: 0,
        }
    }

    /// Number of samples the delay line can hold.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Largest delay in samples which can be read without touching unwritten history.
    #[inline(always)]
    pub fn max_delay(&self) -> f32 {
        (self.buffer.len() - 3) as f32
    }

    /// Position the next sample will be written to.
    #[inline(always)]
    pub fn write_position(&self) -> usize {
        self.write_pos
    }

    /// Zero the buffer and rewind the write cursor.
    pub fn flush(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }

    /// Write a new sample and advance the write cursor.
    #[inline]
    pub fn write(&mut self, sample: f32) {
        let len = self.buffer.len();
        assume!(unsafe: self.write_pos < len, "Write cursor is always kept in range");
        self.buffer[self.write_pos] = sample;
        self.write_pos += 1;
        if self.write_pos >= len {
            self.write_pos = 0;
        }
    }

    /// Read the sample which was written `delay` samples before the most recent one, using
    /// cubic interpolation. Delays are clamped to `[MIN_CUBIC_DELAY, max_delay]`.
    #[inline]
    pub fn read_cubic(&self, delay: f32) -> f32 {
        let delay = delay.clamp(Self::MIN_CUBIC_DELAY, self.max_delay());
        self.read_at(self.position_of(delay))
    }

    /// Read the sample which was written `delay` samples before the most recent one, using
    /// linear interpolation. Delays are clamped to `[MIN_LINEAR_DELAY, max_delay]`.
    #[inline]
    pub fn read_linear(&self, delay: f32) -> f32 {
        let delay = delay.clamp(Self::MIN_LINEAR_DELAY, self.max_delay());
        let position = self.position_of(delay);
        let index = position as usize;
        let fraction = position - index as f32;
        let i0 = self.wrap(index as isize);
        let i1 = self.wrap(index as isize + 1);
        interpolation::linear(self.buffer[i0], self.buffer[i1], fraction)
    }

    /// Read at an absolute, fractional buffer position in `[0, capacity)` with cubic
    /// interpolation. Positions outside that range are wrapped once.
    #[inline]
    pub fn read_at(&self, position: f32) -> f32 {
        let position = self.wrap_position(position);
        let index = position as usize;
        let fraction = position - index as f32;

        let len = self.buffer.len();
        let i1 = index.min(len - 1);
        let i0 = self.wrap(i1 as isize - 1);
        let i2 = self.wrap(i1 as isize + 1);
        let i3 = self.wrap(i1 as isize + 2);

        assume!(unsafe: i0 < len && i1 < len && i2 < len && i3 < len);
        interpolation::cubic(
            self.buffer[i0],
            self.buffer[i1],
            self.buffer[i2],
            self.buffer[i3],
            fraction,
        )
    }

    /// Absolute buffer position of the sample `delay` samples before the most recent one.
    #[inline]
    pub fn position_of(&self, delay: f32) -> f32 {
        let newest = if self.write_pos == 0 {
            self.buffer.len() - 1
        } else {
            self.write_pos - 1
        };
        self.wrap_position(newest as f32 - delay)
    }

    /// Wrap a fractional position into `[0, capacity)` by a single conditional add or subtract.
    #[inline(always)]
    pub fn wrap_position(&self, position: f32) -> f32 {
        let len = self.buffer.len() as f32;
        let mut position = position;
        if position < 0.0 {
            position += len;
        } else if position >= len {
            position -= len;
        }
        // guard against rounding up to `len` after adding to a tiny negative value
        if position >= len || !(position >= 0.0) {
            0.0
        } else {
            position
        }
    }

    #[inline(always)]
    fn wrap(&self, index: isize) -> usize {
        let len = self.buffer.len() as isize;
        let mut index = index;
        if index < 0 {
            index += len;
        } else if index >= len {
            index -= len;
        }
        index as usize
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_delays_are_exact() {
        let mut line = DelayLine::new(64);
        for i in 0..100 {
            line.write(i as f32);
        }
        // most recent sample is 99
        assert_eq!(line.read_cubic(2.0), 97.0);
        assert_eq!(line.read_cubic(10.0), 89.0);
        assert_eq!(line.read_linear(1.0), 98.0);
    }

    #[test]
    fn fractional_delays_interpolate() {
        let mut line = DelayLine::new(32);
        for i in 0..40 {
            line.write(i as f32 * 0.5);
        }
        let newest = 39.0 * 0.5;
        assert!((line.read_cubic(4.5) - (newest - 4.5 * 0.5)).abs() < 1e-4);
        assert!((line.read_linear(3.25) - (newest - 3.25 * 0.5)).abs() < 1e-4);
    }

    #[test]
    fn positions_stay_in_range() {
        let mut line = DelayLine::new(16);
        for i in 0..1000 {
            line.write((i as f32 * 0.1).sin());
            assert!(line.write_position() < line.capacity());
            for delay in [0.0f32, 2.0, 7.3, 15.9, 1000.0, -3.0] {
                let position = line.position_of(delay.clamp(0.0, line.max_delay()));
                assert!((0.0..line.capacity() as f32).contains(&position));
                assert!(line.read_cubic(delay).is_finite());
            }
        }
        assert_eq!(line.wrap_position(-0.5), 15.5);
        assert_eq!(line.wrap_position(16.5), 0.5);
    }

    #[test]
    fn flush_zeroes_content() {
        let mut line = DelayLine::new(8);
        for _ in 0..8 {
            line.write(1.0);
        }
        line.flush();
        assert_eq!(line.write_position(), 0);
        assert_eq!(line.read_cubic(3.0), 0.0);
    }
}
