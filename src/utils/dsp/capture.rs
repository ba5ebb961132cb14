//! Linear, fixed capacity recording buffers for loop capture.

use assume::assume;

use super::interpolation;

// -------------------------------------------------------------------------------------------------

/// Records frames of `CHANNELS` interleaved samples up to a fixed capacity, then allows reading
/// them back at fractional positions, wrapping within a caller supplied loop length.
///
/// Memory is allocated once in [`CaptureBuffer::new`]. Recording past the capacity is ignored.
#[derive(Debug, Default, Clone)]
pub struct CaptureBuffer<const CHANNELS: usize> {
    buffer: Vec<f32>,
    len: usize,
}

impl<const CHANNELS: usize> CaptureBuffer<CHANNELS> {
    /// Create a zeroed capture buffer for up to `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(4);
        Self {
            buffer: vec![0.0; capacity * CHANNELS],
            len: 0,
        }
    }

    /// Max number of frames which can be recorded.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.buffer.len() / CHANNELS
    }

    /// Number of recorded frames.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.len >= self.capacity()
    }

    /// Forget recorded content, keeping memory. Stale samples are overwritten by new recordings.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Forget recorded content and zero the memory.
    pub fn flush(&mut self) {
        self.buffer.fill(0.0);
        self.len = 0;
    }

    /// Append a frame. Returns false when the buffer is full and the frame got dropped.
    #[inline]
    pub fn record(&mut self, frame: [f32; CHANNELS]) -> bool {
        if self.is_full() {
            return false;
        }
        let offset = self.len * CHANNELS;
        assume!(unsafe: offset + CHANNELS <= self.buffer.len());
        self.buffer[offset..offset + CHANNELS].copy_from_slice(&frame);
        self.len += 1;
        true
    }

    /// Access a single recorded frame. Index must be < len.
    #[inline]
    pub fn frame(&self, index: usize) -> [f32; CHANNELS] {
        debug_assert!(index < self.len, "Frame index out of bounds");
        let offset = index.min(self.capacity() - 1) * CHANNELS;
        let mut frame = [0.0; CHANNELS];
        frame.copy_from_slice(&self.buffer[offset..offset + CHANNELS]);
        frame
    }

    /// Read a single channel at a fractional frame position with cubic interpolation.
    /// Neighbor frames wrap around within `loop_len` frames, which must be <= len.
    #[inline]
    pub fn read_cubic(&self, channel: usize, position: f32, loop_len: usize) -> f32 {
        debug_assert!(channel < CHANNELS, "Invalid channel");
        let loop_len = loop_len.min(self.len);
        if loop_len < 4 {
            return 0.0;
        }
        let position = Self::wrap_position(position, loop_len);
        let index = position as usize;
        let fraction = position - index as f32;

        let i1 = index.min(loop_len - 1);
        let i0 = Self::wrap(i1 as isize - 1, loop_len);
        let i2 = Self::wrap(i1 as isize + 1, loop_len);
        let i3 = Self::wrap(i1 as isize + 2, loop_len);

        let len = self.buffer.len();
        let (s0, s1, s2, s3) = (
            i0 * CHANNELS + channel,
            i1 * CHANNELS + channel,
            i2 * CHANNELS + channel,
            i3 * CHANNELS + channel,
        );
        assume!(unsafe: s0 < len && s1 < len && s2 < len && s3 < len);
        interpolation::cubic(
            self.buffer[s0],
            self.buffer[s1],
            self.buffer[s2],
            self.buffer[s3],
            fraction,
        )
    }

    /// Wrap a fractional position into `[0, loop_len)` with a single conditional add or subtract.
    #[inline(always)]
    pub fn wrap_position(position: f32, loop_len: usize) -> f32 {
        let len = loop_len as f32;
        let mut position = position;
        if position < 0.0 {
            position += len;
        } else if position >= len {
            position -= len;
        }
        if position >= len || !(position >= 0.0) {
            0.0
        } else {
            position
        }
    }

    #[inline(always)]
    fn wrap(index: isize, loop_len: usize) -> usize {
        let len = loop_len as isize;
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
