//! Early reflections: a short stereo tapped delay with smoothed pre-delay.

use crate::utils::{
    dsp::delay::DelayLine,
    smoothing::{LinearSmoothedValue, SmoothedValue},
};

// -------------------------------------------------------------------------------------------------

/// Tap offsets in milliseconds and gains per channel. Distinct per side for stereo width.
const LEFT_TAPS: [(f32, f32); 6] = [
    (7.1, 0.84),
    (13.7, -0.62),
    (21.3, 0.51),
    (33.9, -0.42),
    (47.3, 0.33),
    (71.9, -0.24),
];
const RIGHT_TAPS: [(f32, f32); 6] = [
    (8.9, 0.81),
    (16.1, -0.60),
    (24.7, 0.49),
    (37.1, -0.40),
    (52.3, 0.31),
    (77.3, -0.22),
];

/// Output normalization of the summed taps.
const OUTPUT_GAIN: f32 = 0.5;

// -------------------------------------------------------------------------------------------------

/// Stereo early reflection generator.
#[derive(Debug, Clone)]
pub struct EarlyReflections {
    lines: [DelayLine; 2],
    left_taps: [(f32, f32); 6],
    right_taps: [(f32, f32); 6],
    pre_delay: LinearSmoothedValue,
    sample_rate: u32,
}

impl EarlyReflections {
    pub const MAX_PRE_DELAY_MS: f32 = 100.0;
    pub const MAX_TAP_MS: f32 = 80.0;

    const PRE_DELAY_SMOOTHING_MS: f32 = 50.0;

    pub fn new(sample_rate: u32) -> Self {
        let capacity = ((Self::MAX_PRE_DELAY_MS + Self::MAX_TAP_MS) * 0.001 * sample_rate as f32)
            .ceil() as usize
            + 4;
        let to_samples = |taps: [(f32, f32); 6]| {
            taps.map(|(ms, gain)| (ms * 0.001 * sample_rate as f32, gain * OUTPUT_GAIN))
        };
        Self {
            lines: [DelayLine::new(capacity), DelayLine::new(capacity)],
            left_taps: to_samples(LEFT_TAPS),
            right_taps: to_samples(RIGHT_TAPS),
            pre_delay: LinearSmoothedValue::with_duration(
                0.0,
                Self::PRE_DELAY_SMOOTHING_MS,
                sample_rate,
            ),
            sample_rate,
        }
    }

    /// Set a new pre-delay target in milliseconds. Called at block rate.
    pub fn set_pre_delay(&mut self, pre_delay_ms: f32) {
        let samples = pre_delay_ms.clamp(0.0, Self::MAX_PRE_DELAY_MS) * 0.001;
        self.pre_delay.set_target(samples * self.sample_rate as f32);
    }

    /// Jump to the target pre-delay.
    pub fn snap(&mut self) {
        self.pre_delay.reset();
    }

    /// Zero the delay buffers. Keeps the pre-delay target.
    pub fn reset(&mut self) {
        for line in &mut self.lines {
            line.flush();
        }
        self.pre_delay.reset();
    }

    /// Write the dry input and read the stereo reflections.
    #[inline]
    pub fn process(&mut self, input: [f32; 2]) -> [f32; 2] {
        let pre_delay = self.pre_delay.next();
        self.lines[0].write(input[0]);
        self.lines[1].write(input[1]);
        let left = Self::read_taps(&self.lines[0], &self.left_taps, pre_delay);
        let right = Self::read_taps(&self.lines[1], &self.right_taps, pre_delay);
        [left, right]
    }

    #[inline(always)]
    fn read_taps(line: &DelayLine, taps: &[(f32, f32); 6], pre_delay: f32) -> f32 {
        taps.iter()
            .map(|(offset, gain)| line.read_linear(pre_delay + offset) * gain)
            .sum()
    }
}

// -------------------------------------------------------------------------------------------------
