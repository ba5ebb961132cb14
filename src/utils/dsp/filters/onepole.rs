//! One-pole low and high pass filters.

use crate::utils::dsp::saturation::flush_denormal;

// -------------------------------------------------------------------------------------------------

/// Coefficient of a one-pole smoothing filter with the given cutoff.
/// Cutoffs at or above Nyquist result in a pass-through coefficient of 1.
pub fn one_pole_coefficient(cutoff: f32, sample_rate: u32) -> f32 {
    debug_assert!(sample_rate > 0, "Invalid sample rate");
    let nyquist = sample_rate as f32 * 0.5;
    if cutoff >= nyquist {
        1.0
    } else if cutoff <= 0.0 {
        0.0
    } else {
        1.0 - (-std::f32::consts::TAU * cutoff / sample_rate as f32).exp()
    }
}

// -------------------------------------------------------------------------------------------------

/// One-pole (6 dB/oct) low-pass filter: `y(n) = y(n-1) + a * (x(n) - y(n-1))`.
#[derive(Debug, Clone)]
pub struct OnePoleLowpass {
    coefficient: f32,
    state: f32,
}

impl OnePoleLowpass {
    pub fn new(sample_rate: u32, cutoff: f32) -> Self {
        Self {
            coefficient: one_pole_coefficient(cutoff, sample_rate),
            state: 0.0,
        }
    }

    /// Set a new cutoff frequency in Hz.
    pub fn set_cutoff(&mut self, sample_rate: u32, cutoff: f32) {
        self.coefficient = one_pole_coefficient(cutoff, sample_rate);
    }

    /// Set the raw coefficient. 1.0 passes the signal through unchanged.
    pub fn set_coefficient(&mut self, coefficient: f32) {
        self.coefficient = coefficient.clamp(0.0, 1.0);
    }

    #[inline(always)]
    pub fn coefficient(&self) -> f32 {
        self.coefficient
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.state = flush_denormal(self.state + self.coefficient * (input - self.state));
        self.state
    }

    pub fn reset(&mut self) {
        self.state = 0.0;
    }
}

impl Default for OnePoleLowpass {
    fn default() -> Self {
        Self {
            coefficient: 1.0,
            state: 0.0,
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// One-pole (6 dB/oct) high-pass filter, the complement of a [`OnePoleLowpass`].
#[derive(Debug, Clone, Default)]
pub struct OnePoleHighpass {
    lowpass: OnePoleLowpass,
}

impl OnePoleHighpass {
    pub fn new(sample_rate: u32, cutoff: f32) -> Self {
        Self {
            lowpass: OnePoleLowpass::new(sample_rate, cutoff),
        }
    }

    /// Set a new cutoff frequency in Hz.
    pub fn set_cutoff(&mut self, sample_rate: u32, cutoff: f32) {
        self.lowpass.set_cutoff(sample_rate, cutoff);
    }

    /// Set the raw coefficient of the underlying low-pass. 0.0 passes the signal through.
    pub fn set_coefficient(&mut self, coefficient: f32) {
        self.lowpass.set_coefficient(coefficient);
    }

    #[inline(always)]
    pub fn coefficient(&self) -> f32 {
        self.lowpass.coefficient()
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        flush_denormal(input - self.lowpass.process(input))
    }

    pub fn reset(&mut self) {
        self.lowpass.reset();
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn rms_after_settle(filter: &mut impl FnMut(f32) -> f32, frequency: f32) -> f32 {
        let sample_rate = 48000.0;
        let mut sum = 0.0;
        for i in 0..96000 {
            let x = (std::f32::consts::TAU * frequency * i as f32 / sample_rate).sin();
            let y = filter(x);
            if i >= 48000 {
                sum += y * y;
            }
        }
        (sum / 48000.0).sqrt()
    }

    #[test]
    fn lowpass_attenuates_highs() {
        let mut lowpass = OnePoleLowpass::new(48000, 500.0);
        let low = rms_after_settle(&mut |x| lowpass.process(x), 50.0);
        lowpass.reset();
        let high = rms_after_settle(&mut |x| lowpass.process(x), 10000.0);
        assert!(low > 0.65);
        assert!(high < 0.1);
    }

    #[test]
    fn highpass_attenuates_lows() {
        let mut highpass = OnePoleHighpass::new(48000, 500.0);
        let low = rms_after_settle(&mut |x| highpass.process(x), 20.0);
        highpass.reset();
        let high = rms_after_settle(&mut |x| highpass.process(x), 10000.0);
        assert!(low < 0.1);
        assert!(high > 0.65);
    }

    #[test]
    fn coefficient_edges() {
        assert_eq!(one_pole_coefficient(30000.0, 48000), 1.0);
        assert_eq!(one_pole_coefficient(0.0, 48000), 0.0);
        let mut bypass = OnePoleLowpass::new(48000, 24000.0);
        assert_eq!(bypass.process(0.3), 0.3);
    }
}
