//! Feedback delay network: 8 modulated, damped delay lines coupled by a Hadamard matrix.

use super::matrix::{self, LINES};
use crate::utils::{
    dsp::{
        delay::DelayLine,
        filters::onepole::{one_pole_coefficient, OnePoleHighpass, OnePoleLowpass},
        saturation::{flush_denormal, soft_clip},
    },
    lerp,
};

// -------------------------------------------------------------------------------------------------

/// Base delay line lengths in milliseconds. Mutually incommensurate to avoid stacked comb
/// resonances.
pub const BASE_DELAYS_MS: [f32; LINES] = [29.7, 34.3, 38.9, 44.3, 49.1, 55.7, 61.9, 69.1];

/// Largest supported size scaling.
pub const MAX_SIZE: f32 = 2.0;

/// Feedback gain ceiling in normal operation.
pub const GAIN_CEILING: f32 = 0.995;
/// Feedback gain ceiling (and fixed gain) while frozen.
pub const FREEZE_GAIN_CEILING: f32 = 0.99999;

/// Smallest decay time used in gain calculations.
const MIN_DECAY_SECONDS: f32 = 1.0e-3;

/// Feedback gain for a line of the given length to reach -60 dB after `decay` seconds.
///
/// `gain = exp(ln(0.001) * delay / decay)`, clamped to `ceiling`.
pub fn feedback_gain(delay_seconds: f32, decay_seconds: f32, ceiling: f32) -> f32 {
    let decay_seconds = decay_seconds.max(MIN_DECAY_SECONDS);
    let gain = (0.001f32.ln() * delay_seconds / decay_seconds).exp();
    gain.min(ceiling)
}

/// Damping low-pass cutoff for the given tone: 2.5 kHz (dark) to 18 kHz (bright).
pub fn damping_lowpass_cutoff(tone: f32) -> f32 {
    let t = (tone.clamp(-1.0, 1.0) + 1.0) * 0.5;
    2500.0 * (18000.0f32 / 2500.0).powf(t)
}

/// Damping high-pass cutoff for the given tone: brighter settings also thin the low end.
pub fn damping_highpass_cutoff(tone: f32) -> f32 {
    let t = (tone.clamp(-1.0, 1.0) + 1.0) * 0.5;
    lerp(25.0, 90.0, t)
}

// -------------------------------------------------------------------------------------------------

/// Values the current coefficients were computed from.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CoefficientState {
    decay: f32,
    tone: f32,
    size: f32,
    frozen: bool,
}

impl CoefficientState {
    /// True when `other` differs enough to be worth a recalculation.
    fn differs_from(&self, other: &Self) -> bool {
        self.frozen != other.frozen
            || (self.decay - other.decay).abs() > self.decay * 0.005
            || (self.tone - other.tone).abs() > 0.005
            || (self.size - other.size).abs() > 0.001
    }
}

// -------------------------------------------------------------------------------------------------

/// The reverb's feedback delay network.
///
/// Per sample: read all lines at their modulated lengths, damp, mix through the orthogonal
/// matrix, scale by the per line feedback gain, add the injected input and write back through a
/// soft clipper.
#[derive(Debug, Clone)]
pub struct FeedbackDelayNetwork {
    lines: [DelayLine; LINES],
    base_delays: [f32; LINES],
    gains: [f32; LINES],
    lowpasses: [OnePoleLowpass; LINES],
    highpasses: [OnePoleHighpass; LINES],
    coefficient_state: Option<CoefficientState>,
    frozen: bool,
    sample_rate: u32,
}

impl FeedbackDelayNetwork {
    /// Input distribution: even lines are fed from the left, odd lines from the right channel,
    /// with a sign pattern which decorrelates the lines further.
    const INPUT_SIGNS: [f32; LINES] = [1.0, 1.0, -1.0, 1.0, 1.0, -1.0, -1.0, -1.0];
    const INPUT_GAIN: f32 = 0.5;
    /// 1/√(N/2): each output channel sums 4 lines.
    const OUTPUT_GAIN: f32 = 0.5;

    const FREEZE_HIGHPASS_HZ: f32 = 10.0;

    pub fn new(sample_rate: u32, max_modulation_samples: f32) -> Self {
        let capacity = Self::line_capacity(sample_rate, max_modulation_samples);
        let base_delays = BASE_DELAYS_MS.map(|ms| ms * 0.001 * sample_rate as f32);
        Self {
            lines: std::array::from_fn(|_| DelayLine::new(capacity)),
            base_delays,
            gains: [0.0; LINES],
            lowpasses: std::array::from_fn(|_| OnePoleLowpass::default()),
            highpasses: std::array::from_fn(|_| OnePoleHighpass::default()),
            coefficient_state: None,
            frozen: false,
            sample_rate,
        }
    }

    /// Capacity of every line in samples: the longest base delay at max size, plus modulation
    /// depth and interpolation guard samples.
    pub fn line_capacity(sample_rate: u32, max_modulation_samples: f32) -> usize {
        let max_base = BASE_DELAYS_MS[LINES - 1] * 0.001 * sample_rate as f32;
        (max_base * MAX_SIZE + max_modulation_samples).ceil() as usize + 4
    }

    /// Longest line delay in seconds at the given size.
    pub fn longest_delay_seconds(size: f32) -> f32 {
        BASE_DELAYS_MS[LINES - 1] * 0.001 * size
    }

    /// Current per line feedback gains.
    pub fn feedback_gains(&self) -> &[f32; LINES] {
        &self.gains
    }

    /// Recompute feedback gains and damping when decay, tone, size or freeze changed materially.
    /// Returns true when coefficients got updated. Called at block rate.
    pub fn update_coefficients(&mut self, decay: f32, tone: f32, size: f32, frozen: bool) -> bool {
        let state = CoefficientState {
            decay,
            tone,
            size,
            frozen,
        };
        if self
            .coefficient_state
            .is_some_and(|current| !current.differs_from(&state))
        {
            return false;
        }
        self.coefficient_state = Some(state);
        self.frozen = frozen;

        if frozen {
            self.gains = [FREEZE_GAIN_CEILING; LINES];
            let highpass = one_pole_coefficient(Self::FREEZE_HIGHPASS_HZ, self.sample_rate);
            for (lowpass, hp) in self.lowpasses.iter_mut().zip(self.highpasses.iter_mut()) {
                lowpass.set_coefficient(1.0);
                hp.set_coefficient(highpass);
            }
        } else {
            for (gain, base_delay) in self.gains.iter_mut().zip(self.base_delays.iter()) {
                let delay_seconds = base_delay * size / self.sample_rate as f32;
                *gain = feedback_gain(delay_seconds, decay, GAIN_CEILING);
            }
            let lowpass = one_pole_coefficient(damping_lowpass_cutoff(tone), self.sample_rate);
            let highpass = one_pole_coefficient(damping_highpass_cutoff(tone), self.sample_rate);
            for (lp, hp) in self.lowpasses.iter_mut().zip(self.highpasses.iter_mut()) {
                lp.set_coefficient(lowpass);
                hp.set_coefficient(highpass);
            }
        }
        true
    }

    /// Zero all lines and filter states. Keeps coefficients.
    pub fn reset(&mut self) {
        for line in &mut self.lines {
            line.flush();
        }
        for lowpass in &mut self.lowpasses {
            lowpass.reset();
        }
        for highpass in &mut self.highpasses {
            highpass.reset();
        }
    }

    /// Forget the coefficient state, so the next update recalculates unconditionally.
    pub fn invalidate_coefficients(&mut self) {
        self.coefficient_state = None;
    }

    /// Run one sample frame through the network.
    ///
    /// `input` is the stereo injection, `size` the smoothed size factor and `modulation` the per
    /// line read offsets in samples. Returns the stereo network output.
    #[inline]
    pub fn process(&mut self, input: [f32; 2], size: f32, modulation: &[f32; LINES]) -> [f32; 2] {
        let mut taps = [0.0f32; LINES];
        for i in 0..LINES {
            let mut delay = self.base_delays[i] * size + modulation[i];
            if self.frozen {
                delay = delay.round();
            }
            let sample = self.lines[i].read_cubic(delay);
            taps[i] = self.highpasses[i].process(self.lowpasses[i].process(sample));
        }

        let [left, right] = Self::mix_output(&taps);

        matrix::hadamard(&mut taps);
        for i in 0..LINES {
            let injection = input[i & 1] * Self::INPUT_SIGNS[i] * Self::INPUT_GAIN;
            let feedback = taps[i] * self.gains[i];
            self.lines[i].write(soft_clip(flush_denormal(feedback + injection)));
        }

        [left, right]
    }

    #[inline(always)]
    fn mix_output(taps: &[f32; LINES]) -> [f32; 2] {
        let left = taps[0] - taps[2] + taps[4] - taps[6];
        let right = taps[1] - taps[3] + taps[5] - taps[7];
        [left * Self::OUTPUT_GAIN, right * Self::OUTPUT_GAIN]
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gain_matches_t60_relation() {
        for (delay, decay) in [(0.0297, 0.4), (0.05, 2.0), (0.1382, 50.0)] {
            let expected = (0.001f32.ln() * delay / decay).exp();
            let gain = feedback_gain(delay, decay, 1.0);
            assert!((gain - expected).abs() < 1e-6);
        }
        // ceiling
        assert_eq!(feedback_gain(0.001, 50.0, GAIN_CEILING), GAIN_CEILING);
        // divide by zero guard
        assert!(feedback_gain(0.05, 0.0, GAIN_CEILING).is_finite());
    }

    #[test]
    fn gain_decreases_with_decay() {
        let mut last = f32::MAX;
        for i in (1..=500).rev() {
            let decay = i as f32 * 0.1;
            let gain = feedback_gain(0.0691, decay, 1.0);
            assert!(gain <= last);
            last = gain;
        }
    }

    #[test]
    fn damping_cutoffs() {
        assert!((damping_lowpass_cutoff(-1.0) - 2500.0).abs() < 1e-2);
        assert!((damping_lowpass_cutoff(1.0) - 18000.0).abs() < 1e-1);
        assert_eq!(damping_highpass_cutoff(-1.0), 25.0);
        assert_eq!(damping_highpass_cutoff(1.0), 90.0);
    }

    #[test]
    fn coefficient_hysteresis() {
        let mut fdn = FeedbackDelayNetwork::new(48000, 0.0);
        assert!(fdn.update_coefficients(4.0, 0.0, 1.0, false));
        assert!(!fdn.update_coefficients(4.01, 0.001, 1.0005, false));
        assert!(fdn.update_coefficients(4.1, 0.0, 1.0, false));
        assert!(fdn.update_coefficients(4.1, 0.0, 1.0, true));
        assert!(fdn.feedback_gains().iter().all(|g| *g == FREEZE_GAIN_CEILING));
    }

    #[test]
    fn impulse_decays() {
        let mut fdn = FeedbackDelayNetwork::new(48000, 0.0);
        fdn.update_coefficients(0.5, 0.0, 1.0, false);
        let modulation = [0.0; LINES];
        let mut early_peak = 0.0f32;
        let mut late_peak = 0.0f32;
        for i in 0..48000 * 2 {
            let input = if i == 0 { [1.0, 1.0] } else { [0.0, 0.0] };
            let [l, r] = fdn.process(input, 1.0, &modulation);
            assert!(l.is_finite() && r.is_finite());
            if i < 24000 {
                early_peak = early_peak.max(l.abs()).max(r.abs());
            } else if i > 72000 {
                late_peak = late_peak.max(l.abs()).max(r.abs());
            }
        }
        assert!(early_peak > 0.0);
        assert!(late_peak < early_peak * 0.001);
    }

    #[test]
    fn capacity_covers_max_delay() {
        let max_modulation = 0.0016 * 48000.0;
        let fdn = FeedbackDelayNetwork::new(48000, max_modulation);
        let longest = BASE_DELAYS_MS[LINES - 1] * 0.001 * 48000.0 * MAX_SIZE + max_modulation;
        assert!(fdn.lines.iter().all(|l| l.max_delay() >= longest));
    }
}
