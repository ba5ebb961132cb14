//! Physical tape degradation models driven by disintegration entropy.

use rand::{rngs::SmallRng, Rng};

use crate::utils::{
    dsp::{
        filters::onepole::{OnePoleHighpass, OnePoleLowpass},
        saturation::saturate,
    },
    smoothing::{ExponentialSmoothedValue, SmoothedValue},
};

// -------------------------------------------------------------------------------------------------

/// High and low-pass cutoffs of the "ascension" filter pair for the given entropy and focus.
///
/// With rising entropy the high-pass climbs from 20 Hz towards 900 Hz while the low-pass falls
/// from 18 kHz towards 1.4 kHz, following `entropy^1.5`. A negative focus pushes the high-pass
/// further (thinning), a positive focus pushes the low-pass further (smearing).
pub fn ascension_cutoffs(entropy: f32, focus: f32) -> (f32, f32) {
    let amount = entropy.clamp(0.0, 1.0).powf(1.5);
    let thinning = (-focus).clamp(0.0, 1.0);
    let smearing = focus.clamp(0.0, 1.0);
    let highpass_amount = (amount * (1.0 + 0.6 * thinning - 0.3 * smearing)).clamp(0.0, 1.0);
    let lowpass_amount = (amount * (1.0 + 0.6 * smearing - 0.3 * thinning)).clamp(0.0, 1.0);
    let highpass = 20.0 * (900.0f32 / 20.0).powf(highpass_amount);
    let lowpass = 18000.0 * (1400.0f32 / 18000.0).powf(lowpass_amount);
    (highpass, lowpass)
}

// -------------------------------------------------------------------------------------------------

/// Stereo tape degradation: ascension filtering, saturation, oxide dropouts, motor drag and
/// azimuth drift.
///
/// Filter coefficients are updated at block rate via [`update`](Self::update). The stochastic
/// models advance on a fixed 40 ms tick, never at audio rate.
#[derive(Debug, Clone)]
pub struct TapeDegradation {
    highpasses: [OnePoleHighpass; 2],
    lowpasses: [OnePoleLowpass; 2],
    entropy: [f32; 2],
    applied_cutoffs: Option<([f32; 2], f32)>,
    dropout_gain: ExponentialSmoothedValue,
    dropout_remaining: u32,
    drag: f32,
    drag_smoothed: ExponentialSmoothedValue,
    azimuth: f32,
    tick_counter: u32,
    tick_interval: u32,
    sample_rate: u32,
}

impl TapeDegradation {
    const TICK_SECONDS: f32 = 0.04;

    const DROPOUT_PROBABILITY: f32 = 0.4;
    const DROPOUT_DEPTH: (f32, f32) = (0.3, 0.9);
    const DROPOUT_SECONDS: (f32, f32) = (0.02, 0.12);
    const DROPOUT_SMOOTHING_MS: f32 = 5.0;

    const DRAG_STEP: f32 = 0.004;
    const DRAG_BIAS: f32 = 0.001;
    const DRAG_MIN: f32 = -0.03;
    const DRAG_MAX: f32 = 0.003;
    const DRAG_SMOOTHING_MS: f32 = 40.0;

    const AZIMUTH_STEP: f32 = 0.01;
    const AZIMUTH_MAX: f32 = 0.08;

    const SATURATION_AMOUNT: f32 = 5.0;

    pub fn new(sample_rate: u32) -> Self {
        let (highpass, lowpass) = ascension_cutoffs(0.0, 0.0);
        Self {
            highpasses: std::array::from_fn(|_| OnePoleHighpass::new(sample_rate, highpass)),
            lowpasses: std::array::from_fn(|_| OnePoleLowpass::new(sample_rate, lowpass)),
            entropy: [0.0; 2],
            applied_cutoffs: None,
            dropout_gain: ExponentialSmoothedValue::with_time(
                1.0,
                Self::DROPOUT_SMOOTHING_MS,
                sample_rate,
            ),
            dropout_remaining: 0,
            drag: 0.0,
            drag_smoothed: ExponentialSmoothedValue::with_time(
                0.0,
                Self::DRAG_SMOOTHING_MS,
                sample_rate,
            ),
            azimuth: 0.0,
            tick_counter: 0,
            tick_interval: ((Self::TICK_SECONDS * sample_rate as f32) as u32).max(1),
            sample_rate,
        }
    }

    /// Clear filter states and all stochastic states.
    pub fn reset(&mut self) {
        for highpass in &mut self.highpasses {
            highpass.reset();
        }
        for lowpass in &mut self.lowpasses {
            lowpass.reset();
        }
        self.entropy = [0.0; 2];
        self.applied_cutoffs = None;
        self.dropout_gain.init(1.0);
        self.dropout_remaining = 0;
        self.drag = 0.0;
        self.drag_smoothed.init(0.0);
        self.azimuth = 0.0;
        self.tick_counter = 0;
    }

    /// Current per channel entropy: left is the loop's entropy, right is offset by azimuth
    /// drift.
    pub fn channel_entropy(&self) -> [f32; 2] {
        self.entropy
    }

    /// Playback speed deviation caused by motor drag.
    #[inline(always)]
    pub fn speed_offset(&self) -> f32 {
        self.drag_smoothed.current()
    }

    /// Update filter coefficients for the given entropy and focus. Called at block rate.
    ///
    /// Coefficients only get recalculated when the channel entropies or the focus changed.
    /// Returns true when they did.
    pub fn update(&mut self, entropy: f32, focus: f32) -> bool {
        let entropy = entropy.clamp(0.0, 1.0);
        self.entropy = [entropy, (entropy + self.azimuth).clamp(0.0, 1.0)];
        if self.applied_cutoffs == Some((self.entropy, focus)) {
            return false;
        }
        self.applied_cutoffs = Some((self.entropy, focus));
        for channel in 0..2 {
            let (highpass, lowpass) = ascension_cutoffs(self.entropy[channel], focus);
            self.highpasses[channel].set_cutoff(self.sample_rate, highpass);
            self.lowpasses[channel].set_cutoff(self.sample_rate, lowpass);
        }
        true
    }

    /// Degrade a single frame.
    #[inline]
    pub fn process(&mut self, frame: [f32; 2], rng: &mut SmallRng) -> [f32; 2] {
        self.tick_counter += 1;
        if self.tick_counter >= self.tick_interval {
            self.tick_counter = 0;
            self.tick(rng);
        }
        if self.dropout_remaining > 0 {
            self.dropout_remaining -= 1;
            if self.dropout_remaining == 0 {
                self.dropout_gain.set_target(1.0);
            }
        }
        let _ = self.drag_smoothed.next();
        let gain = self.dropout_gain.next();

        let mut output = [0.0; 2];
        for channel in 0..2 {
            let k = 1.0 + Self::SATURATION_AMOUNT * self.entropy[channel];
            let saturated = saturate(frame[channel], k);
            let thinned = self.highpasses[channel].process(saturated);
            output[channel] = self.lowpasses[channel].process(thinned) * gain;
        }
        output
    }

    fn tick(&mut self, rng: &mut SmallRng) {
        let entropy = self.entropy[0];

        // oxide dropouts
        if self.dropout_remaining == 0
            && rng.random::<f32>() < Self::DROPOUT_PROBABILITY * entropy
        {
            let (min_depth, max_depth) = Self::DROPOUT_DEPTH;
            let (min_seconds, max_seconds) = Self::DROPOUT_SECONDS;
            let depth = rng.random_range(min_depth..max_depth) * entropy;
            let duration = rng.random_range(min_seconds..max_seconds) * self.sample_rate as f32;
            self.dropout_gain.set_target(1.0 - depth);
            self.dropout_remaining = (duration as u32).max(1);
        }

        // motor drag: biased random walk towards slower playback
        let step = rng.random_range(-1.0..1.0) * Self::DRAG_STEP - Self::DRAG_BIAS;
        self.drag = (self.drag + step * entropy)
            .clamp(Self::DRAG_MIN * entropy, Self::DRAG_MAX * entropy);
        self.drag_smoothed.set_target(self.drag);

        // azimuth drift between left and right heads
        let step = rng.random_range(-1.0..1.0) * Self::AZIMUTH_STEP;
        let limit = Self::AZIMUTH_MAX * entropy;
        self.azimuth = (self.azimuth + step * entropy).clamp(-limit, limit);
    }
}

// -------------------------------------------------------------------------------------------------
