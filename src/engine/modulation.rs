//! Per line delay modulation and per sample parameter ramps.

use rand::{rngs::SmallRng, Rng};

use super::{controls::ControlParameters, matrix::LINES};
use crate::utils::{
    dsp::lfo::Lfo,
    smoothing::{ExponentialSmoothedValue, SmoothedValue},
};

// -------------------------------------------------------------------------------------------------

/// Bank of slow sine LFOs, one per delay line, perturbing the line read offsets.
///
/// Every line gets its own random rate and start phase, so no two lines move in sync.
#[derive(Debug, Clone)]
pub struct ModulationBank {
    lfos: [Lfo; LINES],
    base_rates: [f32; LINES],
    depth: ExponentialSmoothedValue,
    rate_scale: f32,
    sample_rate: u32,
}

impl ModulationBank {
    /// Max modulation depth in milliseconds at full drift.
    pub const MAX_DEPTH_MS: f32 = 1.6;
    /// Range of the unscaled per line LFO rates in Hz.
    pub const RATE_RANGE: (f32, f32) = (0.07, 0.37);

    const DEPTH_SMOOTHING_MS: f32 = 250.0;

    pub fn new(sample_rate: u32, rng: &mut SmallRng) -> Self {
        let mut bank = Self {
            lfos: std::array::from_fn(|_| Lfo::default()),
            base_rates: [0.0; LINES],
            depth: ExponentialSmoothedValue::with_time(
                0.0,
                Self::DEPTH_SMOOTHING_MS,
                sample_rate,
            ),
            rate_scale: 1.0,
            sample_rate,
        };
        bank.randomize(rng);
        bank
    }

    /// Max modulation depth in samples.
    pub fn max_depth_samples(sample_rate: u32) -> f32 {
        Self::MAX_DEPTH_MS * 0.001 * sample_rate as f32
    }

    /// Pick new random rates and start phases for all LFOs.
    pub fn randomize(&mut self, rng: &mut SmallRng) {
        let (min_rate, max_rate) = Self::RATE_RANGE;
        for (lfo, base_rate) in self.lfos.iter_mut().zip(self.base_rates.iter_mut()) {
            *base_rate = rng.random_range(min_rate..max_rate);
            lfo.set_rate(self.sample_rate, *base_rate * self.rate_scale);
            lfo.set_phase(rng.random::<f32>());
        }
    }

    /// Update rates and the target depth from drift. Called at block rate.
    pub fn set_drift(&mut self, drift: f32, frozen: bool) {
        let rate_scale = 0.5 + drift;
        if rate_scale != self.rate_scale {
            self.rate_scale = rate_scale;
            for (lfo, base_rate) in self.lfos.iter_mut().zip(self.base_rates.iter()) {
                lfo.set_rate(self.sample_rate, base_rate * rate_scale);
            }
        }
        let depth = if frozen {
            0.0
        } else {
            drift * Self::max_depth_samples(self.sample_rate)
        };
        self.depth.set_target(depth);
    }

    /// Jump to the current target depth.
    pub fn snap(&mut self) {
        self.depth.reset();
    }

    /// Current, smoothed depth in samples.
    pub fn depth(&self) -> f32 {
        self.depth.current()
    }

    /// Advance all LFOs and write per line read offsets in samples.
    #[inline]
    pub fn next(&mut self, offsets: &mut [f32; LINES]) {
        let depth = self.depth.next();
        for (offset, lfo) in offsets.iter_mut().zip(self.lfos.iter_mut()) {
            *offset = lfo.next() * depth;
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// One frame of smoothed control values.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SmoothedFrame {
    pub size: f32,
    pub mix: f32,
    pub proximity: f32,
    pub ghost: f32,
    pub duck: f32,
    pub freeze_gate: f32,
}

/// Per sample ramps for all continuous controls which directly scale audio.
#[derive(Debug, Clone)]
pub struct SmoothedControls {
    size: ExponentialSmoothedValue,
    mix: ExponentialSmoothedValue,
    proximity: ExponentialSmoothedValue,
    ghost: ExponentialSmoothedValue,
    duck: ExponentialSmoothedValue,
    freeze_gate: ExponentialSmoothedValue,
}

impl SmoothedControls {
    pub fn new(sample_rate: u32) -> Self {
        let defaults = ControlParameters::default();
        Self {
            size: ExponentialSmoothedValue::with_time(defaults.size, 80.0, sample_rate),
            mix: ExponentialSmoothedValue::new(defaults.mix, sample_rate),
            proximity: ExponentialSmoothedValue::with_time(
                defaults.proximity(),
                50.0,
                sample_rate,
            ),
            ghost: ExponentialSmoothedValue::with_time(defaults.ghost, 50.0, sample_rate),
            duck: ExponentialSmoothedValue::new(defaults.duck, sample_rate),
            freeze_gate: ExponentialSmoothedValue::with_time(1.0, 30.0, sample_rate),
        }
    }

    /// Set new targets from the clamped block controls.
    pub fn set_targets(&mut self, params: &ControlParameters) {
        self.size.set_target(params.size);
        self.mix.set_target(params.mix);
        self.proximity.set_target(params.proximity());
        self.ghost.set_target(params.ghost);
        self.duck.set_target(params.duck);
        self.freeze_gate
            .set_target(if params.freeze { 0.0 } else { 1.0 });
    }

    /// Jump all ramps to their targets.
    pub fn snap(&mut self) {
        self.size.reset();
        self.mix.reset();
        self.proximity.reset();
        self.ghost.reset();
        self.duck.reset();
        self.freeze_gate.reset();
    }

    /// Target size, as used for block rate coefficient updates.
    pub fn target_size(&self) -> f32 {
        self.size.target()
    }

    #[inline]
    pub fn next(&mut self) -> SmoothedFrame {
        SmoothedFrame {
            size: self.size.next(),
            mix: self.mix.next(),
            proximity: self.proximity.next(),
            ghost: self.ghost.next(),
            duck: self.duck.next(),
            freeze_gate: self.freeze_gate.next(),
        }
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn depth_follows_drift_and_freeze() {
        let mut rng = SmallRng::seed_from_u64(1);
        let mut bank = ModulationBank::new(48000, &mut rng);
        bank.set_drift(1.0, false);
        bank.snap();
        assert!((bank.depth() - ModulationBank::max_depth_samples(48000)).abs() < 1e-3);

        let mut offsets = [0.0; LINES];
        let max = ModulationBank::max_depth_samples(48000);
        for _ in 0..48000 {
            bank.next(&mut offsets);
            assert!(offsets.iter().all(|o| o.abs() <= max + 1e-3));
        }

        bank.set_drift(1.0, true);
        for _ in 0..48000 * 5 {
            bank.next(&mut offsets);
        }
        assert_eq!(bank.depth(), 0.0);
        assert!(offsets.iter().all(|o| *o == 0.0));
    }

    #[test]
    fn lines_are_not_in_sync() {
        let mut rng = SmallRng::seed_from_u64(7);
        let mut bank = ModulationBank::new(48000, &mut rng);
        bank.set_drift(0.5, false);
        bank.snap();
        let mut offsets = [0.0; LINES];
        bank.next(&mut offsets);
        let first = offsets[0];
        assert!(offsets.iter().skip(1).any(|o| (o - first).abs() > 1e-3));
    }

    #[test]
    fn smoothed_controls_snap() {
        let mut controls = SmoothedControls::new(48000);
        let params = ControlParameters {
            mix: 1.0,
            freeze: true,
            ..Default::default()
        };
        controls.set_targets(&params);
        let frame = controls.next();
        assert!(frame.mix < 1.0);
        controls.snap();
        let frame = controls.next();
        assert_eq!(frame.mix, 1.0);
        assert_eq!(frame.freeze_gate, 0.0);
    }
}
