//! Input/wet level meters and the wet ducker.

use crate::utils::dsp::envelope::EnvelopeFollower;

// -------------------------------------------------------------------------------------------------

/// Envelope followers for the wet ducker and the level meters.
///
/// The ducker follows the dry input's peak with a fast attack and a moderate release, so the
/// tail opens up again shortly after the player stops. Meters use slower ballistics.
#[derive(Debug, Clone)]
pub struct Dynamics {
    duck_follower: EnvelopeFollower,
    input_meter: EnvelopeFollower,
    wet_meter: EnvelopeFollower,
}

impl Dynamics {
    const DUCK_ATTACK_SECONDS: f32 = 0.005;
    const DUCK_RELEASE_SECONDS: f32 = 0.25;
    const METER_ATTACK_SECONDS: f32 = 0.01;
    const METER_RELEASE_SECONDS: f32 = 0.3;

    pub fn new(sample_rate: u32) -> Self {
        let meter = || {
            EnvelopeFollower::new(
                sample_rate,
                Self::METER_ATTACK_SECONDS,
                Self::METER_RELEASE_SECONDS,
            )
        };
        Self {
            duck_follower: EnvelopeFollower::new(
                sample_rate,
                Self::DUCK_ATTACK_SECONDS,
                Self::DUCK_RELEASE_SECONDS,
            ),
            input_meter: meter(),
            wet_meter: meter(),
        }
    }

    /// Feed a dry input frame. Returns the frame's peak level.
    #[inline]
    pub fn process_input(&mut self, left: f32, right: f32) -> f32 {
        let peak = left.abs().max(right.abs());
        self.duck_follower.process(peak);
        self.input_meter.process(peak);
        peak
    }

    /// Gain for the wet signal: attenuates by `duck` times the input envelope, but never below
    /// `min_wet_factor`.
    #[inline]
    pub fn duck_gain(&self, duck: f32, min_wet_factor: f32) -> f32 {
        (1.0 - duck * self.duck_follower.value().min(1.0)).max(min_wet_factor)
    }

    /// Feed a wet output frame into the wet meter.
    #[inline]
    pub fn process_wet(&mut self, left: f32, right: f32) {
        self.wet_meter.process(left.abs().max(right.abs()));
    }

    pub fn input_level(&self) -> f32 {
        self.input_meter.value()
    }

    pub fn wet_level(&self) -> f32 {
        self.wet_meter.value()
    }

    pub fn reset(&mut self) {
        self.duck_follower.reset(0.0);
        self.input_meter.reset(0.0);
        self.wet_meter.reset(0.0);
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ducking() {
        let mut dynamics = Dynamics::new(48000);
        assert_eq!(dynamics.duck_gain(1.0, 0.1), 1.0);
        for _ in 0..4800 {
            dynamics.process_input(1.0, -1.0);
        }
        assert!((dynamics.duck_gain(1.0, 0.1) - 0.1).abs() < 1e-3);
        assert!((dynamics.duck_gain(0.5, 0.1) - 0.5).abs() < 1e-2);
        assert_eq!(dynamics.duck_gain(0.0, 0.1), 1.0);

        // releases after the input stops
        for _ in 0..48000 * 2 {
            dynamics.process_input(0.0, 0.0);
        }
        assert!(dynamics.duck_gain(1.0, 0.1) > 0.99);
    }

    #[test]
    fn meters() {
        let mut dynamics = Dynamics::new(48000);
        for _ in 0..48000 {
            dynamics.process_input(0.5, 0.25);
            dynamics.process_wet(0.0, 0.1);
        }
        assert!((dynamics.input_level() - 0.5).abs() < 1e-3);
        assert!((dynamics.wet_level() - 0.1).abs() < 1e-3);
        dynamics.reset();
        assert_eq!(dynamics.input_level(), 0.0);
    }
}
