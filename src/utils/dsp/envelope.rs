//! Envelope follower for detecting signal levels.

use super::saturation::flush_denormal;

// -------------------------------------------------------------------------------------------------

/// An envelope follower that tracks the amplitude of a signal using attack and release times.
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    current_value: f32,
    attack_time: f32,
    release_time: f32,
    attack_coeff: f32,
    release_coeff: f32,
    sample_rate: u32,
}

impl EnvelopeFollower {
    /// Create a new envelope follower with the given sample rate and time constants in seconds.
    pub fn new(sample_rate: u32, attack_time: f32, release_time: f32) -> Self {
        let mut follower = Self {
            current_value: 0.0,
            attack_time,
            release_time,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            sample_rate,
        };
        follower.set_attack_time(attack_time);
        follower.set_release_time(release_time);
        follower
    }

    /// Set a new attack time constant in seconds.
    pub fn set_attack_time(&mut self, time: f32) {
        self.attack_time = time;
        self.attack_coeff = Self::coefficient(time, self.sample_rate);
    }

    /// Set a new release time constant in seconds.
    pub fn set_release_time(&mut self, time: f32) {
        self.release_time = time;
        self.release_coeff = Self::coefficient(time, self.sample_rate);
    }

    /// Update the sample rate, keeping the time constants.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
        self.set_attack_time(self.attack_time);
        self.set_release_time(self.release_time);
    }

    /// Current envelope value.
    #[inline(always)]
    pub fn value(&self) -> f32 {
        self.current_value
    }

    /// Process a single, already rectified input value and return the current envelope value.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let coeff = if input > self.current_value {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.current_value = flush_denormal(input + coeff * (self.current_value - input));
        self.current_value
    }

    /// Reset the envelope follower to the given value.
    pub fn reset(&mut self, value: f32) {
        self.current_value = value;
    }

    fn coefficient(time: f32, sample_rate: u32) -> f32 {
        if time > 0.0 && sample_rate > 0 {
            (-1.0 / (time * sample_rate as f32)).exp()
        } else {
            0.0
        }
    }
}

impl Default for EnvelopeFollower {
    fn default() -> Self {
        Self::new(44100, 0.01, 0.1)
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attack_is_faster_than_release() {
        let mut follower = EnvelopeFollower::new(48000, 0.005, 0.25);
        for _ in 0..480 {
            follower.process(1.0);
        }
        // 10 ms at a 5 ms attack: well above 80 %
        assert!(follower.value() > 0.8);
        for _ in 0..480 {
            follower.process(0.0);
        }
        // 10 ms at a 250 ms release: barely moved
        assert!(follower.value() > 0.75);
    }

    #[test]
    fn decays_to_exact_zero() {
        let mut follower = EnvelopeFollower::new(48000, 0.01, 0.3);
        follower.reset(1.0);
        for _ in 0..48000 * 20 {
            follower.process(0.0);
        }
        assert_eq!(follower.value(), 0.0);
    }
}
