use std::fmt::Debug;

// -------------------------------------------------------------------------------------------------

/// Provides smooth transitions between a current and target f32 value.
/// Smoothing usually needs to be applied to avoid clicks in e.g. volume or other DSP parameter changes.
pub trait SmoothedValue: Debug {
    /// Access to the current, possibly ramped value.
    #[must_use]
    fn current(&self) -> f32;
    /// Access to the target value.
    #[must_use]
    fn target(&self) -> f32;

    /// Ramp, if needed, and get the current ramped value, else returns the target value.
    #[must_use]
    fn next(&mut self) -> f32 {
        if self.need_ramp() {
            self.ramp();
            self.current()
        } else {
            self.target()
        }
    }

    /// Test if ramping is necessary. When ramping is not necessary, parameter changes
    /// may be applied in blocks without calling `next` or `ramp`, which usually is faster.
    #[must_use]
    fn need_ramp(&self) -> bool;
    /// Move current to target value, when ramping is necessary, else does nothing.
    fn ramp(&mut self);

    /// Set current and target to the same value.
    fn init(&mut self, amount: f32);
    /// Set a new target value and ramp current, when current is different from the target.
    fn set_target(&mut self, target: f32);

    /// Re-arm the smoother at its current target: current jumps to the target, no ramp pending.
    fn reset(&mut self) {
        self.init(self.target());
    }

    /// Update sample rate of the smoothed value. Smoothed values are expected to be called
    /// once per audio frame and the ramping scales with the sample rate.
    fn set_sample_rate(&mut self, sample_rate: u32);
}

const UNINITIALIZED_SAMPLE_RATE: u32 = 0;

/// One-pole coefficient which reaches ~63% of a step after `time_ms`.
fn one_pole_coefficient(time_ms: f32, sample_rate: u32) -> f32 {
    let time_samples = time_ms * 0.001 * sample_rate as f32;
    if time_samples <= 1.0 {
        1.0
    } else {
        1.0 - (-1.0 / time_samples).exp()
    }
}

// -------------------------------------------------------------------------------------------------

/// Exponential smoothed value for smooth ramping, using a one-pole lowpass toward the target.
///
/// The value changes gradually towards the target with the configured time constant, and
/// snaps to the exact target once the remaining distance falls below an epsilon, so a
/// smoothed zero really becomes zero.
#[derive(Debug, Clone)]
pub struct ExponentialSmoothedValue {
    current: f32,
    target: f32,
    time_ms: f32,
    coefficient: f32,
    sample_rate: u32,
}

impl ExponentialSmoothedValue {
    pub const DEFAULT_TIME_MS: f32 = 20.0;

    const EPSILON: f32 = 1.0e-6;

    pub fn new(value: f32, sample_rate: u32) -> Self {
        Self::with_time(value, Self::DEFAULT_TIME_MS, sample_rate)
    }

    pub fn with_time(value: f32, time_ms: f32, sample_rate: u32) -> Self {
        assert!(time_ms >= 0.0, "Invalid smoothing time");
        let coefficient = if sample_rate > 0 {
            one_pole_coefficient(time_ms, sample_rate)
        } else {
            1.0
        };
        Self {
            current: value,
            target: value,
            time_ms,
            coefficient,
            sample_rate,
        }
    }

    #[inline(always)]
    pub fn time_ms(&self) -> f32 {
        self.time_ms
    }
}

impl SmoothedValue for ExponentialSmoothedValue {
    #[inline(always)]
    fn current(&self) -> f32 {
        self.current
    }

    #[inline(always)]
    fn target(&self) -> f32 {
        self.target
    }

    #[inline(always)]
    fn need_ramp(&self) -> bool {
        debug_assert!(
            self.sample_rate != UNINITIALIZED_SAMPLE_RATE,
            "Call 'set_sample_rate' for default constructed smoothed values before using them!"
        );
        self.current != self.target
    }

    fn ramp(&mut self) {
        let next = self.current + (self.target - self.current) * self.coefficient;
        // snap when close enough or when the step no longer moves the value in f32
        if next == self.current || (self.target - next).abs() <= Self::EPSILON {
            self.current = self.target;
        } else {
            self.current = next;
        }
    }

    fn init(&mut self, amount: f32) {
        self.target = amount;
        self.current = amount;
    }

    fn set_target(&mut self, target: f32) {
        self.target = target;
        if (self.target - self.current).abs() <= Self::EPSILON {
            self.current = self.target;
        }
    }

    fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
        self.coefficient = one_pole_coefficient(self.time_ms, sample_rate);
    }
}

// -------------------------------------------------------------------------------------------------

/// Linear smoothed value for ramping linearly towards the target over a fixed duration.
#[derive(Debug, Clone)]
pub struct LinearSmoothedValue {
    current: f32,
    target: f32,
    duration_ms: f32,
    step: f32,
    num_pending_steps: u32,
    sample_rate: u32,
}

impl LinearSmoothedValue {
    pub const DEFAULT_DURATION_MS: f32 = 50.0;

    pub fn new(value: f32, sample_rate: u32) -> Self {
        Self::with_duration(value, Self::DEFAULT_DURATION_MS, sample_rate)
    }

    pub fn with_duration(value: f32, duration_ms: f32, sample_rate: u32) -> Self {
        assert!(duration_ms >= 0.0, "Invalid duration");
        Self {
            current: value,
            target: value,
            duration_ms,
            step: 0.0,
            num_pending_steps: 0,
            sample_rate,
        }
    }

    #[inline(always)]
    pub fn duration_ms(&self) -> f32 {
        self.duration_ms
    }

    /// Set a new ramp duration. Applies to the next `set_target` call, a running ramp keeps
    /// its current step size.
    pub fn set_duration_ms(&mut self, duration_ms: f32) {
        assert!(duration_ms >= 0.0, "Invalid duration");
        self.duration_ms = duration_ms;
    }

    fn duration_in_samples(&self) -> u32 {
        (self.duration_ms * 0.001 * self.sample_rate as f32).round() as u32
    }
}

impl SmoothedValue for LinearSmoothedValue {
    #[inline(always)]
    fn current(&self) -> f32 {
        self.current
    }

    #[inline(always)]
    fn target(&self) -> f32 {
        self.target
    }

    #[inline(always)]
    fn need_ramp(&self) -> bool {
        debug_assert!(
            self.sample_rate != UNINITIALIZED_SAMPLE_RATE,
            "Call 'set_sample_rate' for default constructed smoothed values before using them!"
        );
        self.num_pending_steps > 0
    }

    fn ramp(&mut self) {
        if self.num_pending_steps > 0 {
            self.current += self.step;
            self.num_pending_steps -= 1;
            if self.num_pending_steps == 0 {
                self.current = self.target;
            }
        }
    }

    fn init(&mut self, amount: f32) {
        self.target = amount;
        self.current = amount;
        self.num_pending_steps = 0;
    }

    fn set_target(&mut self, target: f32) {
        if target == self.target {
            return;
        }
        self.target = target;
        let steps = self.duration_in_samples();
        if steps == 0 || self.current == self.target {
            self.current = self.target;
            self.num_pending_steps = 0;
        } else {
            self.num_pending_steps = steps;
            self.step = (self.target - self.current) / steps as f32;
        }
    }

    fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exp_smoothed_value() {
        // Test new
        let val = ExponentialSmoothedValue::new(0.0, 48000);
        assert_eq!(val.current(), 0.0);
        assert_eq!(val.target(), 0.0);
        assert_eq!(val.time_ms(), ExponentialSmoothedValue::DEFAULT_TIME_MS);

        // Test set_target no ramp
        let mut val = ExponentialSmoothedValue::new(0.0, 48000);
        val.set_target(0.0);
        assert!(!val.need_ramp());

        // Test multi ramps
        let mut val = ExponentialSmoothedValue::new(0.0, 48000);
        val.set_target(1.0);
        assert!(val.need_ramp());
        for _ in 0..10 {
            val.ramp();
        }
        assert!(val.current() > 0.0);
        assert!(val.current() < val.target());

        // Test snapping to the exact target
        for _ in 0..48000 {
            let _ = val.next();
        }
        assert_eq!(val.current(), 1.0);
        assert!(!val.need_ramp());

        // Test ramping back to exactly zero
        val.set_target(0.0);
        for _ in 0..48000 {
            let _ = val.next();
        }
        assert_eq!(val.current(), 0.0);

        // Test faster times approach faster
        let mut fast = ExponentialSmoothedValue::with_time(0.0, 1.0, 48000);
        let mut slow = ExponentialSmoothedValue::with_time(0.0, 100.0, 48000);
        fast.set_target(1.0);
        slow.set_target(1.0);
        assert!(fast.next() > slow.next());
    }

    #[test]
    fn test_exp_smoothed_value_settles() {
        for (target, time_ms) in [(1.0, 20.0), (1.0, 200.0), (0.99999, 50.0), (-8.0, 40.0)] {
            let mut val = ExponentialSmoothedValue::with_time(0.0, time_ms, 48000);
            val.set_target(target);
            let mut steps = 0;
            while val.need_ramp() {
                let _ = val.next();
                steps += 1;
                assert!(steps < 48000 * 10, "{target} never settled: {}", val.current());
            }
            assert_eq!(val.current(), target);
        }
    }

    #[test]
    fn test_linear_smoothed_value() {
        // Test init
        let mut val = LinearSmoothedValue::with_duration(0.0, 1.0, 48000);
        val.init(1.0);
        assert_eq!(val.current(), 1.0);
        assert!(!val.need_ramp());

        // Test reach target in exactly duration samples
        let mut val = LinearSmoothedValue::with_duration(0.0, 1.0, 48000);
        val.set_target(1.0);
        assert!(val.need_ramp());
        for _ in 0..47 {
            val.ramp();
        }
        assert!(val.need_ramp());
        assert!(val.current() < 1.0);
        val.ramp();
        assert!(!val.need_ramp());
        assert_eq!(val.current(), 1.0);
    }

    #[test]
    fn test_reset_rearms_to_target() {
        let mut val = LinearSmoothedValue::with_duration(0.0, 10.0, 48000);
        val.set_target(0.5);
        val.ramp();
        val.reset();
        assert_eq!(val.current(), 0.5);
        assert!(!val.need_ramp());

        let mut val = ExponentialSmoothedValue::new(0.0, 48000);
        val.set_target(0.25);
        val.ramp();
        val.reset();
        assert_eq!(val.current(), 0.25);
    }
}
