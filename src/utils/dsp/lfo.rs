//! Oscillators for modulation.

use std::sync::LazyLock;

// -------------------------------------------------------------------------------------------------

/// Precomputed single sine cycle, sampled at `N` points plus one guard point for interpolation.
/// `N` must be a pow2 value.
pub(crate) struct SineTable<const N: usize> {
    lut: Box<[f32]>,
}

impl<const N: usize> SineTable<N> {
    const _VERIFY_N: () = assert!(N.is_power_of_two(), "Sine table size must be a pow2 value");

    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let _ = Self::_VERIFY_N;
        let lut = (0..=N)
            .map(|i| (std::f32::consts::TAU * i as f32 / N as f32).sin())
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { lut }
    }

    /// Evaluate sin(2π·phase) for a normalized phase in [0.0, 1.0).
    #[inline]
    pub fn sample(&self, phase: f32) -> f32 {
        debug_assert!((0.0..1.0).contains(&phase), "Invalid phase: {phase}");
        let index_float = phase * N as f32;
        let index = (index_float as usize).min(N - 1);
        let fraction = index_float - index as f32;
        self.lut[index] + (self.lut[index + 1] - self.lut[index]) * fraction
    }
}

/// Static, shared sine lookup table for all LFOs.
static SINE_LUT: LazyLock<SineTable<4096>> = LazyLock::new(SineTable::new);

/// Evaluate sin(2π·phase) for a normalized phase in [0.0, 1.0) via the shared lookup table.
#[inline]
pub fn fast_sine(phase: f32) -> f32 {
    SINE_LUT.sample(phase)
}

/// Make sure the shared sine table exists before entering the audio thread.
pub fn init_tables() {
    LazyLock::force(&SINE_LUT);
}

// -------------------------------------------------------------------------------------------------

/// Table based sine LFO with a normalized phase, which can be used to modulate delay times.
///
/// The phase always stays in `[0.0, 1.0)`: it's wrapped once per step with a conditional
/// subtraction, so there's no trigonometry in the per-sample path.
#[derive(Debug, Default, Clone)]
pub struct Lfo {
    phase: f32,
    phase_inc: f32,
}

impl Lfo {
    pub fn new(sample_rate: u32, rate: f32) -> Self {
        let mut lfo = Self::default();
        lfo.set_rate(sample_rate, rate);
        lfo
    }

    /// Current normalized phase.
    #[inline(always)]
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Set a new rate in Hz with the given sampling rate.
    pub fn set_rate(&mut self, sample_rate: u32, rate: f32) {
        debug_assert!(sample_rate > 0, "Invalid sample rate");
        // keep increments below a full cycle so a single wrap is always enough
        self.phase_inc = (rate.abs() / sample_rate as f32).min(0.5);
    }

    /// Set or reset the LFO's normalized phase. Values outside [0, 1) are wrapped.
    pub fn set_phase(&mut self, phase: f32) {
        let phase = phase.rem_euclid(1.0);
        self.phase = if phase < 1.0 { phase } else { 0.0 };
    }

    /// Advances phase and returns the new value in range [-1, 1].
    #[inline]
    pub fn next(&mut self) -> f32 {
        let value = fast_sine(self.phase);
        self.phase += self.phase_inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        value
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sine_table_accuracy() {
        for i in 0..1000 {
            let phase = i as f32 / 1000.0;
            let expected = (std::f32::consts::TAU * phase).sin();
            assert!((fast_sine(phase) - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn phase_stays_normalized() {
        let mut lfo = Lfo::new(48000, 0.37);
        lfo.set_phase(0.99);
        for _ in 0..500_000 {
            let value = lfo.next();
            assert!((-1.0..=1.0).contains(&value));
            assert!((0.0..1.0).contains(&lfo.phase()));
        }
        lfo.set_phase(-0.25);
        assert!((lfo.phase() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn rate_matches_period() {
        let mut lfo = Lfo::new(1000, 1.0);
        let mut crossings = 0;
        let mut last = lfo.next();
        for _ in 0..10_000 {
            let value = lfo.next();
            if last < 0.0 && value >= 0.0 {
                crossings += 1;
            }
            last = value;
        }
        assert!((9..=11).contains(&crossings));
    }
}
