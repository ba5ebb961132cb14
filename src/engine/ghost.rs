//! Ghost engine: granular "memory" voices reading from a long history of the reverb input.

use std::sync::LazyLock;

use rand::{rngs::SmallRng, Rng};

use crate::utils::{dsp::delay::DelayLine, lerp, panning_factors};

// -------------------------------------------------------------------------------------------------

/// Precomputed Hann grain window. `N` must be a pow2 value.
pub(crate) struct GrainWindow<const N: usize> {
    lut: Box<[f32]>,
}

impl<const N: usize> GrainWindow<N> {
    const _VERIFY_N: () = assert!(N.is_power_of_two(), "Grain window size must be a pow2 value");

    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let _ = Self::_VERIFY_N;
        let lut = (0..N)
            .map(|i| {
                let phase = i as f32 / (N - 1) as f32; // [0.0, 1.0]
                0.5 * (1.0 - (std::f32::consts::TAU * phase).cos())
            })
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self { lut }
    }

    /// Evaluate the window at normalized phase [0.0, 1.0] with linear interpolation.
    #[inline]
    pub fn sample(&self, phase: f32) -> f32 {
        let index_float = phase.clamp(0.0, 1.0) * (N - 1) as f32;
        let index = index_float as usize;
        if index >= N - 1 {
            return self.lut[N - 1];
        }
        let fraction = index_float - index as f32;
        self.lut[index] * (1.0 - fraction) + self.lut[index + 1] * fraction
    }
}

/// Static, shared lookup table for the grain envelope.
static GRAIN_WINDOW_LUT: LazyLock<GrainWindow<2048>> = LazyLock::new(GrainWindow::new);

/// Number of spawn positions captured on freeze entry.
const SNAPSHOT_COUNT: usize = 8;

// -------------------------------------------------------------------------------------------------

/// A single granular voice.
#[derive(Debug, Default, Clone, Copy)]
struct Grain {
    /// Is this grain currently playing?
    active: bool,
    /// Fractional read position in the history buffer.
    position: f32,
    /// Signed playback speed. Negative values play in reverse.
    speed: f32,
    /// Window phase in range [0, 1]. The grain ends when it reaches 1.
    window_phase: f32,
    /// Amount to advance the window phase each sample: 1 / duration in samples.
    window_increment: f32,
    /// Grain amplitude, including the reverse attenuation.
    gain: f32,
    /// Constant power panning gains.
    pan: (f32, f32),
}

// -------------------------------------------------------------------------------------------------

/// Granular memory engine: a fixed pool of grains, spawned by per sample Bernoulli trials, which
/// replay windowed snippets of the past input at shifted pitches and directions.
#[derive(Debug, Clone)]
pub struct GhostEngine<const POOL_SIZE: usize> {
    history: DelayLine,
    grains: [Grain; POOL_SIZE],
    snapshots: [f32; SNAPSHOT_COUNT],
    frozen: bool,
    lookback_max: f32,
    sample_rate: u32,
}

impl<const POOL_SIZE: usize> GhostEngine<POOL_SIZE> {
    /// Average number of spawn attempts per second at full ghost amount.
    pub const SPAWN_RATE_HZ: f32 = 24.0;
    /// Output gain at full ghost amount.
    pub const GAIN: f32 = 0.5;

    const MIN_DURATION_SECONDS: f32 = 0.08;
    const MAX_DURATION_SECONDS: f32 = 0.4;
    const MIN_LOOKBACK_SECONDS: f32 = 0.04;
    const BODY_LOOKBACK_SECONDS: f32 = 0.35;
    const AIR_LOOKBACK_SECONDS: f32 = 3.5;
    const MAX_SPEED: f32 = 2.0;

    const SHIMMER_PROBABILITY: f32 = 0.12;
    const FROZEN_SHIMMER_PROBABILITY: f32 = 0.3;
    const OCTAVE_DOWN_PROBABILITY: f32 = 0.04;
    const DETUNE_CENTS: f32 = 8.0;
    const REVERSE_THRESHOLD: f32 = 0.3;
    const REVERSE_GAIN: f32 = 0.7;
    const MAX_PAN: f32 = 0.8;
    const GUARD_SAMPLES: f32 = 4.0;

    pub fn new(sample_rate: u32) -> Self {
        // Room for the longest lookback plus the distance a grain may travel away from the
        // write cursor during its lifetime.
        let history_seconds = Self::AIR_LOOKBACK_SECONDS
            + (1.0 + Self::MAX_SPEED) * Self::MAX_DURATION_SECONDS
            + 0.1;
        let capacity = (history_seconds * sample_rate as f32).ceil() as usize;
        Self {
            history: DelayLine::new(capacity),
            grains: [Grain::default(); POOL_SIZE],
            snapshots: [0.0; SNAPSHOT_COUNT],
            frozen: false,
            lookback_max: Self::BODY_LOOKBACK_SECONDS * sample_rate as f32,
            sample_rate,
        }
    }

    /// Make sure the shared window table exists before entering the audio thread.
    pub fn init_tables() {
        LazyLock::force(&GRAIN_WINDOW_LUT);
    }

    /// Number of currently playing grains.
    pub fn active_grains(&self) -> usize {
        self.grains.iter().filter(|g| g.active).count()
    }

    /// Map the memory axis (-1 = recent body, +1 = distant air) to the max lookback.
    /// Called at block rate.
    pub fn set_window(&mut self, puck_y: f32) {
        let t = (puck_y.clamp(-1.0, 1.0) + 1.0) * 0.5;
        let seconds = lerp(Self::BODY_LOOKBACK_SECONDS, Self::AIR_LOOKBACK_SECONDS, t);
        self.lookback_max = seconds * self.sample_rate as f32;
    }

    /// Enter or leave freeze. On entry history writing stops and a fixed set of spawn
    /// positions gets captured. Called at block rate.
    pub fn set_frozen(&mut self, frozen: bool, rng: &mut SmallRng) {
        if frozen && !self.frozen {
            let min_lookback = Self::MIN_LOOKBACK_SECONDS * self.sample_rate as f32;
            let max_lookback = self.lookback_max.max(min_lookback + 1.0);
            for snapshot in &mut self.snapshots {
                *snapshot = rng.random_range(min_lookback..max_lookback);
            }
        }
        self.frozen = frozen;
    }

    /// Release all grains and zero the history.
    pub fn reset(&mut self) {
        self.history.flush();
        self.release_all();
        self.frozen = false;
    }

    fn release_all(&mut self) {
        for grain in &mut self.grains {
            grain.active = false;
        }
    }

    /// Record a mono input sample and render all grains. `amount` is the smoothed ghost
    /// control in range [0, 1].
    #[inline]
    pub fn process(&mut self, input: f32, amount: f32, rng: &mut SmallRng) -> [f32; 2] {
        if !self.frozen {
            self.history.write(input);
        }
        if amount <= 0.0 {
            self.release_all();
            return [0.0, 0.0];
        }

        let probability = amount * Self::SPAWN_RATE_HZ / self.sample_rate as f32;
        if rng.random::<f32>() < probability {
            if let Some(index) = self.grains.iter().position(|g| !g.active) {
                let grain = self.spawn(amount, rng);
                self.grains[index] = grain;
            }
        }

        let window = &*GRAIN_WINDOW_LUT;
        let mut output = [0.0f32; 2];
        for grain in self.grains.iter_mut().filter(|g| g.active) {
            let envelope = window.sample(grain.window_phase);
            let sample = self.history.read_at(grain.position) * envelope * grain.gain;
            output[0] += sample * grain.pan.0;
            output[1] += sample * grain.pan.1;

            grain.position = self.history.wrap_position(grain.position + grain.speed);
            grain.window_phase += grain.window_increment;
            if grain.window_phase >= 1.0 {
                grain.active = false;
            }
        }

        let gain = amount * Self::GAIN;
        [output[0] * gain, output[1] * gain]
    }

    fn spawn(&self, amount: f32, rng: &mut SmallRng) -> Grain {
        let sample_rate = self.sample_rate as f32;
        let duration = rng.random_range(Self::MIN_DURATION_SECONDS..=Self::MAX_DURATION_SECONDS)
            * sample_rate;

        let shimmer_probability = if self.frozen {
            Self::FROZEN_SHIMMER_PROBABILITY
        } else {
            Self::SHIMMER_PROBABILITY
        };
        let choice = rng.random::<f32>();
        let mut speed = if choice < shimmer_probability {
            2.0
        } else if choice < shimmer_probability + Self::OCTAVE_DOWN_PROBABILITY {
            0.5
        } else {
            let cents = rng.random_range(-Self::DETUNE_CENTS..=Self::DETUNE_CENTS);
            (cents / 1200.0).exp2()
        };
        let mut gain = 1.0;
        if amount > Self::REVERSE_THRESHOLD && rng.random_bool((0.5 * amount * amount) as f64) {
            speed = -speed;
            gain = Self::REVERSE_GAIN;
        }

        // distance from the write cursor must stay within the history for the whole grain
        let cursor_speed = if self.frozen { 0.0 } else { 1.0 };
        let travel = speed.abs() * duration;
        let (min_lookback, max_lookback) = if speed > 0.0 {
            (
                ((speed - cursor_speed) * duration).max(0.0) + Self::GUARD_SAMPLES,
                self.history.max_delay() - Self::GUARD_SAMPLES,
            )
        } else {
            (
                Self::GUARD_SAMPLES,
                self.history.max_delay() - travel - cursor_speed * duration - Self::GUARD_SAMPLES,
            )
        };
        let wanted = if self.frozen {
            self.snapshots[rng.random_range(0..SNAPSHOT_COUNT)]
        } else {
            let min = Self::MIN_LOOKBACK_SECONDS * sample_rate;
            rng.random_range(min..self.lookback_max.max(min + 1.0))
        };
        let lookback = wanted.clamp(min_lookback, max_lookback.max(min_lookback));

        let pan = rng.random_range(-Self::MAX_PAN..=Self::MAX_PAN);
        Grain {
            active: true,
            position: self.history.position_of(lookback),
            speed,
            window_phase: 0.0,
            window_increment: 1.0 / duration.max(1.0),
            gain,
            pan: panning_factors(pan),
        }
    }
}

// -------------------------------------------------------------------------------------------------
