//! Per block control parameters and their descriptors.

use four_cc::FourCC;

use crate::parameter::{BooleanParameter, FloatParameter, IntegerParameter};

// -------------------------------------------------------------------------------------------------

/// Control values consumed by the [`ReverbEngine`](crate::ReverbEngine) for a single block.
///
/// Values are owned by the caller and never trusted: the engine only ever consumes a
/// [`clamped`](Self::clamped) copy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlParameters {
    /// Scales all delay line lengths.
    pub size: f32,
    /// Reverb decay time (T60) in seconds.
    pub decay: f32,
    /// Dark (-1) to bright (+1) damping.
    pub tone: f32,
    /// Dry/wet balance.
    pub mix: f32,
    /// Delay line modulation amount.
    pub drift: f32,
    /// Proximity and focus axis: -1 is close and thin, +1 is distant and smeared.
    pub puck_x: f32,
    /// Ghost memory window axis: -1 reaches back into recent "body", +1 into distant "air".
    pub puck_y: f32,
    /// Granular ghost engine amount.
    pub ghost: f32,
    /// Wet signal ducking amount.
    pub duck: f32,
    /// Freeze the tail into a multi head loop.
    pub freeze: bool,
    /// Rising edges arm, cancel or stop the disintegration looper.
    pub loop_trigger: bool,
    /// Early reflection pre-delay in milliseconds.
    pub pre_delay_ms: f32,
    /// Tempo in beats per minute for the disintegration loop length.
    pub tempo: f32,
    /// Disintegration loop length in 4/4 bars.
    pub loop_bars: i32,
    /// Number of loop repetitions until full disintegration.
    pub entropy_repeats: i32,
}

impl ControlParameters {
    pub const SIZE: FloatParameter =
        FloatParameter::new(FourCC(*b"size"), "Size", 0.5..=2.0, 1.0).with_unit("x");
    pub const DECAY: FloatParameter =
        FloatParameter::new(FourCC(*b"dcay"), "Decay", 0.4..=50.0, 4.0).with_unit("s");
    pub const TONE: FloatParameter = FloatParameter::new(FourCC(*b"tone"), "Tone", -1.0..=1.0, 0.0);
    pub const MIX: FloatParameter = FloatParameter::new(FourCC(*b"mix "), "Mix", 0.0..=1.0, 0.35);
    pub const DRIFT: FloatParameter =
        FloatParameter::new(FourCC(*b"drft"), "Drift", 0.0..=1.0, 0.3);
    pub const PUCK_X: FloatParameter =
        FloatParameter::new(FourCC(*b"pckx"), "Proximity", -1.0..=1.0, 0.0);
    pub const PUCK_Y: FloatParameter =
        FloatParameter::new(FourCC(*b"pcky"), "Memory", -1.0..=1.0, 0.0);
    pub const GHOST: FloatParameter =
        FloatParameter::new(FourCC(*b"ghst"), "Ghost", 0.0..=1.0, 0.0);
    pub const DUCK: FloatParameter = FloatParameter::new(FourCC(*b"duck"), "Duck", 0.0..=1.0, 0.0);
    pub const FREEZE: BooleanParameter = BooleanParameter::new(FourCC(*b"frz "), "Freeze", false);
    pub const LOOP_TRIGGER: BooleanParameter =
        BooleanParameter::new(FourCC(*b"loop"), "Disintegrate", false);
    pub const PRE_DELAY: FloatParameter =
        FloatParameter::new(FourCC(*b"pdly"), "Pre-Delay", 0.0..=100.0, 0.0).with_unit("ms");
    pub const TEMPO: FloatParameter =
        FloatParameter::new(FourCC(*b"bpm "), "Tempo", 20.0..=300.0, 120.0).with_unit("bpm");
    pub const LOOP_BARS: IntegerParameter =
        IntegerParameter::new(FourCC(*b"bars"), "Loop Bars", 1..=16, 2).with_unit("bars");
    pub const ENTROPY_REPEATS: IntegerParameter =
        IntegerParameter::new(FourCC(*b"entr"), "Entropy Repeats", 1..=1000, 32);

    /// A copy with every value clamped into its safe range. Non finite floats fall back to
    /// their defaults.
    #[must_use]
    pub fn clamped(&self) -> Self {
        Self {
            size: Self::SIZE.clamp_value(self.size),
            decay: Self::DECAY.clamp_value(self.decay),
            tone: Self::TONE.clamp_value(self.tone),
            mix: Self::MIX.clamp_value(self.mix),
            drift: Self::DRIFT.clamp_value(self.drift),
            puck_x: Self::PUCK_X.clamp_value(self.puck_x),
            puck_y: Self::PUCK_Y.clamp_value(self.puck_y),
            ghost: Self::GHOST.clamp_value(self.ghost),
            duck: Self::DUCK.clamp_value(self.duck),
            freeze: self.freeze,
            loop_trigger: self.loop_trigger,
            pre_delay_ms: Self::PRE_DELAY.clamp_value(self.pre_delay_ms),
            tempo: Self::TEMPO.clamp_value(self.tempo),
            loop_bars: Self::LOOP_BARS.clamp_value(self.loop_bars),
            entropy_repeats: Self::ENTROPY_REPEATS.clamp_value(self.entropy_repeats),
        }
    }

    /// Proximity in range \[0, 1\], where 1 is close (puck_x = -1).
    #[inline]
    pub fn proximity(&self) -> f32 {
        (1.0 - self.puck_x) * 0.5
    }

    /// Length of the disintegration loop in seconds: 4 beats per bar.
    pub fn loop_seconds(&self) -> f32 {
        self.loop_bars as f32 * 4.0 * 60.0 / self.tempo
    }
}

impl Default for ControlParameters {
    fn default() -> Self {
        Self {
            size: Self::SIZE.default_value(),
            decay: Self::DECAY.default_value(),
            tone: Self::TONE.default_value(),
            mix: Self::MIX.default_value(),
            drift: Self::DRIFT.default_value(),
            puck_x: Self::PUCK_X.default_value(),
            puck_y: Self::PUCK_Y.default_value(),
            ghost: Self::GHOST.default_value(),
            duck: Self::DUCK.default_value(),
            freeze: Self::FREEZE.default_value(),
            loop_trigger: Self::LOOP_TRIGGER.default_value(),
            pre_delay_ms: Self::PRE_DELAY.default_value(),
            tempo: Self::TEMPO.default_value(),
            loop_bars: Self::LOOP_BARS.default_value(),
            entropy_repeats: Self::ENTROPY_REPEATS.default_value(),
        }
    }
}

// -------------------------------------------------------------------------------------------------

/// Tuning which is fixed for the lifetime of an engine instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    /// Lowest wet gain the ducker may apply.
    pub min_wet_factor: f32,
    /// Capture capacity of the disintegration looper in seconds.
    pub max_loop_seconds: f32,
    /// Capture capacity of the freeze loop in seconds.
    pub freeze_capture_seconds: f32,
}

impl EngineConfig {
    /// A copy with every value clamped into its safe range.
    #[must_use]
    pub fn clamped(&self) -> Self {
        let defaults = Self::default();
        let clamp = |value: f32, default: f32, min: f32, max: f32| {
            if value.is_finite() {
                value.clamp(min, max)
            } else {
                default
            }
        };
        Self {
            min_wet_factor: clamp(self.min_wet_factor, defaults.min_wet_factor, 0.0, 1.0),
            max_loop_seconds: clamp(self.max_loop_seconds, defaults.max_loop_seconds, 1.0, 60.0),
            freeze_capture_seconds: clamp(
                self.freeze_capture_seconds,
                defaults.freeze_capture_seconds,
                1.0,
                20.0,
            ),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_wet_factor: 0.1,
            max_loop_seconds: 12.0,
            freeze_capture_seconds: 4.0,
        }
    }
}

// -------------------------------------------------------------------------------------------------
