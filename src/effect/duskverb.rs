use std::any::Any;

use four_cc::FourCC;

use crate::{
    effect::{Effect, EffectMessage, EffectMessagePayload},
    parameter::{
        BooleanParameterValue, FloatParameterValue, IntegerParameterValue, ParameterValueUpdate,
    },
    ClonableParameter, ControlParameters, EngineConfig, Error, ReverbEngine, Telemetry,
    TelemetryProducer,
};

// -------------------------------------------------------------------------------------------------

/// Message type for `DuskverbEffect`.
#[derive(Clone, Debug)]
pub enum DuskverbEffectMessage {
    /// Clear all delay lines, loops and grains.
    Reset,
}

impl EffectMessage for DuskverbEffectMessage {
    fn effect_name(&self) -> &'static str {
        DuskverbEffect::EFFECT_NAME
    }
    fn payload(&self) -> &dyn Any {
        self
    }
}

// -------------------------------------------------------------------------------------------------

/// Stereo [`Effect`] wrapper around a [`ReverbEngine`], which processes interleaved buffers and
/// receives its controls as parameter updates.
pub struct DuskverbEffect {
    engine: ReverbEngine,
    sample_rate: u32,
    max_frames: usize,
    size: FloatParameterValue,
    decay: FloatParameterValue,
    tone: FloatParameterValue,
    mix: FloatParameterValue,
    drift: FloatParameterValue,
    puck_x: FloatParameterValue,
    puck_y: FloatParameterValue,
    ghost: FloatParameterValue,
    duck: FloatParameterValue,
    freeze: BooleanParameterValue,
    loop_trigger: BooleanParameterValue,
    pre_delay: FloatParameterValue,
    tempo: FloatParameterValue,
    loop_bars: IntegerParameterValue,
    entropy_repeats: IntegerParameterValue,
    left: Vec<f32>,
    right: Vec<f32>,
}

impl DuskverbEffect {
    pub const EFFECT_NAME: &str = "Duskverb";

    /// Seed which is used by [`DuskverbEffect::new`].
    pub const DEFAULT_SEED: u64 = 0x6475_736b;

    /// Creates a new `DuskverbEffect` with default parameter values.
    pub fn new() -> Self {
        Self::with_engine(ReverbEngine::new(Self::DEFAULT_SEED))
    }

    /// Creates a new `DuskverbEffect` with the given random seed and engine configuration.
    pub fn with_config(seed: u64, config: EngineConfig) -> Self {
        Self::with_engine(ReverbEngine::with_config(seed, config))
    }

    fn with_engine(engine: ReverbEngine) -> Self {
        type P = ControlParameters;
        Self {
            engine,
            sample_rate: 0,
            max_frames: 0,
            size: FloatParameterValue::from_description(P::SIZE),
            decay: FloatParameterValue::from_description(P::DECAY),
            tone: FloatParameterValue::from_description(P::TONE),
            mix: FloatParameterValue::from_description(P::MIX),
            drift: FloatParameterValue::from_description(P::DRIFT),
            puck_x: FloatParameterValue::from_description(P::PUCK_X),
            puck_y: FloatParameterValue::from_description(P::PUCK_Y),
            ghost: FloatParameterValue::from_description(P::GHOST),
            duck: FloatParameterValue::from_description(P::DUCK),
            freeze: BooleanParameterValue::from_description(P::FREEZE),
            loop_trigger: BooleanParameterValue::from_description(P::LOOP_TRIGGER),
            pre_delay: FloatParameterValue::from_description(P::PRE_DELAY),
            tempo: FloatParameterValue::from_description(P::TEMPO),
            loop_bars: IntegerParameterValue::from_description(P::LOOP_BARS),
            entropy_repeats: IntegerParameterValue::from_description(P::ENTROPY_REPEATS),
            left: Vec::new(),
            right: Vec::new(),
        }
    }

    /// Attach a telemetry producer to the wrapped engine. Must be called before the effect
    /// gets moved into the audio thread.
    pub fn set_telemetry_producer(&mut self, producer: Option<TelemetryProducer>) {
        self.engine.set_telemetry_producer(producer);
    }

    /// Last telemetry snapshot of the wrapped engine.
    pub fn telemetry(&self) -> Telemetry {
        self.engine.telemetry()
    }

    /// Current control values, as passed to the engine.
    pub fn controls(&self) -> ControlParameters {
        ControlParameters {
            size: self.size.value(),
            decay: self.decay.value(),
            tone: self.tone.value(),
            mix: self.mix.value(),
            drift: self.drift.value(),
            puck_x: self.puck_x.value(),
            puck_y: self.puck_y.value(),
            ghost: self.ghost.value(),
            duck: self.duck.value(),
            freeze: self.freeze.value(),
            loop_trigger: self.loop_trigger.value(),
            pre_delay_ms: self.pre_delay.value(),
            tempo: self.tempo.value(),
            loop_bars: self.loop_bars.value(),
            entropy_repeats: self.entropy_repeats.value(),
        }
    }
}

impl Default for DuskverbEffect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect for DuskverbEffect {
    fn name(&self) -> &'static str {
        Self::EFFECT_NAME
    }

    fn parameters(&self) -> Vec<&dyn ClonableParameter> {
        vec![
            self.size.description(),
            self.decay.description(),
            self.tone.description(),
            self.mix.description(),
            self.drift.description(),
            self.puck_x.description(),
            self.puck_y.description(),
            self.ghost.description(),
            self.duck.description(),
            self.freeze.description(),
            self.loop_trigger.description(),
            self.pre_delay.description(),
            self.tempo.description(),
            self.loop_bars.description(),
            self.entropy_repeats.description(),
        ]
    }

    fn initialize(
        &mut self,
        sample_rate: u32,
        channel_count: usize,
        max_frames: usize,
    ) -> Result<(), Error> {
        self.engine.prepare(sample_rate, max_frames, channel_count)?;
        self.sample_rate = sample_rate;
        self.max_frames = max_frames;
        self.left = vec![0.0; max_frames];
        self.right = vec![0.0; max_frames];
        Ok(())
    }

    fn process(&mut self, output: &mut [f32]) {
        if !self.engine.is_prepared() || self.max_frames == 0 {
            return;
        }
        let controls = self.controls();
        for chunk in output.chunks_mut(self.max_frames * 2) {
            let frames = chunk.len() / 2;
            let (left, right) = (&mut self.left[..frames], &mut self.right[..frames]);
            for ((frame, l), r) in chunk.chunks_exact(2).zip(left.iter_mut()).zip(right.iter_mut())
            {
                *l = frame[0];
                *r = frame[1];
            }
            self.engine.process(left, right, &controls);
            for ((frame, l), r) in chunk
                .chunks_exact_mut(2)
                .zip(left.iter())
                .zip(right.iter())
            {
                frame[0] = *l;
                frame[1] = *r;
            }
        }
    }

    fn process_tail(&self) -> Option<usize> {
        if !self.engine.is_prepared() {
            return Some(0);
        }
        match self.engine.tail_seconds(&self.controls()) {
            None => Some(usize::MAX),
            Some(seconds) => Some((seconds * self.sample_rate as f32).ceil() as usize),
        }
    }

    fn process_parameter_update(
        &mut self,
        id: FourCC,
        value: &ParameterValueUpdate,
    ) -> Result<(), Error> {
        type P = ControlParameters;
        match id {
            _ if id == P::SIZE.id() => self.size.apply_update(value),
            _ if id == P::DECAY.id() => self.decay.apply_update(value),
            _ if id == P::TONE.id() => self.tone.apply_update(value),
            _ if id == P::MIX.id() => self.mix.apply_update(value),
            _ if id == P::DRIFT.id() => self.drift.apply_update(value),
            _ if id == P::PUCK_X.id() => self.puck_x.apply_update(value),
            _ if id == P::PUCK_Y.id() => self.puck_y.apply_update(value),
            _ if id == P::GHOST.id() => self.ghost.apply_update(value),
            _ if id == P::DUCK.id() => self.duck.apply_update(value),
            _ if id == P::FREEZE.id() => self.freeze.apply_update(value),
            _ if id == P::LOOP_TRIGGER.id() => self.loop_trigger.apply_update(value),
            _ if id == P::PRE_DELAY.id() => self.pre_delay.apply_update(value),
            _ if id == P::TEMPO.id() => self.tempo.apply_update(value),
            _ if id == P::LOOP_BARS.id() => self.loop_bars.apply_update(value),
            _ if id == P::ENTROPY_REPEATS.id() => self.entropy_repeats.apply_update(value),
            _ => {
                return Err(Error::ParameterError(format!(
                    "Unknown parameter: '{id}' for effect '{}'",
                    self.name()
                )))
            }
        }
        Ok(())
    }

    fn process_message(&mut self, message: &EffectMessagePayload) -> Result<(), Error> {
        if let Some(message) = message.payload().downcast_ref::<DuskverbEffectMessage>() {
            match message {
                DuskverbEffectMessage::Reset => self.engine.reset(),
            }
            Ok(())
        } else {
            Err(Error::ParameterError(
                "DuskverbEffect: Invalid/unknown message payload".to_owned(),
            ))
        }
    }
}

// -------------------------------------------------------------------------------------------------
