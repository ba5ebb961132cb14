#![doc = include_str!("../README.md")]

// private mods (will be partly re-exported)
mod effect;
mod engine;
mod error;
mod parameter;

// public, flat re-exports
pub use error::Error;

pub use engine::{
    telemetry_channel, ControlParameters, DisintegrationState, EngineConfig, ReverbEngine,
    Telemetry, TelemetryConsumer, TelemetryProducer, LINES,
};

pub use effect::{Effect, EffectMessage, EffectMessagePayload};

pub use parameter::{ClonableParameter, Parameter, ParameterType, ParameterValueUpdate};

// public mods
pub mod utils;

pub mod parameters {
    //! Parameter descriptors and value holders for effect controls.

    pub use super::parameter::{
        BooleanParameter, BooleanParameterValue, FloatParameter, FloatParameterValue,
        IntegerParameter, IntegerParameterValue,
    };
}

pub mod effects {
    //! Host facing effect implementations.

    pub use super::effect::duskverb::{DuskverbEffect, DuskverbEffectMessage};
}
