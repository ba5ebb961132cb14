//! Common, shared DSP tools for the reverb engine.

pub mod capture;
pub mod delay;
pub mod envelope;
pub mod filters;
pub mod interpolation;
pub mod lfo;
pub mod saturation;
