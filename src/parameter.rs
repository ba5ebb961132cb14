//! Host facing control descriptors.
//!
//! Every control of the reverb is described by a typed, `const` constructible descriptor
//! ([`FloatParameter`], [`IntegerParameter`], [`BooleanParameter`]), which knows its id, range and
//! default. Hosts only see the type erased [`Parameter`] view, which speaks normalized values.

use std::{any::Any, fmt::Debug};

use four_cc::FourCC;

// -------------------------------------------------------------------------------------------------

/// Value kind of a [`Parameter`]. Lets hosts pick a knob, stepper or switch for it.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterType {
    Float,
    Integer,
    Boolean,
}

// -------------------------------------------------------------------------------------------------

/// Type erased view on a control descriptor.
///
/// All values which cross this interface are normalized into `0.0..=1.0`, whatever range or type
/// the control has internally.
pub trait Parameter: Debug {
    /// Unique id, used to route [`ParameterValueUpdate`]s to the right control.
    fn id(&self) -> FourCC;
    /// Display name.
    fn name(&self) -> &'static str;
    fn parameter_type(&self) -> ParameterType;

    /// Normalized default value.
    fn default_value(&self) -> f32;

    /// Format a normalized value for display.
    fn value_to_string(&self, value: f32, include_unit: bool) -> String;
    /// Parse a display string back into a normalized value. `None` when the string can't be
    /// parsed.
    fn string_to_value(&self, string: String) -> Option<f32>;
}

/// Boxed clones of type erased descriptors, e.g. to keep a copy of an effect's parameter list
/// around after the effect got moved into the audio thread.
pub trait ClonableParameter: Parameter {
    fn dyn_clone(&self) -> Box<dyn Parameter>;
}

impl<P> ClonableParameter for P
where
    P: Parameter + Clone + 'static,
{
    fn dyn_clone(&self) -> Box<dyn Parameter> {
        Box::new(Self::clone(self))
    }
}

// -------------------------------------------------------------------------------------------------

/// A new value for a control, applied by the effect before its next processed block.
#[derive(Debug)]
pub enum ParameterValueUpdate {
    /// Plain value of the control's own type: `f32`, `i32` or `bool`.
    Raw(Box<dyn Any + Send + Sync>),
    /// Normalized value. Out of range values get clamped. Non finite values select the default
    /// of numeric controls and switch boolean ones off.
    Normalized(f32),
}

// -------------------------------------------------------------------------------------------------

mod float;
pub use float::{FloatParameter, FloatParameterValue};

mod integer;
pub use integer::{IntegerParameter, IntegerParameterValue};

mod boolean;
pub use boolean::{BooleanParameter, BooleanParameterValue};
