use std::any::Any;

use four_cc::FourCC;

use crate::{parameter::ParameterValueUpdate, ClonableParameter, Error};

// -------------------------------------------------------------------------------------------------

pub mod duskverb;

// -------------------------------------------------------------------------------------------------

/// Carries [`Effect`] specific payloads, which can't or should not be expressed as
/// [`Parameter`](crate::Parameter) changes.
///
/// This trait is implemented by message enums specific to each effect. It provides a way to
/// identify the target effect and access the message payload as a `dyn Any`, which can then be
/// downcast to the concrete message type within the effect's `process_message` implementation.
///
/// Messages are always applied in the effect's DSP real-time thread.
pub trait EffectMessage: Any + Send + Sync {
    /// The static name of the target effect for this message.
    ///
    /// This should match the `name()` of the target `Effect` implementation, so hosts can avoid
    /// sending messages to the wrong effect type.
    fn effect_name(&self) -> &'static str;

    /// Returns the message payload as a `dyn Any` reference.
    fn payload(&self) -> &dyn Any;
}

/// Type used in [`Effect::process_message`] to receive messages.
pub type EffectMessagePayload = dyn EffectMessage;

// -------------------------------------------------------------------------------------------------

/// Effects manipulate interleaved `f32` audio buffers in place and can be `Send` and `Sync`ed
/// across threads.
///
/// Hosts query the parameter set via [`Effect::parameters`] in the main thread, call
/// [`Effect::initialize`] once before processing, and then only talk to the effect from the
/// real-time thread via parameter updates and messages. This ensures that the actual effect
/// processing state can not be mutated outside of the audio thread.
///
/// NB: all `process_XXX` functions are called in realtime audio threads, so they must not
/// block or allocate! All other functions are called in the main thread to set up the effect.
pub trait Effect: Send + Sync + 'static {
    /// A unique, static name for the effect.
    fn name(&self) -> &'static str;

    /// Returns a list of parameter descriptors for this effect.
    ///
    /// May only be called on non real-time threads, usually right after creating the effect in
    /// order to build generic effect UIs.
    fn parameters(&self) -> Vec<&dyn ClonableParameter>;

    /// Initializes the effect with the audio output's properties.
    ///
    /// Runs on a non real-time thread, so it's safe to allocate buffers here. `max_frames` is
    /// the largest number of frames a single `process` call will receive.
    fn initialize(
        &mut self,
        sample_rate: u32,
        channel_count: usize,
        max_frames: usize,
    ) -> Result<(), Error>;

    /// Processes an interleaved audio buffer in place.
    fn process(&mut self, output: &mut [f32]);

    /// Returns the number of audible sample frames this effect will produce, after it received
    /// silence.
    /// - `None`: unknown.
    /// - `Some(usize::MAX)`: the tail is infinite (e.g. a frozen reverb).
    /// - `Some(frames)`: the effect goes silent after the given number of frames.
    fn process_tail(&self) -> Option<usize> {
        None
    }

    /// Applies a parameter change. The implementation should match on the `id` and update its
    /// internal state accordingly, using the raw or normalized `value`.
    fn process_parameter_update(
        &mut self,
        id: FourCC,
        value: &ParameterValueUpdate,
    ) -> Result<(), Error>;

    /// Handles optional effect specific messages. The implementation should downcast the
    /// `message` payload to its specific message enum type.
    fn process_message(&mut self, _message: &EffectMessagePayload) -> Result<(), Error> {
        Err(Error::ParameterError(format!(
            "{}: Received unexpected message payload.",
            self.name()
        )))
    }
}
