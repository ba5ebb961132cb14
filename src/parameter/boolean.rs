use std::fmt::Display;

use four_cc::FourCC;

use super::{Parameter, ParameterType, ParameterValueUpdate};

// -------------------------------------------------------------------------------------------------

/// On/off switch, such as freeze or the looper trigger. Displayed as "ON" or "OFF".
#[derive(Debug, Clone, PartialEq)]
pub struct BooleanParameter {
    id: FourCC,
    name: &'static str,
    default: bool,
}

impl BooleanParameter {
    const ON: &str = "ON";
    const OFF: &str = "OFF";

    pub const fn new(id: FourCC, name: &'static str, default: bool) -> Self {
        Self { id, name, default }
    }

    pub const fn id(&self) -> FourCC {
        self.id
    }

    pub const fn default_value(&self) -> bool {
        self.default
    }

    /// Raw update which switches the control to the given state.
    #[must_use]
    pub fn value_update(&self, value: bool) -> (FourCC, ParameterValueUpdate) {
        (self.id, ParameterValueUpdate::Raw(Box::new(value)))
    }

    /// Anything at or above 0.5 is on. NaN is off.
    fn from_normalized(normalized: f32) -> bool {
        normalized >= 0.5
    }

    const fn to_normalized(value: bool) -> f32 {
        if value {
            1.0
        } else {
            0.0
        }
    }

    fn format(value: bool) -> &'static str {
        if value {
            Self::ON
        } else {
            Self::OFF
        }
    }

    /// Accepts "on"/"off" and "true"/"false", case insensitive.
    pub fn parse(string: &str) -> Option<bool> {
        let string = string.trim();
        if string.eq_ignore_ascii_case(Self::ON) || string.eq_ignore_ascii_case("true") {
            Some(true)
        } else if string.eq_ignore_ascii_case(Self::OFF) || string.eq_ignore_ascii_case("false") {
            Some(false)
        } else {
            None
        }
    }
}

impl Parameter for BooleanParameter {
    fn id(&self) -> FourCC {
        self.id
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn parameter_type(&self) -> ParameterType {
        ParameterType::Boolean
    }

    fn default_value(&self) -> f32 {
        Self::to_normalized(self.default)
    }

    fn value_to_string(&self, normalized: f32, _include_unit: bool) -> String {
        Self::format(Self::from_normalized(normalized)).to_owned()
    }

    fn string_to_value(&self, string: String) -> Option<f32> {
        Self::parse(&string).map(Self::to_normalized)
    }
}

// -------------------------------------------------------------------------------------------------

/// Current state of a [`BooleanParameter`] switch, as held by an effect.
#[derive(Debug, Clone)]
pub struct BooleanParameterValue {
    description: BooleanParameter,
    value: bool,
}

impl BooleanParameterValue {
    pub fn from_description(description: BooleanParameter) -> Self {
        let value = description.default_value();
        Self { value, description }
    }

    pub fn description(&self) -> &BooleanParameter {
        &self.description
    }

    #[inline(always)]
    pub fn value(&self) -> bool {
        self.value
    }

    /// Apply a raw or normalized update. Raw values of a wrong type are ignored with a warning.
    pub fn apply_update(&mut self, update: &ParameterValueUpdate) {
        match update {
            ParameterValueUpdate::Raw(raw) => match raw.downcast_ref::<bool>() {
                Some(value) => self.value = *value,
                None => log::warn!(
                    "Ignoring non boolean value for switch '{}'",
                    self.description.id()
                ),
            },
            ParameterValueUpdate::Normalized(normalized) => {
                self.value = BooleanParameter::from_normalized(*normalized);
            }
        }
    }
}

impl Display for BooleanParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(BooleanParameter::format(self.value))
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const FREEZE: BooleanParameter = BooleanParameter::new(FourCC(*b"frz "), "Freeze", false);

    #[test]
    fn conversions() {
        assert_eq!(BooleanParameter::parse(" on"), Some(true));
        assert_eq!(BooleanParameter::parse("FALSE"), Some(false));
        assert_eq!(BooleanParameter::parse("maybe"), None);
        assert_eq!(Parameter::default_value(&FREEZE), 0.0);
        assert_eq!(FREEZE.string_to_value("Off".to_owned()), Some(0.0));
        assert_eq!(FREEZE.value_to_string(0.75, true), "ON");
    }

    #[test]
    fn updates() {
        let mut value = BooleanParameterValue::from_description(FREEZE);
        assert!(!value.value());
        value.apply_update(&ParameterValueUpdate::Normalized(0.7));
        assert!(value.value());
        value.apply_update(&ParameterValueUpdate::Raw(Box::new(0.3f32)));
        assert!(value.value());
        value.apply_update(&ParameterValueUpdate::Raw(Box::new(false)));
        assert!(!value.value());
        value.apply_update(&ParameterValueUpdate::Normalized(1.0));
        value.apply_update(&ParameterValueUpdate::Normalized(f32::NAN));
        assert!(!value.value());
        assert_eq!(value.to_string(), "OFF");
    }
}
