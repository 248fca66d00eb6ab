//! Status events emitted to the parent process
//!
//! Each change is one `STATUS:<field>:<value>` line on stdout.

use crate::state::ManualOverride;

/// Fields of the published status snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusField {
    DetectionEnabled,
    PhoneDetected,
    AudioActive,
    KeybindEnabled,
    ManualOverride,
}

impl StatusField {
    /// Protocol order
    pub const ALL: [StatusField; 5] = [
        StatusField::DetectionEnabled,
        StatusField::PhoneDetected,
        StatusField::AudioActive,
        StatusField::KeybindEnabled,
        StatusField::ManualOverride,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusField::DetectionEnabled => "detection_enabled",
            StatusField::PhoneDetected => "phone_detected",
            StatusField::AudioActive => "audio_active",
            StatusField::KeybindEnabled => "keybind_enabled",
            StatusField::ManualOverride => "manual_override",
        }
    }
}

/// Value carried by a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusValue {
    Flag(bool),
    Override(ManualOverride),
}

/// One field change, rendered as a protocol line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEvent {
    pub field: StatusField,
    pub value: StatusValue,
}

impl StatusEvent {
    pub fn flag(field: StatusField, value: bool) -> Self {
        Self {
            field,
            value: StatusValue::Flag(value),
        }
    }

    pub fn manual_override(value: ManualOverride) -> Self {
        Self {
            field: StatusField::ManualOverride,
            value: StatusValue::Override(value),
        }
    }
}

impl std::fmt::Display for StatusValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // The front-end parses Python-style booleans
            StatusValue::Flag(true) => write!(f, "True"),
            StatusValue::Flag(false) => write!(f, "False"),
            StatusValue::Override(value) => write!(f, "{}", value),
        }
    }
}

impl std::fmt::Display for StatusEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "STATUS:{}:{}", self.field.as_str(), self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_line() {
        let event = StatusEvent::flag(StatusField::AudioActive, true);
        assert_eq!(event.to_string(), "STATUS:audio_active:True");
        let event = StatusEvent::flag(StatusField::DetectionEnabled, false);
        assert_eq!(event.to_string(), "STATUS:detection_enabled:False");
    }

    #[test]
    fn test_override_line() {
        let event = StatusEvent::manual_override(ManualOverride::None);
        assert_eq!(event.to_string(), "STATUS:manual_override:None");
        let event = StatusEvent::manual_override(ManualOverride::Off);
        assert_eq!(event.to_string(), "STATUS:manual_override:off");
    }

    #[test]
    fn test_fields_in_protocol_order() {
        let names: Vec<&str> = StatusField::ALL.iter().map(StatusField::as_str).collect();
        assert_eq!(
            names,
            vec![
                "detection_enabled",
                "phone_detected",
                "audio_active",
                "keybind_enabled",
                "manual_override"
            ]
        );
    }
}
