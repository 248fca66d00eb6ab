//! Line-oriented control commands from the parent process
//!
//! Lines are trimmed and lower-cased, then parsed once into
//! [`ControlCommand`]. Arguments follow a `:` separator.

use std::str::FromStr;

use thiserror::Error;

/// A parsed control line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    ToggleDetection,
    ToggleAudio,
    DisconnectAudio,
    GetStatus,
    SetKeybindEnabled(bool),
    SetAutoEnabled(bool),
    SetCaptureIndex(u32),
    ClearManualOverride,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("{command} requires an argument")]
    MissingArgument { command: &'static str },

    #[error("invalid capture index: {0}")]
    InvalidIndex(String),
}

/// `1`, `true` and `yes` are true; anything else is false
pub fn parse_flag(raw: &str) -> bool {
    matches!(raw.trim(), "1" | "true" | "yes")
}

impl FromStr for ControlCommand {
    type Err = CommandParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim().to_ascii_lowercase();
        if line.is_empty() {
            return Err(CommandParseError::Empty);
        }

        let (name, arg) = match line.split_once(':') {
            Some((name, arg)) => (name.trim(), Some(arg.trim())),
            None => (line.as_str(), None),
        };

        let command = match name {
            "toggle_detection" => ControlCommand::ToggleDetection,
            "toggle_audio" => ControlCommand::ToggleAudio,
            "disconnect_audio" => ControlCommand::DisconnectAudio,
            "get_status" => ControlCommand::GetStatus,
            "clear_manual_override" => ControlCommand::ClearManualOverride,
            "exit" => ControlCommand::Exit,
            "set_keybind_enabled" => ControlCommand::SetKeybindEnabled(parse_flag(
                arg.ok_or(CommandParseError::MissingArgument {
                    command: "set_keybind_enabled",
                })?,
            )),
            "set_auto_enabled" => ControlCommand::SetAutoEnabled(parse_flag(arg.ok_or(
                CommandParseError::MissingArgument {
                    command: "set_auto_enabled",
                },
            )?)),
            "set_capture_index" | "set_webcam_index" => {
                let raw = arg.ok_or(CommandParseError::MissingArgument {
                    command: "set_capture_index",
                })?;
                let index = raw
                    .parse::<u32>()
                    .map_err(|_| CommandParseError::InvalidIndex(raw.to_string()))?;
                ControlCommand::SetCaptureIndex(index)
            }
            other => return Err(CommandParseError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_commands() {
        assert_eq!("toggle_detection".parse::<ControlCommand>(), Ok(ControlCommand::ToggleDetection));
        assert_eq!("  Toggle_Audio \r".parse::<ControlCommand>(), Ok(ControlCommand::ToggleAudio));
        assert_eq!("DISCONNECT_AUDIO".parse::<ControlCommand>(), Ok(ControlCommand::DisconnectAudio));
        assert_eq!("get_status".parse::<ControlCommand>(), Ok(ControlCommand::GetStatus));
        assert_eq!(
            "clear_manual_override".parse::<ControlCommand>(),
            Ok(ControlCommand::ClearManualOverride)
        );
        assert_eq!("exit".parse::<ControlCommand>(), Ok(ControlCommand::Exit));
    }

    #[test]
    fn test_flag_arguments() {
        assert_eq!(
            "set_keybind_enabled:1".parse::<ControlCommand>(),
            Ok(ControlCommand::SetKeybindEnabled(true))
        );
        assert_eq!(
            "set_keybind_enabled:Yes".parse::<ControlCommand>(),
            Ok(ControlCommand::SetKeybindEnabled(true))
        );
        assert_eq!(
            "set_auto_enabled:TRUE".parse::<ControlCommand>(),
            Ok(ControlCommand::SetAutoEnabled(true))
        );
        assert_eq!(
            "set_auto_enabled:off".parse::<ControlCommand>(),
            Ok(ControlCommand::SetAutoEnabled(false))
        );
        assert_eq!(
            "set_auto_enabled:".parse::<ControlCommand>(),
            Ok(ControlCommand::SetAutoEnabled(false))
        );
    }

    #[test]
    fn test_capture_index() {
        assert_eq!(
            "set_capture_index:2".parse::<ControlCommand>(),
            Ok(ControlCommand::SetCaptureIndex(2))
        );
        assert_eq!(
            "set_webcam_index: 1".parse::<ControlCommand>(),
            Ok(ControlCommand::SetCaptureIndex(1))
        );
        assert_eq!(
            "set_capture_index:-1".parse::<ControlCommand>(),
            Err(CommandParseError::InvalidIndex("-1".to_string()))
        );
        assert!(matches!(
            "set_capture_index:cam".parse::<ControlCommand>(),
            Err(CommandParseError::InvalidIndex(_))
        ));
    }

    #[test]
    fn test_rejected_lines() {
        assert_eq!("   ".parse::<ControlCommand>(), Err(CommandParseError::Empty));
        assert_eq!(
            "reboot".parse::<ControlCommand>(),
            Err(CommandParseError::Unknown("reboot".to_string()))
        );
        assert!(matches!(
            "set_keybind_enabled".parse::<ControlCommand>(),
            Err(CommandParseError::MissingArgument { .. })
        ));
    }
}
