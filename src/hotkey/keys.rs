//! Hotkey chords and modifier tracking
//!
//! Control+Option+C toggles the manual override, Control+Option+W toggles
//! detection. Keycodes are macOS virtual key codes.

/// Virtual key code of `C`
pub const KEY_C: u16 = 0x08;
/// Virtual key code of `W`
pub const KEY_W: u16 = 0x0D;

/// What a recognised chord asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotkeyAction {
    /// Connect if off, disconnect if on, and record that as the override
    ToggleOverride,
    ToggleDetection,
}

/// Modifier flag masks from macOS CGEventFlags
#[cfg(target_os = "macos")]
pub mod flags {
    use core_graphics::event::CGEventFlags;

    pub const CONTROL: CGEventFlags = CGEventFlags::CGEventFlagControl;
    pub const OPTION: CGEventFlags = CGEventFlags::CGEventFlagAlternate;
    pub const COMMAND: CGEventFlags = CGEventFlags::CGEventFlagCommand;
    pub const SHIFT: CGEventFlags = CGEventFlags::CGEventFlagShift;
}

/// Which modifier keys are held
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModifierState {
    pub control: bool,
    pub option: bool,
    pub command: bool,
    pub shift: bool,
}

impl ModifierState {
    #[cfg(target_os = "macos")]
    pub fn from_flags(event_flags: core_graphics::event::CGEventFlags) -> Self {
        Self {
            control: event_flags.contains(flags::CONTROL),
            option: event_flags.contains(flags::OPTION),
            command: event_flags.contains(flags::COMMAND),
            shift: event_flags.contains(flags::SHIFT),
        }
    }

    /// Exactly Control + Option
    pub fn is_control_option(&self) -> bool {
        self.control && self.option && !self.command && !self.shift
    }
}

/// Map a key press to its action, if it is one of ours
pub fn match_chord(keycode: u16, modifiers: ModifierState) -> Option<HotkeyAction> {
    if !modifiers.is_control_option() {
        return None;
    }
    match keycode {
        KEY_C => Some(HotkeyAction::ToggleOverride),
        KEY_W => Some(HotkeyAction::ToggleDetection),
        _ => None,
    }
}
