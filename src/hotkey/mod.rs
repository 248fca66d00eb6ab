//! Hotkey module for global keyboard event listening
//!
//! Two Control+Option chords: one toggles the manual override, one toggles
//! detection. Only macOS has a listener; elsewhere starting it fails with
//! [`HotkeyError::Unsupported`] and the daemon runs without hotkeys.

mod keys;
mod listener;

pub use keys::HotkeyAction;
pub use listener::{HotkeyError, HotkeyHandler, HotkeyListener};
