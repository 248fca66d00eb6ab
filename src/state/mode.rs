//! Mode controller: detection, keybind and manual-override state
//!
//! Each field has one writer thread in normal operation. The command
//! reader owns the two flags, the hotkey listener owns the override. The
//! fields are still atomics so any thread may read them at any time.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use tracing::info;

/// User-set intent that takes precedence over the automatic signal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ManualOverride {
    /// Follow the automatic signal
    #[default]
    None,
    /// Keep the route connected regardless of detection
    On,
    /// Released the forced-on lock; the automatic signal may still connect
    Off,
}

impl ManualOverride {
    fn to_u8(self) -> u8 {
        match self {
            ManualOverride::None => 0,
            ManualOverride::On => 1,
            ManualOverride::Off => 2,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ManualOverride::On,
            2 => ManualOverride::Off,
            _ => ManualOverride::None,
        }
    }
}

impl std::fmt::Display for ManualOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManualOverride::None => write!(f, "None"),
            ManualOverride::On => write!(f, "on"),
            ManualOverride::Off => write!(f, "off"),
        }
    }
}

/// Point-in-time copy of the mode fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeState {
    pub detection_enabled: bool,
    pub keybind_enabled: bool,
    pub manual_override: ManualOverride,
}

impl ModeState {
    /// The override as the resolver must see it: ignored while the keybind
    /// is disabled
    pub fn effective_override(&self) -> ManualOverride {
        if self.keybind_enabled {
            self.manual_override
        } else {
            ManualOverride::None
        }
    }
}

/// Flags written by the command reader
#[derive(Debug)]
struct ModeFlags {
    detection_enabled: AtomicBool,
    keybind_enabled: AtomicBool,
}

/// Override written by the hotkey listener
#[derive(Debug, Default)]
struct OverrideCell {
    value: AtomicU8,
}

/// Shared mode state with one mutation entry point per field
#[derive(Debug)]
pub struct ModeController {
    flags: ModeFlags,
    manual: OverrideCell,
}

impl ModeController {
    pub fn new(detection_enabled: bool, keybind_enabled: bool) -> Self {
        Self {
            flags: ModeFlags {
                detection_enabled: AtomicBool::new(detection_enabled),
                keybind_enabled: AtomicBool::new(keybind_enabled),
            },
            manual: OverrideCell::default(),
        }
    }

    pub fn detection_enabled(&self) -> bool {
        self.flags.detection_enabled.load(Ordering::SeqCst)
    }

    pub fn keybind_enabled(&self) -> bool {
        self.flags.keybind_enabled.load(Ordering::SeqCst)
    }

    pub fn manual_override(&self) -> ManualOverride {
        ManualOverride::from_u8(self.manual.value.load(Ordering::SeqCst))
    }

    pub fn snapshot(&self) -> ModeState {
        ModeState {
            detection_enabled: self.detection_enabled(),
            keybind_enabled: self.keybind_enabled(),
            manual_override: self.manual_override(),
        }
    }

    /// Returns the previous value
    pub fn set_detection_enabled(&self, enabled: bool) -> bool {
        let previous = self.flags.detection_enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            info!(enabled, "detection mode changed");
        }
        previous
    }

    /// Flip detection and return the new value
    pub fn toggle_detection(&self) -> bool {
        let enabled = !self.flags.detection_enabled.fetch_xor(true, Ordering::SeqCst);
        info!(enabled, "detection mode toggled");
        enabled
    }

    /// Returns the previous value
    pub fn set_keybind_enabled(&self, enabled: bool) -> bool {
        let previous = self.flags.keybind_enabled.swap(enabled, Ordering::SeqCst);
        if previous != enabled {
            info!(enabled, "keybind mode changed");
        }
        previous
    }

    pub fn set_manual_override(&self, value: ManualOverride) {
        let previous = ManualOverride::from_u8(self.manual.value.swap(value.to_u8(), Ordering::SeqCst));
        if previous != value {
            info!(from = %previous, to = %value, "manual override changed");
        }
    }

    pub fn clear_manual_override(&self) {
        self.set_manual_override(ManualOverride::None);
    }
}
