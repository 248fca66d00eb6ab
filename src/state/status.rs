//! Read-mostly status snapshot for external observers
//!
//! `audio_active` is written optimistically by the resolver and corrected
//! by the actuator bridge once the real outcome is known, so a reader may
//! see a stale value for up to one actuator round-trip.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::events::{StatusEvent, StatusField};

use super::mode::{ManualOverride, ModeController};

/// Snapshot published to observers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppStatus {
    pub phone_detected: bool,
    pub audio_active: bool,
    pub detection_enabled: bool,
    pub keybind_enabled: bool,
    pub manual_override: ManualOverride,
}

impl AppStatus {
    /// All fields, in protocol order
    pub fn events(&self) -> Vec<StatusEvent> {
        StatusField::ALL.iter().map(|field| self.event(*field)).collect()
    }

    pub fn event(&self, field: StatusField) -> StatusEvent {
        match field {
            StatusField::DetectionEnabled => StatusEvent::flag(field, self.detection_enabled),
            StatusField::PhoneDetected => StatusEvent::flag(field, self.phone_detected),
            StatusField::AudioActive => StatusEvent::flag(field, self.audio_active),
            StatusField::KeybindEnabled => StatusEvent::flag(field, self.keybind_enabled),
            StatusField::ManualOverride => StatusEvent::manual_override(self.manual_override),
        }
    }

    /// Fields that differ from `previous`
    pub fn diff(&self, previous: &AppStatus) -> Vec<StatusEvent> {
        self.events()
            .into_iter()
            .zip(previous.events())
            .filter(|(now, before)| now != before)
            .map(|(now, _)| now)
            .collect()
    }
}

/// Status bits not already held by the mode controller
#[derive(Debug, Default)]
pub struct StatusBoard {
    phone_detected: AtomicBool,
    audio_active: AtomicBool,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phone_detected(&self) -> bool {
        self.phone_detected.load(Ordering::SeqCst)
    }

    pub fn set_phone_detected(&self, detected: bool) {
        self.phone_detected.store(detected, Ordering::SeqCst);
    }

    pub fn audio_active(&self) -> bool {
        self.audio_active.load(Ordering::SeqCst)
    }

    /// Returns the previous value
    pub fn set_audio_active(&self, active: bool) -> bool {
        self.audio_active.swap(active, Ordering::SeqCst)
    }

    pub fn snapshot(&self, mode: &ModeController) -> AppStatus {
        let mode = mode.snapshot();
        AppStatus {
            phone_detected: self.phone_detected(),
            audio_active: self.audio_active(),
            detection_enabled: mode.detection_enabled,
            keybind_enabled: mode.keybind_enabled,
            manual_override: mode.manual_override,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_combines_mode() {
        let board = StatusBoard::new();
        let mode = ModeController::new(true, false);
        board.set_phone_detected(true);
        mode.set_manual_override(ManualOverride::On);

        let status = board.snapshot(&mode);
        assert!(status.phone_detected);
        assert!(!status.audio_active);
        assert!(status.detection_enabled);
        assert!(!status.keybind_enabled);
        assert_eq!(status.manual_override, ManualOverride::On);
    }

    #[test]
    fn test_events_order() {
        let board = StatusBoard::new();
        let mode = ModeController::new(false, true);
        let lines: Vec<String> = board
            .snapshot(&mode)
            .events()
            .iter()
            .map(|e| e.to_string())
            .collect();
        assert_eq!(
            lines,
            vec![
                "STATUS:detection_enabled:False",
                "STATUS:phone_detected:False",
                "STATUS:audio_active:False",
                "STATUS:keybind_enabled:True",
                "STATUS:manual_override:None",
            ]
        );
    }

    #[test]
    fn test_diff_reports_changed_fields() {
        let board = StatusBoard::new();
        let mode = ModeController::new(false, true);
        let before = board.snapshot(&mode);

        assert!(!board.set_audio_active(true));
        mode.set_detection_enabled(true);
        let after = board.snapshot(&mode);

        let changed: Vec<StatusField> = after.diff(&before).iter().map(|e| e.field).collect();
        assert_eq!(
            changed,
            vec![StatusField::DetectionEnabled, StatusField::AudioActive]
        );
        assert!(after.diff(&after).is_empty());
    }
}
