//! Applies control commands and hotkey presses to the shared state
//!
//! The command reader owns the detection and keybind flags; the hotkey
//! listener owns the override. Both land here so each mutation is followed
//! by the same resolver pass and status reply.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::actuator::Action;
use crate::config::SettingsStore;
use crate::events::StatusField;
use crate::hotkey::{HotkeyAction, HotkeyHandler};
use crate::runtime::SharedContext;
use crate::state::ManualOverride;

use super::protocol::ControlCommand;
use super::publisher::StatusEmitter;

/// What the reader should do after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Controller {
    ctx: Arc<SharedContext>,
    settings: SettingsStore,
    emitter: Arc<StatusEmitter>,
}

impl Controller {
    pub fn new(ctx: Arc<SharedContext>, settings: SettingsStore, emitter: Arc<StatusEmitter>) -> Self {
        Self {
            ctx,
            settings,
            emitter,
        }
    }

    pub fn apply(&self, command: ControlCommand) -> Flow {
        debug!(?command, "control command");
        match command {
            ControlCommand::ToggleDetection => {
                self.ctx.mode.toggle_detection();
                self.reply(&[StatusField::DetectionEnabled]);
            }
            ControlCommand::ToggleAudio => self.toggle_audio(),
            ControlCommand::DisconnectAudio => {
                self.ctx.mode.set_manual_override(ManualOverride::Off);
                self.ctx.resolver.request(Action::Disconnect);
            }
            ControlCommand::GetStatus => {
                if let Err(e) = self.emitter.publish_all(self.ctx.snapshot()) {
                    warn!(?e, "failed to write status reply");
                }
            }
            ControlCommand::SetKeybindEnabled(enabled) => {
                let previous = self.ctx.mode.set_keybind_enabled(enabled);
                if previous != enabled {
                    // Masking or unmasking the override changes the decision
                    self.ctx.resolver.run_event();
                }
            }
            ControlCommand::SetAutoEnabled(enabled) => {
                self.ctx.mode.set_detection_enabled(enabled);
            }
            ControlCommand::SetCaptureIndex(index) => self.set_capture_index(index),
            ControlCommand::ClearManualOverride => {
                self.ctx.mode.clear_manual_override();
                self.ctx.resolver.run_event();
            }
            ControlCommand::Exit => {
                info!("exit requested");
                self.ctx.running.stop();
                return Flow::Exit;
            }
        }
        Flow::Continue
    }

    /// Connect if off, disconnect if on. The choice becomes the override.
    fn toggle_audio(&self) {
        if !self.ctx.mode.keybind_enabled() {
            info!("keybind mode disabled, ignoring audio toggle");
            return;
        }

        let (manual, action) = if self.ctx.status.audio_active() {
            (ManualOverride::Off, Action::Disconnect)
        } else {
            (ManualOverride::On, Action::Connect)
        };
        info!(%action, "audio toggled");
        self.ctx.mode.set_manual_override(manual);

        let decision = self.ctx.resolver.run_event();
        if decision.as_action() != Some(action) {
            self.ctx.resolver.request(action);
        }
    }

    fn set_capture_index(&self, index: u32) {
        info!(index, "capture index requested");
        self.ctx.requests.set_capture_index(index);
        self.ctx.requests.request_release();
        if let Err(e) = self.settings.store_capture_index(index) {
            warn!(?e, path = ?self.settings.path(), "failed to persist capture index");
        }
    }

    fn reply(&self, fields: &[StatusField]) {
        if let Err(e) = self.emitter.publish_with(self.ctx.snapshot(), fields) {
            warn!(?e, "failed to write status reply");
        }
    }
}

impl HotkeyHandler for Controller {
    fn on_hotkey(&self, action: HotkeyAction) {
        match action {
            HotkeyAction::ToggleOverride => self.toggle_audio(),
            HotkeyAction::ToggleDetection => {
                self.ctx.mode.toggle_detection();
            }
        }
    }
}
