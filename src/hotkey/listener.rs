//! Global hotkey listener using macOS CGEventTap
//!
//! Runs on a dedicated thread with its own CFRunLoop and dispatches each
//! recognised chord synchronously to the [`HotkeyHandler`]. Other
//! platforms have no listener.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::keys::HotkeyAction;

/// Receives hotkey presses on the listener thread
pub trait HotkeyHandler: Send + Sync + 'static {
    fn on_hotkey(&self, action: HotkeyAction);
}

/// Errors that can occur in the hotkey listener
#[derive(Debug, thiserror::Error)]
pub enum HotkeyError {
    #[error("hotkey listener is already running")]
    AlreadyRunning,

    #[error("failed to create event tap - check Accessibility permissions")]
    EventTapCreation,

    #[error("failed to attach event tap to the run loop")]
    RunLoopSource,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),

    #[error("global hotkeys are not supported on this platform")]
    Unsupported,
}

pub struct HotkeyListener {
    handler: Arc<dyn HotkeyHandler>,
    running: Arc<AtomicBool>,
}

impl HotkeyListener {
    pub fn new(handler: Arc<dyn HotkeyHandler>) -> Self {
        Self {
            handler,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start listening on a dedicated thread until [`stop`](Self::stop)
    #[cfg(target_os = "macos")]
    pub fn start(&self) -> Result<(), HotkeyError> {
        use tracing::{error, info};

        if self.running.swap(true, Ordering::SeqCst) {
            return Err(HotkeyError::AlreadyRunning);
        }

        let handler = Arc::clone(&self.handler);
        let running = Arc::clone(&self.running);

        let spawned = std::thread::Builder::new()
            .name("hotkey-listener".to_string())
            .spawn(move || {
                info!("hotkey listener thread started");

                if let Err(e) = mac::run_event_loop(handler.as_ref(), &running) {
                    error!(?e, "hotkey listener error");
                }

                running.store(false, Ordering::SeqCst);
                info!("hotkey listener thread stopped");
            });

        if let Err(e) = spawned {
            self.running.store(false, Ordering::SeqCst);
            return Err(HotkeyError::ThreadSpawn(e.to_string()));
        }
        Ok(())
    }

    #[cfg(not(target_os = "macos"))]
    pub fn start(&self) -> Result<(), HotkeyError> {
        let _ = &self.handler;
        Err(HotkeyError::Unsupported)
    }

    /// Ask the listener thread to leave its run loop
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(target_os = "macos")]
mod mac {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
    use core_graphics::event::{
        CGEvent, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
        CGEventTapProxy, CGEventType, EventField,
    };
    use tracing::{debug, error, info, warn};

    use super::super::keys::{match_chord, ModifierState};
    use super::{HotkeyError, HotkeyHandler};

    pub(super) fn run_event_loop(
        handler: &dyn HotkeyHandler,
        running: &AtomicBool,
    ) -> Result<(), HotkeyError> {
        let (press_tx, press_rx) = std::sync::mpsc::channel::<(u16, ModifierState)>();

        // Must stay fast; the chord is handled on the loop below
        let callback = move |_proxy: CGEventTapProxy,
                             event_type: CGEventType,
                             event: &CGEvent|
              -> Option<CGEvent> {
            match event_type {
                CGEventType::KeyDown => {
                    let repeat =
                        event.get_integer_value_field(EventField::KEYBOARD_EVENT_AUTOREPEAT);
                    if repeat == 0 {
                        let keycode =
                            event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE);
                        let modifiers = ModifierState::from_flags(event.get_flags());
                        let _ = press_tx.send((keycode as u16, modifiers));
                    }
                }
                CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
                    warn!("event tap disabled by the system");
                }
                _ => {}
            }
            Some(event.clone())
        };

        let tap = CGEventTap::new(
            CGEventTapLocation::Session,
            CGEventTapPlacement::HeadInsertEventTap,
            CGEventTapOptions::ListenOnly,
            vec![CGEventType::KeyDown],
            callback,
        )
        .map_err(|_| {
            error!("failed to create event tap - is Accessibility permission granted?");
            HotkeyError::EventTapCreation
        })?;

        tap.enable();

        let run_loop_source = tap
            .mach_port
            .create_runloop_source(0)
            .map_err(|_| HotkeyError::RunLoopSource)?;
        let run_loop = CFRunLoop::get_current();

        unsafe {
            run_loop.add_source(&run_loop_source, kCFRunLoopCommonModes);
        }

        info!("event tap created and enabled");

        while running.load(Ordering::SeqCst) {
            unsafe {
                CFRunLoop::run_in_mode(kCFRunLoopDefaultMode, Duration::from_millis(100), true);
            }

            while let Ok((keycode, modifiers)) = press_rx.try_recv() {
                if let Some(action) = match_chord(keycode, modifiers) {
                    debug!(?action, "hotkey pressed");
                    handler.on_hotkey(action);
                }
            }
        }

        Ok(())
    }
}
