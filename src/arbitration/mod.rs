//! Priority resolver between the automatic signal and the manual override
//!
//! Rules, in order:
//! 1. A disabled keybind masks the override
//! 2. Override `On` connects unless already connected, ignoring detection
//! 3. Override `Off` falls through to the automatic rule
//! 4. Automatic: connect on a stable positive, disconnect on a stable
//!    negative, only while detection and audio are both available

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::actuator::{Action, ActionSink};
use crate::state::{ManualOverride, ModeController, ModeState, StatusBoard};

/// Decision for one resolver pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesiredAction {
    Connect,
    Disconnect,
    NoChange,
}

impl DesiredAction {
    pub fn as_action(self) -> Option<Action> {
        match self {
            DesiredAction::Connect => Some(Action::Connect),
            DesiredAction::Disconnect => Some(Action::Disconnect),
            DesiredAction::NoChange => None,
        }
    }
}

/// Everything a resolver pass looks at
#[derive(Debug, Clone, Copy)]
pub struct ResolveInputs {
    pub mode: ModeState,
    pub audio_available: bool,
    /// Debounced signal, `None` until fresh samples reach a threshold
    pub stable: Option<bool>,
    pub connected: bool,
}

/// Pure priority rules
pub fn resolve(inputs: &ResolveInputs) -> DesiredAction {
    match inputs.mode.effective_override() {
        ManualOverride::On => {
            if inputs.connected {
                DesiredAction::NoChange
            } else {
                DesiredAction::Connect
            }
        }
        ManualOverride::Off | ManualOverride::None => automatic(inputs),
    }
}

fn automatic(inputs: &ResolveInputs) -> DesiredAction {
    if !inputs.mode.detection_enabled || !inputs.audio_available {
        return DesiredAction::NoChange;
    }
    match (inputs.stable, inputs.connected) {
        (Some(true), false) => DesiredAction::Connect,
        (Some(false), true) => DesiredAction::Disconnect,
        _ => DesiredAction::NoChange,
    }
}

/// Runs the rules against live state and forwards decisions to the actuator
pub struct Resolver {
    mode: Arc<ModeController>,
    status: Arc<StatusBoard>,
    sink: Arc<dyn ActionSink>,
    audio_available: bool,
    /// Last stable signal published by the detection cycle
    stable: AtomicU8,
}

const STABLE_UNKNOWN: u8 = 0;
const STABLE_LOW: u8 = 1;
const STABLE_HIGH: u8 = 2;

fn encode_stable(stable: Option<bool>) -> u8 {
    match stable {
        None => STABLE_UNKNOWN,
        Some(false) => STABLE_LOW,
        Some(true) => STABLE_HIGH,
    }
}

fn decode_stable(raw: u8) -> Option<bool> {
    match raw {
        STABLE_LOW => Some(false),
        STABLE_HIGH => Some(true),
        _ => None,
    }
}

impl Resolver {
    pub fn new(
        mode: Arc<ModeController>,
        status: Arc<StatusBoard>,
        sink: Arc<dyn ActionSink>,
        audio_available: bool,
    ) -> Self {
        Self {
            mode,
            status,
            sink,
            audio_available,
            stable: AtomicU8::new(STABLE_LOW),
        }
    }

    /// Pass driven by the detection cycle with its fresh stable signal
    pub fn run_cycle(&self, stable: Option<bool>) -> DesiredAction {
        self.stable.store(encode_stable(stable), Ordering::SeqCst);
        self.evaluate()
    }

    /// Drop the last stable signal; the automatic rule holds until the
    /// detection cycle publishes a fresh one
    pub fn forget_stable(&self) {
        self.stable.store(STABLE_UNKNOWN, Ordering::SeqCst);
    }

    /// Copy the actuator's settled connection into `audio_active`
    pub fn sync_connection(&self) {
        if let Some(connected) = self.sink.settled() {
            if self.status.audio_active() != connected {
                debug!(connected, "audio state resynced from actuator");
                self.status.set_audio_active(connected);
            }
        }
    }

    /// Pass driven by an override-changing event on another thread
    pub fn run_event(&self) -> DesiredAction {
        self.evaluate()
    }

    fn evaluate(&self) -> DesiredAction {
        let inputs = ResolveInputs {
            mode: self.mode.snapshot(),
            audio_available: self.audio_available,
            stable: decode_stable(self.stable.load(Ordering::SeqCst)),
            connected: self.status.audio_active(),
        };
        let decision = resolve(&inputs);
        if let Some(action) = decision.as_action() {
            debug!(?inputs, ?decision, "resolver decision");
            self.request(action);
        }
        decision
    }

    /// Submit `action` with `audio_active` updated ahead of the actuator's
    /// confirmation. The bit is written before the submit so the actuator's
    /// own correction always lands after it; a rejection restores it.
    pub fn request(&self, action: Action) -> bool {
        let previous = self.status.audio_active();
        self.status.set_audio_active(action == Action::Connect);
        let accepted = self.sink.submit(action);
        if accepted {
            info!(%action, "actuator action submitted");
        } else {
            self.status.set_audio_active(previous);
        }
        accepted
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Mutex;

    /// Records submissions; accepts everything unless told otherwise
    #[derive(Default)]
    pub(crate) struct RecordingSink {
        pub submitted: Mutex<Vec<Action>>,
        pub reject: AtomicBool,
    }

    impl RecordingSink {
        pub(crate) fn actions(&self) -> Vec<Action> {
            self.submitted.lock().unwrap().clone()
        }
    }

    impl ActionSink for RecordingSink {
        fn submit(&self, action: Action) -> bool {
            if self.reject.load(Ordering::SeqCst) {
                return false;
            }
            self.submitted.lock().unwrap().push(action);
            true
        }
    }

    fn inputs(
        detection_enabled: bool,
        keybind_enabled: bool,
        manual_override: ManualOverride,
        stable: bool,
        connected: bool,
    ) -> ResolveInputs {
        ResolveInputs {
            mode: ModeState {
                detection_enabled,
                keybind_enabled,
                manual_override,
            },
            audio_available: true,
            stable: Some(stable),
            connected,
        }
    }

    #[test]
    fn test_override_on_ignores_signal() {
        for stable in [false, true] {
            let i = inputs(true, true, ManualOverride::On, stable, false);
            assert_eq!(resolve(&i), DesiredAction::Connect);
            let i = inputs(false, true, ManualOverride::On, stable, false);
            assert_eq!(resolve(&i), DesiredAction::Connect);
            let i = inputs(true, true, ManualOverride::On, stable, true);
            assert_eq!(resolve(&i), DesiredAction::NoChange);
        }
    }

    #[test]
    fn test_override_off_follows_automatic() {
        let off = ManualOverride::Off;
        assert_eq!(resolve(&inputs(true, true, off, true, false)), DesiredAction::Connect);
        assert_eq!(resolve(&inputs(true, true, off, false, true)), DesiredAction::Disconnect);
        assert_eq!(resolve(&inputs(true, true, off, false, false)), DesiredAction::NoChange);
        assert_eq!(resolve(&inputs(true, true, off, true, true)), DesiredAction::NoChange);
    }

    #[test]
    fn test_keybind_disabled_matches_no_override() {
        for manual in [ManualOverride::None, ManualOverride::On, ManualOverride::Off] {
            for stable in [false, true] {
                for connected in [false, true] {
                    let masked = inputs(true, false, manual, stable, connected);
                    let plain = inputs(true, true, ManualOverride::None, stable, connected);
                    assert_eq!(resolve(&masked), resolve(&plain));
                }
            }
        }
    }

    #[test]
    fn test_automatic_gated_by_detection_and_audio() {
        let none = ManualOverride::None;
        assert_eq!(resolve(&inputs(false, true, none, true, false)), DesiredAction::NoChange);
        assert_eq!(resolve(&inputs(false, true, none, false, true)), DesiredAction::NoChange);

        let mut i = inputs(true, true, none, true, false);
        i.audio_available = false;
        assert_eq!(resolve(&i), DesiredAction::NoChange);
    }

    fn resolver(sink: &Arc<RecordingSink>) -> (Resolver, Arc<ModeController>, Arc<StatusBoard>) {
        let mode = Arc::new(ModeController::new(true, true));
        let status = Arc::new(StatusBoard::new());
        let resolver = Resolver::new(
            Arc::clone(&mode),
            Arc::clone(&status),
            Arc::clone(sink) as Arc<dyn ActionSink>,
            true,
        );
        (resolver, mode, status)
    }

    #[test]
    fn test_accepted_action_updates_status() {
        let sink = Arc::new(RecordingSink::default());
        let (resolver, _, status) = resolver(&sink);

        assert_eq!(resolver.run_cycle(Some(true)), DesiredAction::Connect);
        assert!(status.audio_active());
        assert_eq!(resolver.run_cycle(Some(true)), DesiredAction::NoChange);
        assert_eq!(sink.actions(), vec![Action::Connect]);

        assert_eq!(resolver.run_cycle(Some(false)), DesiredAction::Disconnect);
        assert!(!status.audio_active());
    }

    #[test]
    fn test_rejected_action_leaves_status() {
        let sink = Arc::new(RecordingSink::default());
        sink.reject.store(true, Ordering::SeqCst);
        let (resolver, _, status) = resolver(&sink);

        assert_eq!(resolver.run_cycle(Some(true)), DesiredAction::Connect);
        assert!(!status.audio_active());
        assert_eq!(resolver.run_cycle(Some(true)), DesiredAction::Connect);
    }

    #[test]
    fn test_event_pass_uses_last_stable() {
        let sink = Arc::new(RecordingSink::default());
        let (resolver, mode, _) = resolver(&sink);

        mode.set_detection_enabled(false);
        resolver.run_cycle(Some(true));
        assert!(sink.actions().is_empty());

        mode.set_detection_enabled(true);
        assert_eq!(resolver.run_event(), DesiredAction::Connect);
    }

    #[test]
    fn test_unknown_stable_holds_automatic() {
        for connected in [false, true] {
            let mut i = inputs(true, true, ManualOverride::None, false, connected);
            i.stable = None;
            assert_eq!(resolve(&i), DesiredAction::NoChange);
        }
        let mut i = inputs(true, true, ManualOverride::On, false, false);
        i.stable = None;
        assert_eq!(resolve(&i), DesiredAction::Connect);
    }

    #[test]
    fn test_forgotten_stable_not_reused_by_events() {
        let sink = Arc::new(RecordingSink::default());
        let (resolver, _, status) = resolver(&sink);

        resolver.run_cycle(Some(true));
        assert_eq!(sink.actions(), vec![Action::Connect]);
        resolver.forget_stable();
        status.set_audio_active(false);
        assert_eq!(resolver.run_event(), DesiredAction::NoChange);
        assert_eq!(sink.actions(), vec![Action::Connect]);
    }

    /// Sink reporting a fixed settled state
    struct SettledSink(Option<bool>);

    impl ActionSink for SettledSink {
        fn submit(&self, _action: Action) -> bool {
            false
        }

        fn settled(&self) -> Option<bool> {
            self.0
        }
    }

    #[test]
    fn test_sync_connection_follows_settled_state() {
        let mode = Arc::new(ModeController::new(true, true));
        let status = Arc::new(StatusBoard::new());

        status.set_audio_active(true);
        let idle_down = Resolver::new(
            Arc::clone(&mode),
            Arc::clone(&status),
            Arc::new(SettledSink(Some(false))),
            true,
        );
        idle_down.sync_connection();
        assert!(!status.audio_active());

        status.set_audio_active(true);
        let busy = Resolver::new(
            Arc::clone(&mode),
            Arc::clone(&status),
            Arc::new(SettledSink(None)),
            true,
        );
        busy.sync_connection();
        assert!(status.audio_active());
    }
}
