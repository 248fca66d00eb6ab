//! Connection state machine owned by the actuator context
//!
//! ```text
//! Disconnected --connect--> Connecting --ok--> Connected
//! Connecting --err--> Disconnected
//! Connected --disconnect--> Disconnecting --ok/err--> Disconnected
//! any --Closed notice--> Disconnected
//! ```
//!
//! Every transition is mirrored into a [`ConnectionCell`] for readers on
//! other threads, and settled states correct `AppStatus.audio_active`.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use crate::state::StatusBoard;

use super::ActuatorNotice;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl ConnectionState {
    fn to_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Disconnecting => 3,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Disconnecting,
            _ => ConnectionState::Disconnected,
        }
    }

    /// Whether `self -> to` is an edge of the machine. Forced closes are
    /// always allowed.
    pub fn can_transition(self, to: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, to),
            (Disconnected, Connecting)
                | (Connecting, Connected)
                | (Connecting, Disconnected)
                | (Connected, Disconnecting)
                | (Disconnecting, Disconnected)
                | (Connected, Disconnected)
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connecting => write!(f, "Connecting"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Disconnecting => write!(f, "Disconnecting"),
        }
    }
}

/// Read-only view of the machine for other threads
#[derive(Debug, Default)]
pub struct ConnectionCell {
    state: AtomicU8,
    last_failure: Mutex<Option<String>>,
}

impl ConnectionCell {
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Reason of the most recent failed operation, cleared on success
    pub fn last_failure(&self) -> Option<String> {
        self.last_failure
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn store(&self, state: ConnectionState) {
        self.state.store(state.to_u8(), Ordering::SeqCst);
    }

    fn record_failure(&self, reason: Option<String>) {
        if let Ok(mut guard) = self.last_failure.lock() {
            *guard = reason;
        }
    }
}

/// The machine itself. Lives on the actuator context only.
#[derive(Debug)]
pub struct ConnectionMachine {
    state: ConnectionState,
    cell: Arc<ConnectionCell>,
    status: Arc<StatusBoard>,
}

impl ConnectionMachine {
    pub fn new(cell: Arc<ConnectionCell>, status: Arc<StatusBoard>) -> Self {
        cell.store(ConnectionState::Disconnected);
        Self {
            state: ConnectionState::Disconnected,
            cell,
            status,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn transition(&mut self, to: ConnectionState) {
        let from = self.state;
        if from == to {
            self.publish();
            return;
        }
        if !from.can_transition(to) {
            warn!(%from, %to, "unexpected connection transition");
        }
        info!(%from, %to, "connection state");
        self.state = to;
        self.cell.store(to);
        self.publish();
    }

    /// Operation succeeded and settled in `to`
    pub fn succeed(&mut self, to: ConnectionState) {
        self.cell.record_failure(None);
        self.transition(to);
    }

    /// Operation failed; the machine always settles to `Disconnected`
    pub fn fail(&mut self, reason: String) {
        warn!(state = %self.state, %reason, "actuator operation failed");
        self.cell.record_failure(Some(reason));
        self.transition(ConnectionState::Disconnected);
    }

    pub fn apply_notice(&mut self, notice: ActuatorNotice) {
        match notice {
            ActuatorNotice::Closed => {
                if self.state != ConnectionState::Disconnected {
                    info!(state = %self.state, "actuator reported close");
                    self.transition(ConnectionState::Disconnected);
                } else {
                    self.publish();
                }
            }
            ActuatorNotice::Opened => {
                if self.state == ConnectionState::Connecting {
                    self.transition(ConnectionState::Connected);
                } else {
                    debug!(state = %self.state, "ignoring open notice");
                }
            }
        }
    }

    /// Correct the optimistic status bit from a settled state
    fn publish(&self) {
        match self.state {
            ConnectionState::Connected => {
                self.status.set_audio_active(true);
            }
            ConnectionState::Disconnected => {
                self.status.set_audio_active(false);
            }
            ConnectionState::Connecting | ConnectionState::Disconnecting => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> (ConnectionMachine, Arc<ConnectionCell>, Arc<StatusBoard>) {
        let cell = Arc::new(ConnectionCell::default());
        let status = Arc::new(StatusBoard::new());
        (
            ConnectionMachine::new(Arc::clone(&cell), Arc::clone(&status)),
            cell,
            status,
        )
    }

    #[test]
    fn test_connect_cycle() {
        let (mut m, cell, status) = machine();
        m.transition(ConnectionState::Connecting);
        assert_eq!(cell.state(), ConnectionState::Connecting);
        m.succeed(ConnectionState::Connected);
        assert_eq!(cell.state(), ConnectionState::Connected);
        assert!(status.audio_active());
    }

    #[test]
    fn test_connecting_keeps_optimistic_bit() {
        let (mut m, _, status) = machine();
        status.set_audio_active(true);
        m.transition(ConnectionState::Connecting);
        assert!(status.audio_active());
    }

    #[test]
    fn test_failure_settles_disconnected() {
        let (mut m, cell, status) = machine();
        status.set_audio_active(true);
        m.transition(ConnectionState::Connecting);
        m.fail("open refused".to_string());
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert!(!status.audio_active());
        assert_eq!(cell.last_failure().as_deref(), Some("open refused"));

        m.transition(ConnectionState::Connecting);
        m.succeed(ConnectionState::Connected);
        assert_eq!(cell.last_failure(), None);
    }

    #[test]
    fn test_close_notice_forces_disconnected() {
        for start in [
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Disconnecting,
        ] {
            let (mut m, _, status) = machine();
            m.state = start;
            m.apply_notice(ActuatorNotice::Closed);
            assert_eq!(m.state(), ConnectionState::Disconnected);
            assert!(!status.audio_active());
        }
    }

    #[test]
    fn test_open_notice_only_while_connecting() {
        let (mut m, _, _) = machine();
        m.apply_notice(ActuatorNotice::Opened);
        assert_eq!(m.state(), ConnectionState::Disconnected);
        m.transition(ConnectionState::Connecting);
        m.apply_notice(ActuatorNotice::Opened);
        assert_eq!(m.state(), ConnectionState::Connected);
    }

    #[test]
    fn test_transition_table() {
        use ConnectionState::*;
        assert!(Disconnected.can_transition(Connecting));
        assert!(Disconnecting.can_transition(Disconnected));
        assert!(!Disconnected.can_transition(Connected));
        assert!(!Connected.can_transition(Connecting));
    }
}
