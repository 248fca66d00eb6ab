//! Audio-route actuator and the bridge that serializes access to it
//!
//! The platform binding has thread affinity, so every call into it runs on
//! one dedicated single-threaded executor owned by [`ActuatorBridge`].
//! Other threads only ever call the non-blocking [`ActionSink::submit`].

mod bridge;
mod command;
mod connection;
mod device;

pub use bridge::ActuatorBridge;
pub use command::CommandActuator;
pub use device::DeviceId;

use tokio::sync::mpsc;

/// Operations the bridge accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Connect,
    Disconnect,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Connect => write!(f, "connect"),
            Action::Disconnect => write!(f, "disconnect"),
        }
    }
}

/// Entry point other threads use to request an actuator operation
pub trait ActionSink: Send + Sync {
    /// Enqueue `action` without waiting for it. Returns `false` when the
    /// request was rejected because another operation is still in flight.
    fn submit(&self, action: Action) -> bool;

    /// Whether the route is up once no operation is pending. `None` while
    /// an operation is in flight or the state cannot be observed.
    fn settled(&self) -> Option<bool> {
        None
    }
}

/// Sink used when no actuator is configured; rejects everything
#[derive(Debug, Default)]
pub struct DisabledSink;

impl ActionSink for DisabledSink {
    fn submit(&self, action: Action) -> bool {
        tracing::debug!(%action, "audio control unavailable, request dropped");
        false
    }

    fn settled(&self) -> Option<bool> {
        Some(false)
    }
}

/// State changes reported by the actuator outside of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorNotice {
    Opened,
    Closed,
}

/// Handle the actuator uses to report state changes to the bridge
pub type NoticeSender = mpsc::UnboundedSender<ActuatorNotice>;

/// Platform audio-route binding
///
/// Implementations are created and used on the bridge's own context only,
/// so they need not be `Send`.
#[allow(async_fn_in_trait)]
pub trait Actuator {
    /// Map a stable address to the runtime device handle
    async fn resolve_device_id(&mut self, address: &str) -> Option<DeviceId>;

    /// Open the audio route to `device`
    async fn connect(&mut self, device: &DeviceId) -> Result<(), ActuatorError>;

    /// Close the current audio route
    async fn disconnect(&mut self) -> Result<(), ActuatorError>;
}

/// Errors raised while driving the actuator
#[derive(Debug, Clone, thiserror::Error)]
pub enum ActuatorError {
    #[error("no device found for address {0}")]
    ResolutionFailed(String),

    #[error("actuator operation failed: {0}")]
    OperationFailed(String),

    #[error("actuator operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("actuator context unavailable: {0}")]
    ContextUnavailable(String),
}
