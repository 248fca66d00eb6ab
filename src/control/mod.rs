//! Control inputs from the parent process
//!
//! - `protocol`: closed command type parsed from each input line
//! - `controller`: applies commands and hotkey actions to shared state
//! - `reader`: blocking stdin reader thread
//! - `publisher`: `STATUS:` line output and the periodic publisher

mod controller;
mod protocol;
mod publisher;
mod reader;

pub use controller::Controller;
pub use publisher::{StatusEmitter, StatusPublisher};
pub use reader::spawn_reader;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("control channel closed")]
    ChannelClosed,

    #[error("control channel I/O failed: {0}")]
    Io(#[from] std::io::Error),
}
