//! Shared mode and status state
//!
//! - `ModeController`: detection, keybind and manual-override fields,
//!   one writer per field
//! - `StatusBoard`: phone/audio bits that, with the mode, make up the
//!   `AppStatus` snapshot seen by observers

mod mode;
mod status;

pub use mode::{ManualOverride, ModeController, ModeState};
pub use status::{AppStatus, StatusBoard};
