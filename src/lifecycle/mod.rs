//! Process lifecycle: the shared running flag and signal handling

mod shutdown;

pub use shutdown::{RunFlag, ShutdownSignal};
