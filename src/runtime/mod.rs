//! Shared context and the main detection cycle

mod context;
mod cycle;

pub use context::SharedContext;
pub use cycle::DetectionCycle;
