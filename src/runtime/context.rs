//! State shared by every thread, built once in `main`

use std::sync::Arc;

use crate::arbitration::Resolver;
use crate::lifecycle::RunFlag;
use crate::resources::ResourceRequests;
use crate::state::{AppStatus, ModeController, StatusBoard};

pub struct SharedContext {
    pub mode: Arc<ModeController>,
    pub status: Arc<StatusBoard>,
    pub resolver: Arc<Resolver>,
    pub requests: Arc<ResourceRequests>,
    pub running: RunFlag,
}

impl SharedContext {
    pub fn snapshot(&self) -> AppStatus {
        self.status.snapshot(&self.mode)
    }
}
