//! Main detection cycle
//!
//! Each pass: honour the detection flag, apply pending resource requests,
//! read one frame, debounce it, and hand the stable signal to the
//! resolver. Never waits on the actuator.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::arbitration::DesiredAction;
use crate::config::Tuning;
use crate::debounce::DebounceEngine;
use crate::resources::ResourceManager;

use super::context::SharedContext;

pub struct DetectionCycle {
    ctx: Arc<SharedContext>,
    resources: ResourceManager,
    debounce: DebounceEngine,
    tuning: Tuning,
    was_enabled: bool,
    degraded: bool,
}

impl DetectionCycle {
    pub fn new(ctx: Arc<SharedContext>, resources: ResourceManager, tuning: Tuning) -> Self {
        Self {
            ctx,
            resources,
            debounce: DebounceEngine::new(tuning.trigger_frames, tuning.idle_frames),
            tuning,
            was_enabled: false,
            degraded: false,
        }
    }

    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("detection-cycle".to_string())
            .spawn(move || self.run())
    }

    fn run(mut self) {
        info!("detection cycle started");
        let running = self.ctx.running.clone();
        while running.is_running() {
            let wait = self.step();
            if !running.sleep(wait) {
                break;
            }
        }
        self.resources.release_all();
        info!("detection cycle stopped");
    }

    /// One pass. Returns how long to wait before the next.
    pub fn step(&mut self) -> Duration {
        self.ctx.resolver.sync_connection();

        if !self.ctx.mode.detection_enabled() {
            self.idle();
            return self.tuning.disabled_wait;
        }

        if !self.was_enabled {
            info!("detection enabled, acquiring resources");
            self.was_enabled = true;
        }
        self.apply_requests();

        match self.resources.sample() {
            Ok(Some(sample)) => {
                if self.degraded {
                    info!("detection resources available");
                    self.degraded = false;
                }
                self.feed(sample);
                self.tuning.cycle_interval
            }
            Ok(None) => self.tuning.cycle_interval,
            Err(e) => {
                if self.degraded {
                    debug!(%e, "detection still unavailable");
                } else {
                    warn!(%e, "detection unavailable, retrying");
                    self.degraded = true;
                }
                self.tuning.retry_wait
            }
        }
    }

    /// Detection off: nothing held, counters cleared, stable frozen
    fn idle(&mut self) {
        if self.was_enabled {
            info!("detection disabled, releasing resources");
            self.was_enabled = false;
        }
        self.resources.release_all();
        self.resources
            .set_capture_index(self.ctx.requests.capture_index());
        self.ctx.requests.take_release();
        self.debounce.reset_counters();
        self.ctx.resolver.forget_stable();
        self.degraded = false;
    }

    fn apply_requests(&mut self) {
        self.resources
            .set_capture_index(self.ctx.requests.capture_index());
        if self.ctx.requests.take_release() {
            self.resources.release_capture();
        }
    }

    /// Debounce one sample and run the resolver on the result
    pub fn feed(&mut self, sample: bool) -> DesiredAction {
        self.ctx.status.set_phone_detected(sample);
        let before = self.debounce.stable();
        let stable = self.debounce.update(sample);
        if stable != before {
            info!(stable, "stable detection changed");
        }
        self.ctx.resolver.run_cycle(self.debounce.current())
    }
}
