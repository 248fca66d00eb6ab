//! Status line output and the periodic status publisher

use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::events::{StatusEvent, StatusField};
use crate::lifecycle::RunFlag;
use crate::state::{AppStatus, ModeController, StatusBoard};

struct EmitterInner {
    out: Box<dyn Write + Send>,
    last: Option<AppStatus>,
}

/// Writes `STATUS:` lines and remembers what observers last saw
pub struct StatusEmitter {
    inner: Mutex<EmitterInner>,
}

impl StatusEmitter {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Mutex::new(EmitterInner { out, last: None }),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(io::stdout()))
    }

    /// Emit fields changed since the last emission (everything the first time)
    pub fn publish(&self, status: AppStatus) -> io::Result<usize> {
        self.publish_with(status, &[])
    }

    /// Emit every field
    pub fn publish_all(&self, status: AppStatus) -> io::Result<usize> {
        self.publish_with(status, &StatusField::ALL)
    }

    /// Emit changed fields plus `always`, whether or not they changed
    pub fn publish_with(&self, status: AppStatus, always: &[StatusField]) -> io::Result<usize> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "status emitter poisoned"))?;

        let mut events: Vec<StatusEvent> = match inner.last {
            Some(previous) => status.diff(&previous),
            None => status.events(),
        };
        for field in always {
            if !events.iter().any(|event| event.field == *field) {
                events.push(status.event(*field));
            }
        }

        for event in &events {
            writeln!(inner.out, "{}", event)?;
        }
        inner.out.flush()?;
        inner.last = Some(status);
        Ok(events.len())
    }
}

/// Periodically publishes status changes on a dedicated thread
pub struct StatusPublisher {
    handle: JoinHandle<()>,
}

impl StatusPublisher {
    pub fn spawn(
        emitter: Arc<StatusEmitter>,
        mode: Arc<ModeController>,
        status: Arc<StatusBoard>,
        interval: Duration,
        running: RunFlag,
    ) -> io::Result<Self> {
        let handle = thread::Builder::new()
            .name("status-publisher".to_string())
            .spawn(move || {
                info!("status publisher started");
                while running.sleep(interval) {
                    match emitter.publish(status.snapshot(&mode)) {
                        Ok(0) => {}
                        Ok(count) => debug!(count, "published status changes"),
                        Err(e) => {
                            // Parent closed our stdout; nobody is listening
                            warn!(?e, "status output failed, stopping publisher");
                            break;
                        }
                    }
                }
                info!("status publisher stopped");
            })?;
        Ok(Self { handle })
    }

    pub fn join(self) {
        if self.handle.join().is_err() {
            warn!("status publisher panicked");
        }
    }
}
