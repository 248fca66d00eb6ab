//! Actuator bridge: dedicated execution context plus reentrancy guard
//!
//! One OS thread runs a current-thread tokio runtime for the lifetime of
//! the bridge. The actuator is constructed on that thread and never leaves
//! it. Requests arrive over an unbounded channel so `submit` never blocks;
//! a single in-flight flag rejects any request made before the previous
//! one finished, whatever its direction.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::state::StatusBoard;

use super::connection::{ConnectionCell, ConnectionMachine, ConnectionState};
use super::device::{DeviceAddress, DeviceId};
use super::{Action, ActionSink, Actuator, ActuatorError, ActuatorNotice, NoticeSender};

enum Request {
    Run(Action),
    Shutdown,
}

/// Handle to the actuator context. Cheap to share behind an `Arc`.
pub struct ActuatorBridge {
    request_tx: mpsc::UnboundedSender<Request>,
    in_flight: Arc<AtomicBool>,
    cell: Arc<ConnectionCell>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ActuatorBridge {
    /// Start the actuator context
    ///
    /// `make_actuator` runs on the new thread and receives the sender for
    /// state-change notices. `address` is the configured device address;
    /// without one every connect fails with a resolution error.
    pub fn spawn<A, F>(
        make_actuator: F,
        address: Option<String>,
        status: Arc<StatusBoard>,
        op_timeout: Duration,
    ) -> Result<Self, ActuatorError>
    where
        A: Actuator + 'static,
        F: FnOnce(NoticeSender) -> A + Send + 'static,
    {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let in_flight = Arc::new(AtomicBool::new(false));
        let cell = Arc::new(ConnectionCell::default());

        let worker_in_flight = Arc::clone(&in_flight);
        let worker_cell = Arc::clone(&cell);

        let thread = thread::Builder::new()
            .name("actuator".to_string())
            .spawn(move || {
                let runtime = match tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                {
                    Ok(runtime) => runtime,
                    Err(e) => {
                        error!(?e, "failed to build actuator runtime");
                        return;
                    }
                };

                let (notice_tx, notice_rx) = mpsc::unbounded_channel();
                let worker = Worker {
                    actuator: make_actuator(notice_tx),
                    machine: ConnectionMachine::new(worker_cell, status),
                    address: address.as_deref().and_then(DeviceAddress::parse),
                    device_id: None,
                    in_flight: worker_in_flight,
                    op_timeout,
                };

                info!("actuator context started");
                runtime.block_on(worker.run(request_rx, notice_rx));
                info!("actuator context stopped");
            })
            .map_err(|e| ActuatorError::ContextUnavailable(e.to_string()))?;

        Ok(Self {
            request_tx,
            in_flight,
            cell,
            thread: Mutex::new(Some(thread)),
        })
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.cell.state()
    }

    pub fn last_failure(&self) -> Option<String> {
        self.cell.last_failure()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Ask the context to stop and wait for it. An operation already in
    /// flight completes first.
    pub fn shutdown(&self) {
        let handle = match self.thread.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };
        let Some(handle) = handle else {
            return;
        };

        let _ = self.request_tx.send(Request::Shutdown);
        if handle.join().is_err() {
            error!("actuator thread panicked");
        }
    }
}

impl ActionSink for ActuatorBridge {
    fn submit(&self, action: Action) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!(%action, "actuator busy, request rejected");
            return false;
        }

        if self.request_tx.send(Request::Run(action)).is_err() {
            self.in_flight.store(false, Ordering::SeqCst);
            warn!(%action, "actuator context is gone, request dropped");
            return false;
        }

        debug!(%action, "actuator request accepted");
        true
    }

    fn settled(&self) -> Option<bool> {
        if self.is_busy() {
            return None;
        }
        let state = self.connection_state();
        // An operation may have started between the two reads
        if self.is_busy() {
            return None;
        }
        match state {
            ConnectionState::Connected => Some(true),
            ConnectionState::Disconnected => Some(false),
            ConnectionState::Connecting | ConnectionState::Disconnecting => None,
        }
    }
}

impl Drop for ActuatorBridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// State living on the actuator context
struct Worker<A> {
    actuator: A,
    machine: ConnectionMachine,
    address: Option<DeviceAddress>,
    device_id: Option<DeviceId>,
    in_flight: Arc<AtomicBool>,
    op_timeout: Duration,
}

impl<A: Actuator> Worker<A> {
    async fn run(
        mut self,
        mut requests: mpsc::UnboundedReceiver<Request>,
        mut notices: mpsc::UnboundedReceiver<ActuatorNotice>,
    ) {
        loop {
            tokio::select! {
                biased;

                Some(notice) = notices.recv() => {
                    self.machine.apply_notice(notice);
                }

                request = requests.recv() => match request {
                    Some(Request::Run(action)) => {
                        self.execute(action, &mut notices).await;
                        self.in_flight.store(false, Ordering::SeqCst);
                    }
                    Some(Request::Shutdown) | None => break,
                },
            }
        }

        if self.machine.state() == ConnectionState::Connected {
            info!("releasing audio route before shutdown");
            self.disconnect(&mut notices).await;
        }
    }

    async fn execute(
        &mut self,
        action: Action,
        notices: &mut mpsc::UnboundedReceiver<ActuatorNotice>,
    ) {
        info!(%action, state = %self.machine.state(), "running actuator operation");
        match action {
            Action::Connect => self.connect(notices).await,
            Action::Disconnect => self.disconnect(notices).await,
        }
    }

    async fn connect(&mut self, notices: &mut mpsc::UnboundedReceiver<ActuatorNotice>) {
        if self.machine.state() == ConnectionState::Connected {
            debug!("already connected");
            self.machine.succeed(ConnectionState::Connected);
            return;
        }

        let device = match self.resolve().await {
            Ok(device) => device,
            Err(e) => {
                self.machine.fail(e.to_string());
                return;
            }
        };

        self.machine.transition(ConnectionState::Connecting);
        let op_timeout = self.op_timeout;
        let result = {
            let Self {
                actuator, machine, ..
            } = &mut *self;
            drive(actuator.connect(&device), op_timeout, notices, machine).await
        };

        match result {
            Ok(()) => {
                info!(%device, "audio route connected");
                self.machine.succeed(ConnectionState::Connected);
            }
            Err(e) => {
                // A re-paired device gets a new id; look it up again next time
                if matches!(self.address, Some(DeviceAddress::Mac(_))) {
                    self.device_id = None;
                }
                self.machine.fail(e.to_string());
            }
        }
    }

    async fn disconnect(&mut self, notices: &mut mpsc::UnboundedReceiver<ActuatorNotice>) {
        if self.machine.state() == ConnectionState::Disconnected {
            debug!("not connected");
            self.machine.succeed(ConnectionState::Disconnected);
            return;
        }

        self.machine.transition(ConnectionState::Disconnecting);
        let op_timeout = self.op_timeout;
        let result = {
            let Self {
                actuator, machine, ..
            } = &mut *self;
            drive(actuator.disconnect(), op_timeout, notices, machine).await
        };

        match result {
            Ok(()) => {
                info!("audio route disconnected");
                self.machine.succeed(ConnectionState::Disconnected);
            }
            Err(e) => self.machine.fail(e.to_string()),
        }
    }

    /// Cached device id, resolving it on first use or after a failure
    async fn resolve(&mut self) -> Result<DeviceId, ActuatorError> {
        if let Some(device) = &self.device_id {
            return Ok(device.clone());
        }

        let mac = match &self.address {
            None => {
                return Err(ActuatorError::ResolutionFailed(
                    "no device address configured".to_string(),
                ))
            }
            Some(DeviceAddress::Device(device)) => {
                self.device_id = Some(device.clone());
                return Ok(device.clone());
            }
            Some(DeviceAddress::Mac(mac)) => mac.clone(),
        };

        let resolved = tokio::time::timeout(self.op_timeout, self.actuator.resolve_device_id(&mac))
            .await
            .map_err(|_| ActuatorError::Timeout(self.op_timeout))?;

        match resolved {
            Some(device) => {
                info!(address = %mac, %device, "device id resolved");
                self.device_id = Some(device.clone());
                Ok(device)
            }
            None => {
                warn!(address = %mac, "device id resolution failed");
                Err(ActuatorError::ResolutionFailed(mac))
            }
        }
    }
}

/// Await an actuator operation while still consuming state notices, so a
/// close reported mid-operation is applied immediately.
async fn drive<F>(
    op: F,
    op_timeout: Duration,
    notices: &mut mpsc::UnboundedReceiver<ActuatorNotice>,
    machine: &mut ConnectionMachine,
) -> Result<(), ActuatorError>
where
    F: Future<Output = Result<(), ActuatorError>>,
{
    let op = tokio::time::timeout(op_timeout, op);
    tokio::pin!(op);

    loop {
        tokio::select! {
            biased;

            result = &mut op => {
                return result.unwrap_or(Err(ActuatorError::Timeout(op_timeout)));
            }

            Some(notice) = notices.recv() => {
                machine.apply_notice(notice);
            }
        }
    }
}
