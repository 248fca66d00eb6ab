//! Actuator backed by an external route helper program
//!
//! Helper contract:
//! - `<helper> resolve <address>` prints the device id on stdout, exit 0
//! - `<helper> connect <device-id>` prints `OPENED` once the route is up and
//!   keeps running while it holds the route; its exit means the route closed
//!
//! Disconnect stops the holding process.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Actuator, ActuatorError, ActuatorNotice, DeviceId, NoticeSender};

const OPENED_MARKER: &str = "OPENED";

/// Route currently held by a helper process
struct HeldRoute {
    release: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

pub struct CommandActuator {
    program: PathBuf,
    notices: NoticeSender,
    held: Option<HeldRoute>,
}

impl CommandActuator {
    pub fn new(program: impl Into<PathBuf>, notices: NoticeSender) -> Self {
        Self {
            program: program.into(),
            notices,
            held: None,
        }
    }

    fn command(&self, subcommand: &str) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(subcommand)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }

    async fn release_held(&mut self) -> Result<(), ActuatorError> {
        let Some(held) = self.held.take() else {
            return Ok(());
        };
        // The helper may already have exited on its own
        let _ = held.release.send(());
        held.task
            .await
            .map_err(|e| ActuatorError::OperationFailed(format!("route watcher failed: {e}")))
    }
}

impl Actuator for CommandActuator {
    async fn resolve_device_id(&mut self, address: &str) -> Option<DeviceId> {
        let output = match self.command("resolve").arg(address).output().await {
            Ok(output) => output,
            Err(e) => {
                warn!(program = ?self.program, ?e, "failed to run route helper");
                return None;
            }
        };
        if !output.status.success() {
            debug!(status = %output.status, "route helper could not resolve device");
            return None;
        }

        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(DeviceId::new)
    }

    async fn connect(&mut self, device: &DeviceId) -> Result<(), ActuatorError> {
        // Drop a route whose helper already exited
        self.release_held().await?;

        let mut child = self
            .command("connect")
            .arg(device.as_str())
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| ActuatorError::OperationFailed(format!("failed to start helper: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ActuatorError::OperationFailed("helper stdout unavailable".to_string()))?;
        let mut lines = BufReader::new(stdout).lines();

        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().eq_ignore_ascii_case(OPENED_MARKER) => break,
                Ok(Some(line)) => debug!(%line, "route helper output"),
                Ok(None) => {
                    let status = child.wait().await.map_err(|e| {
                        ActuatorError::OperationFailed(format!("helper wait failed: {e}"))
                    })?;
                    return Err(ActuatorError::OperationFailed(format!(
                        "helper exited before opening the route ({status})"
                    )));
                }
                Err(e) => {
                    return Err(ActuatorError::OperationFailed(format!(
                        "failed to read helper output: {e}"
                    )))
                }
            }
        }

        let _ = self.notices.send(ActuatorNotice::Opened);

        let (release, release_rx) = oneshot::channel();
        let task = tokio::spawn(hold_route(child, lines, release_rx, self.notices.clone()));
        self.held = Some(HeldRoute { release, task });
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), ActuatorError> {
        self.release_held().await
    }
}

/// Keep the helper alive until released; report its own exit as a close
async fn hold_route(
    mut child: Child,
    mut lines: Lines<BufReader<ChildStdout>>,
    mut release: oneshot::Receiver<()>,
    notices: NoticeSender,
) {
    let mut stdout_open = true;
    loop {
        tokio::select! {
            _ = &mut release => {
                if let Err(e) = child.kill().await {
                    warn!(?e, "failed to stop route helper");
                }
                return;
            }
            status = child.wait() => {
                info!(?status, "route helper exited");
                let _ = notices.send(ActuatorNotice::Closed);
                return;
            }
            line = lines.next_line(), if stdout_open => match line {
                Ok(Some(line)) => debug!(%line, "route helper output"),
                _ => stdout_open = false,
            },
        }
    }
}
