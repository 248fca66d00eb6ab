//! Capture device ports and the helper-process capture
//!
//! Helper contract: `<helper> <index> <backend>` prints `READY` once the
//! camera is open, then one line per frame holding the best target-class
//! confidence for that frame. Exiting means the camera was lost.

use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use super::ResourceError;

const READY_MARKER: &str = "READY";

/// One captured frame, already reduced to a detection score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub seq: u64,
    pub score: f32,
}

/// Capture API tried when opening a device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureBackend {
    DirectShow,
    MediaFoundation,
    Any,
}

/// Fallback order for opening a capture device
pub const CAPTURE_BACKENDS: [CaptureBackend; 3] = [
    CaptureBackend::DirectShow,
    CaptureBackend::MediaFoundation,
    CaptureBackend::Any,
];

impl CaptureBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaptureBackend::DirectShow => "dshow",
            CaptureBackend::MediaFoundation => "msmf",
            CaptureBackend::Any => "any",
        }
    }
}

impl std::fmt::Display for CaptureBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An open capture device
pub trait FrameSource: Send {
    /// Next frame; `Ok(None)` when none arrived within the read timeout
    fn read_frame(&mut self) -> Result<Option<Frame>, ResourceError>;
}

/// Opens capture devices
pub trait CaptureOpener: Send {
    fn open(
        &self,
        index: u32,
        backend: CaptureBackend,
    ) -> Result<Box<dyn FrameSource>, ResourceError>;
}

/// Spawns the frame-scoring helper for each open
#[derive(Debug, Clone)]
pub struct ProcessCaptureOpener {
    program: Option<PathBuf>,
    open_timeout: Duration,
    read_timeout: Duration,
}

impl ProcessCaptureOpener {
    pub fn new(program: Option<PathBuf>) -> Self {
        Self {
            program,
            open_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_millis(500),
        }
    }
}

impl CaptureOpener for ProcessCaptureOpener {
    fn open(
        &self,
        index: u32,
        backend: CaptureBackend,
    ) -> Result<Box<dyn FrameSource>, ResourceError> {
        let program = self.program.as_ref().ok_or(ResourceError::NotConfigured("capture helper"))?;

        let mut child = Command::new(program)
            .arg(index.to_string())
            .arg(backend.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                stop_child(&mut child);
                return Err(ResourceError::Unavailable("capture helper stdout unavailable".to_string()));
            }
        };

        let (line_tx, line_rx) = mpsc::channel();
        let spawned = thread::Builder::new()
            .name("capture-reader".to_string())
            .spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    let Ok(line) = line else { break };
                    if line_tx.send(line).is_err() {
                        break;
                    }
                }
            });
        if let Err(e) = spawned {
            stop_child(&mut child);
            return Err(e.into());
        }

        let mut capture = ProcessCapture {
            child,
            lines: line_rx,
            read_timeout: self.read_timeout,
            seq: 0,
        };
        capture.wait_ready(self.open_timeout)?;
        Ok(Box::new(capture))
    }
}

/// Capture served by a running helper process
pub struct ProcessCapture {
    child: Child,
    lines: Receiver<String>,
    read_timeout: Duration,
    seq: u64,
}

impl ProcessCapture {
    fn wait_ready(&mut self, limit: Duration) -> Result<(), ResourceError> {
        let deadline = Instant::now() + limit;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.lines.recv_timeout(remaining) {
                Ok(line) if line.trim().eq_ignore_ascii_case(READY_MARKER) => return Ok(()),
                Ok(line) => debug!(%line, "capture helper output"),
                Err(RecvTimeoutError::Timeout) => {
                    return Err(ResourceError::Unavailable(
                        "capture helper did not become ready".to_string(),
                    ))
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(ResourceError::Unavailable(
                        "capture helper exited while opening".to_string(),
                    ))
                }
            }
        }
    }
}

impl FrameSource for ProcessCapture {
    fn read_frame(&mut self) -> Result<Option<Frame>, ResourceError> {
        match self.lines.recv_timeout(self.read_timeout) {
            Ok(line) => match line.trim().parse::<f32>() {
                Ok(score) => {
                    self.seq += 1;
                    Ok(Some(Frame {
                        seq: self.seq,
                        score,
                    }))
                }
                Err(_) => {
                    debug!(%line, "ignoring non-frame helper output");
                    Ok(None)
                }
            },
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(ResourceError::Unavailable(
                "capture helper exited".to_string(),
            )),
        }
    }
}

impl Drop for ProcessCapture {
    fn drop(&mut self) {
        stop_child(&mut self.child);
    }
}

fn stop_child(child: &mut Child) {
    if let Ok(None) = child.try_wait() {
        if let Err(e) = child.kill() {
            warn!(?e, "failed to stop capture helper");
        }
    }
    let _ = child.wait();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn opener_for(script: &str) -> (tempfile::TempDir, ProcessCaptureOpener) {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture-helper");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        let mut opener = ProcessCaptureOpener::new(Some(path));
        opener.open_timeout = Duration::from_secs(2);
        opener.read_timeout = Duration::from_millis(200);
        (dir, opener)
    }

    #[test]
    fn test_backend_order() {
        let names: Vec<&str> = CAPTURE_BACKENDS.iter().map(|b| b.as_str()).collect();
        assert_eq!(names, vec!["dshow", "msmf", "any"]);
    }

    #[test]
    fn test_unconfigured_helper() {
        let opener = ProcessCaptureOpener::new(None);
        assert!(matches!(
            opener.open(0, CaptureBackend::Any),
            Err(ResourceError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_reads_scores_until_exit() {
        let (_dir, opener) = opener_for("echo READY; echo 0.9; echo junk; echo 0.1");
        let mut capture = opener.open(0, CaptureBackend::Any).unwrap();

        let first = capture.read_frame().unwrap().unwrap();
        assert_eq!((first.seq, first.score), (1, 0.9));
        assert_eq!(capture.read_frame().unwrap(), None);
        let third = capture.read_frame().unwrap().unwrap();
        assert_eq!((third.seq, third.score), (2, 0.1));
        assert!(capture.read_frame().is_err());
    }

    #[test]
    fn test_backend_rejected_by_helper() {
        let (_dir, opener) =
            opener_for(r#"[ "$2" = "any" ] || exit 1; echo READY; exec sleep 30"#);
        assert!(opener.open(1, CaptureBackend::DirectShow).is_err());
        assert!(opener.open(1, CaptureBackend::Any).is_ok());
    }
}
