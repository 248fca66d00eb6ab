//! Capture device and inference session lifecycle

mod capture;
mod inference;
mod lifecycle;

pub use capture::{CaptureBackend, CaptureOpener, Frame, FrameSource, ProcessCaptureOpener};
pub use inference::{Detector, ExecutionPath, SessionLoader, ThresholdLoader};
pub use lifecycle::ResourceManager;

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("resource unavailable: {0}")]
    Unavailable(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Resource changes asked for by other threads, applied by the detection
/// cycle that owns the [`ResourceManager`]
#[derive(Debug)]
pub struct ResourceRequests {
    capture_index: AtomicU32,
    release: AtomicBool,
}

impl ResourceRequests {
    pub fn new(capture_index: u32) -> Self {
        Self {
            capture_index: AtomicU32::new(capture_index),
            release: AtomicBool::new(false),
        }
    }

    pub fn capture_index(&self) -> u32 {
        self.capture_index.load(Ordering::SeqCst)
    }

    pub fn set_capture_index(&self, index: u32) {
        self.capture_index.store(index, Ordering::SeqCst);
    }

    /// Ask the cycle to close the capture device before its next frame
    pub fn request_release(&self) {
        self.release.store(true, Ordering::SeqCst);
    }

    /// Consume a pending release request
    pub fn take_release(&self) -> bool {
        self.release.swap(false, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_request_consumed_once() {
        let requests = ResourceRequests::new(0);
        assert!(!requests.take_release());
        requests.request_release();
        requests.request_release();
        assert!(requests.take_release());
        assert!(!requests.take_release());
    }

    #[test]
    fn test_capture_index_roundtrip() {
        let requests = ResourceRequests::new(1);
        requests.set_capture_index(4);
        assert_eq!(requests.capture_index(), 4);
    }
}
