//! Acquisition and release of the capture device and inference session
//!
//! Both resources are acquired lazily when detection needs them and released
//! together when detection is turned off. Acquire and release are idempotent,
//! so calling either twice never opens or frees anything twice.

use tracing::{debug, info, warn};

use super::capture::{CaptureOpener, FrameSource, CAPTURE_BACKENDS};
use super::inference::{Detector, SessionLoader, EXECUTION_PATHS};
use super::ResourceError;

pub struct ResourceManager {
    opener: Box<dyn CaptureOpener>,
    loader: Box<dyn SessionLoader>,
    capture_index: u32,
    capture: Option<Box<dyn FrameSource>>,
    session: Option<Box<dyn Detector>>,
}

impl ResourceManager {
    pub fn new(
        opener: Box<dyn CaptureOpener>,
        loader: Box<dyn SessionLoader>,
        capture_index: u32,
    ) -> Self {
        Self {
            opener,
            loader,
            capture_index,
            capture: None,
            session: None,
        }
    }

    #[cfg(test)]
    pub fn is_ready(&self) -> bool {
        self.capture.is_some() && self.session.is_some()
    }

    #[cfg(test)]
    pub fn holds_any(&self) -> bool {
        self.capture.is_some() || self.session.is_some()
    }

    /// Acquire whatever is missing. Already-held resources are kept.
    pub fn ensure(&mut self) -> Result<(), ResourceError> {
        if self.capture.is_none() {
            self.capture = Some(self.open_capture()?);
        }
        if self.session.is_none() {
            self.session = Some(self.load_session()?);
        }
        Ok(())
    }

    fn open_capture(&self) -> Result<Box<dyn FrameSource>, ResourceError> {
        let mut last_err = None;
        for backend in CAPTURE_BACKENDS {
            match self.opener.open(self.capture_index, backend) {
                Ok(capture) => {
                    info!(index = self.capture_index, %backend, "capture device opened");
                    return Ok(capture);
                }
                Err(e) => {
                    debug!(index = self.capture_index, %backend, %e, "capture backend failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            ResourceError::Unavailable(format!("capture device {}", self.capture_index))
        }))
    }

    fn load_session(&self) -> Result<Box<dyn Detector>, ResourceError> {
        let mut last_err = None;
        for path in EXECUTION_PATHS {
            match self.loader.load(path) {
                Ok(session) => {
                    info!(%path, "inference session loaded");
                    return Ok(session);
                }
                Err(e) => {
                    debug!(%path, %e, "inference path unavailable");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| ResourceError::Unavailable("inference session".to_string())))
    }

    /// Read one frame and run detection on it.
    ///
    /// `Ok(None)` means no frame arrived. A capture failure drops the device
    /// so the next [`ensure`](Self::ensure) reopens it.
    pub fn sample(&mut self) -> Result<Option<bool>, ResourceError> {
        self.ensure()?;
        let (Some(capture), Some(session)) = (self.capture.as_mut(), self.session.as_mut()) else {
            return Ok(None);
        };

        let frame = match capture.read_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(None),
            Err(e) => {
                warn!(%e, "capture device lost");
                self.release_capture();
                return Err(e);
            }
        };
        session.detect(&frame).map(Some)
    }

    /// Switch to another capture device; the current one is closed and the
    /// new one opens on the next acquire
    pub fn set_capture_index(&mut self, index: u32) {
        if index == self.capture_index {
            return;
        }
        info!(from = self.capture_index, to = index, "capture index changed");
        self.capture_index = index;
        self.release_capture();
    }

    /// Close the capture device only. Returns whether one was open.
    pub fn release_capture(&mut self) -> bool {
        match self.capture.take() {
            Some(capture) => {
                drop(capture);
                info!(index = self.capture_index, "capture device released");
                true
            }
            None => false,
        }
    }

    /// Close everything held. Returns whether anything was released.
    pub fn release_all(&mut self) -> bool {
        let capture = self.release_capture();
        let session = match self.session.take() {
            Some(session) => {
                drop(session);
                info!("inference session released");
                true
            }
            None => false,
        };
        capture || session
    }
}

impl Drop for ResourceManager {
    fn drop(&mut self) {
        self.release_all();
    }
}
