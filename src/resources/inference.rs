//! Inference session ports
//!
//! Scoring happens in the capture helper, so the in-process session only
//! applies the confidence threshold to each frame's score.

use super::capture::Frame;
use super::ResourceError;

/// Where an inference session runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPath {
    Accelerated,
    Cpu,
}

/// Load order: hardware first, CPU as the fallback
pub const EXECUTION_PATHS: [ExecutionPath; 2] = [ExecutionPath::Accelerated, ExecutionPath::Cpu];

impl std::fmt::Display for ExecutionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionPath::Accelerated => write!(f, "accelerated"),
            ExecutionPath::Cpu => write!(f, "cpu"),
        }
    }
}

/// A loaded detection session
pub trait Detector: Send {
    /// Whether the target object is present in `frame`
    fn detect(&mut self, frame: &Frame) -> Result<bool, ResourceError>;
}

pub trait SessionLoader: Send {
    fn load(&self, path: ExecutionPath) -> Result<Box<dyn Detector>, ResourceError>;
}

#[derive(Debug, Clone, Copy)]
pub struct ThresholdSession {
    confidence: f32,
}

impl ThresholdSession {
    pub fn new(confidence: f32) -> Self {
        Self { confidence }
    }
}

impl Detector for ThresholdSession {
    fn detect(&mut self, frame: &Frame) -> Result<bool, ResourceError> {
        if !frame.score.is_finite() {
            return Err(ResourceError::Unavailable(format!(
                "frame {} carried no usable score",
                frame.seq
            )));
        }
        Ok(frame.score > self.confidence)
    }
}

/// Loads [`ThresholdSession`]s. There is no accelerator for thresholding,
/// so the accelerated path always reports unavailable.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdLoader {
    confidence: f32,
}

impl ThresholdLoader {
    pub fn new(confidence: f32) -> Self {
        Self { confidence }
    }
}

impl SessionLoader for ThresholdLoader {
    fn load(&self, path: ExecutionPath) -> Result<Box<dyn Detector>, ResourceError> {
        match path {
            ExecutionPath::Accelerated => Err(ResourceError::Unavailable(
                "no accelerator for threshold sessions".to_string(),
            )),
            ExecutionPath::Cpu => Ok(Box::new(ThresholdSession::new(self.confidence))),
        }
    }
}
