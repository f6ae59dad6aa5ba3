pub mod capture_gate;
pub mod still_image;

use thiserror::Error;

/// Capture-gate failures. All are recovered locally: surfaced to the user,
/// never escalated, and never a state change.
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("no face detected; make sure a face is in view")]
    NoFaceDetected,
    #[error("a still image has already been captured")]
    AlreadyCaptured,
    #[error("no live frame available yet")]
    NoFrame,
    #[error("failed to encode still image: {0}")]
    Encode(String),
}
