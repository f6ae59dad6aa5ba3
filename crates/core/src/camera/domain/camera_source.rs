use thiserror::Error;

use crate::shared::camera_metadata::CameraMetadata;
use crate::shared::frame::Frame;

/// Media-access failures. Denial and absence are distinguished so callers
/// can phrase the user-facing notice; both leave capture unavailable.
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("camera access denied for {device}: {reason}")]
    AccessDenied { device: String, reason: String },
    #[error("camera device not found: {0}")]
    NotFound(String),
    #[error("camera not opened")]
    NotOpened,
    #[error("camera backend error: {0}")]
    Backend(String),
}

/// Acquires a live camera stream and yields its frames.
///
/// The implementation exclusively owns the device handle. `close` releases
/// the hardware and MUST run before the sink is torn down or reinitialized
/// so camera access never leaks across transitions.
pub trait CameraSource: Send {
    /// Negotiates the device and returns the stream parameters.
    fn open(&mut self) -> Result<CameraMetadata, CameraError>;

    /// Blocks until the next frame decodes. The first successful read is
    /// the stream's readiness signal.
    fn read_frame(&mut self) -> Result<Frame, CameraError>;

    /// Releases the underlying hardware resource. Idempotent.
    fn close(&mut self);
}
