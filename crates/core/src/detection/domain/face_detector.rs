use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Domain interface for face detection.
///
/// Implementations may be stateful (e.g., a warmed-up inference session),
/// hence `&mut self`. Latency is unbounded; callers must not assume a
/// result lands within the tick that issued it.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Region>, Box<dyn std::error::Error>>;
}
