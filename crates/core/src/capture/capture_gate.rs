use crate::capture::still_image::StillImage;
use crate::capture::CaptureError;
use crate::detection::domain::detection_result::DetectionResult;
use crate::shared::frame::Frame;

/// The two render modes: previewing live, or displaying a captured still.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CaptureState {
    Live,
    Captured,
}

/// Two-state controller that permits a snapshot only when the most recent
/// published detection reports a face.
///
/// Invariant: a still image exists iff the state is `Captured`. The gate
/// holds no timing or resource concerns; the session stops the camera and
/// loop around these transitions.
#[derive(Debug)]
pub struct CaptureGate {
    state: CaptureState,
    still: Option<StillImage>,
}

impl CaptureGate {
    pub fn new() -> Self {
        Self {
            state: CaptureState::Live,
            still: None,
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn still(&self) -> Option<&StillImage> {
        self.still.as_ref()
    }

    /// Rasterizes `frame` into a still, gated on `latest.has_face()`.
    ///
    /// A violated precondition leaves the gate untouched.
    pub fn capture(
        &mut self,
        latest: &DetectionResult,
        frame: &Frame,
    ) -> Result<&StillImage, CaptureError> {
        if self.state == CaptureState::Captured {
            return Err(CaptureError::AlreadyCaptured);
        }
        if !latest.has_face() {
            return Err(CaptureError::NoFaceDetected);
        }
        let still = StillImage::encode(frame)?;
        self.state = CaptureState::Captured;
        Ok(self.still.insert(still))
    }

    /// Discards the still and returns to live preview. Unconditional.
    pub fn retake(&mut self) {
        self.still = None;
        self.state = CaptureState::Live;
    }
}

impl Default for CaptureGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::region::Region;

    fn frame() -> Frame {
        Frame::new(vec![128u8; 20 * 10 * 3], 20, 10, 0)
    }

    fn face_result() -> DetectionResult {
        DetectionResult::new(1, vec![Region::new(2, 2, 5, 5, 0.9)])
    }

    fn empty_result() -> DetectionResult {
        DetectionResult::new(1, vec![])
    }

    fn still_iff_captured(gate: &CaptureGate) -> bool {
        (gate.state() == CaptureState::Captured) == gate.still().is_some()
    }

    #[test]
    fn test_capture_with_face_transitions_to_captured() {
        let mut gate = CaptureGate::new();
        let still = gate.capture(&face_result(), &frame()).unwrap();
        assert_eq!((still.width(), still.height()), (20, 10));
        assert_eq!(gate.state(), CaptureState::Captured);
        assert!(still_iff_captured(&gate));
    }

    #[test]
    fn test_capture_without_face_fails_with_no_state_change() {
        let mut gate = CaptureGate::new();
        let err = gate.capture(&empty_result(), &frame()).unwrap_err();
        assert!(matches!(err, CaptureError::NoFaceDetected));
        assert_eq!(gate.state(), CaptureState::Live);
        assert!(gate.still().is_none());
        assert!(still_iff_captured(&gate));
    }

    #[test]
    fn test_capture_while_captured_is_rejected() {
        let mut gate = CaptureGate::new();
        gate.capture(&face_result(), &frame()).unwrap();
        let err = gate.capture(&face_result(), &frame()).unwrap_err();
        assert!(matches!(err, CaptureError::AlreadyCaptured));
        assert!(still_iff_captured(&gate));
    }

    #[test]
    fn test_retake_returns_to_live_and_drops_still() {
        let mut gate = CaptureGate::new();
        gate.capture(&face_result(), &frame()).unwrap();
        gate.retake();
        assert_eq!(gate.state(), CaptureState::Live);
        assert!(gate.still().is_none());
        assert!(still_iff_captured(&gate));
    }

    #[test]
    fn test_retake_from_live_is_a_no_op() {
        let mut gate = CaptureGate::new();
        gate.retake();
        assert_eq!(gate.state(), CaptureState::Live);
        assert!(gate.still().is_none());
    }

    #[test]
    fn test_capture_after_retake_works_again() {
        let mut gate = CaptureGate::new();
        gate.capture(&face_result(), &frame()).unwrap();
        gate.retake();
        assert!(gate.capture(&face_result(), &frame()).is_ok());
    }
}
