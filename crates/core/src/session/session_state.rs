use std::sync::{Arc, Mutex};

use crate::capture::capture_gate::{CaptureGate, CaptureState};
use crate::capture::still_image::StillImage;
use crate::capture::CaptureError;
use crate::detection::domain::detection_result::DetectionResult;
use crate::overlay::renderer;
use crate::overlay::surface::OverlaySurface;
use crate::shared::frame::Frame;

/// Live preview image: the latest frame composed with the overlay,
/// RGBA at display size.
#[derive(Clone, Debug, PartialEq)]
pub struct Preview {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// What the UI shows. An enum, so live preview and captured still are
/// mutually exclusive by construction.
#[derive(Clone, Debug, PartialEq)]
pub enum RenderMode {
    /// Live preview; `None` until the first frame arrives.
    Live(Option<Preview>),
    Captured(StillImage),
}

/// Every mutable cell of the session in one struct behind one lock:
/// model readiness, the capture gate, the latest detection and frame, and
/// the overlay. Transitions are applied whole, so no reader ever observes
/// a partially-updated combination.
struct SessionState {
    model_ready: bool,
    gate: CaptureGate,
    latest: DetectionResult,
    latest_frame: Option<Frame>,
    overlay: OverlaySurface,
    display: (u32, u32),
}

/// Cloneable handle to the shared session state.
///
/// Single writer per concern (the loop publishes, user operations
/// transition the gate), many readers (overlay consumers, the UI poll).
#[derive(Clone)]
pub struct SharedSession {
    inner: Arc<Mutex<SessionState>>,
}

impl SharedSession {
    pub fn new(display: (u32, u32)) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionState {
                model_ready: false,
                gate: CaptureGate::new(),
                latest: DetectionResult::default(),
                latest_frame: None,
                overlay: OverlaySurface::new(display.0, display.1),
                display,
            })),
        }
    }

    /// Monotonic: never flips back to false.
    pub fn mark_model_ready(&self) {
        self.inner.lock().unwrap().model_ready = true;
    }

    pub fn model_ready(&self) -> bool {
        self.inner.lock().unwrap().model_ready
    }

    pub fn set_display_size(&self, display: (u32, u32)) {
        let mut state = self.inner.lock().unwrap();
        if state.display != display {
            state.display = display;
            state.overlay.resize(display.0, display.1);
        }
    }

    pub fn display_size(&self) -> (u32, u32) {
        self.inner.lock().unwrap().display
    }

    /// Publishes the most recent native-resolution frame. Refused while a
    /// still is displayed (the live pipeline is suspended then).
    pub fn publish_frame(&self, frame: Frame) -> bool {
        let mut state = self.inner.lock().unwrap();
        if state.gate.state() == CaptureState::Captured {
            return false;
        }
        state.latest_frame = Some(frame);
        true
    }

    /// Publishes a detection result and repaints the overlay from it.
    ///
    /// Accepted only when the result's sequence is strictly newer than the
    /// published one (out-of-order completions lose to issuance order) and
    /// only while live. Returns whether the result was accepted.
    pub fn publish_detection(&self, result: DetectionResult) -> bool {
        let mut state = self.inner.lock().unwrap();
        if state.gate.state() == CaptureState::Captured {
            return false;
        }
        if result.seq() <= state.latest.seq() {
            return false;
        }
        let s = &mut *state;
        renderer::draw_regions(&mut s.overlay, result.regions());
        s.latest = result;
        true
    }

    pub fn latest(&self) -> DetectionResult {
        self.inner.lock().unwrap().latest.clone()
    }

    pub fn has_face(&self) -> bool {
        self.inner.lock().unwrap().latest.has_face()
    }

    pub fn capture_state(&self) -> CaptureState {
        self.inner.lock().unwrap().gate.state()
    }

    pub fn still(&self) -> Option<StillImage> {
        self.inner.lock().unwrap().gate.still().cloned()
    }

    pub fn overlay_snapshot(&self) -> OverlaySurface {
        self.inner.lock().unwrap().overlay.clone()
    }

    /// Gate transition `Live → Captured`, atomic with the face-presence
    /// check against the latest published result.
    pub fn capture(&self) -> Result<StillImage, CaptureError> {
        let mut state = self.inner.lock().unwrap();
        let s = &mut *state;
        match s.latest_frame {
            Some(ref frame) => s.gate.capture(&s.latest, frame).cloned(),
            // A face can only have been published off a frame; an absent
            // frame means nothing was published yet.
            None if s.latest.has_face() => Err(CaptureError::NoFrame),
            None => Err(CaptureError::NoFaceDetected),
        }
    }

    /// Gate transition back to `Live`: drops the still, resets the latest
    /// detection (presence flag false) and clears frame and overlay.
    pub fn retake(&self) {
        let mut state = self.inner.lock().unwrap();
        state.gate.retake();
        state.latest = DetectionResult::default();
        state.latest_frame = None;
        state.overlay.clear();
    }

    /// Exactly one of live preview / captured still, never both.
    pub fn render_mode(&self) -> RenderMode {
        let state = self.inner.lock().unwrap();
        if let Some(still) = state.gate.still() {
            return RenderMode::Captured(still.clone());
        }
        let preview = state.latest_frame.as_ref().map(|frame| Preview {
            rgba: renderer::compose(frame, &state.overlay),
            width: state.display.0,
            height: state.display.1,
        });
        RenderMode::Live(preview)
    }
}
