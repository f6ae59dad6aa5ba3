use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::camera::domain::camera_source::{CameraError, CameraSource};
use crate::capture::capture_gate::CaptureState;
use crate::capture::still_image::StillImage;
use crate::capture::CaptureError;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::infrastructure::model_loader::ModelLoader;
use crate::detection::infrastructure::model_resolver::ModelLoadError;
use crate::session::detection_loop::{self, DetectionLoopConfig, DetectionLoopHandle};
use crate::session::session_state::{RenderMode, SharedSession};
use crate::shared::camera_metadata::CameraMetadata;
use crate::shared::constants::DEFAULT_TICK_PERIOD_MS;

/// Builds the detector once the model artifact has resolved.
pub type DetectorFactory =
    Box<dyn Fn(&Path) -> Result<Box<dyn FaceDetector>, Box<dyn std::error::Error>> + Send>;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("detection model is not ready")]
    ModelNotReady,
    #[error("session is already running")]
    AlreadyRunning,
    #[error("session is not running")]
    NotRunning,
    #[error("a still image is displayed; retake first")]
    StillDisplayed,
    #[error("failed to build detector: {0}")]
    Detector(String),
    #[error("pipeline worker lost its {0} handle")]
    WorkerLost(&'static str),
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Model(#[from] ModelLoadError),
}

pub struct SessionConfig {
    pub tick_period: Duration,
    pub queue_capacity: usize,
    /// Render-surface size; camera-native when `None`.
    pub display_size: Option<(u32, u32)>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(DEFAULT_TICK_PERIOD_MS),
            queue_capacity: 2,
            display_size: None,
        }
    }
}

/// Orchestrates the face-gated capture pipeline: model readiness gates
/// camera start, camera start gates the detection loop, and the loop's
/// published state feeds the overlay and the capture gate.
///
/// The camera and detector are owned here while idle and move into the loop
/// while it runs; stopping the loop hands them back, so retake can restart
/// acquisition without rebuilding either.
pub struct CaptureSession {
    loader: Arc<ModelLoader>,
    detector_factory: DetectorFactory,
    config: SessionConfig,
    shared: SharedSession,
    camera: Option<Box<dyn CameraSource>>,
    detector: Option<Box<dyn FaceDetector>>,
    loop_handle: Option<DetectionLoopHandle>,
}

impl CaptureSession {
    pub fn new(
        loader: Arc<ModelLoader>,
        camera: Box<dyn CameraSource>,
        detector_factory: DetectorFactory,
        config: SessionConfig,
    ) -> Self {
        let display = config.display_size.unwrap_or((0, 0));
        Self {
            loader,
            detector_factory,
            config,
            shared: SharedSession::new(display),
            camera: Some(camera),
            detector: None,
            loop_handle: None,
        }
    }

    /// Cloneable handle for pollers (the UI) that outlive a borrow.
    pub fn shared(&self) -> SharedSession {
        self.shared.clone()
    }

    pub fn is_running(&self) -> bool {
        self.loop_handle.is_some()
    }

    pub fn has_face(&self) -> bool {
        self.shared.has_face()
    }

    pub fn capture_state(&self) -> CaptureState {
        self.shared.capture_state()
    }

    pub fn render_mode(&self) -> RenderMode {
        self.shared.render_mode()
    }

    pub fn still(&self) -> Option<StillImage> {
        self.shared.still()
    }

    /// Opens the camera and spawns the detection loop.
    ///
    /// Preconditions: the model has resolved, no still is displayed, and no
    /// loop is running. Camera denial surfaces as `CameraError`; the loop is
    /// then never spawned and capture stays unavailable.
    pub fn start(&mut self) -> Result<CameraMetadata, SessionError> {
        if self.loop_handle.is_some() {
            return Err(SessionError::AlreadyRunning);
        }
        if self.shared.capture_state() == CaptureState::Captured {
            return Err(SessionError::StillDisplayed);
        }
        if !self.loader.ready() {
            return Err(SessionError::ModelNotReady);
        }
        self.shared.mark_model_ready();
        self.ensure_detector()?;

        let mut camera = self
            .camera
            .take()
            .ok_or(SessionError::WorkerLost("camera"))?;
        let metadata = match camera.open() {
            Ok(metadata) => metadata,
            Err(e) => {
                log::error!("camera unavailable: {e}");
                self.camera = Some(camera);
                return Err(e.into());
            }
        };

        let display = self.config.display_size.unwrap_or(metadata.size());
        self.shared.set_display_size(display);

        let detector = self
            .detector
            .take()
            .ok_or(SessionError::WorkerLost("detector"))?;
        self.loop_handle = Some(detection_loop::spawn(
            camera,
            detector,
            self.shared.clone(),
            DetectionLoopConfig {
                period: self.config.tick_period,
                queue_capacity: self.config.queue_capacity,
            },
        ));

        log::info!(
            "capture session started ({}x{} @ {:.1} fps)",
            metadata.width,
            metadata.height,
            metadata.fps
        );
        Ok(metadata)
    }

    /// Takes the still, gated on the latest published detection, then tears
    /// the live pipeline down: the loop is cancelled and joined and the
    /// camera closed, so neither keeps running behind the displayed image.
    pub fn capture(&mut self) -> Result<StillImage, SessionError> {
        if self.loop_handle.is_none() {
            return Err(SessionError::NotRunning);
        }
        let still = self.shared.capture()?;
        self.stop_loop();
        log::info!("still captured ({}x{})", still.width(), still.height());
        Ok(still)
    }

    /// Discards the still and restarts acquisition. The state transition is
    /// unconditional; reacquiring the camera can still fail and surfaces as
    /// a `SessionError`.
    pub fn retake(&mut self) -> Result<CameraMetadata, SessionError> {
        self.stop_loop();
        self.shared.retake();
        self.start()
    }

    /// Tears the pipeline down without touching the gate.
    pub fn stop(&mut self) {
        self.stop_loop();
    }

    fn ensure_detector(&mut self) -> Result<(), SessionError> {
        if self.detector.is_some() {
            return Ok(());
        }
        // Ready was checked; this returns without blocking.
        let cancelled = AtomicBool::new(false);
        let path = self.loader.wait(&|_, _| {}, &cancelled)?;
        let detector =
            (self.detector_factory)(&path).map_err(|e| SessionError::Detector(e.to_string()))?;
        self.detector = Some(detector);
        Ok(())
    }

    /// Joins the loop and recovers the camera and detector for reuse.
    fn stop_loop(&mut self) {
        if let Some(handle) = self.loop_handle.take() {
            let (camera, detector) = handle.stop();
            match camera {
                Some(camera) => self.camera = Some(camera),
                None => log::error!("tick worker panicked; camera handle lost"),
            }
            match detector {
                Some(detector) => self.detector = Some(detector),
                None => log::error!("detection worker panicked; detector lost"),
            }
        }
    }
}
