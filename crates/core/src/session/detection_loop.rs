use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::camera::domain::camera_source::CameraSource;
use crate::detection::domain::detection_result::DetectionResult;
use crate::detection::domain::face_detector::FaceDetector;
use crate::session::session_state::SharedSession;
use crate::shared::constants::DEFAULT_TICK_PERIOD_MS;
use crate::shared::frame::Frame;

/// Loop lifecycle. `Running` is entered exactly once, on the first decoded
/// frame; before that, failed reads are retried at tick cadence rather than
/// in a spin loop or a recursive retry chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    NotStarted,
    Running,
    Stopped,
}

const NOT_STARTED: u8 = 0;
const RUNNING: u8 = 1;
const STOPPED: u8 = 2;

pub struct DetectionLoopConfig {
    /// Tick cadence; ticks fire regardless of detection latency.
    pub period: Duration,
    /// Frames queued toward the detection worker. When full, that tick's
    /// detection is skipped; sampling never blocks on a slow detector.
    pub queue_capacity: usize,
}

impl Default for DetectionLoopConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(DEFAULT_TICK_PERIOD_MS),
            queue_capacity: 2,
        }
    }
}

struct DetectJob {
    seq: u64,
    frame: Frame,
}

/// Handle tied to one loop lifetime. Owns the cancellation token; dropping
/// the handle cancels and joins, so stray ticks can never outlive it.
pub struct DetectionLoopHandle {
    cancelled: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    tick_thread: Option<JoinHandle<Box<dyn CameraSource>>>,
    detect_thread: Option<JoinHandle<Box<dyn FaceDetector>>>,
}

impl DetectionLoopHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn state(&self) -> LoopState {
        match self.state.load(Ordering::SeqCst) {
            RUNNING => LoopState::Running,
            STOPPED => LoopState::Stopped,
            _ => LoopState::NotStarted,
        }
    }

    /// Cancels, joins both workers, and hands back the camera (already
    /// closed) and the detector for reuse. A side that panicked is `None`.
    pub fn stop(mut self) -> (Option<Box<dyn CameraSource>>, Option<Box<dyn FaceDetector>>) {
        self.cancel();
        let camera = self.tick_thread.take().and_then(|h| h.join().ok());
        let detector = self.detect_thread.take().and_then(|h| h.join().ok());
        (camera, detector)
    }
}

impl Drop for DetectionLoopHandle {
    fn drop(&mut self) {
        self.cancel();
        if let Some(h) = self.tick_thread.take() {
            let _ = h.join();
        }
        if let Some(h) = self.detect_thread.take() {
            let _ = h.join();
        }
    }
}

/// Spawns the tick thread and the detection worker against an opened camera.
pub fn spawn(
    camera: Box<dyn CameraSource>,
    detector: Box<dyn FaceDetector>,
    shared: SharedSession,
    config: DetectionLoopConfig,
) -> DetectionLoopHandle {
    let cancelled = Arc::new(AtomicBool::new(false));
    let state = Arc::new(AtomicU8::new(NOT_STARTED));
    let (job_tx, job_rx) = crossbeam_channel::bounded::<DetectJob>(config.queue_capacity.max(1));

    let tick_cancelled = cancelled.clone();
    let tick_state = state.clone();
    let tick_shared = shared.clone();
    let period = config.period;
    let tick_thread = thread::spawn(move || {
        run_ticks(camera, job_tx, tick_shared, tick_cancelled, tick_state, period)
    });

    let detect_cancelled = cancelled.clone();
    let detect_thread =
        thread::spawn(move || run_detector(detector, job_rx, shared, detect_cancelled));

    DetectionLoopHandle {
        cancelled,
        state,
        tick_thread: Some(tick_thread),
        detect_thread: Some(detect_thread),
    }
}

fn run_ticks(
    mut camera: Box<dyn CameraSource>,
    job_tx: Sender<DetectJob>,
    shared: SharedSession,
    cancelled: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    period: Duration,
) -> Box<dyn CameraSource> {
    let mut seq: u64 = 0;

    while !cancelled.load(Ordering::SeqCst) {
        let tick_started = Instant::now();

        match camera.read_frame() {
            Ok(frame) => {
                if state.load(Ordering::SeqCst) == NOT_STARTED {
                    state.store(RUNNING, Ordering::SeqCst);
                    log::debug!("detection loop running ({}x{})", frame.width(), frame.height());
                }
                seq += 1;
                let job = DetectJob {
                    seq,
                    frame: frame.clone(),
                };
                shared.publish_frame(frame);
                if job_tx.try_send(job).is_err() {
                    log::trace!("tick {seq}: detector busy, sampling continues");
                }
            }
            Err(e) => {
                if state.load(Ordering::SeqCst) == NOT_STARTED {
                    log::debug!("waiting for first frame: {e}");
                } else {
                    log::warn!("frame read failed: {e}");
                }
            }
        }

        if let Some(remaining) = period.checked_sub(tick_started.elapsed()) {
            thread::sleep(remaining);
        }
    }

    camera.close();
    state.store(STOPPED, Ordering::SeqCst);
    camera
}

fn run_detector(
    mut detector: Box<dyn FaceDetector>,
    job_rx: Receiver<DetectJob>,
    shared: SharedSession,
    cancelled: Arc<AtomicBool>,
) -> Box<dyn FaceDetector> {
    // Ends when the tick thread drops its sender.
    for job in job_rx.iter() {
        if cancelled.load(Ordering::SeqCst) {
            break;
        }

        match detector.detect(&job.frame) {
            Ok(raw) => {
                let native = job.frame.size();
                let display = shared.display_size();
                let regions = raw
                    .into_iter()
                    .map(|r| r.scaled(native, display))
                    .collect();
                let result = DetectionResult::new(job.seq, regions);
                // Cancellation wins over any in-flight result
                if !cancelled.load(Ordering::SeqCst) && !shared.publish_detection(result) {
                    log::trace!("tick {}: result superseded", job.seq);
                }
            }
            Err(e) => log::warn!("detection failed on tick {}: {e}", job.seq),
        }
    }
    detector
}
