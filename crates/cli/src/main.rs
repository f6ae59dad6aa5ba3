use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use clap::Parser;

use facesnap_core::camera::infrastructure::ffmpeg_camera::FfmpegCamera;
use facesnap_core::capture::CaptureError;
use facesnap_core::detection::domain::face_detector::FaceDetector;
use facesnap_core::detection::infrastructure::model_loader::ModelLoader;
use facesnap_core::detection::infrastructure::ultraface_detector::{
    UltraFaceDetector, DEFAULT_CONFIDENCE,
};
use facesnap_core::session::capture_session::{
    CaptureSession, DetectorFactory, SessionConfig, SessionError,
};
use facesnap_core::shared::constants::{
    DEFAULT_CAMERA_DEVICE, DEFAULT_TICK_PERIOD_MS, DETECTOR_MODEL_NAME, DETECTOR_MODEL_URL,
};

/// Face-gated still capture from a live camera.
///
/// Runs the detection loop headless and takes commands on stdin:
/// capture (c), retake (r), status (s), quit (q).
#[derive(Parser)]
#[command(name = "facesnap")]
struct Cli {
    /// Camera device to open.
    #[arg(long, default_value = DEFAULT_CAMERA_DEVICE)]
    device: String,

    /// Detection tick period in milliseconds.
    #[arg(long, default_value_t = DEFAULT_TICK_PERIOD_MS)]
    period_ms: u64,

    /// Face detection confidence threshold (0.0-1.0).
    #[arg(long, default_value_t = DEFAULT_CONFIDENCE)]
    confidence: f32,

    /// Directory holding a pre-downloaded model file.
    #[arg(long)]
    model_dir: Option<PathBuf>,

    /// Write each captured still to this path.
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let loader = ModelLoader::spawn_with(
        DETECTOR_MODEL_NAME,
        DETECTOR_MODEL_URL,
        cli.model_dir.as_deref(),
    );

    let cancelled = AtomicBool::new(false);
    loader.wait(&download_progress, &cancelled)?;
    eprintln!();

    let confidence = cli.confidence;
    let factory: DetectorFactory = Box::new(move |path| {
        Ok(Box::new(UltraFaceDetector::new(path, confidence)?) as Box<dyn FaceDetector>)
    });

    log::info!("using camera device {}", cli.device);
    let camera = FfmpegCamera::new(cli.device.clone());
    let mut session = CaptureSession::new(
        loader,
        Box::new(camera),
        factory,
        SessionConfig {
            tick_period: Duration::from_millis(cli.period_ms),
            ..Default::default()
        },
    );

    let metadata = session.start()?;
    println!(
        "Live on {} ({}x{} @ {:.1} fps). Commands: capture, retake, status, quit.",
        metadata.device, metadata.width, metadata.height, metadata.fps
    );

    for line in io::stdin().lock().lines() {
        let line = line?;
        match line.trim() {
            "c" | "capture" => handle_capture(&mut session, cli.output.as_deref())?,
            "r" | "retake" => match session.retake() {
                Ok(_) => println!("Back to live preview."),
                Err(e) => println!("Retake failed: {e}"),
            },
            "s" | "status" => {
                let latest = session.shared().latest();
                println!(
                    "state={:?} faces={} tick={}",
                    session.capture_state(),
                    latest.regions().len(),
                    latest.seq()
                );
            }
            "q" | "quit" | "exit" => break,
            "" => {}
            other => println!("Unknown command: {other}"),
        }
    }

    session.stop();
    Ok(())
}

fn handle_capture(
    session: &mut CaptureSession,
    output: Option<&std::path::Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    match session.capture() {
        Ok(still) => {
            println!("Captured a {}x{} still.", still.width(), still.height());
            if let Some(path) = output {
                std::fs::write(path, still.png_bytes())?;
                println!("Saved to {}", path.display());
            }
        }
        Err(SessionError::Capture(CaptureError::NoFaceDetected)) => {
            println!("No face detected! Make sure your face is in view.");
        }
        Err(e) => println!("Capture failed: {e}"),
    }
    Ok(())
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if cli.period_ms == 0 {
        return Err("Tick period must be at least 1 ms".into());
    }
    Ok(())
}

fn download_progress(downloaded: u64, total: u64) {
    if total > 0 {
        let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
        eprint!("\rDownloading face detection model... {pct}%");
    } else {
        eprint!("\rDownloading face detection model... {downloaded} bytes");
    }
}
