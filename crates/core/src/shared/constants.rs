pub const DETECTOR_MODEL_NAME: &str = "version-RFB-320.onnx";
pub const DETECTOR_MODEL_URL: &str =
    "https://github.com/onnx/models/raw/main/validated/vision/body_analysis/ultraface/models/version-RFB-320.onnx";

/// Detection tick cadence. A tuning default, not an invariant.
pub const DEFAULT_TICK_PERIOD_MS: u64 = 100;

/// Default camera device on Linux; overridable everywhere it is used.
pub const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";

/// Overlay box stroke color (RGBA) and thickness in pixels.
pub const OVERLAY_STROKE_RGBA: [u8; 4] = [64, 160, 255, 255];
pub const OVERLAY_STROKE_WIDTH: u32 = 2;
