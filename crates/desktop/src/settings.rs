use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use facesnap_core::detection::infrastructure::ultraface_detector::DEFAULT_CONFIDENCE;
use facesnap_core::shared::constants::{DEFAULT_CAMERA_DEVICE, DEFAULT_TICK_PERIOD_MS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub device: String,
    pub tick_ms: u64,
    pub confidence: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            device: DEFAULT_CAMERA_DEVICE.to_string(),
            tick_ms: DEFAULT_TICK_PERIOD_MS,
            confidence: DEFAULT_CONFIDENCE,
        }
    }
}

impl Settings {
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("Facesnap").join("settings.json"))
    }

    pub fn load() -> Self {
        Self::config_path()
            .and_then(|path| fs::read_to_string(path).ok())
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    pub fn save(&self) {
        if let Some(path) = Self::config_path() {
            if let Some(parent) = path.parent() {
                let _ = fs::create_dir_all(parent);
            }
            if let Ok(json) = serde_json::to_string_pretty(self) {
                let _ = fs::write(path, json);
            }
        }
    }
}
