use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use crate::detection::infrastructure::model_resolver::{self, ModelLoadError};
use crate::shared::constants::{DETECTOR_MODEL_NAME, DETECTOR_MODEL_URL};

/// Resolves the detector model in the background, once per process.
///
/// `ready()` flips to true when resolution succeeds and never reverts.
/// Nothing downstream may run detection before that; a failed resolution
/// leaves the loader permanently not-ready and the feature unavailable.
pub struct ModelLoader {
    slot: Slot,
}

struct Slot {
    result: Mutex<Option<Result<PathBuf, String>>>,
    resolved: Condvar,
    progress: Arc<Mutex<(u64, u64)>>,
}

impl ModelLoader {
    /// Start resolving the default detector model.
    pub fn spawn() -> Arc<Self> {
        Self::spawn_with(DETECTOR_MODEL_NAME, DETECTOR_MODEL_URL, None)
    }

    /// Start resolving a specific model, optionally checking a bundled
    /// directory before downloading.
    pub fn spawn_with(name: &str, url: &str, bundled_dir: Option<&Path>) -> Arc<Self> {
        let loader = Arc::new(Self {
            slot: Slot {
                result: Mutex::new(None),
                resolved: Condvar::new(),
                progress: Arc::new(Mutex::new((0, 0))),
            },
        });

        let worker = loader.clone();
        let name = name.to_string();
        let url = url.to_string();
        let bundled = bundled_dir.map(Path::to_path_buf);
        thread::spawn(move || {
            let progress_mutex = worker.slot.progress.clone();
            let result = model_resolver::resolve(
                &name,
                &url,
                bundled.as_deref(),
                Some(Box::new(move |downloaded, total| {
                    *progress_mutex.lock().unwrap() = (downloaded, total);
                })),
            );
            match &result {
                Ok(path) => log::info!("detector model ready: {}", path.display()),
                Err(e) => log::error!("detector model unavailable: {e}"),
            }
            *worker.slot.result.lock().unwrap() = Some(result.map_err(|e| e.to_string()));
            worker.slot.resolved.notify_all();
        });

        loader
    }

    /// Monotonic readiness: true once the model has resolved successfully.
    pub fn ready(&self) -> bool {
        matches!(*self.slot.result.lock().unwrap(), Some(Ok(_)))
    }

    /// Block until the model resolves. Calls `on_progress(downloaded, total)`
    /// while a download is in progress. Returns early if `cancelled` is set.
    pub fn wait(
        &self,
        on_progress: &dyn Fn(u64, u64),
        cancelled: &AtomicBool,
    ) -> Result<PathBuf, ModelLoadError> {
        let mut guard = self.slot.result.lock().unwrap();
        loop {
            if cancelled.load(Ordering::Relaxed) {
                return Err(ModelLoadError::Cancelled);
            }
            if let Some(ref result) = *guard {
                return result
                    .clone()
                    .map_err(ModelLoadError::Unavailable);
            }
            // Forward download progress while waiting
            if let Ok(progress) = self.slot.progress.try_lock() {
                let (downloaded, total) = *progress;
                if total > 0 {
                    on_progress(downloaded, total);
                }
            }
            let (new_guard, _) = self
                .slot
                .resolved
                .wait_timeout(guard, Duration::from_millis(100))
                .unwrap();
            guard = new_guard;
        }
    }
}
