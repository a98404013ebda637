//! Progress tracking and reporting for mod downloads

use std::sync::Arc;
use tracing::{debug, info, warn};

/// Progress callback for download operations
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Events emitted while a mod is fetched and verified
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    DownloadStarted {
        url: String,
        total_size: Option<u64>,
    },
    DownloadProgress {
        url: String,
        downloaded: u64,
        total: Option<u64>,
    },
    DownloadComplete {
        url: String,
        final_size: u64,
    },
    ValidationComplete {
        file: String,
        valid: bool,
    },
}

/// Trait for progress reporting with more granular control
pub trait ProgressReporter: Send + Sync {
    fn on_download_started(&self, _url: &str, _total_size: Option<u64>) {}
    fn on_download_progress(&self, _url: &str, _downloaded: u64, _total: Option<u64>) {}
    fn on_download_complete(&self, _url: &str, _final_size: u64) {}
    fn on_validation_complete(&self, _file: &str, _valid: bool) {}
}

/// Extension trait to convert ProgressReporter to ProgressCallback
pub trait IntoProgressCallback {
    fn into_callback(self) -> ProgressCallback;
}

impl<T: ProgressReporter + 'static> IntoProgressCallback for T {
    fn into_callback(self) -> ProgressCallback {
        Arc::new(move |event| match event {
            ProgressEvent::DownloadStarted { url, total_size } => {
                self.on_download_started(&url, total_size);
            }
            ProgressEvent::DownloadProgress { url, downloaded, total } => {
                self.on_download_progress(&url, downloaded, total);
            }
            ProgressEvent::DownloadComplete { url, final_size } => {
                self.on_download_complete(&url, final_size);
            }
            ProgressEvent::ValidationComplete { file, valid } => {
                self.on_validation_complete(&file, valid);
            }
        })
    }
}

/// Forwards progress to `tracing`
#[derive(Debug, Default)]
pub struct LogProgressReporter;

impl ProgressReporter for LogProgressReporter {
    fn on_download_started(&self, url: &str, total_size: Option<u64>) {
        match total_size {
            Some(size) => debug!("Downloading {} ({} bytes)", url, size),
            None => debug!("Downloading {}", url),
        }
    }

    fn on_download_progress(&self, url: &str, downloaded: u64, total: Option<u64>) {
        if let Some(total) = total.filter(|t| *t > 0) {
            let percent = downloaded as f64 / total as f64 * 100.0;
            debug!("{}: {:.1}% ({}/{} bytes)", url, percent, downloaded, total);
        }
    }

    fn on_download_complete(&self, url: &str, final_size: u64) {
        info!("Downloaded {} ({:.1} KB)", url, final_size as f64 / 1024.0);
    }

    fn on_validation_complete(&self, file: &str, valid: bool) {
        if valid {
            debug!("Verified {}", file);
        } else {
            warn!("Verification failed for {}", file);
        }
    }
}
