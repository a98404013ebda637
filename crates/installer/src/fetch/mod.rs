//! Fetch & verify
//!
//! Mods are streamed from their download URL into scratch space and hashed
//! once the body is complete. Nothing here retries or resumes: a failed
//! transfer starts from zero the next time the installer runs.

pub mod hashing;
pub mod progress;

pub use progress::{IntoProgressCallback, LogProgressReporter, ProgressCallback, ProgressEvent, ProgressReporter};

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::config::FetchConfig;
use crate::error::{FileOperation, Result, SyncError};

/// A downloaded file whose SHA-512 matched the expected value
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedFile {
    pub path: PathBuf,
    pub size: u64,
    pub sha512: String,
}

/// Source of verified mod files
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Download `url` to `dest_path` and check it against `expected_hash`
    ///
    /// On a hash mismatch the file is left at `dest_path` for the caller to
    /// discard.
    async fn fetch_and_verify(&self, url: &str, dest_path: &Path, expected_hash: &str) -> Result<VerifiedFile>;
}

/// HTTP fetcher streaming response bodies straight to disk
pub struct HttpFetcher {
    client: Client,
    progress_callback: Option<ProgressCallback>,
}

impl HttpFetcher {
    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.timeout())
            .user_agent(&config.user_agent)
            .build()
            .map_err(|source| SyncError::HttpClient { source })?;

        Ok(Self {
            client,
            progress_callback: None,
        })
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    fn report(&self, event: ProgressEvent) {
        if let Some(ref callback) = self.progress_callback {
            callback(event);
        }
    }

    /// Stream `url` into `dest_path`, returning the number of bytes written
    pub async fn download_to_file(&self, url: &str, dest_path: &Path) -> Result<u64> {
        debug!("Stream downloading: {} to {}", url, dest_path.display());
        let fetch_failed = |source| SyncError::FetchFailed {
            url: url.to_string(),
            source,
        };

        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| SyncError::fs(parent, FileOperation::CreateDir, e))?;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(fetch_failed)?;

        let total_size = response.content_length();
        self.report(ProgressEvent::DownloadStarted {
            url: url.to_string(),
            total_size,
        });

        let mut file = fs::File::create(dest_path)
            .await
            .map_err(|e| SyncError::fs(dest_path, FileOperation::Create, e))?;

        let mut stream = response.bytes_stream();
        let mut downloaded = 0u64;
        let mut last_progress_time = Instant::now();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(fetch_failed)?;
            file.write_all(&chunk)
                .await
                .map_err(|e| SyncError::fs(dest_path, FileOperation::Write, e))?;
            downloaded += chunk.len() as u64;

            // Report progress at most every 100ms
            if last_progress_time.elapsed().as_millis() >= 100 {
                self.report(ProgressEvent::DownloadProgress {
                    url: url.to_string(),
                    downloaded,
                    total: total_size,
                });
                last_progress_time = Instant::now();
            }
        }

        file.flush()
            .await
            .map_err(|e| SyncError::fs(dest_path, FileOperation::Write, e))?;
        file.sync_all()
            .await
            .map_err(|e| SyncError::fs(dest_path, FileOperation::Write, e))?;

        self.report(ProgressEvent::DownloadComplete {
            url: url.to_string(),
            final_size: downloaded,
        });
        debug!("Stream download completed: {} bytes", downloaded);
        Ok(downloaded)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch_and_verify(&self, url: &str, dest_path: &Path, expected_hash: &str) -> Result<VerifiedFile> {
        let size = self.download_to_file(url, dest_path).await?;
        let actual = hashing::sha512_file(dest_path).await?;
        let valid = hashing::hashes_match(&actual, expected_hash);

        self.report(ProgressEvent::ValidationComplete {
            file: dest_path.display().to_string(),
            valid,
        });

        if !valid {
            return Err(SyncError::HashMismatch {
                file: dest_path.to_path_buf(),
                expected: expected_hash.to_string(),
                actual,
            });
        }

        Ok(VerifiedFile {
            path: dest_path.to_path_buf(),
            size,
            sha512: actual,
        })
    }
}

#[cfg(test)]
mod tests;
