//! Archive download
//!
//! Streams one HTTP GET of the remote archive into a temporary file, reporting
//! byte progress for every received chunk.

use crate::config::SyncConfig;
use crate::error::{Error, FetchError, Result};
use crate::types::download_fraction;
use crate::utils::{download_label, get_available_space};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Progress of an in-flight download
#[derive(Clone, Debug, PartialEq)]
pub struct DownloadProgress {
    /// Bytes written to the temporary file so far
    pub bytes_received: u64,
    /// Content length announced by the server, if any
    pub total_bytes: Option<u64>,
    /// `bytes_received / total_bytes`, or 0 while the total is unknown
    pub fraction: f64,
    /// Short human-readable label
    pub label: String,
}

impl DownloadProgress {
    fn new(bytes_received: u64, total_bytes: Option<u64>) -> Self {
        let fraction = download_fraction(bytes_received, total_bytes);
        Self {
            bytes_received,
            total_bytes,
            fraction,
            label: download_label(fraction, bytes_received),
        }
    }
}

/// A completely downloaded archive
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedArchive {
    /// Temporary file holding the archive
    pub path: PathBuf,
    /// Number of bytes written
    pub bytes: u64,
    /// Hex-encoded SHA-256 of the archive
    pub sha256: String,
}

/// Downloads the remote archive into a temporary file
#[derive(Clone, Debug)]
pub struct ArchiveFetcher {
    client: reqwest::Client,
    timeout: Duration,
    check_free_space: bool,
}

impl ArchiveFetcher {
    /// Create a fetcher with the configured timeouts and user agent
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.fetch_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            client,
            timeout: config.fetch_timeout,
            check_free_space: config.check_free_space,
        })
    }

    /// Download `url` to `dest`, replacing any stale file left by an aborted attempt
    ///
    /// `on_progress` is called once per received chunk. It runs inline with the
    /// transfer, so it should only hand the value off (e.g. a channel send).
    pub async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        on_progress: impl FnMut(DownloadProgress),
    ) -> Result<FetchedArchive> {
        self.fetch_with_cancel(url, dest, &CancellationToken::new(), on_progress)
            .await
    }

    /// Like [`fetch`](Self::fetch), stopping with [`Error::Cancelled`] once `cancel` fires
    pub async fn fetch_with_cancel(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
        on_progress: impl FnMut(DownloadProgress),
    ) -> Result<FetchedArchive> {
        info!(url, ?dest, "fetching archive");

        let result = self.download(url, dest, cancel, on_progress).await;
        match &result {
            Ok(archive) => {
                info!(
                    url,
                    bytes = archive.bytes,
                    sha256 = %archive.sha256,
                    "archive downloaded"
                );
            }
            Err(e) => {
                warn!(url, error = %e, "archive download failed");
                remove_partial(dest).await;
            }
        }
        result
    }

    async fn download(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
        mut on_progress: impl FnMut(DownloadProgress),
    ) -> Result<FetchedArchive> {
        let mut response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            response = self.client.get(url).send() => {
                response.map_err(|e| self.request_error(url, e))?
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }
            .into());
        }

        let total_bytes = response.content_length();
        debug!(url, ?total_bytes, "response headers received");

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| FetchError::Write {
                    path: dest.to_path_buf(),
                    source,
                })?;
            if let Some(required) = total_bytes {
                self.ensure_free_space(parent, required)?;
            }
        }

        let write_err = |source| FetchError::Write {
            path: dest.to_path_buf(),
            source,
        };

        // File::create truncates a stale archive from an earlier attempt
        let mut file = tokio::fs::File::create(dest).await.map_err(write_err)?;
        let mut hasher = Sha256::new();
        let mut bytes_received: u64 = 0;

        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(url, bytes_received, "download cancelled");
                    return Err(Error::Cancelled);
                }
                chunk = response.chunk() => chunk.map_err(|e| self.request_error(url, e))?,
            };
            let Some(chunk) = chunk else { break };

            file.write_all(&chunk).await.map_err(write_err)?;
            hasher.update(&chunk);
            bytes_received += chunk.len() as u64;

            on_progress(DownloadProgress::new(bytes_received, total_bytes));
        }

        file.flush().await.map_err(write_err)?;
        file.sync_all().await.map_err(write_err)?;

        Ok(FetchedArchive {
            path: dest.to_path_buf(),
            bytes: bytes_received,
            sha256: format!("{:x}", hasher.finalize()),
        })
    }

    fn ensure_free_space(&self, dir: &Path, required: u64) -> Result<()> {
        if !self.check_free_space {
            return Ok(());
        }

        match get_available_space(dir) {
            Ok(available) if available < required => {
                Err(FetchError::InsufficientSpace {
                    required,
                    available,
                }
                .into())
            }
            Ok(available) => {
                debug!(required, available, "free space check passed");
                Ok(())
            }
            Err(e) => {
                warn!(?dir, error = %e, "could not determine free space, continuing");
                Ok(())
            }
        }
    }

    fn request_error(&self, url: &str, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
            .into()
        } else {
            let reason = if e.is_connect() {
                format!("connection failed: {}", e)
            } else {
                e.to_string()
            };
            FetchError::Network {
                url: url.to_string(),
                reason,
            }
            .into()
        }
    }
}

async fn remove_partial(dest: &Path) {
    match tokio::fs::remove_file(dest).await {
        Ok(()) => debug!(?dest, "removed partial archive"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(?dest, error = %e, "failed to remove partial archive"),
    }
}
