//! Error types for tldr-mirror
//!
//! This module provides the error taxonomy for the library:
//! - [`StorageError`] for filesystem failures on the read path
//! - [`FetchError`] for network and HTTP failures while downloading the archive
//! - [`InstallError`] for archive corruption and filesystem failures while installing
//! - [`Error::RefreshInProgress`] for the single-refresh concurrency guard
//!
//! A missing page or a missing directory is never an error. Partial language and
//! platform coverage is normal upstream, so those cases are modeled as empty or
//! not-found results instead.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for tldr-mirror operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for tldr-mirror
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "archive_url")
        key: Option<String>,
    },

    /// Reading from the active page tree failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Downloading the remote archive failed
    #[error("download error: {0}")]
    Fetch(#[from] FetchError),

    /// Extracting or installing the archive failed
    #[error("install error: {0}")]
    Install(#[from] InstallError),

    /// A refresh is already running; only one may be in flight at a time
    #[error("a cache refresh is already in progress")]
    RefreshInProgress,

    /// The refresh was cancelled before the new tree was installed
    #[error("refresh cancelled")]
    Cancelled,
}

/// Filesystem failures on the read path
#[derive(Debug, Error)]
pub enum StorageError {
    /// Listing a directory failed for a reason other than absence
    #[error("failed to read directory {path}: {source}")]
    ReadDir {
        /// Directory that could not be listed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Reading a page file failed for a reason other than absence
    #[error("failed to read page {path}: {source}")]
    ReadPage {
        /// Page file that could not be read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A language, platform or command code would escape the layer root
    #[error("invalid {kind} '{value}'")]
    InvalidComponent {
        /// Which component was rejected ("language", "platform", "command")
        kind: &'static str,
        /// The rejected value
        value: String,
    },
}

/// Network and HTTP failures while downloading the archive
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP client could not be constructed
    #[error("failed to create HTTP client: {0}")]
    Client(String),

    /// Connection, TLS or transfer failure
    #[error("network error fetching {url}: {reason}")]
    Network {
        /// URL that was being fetched
        url: String,
        /// Description of the failure
        reason: String,
    },

    /// The transfer exceeded the configured timeout
    #[error("timed out fetching {url} after {timeout_secs} seconds")]
    Timeout {
        /// URL that was being fetched
        url: String,
        /// Configured timeout in seconds
        timeout_secs: u64,
    },

    /// The server answered with a non-success status
    #[error("HTTP {status} fetching {url}")]
    Status {
        /// HTTP status code returned by the server
        status: u16,
        /// URL that was being fetched
        url: String,
    },

    /// Writing the temporary archive file failed
    #[error("failed to write archive to {path}: {source}")]
    Write {
        /// Temporary archive path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Not enough free space for the announced archive size
    #[error("insufficient disk space: need {required} bytes, have {available} bytes")]
    InsufficientSpace {
        /// Number of bytes the server announced
        required: u64,
        /// Number of bytes currently available on disk
        available: u64,
    },
}

/// Archive corruption and filesystem failures while installing
#[derive(Debug, Error)]
pub enum InstallError {
    /// The archive could not be opened or one of its entries could not be read
    #[error("corrupt archive {archive}: {reason}")]
    CorruptArchive {
        /// Archive that failed to extract
        archive: PathBuf,
        /// The reason extraction failed
        reason: String,
    },

    /// The extracted tree contains no `pages.*` directory
    #[error("archive {archive} contains no page trees")]
    NoPageTrees {
        /// Archive whose layout was rejected
        archive: PathBuf,
    },

    /// A filesystem operation failed (disk full, permission denied, ...)
    #[error("failed to {operation} {path}: {source}")]
    Io {
        /// What was being done ("extract", "remove", "rename", ...)
        operation: &'static str,
        /// Path the operation targeted
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Moving a tree into place failed
    #[error("failed to move {source_path} to {dest_path}: {source}")]
    MoveFailed {
        /// Tree being moved
        source_path: PathBuf,
        /// Destination path
        dest_path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The refresh or blocking install task panicked or was aborted
    #[error("install task failed: {0}")]
    TaskFailed(String),
}

impl InstallError {
    pub(crate) fn io(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        InstallError::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}

impl Error {
    /// Get the machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Storage(e) => match e {
                StorageError::ReadDir { .. } => "read_dir_failed",
                StorageError::ReadPage { .. } => "read_page_failed",
                StorageError::InvalidComponent { .. } => "invalid_component",
            },
            Error::Fetch(e) => match e {
                FetchError::Client(_) => "http_client_error",
                FetchError::Network { .. } => "network_error",
                FetchError::Timeout { .. } => "timeout",
                FetchError::Status { .. } => "http_status",
                FetchError::Write { .. } => "write_failed",
                FetchError::InsufficientSpace { .. } => "insufficient_space",
            },
            Error::Install(e) => match e {
                InstallError::CorruptArchive { .. } => "corrupt_archive",
                InstallError::NoPageTrees { .. } => "no_page_trees",
                InstallError::Io { .. } => "install_io_error",
                InstallError::MoveFailed { .. } => "move_failed",
                InstallError::TaskFailed(_) => "install_task_failed",
            },
            Error::RefreshInProgress => "refresh_in_progress",
            Error::Cancelled => "cancelled",
        }
    }

    /// Short message suitable for showing to an end user
    ///
    /// The full `Display` output is kept for logs; this collapses it into the
    /// class of problem (network, disk, corrupt archive) followed by the detail.
    pub fn user_message(&self) -> String {
        match self {
            Error::Fetch(FetchError::Write { .. } | FetchError::InsufficientSpace { .. }) => {
                format!("Disk problem: {}", self.detail())
            }
            Error::Fetch(_) => format!("Network problem: {}", self.detail()),
            Error::Install(
                InstallError::CorruptArchive { .. } | InstallError::NoPageTrees { .. },
            ) => format!("Corrupt archive: {}", self.detail()),
            Error::Install(_) | Error::Storage(_) => format!("Disk problem: {}", self.detail()),
            Error::Cancelled => "Refresh cancelled".to_string(),
            Error::RefreshInProgress | Error::Config { .. } => self.to_string(),
        }
    }

    fn detail(&self) -> String {
        match self {
            Error::Storage(e) => e.to_string(),
            Error::Fetch(e) => e.to_string(),
            Error::Install(e) => e.to_string(),
            other => other.to_string(),
        }
    }
}
