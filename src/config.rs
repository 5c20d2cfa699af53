//! Configuration types for tldr-mirror

use crate::error::{Error, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Upstream archive of the tldr-pages repository
pub const DEFAULT_ARCHIVE_URL: &str =
    "https://github.com/tldr-pages/tldr/archive/refs/heads/main.zip";

/// Page tree location configuration
///
/// Groups the two layer roots and the baseline language.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Read-only snapshot shipped with the application (default: "/app/share/tldr-data")
    ///
    /// May be absent at runtime, e.g. in development builds. An absent bundled root
    /// simply yields empty listings.
    #[serde(default = "default_bundled_root")]
    pub bundled_root: PathBuf,

    /// Writable cache tree that supersedes the bundled snapshot once it exists
    /// (default: `<user cache dir>/brief/tldr-data`)
    #[serde(default = "default_cache_root")]
    pub cache_root: PathBuf,

    /// Baseline language whose platform directories define the platform list (default: "en")
    #[serde(default = "default_language")]
    pub default_language: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            bundled_root: default_bundled_root(),
            cache_root: default_cache_root(),
            default_language: default_language(),
        }
    }
}

impl StoreConfig {
    /// Directory holding the cache root and the temporary archive
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_root
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Archive download configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// URL of the zip archive to mirror
    #[serde(default = "default_archive_url")]
    pub archive_url: String,

    /// Temporary archive path; defaults to `tldr.zip` next to the cache root
    #[serde(default)]
    pub archive_path: Option<PathBuf>,

    /// Whole-transfer timeout in seconds (default: 300)
    #[serde(default = "default_fetch_timeout", with = "duration_serde")]
    pub fetch_timeout: Duration,

    /// Connection establishment timeout in seconds (default: 30)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// User-Agent header sent with the archive request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Refuse to download when free space is below the announced archive size (default: true)
    #[serde(default = "default_true")]
    pub check_free_space: bool,

    /// Capacity of the broadcast channel used by [`crate::SyncCoordinator::subscribe`] (default: 256)
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            archive_url: default_archive_url(),
            archive_path: None,
            fetch_timeout: default_fetch_timeout(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
            check_free_space: true,
            event_capacity: default_event_capacity(),
        }
    }
}

/// Main configuration for tldr-mirror
///
/// - [`store`](StoreConfig): layer roots and baseline language
/// - [`sync`](SyncConfig): remote archive and download behavior
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Layer roots and baseline language
    #[serde(default)]
    pub store: StoreConfig,

    /// Remote archive and download behavior
    #[serde(default)]
    pub sync: SyncConfig,
}

impl Config {
    /// Build a configuration rooted at explicit layer paths, keeping every other default
    pub fn with_roots(bundled_root: impl Into<PathBuf>, cache_root: impl Into<PathBuf>) -> Self {
        Self {
            store: StoreConfig {
                bundled_root: bundled_root.into(),
                cache_root: cache_root.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Path the downloaded archive is streamed to
    pub fn archive_path(&self) -> PathBuf {
        self.sync
            .archive_path
            .clone()
            .unwrap_or_else(|| self.store.cache_dir().join("tldr.zip"))
    }

    /// Check the configuration for values that would make every refresh fail
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.sync.archive_url).map_err(|e| Error::Config {
            message: format!("invalid archive URL '{}': {}", self.sync.archive_url, e),
            key: Some("archive_url".to_string()),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Config {
                message: format!("unsupported archive URL scheme '{}'", parsed.scheme()),
                key: Some("archive_url".to_string()),
            });
        }

        if self.store.default_language.trim().is_empty() {
            return Err(Error::Config {
                message: "default language must not be empty".to_string(),
                key: Some("default_language".to_string()),
            });
        }

        if self.store.cache_root.file_name().is_none() {
            return Err(Error::Config {
                message: format!(
                    "cache root '{}' must name a directory below a parent",
                    self.store.cache_root.display()
                ),
                key: Some("cache_root".to_string()),
            });
        }

        if self.store.cache_root == self.store.bundled_root {
            return Err(Error::Config {
                message: "cache root and bundled root must differ".to_string(),
                key: Some("cache_root".to_string()),
            });
        }

        Ok(())
    }
}

fn default_bundled_root() -> PathBuf {
    PathBuf::from("/app/share/tldr-data")
}

fn default_cache_root() -> PathBuf {
    ProjectDirs::from("io.github", "shonebinu", "brief")
        .map(|dirs| dirs.cache_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("brief"))
        .join("tldr-data")
}

fn default_language() -> String {
    "en".to_string()
}

fn default_archive_url() -> String {
    DEFAULT_ARCHIVE_URL.to_string()
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!("tldr-mirror/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_true() -> bool {
    true
}

fn default_event_capacity() -> usize {
    256
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
