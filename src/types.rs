//! Core types for tldr-mirror

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Which root directory backs the page store
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageLayer {
    /// Read-only snapshot shipped with the application
    Bundled,
    /// Updatable tree populated by a refresh
    Cached,
}

impl std::fmt::Display for StorageLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageLayer::Bundled => write!(f, "bundled"),
            StorageLayer::Cached => write!(f, "cached"),
        }
    }
}

/// A language available in the active page tree
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageEntry {
    /// Human-readable name (autonym when known)
    pub display_name: String,
    /// Language code as used in the `pages.<code>` directory name
    pub code: String,
}

/// A platform available for the baseline language
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformEntry {
    /// Human-readable name
    pub display_name: String,
    /// Platform directory name
    pub code: String,
}

/// Result of looking up a single page
///
/// A missing page is an expected outcome, so it is a variant rather than an error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageLookup {
    /// The page exists; `content` is the stored text, unmodified
    Found {
        /// File the content was read from
        path: PathBuf,
        /// Exact file contents
        content: String,
    },
    /// No page at the attempted path
    NotFound {
        /// Path that was tried
        path: PathBuf,
        /// Command that was requested
        command: String,
    },
}

impl PageLookup {
    /// Page text, if found
    pub fn content(&self) -> Option<&str> {
        match self {
            PageLookup::Found { content, .. } => Some(content),
            PageLookup::NotFound { .. } => None,
        }
    }

    /// Path that was read or attempted
    pub fn path(&self) -> &std::path::Path {
        match self {
            PageLookup::Found { path, .. } | PageLookup::NotFound { path, .. } => path.as_path(),
        }
    }

    /// Whether the page exists
    pub fn is_found(&self) -> bool {
        matches!(self, PageLookup::Found { .. })
    }

    /// Descriptive text for a missing page, `None` when the page was found
    pub fn not_found_message(&self) -> Option<String> {
        match self {
            PageLookup::Found { .. } => None,
            PageLookup::NotFound { path, command } => Some(format!(
                "Command '{}' not found in path '{}'.",
                command,
                path.display()
            )),
        }
    }

    /// Page text, or the not-found description
    pub fn into_text(self) -> String {
        match self {
            PageLookup::Found { content, .. } => content,
            not_found => not_found.not_found_message().unwrap_or_default(),
        }
    }
}

/// Commands available per language and platform, filtered by the caller's allow-lists
///
/// Recomputed on every query and never persisted. Languages and platforms with no
/// commands are absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommandIndex(BTreeMap<String, BTreeMap<String, Vec<String>>>);

impl CommandIndex {
    pub(crate) fn insert(&mut self, language: &str, platform: &str, mut commands: Vec<String>) {
        if commands.is_empty() {
            return;
        }
        commands.sort();
        self.0
            .entry(language.to_string())
            .or_default()
            .insert(platform.to_string(), commands);
    }

    /// Languages with at least one command
    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Platforms with at least one command for `language`
    pub fn platforms(&self, language: &str) -> impl Iterator<Item = &str> {
        self.0
            .get(language)
            .into_iter()
            .flat_map(|platforms| platforms.keys().map(String::as_str))
    }

    /// Sorted command names for a language and platform
    pub fn commands(&self, language: &str, platform: &str) -> Option<&[String]> {
        self.0
            .get(language)
            .and_then(|platforms| platforms.get(platform))
            .map(Vec::as_slice)
    }

    /// Whether the index lists `command` for the language and platform
    pub fn contains(&self, language: &str, platform: &str, command: &str) -> bool {
        self.commands(language, platform)
            .is_some_and(|commands| commands.binary_search_by(|c| c.as_str().cmp(command)).is_ok())
    }

    /// Total number of (language, platform, command) entries
    pub fn len(&self) -> usize {
        self.0
            .values()
            .flat_map(|platforms| platforms.values())
            .map(Vec::len)
            .sum()
    }

    /// Whether the index has no entries
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the underlying map
    pub fn as_map(&self) -> &BTreeMap<String, BTreeMap<String, Vec<String>>> {
        &self.0
    }
}

/// Description of the currently active layer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreInfo {
    /// Layer currently serving reads
    pub layer: StorageLayer,
    /// Root directory of that layer
    pub root: PathBuf,
    /// Modification time of the root, `None` when the root is absent
    pub updated_at: Option<DateTime<Utc>>,
}

/// Phase of a running refresh
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPhase {
    /// Streaming the archive to the temporary file
    Downloading,
    /// Extracting, normalizing and installing the tree
    Extracting,
    /// The pipeline has reached its terminal event
    InstallingDone,
}

/// Snapshot of the refresh currently in flight
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RefreshState {
    /// Bytes received so far
    pub bytes_downloaded: u64,
    /// Size announced by the server, if any
    pub total_bytes: Option<u64>,
    /// Current phase
    pub phase: RefreshPhase,
}

impl RefreshState {
    pub(crate) fn new() -> Self {
        Self {
            bytes_downloaded: 0,
            total_bytes: None,
            phase: RefreshPhase::Downloading,
        }
    }

    /// Download fraction in `0.0..=1.0`; zero while the total is unknown
    pub fn fraction(&self) -> f64 {
        download_fraction(self.bytes_downloaded, self.total_bytes)
    }
}

/// Event emitted during a refresh
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Progress update
    Progress {
        /// Phase the update belongs to
        phase: RefreshPhase,
        /// Completion fraction (0.0 to 1.0)
        fraction: f64,
        /// Short human-readable label, e.g. "Downloading… 42% (3.10 MB)"
        label: String,
    },

    /// Terminal event; exactly one per refresh
    Finished {
        /// Whether the new tree was installed
        success: bool,
        /// Human-readable outcome
        message: String,
    },
}

impl Event {
    /// Whether this is the terminal event of a refresh
    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::Finished { .. })
    }
}

pub(crate) fn download_fraction(received: u64, total: Option<u64>) -> f64 {
    match total {
        Some(total) if total > 0 => (received as f64 / total as f64).min(1.0),
        _ => 0.0,
    }
}
