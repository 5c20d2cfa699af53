//! # tldr-mirror
//!
//! Local mirror of the tldr-pages command documentation.
//!
//! Pages are read from one of two on-disk trees: a read-only snapshot bundled
//! with the application and an updatable cache tree that supersedes it once
//! present. A refresh downloads the upstream zip archive, normalizes its layout
//! and atomically swaps it in as the new cache tree.
//!
//! ## Design Philosophy
//!
//! - **Disk is the source of truth** - the active layer is re-resolved on every read
//! - **All-or-nothing refresh** - readers see the old tree or the new tree, never a mix
//! - **Event-driven** - refresh progress is delivered as ordered events
//!
//! ## Quick Start
//!
//! ```no_run
//! use tldr_mirror::{Config, Event, SyncCoordinator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sync = SyncCoordinator::new(Config::default())?;
//!
//!     let page = sync.store().get_page("en", "common", "tar")?;
//!     println!("{}", page.into_text());
//!
//!     let mut refresh = sync.refresh()?;
//!     while let Some(event) = refresh.next_event().await {
//!         match event {
//!             Event::Progress { label, .. } => println!("{label}"),
//!             Event::Finished { message, .. } => println!("{message}"),
//!         }
//!     }
//!     refresh.wait().await?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Archive download
pub mod fetch;
/// Archive extraction and atomic installation
pub mod install;
/// Layered page store
pub mod store;
/// Refresh coordination
pub mod sync;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{Config, StoreConfig, SyncConfig};
pub use error::{Error, FetchError, InstallError, Result, StorageError};
pub use fetch::{ArchiveFetcher, DownloadProgress, FetchedArchive};
pub use install::{ArchiveInstaller, InstallReport};
pub use store::{AutonymTable, LanguageNames, LayeredStore};
pub use sync::{RefreshHandle, SyncCoordinator};
pub use types::{
    CommandIndex, Event, LanguageEntry, PageLookup, PlatformEntry, RefreshPhase, RefreshState,
    StorageLayer, StoreInfo,
};
