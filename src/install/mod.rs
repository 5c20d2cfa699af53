//! Archive installation
//!
//! Turns a downloaded archive into the cached page tree. Extraction and
//! normalization happen in scratch directories next to the cache root, so the
//! final swap stays on one filesystem. On Linux the new tree is exchanged with
//! the previous one in a single `renameat2(RENAME_EXCHANGE)` call, so readers
//! of the cache root see either the previous complete tree or the new one.
//! Elsewhere the swap falls back to two renames.

mod extract;
mod layout;


pub use layout::{find_content_root, normalize_layout, strip_non_pages};

use crate::error::{InstallError, Result};
use crate::utils::{exchange_paths, is_exchange_unsupported};
use layout::{count_pages, remove_any};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Summary of an installed page tree
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallReport {
    /// Where the tree was installed
    pub cache_root: PathBuf,
    /// Number of `pages.<lang>` directories
    pub languages: usize,
    /// Number of page files across all languages
    pub pages: usize,
}

/// Scratch locations used while installing, all siblings of the cache root
#[derive(Clone, Debug)]
struct WorkPaths {
    extract: PathBuf,
    staging: PathBuf,
    backup: PathBuf,
}

impl WorkPaths {
    fn for_cache_root(cache_root: &Path) -> Self {
        let parent = cache_root
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let name = cache_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "tldr-data".to_string());

        Self {
            extract: parent.join(format!(".{name}.extract")),
            staging: parent.join(format!(".{name}.new")),
            backup: parent.join(format!(".{name}.old")),
        }
    }
}

/// Installs downloaded archives as the cached page tree
pub struct ArchiveInstaller;

impl ArchiveInstaller {
    /// Install `archive_path` at `cache_root` on a blocking worker thread
    pub async fn install(archive_path: &Path, cache_root: &Path) -> Result<InstallReport> {
        let archive_path = archive_path.to_path_buf();
        let cache_root = cache_root.to_path_buf();

        tokio::task::spawn_blocking(move || Self::install_blocking(&archive_path, &cache_root))
            .await
            .map_err(|e| InstallError::TaskFailed(e.to_string()))?
    }

    /// Install `archive_path` at `cache_root` on the current thread
    ///
    /// The archive file and all scratch directories are removed afterwards,
    /// whether or not the install succeeded. On failure the previous tree at
    /// `cache_root` is left exactly as it was.
    pub fn install_blocking(archive_path: &Path, cache_root: &Path) -> Result<InstallReport> {
        let work = WorkPaths::for_cache_root(cache_root);
        info!(?archive_path, ?cache_root, "installing page tree");

        let result = Self::run(archive_path, cache_root, &work);

        for leftover in [&work.extract, &work.staging] {
            if let Err(e) = remove_any(leftover) {
                warn!(path = ?leftover, error = %e, "failed to clean up scratch directory");
            }
        }
        if let Err(e) = remove_any(archive_path) {
            warn!(?archive_path, error = %e, "failed to remove downloaded archive");
        }

        match &result {
            Ok(report) => info!(
                ?cache_root,
                languages = report.languages,
                pages = report.pages,
                "page tree installed"
            ),
            Err(e) => warn!(?cache_root, error = %e, "page tree install failed"),
        }
        result
    }

    /// Restore the page tree left aside by an install interrupted between its renames
    ///
    /// Runs before every install and when a coordinator starts. A backup is moved
    /// back to `cache_root` if nothing is there, and discarded otherwise.
    pub fn recover_interrupted(cache_root: &Path) -> Result<()> {
        recover_backup(cache_root, &WorkPaths::for_cache_root(cache_root))
    }

    fn run(archive_path: &Path, cache_root: &Path, work: &WorkPaths) -> Result<InstallReport> {
        // Leftovers of an interrupted earlier install
        remove_any(&work.extract)?;
        remove_any(&work.staging)?;
        recover_backup(cache_root, work)?;

        extract::extract_zip(archive_path, &work.extract)?;

        let content_root = find_content_root(&work.extract)?;
        normalize_layout(&content_root)?;
        strip_non_pages(&content_root)?;

        let (languages, pages) = count_pages(&content_root)?;
        if languages == 0 {
            return Err(InstallError::NoPageTrees {
                archive: archive_path.to_path_buf(),
            }
            .into());
        }
        debug!(?content_root, languages, pages, "normalized page tree");

        rename(&content_root, &work.staging)?;
        swap_into_place(&work.staging, cache_root, &work.backup)?;

        Ok(InstallReport {
            cache_root: cache_root.to_path_buf(),
            languages,
            pages,
        })
    }
}

fn recover_backup(cache_root: &Path, work: &WorkPaths) -> Result<()> {
    if fs::symlink_metadata(&work.backup).is_err() {
        return Ok(());
    }

    if fs::symlink_metadata(cache_root).is_ok() {
        debug!(backup = ?work.backup, "discarding stale page tree backup");
        remove_any(&work.backup)
    } else {
        info!(backup = ?work.backup, ?cache_root, "restoring page tree from interrupted install");
        rename(&work.backup, cache_root)
    }
}

/// Replace `cache_root` with `staging`
///
/// When a tree already exists the two are exchanged atomically where the
/// platform allows it, so `cache_root` always names a complete tree. Otherwise
/// the previous tree is renamed aside first and restored if the second rename
/// fails.
fn swap_into_place(staging: &Path, cache_root: &Path, backup: &Path) -> Result<()> {
    let had_previous = fs::symlink_metadata(cache_root).is_ok();

    if !had_previous {
        return rename(staging, cache_root);
    }

    match exchange_paths(staging, cache_root) {
        Ok(()) => {
            debug!(?cache_root, "exchanged page trees atomically");
            // staging now holds the previous tree
            if let Err(e) = remove_any(staging) {
                warn!(path = ?staging, error = %e, "failed to remove previous page tree");
            }
            return Ok(());
        }
        Err(e) if is_exchange_unsupported(&e) => {
            debug!(error = %e, "atomic exchange unavailable, renaming sequentially");
        }
        Err(source) => {
            return Err(InstallError::MoveFailed {
                source_path: staging.to_path_buf(),
                dest_path: cache_root.to_path_buf(),
                source,
            }
            .into());
        }
    }

    rename(cache_root, backup)?;

    if let Err(e) = rename(staging, cache_root) {
        if let Err(restore) = fs::rename(backup, cache_root) {
            warn!(?backup, ?cache_root, error = %restore, "failed to restore previous page tree");
        }
        return Err(e);
    }

    if let Err(e) = remove_any(backup) {
        warn!(?backup, error = %e, "failed to remove previous page tree");
    }
    Ok(())
}

fn rename(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to).map_err(|source| {
        InstallError::MoveFailed {
            source_path: from.to_path_buf(),
            dest_path: to.to_path_buf(),
            source,
        }
        .into()
    })
}
