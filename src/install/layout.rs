//! Archive layout normalization
//!
//! The upstream archive wraps its content in a single top-level directory and
//! ships the default language as `pages`, with `pages.en` as a symlink to it.
//! After normalization the content root holds only real `pages.<lang>`
//! directories and the default language always lives at `pages.en`.
//!
//! Precedence: a real `pages` directory always wins over any `pages.en`. A real
//! `pages.en` directory is kept only when no `pages` directory exists.

use crate::error::{InstallError, Result};
use crate::store::PAGES_PREFIX;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const UNSUFFIXED_PAGES: &str = "pages";
const DEFAULT_PAGES: &str = "pages.en";

/// Locate the directory holding the `pages*` entries
///
/// The extraction root itself qualifies if it holds any `pages*` entry. Otherwise
/// a single top-level directory (e.g. `tldr-main/`) is descended into.
pub fn find_content_root(extract_root: &Path) -> Result<PathBuf> {
    let mut dirs = Vec::new();
    for entry in read_entries(extract_root)? {
        let name = entry.file_name();
        if name.to_string_lossy().starts_with(UNSUFFIXED_PAGES) {
            return Ok(extract_root.to_path_buf());
        }
        if is_real_dir(&entry.path()) {
            dirs.push(entry.path());
        }
    }

    match dirs.as_slice() {
        [only] => {
            debug!(content_root = ?only, "descending into archive wrapper directory");
            Ok(only.clone())
        }
        _ => Ok(extract_root.to_path_buf()),
    }
}

/// Make `pages.en` the canonical real directory for the default language
pub fn normalize_layout(content_root: &Path) -> Result<()> {
    let pages = content_root.join(UNSUFFIXED_PAGES);
    let pages_en = content_root.join(DEFAULT_PAGES);

    if is_real_dir(&pages) {
        if exists(&pages_en) {
            debug!(?pages_en, "replacing pages.en with pages");
            remove_any(&pages_en)?;
        }
        fs::rename(&pages, &pages_en).map_err(|source| InstallError::MoveFailed {
            source_path: pages.clone(),
            dest_path: pages_en.clone(),
            source,
        })?;
        return Ok(());
    }

    if exists(&pages) {
        remove_any(&pages)?;
    }
    if exists(&pages_en) && !is_real_dir(&pages_en) {
        debug!(?pages_en, "discarding pages.en that is not a directory");
        remove_any(&pages_en)?;
    }
    Ok(())
}

/// Remove every entry of the content root that is not a real `pages.*` directory
pub fn strip_non_pages(content_root: &Path) -> Result<()> {
    for entry in read_entries(content_root)? {
        let path = entry.path();
        let keep = entry
            .file_name()
            .to_str()
            .and_then(|name| name.strip_prefix(PAGES_PREFIX))
            .is_some_and(|lang| !lang.is_empty())
            && is_real_dir(&path);

        if !keep {
            debug!(?path, "stripping non-page entry");
            remove_any(&path)?;
        }
    }
    Ok(())
}

/// Count language trees and page files below a normalized content root
pub(crate) fn count_pages(content_root: &Path) -> Result<(usize, usize)> {
    let mut languages = 0;
    let mut pages = 0;
    for entry in read_entries(content_root)? {
        languages += 1;
        pages += count_markdown(&entry.path())?;
    }
    Ok((languages, pages))
}

fn count_markdown(dir: &Path) -> Result<usize> {
    let mut count = 0;
    for entry in read_entries(dir)? {
        let path = entry.path();
        if is_real_dir(&path) {
            count += count_markdown(&path)?;
        } else if path.extension().is_some_and(|ext| ext == "md") {
            count += 1;
        }
    }
    Ok(count)
}

fn read_entries(dir: &Path) -> Result<Vec<fs::DirEntry>> {
    fs::read_dir(dir)
        .and_then(|entries| entries.collect::<std::io::Result<Vec<_>>>())
        .map_err(|e| InstallError::io("read directory", dir, e).into())
}

/// Directory that is not reached through a symlink
fn is_real_dir(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|meta| meta.is_dir())
}

/// Exists as anything, including a dangling symlink
fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

pub(crate) fn remove_any(path: &Path) -> Result<()> {
    let result = if is_real_dir(path) {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(InstallError::io("remove", path, e).into()),
    }
}
