use crate::error::{InstallError, Result};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const S_IFMT: u32 = 0o170000;
const S_IFLNK: u32 = 0o120000;
const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// Extract every regular entry of a zip archive below `dest_path`
///
/// Entries whose names would escape `dest_path` and symlink entries are skipped.
/// Returns the number of files written.
pub(crate) fn extract_zip(archive_path: &Path, dest_path: &Path) -> Result<usize> {
    debug!(?archive_path, ?dest_path, "extracting zip archive");

    std::fs::create_dir_all(dest_path)
        .map_err(|e| InstallError::io("create directory", dest_path, e))?;

    let file =
        File::open(archive_path).map_err(|e| InstallError::io("open", archive_path, e))?;

    let mut archive = zip::ZipArchive::new(file).map_err(|e| corrupt(archive_path, e))?;

    let mut extracted = 0;
    for i in 0..archive.len() {
        let entry = archive.by_index(i).map_err(|e| corrupt(archive_path, e))?;
        if extract_entry(entry, dest_path, archive_path)?.is_some() {
            extracted += 1;
        }
    }

    info!(?archive_path, extracted, "zip extraction finished");
    Ok(extracted)
}

fn extract_entry(
    mut entry: zip::read::ZipFile,
    dest_path: &Path,
    archive_path: &Path,
) -> Result<Option<PathBuf>> {
    let Some(file_path) = entry.enclosed_name().map(|name| dest_path.join(name)) else {
        warn!(name = entry.name(), "skipping entry with unsafe path");
        return Ok(None);
    };

    if entry.is_dir() {
        std::fs::create_dir_all(&file_path)
            .map_err(|e| InstallError::io("create directory", &file_path, e))?;
        return Ok(None);
    }

    if entry
        .unix_mode()
        .is_some_and(|mode| mode & S_IFMT == S_IFLNK)
    {
        debug!(name = entry.name(), "skipping symlink entry");
        return Ok(None);
    }

    if let Some(parent) = file_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|e| InstallError::io("create directory", parent, e))?;
    }

    let mut outfile =
        File::create(&file_path).map_err(|e| InstallError::io("create", &file_path, e))?;

    // Read failures mean bad archive data, write failures mean a disk problem
    let mut buf = vec![0u8; COPY_BUFFER_SIZE];
    loop {
        let n = entry.read(&mut buf).map_err(|e| corrupt(archive_path, e))?;
        if n == 0 {
            break;
        }
        outfile
            .write_all(&buf[..n])
            .map_err(|e| InstallError::io("write", &file_path, e))?;
    }

    Ok(Some(file_path))
}

fn corrupt(archive_path: &Path, e: impl std::fmt::Display) -> InstallError {
    InstallError::CorruptArchive {
        archive: archive_path.to_path_buf(),
        reason: e.to_string(),
    }
}
