//! Tree hashing and event-sequence assertions

use sha2::{Digest, Sha256};
use std::path::Path;
use tldr_mirror::{Event, RefreshPhase};
use walkdir::WalkDir;

/// Hash of a directory tree: every relative path and file content, in sorted order
///
/// An absent root hashes to `None`, so "no tree" and "empty tree" differ.
pub fn tree_hash(root: &Path) -> Option<String> {
    if !root.exists() {
        return None;
    }

    let mut hasher = Sha256::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.expect("failed to walk tree");
        let rel = entry
            .path()
            .strip_prefix(root)
            .expect("walked path outside root");
        hasher.update(rel.to_string_lossy().as_bytes());
        hasher.update([0u8]);
        if entry.file_type().is_file() {
            hasher.update(std::fs::read(entry.path()).expect("failed to read file"));
        }
        hasher.update([0xffu8]);
    }
    Some(format!("{:x}", hasher.finalize()))
}

/// Assert the event sequence of a successful refresh
///
/// Non-decreasing download progress, then exactly one extracting transition at
/// 1.0, then exactly one successful terminal event.
pub fn assert_successful_sequence(events: &[Event]) {
    let (last, rest) = events.split_last().expect("no events received");
    assert!(
        matches!(last, Event::Finished { success: true, message } if message == "Cache updated successfully"),
        "unexpected terminal event {last:?}"
    );

    let (extracting, downloading) = rest.split_last().expect("no progress events received");
    assert!(
        matches!(
            extracting,
            Event::Progress { phase: RefreshPhase::Extracting, fraction, label }
                if *fraction == 1.0 && label == "Extracting…"
        ),
        "unexpected transition event {extracting:?}"
    );

    let mut previous = 0.0;
    for event in downloading {
        match event {
            Event::Progress {
                phase: RefreshPhase::Downloading,
                fraction,
                label,
            } => {
                assert!(*fraction >= previous, "progress went backwards: {events:?}");
                assert!(label.starts_with("Downloading… "), "unexpected label {label}");
                previous = *fraction;
            }
            other => panic!("unexpected event during download: {other:?}"),
        }
    }
}

/// The single terminal event in a sequence, as `(success, message)`
pub fn terminal(events: &[Event]) -> (bool, String) {
    let finished: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            Event::Finished { success, message } => Some((*success, message.clone())),
            Event::Progress { .. } => None,
        })
        .collect();
    assert_eq!(finished.len(), 1, "expected exactly one terminal event: {events:?}");
    finished[0].clone()
}
