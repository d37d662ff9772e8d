//! Device node lookup.
//!
//! udev publishes stable symlinks for input devices under `/dev/input/by-id`, named after
//! the USB vendor and product strings. A PowerMate shows up as something like
//! `usb-Griffin_Technology__Inc._Griffin_PowerMate-event-if00`.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

pub const BY_ID_DIR: &str = "/dev/input/by-id";
pub const POWERMATE_NEEDLE: &str = "PowerMate";

/// Entries of `dir` whose file name contains `needle`, sorted by name.
///
/// A missing or unreadable directory yields an empty list.
pub fn probe_devices(dir: impl AsRef<Path>, needle: &str) -> Vec<PathBuf> {
    let dir = dir.as_ref();
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::debug!(dir = %dir.display(), error = %e, "cannot list device directory");
            return Vec::new();
        }
    };

    let mut found: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().contains(needle))
        .map(|entry| entry.path())
        .collect();
    found.sort();
    found
}

/// First PowerMate event node under `/dev/input/by-id`.
pub fn find_device() -> Result<PathBuf> {
    find_in(BY_ID_DIR, POWERMATE_NEEDLE)
}

/// First node in `dir` matching `needle`.
pub fn find_in(dir: impl AsRef<Path>, needle: &str) -> Result<PathBuf> {
    let found = probe_devices(dir, needle);
    if found.len() > 1 {
        tracing::info!(count = found.len(), "several devices match, using the first");
    }
    found
        .into_iter()
        .next()
        .ok_or_else(|| Error::NoDevice(needle.to_string()))
}
