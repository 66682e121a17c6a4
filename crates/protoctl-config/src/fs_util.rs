// crates/protoctl-config/src/fs_util.rs
// ============================================================================
// Module: File Helpers
// Description: Atomic file replacement.
// Purpose: Share persistence mechanics between config and cache files.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Files are written to a `.tmp` sibling, synced, and renamed over the target
//! so readers never observe a partially written document.

use std::fs;
use std::io;
use std::io::Write;
use std::path::Path;

/// Replaces `path` with `contents`, creating parent directories as needed.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("tmp");
    let mut file =
        fs::OpenOptions::new().create(true).write(true).truncate(true).open(&temp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    fs::rename(&temp_path, path)
}
