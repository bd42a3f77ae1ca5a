// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Token pair persistence: load/save a JSON file with atomic writes.

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::token::TokenPair;

/// Load a persisted token pair. Returns `Ok(None)` when the file is absent.
pub fn load(path: &Path) -> anyhow::Result<Option<TokenPair>> {
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let pair: TokenPair = serde_json::from_str(&contents)?;
    Ok(Some(pair))
}

/// Save a token pair atomically (write tmp + rename).
///
/// The temp file name carries the PID and a per-process sequence number so
/// concurrent saves to the same file never share a temp file.
pub fn save(path: &Path, pair: &TokenPair) -> anyhow::Result<()> {
    static SEQ: AtomicU32 = AtomicU32::new(0);

    let json = serde_json::to_string_pretty(pair)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    let tmp_name = format!(
        "{}.{}.{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy(),
        std::process::id(),
        seq,
    );
    let tmp_path = path.with_file_name(tmp_name);
    std::fs::write(&tmp_path, json)?;
    restrict_permissions(&tmp_path)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Remove the token file. A missing file is not an error.
pub fn remove(path: &Path) -> anyhow::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
