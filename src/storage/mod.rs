//! Persistence layer.
//!
//! Saves and loads small JSON documents (the scheduler state file).
//! Writes go to a sibling temp file first and are renamed into place so a
//! crash mid-write never leaves a truncated state file behind.

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Save a value as pretty-printed JSON.
pub fn save_json<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let json = serde_json::to_string_pretty(value).context("Failed to serialise state")?;

    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).with_context(|| format!("Failed to write state to {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("Failed to move state into {}", path.display()))?;

    debug!(path = %path.display(), bytes = json.len(), "State saved");
    Ok(())
}

/// Load a JSON value. Returns None if the file doesn't exist (fresh start).
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<Option<T>> {
    let path = path.as_ref();

    if !path.exists() {
        info!(path = %path.display(), "No saved state found, starting fresh");
        return Ok(None);
    }

    let json =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read state from {}", path.display()))?;
    let value = serde_json::from_str(&json).with_context(|| format!("Failed to parse state from {}", path.display()))?;

    info!(path = %path.display(), "State loaded from disk");
    Ok(Some(value))
}

/// Delete a state file (for testing or reset).
pub fn delete_file(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        std::fs::remove_file(path).with_context(|| format!("Failed to delete state file {}", path.display()))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
