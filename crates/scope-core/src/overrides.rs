//! Autoload-overrides side-file
//!
//! The editor server writes this file immediately before launching a scene;
//! the game helper reads, applies and deletes it during startup. Absence
//! means no overrides, so writing an empty set deletes any stale file.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde_json::Value;

use crate::error::Result;

/// Map of autoload name → property name → value
pub type Overrides = BTreeMap<String, BTreeMap<String, Value>>;

/// Materialise the side-file, or delete it when there is nothing to hand over
pub fn write_overrides(path: &Path, overrides: Option<&Overrides>) -> Result<()> {
    let overrides = match overrides {
        Some(map) if !map.is_empty() => map,
        _ => {
            remove_if_present(path)?;
            return Ok(());
        }
    };

    let data = serde_json::to_vec(overrides)?;
    fs::write(path, data)?;
    Ok(())
}

/// Consume the side-file: read, delete, return the parsed overrides.
///
/// Returns `None` when no file exists. The delete happens even if parsing
/// fails, so a corrupt file cannot be re-applied on the next launch.
pub fn take_overrides(path: &Path) -> Result<Option<Overrides>> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    remove_if_present(path)?;

    let overrides: Overrides = serde_json::from_slice(&data)?;
    Ok(Some(overrides))
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
