//! Utility functions for dirmerkle
//!
//! Path-to-identifier conversion and atomic file writes. Everything here is
//! stateless and safe to call from rayon workers.

use crate::error::{DirMerkleError, Result};
use std::fs;
use std::path::{Component, Path};

/// Identifier of the root folder in relative path style
pub const RELATIVE_ROOT: &str = ".";

/// Lossy string form of an absolute path
pub fn path_identifier(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Root-relative identifier with `/` separators
///
/// The root itself maps to [`RELATIVE_ROOT`]. Separators are normalised so a
/// snapshot written on Windows compares equal to one written on Unix.
///
/// # Errors
///
/// - [`DirMerkleError::Internal`] if `path` is not below `base`
pub fn relative_identifier(path: &Path, base: &Path) -> Result<String> {
    let relative = path.strip_prefix(base).map_err(|_| {
        DirMerkleError::internal(format!("Path {:?} is not relative to {:?}", path, base))
    })?;

    let parts: Vec<String> = relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect();

    if parts.is_empty() {
        Ok(RELATIVE_ROOT.to_string())
    } else {
        Ok(parts.join("/"))
    }
}

/// Atomic file write (write to temp file then rename)
///
/// Either the whole content lands at `path` or the previous file is left
/// untouched.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let temp_path = path.with_extension("tmp");

    fs::write(&temp_path, content)?;
    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(e.into());
    }

    Ok(())
}
