//! Core data types used throughout the dirmerkle library
//!
//! This module contains the configuration and result types that are shared
//! across the builder, diff engine and verifier.
//!
//! ## Overview
//!
//! - **Configuration**: `BuildOptions`, `HashAlgorithm`, `PathStyle`
//! - **Diff results**: `Change`, `ChangeKind`, `DiffSummary`
//! - **Build bookkeeping**: `SkippedEntry`, `ProgressInfo`
//!
//! ## Examples
//!
//! ```rust
//! use dirmerkle::types::{BuildOptions, HashAlgorithm, PathStyle};
//!
//! let options = BuildOptions {
//!     algorithm: HashAlgorithm::Blake3,
//!     path_style: PathStyle::Relative,
//!     ignore_patterns: vec!["target/**".to_string()],
//!     ..Default::default()
//! };
//! assert!(!options.follow_symlinks);
//! ```

use crate::error::{DirMerkleError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Digest function used for every hash in a tree
///
/// Trees built with different algorithms never compare equal, so the
/// algorithm is part of a tree's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256, hex encoded (64 chars)
    #[default]
    Sha256,
    /// BLAKE3 with the default 256-bit output, hex encoded (64 chars)
    Blake3,
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Sha256 => write!(f, "sha256"),
            HashAlgorithm::Blake3 => write!(f, "blake3"),
        }
    }
}

/// How node path strings are formed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathStyle {
    /// Canonical absolute filesystem path of each entry
    #[default]
    Absolute,
    /// `.` for the root, `/`-separated root-relative paths below it
    Relative,
}

/// Options controlling how a directory tree is built
///
/// # Examples
///
/// ```rust
/// # use dirmerkle::types::BuildOptions;
/// let options = BuildOptions::default();
/// assert!(options.parallel_workers >= 1);
/// assert!(options.ignore_patterns.is_empty());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BuildOptions {
    /// Digest function for file and folder hashes
    pub algorithm: HashAlgorithm,
    /// Path string convention for nodes
    pub path_style: PathStyle,
    /// Glob patterns (matched against root-relative paths) to leave out
    pub ignore_patterns: Vec<String>,
    /// Whether to descend into symlinked directories and hash symlinked files
    pub follow_symlinks: bool,
    /// Worker threads for file hashing (1 = sequential)
    pub parallel_workers: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            algorithm: HashAlgorithm::default(),
            path_style: PathStyle::default(),
            ignore_patterns: Vec::new(),
            follow_symlinks: false,
            parallel_workers: num_cpus::get(),
        }
    }
}

impl BuildOptions {
    /// Load options from a JSON file; missing fields keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let options: BuildOptions = serde_json::from_str(&content).map_err(|e| {
            DirMerkleError::InvalidConfiguration(format!("{}: {}", path.display(), e))
        })?;
        options.validate()?;
        Ok(options)
    }

    /// Reject option combinations the builder cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.parallel_workers == 0 {
            return Err(DirMerkleError::InvalidConfiguration(
                "parallel_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Kind of a classified difference, ordered for output grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// File present only in the actual tree
    Added,
    /// File present only in the expected tree
    Removed,
    /// File present in both trees with different content
    Changed,
    /// Whole folder present only in the actual tree
    AddedFolder,
    /// Whole folder present only in the expected tree
    RemovedFolder,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChangeKind::Added => "added",
            ChangeKind::Removed => "removed",
            ChangeKind::Changed => "changed",
            ChangeKind::AddedFolder => "added folder",
            ChangeKind::RemovedFolder => "removed folder",
        };
        f.write_str(label)
    }
}

/// A single classified difference between two trees
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum Change {
    /// File added at this path
    Added(String),
    /// File removed from this path
    Removed(String),
    /// File content changed at this path
    Changed(String),
    /// Folder (and everything below it) added at this path
    AddedFolder(String),
    /// Folder (and everything below it) removed from this path
    RemovedFolder(String),
}

impl Change {
    /// Kind of this change
    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::Added(_) => ChangeKind::Added,
            Change::Removed(_) => ChangeKind::Removed,
            Change::Changed(_) => ChangeKind::Changed,
            Change::AddedFolder(_) => ChangeKind::AddedFolder,
            Change::RemovedFolder(_) => ChangeKind::RemovedFolder,
        }
    }

    /// Path the change applies to
    pub fn path(&self) -> &str {
        match self {
            Change::Added(p)
            | Change::Removed(p)
            | Change::Changed(p)
            | Change::AddedFolder(p)
            | Change::RemovedFolder(p) => p,
        }
    }
}

impl PartialOrd for Change {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Change {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.kind()
            .cmp(&other.kind())
            .then_with(|| self.path().cmp(other.path()))
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.path())
    }
}

/// Per-kind counts of a change list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Files added
    pub files_added: usize,
    /// Files removed
    pub files_removed: usize,
    /// Files changed
    pub files_changed: usize,
    /// Folders added
    pub folders_added: usize,
    /// Folders removed
    pub folders_removed: usize,
}

impl DiffSummary {
    /// Total number of changes
    pub fn total(&self) -> usize {
        self.files_added
            + self.files_removed
            + self.files_changed
            + self.folders_added
            + self.folders_removed
    }

    /// True when no change was recorded
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

impl<'a> FromIterator<&'a Change> for DiffSummary {
    fn from_iter<I: IntoIterator<Item = &'a Change>>(iter: I) -> Self {
        let mut summary = DiffSummary::default();
        for change in iter {
            match change.kind() {
                ChangeKind::Added => summary.files_added += 1,
                ChangeKind::Removed => summary.files_removed += 1,
                ChangeKind::Changed => summary.files_changed += 1,
                ChangeKind::AddedFolder => summary.folders_added += 1,
                ChangeKind::RemovedFolder => summary.folders_removed += 1,
            }
        }
        summary
    }
}

/// An entry the builder left out of the tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedEntry {
    /// Filesystem path of the entry
    pub path: PathBuf,
    /// Why it was skipped
    pub reason: String,
}

/// Progress information passed to build callbacks
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Current operation description
    pub operation: String,
    /// Current item being processed
    pub current_item: Option<String>,
    /// Number of files hashed so far
    pub processed: usize,
    /// Bytes hashed so far
    pub bytes_processed: u64,
}
