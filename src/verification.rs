//! Tree integrity checking
//!
//! Snapshot hashes are trusted on load, so nothing stops a hand-edited or
//! corrupted document from claiming hashes its own children do not produce.
//! This module checks that at two levels:
//!
//! 1. **Aggregate level**: every folder hash is recomputed from the stored
//!    hashes of its children. No file is read.
//! 2. **File level**: every file is rehashed from disk and compared with its
//!    stored hash. Only meaningful for trees built with absolute paths.
//!
//! Failures are collected into a [`VerificationReport`]; only conditions that
//! prevent verification from running at all are returned as errors.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use dirmerkle::snapshot;
//! use dirmerkle::types::HashAlgorithm;
//! use dirmerkle::verification::TreeVerifier;
//! use std::path::Path;
//!
//! # fn main() -> dirmerkle::Result<()> {
//! let tree = snapshot::load(Path::new("snapshot.json"), HashAlgorithm::Sha256)?;
//! let report = TreeVerifier::new(HashAlgorithm::Sha256).verify_aggregates(&tree);
//! println!("{}", report.summary());
//! # Ok(())
//! # }
//! ```

use crate::error::{DirMerkleError, Result};
use crate::fs::FileSystem;
use crate::hasher::ContentHasher;
use crate::tree::{FileNode, FolderNode, Node, Tree};
use crate::types::HashAlgorithm;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// A node whose stored hash differs from the recomputed one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashMismatch {
    /// Path identifier of the node
    pub path: String,
    /// Hash stored in the tree
    pub stored: String,
    /// Hash recomputed now
    pub computed: String,
}

/// Outcome of a verification run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationReport {
    /// Folders whose aggregate was recomputed
    pub folders_checked: usize,
    /// Files rehashed from disk
    pub files_checked: usize,
    /// Nodes whose stored hash is wrong
    pub mismatches: Vec<HashMismatch>,
    /// Files that could not be read
    pub errors: Vec<String>,
    /// Time taken for verification in milliseconds
    pub verification_time_ms: u64,
}

impl VerificationReport {
    /// Check if no mismatch or error was found
    pub fn is_valid(&self) -> bool {
        self.mismatches.is_empty() && self.errors.is_empty()
    }

    /// Get a summary of the verification
    pub fn summary(&self) -> String {
        if self.is_valid() {
            format!(
                "Tree is valid ({} folders, {} files verified in {}ms)",
                self.folders_checked, self.files_checked, self.verification_time_ms
            )
        } else {
            format!(
                "Tree is invalid: {} hash mismatches, {} errors ({} folders, {} files checked)",
                self.mismatches.len(),
                self.errors.len(),
                self.folders_checked,
                self.files_checked
            )
        }
    }
}

/// Recomputes hashes of a tree and compares them with the stored ones
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeVerifier {
    hasher: ContentHasher,
}

impl TreeVerifier {
    /// Create a verifier for trees hashed with `algorithm`
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self {
            hasher: ContentHasher::new(algorithm),
        }
    }

    /// Recompute every folder hash from its stored children
    ///
    /// Catches edited or truncated snapshots, and snapshots verified with
    /// the wrong algorithm, without touching the filesystem.
    pub fn verify_aggregates(&self, tree: &Tree) -> VerificationReport {
        let start = Instant::now();
        let mut report = VerificationReport::default();

        let folders = std::iter::once(tree.root()).chain(tree.iter().filter_map(Node::as_folder));
        for folder in folders {
            report.folders_checked += 1;
            if let Some(mismatch) = self.check_folder(folder) {
                debug!("Aggregate mismatch at {}", mismatch.path);
                report.mismatches.push(mismatch);
            }
        }

        report.verification_time_ms = start.elapsed().as_millis() as u64;
        info!(
            "Verified {} folder aggregates in {}ms: {} mismatches",
            report.folders_checked,
            report.verification_time_ms,
            report.mismatches.len()
        );
        report
    }

    /// Rehash every file from `filesystem` and compare with the stored hash
    ///
    /// # Errors
    ///
    /// - [`DirMerkleError::InvalidConfiguration`] if the tree uses relative
    ///   paths, since they cannot be resolved to files
    pub fn verify_files(&self, tree: &Tree, filesystem: &dyn FileSystem) -> Result<VerificationReport> {
        if !Path::new(tree.root().path()).is_absolute() {
            return Err(DirMerkleError::InvalidConfiguration(format!(
                "file verification needs absolute paths, tree is rooted at '{}'",
                tree.root().path()
            )));
        }

        let start = Instant::now();
        let files: Vec<&FileNode> = tree.iter().filter_map(Node::as_file).collect();

        let outcomes: Vec<FileOutcome> = files
            .par_iter()
            .map(|file| self.check_file(file, filesystem))
            .collect();

        let mut report = VerificationReport {
            files_checked: files.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome {
                FileOutcome::Valid => {}
                FileOutcome::Mismatch(mismatch) => report.mismatches.push(mismatch),
                FileOutcome::Error(message) => {
                    warn!("{}", message);
                    report.errors.push(message);
                }
            }
        }

        report.verification_time_ms = start.elapsed().as_millis() as u64;
        info!(
            "Verified {} files in {}ms: {} mismatches, {} errors",
            report.files_checked,
            report.verification_time_ms,
            report.mismatches.len(),
            report.errors.len()
        );
        Ok(report)
    }

    fn check_folder(&self, folder: &FolderNode) -> Option<HashMismatch> {
        let computed = folder.recompute_hash(&self.hasher);
        (computed != folder.hash()).then(|| HashMismatch {
            path: folder.path().to_string(),
            stored: folder.hash().to_string(),
            computed,
        })
    }

    fn check_file(&self, file: &FileNode, filesystem: &dyn FileSystem) -> FileOutcome {
        let reader = match filesystem.open(Path::new(file.path())) {
            Ok(reader) => reader,
            Err(e) => return FileOutcome::Error(format!("Cannot open {}: {}", file.path(), e)),
        };
        match self.hasher.hash_file(file.path(), reader) {
            Ok(computed) if computed == file.hash() => FileOutcome::Valid,
            Ok(computed) => FileOutcome::Mismatch(HashMismatch {
                path: file.path().to_string(),
                stored: file.hash().to_string(),
                computed,
            }),
            Err(e) => FileOutcome::Error(e.to_string()),
        }
    }
}

enum FileOutcome {
    Valid,
    Mismatch(HashMismatch),
    Error(String),
}
