//! Structural diff between two directory trees
//!
//! The diff engine compares an *expected* tree (typically a stored snapshot)
//! with an *actual* one (typically a fresh build of the same directory) and
//! classifies what differs, descending only where hashes disagree.
//!
//! ## Algorithm
//!
//! For each pair of folders with the same path:
//!
//! 1. Equal folder hashes end the comparison for the whole subtree.
//! 2. Children whose hash occurs anywhere among the other side's children
//!    are treated as unchanged. This is content identity, not positional or
//!    path identity.
//! 3. Remaining files are reconciled by path: a path on both sides is
//!    `Changed`, otherwise `Removed` (expected only) or `Added` (actual only).
//! 4. Remaining folders are reconciled by path: a path on both sides is
//!    compared recursively, otherwise the whole folder is reported once as
//!    `RemovedFolder` or `AddedFolder` without listing its contents.
//!
//! A renamed folder therefore shows up as one removal plus one addition,
//! since matching among mismatched folders is by path only.
//!
//! ## Duplicate Hashes
//!
//! Matching in step 2 is set membership. If two children on one side share
//! a hash and only one of them survives on the other side, both count as
//! matched and the lost one is not reported. Hashes mix in the node path, so
//! this cannot happen in trees built by [`crate::builder`]; it can only
//! arise from hand-edited snapshots.
//!
//! ## Output
//!
//! Changes are sorted by kind, then path, so output is reproducible even
//! though sibling folder pairs are compared in parallel.
//!
//! ## Example
//!
//! ```rust,no_run
//! use dirmerkle::{builder::TreeBuilder, diff, snapshot, types::HashAlgorithm};
//! use std::path::Path;
//!
//! # fn main() -> dirmerkle::Result<()> {
//! let expected = snapshot::load(Path::new("before.json"), HashAlgorithm::Sha256)?;
//! let actual = TreeBuilder::new("./project").build()?.tree;
//!
//! for change in diff::diff_trees(&expected, &actual)? {
//!     println!("{}", change);
//! }
//! # Ok(())
//! # }
//! ```

use crate::collections::str_set;
use crate::error::{DirMerkleError, Result};
use crate::tree::{FolderNode, Node, Tree};
use crate::types::{Change, DiffSummary};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Compare two folders that describe the same logical root
///
/// # Errors
///
/// - [`DirMerkleError::RootMismatch`] if the folder paths differ
pub fn diff(expected: &FolderNode, actual: &FolderNode) -> Result<Vec<Change>> {
    if expected.path() != actual.path() {
        return Err(DirMerkleError::RootMismatch {
            expected: expected.path().to_string(),
            actual: actual.path().to_string(),
        });
    }

    let start = Instant::now();
    let mut changes = diff_folders(expected, actual);
    changes.sort();

    info!(
        "Diffed {}: {} changes in {:?}",
        expected.path(),
        changes.len(),
        start.elapsed()
    );
    Ok(changes)
}

/// Compare two trees that describe the same logical root
///
/// Trees hashed with different algorithms never share a hash, so every
/// file shows up as changed; this is logged but not rejected.
pub fn diff_trees(expected: &Tree, actual: &Tree) -> Result<Vec<Change>> {
    if expected.algorithm() != actual.algorithm() {
        warn!(
            "Comparing trees hashed with {} and {}; every entry will differ",
            expected.algorithm(),
            actual.algorithm()
        );
    }
    diff(expected.root(), actual.root())
}

/// Count changes per kind
pub fn summarize(changes: &[Change]) -> DiffSummary {
    changes.iter().collect()
}

fn diff_folders(expected: &FolderNode, actual: &FolderNode) -> Vec<Change> {
    if expected.hash() == actual.hash() {
        return Vec::new();
    }
    debug!("Hash mismatch at {}, descending", expected.path());

    let expected_hashes = str_set(expected.children().iter().map(Node::hash));
    let actual_hashes = str_set(actual.children().iter().map(Node::hash));

    let unmatched_expected: Vec<&Node> = expected
        .children()
        .iter()
        .filter(|node| !actual_hashes.contains(node.hash()))
        .collect();
    let unmatched_actual: Vec<&Node> = actual
        .children()
        .iter()
        .filter(|node| !expected_hashes.contains(node.hash()))
        .collect();

    let mut changes = Vec::new();

    let expected_file_paths = str_set(
        unmatched_expected
            .iter()
            .filter_map(|node| node.as_file())
            .map(|file| file.path()),
    );
    let actual_file_paths = str_set(
        unmatched_actual
            .iter()
            .filter_map(|node| node.as_file())
            .map(|file| file.path()),
    );

    for file in unmatched_expected.iter().filter_map(|node| node.as_file()) {
        if actual_file_paths.contains(file.path()) {
            changes.push(Change::Changed(file.path().to_string()));
        } else {
            changes.push(Change::Removed(file.path().to_string()));
        }
    }
    for file in unmatched_actual.iter().filter_map(|node| node.as_file()) {
        if !expected_file_paths.contains(file.path()) {
            changes.push(Change::Added(file.path().to_string()));
        }
    }

    let actual_folders: Vec<&FolderNode> = unmatched_actual
        .iter()
        .filter_map(|node| node.as_folder())
        .collect();

    let mut pairs = Vec::new();
    for folder in unmatched_expected.iter().filter_map(|node| node.as_folder()) {
        match actual_folders.iter().find(|other| other.path() == folder.path()) {
            Some(other) => pairs.push((folder, *other)),
            None => changes.push(Change::RemovedFolder(folder.path().to_string())),
        }
    }

    let paired_paths = str_set(pairs.iter().map(|(folder, _)| folder.path()));
    for folder in &actual_folders {
        if !paired_paths.contains(folder.path()) {
            changes.push(Change::AddedFolder(folder.path().to_string()));
        }
    }

    let nested: Vec<Vec<Change>> = pairs
        .par_iter()
        .map(|(expected, actual)| diff_folders(expected, actual))
        .collect();
    changes.extend(nested.into_iter().flatten());

    changes
}
