//! # dirmerkle - Merkle trees over directories
//!
//! A library for detecting and locating changes in directory trees by
//! hashing them into content-addressed Merkle trees.
//!
//! ## Overview
//!
//! dirmerkle answers two questions about a directory:
//! - **Has anything changed?** Compare one root hash against a snapshot.
//! - **What changed?** Walk only the subtrees whose hashes disagree and
//!   classify files as added, removed or changed, and folders as added or
//!   removed.
//!
//! ## Architecture
//!
//! - **Content Hasher**: file hash = H(hex(H(content)) ++ hex(H(path))),
//!   streamed in fixed-size chunks. SHA-256 or BLAKE3.
//! - **Tree Builder**: walks the directory with an explicit stack, sorts
//!   entries by name, hashes files in parallel and aggregates folder hashes
//!   bottom-up as H(path ++ child hashes).
//! - **Diff Engine**: hash-mismatch driven descent; unchanged subtrees are
//!   never visited.
//! - **Snapshot Codec**: JSON persistence that keeps the stored hashes, so a
//!   snapshot stays comparable after its files are gone.
//! - **Verifier**: recomputes folder aggregates or file hashes to detect
//!   tampered snapshots.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dirmerkle::{diff, snapshot, HashAlgorithm, PathStyle, TreeBuilder};
//! use std::path::Path;
//!
//! # fn main() -> dirmerkle::Result<()> {
//! // Hash a directory and store the result
//! let report = TreeBuilder::new("./my_project")
//!     .with_path_style(PathStyle::Relative)
//!     .build()?;
//! snapshot::save(&report.tree, Path::new("before.json"))?;
//!
//! // Later: rebuild and compare
//! let expected = snapshot::load(Path::new("before.json"), HashAlgorithm::Sha256)?;
//! let actual = TreeBuilder::new("./my_project")
//!     .with_path_style(PathStyle::Relative)
//!     .build()?
//!     .tree;
//!
//! if !expected.is_same(&actual) {
//!     for change in diff::diff_trees(&expected, &actual)? {
//!         println!("{}", change);
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Equality
//!
//! Two trees with equal root hashes are treated as identical. That is a
//! probabilistic statement resting on the digest's collision resistance.
//!
//! ## Error Handling
//!
//! All operations return `Result<T, DirMerkleError>`. A file that cannot be
//! read never aborts a build; it is left out of the tree and listed in
//! [`builder::BuildReport::skipped`]. A missing root, a root mismatch in a
//! diff and a malformed snapshot are returned to the caller.
//!
//! ## Module Organization
//!
//! - [`builder`]: Tree construction from a live directory
//! - [`diff`]: Structural comparison of two trees
//! - [`snapshot`]: JSON persistence
//! - [`verification`]: Integrity checks for stored trees
//! - [`tree`]: Node and tree model
//! - [`hasher`]: Digest functions
//! - [`fs`]: Filesystem abstraction
//! - [`types`]: Options and result types
//! - [`error`]: Error types

// Public API modules
pub mod builder;
pub mod diff;
pub mod error;
pub mod fs;
pub mod hasher;
pub mod snapshot;
pub mod tree;
pub mod types;
pub mod verification;

// Internal modules (not part of public API)
mod collections;
mod utils;

// Re-export main types for convenience
pub use builder::{BuildReport, TreeBuilder};
pub use error::{DirMerkleError, Result};
pub use fs::{FileSystem, LocalFs};
pub use hasher::ContentHasher;
pub use tree::{FileNode, FolderNode, Node, Tree};
pub use types::*;
pub use verification::{TreeVerifier, VerificationReport};
