//! Snapshot persistence
//!
//! A snapshot is a JSON document mirroring the tree recursively:
//!
//! ```json
//! {
//!   "path": ".",
//!   "hash": "9f2c...",
//!   "children": [
//!     { "path": "a.txt", "hash": "31b0..." },
//!     { "path": "b", "hash": "c4d1...", "children": [] }
//!   ]
//! }
//! ```
//!
//! A document with `children` (possibly empty) is a folder; one without is a
//! file. Stored hashes are trusted on load and never recomputed, so a
//! snapshot can be compared against a live tree even after the files it was
//! taken from are gone. Use [`crate::verification::TreeVerifier`] to check a
//! snapshot's internal consistency.
//!
//! The document does not record the digest algorithm; callers pass the one
//! the snapshot was written with.

use crate::error::{DirMerkleError, Result};
use crate::tree::{FileNode, FolderNode, Node, Tree};
use crate::types::HashAlgorithm;
use crate::utils::atomic_write;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info};

/// Borrowed view used for encoding
#[derive(Serialize)]
struct NodeRef<'a> {
    path: &'a str,
    hash: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    children: Option<Vec<NodeRef<'a>>>,
}

impl<'a> NodeRef<'a> {
    fn from_node(node: &'a Node) -> Self {
        match node {
            Node::File(file) => NodeRef {
                path: file.path(),
                hash: file.hash(),
                children: None,
            },
            Node::Folder(folder) => Self::from_folder(folder),
        }
    }

    fn from_folder(folder: &'a FolderNode) -> Self {
        NodeRef {
            path: folder.path(),
            hash: folder.hash(),
            children: Some(folder.children().iter().map(Self::from_node).collect()),
        }
    }
}

/// Owned document used for decoding
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct NodeDocument {
    path: String,
    hash: String,
    #[serde(default)]
    children: Option<Vec<NodeDocument>>,
}

impl NodeDocument {
    fn check(&self) -> Result<()> {
        if self.path.is_empty() {
            return Err(DirMerkleError::malformed("node with empty path"));
        }
        if self.hash.is_empty() {
            return Err(DirMerkleError::malformed(format!(
                "node {} has an empty hash",
                self.path
            )));
        }
        Ok(())
    }
}

/// Folder whose children are still being converted
struct OpenFolder {
    path: String,
    hash: String,
    pending: std::vec::IntoIter<NodeDocument>,
    children: Vec<Node>,
}

impl OpenFolder {
    fn new(path: String, hash: String, children: Vec<NodeDocument>) -> Self {
        let converted = Vec::with_capacity(children.len());
        Self {
            path,
            hash,
            pending: children.into_iter(),
            children: converted,
        }
    }
}

/// Encode a tree as pretty-printed JSON
pub fn encode(tree: &Tree) -> Result<String> {
    Ok(serde_json::to_string_pretty(&NodeRef::from_folder(tree.root()))?)
}

/// Write a tree as pretty-printed JSON to `writer`
pub fn to_writer<W: Write>(tree: &Tree, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, &NodeRef::from_folder(tree.root()))?;
    Ok(())
}

/// Decode a snapshot document
///
/// Nesting depth is not limited; deep documents grow the stack on demand
/// instead of overflowing it.
///
/// # Errors
///
/// - [`DirMerkleError::MalformedSnapshot`] if the text is not valid JSON, a
///   node lacks `path` or `hash`, a field has the wrong type, a path or hash
///   is empty, or the root document is a file
pub fn decode(text: &str, algorithm: HashAlgorithm) -> Result<Tree> {
    let document = read_document(&mut serde_json::Deserializer::from_str(text))?;
    into_tree(document, algorithm)
}

/// Decode a snapshot document from `reader`
pub fn from_reader<R: Read>(reader: R, algorithm: HashAlgorithm) -> Result<Tree> {
    let document = read_document(&mut serde_json::Deserializer::from_reader(reader))?;
    into_tree(document, algorithm)
}

fn read_document<'de, R: serde_json::de::Read<'de>>(
    de: &mut serde_json::Deserializer<R>,
) -> Result<NodeDocument> {
    de.disable_recursion_limit();
    let document = NodeDocument::deserialize(serde_stacker::Deserializer::new(&mut *de))
        .map_err(|e| DirMerkleError::malformed(e.to_string()))?;
    de.end().map_err(|e| DirMerkleError::malformed(e.to_string()))?;
    Ok(document)
}

/// Convert a decoded document into a tree with an explicit stack of open
/// folders, so conversion depth is bounded by the heap
fn into_tree(document: NodeDocument, algorithm: HashAlgorithm) -> Result<Tree> {
    document.check()?;
    let children = document.children.ok_or_else(|| {
        DirMerkleError::malformed(format!(
            "root {} is a file, expected a folder",
            document.path
        ))
    })?;
    let mut stack = vec![OpenFolder::new(document.path, document.hash, children)];

    while let Some(open) = stack.last_mut() {
        if let Some(child) = open.pending.next() {
            child.check()?;
            match child.children {
                None => open.children.push(FileNode::new(child.path, child.hash).into()),
                Some(grandchildren) => {
                    stack.push(OpenFolder::new(child.path, child.hash, grandchildren))
                }
            }
            continue;
        }

        let Some(done) = stack.pop() else { break };
        let folder = FolderNode::with_hash(done.path, done.children, done.hash);
        match stack.last_mut() {
            Some(parent) => parent.children.push(folder.into()),
            None => return Ok(Tree::new(folder, algorithm)),
        }
    }

    Err(DirMerkleError::internal("snapshot conversion ended without a root"))
}

/// Save a tree to `path`, replacing any previous snapshot atomically
pub fn save(tree: &Tree, path: &Path) -> Result<()> {
    let json = encode(tree)?;
    atomic_write(path, json.as_bytes())?;
    info!(
        "Saved snapshot of {} ({} files) to {:?}",
        tree.root().path(),
        tree.file_count(),
        path
    );
    Ok(())
}

/// Load a snapshot from `path`
///
/// # Errors
///
/// - [`DirMerkleError::Io`] if the file cannot be read
/// - [`DirMerkleError::MalformedSnapshot`] as for [`decode`]
pub fn load(path: &Path, algorithm: HashAlgorithm) -> Result<Tree> {
    let text = std::fs::read_to_string(path)?;
    let tree = decode(&text, algorithm)?;
    debug!("Loaded snapshot {:?} rooted at {}", path, tree.root().path());
    Ok(tree)
}
