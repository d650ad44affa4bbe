//! Directory Merkle tree model
//!
//! A [`Tree`] owns a root [`FolderNode`]. Every node carries a path string and
//! a digest; folder digests aggregate their children bottom-up:
//!
//! ```text
//!                 /root  H(path ++ H(a) ++ H(b))
//!                /      \
//!       a.txt  H(a)     b/  H(path ++ H(c))
//!                          \
//!                        b/c.txt  H(c)
//! ```
//!
//! Folder digests are computed once when the folder is constructed and
//! stored as plain fields. Children can never be mutated afterwards, so the
//! stored value always equals the aggregate of the stored children, except
//! for snapshot-decoded folders whose hashes are trusted as written (see
//! [`crate::verification`] for checking those).
//!
//! ## Equality Contract
//!
//! Two trees with the same root hash are treated as identical. This is a
//! probabilistic guarantee that rests on the collision resistance of the
//! configured digest, not a byte-for-byte proof.

use crate::hasher::ContentHasher;
use crate::types::HashAlgorithm;

/// Leaf node: one regular file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNode {
    path: String,
    hash: String,
}

impl FileNode {
    /// Create a file node from a precomputed digest
    pub fn new(path: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            hash: hash.into(),
        }
    }

    /// Path identifier
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Digest of content combined with path
    pub fn hash(&self) -> &str {
        &self.hash
    }
}

/// Interior node: one directory and its ordered children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderNode {
    path: String,
    children: Vec<Node>,
    hash: String,
}

impl FolderNode {
    /// Create a folder and aggregate its hash from the children in order
    pub fn new(hasher: &ContentHasher, path: impl Into<String>, children: Vec<Node>) -> Self {
        let path = path.into();
        let hash = aggregate_hash(hasher, &path, &children);
        Self {
            path,
            children,
            hash,
        }
    }

    /// Create a folder with a hash that is trusted rather than recomputed
    ///
    /// Used when decoding snapshots: the stored hash stays authoritative even
    /// if the files it was derived from no longer exist.
    pub fn with_hash(path: impl Into<String>, children: Vec<Node>, hash: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            children,
            hash: hash.into(),
        }
    }

    /// Path identifier
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Aggregate digest of this folder
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Children in stored (name-sorted for built trees) order
    pub fn children(&self) -> &[Node] {
        &self.children
    }

    /// Whether the folder has no children
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Recompute this folder's aggregate from the children's stored hashes
    pub fn recompute_hash(&self, hasher: &ContentHasher) -> String {
        aggregate_hash(hasher, &self.path, &self.children)
    }

    /// File children, in order
    pub fn files(&self) -> impl Iterator<Item = &FileNode> {
        self.children.iter().filter_map(Node::as_file)
    }

    /// Folder children, in order
    pub fn folders(&self) -> impl Iterator<Item = &FolderNode> {
        self.children.iter().filter_map(Node::as_folder)
    }
}

fn aggregate_hash(hasher: &ContentHasher, path: &str, children: &[Node]) -> String {
    hasher.folder_hash(path, children.iter().map(Node::hash))
}

/// A tree node: either a file or a folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Regular file
    File(FileNode),
    /// Directory
    Folder(FolderNode),
}

impl Node {
    /// Path identifier
    pub fn path(&self) -> &str {
        match self {
            Node::File(file) => file.path(),
            Node::Folder(folder) => folder.path(),
        }
    }

    /// Node digest
    pub fn hash(&self) -> &str {
        match self {
            Node::File(file) => file.hash(),
            Node::Folder(folder) => folder.hash(),
        }
    }

    /// File view of this node, if it is one
    pub fn as_file(&self) -> Option<&FileNode> {
        match self {
            Node::File(file) => Some(file),
            Node::Folder(_) => None,
        }
    }

    /// Folder view of this node, if it is one
    pub fn as_folder(&self) -> Option<&FolderNode> {
        match self {
            Node::File(_) => None,
            Node::Folder(folder) => Some(folder),
        }
    }

    /// Whether this node is a folder
    pub fn is_folder(&self) -> bool {
        matches!(self, Node::Folder(_))
    }
}

impl From<FileNode> for Node {
    fn from(file: FileNode) -> Self {
        Node::File(file)
    }
}

impl From<FolderNode> for Node {
    fn from(folder: FolderNode) -> Self {
        Node::Folder(folder)
    }
}

/// A complete directory snapshot rooted at one folder
///
/// # Example
///
/// ```rust
/// use dirmerkle::hasher::ContentHasher;
/// use dirmerkle::tree::{FileNode, FolderNode, Tree};
/// use dirmerkle::types::HashAlgorithm;
///
/// let hasher = ContentHasher::new(HashAlgorithm::Sha256);
/// let file = FileNode::new("a.txt", hasher.hash_file("a.txt", &b"hello"[..]).unwrap());
/// let root = FolderNode::new(&hasher, ".", vec![file.into()]);
/// let tree = Tree::new(root, HashAlgorithm::Sha256);
///
/// assert_eq!(tree.file_count(), 1);
/// assert!(tree.is_same(&tree.clone()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    root: FolderNode,
    algorithm: HashAlgorithm,
}

impl Tree {
    /// Wrap a finished root folder
    pub fn new(root: FolderNode, algorithm: HashAlgorithm) -> Self {
        Self { root, algorithm }
    }

    /// Root folder
    pub fn root(&self) -> &FolderNode {
        &self.root
    }

    /// Consume the tree, returning its root
    pub fn into_root(self) -> FolderNode {
        self.root
    }

    /// Digest algorithm the hashes were produced with
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Root digest
    pub fn root_hash(&self) -> &str {
        self.root.hash()
    }

    /// Whether both trees have the same root hash
    ///
    /// Equal root hashes are declared identical; this holds with the
    /// probability of the digest being collision-free.
    pub fn is_same(&self, other: &Tree) -> bool {
        self.root_hash() == other.root_hash()
    }

    /// All descendants of the root, depth-first pre-order
    pub fn iter(&self) -> Descendants<'_> {
        Descendants {
            stack: vec![self.root.children.iter()],
        }
    }

    /// Number of file nodes
    pub fn file_count(&self) -> usize {
        self.iter().filter(|node| !node.is_folder()).count()
    }

    /// Number of folder nodes, the root included
    pub fn folder_count(&self) -> usize {
        1 + self.iter().filter(|node| node.is_folder()).count()
    }

    /// Find a descendant by its path identifier
    pub fn find(&self, path: &str) -> Option<&Node> {
        self.iter().find(|node| node.path() == path)
    }
}

/// Pre-order iterator over a tree's descendants
pub struct Descendants<'a> {
    stack: Vec<std::slice::Iter<'a, Node>>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let level = self.stack.last_mut()?;
            match level.next() {
                Some(node) => {
                    if let Node::Folder(folder) = node {
                        self.stack.push(folder.children.iter());
                    }
                    return Some(node);
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}
