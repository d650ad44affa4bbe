//! Filesystem access used by the tree builder and verifier
//!
//! The core only needs to list a directory, open a file for sequential
//! reading and resolve canonical paths. [`FileSystem`] captures exactly that,
//! so tests can substitute an in-memory tree or inject failures.
//! [`LocalFs`] is the real implementation on top of `walkdir`.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Classification of a directory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file (or a followed link to one)
    File,
    /// Directory (or a followed link to one)
    Directory,
    /// Anything else: unfollowed symlinks, sockets, devices
    Other,
    /// Listed, but its type could not be determined (for example a dangling
    /// link being followed); carries the reason
    Unreadable(String),
}

/// One immediate entry of a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name within its parent
    pub name: String,
    /// Full filesystem path
    pub path: PathBuf,
    /// What the entry is
    pub kind: EntryKind,
}

/// Minimal filesystem contract required to build and verify trees
pub trait FileSystem: Send + Sync {
    /// List the immediate entries of `dir`, in any order
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<DirEntry>>;

    /// Open a file for sequential reading
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>>;

    /// Resolve a stable absolute path for `path`
    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf>;

    /// Whether `path` exists and is a directory
    fn is_dir(&self, path: &Path) -> bool;
}

/// Local disk access
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs {
    follow_symlinks: bool,
}

impl LocalFs {
    /// Create a local filesystem view
    ///
    /// When `follow_symlinks` is false, symbolic links are reported as
    /// [`EntryKind::Other`] and never read through.
    pub fn new(follow_symlinks: bool) -> Self {
        Self { follow_symlinks }
    }
}

impl FileSystem for LocalFs {
    fn read_dir(&self, dir: &Path) -> io::Result<Vec<DirEntry>> {
        let walker = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(self.follow_symlinks);

        let mut entries = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                // Entry-level failure (dangling link, link loop): keep the entry.
                // Loops stay directories so the caller can report them.
                Err(e) if e.depth() > 0 => {
                    if let Some(path) = e.path() {
                        let kind = if e.loop_ancestor().is_some() {
                            EntryKind::Directory
                        } else {
                            EntryKind::Unreadable(e.to_string())
                        };
                        entries.push(DirEntry {
                            name: path
                                .file_name()
                                .map(|n| n.to_string_lossy().into_owned())
                                .unwrap_or_default(),
                            path: path.to_path_buf(),
                            kind,
                        });
                    }
                    continue;
                }
                Err(e) => return Err(walk_error_to_io(e)),
            };
            let file_type = entry.file_type();
            let kind = if file_type.is_dir() {
                EntryKind::Directory
            } else if file_type.is_file() {
                EntryKind::File
            } else {
                EntryKind::Other
            };

            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                path: entry.into_path(),
                kind,
            });
        }
        Ok(entries)
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        Ok(Box::new(std::fs::File::open(path)?))
    }

    fn canonicalize(&self, path: &Path) -> io::Result<PathBuf> {
        path.canonicalize()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }
}

fn walk_error_to_io(err: walkdir::Error) -> io::Error {
    let message = err.to_string();
    err.into_io_error()
        .unwrap_or_else(|| io::Error::other(message))
}
