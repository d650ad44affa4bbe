//! Tree construction from a live directory
//!
//! [`TreeBuilder`] walks a directory and produces a [`Tree`] whose structure
//! mirrors the filesystem, with every file hashed by a [`ContentHasher`] and
//! every folder aggregated bottom-up.
//!
//! ## Traversal
//!
//! The walk is a pre-order traversal driven by an explicit stack. Folders
//! live in a flat arena and refer to their sub-folders by arena index, so
//! attaching an entry to its parent never searches the tree. Once the walk
//! is over, the arena is folded in reverse index order (children are always
//! allocated after their parent) into immutable [`FolderNode`]s.
//!
//! ## Ordering
//!
//! Entries of every directory are sorted by name (byte-wise on the lossy
//! UTF-8 name, ties broken by the raw OS name) before they are attached.
//! Folder hashes depend on child order, so this is what makes two builds of
//! an unchanged directory agree no matter how the filesystem enumerates
//! entries.
//!
//! Path identifiers are lossy UTF-8 as well, so two non-UTF-8 names that
//! differ only in their invalid bytes get the same identifier. They stay
//! separate nodes in a fixed order, but `find` and the diff cannot tell them
//! apart by path.
//!
//! ## Parallelism
//!
//! The files of one directory are hashed on a rayon pool. Results are
//! collected positionally, never in completion order, so parallel and
//! sequential builds produce identical hashes.
//!
//! ## Unreadable Entries
//!
//! A file that cannot be opened or fully read, or a sub-directory that
//! cannot be listed, is **omitted** from the tree and recorded in
//! [`BuildReport::skipped`]. Omission changes the tree's shape, and a diff
//! against a tree that does include the entry reports it as removed or
//! added. Trees built by users with different permissions may therefore
//! differ in hash. Only an unusable root aborts the build.
//!
//! ## Example
//!
//! ```rust,no_run
//! use dirmerkle::builder::TreeBuilder;
//! use dirmerkle::types::PathStyle;
//!
//! # fn main() -> dirmerkle::Result<()> {
//! let report = TreeBuilder::new("./my_project")
//!     .with_path_style(PathStyle::Relative)
//!     .with_ignore_patterns(vec!["target".to_string(), "*.log".to_string()])
//!     .build()?;
//!
//! println!("root hash: {}", report.tree.root_hash());
//! for skipped in &report.skipped {
//!     println!("skipped {}: {}", skipped.path.display(), skipped.reason);
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{DirMerkleError, Result};
use crate::fs::{DirEntry, EntryKind, FileSystem, LocalFs};
use crate::hasher::ContentHasher;
use crate::tree::{FileNode, FolderNode, Node, Tree};
use crate::types::{BuildOptions, HashAlgorithm, PathStyle, ProgressInfo, SkippedEntry};
use crate::utils;
use globset::{Glob, GlobSet, GlobSetBuilder};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Result of a tree build
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// The finished tree
    pub tree: Tree,
    /// Entries left out because they could not be read
    pub skipped: Vec<SkippedEntry>,
    /// Number of files hashed into the tree
    pub files_hashed: usize,
    /// Bytes read while hashing
    pub bytes_hashed: u64,
    /// Wall-clock build time
    pub duration: Duration,
}

/// Builds Merkle trees from directories
///
/// ## Configuration Options
///
/// - `algorithm`: digest used for all hashes (default SHA-256)
/// - `path_style`: absolute canonical paths or root-relative identifiers
/// - `ignore_patterns`: globs matched against root-relative paths
/// - `follow_symlinks`: whether links are read through
/// - `parallel_workers`: threads used for file hashing
#[derive(Clone)]
pub struct TreeBuilder {
    root_path: PathBuf,
    options: BuildOptions,
    filesystem: Option<Arc<dyn FileSystem>>,
}

impl std::fmt::Debug for TreeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeBuilder")
            .field("root_path", &self.root_path)
            .field("options", &self.options)
            .field("custom_filesystem", &self.filesystem.is_some())
            .finish()
    }
}

impl TreeBuilder {
    /// Create a builder for `root_path` with default options
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
            options: BuildOptions::default(),
            filesystem: None,
        }
    }

    /// Replace all options at once
    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the digest algorithm
    pub fn with_algorithm(mut self, algorithm: HashAlgorithm) -> Self {
        self.options.algorithm = algorithm;
        self
    }

    /// Set how node paths are written
    pub fn with_path_style(mut self, path_style: PathStyle) -> Self {
        self.options.path_style = path_style;
        self
    }

    /// Set glob patterns for entries to leave out
    ///
    /// Patterns are matched against root-relative `/`-separated paths. A
    /// matching directory is skipped with everything below it.
    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.options.ignore_patterns = patterns;
        self
    }

    /// Set symbolic link following behavior
    ///
    /// Only affects the default local filesystem; a custom filesystem decides
    /// on its own how links are classified.
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.options.follow_symlinks = follow;
        self
    }

    /// Set number of parallel workers (minimum 1)
    pub fn with_parallel_workers(mut self, workers: usize) -> Self {
        self.options.parallel_workers = workers.max(1);
        self
    }

    /// Read through a custom filesystem instead of local disk
    pub fn with_filesystem(mut self, filesystem: Arc<dyn FileSystem>) -> Self {
        self.filesystem = Some(filesystem);
        self
    }

    /// Options currently configured
    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Build the tree
    ///
    /// # Errors
    ///
    /// - [`DirMerkleError::NotADirectory`] if the root is missing, not a
    ///   directory, or cannot be listed
    /// - [`DirMerkleError::InvalidPattern`] if an ignore pattern is invalid
    /// - [`DirMerkleError::InvalidConfiguration`] for unusable options
    pub fn build(&self) -> Result<BuildReport> {
        self.build_with_progress::<fn(ProgressInfo)>(None)
    }

    /// Build the tree, reporting every hashed file to `progress_callback`
    ///
    /// The callback runs on rayon workers and must be cheap.
    pub fn build_with_progress<F>(&self, progress_callback: Option<F>) -> Result<BuildReport>
    where
        F: Fn(ProgressInfo) + Send + Sync,
    {
        self.options.validate()?;
        let start = Instant::now();

        let filesystem: Arc<dyn FileSystem> = match &self.filesystem {
            Some(fs) => Arc::clone(fs),
            None => Arc::new(LocalFs::new(self.options.follow_symlinks)),
        };

        if !filesystem.is_dir(&self.root_path) {
            return Err(DirMerkleError::NotADirectory(self.root_path.clone()));
        }
        let root = filesystem
            .canonicalize(&self.root_path)
            .map_err(|_| DirMerkleError::NotADirectory(self.root_path.clone()))?;

        let ignore = build_ignore_set(&self.options.ignore_patterns)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.parallel_workers)
            .build()?;

        let mut walk = Walk {
            filesystem,
            hasher: ContentHasher::new(self.options.algorithm),
            root,
            path_style: self.options.path_style,
            follow_symlinks: self.options.follow_symlinks,
            ignore,
            arena: Vec::new(),
            skipped: Mutex::new(Vec::new()),
            files_hashed: AtomicUsize::new(0),
            bytes_hashed: AtomicU64::new(0),
            progress: progress_callback.as_ref(),
        };

        pool.install(|| walk.run())?;

        let files_hashed = walk.files_hashed.load(Ordering::Relaxed);
        let bytes_hashed = walk.bytes_hashed.load(Ordering::Relaxed);
        let mut skipped = std::mem::take(&mut *walk.skipped.lock());
        skipped.sort_by(|a, b| a.path.cmp(&b.path));
        let folder_count = walk.arena.len();
        let root_folder = walk.finish()?;

        let tree = Tree::new(root_folder, self.options.algorithm);
        let duration = start.elapsed();
        info!(
            "Built tree for {:?}: {} files, {} folders, {} skipped, {} bytes in {:?} (root {})",
            self.root_path,
            files_hashed,
            folder_count,
            skipped.len(),
            bytes_hashed,
            duration,
            tree.root_hash()
        );

        Ok(BuildReport {
            tree,
            skipped,
            files_hashed,
            bytes_hashed,
            duration,
        })
    }
}

fn build_ignore_set(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(Some(builder.build()?))
}

/// Folder under construction
struct ArenaFolder {
    /// Node identifier
    path: String,
    /// Where to list it
    fs_path: PathBuf,
    /// Arena index of the parent folder
    parent: Option<usize>,
    /// Resolved location, kept only when following links
    canonical: Option<PathBuf>,
    /// Children in name order
    slots: Vec<Slot>,
    /// False once listing failed; the folder is then dropped from its parent
    readable: bool,
}

enum Slot {
    File(FileNode),
    Folder(usize),
}

/// Child waiting to be hashed or walked
enum Pending {
    File { id: String, fs_path: PathBuf },
    Folder(usize),
}

/// Mutable state of one build
struct Walk<'p, F> {
    filesystem: Arc<dyn FileSystem>,
    hasher: ContentHasher,
    root: PathBuf,
    path_style: PathStyle,
    follow_symlinks: bool,
    ignore: Option<GlobSet>,
    arena: Vec<ArenaFolder>,
    skipped: Mutex<Vec<SkippedEntry>>,
    files_hashed: AtomicUsize,
    bytes_hashed: AtomicU64,
    progress: Option<&'p F>,
}

impl<F> Walk<'_, F>
where
    F: Fn(ProgressInfo) + Send + Sync,
{
    fn run(&mut self) -> Result<()> {
        let root_id = match self.path_style {
            PathStyle::Absolute => utils::path_identifier(&self.root),
            PathStyle::Relative => utils::RELATIVE_ROOT.to_string(),
        };
        let root_canonical = self.follow_symlinks.then(|| self.root.clone());
        self.arena.push(ArenaFolder {
            path: root_id,
            fs_path: self.root.clone(),
            parent: None,
            canonical: root_canonical,
            slots: Vec::new(),
            readable: true,
        });

        let mut stack = vec![0usize];
        while let Some(index) = stack.pop() {
            let fs_path = self.arena[index].fs_path.clone();
            let mut entries = match self.filesystem.read_dir(&fs_path) {
                Ok(entries) => entries,
                Err(_) if index == 0 => {
                    return Err(DirMerkleError::NotADirectory(fs_path));
                }
                Err(e) => {
                    warn!("Skipping unlistable directory {:?}: {}", fs_path, e);
                    self.record_skip(fs_path, format!("cannot list directory: {}", e));
                    self.arena[index].readable = false;
                    continue;
                }
            };
            entries.sort_by(|a, b| {
                a.name
                    .cmp(&b.name)
                    .then_with(|| a.path.file_name().cmp(&b.path.file_name()))
            });
            trace!("Listing {:?}: {} entries", fs_path, entries.len());

            let mut pending = Vec::with_capacity(entries.len());
            let mut new_folders = Vec::new();
            for entry in entries {
                if let Some(item) = self.admit(index, entry)? {
                    if let Pending::Folder(child) = item {
                        new_folders.push(child);
                    }
                    pending.push(item);
                }
            }

            let slots = self.resolve(pending);
            self.arena[index].slots = slots;

            // Reverse so the stack pops folders in name order
            stack.extend(new_folders.into_iter().rev());
        }

        Ok(())
    }

    /// Decide what to do with one directory entry
    fn admit(&mut self, parent: usize, entry: DirEntry) -> Result<Option<Pending>> {
        let relative = utils::relative_identifier(&entry.path, &self.root)?;
        if let Some(ignore) = &self.ignore {
            if ignore.is_match(&relative) {
                debug!("Ignoring {:?}", entry.path);
                return Ok(None);
            }
        }

        let id = match self.path_style {
            PathStyle::Absolute => utils::path_identifier(&entry.path),
            PathStyle::Relative => relative,
        };

        match entry.kind {
            EntryKind::File => Ok(Some(Pending::File {
                id,
                fs_path: entry.path,
            })),
            EntryKind::Directory => {
                let canonical = if self.follow_symlinks {
                    match self.filesystem.canonicalize(&entry.path) {
                        Ok(canonical) => {
                            if self.is_ancestor(parent, &canonical) {
                                warn!("Skipping symlink loop at {:?}", entry.path);
                                self.record_skip(entry.path, "symlink loop".to_string());
                                return Ok(None);
                            }
                            Some(canonical)
                        }
                        Err(e) => {
                            warn!("Skipping unresolvable directory {:?}: {}", entry.path, e);
                            self.record_skip(entry.path, format!("cannot resolve directory: {}", e));
                            return Ok(None);
                        }
                    }
                } else {
                    None
                };

                let index = self.arena.len();
                self.arena.push(ArenaFolder {
                    path: id,
                    fs_path: entry.path,
                    parent: Some(parent),
                    canonical,
                    slots: Vec::new(),
                    readable: true,
                });
                Ok(Some(Pending::Folder(index)))
            }
            EntryKind::Other => {
                trace!("Skipping non-regular entry {:?}", entry.path);
                Ok(None)
            }
            EntryKind::Unreadable(reason) => {
                warn!("Skipping unreadable entry {:?}: {}", entry.path, reason);
                self.record_skip(entry.path, format!("cannot read entry: {}", reason));
                Ok(None)
            }
        }
    }

    fn is_ancestor(&self, mut index: usize, canonical: &Path) -> bool {
        loop {
            let folder = &self.arena[index];
            if folder.canonical.as_deref() == Some(canonical) {
                return true;
            }
            match folder.parent {
                Some(parent) => index = parent,
                None => return false,
            }
        }
    }

    /// Hash pending files in parallel, keeping positions
    fn resolve(&self, pending: Vec<Pending>) -> Vec<Slot> {
        pending
            .into_par_iter()
            .map(|item| match item {
                Pending::Folder(index) => Some(Slot::Folder(index)),
                Pending::File { id, fs_path } => match self.hash_file(&id, &fs_path) {
                    Ok(hash) => Some(Slot::File(FileNode::new(id, hash))),
                    Err(e) => {
                        warn!("Skipping unreadable file {:?}: {}", fs_path, e);
                        self.record_skip(fs_path, e.to_string());
                        None
                    }
                },
            })
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    }

    fn hash_file(&self, id: &str, fs_path: &Path) -> Result<String> {
        let reader = self
            .filesystem
            .open(fs_path)
            .map_err(|e| DirMerkleError::unreadable(fs_path, e))?;
        let counting = CountingReader {
            inner: reader,
            counter: &self.bytes_hashed,
        };
        let hash = self.hasher.hash_file(id, counting).map_err(|e| match e {
            DirMerkleError::Unreadable { source, .. } => DirMerkleError::unreadable(fs_path, source),
            other => other,
        })?;

        let processed = self.files_hashed.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(callback) = self.progress {
            callback(ProgressInfo {
                operation: "Hashing files".to_string(),
                current_item: Some(id.to_string()),
                processed,
                bytes_processed: self.bytes_hashed.load(Ordering::Relaxed),
            });
        }
        Ok(hash)
    }

    fn record_skip(&self, path: PathBuf, reason: String) {
        self.skipped.lock().push(SkippedEntry { path, reason });
    }

    /// Fold the arena into immutable folders, deepest indices first
    fn finish(self) -> Result<FolderNode> {
        let hasher = self.hasher;
        let mut built: Vec<Option<FolderNode>> = Vec::with_capacity(self.arena.len());
        built.resize_with(self.arena.len(), || None);

        for (index, folder) in self.arena.into_iter().enumerate().rev() {
            if !folder.readable {
                continue;
            }
            let children: Vec<Node> = folder
                .slots
                .into_iter()
                .filter_map(|slot| match slot {
                    Slot::File(file) => Some(Node::File(file)),
                    Slot::Folder(child) => built[child].take().map(Node::Folder),
                })
                .collect();
            built[index] = Some(FolderNode::new(&hasher, folder.path, children));
        }

        built
            .into_iter()
            .next()
            .flatten()
            .ok_or_else(|| DirMerkleError::internal("root folder missing after build"))
    }
}

/// Reader that tallies bytes into a shared counter
struct CountingReader<'a, R> {
    inner: R,
    counter: &'a AtomicU64,
}

impl<R: Read> Read for CountingReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.counter.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}
