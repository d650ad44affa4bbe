//! Content hashing for tree nodes
//!
//! Every digest in a tree comes from a [`ContentHasher`]. Digests are
//! lowercase hex strings and are combined by hashing their hex text, so a
//! stored snapshot can be re-aggregated without any binary decoding.
//!
//! ## Hash Composition
//!
//! ```text
//! file_hash   = H( hex(H(content)) ++ hex(H(path)) )
//! folder_hash = H( path ++ child_hash_1 ++ child_hash_2 ++ ... )
//! ```
//!
//! Mixing the path into the file hash means two files with identical bytes
//! at different paths never share a digest, which keeps the diff engine's
//! hash-set matching from pairing unrelated files.
//!
//! ## Example
//!
//! ```rust
//! use dirmerkle::hasher::ContentHasher;
//! use dirmerkle::types::HashAlgorithm;
//!
//! # fn main() -> dirmerkle::Result<()> {
//! let hasher = ContentHasher::new(HashAlgorithm::Sha256);
//! let a = hasher.hash_file("/data/a.txt", &b"hello"[..])?;
//! let b = hasher.hash_file("/data/b.txt", &b"hello"[..])?;
//! assert_ne!(a, b);
//! assert_eq!(a.len(), 64);
//! # Ok(())
//! # }
//! ```

use crate::error::{DirMerkleError, Result};
use crate::types::HashAlgorithm;
use sha2::{Digest, Sha256};
use std::io::{ErrorKind, Read};

const READ_BUFFER_SIZE: usize = 8192;

/// Incremental digest state for the configured algorithm
enum DigestState {
    Sha256(Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl DigestState {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Sha256 => DigestState::Sha256(Sha256::new()),
            HashAlgorithm::Blake3 => DigestState::Blake3(Box::new(blake3::Hasher::new())),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            DigestState::Sha256(hasher) => hasher.update(data),
            DigestState::Blake3(hasher) => {
                hasher.update(data);
            }
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            DigestState::Sha256(hasher) => hex::encode(hasher.finalize()),
            DigestState::Blake3(hasher) => hasher.finalize().to_hex().to_string(),
        }
    }
}

/// Computes file, path and folder digests with one algorithm
///
/// The hasher holds no state between calls, so a single value can be shared
/// freely across rayon workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContentHasher {
    algorithm: HashAlgorithm,
}

impl ContentHasher {
    /// Create a hasher for the given algorithm
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Algorithm this hasher uses
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Hash arbitrary in-memory data
    pub fn hash_bytes(&self, data: &[u8]) -> String {
        let mut state = DigestState::new(self.algorithm);
        state.update(data);
        state.finalize_hex()
    }

    /// Hash a path identifier string
    pub fn hash_path(&self, path: &str) -> String {
        self.hash_bytes(path.as_bytes())
    }

    /// Hash a full byte stream in fixed-size chunks
    ///
    /// # Errors
    ///
    /// - [`DirMerkleError::Unreadable`] if any read fails before end of stream
    pub fn hash_content<R: Read>(&self, path: &str, mut reader: R) -> Result<String> {
        let mut state = DigestState::new(self.algorithm);
        let mut buffer = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let bytes_read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(DirMerkleError::unreadable(path, e)),
            };
            state.update(&buffer[..bytes_read]);
        }

        Ok(state.finalize_hex())
    }

    /// Combine a content digest and a path digest into a file digest
    pub fn combine(&self, content_hash: &str, path_hash: &str) -> String {
        let mut state = DigestState::new(self.algorithm);
        state.update(content_hash.as_bytes());
        state.update(path_hash.as_bytes());
        state.finalize_hex()
    }

    /// Digest identifying "this exact content at this exact path"
    ///
    /// # Errors
    ///
    /// - [`DirMerkleError::Unreadable`] if the stream cannot be fully read
    pub fn hash_file<R: Read>(&self, path: &str, content: R) -> Result<String> {
        let content_hash = self.hash_content(path, content)?;
        let path_hash = self.hash_path(path);
        Ok(self.combine(&content_hash, &path_hash))
    }

    /// Aggregate digest of a folder from its path and ordered child digests
    ///
    /// With no children this is simply the digest of the path.
    pub fn folder_hash<'a, I>(&self, path: &str, child_hashes: I) -> String
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut state = DigestState::new(self.algorithm);
        state.update(path.as_bytes());
        for hash in child_hashes {
            state.update(hash.as_bytes());
        }
        state.finalize_hex()
    }
}
