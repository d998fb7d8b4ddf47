//! Virtual filesystem gateway
//!
//! The pipelines never touch the host filesystem. Everything is read from and
//! written to a [`VirtualFs`], a small set of asynchronous POSIX-like
//! primitives rooted at fixed top-level directories (see
//! [`crate::config::layout`]).

mod memory;
pub mod path;
mod tree;

pub use memory::MemoryFs;
pub use tree::{
    clear_dir, copy_dir, directory_names, ensure_dir, file_names, generate_file_tree, walk_files,
    FileTreeNode,
};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::FsError;

/// Kind of a directory entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// A single entry returned by [`VirtualFs::read_dir`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl DirEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }
}

/// Options for [`VirtualFs::rm`]
#[derive(Debug, Clone, Copy, Default)]
pub struct RmOptions {
    /// Remove directories and their contents
    pub recursive: bool,
    /// Succeed when the path does not exist
    pub force: bool,
}

impl RmOptions {
    /// `rm -rf` semantics
    pub fn recursive_force() -> Self {
        Self {
            recursive: true,
            force: true,
        }
    }
}

/// Asynchronous filesystem primitives used by the pipelines.
///
/// Paths are absolute and `/`-separated. Directory listings are returned in
/// a stable order so that enumeration-dependent results are reproducible.
#[allow(async_fn_in_trait)]
pub trait VirtualFs: Send + Sync {
    async fn exists(&self, path: &str) -> bool;

    /// Create a directory. With `recursive`, missing ancestors are created and
    /// an existing directory is not an error.
    async fn mkdir(&self, path: &str, recursive: bool) -> Result<(), FsError>;

    async fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, FsError>;

    async fn read_file(&self, path: &str) -> Result<Bytes, FsError>;

    /// Create or replace a file. The parent directory must exist.
    async fn write_file(&self, path: &str, data: Bytes) -> Result<(), FsError>;

    async fn copy_file(&self, src: &str, dst: &str) -> Result<(), FsError>;

    async fn rm(&self, path: &str, options: RmOptions) -> Result<(), FsError>;

    /// Remove a single file
    async fn unlink(&self, path: &str) -> Result<(), FsError>;
}
