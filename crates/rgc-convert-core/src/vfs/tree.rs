//! Directory-level helpers built on top of [`VirtualFs`] primitives

use futures::future::{FutureExt, LocalBoxFuture};
use serde::Serialize;

use super::path::join;
use super::{EntryKind, RmOptions, VirtualFs};
use crate::error::FsError;

/// Read-only snapshot of a virtual filesystem subtree.
///
/// Rebuilt on demand; a snapshot is stale as soon as the filesystem changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileTreeNode {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileTreeNode>>,
}

impl FileTreeNode {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    /// Number of files in this subtree
    pub fn file_count(&self) -> usize {
        match &self.children {
            Some(children) => children.iter().map(FileTreeNode::file_count).sum(),
            None => usize::from(self.kind == EntryKind::File),
        }
    }
}

/// Create a directory and its ancestors, treating an existing directory as
/// success. A file already sitting at `path` is a `NotADirectory` error.
///
/// Safe to call concurrently for the same path.
pub async fn ensure_dir<F: VirtualFs>(fs: &F, path: &str) -> Result<(), FsError> {
    if !fs.exists(path).await {
        match fs.mkdir(path, true).await {
            Ok(()) => return Ok(()),
            Err(FsError::AlreadyExists(_)) => {}
            Err(e) => return Err(e),
        }
    }
    fs.read_dir(path).await.map(|_| ())
}

/// Remove everything below `path` and recreate it empty
pub async fn clear_dir<F: VirtualFs>(fs: &F, path: &str) -> Result<(), FsError> {
    if fs.exists(path).await {
        fs.rm(path, RmOptions::recursive_force()).await?;
    }
    fs.mkdir(path, true).await
}

/// Deep-copy a directory, creating destination directories as needed
pub async fn copy_dir<F: VirtualFs>(fs: &F, src: &str, dst: &str) -> Result<(), FsError> {
    let mut pending = vec![(src.to_string(), dst.to_string())];

    while let Some((from, to)) = pending.pop() {
        ensure_dir(fs, &to).await?;
        for entry in fs.read_dir(&from).await? {
            let src_path = join(&from, &entry.name);
            let dst_path = join(&to, &entry.name);
            if entry.is_dir() {
                pending.push((src_path, dst_path));
            } else {
                fs.copy_file(&src_path, &dst_path).await?;
            }
        }
    }

    Ok(())
}

/// Names of the directories directly under `path`; empty if unreadable
pub async fn directory_names<F: VirtualFs>(fs: &F, path: &str) -> Vec<String> {
    match fs.read_dir(path).await {
        Ok(entries) => entries
            .into_iter()
            .filter(|e| e.is_dir())
            .map(|e| e.name)
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Names of the files directly under `path`; empty if unreadable
pub async fn file_names<F: VirtualFs>(fs: &F, path: &str) -> Vec<String> {
    match fs.read_dir(path).await {
        Ok(entries) => entries
            .into_iter()
            .filter(|e| e.is_file())
            .map(|e| e.name)
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// Build a [`FileTreeNode`] list for the children of `root`.
///
/// A missing root yields an empty list. Unreadable directories are logged
/// and contribute whatever was read before the failure.
pub async fn generate_file_tree<F: VirtualFs>(fs: &F, root: &str) -> Vec<FileTreeNode> {
    if !fs.exists(root).await {
        return Vec::new();
    }
    build_tree(fs, root.to_string()).await
}

fn build_tree<F: VirtualFs>(fs: &F, dir: String) -> LocalBoxFuture<'_, Vec<FileTreeNode>> {
    async move {
        let entries = match fs.read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!("Error reading directory {}: {}", dir, e);
                return Vec::new();
            }
        };

        let mut result = Vec::with_capacity(entries.len());
        for entry in entries {
            let path = join(&dir, &entry.name);
            if entry.is_dir() {
                let children = build_tree(fs, path.clone()).await;
                result.push(FileTreeNode {
                    name: entry.name,
                    kind: EntryKind::Directory,
                    path,
                    children: Some(children),
                });
            } else {
                result.push(FileTreeNode {
                    name: entry.name,
                    kind: EntryKind::File,
                    path,
                    children: None,
                });
            }
        }
        result
    }
    .boxed_local()
}

/// Depth-first list of `(absolute path, path relative to root)` for every
/// file under `root`, in directory-listing order
pub async fn walk_files<F: VirtualFs>(
    fs: &F,
    root: &str,
) -> Result<Vec<(String, String)>, FsError> {
    let mut files = Vec::new();
    // Stack of (directory, relative prefix, remaining entries reversed)
    let mut stack = vec![(root.to_string(), String::new(), reversed(fs, root).await?)];

    while let Some((dir, rel, mut entries)) = stack.pop() {
        let Some(entry) = entries.pop() else {
            continue;
        };
        let full = join(&dir, &entry.name);
        let entry_rel = if rel.is_empty() {
            entry.name.clone()
        } else {
            format!("{}/{}", rel, entry.name)
        };
        let is_dir = entry.is_dir();
        stack.push((dir, rel, entries));

        if is_dir {
            let children = reversed(fs, &full).await?;
            stack.push((full, entry_rel, children));
        } else {
            files.push((full, entry_rel));
        }
    }

    Ok(files)
}

async fn reversed<F: VirtualFs>(fs: &F, dir: &str) -> Result<Vec<super::DirEntry>, FsError> {
    let mut entries = fs.read_dir(dir).await?;
    entries.reverse();
    Ok(entries)
}
