//! In-memory virtual filesystem

use std::collections::BTreeMap;
use std::ops::Bound;

use bytes::Bytes;
use tokio::sync::RwLock;

use super::path::{self, normalize};
use super::{DirEntry, EntryKind, RmOptions, VirtualFs};
use crate::error::FsError;

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Bytes),
}

/// Hierarchical filesystem held entirely in memory.
///
/// Nodes are keyed by their normalized absolute path, so a directory listing
/// is a range scan over the children's common prefix.
#[derive(Debug)]
pub struct MemoryFs {
    nodes: RwLock<BTreeMap<String, Node>>,
}

impl Default for MemoryFs {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFs {
    /// Create an empty filesystem containing only the root directory
    pub fn new() -> Self {
        let mut nodes = BTreeMap::new();
        nodes.insert("/".to_string(), Node::Dir);
        Self {
            nodes: RwLock::new(nodes),
        }
    }

    /// Number of files currently stored
    #[cfg(test)]
    pub(crate) async fn file_count(&self) -> usize {
        self.nodes
            .read()
            .await
            .values()
            .filter(|n| matches!(n, Node::File(_)))
            .count()
    }
}

fn child_prefix(dir: &str) -> String {
    if dir == "/" {
        "/".to_string()
    } else {
        format!("{}/", dir)
    }
}

/// Keys strictly below `dir`
fn descendants<'a>(
    nodes: &'a BTreeMap<String, Node>,
    dir: &str,
) -> impl Iterator<Item = (&'a String, &'a Node)> + 'a {
    let prefix = child_prefix(dir);
    nodes
        .range::<String, _>((Bound::Excluded(prefix.clone()), Bound::Unbounded))
        .take_while(move |(k, _)| k.starts_with(&prefix))
}

fn require_parent_dir(nodes: &BTreeMap<String, Node>, path: &str) -> Result<(), FsError> {
    let parent = path::parent(path).ok_or_else(|| FsError::InvalidPath(path.to_string()))?;
    match nodes.get(parent) {
        Some(Node::Dir) => Ok(()),
        Some(Node::File(_)) => Err(FsError::NotADirectory(parent.to_string())),
        None => Err(FsError::NotFound(parent.to_string())),
    }
}

impl VirtualFs for MemoryFs {
    async fn exists(&self, path: &str) -> bool {
        match normalize(path) {
            Ok(p) => self.nodes.read().await.contains_key(&p),
            Err(_) => false,
        }
    }

    async fn mkdir(&self, path: &str, recursive: bool) -> Result<(), FsError> {
        let path = normalize(path)?;
        let mut nodes = self.nodes.write().await;

        if !recursive {
            if nodes.contains_key(&path) {
                return Err(FsError::AlreadyExists(path));
            }
            require_parent_dir(&nodes, &path)?;
            nodes.insert(path, Node::Dir);
            return Ok(());
        }

        for dir in path::ancestors(&path)
            .into_iter()
            .chain(std::iter::once(path.as_str()))
        {
            match nodes.get(dir) {
                Some(Node::Dir) => {}
                Some(Node::File(_)) => return Err(FsError::NotADirectory(dir.to_string())),
                None => {
                    nodes.insert(dir.to_string(), Node::Dir);
                }
            }
        }
        Ok(())
    }

    async fn read_dir(&self, path: &str) -> Result<Vec<DirEntry>, FsError> {
        let path = normalize(path)?;
        let nodes = self.nodes.read().await;

        match nodes.get(&path) {
            Some(Node::Dir) => {}
            Some(Node::File(_)) => return Err(FsError::NotADirectory(path)),
            None => return Err(FsError::NotFound(path)),
        }

        let prefix_len = child_prefix(&path).len();
        Ok(descendants(&nodes, &path)
            .filter_map(|(key, node)| {
                let name = &key[prefix_len..];
                if name.contains('/') {
                    return None;
                }
                let kind = match node {
                    Node::Dir => EntryKind::Directory,
                    Node::File(_) => EntryKind::File,
                };
                Some(DirEntry {
                    name: name.to_string(),
                    kind,
                })
            })
            .collect())
    }

    async fn read_file(&self, path: &str) -> Result<Bytes, FsError> {
        tokio::task::yield_now().await;
        let path = normalize(path)?;
        match self.nodes.read().await.get(&path) {
            Some(Node::File(data)) => Ok(data.clone()),
            Some(Node::Dir) => Err(FsError::IsADirectory(path)),
            None => Err(FsError::NotFound(path)),
        }
    }

    async fn write_file(&self, path: &str, data: Bytes) -> Result<(), FsError> {
        tokio::task::yield_now().await;
        let path = normalize(path)?;
        let mut nodes = self.nodes.write().await;
        require_parent_dir(&nodes, &path)?;
        if let Some(Node::Dir) = nodes.get(&path) {
            return Err(FsError::IsADirectory(path));
        }
        nodes.insert(path, Node::File(data));
        Ok(())
    }

    async fn copy_file(&self, src: &str, dst: &str) -> Result<(), FsError> {
        let src = normalize(src)?;
        let dst = normalize(dst)?;
        let mut nodes = self.nodes.write().await;

        let data = match nodes.get(&src) {
            Some(Node::File(data)) => data.clone(),
            Some(Node::Dir) => return Err(FsError::IsADirectory(src)),
            None => return Err(FsError::NotFound(src)),
        };
        require_parent_dir(&nodes, &dst)?;
        if let Some(Node::Dir) = nodes.get(&dst) {
            return Err(FsError::IsADirectory(dst));
        }
        nodes.insert(dst, Node::File(data));
        Ok(())
    }

    async fn rm(&self, path: &str, options: RmOptions) -> Result<(), FsError> {
        let path = normalize(path)?;
        if path == "/" {
            return Err(FsError::InvalidPath(path));
        }
        let mut nodes = self.nodes.write().await;

        match nodes.get(&path) {
            None if options.force => return Ok(()),
            None => return Err(FsError::NotFound(path)),
            Some(Node::File(_)) => {
                nodes.remove(&path);
                return Ok(());
            }
            Some(Node::Dir) => {}
        }

        let children: Vec<String> = descendants(&nodes, &path).map(|(k, _)| k.clone()).collect();
        if !children.is_empty() && !options.recursive {
            return Err(FsError::DirectoryNotEmpty(path));
        }
        for key in children {
            nodes.remove(&key);
        }
        nodes.remove(&path);
        Ok(())
    }

    async fn unlink(&self, path: &str) -> Result<(), FsError> {
        let path = normalize(path)?;
        let mut nodes = self.nodes.write().await;
        match nodes.get(&path) {
            Some(Node::File(_)) => {
                nodes.remove(&path);
                Ok(())
            }
            Some(Node::Dir) => Err(FsError::IsADirectory(path)),
            None => Err(FsError::NotFound(path)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mkdir_recursive_is_idempotent() {
        let fs = MemoryFs::new();
        fs.mkdir("/MapImport/a/b", true).await.unwrap();
        fs.mkdir("/MapImport/a/b", true).await.unwrap();
        assert!(fs.exists("/MapImport/a").await);
        assert_eq!(
            fs.mkdir("/MapImport/a", false).await,
            Err(FsError::AlreadyExists("/MapImport/a".into()))
        );
    }

    #[tokio::test]
    async fn test_mkdir_requires_parent_when_not_recursive() {
        let fs = MemoryFs::new();
        assert!(matches!(
            fs.mkdir("/missing/child", false).await,
            Err(FsError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_read_dir_lists_direct_children_sorted() {
        let fs = MemoryFs::new();
        fs.mkdir("/root/b", true).await.unwrap();
        fs.mkdir("/root/b-x", true).await.unwrap();
        fs.write_file("/root/b/deep.txt", Bytes::from_static(b"x"))
            .await
            .unwrap();
        fs.write_file("/root/a.txt", Bytes::from_static(b"y"))
            .await
            .unwrap();

        let entries = fs.read_dir("/root").await.unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b", "b-x"]);
        assert!(entries[0].is_file());
        assert!(entries[1].is_dir());
    }

    #[tokio::test]
    async fn test_write_requires_parent() {
        let fs = MemoryFs::new();
        let err = fs
            .write_file("/nope/file", Bytes::from_static(b"x"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_rm_and_unlink() {
        let fs = MemoryFs::new();
        fs.mkdir("/d/sub", true).await.unwrap();
        fs.write_file("/d/sub/f", Bytes::from_static(b"1"))
            .await
            .unwrap();

        assert!(matches!(
            fs.rm("/d", RmOptions::default()).await,
            Err(FsError::DirectoryNotEmpty(_))
        ));
        assert!(fs.unlink("/d/sub/missing").await.unwrap_err().is_not_found());
        assert!(matches!(
            fs.unlink("/d/sub").await,
            Err(FsError::IsADirectory(_))
        ));

        fs.rm("/d", RmOptions::recursive_force()).await.unwrap();
        assert!(!fs.exists("/d/sub/f").await);
        assert!(!fs.exists("/d").await);
        fs.rm("/d", RmOptions::recursive_force()).await.unwrap();
        assert_eq!(fs.file_count().await, 0);
    }

    #[tokio::test]
    async fn test_copy_file() {
        let fs = MemoryFs::new();
        fs.mkdir("/a", true).await.unwrap();
        fs.mkdir("/b", true).await.unwrap();
        fs.write_file("/a/x.bin", Bytes::from_static(b"data"))
            .await
            .unwrap();
        fs.copy_file("/a/x.bin", "/b/y.bin").await.unwrap();
        assert_eq!(fs.read_file("/b/y.bin").await.unwrap(), "data");
    }
}
