//! Extract an archive into the virtual filesystem

use std::collections::HashSet;

use bytes::Bytes;

use super::{ArchiveLibrary, RawEntry};
use crate::error::{FsError, Result};
use crate::vfs::{ensure_dir, path, VirtualFs};

/// Clean an archive entry name into a relative `/`-separated path.
///
/// Returns `None` for empty names and names that would escape the
/// destination.
fn clean_entry_name(name: &str) -> Option<String> {
    let normalized = name.replace('\\', "/");
    let mut parts = Vec::new();
    for segment in normalized.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return None,
            s => parts.push(s),
        }
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// One archive entry resolved to its destination path
struct Planned {
    target: String,
    data: Option<Vec<u8>>,
}

/// Resolve entry names below `dest` and reject archives in which a file
/// entry would also have to be a directory.
fn plan(name: &str, entries: Vec<RawEntry>, dest: &str) -> Result<Vec<Planned>> {
    let mut planned = Vec::with_capacity(entries.len());
    let mut files: HashSet<String> = HashSet::new();

    for entry in entries {
        let is_dir = entry.is_directory();
        let Some(relative) = clean_entry_name(&entry.name) else {
            if !entry.name.trim_matches(['/', '\\']).is_empty() {
                tracing::warn!("Skipping unsafe path '{}' in {}", entry.name, name);
            }
            continue;
        };
        let target = path::join(dest, &relative);
        if !is_dir {
            files.insert(target.clone());
        }
        planned.push(Planned {
            target,
            data: (!is_dir).then_some(entry.data),
        });
    }

    for item in &planned {
        let mut ancestor = path::parent(&item.target);
        while let Some(dir) = ancestor {
            if dir.len() <= dest.len() {
                break;
            }
            if files.contains(dir) {
                return Err(FsError::NotADirectory(dir.to_string()).into());
            }
            ancestor = path::parent(dir);
        }
    }

    Ok(planned)
}

/// Unpack `data` (an archive called `name`) below `dest`.
///
/// The archive is decoded and checked before anything is written. Directory
/// entries are created explicitly; parents of file entries are created on
/// demand, each at most once. Returns the number of files written.
pub async fn extract_to<F: VirtualFs>(
    fs: &F,
    library: &ArchiveLibrary,
    name: &str,
    data: &[u8],
    dest: &str,
) -> Result<usize> {
    let planned = plan(name, library.unpack(name, data)?, dest)?;
    let mut created_dirs: HashSet<String> = HashSet::new();
    let mut written = 0;

    ensure_dir(fs, dest).await?;
    created_dirs.insert(dest.to_string());

    for Planned { target, data } in planned {
        let Some(data) = data else {
            if created_dirs.insert(target.clone()) {
                ensure_dir(fs, &target).await?;
            }
            continue;
        };

        if let Some(parent) = path::parent(&target) {
            if created_dirs.insert(parent.to_string()) {
                ensure_dir(fs, parent).await?;
            }
        }

        tracing::debug!("Extracting {}", target);
        fs.write_file(&target, Bytes::from(data)).await?;
        written += 1;
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::vfs::MemoryFs;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn raw_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    #[test]
    fn test_clean_entry_name() {
        assert_eq!(clean_entry_name("a\\b\\c.osu").as_deref(), Some("a/b/c.osu"));
        assert_eq!(clean_entry_name("/./a//b").as_deref(), Some("a/b"));
        assert_eq!(clean_entry_name("../evil"), None);
        assert_eq!(clean_entry_name("a/../../evil"), None);
        assert_eq!(clean_entry_name("/"), None);
    }

    #[tokio::test]
    async fn test_extract_nested_with_backslashes() {
        let fs = MemoryFs::new();
        let data = raw_zip(&[
            ("Song\\", &b""[..]),
            ("Song\\chart.osu", &b"osu"[..]),
            ("Song\\sub\\bg.jpg", &b"jpg"[..]),
            ("top.txt", &b"t"[..]),
        ]);

        let written = extract_to(&fs, &ArchiveLibrary::default(), "a.zip", &data, "/MapImport")
            .await
            .unwrap();

        assert_eq!(written, 3);
        assert_eq!(&fs.read_file("/MapImport/Song/chart.osu").await.unwrap()[..], b"osu");
        assert_eq!(&fs.read_file("/MapImport/Song/sub/bg.jpg").await.unwrap()[..], b"jpg");
        assert!(fs.exists("/MapImport/top.txt").await);
    }

    #[tokio::test]
    async fn test_extract_skips_escaping_entries() {
        let fs = MemoryFs::new();
        let data = raw_zip(&[("../../etc/passwd", &b"x"[..]), ("ok.osu", &b"y"[..])]);

        let written = extract_to(&fs, &ArchiveLibrary::default(), "a.zip", &data, "/MapImport/a")
            .await
            .unwrap();

        assert_eq!(written, 1);
        assert!(!fs.exists("/etc/passwd").await);
        assert!(fs.exists("/MapImport/a/ok.osu").await);
    }

    #[tokio::test]
    async fn test_extract_empty_file_is_not_a_directory() {
        let fs = MemoryFs::new();
        let data = raw_zip(&[
            ("Set/", &b""[..]),
            ("Set/chart.osu", &b"osu"[..]),
            ("Set/empty.txt", &b""[..]),
        ]);

        let written = extract_to(&fs, &ArchiveLibrary::default(), "a.zip", &data, "/MapImport")
            .await
            .unwrap();

        assert_eq!(written, 2);
        assert!(fs.read_file("/MapImport/Set/empty.txt").await.unwrap().is_empty());
        let entries = fs.read_dir("/MapImport/Set").await.unwrap();
        let mut files: Vec<_> = entries
            .iter()
            .filter(|e| e.is_file())
            .map(|e| e.name.clone())
            .collect();
        files.sort();
        assert_eq!(files, vec!["chart.osu", "empty.txt"]);
        assert!(entries.iter().all(|e| !e.is_dir()));
    }

    #[tokio::test]
    async fn test_extract_file_shadowing_directory_writes_nothing() {
        let fs = MemoryFs::new();
        let data = raw_zip(&[("Song", &b"stray"[..]), ("Song/chart.osu", &b"osu"[..])]);

        let result =
            extract_to(&fs, &ArchiveLibrary::default(), "a.zip", &data, "/MapImport/a").await;

        assert!(matches!(
            result,
            Err(Error::Fs(FsError::NotADirectory(ref p))) if p == "/MapImport/a/Song"
        ));
        assert!(!fs.exists("/MapImport/a").await);
    }

    #[tokio::test]
    async fn test_extract_unsupported_writes_nothing() {
        let fs = MemoryFs::new();
        let result =
            extract_to(&fs, &ArchiveLibrary::default(), "a.rar", b"Rar!\x1a\x07\x00", "/x").await;
        assert!(matches!(result, Err(Error::UnsupportedArchive { .. })));
        assert!(!fs.exists("/x").await);
    }
}
