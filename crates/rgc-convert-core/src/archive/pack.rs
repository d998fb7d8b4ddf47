//! Build zip archives from virtual filesystem content

use std::io::{Cursor, Write};

use bytes::Bytes;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::ArchiveLibrary;
use crate::error::Result;
use crate::vfs::{walk_files, VirtualFs};

/// Incremental in-memory zip writer.
///
/// Entries are compressed as they are added, so callers can feed files one
/// at a time without holding every input buffer simultaneously.
pub struct ZipPacker {
    zip: ZipWriter<Cursor<Vec<u8>>>,
    options: SimpleFileOptions,
    entries: usize,
}

impl ZipPacker {
    pub fn new(compression_level: i64) -> Self {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(compression_level.clamp(0, 9)));
        Self {
            zip: ZipWriter::new(Cursor::new(Vec::new())),
            options,
            entries: 0,
        }
    }

    /// Add a file entry
    pub fn add_file(&mut self, archive_path: &str, data: &[u8]) -> Result<()> {
        self.zip.start_file(archive_path, self.options)?;
        self.zip.write_all(data)?;
        self.entries += 1;
        Ok(())
    }

    /// Add an explicit directory entry
    pub fn add_directory(&mut self, archive_path: &str) -> Result<()> {
        self.zip.add_directory(archive_path, self.options)?;
        self.entries += 1;
        Ok(())
    }

    pub fn entry_count(&self) -> usize {
        self.entries
    }

    /// Finalize the archive and return its bytes
    pub fn finish(self) -> Result<Bytes> {
        let cursor = self.zip.finish()?;
        Ok(Bytes::from(cursor.into_inner()))
    }
}

/// Pack every file below `root` into a zip.
///
/// Entry names are relative to `root`, optionally nested under
/// `top_level`. Files are read one at a time.
pub async fn pack_dir<F: VirtualFs>(
    fs: &F,
    library: &ArchiveLibrary,
    root: &str,
    top_level: Option<&str>,
) -> Result<Bytes> {
    let mut packer = library.packer();
    if let Some(top) = top_level {
        packer.add_directory(&format!("{}/", top))?;
    }

    for (abs, rel) in walk_files(fs, root).await? {
        let data = fs.read_file(&abs).await?;
        let name = match top_level {
            Some(top) => format!("{}/{}", top, rel),
            None => rel,
        };
        packer.add_file(&name, &data)?;
    }

    tracing::debug!("Packed {} entries from {}", packer.entry_count(), root);
    packer.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::MemoryFs;

    async fn sample_fs() -> MemoryFs {
        let fs = MemoryFs::new();
        fs.mkdir("/MapExport/Song/sub", true).await.unwrap();
        fs.write_file("/MapExport/Song/a.qua", Bytes::from_static(b"qua"))
            .await
            .unwrap();
        fs.write_file("/MapExport/Song/sub/bg.jpg", Bytes::from_static(b"jpg"))
            .await
            .unwrap();
        fs
    }

    #[tokio::test]
    async fn test_pack_dir_relative_names() {
        let fs = sample_fs().await;
        let lib = ArchiveLibrary::default();
        let data = pack_dir(&fs, &lib, "/MapExport/Song", None).await.unwrap();

        let entries = lib.unpack("out.zip", &data).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a.qua", "sub/bg.jpg"]);
    }

    #[tokio::test]
    async fn test_pack_dir_with_top_level() {
        let fs = sample_fs().await;
        let lib = ArchiveLibrary::new(6);
        let data = pack_dir(&fs, &lib, "/MapExport", Some("rgc-export"))
            .await
            .unwrap();

        let entries = lib.unpack("out.zip", &data).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["rgc-export/", "rgc-export/Song/a.qua", "rgc-export/Song/sub/bg.jpg"]
        );
        assert!(entries[0].is_directory());
    }

    #[test]
    fn test_empty_archive_is_valid() {
        let data = ZipPacker::new(1).finish().unwrap();
        let entries = ArchiveLibrary::default().unpack("e.zip", &data).unwrap();
        assert!(entries.is_empty());
    }
}
