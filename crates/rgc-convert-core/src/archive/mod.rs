//! Archive codec: the base library bundle
//!
//! Only zip payloads (including `.osz`, `.qp` and `.fms` mapset containers)
//! are decoded. RAR, TAR and 7z payloads are recognized so that callers get a
//! precise [`Error::UnsupportedArchive`] instead of a zip parse failure.

mod extract;
mod pack;

pub use extract::extract_to;
pub use pack::{pack_dir, ZipPacker};

use std::io::{Cursor, Read};

use zip::ZipArchive;

use crate::config::DEFAULT_COMPRESSION_LEVEL;
use crate::error::{Error, Result};

/// General-purpose archive kinds accepted by the import pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    Zip,
    Rar,
    Tar,
    SevenZip,
}

impl ArchiveKind {
    pub const ALL: [ArchiveKind; 4] = [
        ArchiveKind::Zip,
        ArchiveKind::Rar,
        ArchiveKind::Tar,
        ArchiveKind::SevenZip,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveKind::Zip => "zip",
            ArchiveKind::Rar => "rar",
            ArchiveKind::Tar => "tar",
            ArchiveKind::SevenZip => "7z",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.');
        Self::ALL
            .into_iter()
            .find(|k| k.extension().eq_ignore_ascii_case(ext))
    }

    /// Sniff the archive kind from leading bytes
    pub fn detect(data: &[u8]) -> Option<Self> {
        if data.starts_with(b"PK\x03\x04") || data.starts_with(b"PK\x05\x06") {
            Some(ArchiveKind::Zip)
        } else if data.starts_with(b"Rar!\x1a\x07") {
            Some(ArchiveKind::Rar)
        } else if data.starts_with(b"7z\xbc\xaf\x27\x1c") {
            Some(ArchiveKind::SevenZip)
        } else if data.len() > 262 && &data[257..262] == b"ustar" {
            Some(ArchiveKind::Tar)
        } else {
            None
        }
    }
}

/// One raw entry read from an archive, before any path cleanup
#[derive(Debug, Clone)]
pub struct RawEntry {
    pub name: String,
    pub data: Vec<u8>,
}

impl RawEntry {
    /// Zero-length entry whose name ends with a separator
    pub fn is_directory(&self) -> bool {
        self.data.is_empty() && (self.name.ends_with('/') || self.name.ends_with('\\'))
    }
}

/// Archive reader and writer
#[derive(Debug, Clone, Copy)]
pub struct ArchiveLibrary {
    compression_level: i64,
}

impl Default for ArchiveLibrary {
    fn default() -> Self {
        Self::new(DEFAULT_COMPRESSION_LEVEL)
    }
}

impl ArchiveLibrary {
    pub fn new(compression_level: i64) -> Self {
        Self {
            compression_level: compression_level.clamp(0, 9),
        }
    }

    pub fn compression_level(&self) -> i64 {
        self.compression_level
    }

    /// Decode every entry of an in-memory archive.
    ///
    /// `name` is only used for error messages and as a fallback when the
    /// payload carries no recognizable signature.
    pub fn unpack(&self, name: &str, data: &[u8]) -> Result<Vec<RawEntry>> {
        let kind = ArchiveKind::detect(data).or_else(|| {
            let ext = crate::vfs::path::extension(name);
            ArchiveKind::from_extension(&ext)
        });

        match kind {
            Some(ArchiveKind::Zip) => self.unzip(data),
            Some(_) => Err(Error::UnsupportedArchive {
                name: name.to_string(),
            }),
            // Mapset containers without a zip signature
            None => self.unzip(data),
        }
    }

    fn unzip(&self, data: &[u8]) -> Result<Vec<RawEntry>> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;
        let mut entries = Vec::with_capacity(archive.len());

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            let name = file.name().to_string();
            let mut content = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut content)?;
            entries.push(RawEntry {
                name,
                data: content,
            });
        }

        Ok(entries)
    }

    /// Start a new in-memory zip archive at this library's compression level
    pub fn packer(&self) -> ZipPacker {
        ZipPacker::new(self.compression_level)
    }
}
