//! Fixed layout of the virtual filesystem

use crate::error::FsError;
use crate::vfs::{ensure_dir, VirtualFs};

/// Normalized extracted input, one directory per mapset
pub const IMPORT_ROOT: &str = "/MapImport";

/// Converted output, mirroring the import tree
pub const EXPORT_ROOT: &str = "/MapExport";

/// Scratch space for packed containers
pub const COMPRESSED_ROOT: &str = "/MapCompressed";

/// Top-level directories that must exist before any pipeline call
pub const FS_STRUCTURE: &[&str] = &[IMPORT_ROOT, EXPORT_ROOT, COMPRESSED_ROOT];

/// Prefix of the generated mapset directory holding loose input files
pub const UNTITLED_PREFIX: &str = "untitled-";

/// Name of the top-level directory wrapped around a full export archive
pub const EXPORT_ARCHIVE_NAME: &str = "rgc-export";

/// Create every directory in [`FS_STRUCTURE`]
pub async fn init_fs<F: VirtualFs>(fs: &F) -> Result<(), FsError> {
    for dir in FS_STRUCTURE {
        ensure_dir(fs, dir).await?;
    }
    tracing::debug!("Fs initialization complete");
    Ok(())
}
