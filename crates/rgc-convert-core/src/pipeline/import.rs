//! Import phase: normalize input files into one directory per mapset

use bytes::Bytes;

use super::{ItemFailure, Phase};
use crate::archive::{extract_to, ArchiveKind, ArchiveLibrary};
use crate::chart::MapsetFormat;
use crate::config::{IMPORT_ROOT, UNTITLED_PREFIX};
use crate::error::Result;
use crate::progress::PhaseProgress;
use crate::vfs::{clear_dir, directory_names, ensure_dir, path, VirtualFs};

/// A named input blob
#[derive(Debug, Clone)]
pub struct InputFile {
    pub name: String,
    pub data: Bytes,
}

impl InputFile {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// Base name with any host directory components removed
    pub fn file_name(&self) -> String {
        path::file_name(&self.name.replace('\\', "/")).to_string()
    }
}

/// What the import phase produced
#[derive(Debug, Default)]
pub struct ImportOutcome {
    /// Mapset directories present under the import root afterwards
    pub mapsets: usize,
    pub failures: Vec<ItemFailure>,
}

/// How one input file is placed under the import root
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// Generic archive extracted at the root; its top-level folders become mapsets
    Root,
    /// Mapset package extracted into a folder named after the file
    Package,
    /// Copied into the batch's untitled folder
    Loose,
}

fn classify(name: &str) -> Placement {
    let ext = path::extension(name);
    if ArchiveKind::from_extension(&ext).is_some() {
        Placement::Root
    } else if MapsetFormat::from_extension(&ext).is_some() {
        Placement::Package
    } else {
        Placement::Loose
    }
}

/// Clear the import root and place every input file under it.
///
/// Files are handled in input order. A file that cannot be extracted is
/// recorded as a failure and the rest of the batch continues. All loose files
/// share one `untitled-<uuid>` directory.
pub async fn import_into<F: VirtualFs>(
    fs: &F,
    archive: &ArchiveLibrary,
    files: &[InputFile],
    progress: &PhaseProgress<'_>,
) -> Result<ImportOutcome> {
    clear_dir(fs, IMPORT_ROOT).await?;

    let total = files.len();
    let mut untitled: Option<String> = None;
    let mut outcome = ImportOutcome::default();

    for (i, file) in files.iter().enumerate() {
        progress.begin(format!("{}.. ({}/{})", Phase::Import, i + 1, total));
        let name = file.file_name();

        let result = match classify(&name) {
            Placement::Root => extract_to(fs, archive, &name, &file.data, IMPORT_ROOT)
                .await
                .map(|_| ()),
            Placement::Package => {
                let dest = path::join(IMPORT_ROOT, path::remove_extension(&name));
                extract_to(fs, archive, &name, &file.data, &dest)
                    .await
                    .map(|_| ())
            }
            Placement::Loose => {
                let dir = match &untitled {
                    Some(dir) => dir.clone(),
                    None => {
                        let dir = path::join(
                            IMPORT_ROOT,
                            &format!("{}{}", UNTITLED_PREFIX, uuid::Uuid::new_v4()),
                        );
                        untitled = Some(dir.clone());
                        dir
                    }
                };
                write_loose(fs, &dir, &name, file.data.clone()).await
            }
        };

        if let Err(e) = result {
            outcome
                .failures
                .push(ItemFailure::new(Phase::Import, &file.name, e));
        }
        progress.tick(format!("{}.. ({}/{})", Phase::Import, i + 1, total));
    }

    outcome.mapsets = directory_names(fs, IMPORT_ROOT).await.len();
    Ok(outcome)
}

async fn write_loose<F: VirtualFs>(fs: &F, dir: &str, name: &str, data: Bytes) -> Result<()> {
    ensure_dir(fs, dir).await?;
    tracing::debug!("Copying loose file {} into {}", name, dir);
    fs.write_file(&path::join(dir, name), data).await?;
    Ok(())
}
