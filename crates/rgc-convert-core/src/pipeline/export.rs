//! Export phase: package export tree nodes into downloadable artifacts

use super::{DownloadSink, ExportShape, ItemFailure, Phase};
use crate::archive::{pack_dir, ArchiveLibrary};
use crate::chart::ChartFormat;
use crate::config::{EXPORT_ARCHIVE_NAME, EXPORT_ROOT};
use crate::error::{Error, Result};
use crate::progress::PhaseProgress;
use crate::vfs::{path, FileTreeNode, VirtualFs};

/// File extension given to single-mapset containers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContainerNaming {
    /// `<name>.<target chart extension>`, e.g. `Song.qua`
    #[default]
    TargetFormat,
    /// `<name>.<game package extension>`, e.g. `Song.qp`
    MapsetPackage,
}

impl ContainerNaming {
    pub fn extension(&self, target: ChartFormat) -> &'static str {
        match self {
            Self::TargetFormat => target.extension(),
            Self::MapsetPackage => target.mapset_extension(),
        }
    }
}

/// Package `node` in the requested shape and hand it to `sink`.
///
/// The `map` shape needs the conversion target to name the container.
pub async fn export_node<F: VirtualFs>(
    fs: &F,
    archive: &ArchiveLibrary,
    node: &FileTreeNode,
    shape: ExportShape,
    target: Option<(ChartFormat, ContainerNaming)>,
    sink: &dyn DownloadSink,
) -> Result<()> {
    match shape {
        ExportShape::File => {
            let data = fs.read_file(&node.path).await?;
            sink.download(data, path::file_name(&node.path));
        }
        ExportShape::Map => {
            let (target, naming) = target.ok_or_else(|| {
                Error::Config("a target format is required to export a map".to_string())
            })?;
            let data = pack_dir(fs, archive, &node.path, None).await?;
            sink.download(data, &format!("{}.{}", node.name, naming.extension(target)));
        }
        ExportShape::Zip => {
            let data = pack_dir(fs, archive, &node.path, Some(&node.name)).await?;
            sink.download(data, &format!("{}.zip", node.name));
        }
    }
    tracing::info!("Exported {} as {}", node.path, shape);
    Ok(())
}

/// Package the whole export root as `rgc-export.zip`.
///
/// With `wrap`, every entry is nested under a top-level `rgc-export/`
/// directory; otherwise the archive's top-level entries are the export
/// root's children.
pub async fn export_all_as_zip<F: VirtualFs>(
    fs: &F,
    archive: &ArchiveLibrary,
    wrap: bool,
    sink: &dyn DownloadSink,
) -> Result<()> {
    let top_level = wrap.then_some(EXPORT_ARCHIVE_NAME);
    let data = pack_dir(fs, archive, EXPORT_ROOT, top_level).await?;
    sink.download(data, &format!("{}.zip", EXPORT_ARCHIVE_NAME));
    tracing::info!("Exported {} as {}.zip", EXPORT_ROOT, EXPORT_ARCHIVE_NAME);
    Ok(())
}

/// Package each mapset directory of the export root as its own container.
///
/// A mapset that cannot be packed is reported and the rest continue.
pub async fn export_all_mapsets<F: VirtualFs>(
    fs: &F,
    archive: &ArchiveLibrary,
    keys: &[String],
    target: ChartFormat,
    naming: ContainerNaming,
    sink: &dyn DownloadSink,
    progress: &PhaseProgress<'_>,
) -> Vec<ItemFailure> {
    let total = keys.len();
    let mut failures = Vec::new();

    for (i, key) in keys.iter().enumerate() {
        progress.begin(format!("{}.. ({}/{})", Phase::Export, i + 1, total));
        let dir = path::join(EXPORT_ROOT, key);
        match pack_dir(fs, archive, &dir, None).await {
            Ok(data) => sink.download(data, &format!("{}.{}", key, naming.extension(target))),
            Err(e) => failures.push(ItemFailure::new(Phase::Export, dir, e)),
        }
        progress.tick(format!("{}.. ({}/{})", Phase::Export, i + 1, total));
    }

    failures
}
