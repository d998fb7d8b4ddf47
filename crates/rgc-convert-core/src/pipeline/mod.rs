//! Batch conversion pipeline: import, parse, convert, export

mod convert;
mod export;
mod import;
mod parse;

pub use convert::{convert_index, ConvertOutcome};
pub use export::{export_all_as_zip, export_all_mapsets, export_node, ContainerNaming};
pub use import::{import_into, ImportOutcome, InputFile};
pub use parse::parse_import_tree;

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::chart::{Chart, ChartFormat};
use crate::config::{self, Config};
use crate::error::{Error, Result};
use crate::index::ParseIndex;
use crate::library::{builtin_libraries, ConverterLibraries};
use crate::progress::Progress;
use crate::vfs::{generate_file_tree, FileTreeNode, VirtualFs};

/// Batch phase, used to label failures and progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Import,
    Parse,
    Convert,
    Export,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Import => write!(f, "Extracting"),
            Self::Parse => write!(f, "Parsing"),
            Self::Convert => write!(f, "Converting"),
            Self::Export => write!(f, "Exporting"),
        }
    }
}

/// A single file or mapset that was skipped because of an error
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub phase: Phase,
    /// Input file name or virtual path of the failed item
    pub path: String,
    pub message: String,
}

impl ItemFailure {
    pub fn new(phase: Phase, path: impl Into<String>, message: impl fmt::Display) -> Self {
        let failure = Self {
            phase,
            path: path.into(),
            message: message.to_string(),
        };
        tracing::warn!("{} failed for {}: {}", failure.phase, failure.path, failure.message);
        failure
    }
}

/// Result of [`Converter::import_files`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportSummary {
    pub extract_time: Duration,
    pub parse_time: Duration,
    /// Mapset directories found under the import root
    pub mapsets: usize,
    /// Charts added to the parse index
    pub charts: usize,
    pub failures: Vec<ItemFailure>,
}

/// Result of [`Converter::convert_all`]
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConvertSummary {
    pub convert_time: Duration,
    /// Charts written in the target format
    pub converted: usize,
    /// Charts skipped because no writer is available for the target
    pub skipped: usize,
    pub failures: Vec<ItemFailure>,
    pub file_tree: Option<Vec<FileTreeNode>>,
}

/// How an export tree node is packaged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportShape {
    /// The raw bytes of one file
    File,
    /// One directory packed as a mapset container
    Map,
    /// A generic zip wrapping the node in a top-level directory
    #[default]
    Zip,
}

impl fmt::Display for ExportShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File => write!(f, "file"),
            Self::Map => write!(f, "map"),
            Self::Zip => write!(f, "zip"),
        }
    }
}

impl FromStr for ExportShape {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(Self::File),
            "map" | "container" => Ok(Self::Map),
            "zip" => Ok(Self::Zip),
            other => Err(Error::Config(format!("unknown export shape '{}'", other))),
        }
    }
}

/// Receives exported artifacts
pub trait DownloadSink: Send + Sync {
    fn download(&self, data: Bytes, filename: &str);
}

/// One artifact captured by [`CollectingSink`]
#[derive(Debug, Clone, PartialEq)]
pub struct Download {
    pub filename: String,
    pub data: Bytes,
}

/// Sink that keeps every artifact in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    downloads: Mutex<Vec<Download>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn downloads(&self) -> Vec<Download> {
        self.downloads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl DownloadSink for CollectingSink {
    fn download(&self, data: Bytes, filename: &str) {
        self.downloads
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Download {
                filename: filename.to_string(),
                data,
            });
    }
}

/// One conversion session over a virtual filesystem.
///
/// Phases run one after another; a session holds the parse index produced
/// by the last import and the target format of the last conversion.
pub struct Converter<F: VirtualFs> {
    fs: F,
    libraries: ConverterLibraries,
    index: ParseIndex<Chart>,
    progress: Progress,
    config: Config,
    target: Mutex<Option<ChartFormat>>,
}

impl<F: VirtualFs> Converter<F> {
    /// Create a session with explicit libraries
    pub fn new(fs: F, libraries: ConverterLibraries, config: Config) -> Self {
        Self {
            fs,
            libraries,
            index: ParseIndex::new(config::IMPORT_ROOT),
            progress: Progress::new(),
            config,
            target: Mutex::new(None),
        }
    }

    /// Create a session backed by the built-in libraries
    pub fn with_builtin(fs: F, config: Config) -> Self {
        let libraries = builtin_libraries(config.compression_level());
        Self::new(fs, libraries, config)
    }

    /// Create the filesystem layout and load the libraries
    pub async fn initialize(&self) -> Result<()> {
        config::init_fs(&self.fs).await?;
        self.libraries.initialize().await?;
        tracing::info!("Converter initialized");
        Ok(())
    }

    pub fn fs(&self) -> &F {
        &self.fs
    }

    pub fn libraries(&self) -> &ConverterLibraries {
        &self.libraries
    }

    pub fn index(&self) -> &ParseIndex<Chart> {
        &self.index
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Target format of the last successful conversion
    pub fn last_target(&self) -> Option<ChartFormat> {
        *self.target.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Import a batch of files and parse every chart found.
    ///
    /// Replaces any previous import and parse index.
    pub async fn import_files(&self, files: &[InputFile]) -> Result<ImportSummary> {
        let archive = self.libraries.base()?;
        // The import root is only cleared once parsing is known to be possible
        self.libraries
            .specific()
            .map_err(|_| Error::LibraryNotReady)?;

        self.progress
            .show(format!("{}.. (0/{})", Phase::Import, files.len()));
        let extract_start = Instant::now();
        let imported = {
            let phase = self.progress.phase(0.0..50.0, files.len());
            import_into(&self.fs, &archive, files, &phase).await
        };
        let imported = match imported {
            Ok(imported) => imported,
            Err(e) => {
                self.progress.hide();
                return Err(e);
            }
        };
        let extract_time = extract_start.elapsed();
        tracing::info!(
            "Extracted {} file(s) in {:?}",
            files.len() - imported.failures.len(),
            extract_time
        );

        let parse_start = Instant::now();
        let parse_failures = {
            let mapsets = crate::vfs::directory_names(&self.fs, config::IMPORT_ROOT).await;
            let phase = self.progress.phase(50.0..100.0, mapsets.len());
            parse_import_tree(&self.fs, &self.libraries, &self.index, &phase).await
        };
        let parse_time = parse_start.elapsed();

        let parse_failures = match parse_failures {
            Ok(failures) => failures,
            Err(e) => {
                self.progress.hide();
                return Err(e);
            }
        };

        self.progress.update("Done Parsing!", 100.0);
        self.progress.hide();
        tracing::info!(
            "Parsed {} chart(s) from {} mapset(s) in {:?}",
            self.index.len(),
            self.index.key_count(),
            parse_time
        );

        let mut failures = imported.failures;
        failures.extend(parse_failures);
        Ok(ImportSummary {
            extract_time,
            parse_time,
            mapsets: imported.mapsets,
            charts: self.index.len(),
            failures,
        })
    }

    /// Convert every indexed chart to `target` under the export root.
    ///
    /// With `include_tree`, the summary carries a file tree of the export
    /// root, or of the single mapset directory when only one was converted.
    pub async fn convert_all(
        &self,
        target: ChartFormat,
        include_tree: bool,
    ) -> Result<ConvertSummary> {
        if self.index.is_empty() {
            return Err(Error::NothingToConvert);
        }
        let charts = self.libraries.specific().map_err(|_| Error::LibraryNotReady)?;

        self.progress.show(format!("{} Maps...", Phase::Convert));
        let start = Instant::now();
        let keys = self.index.keys();
        let outcome = {
            let phase = self.progress.phase(0.0..100.0, keys.len());
            convert_index(
                &self.fs,
                &charts,
                &self.index,
                target,
                self.config.convert_concurrency(),
                &phase,
            )
            .await
        };
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(e) => {
                self.progress.hide();
                return Err(e);
            }
        };
        let convert_time = start.elapsed();
        *self.target.lock().unwrap_or_else(|e| e.into_inner()) = Some(target);

        let file_tree = if include_tree {
            self.progress.update("Generating File Tree...", 100.0);
            let root = match keys.as_slice() {
                [only] => crate::vfs::path::join(config::EXPORT_ROOT, only),
                _ => config::EXPORT_ROOT.to_string(),
            };
            Some(generate_file_tree(&self.fs, &root).await)
        } else {
            None
        };

        self.progress.update("Done", 100.0);
        self.progress.hide();
        tracing::info!(
            "Converted {} chart(s) to {} in {:?}",
            outcome.converted,
            target,
            convert_time
        );

        Ok(ConvertSummary {
            convert_time,
            converted: outcome.converted,
            skipped: outcome.skipped,
            failures: outcome.failures,
            file_tree,
        })
    }

    /// Snapshot of the export tree
    pub async fn file_tree(&self) -> Vec<FileTreeNode> {
        generate_file_tree(&self.fs, config::EXPORT_ROOT).await
    }

    fn naming(&self) -> ContainerNaming {
        if self.config.use_mapset_extension {
            ContainerNaming::MapsetPackage
        } else {
            ContainerNaming::TargetFormat
        }
    }

    fn export_target(&self) -> Result<ChartFormat> {
        self.last_target()
            .or(self.config.default_target)
            .ok_or(Error::NothingToConvert)
    }

    /// Package one export tree node and hand it to `sink`
    pub async fn export_node(
        &self,
        node: &FileTreeNode,
        shape: ExportShape,
        sink: &dyn DownloadSink,
    ) -> Result<()> {
        let archive = self.libraries.base()?;
        let target = match shape {
            ExportShape::Map => Some(self.export_target()?),
            _ => None,
        };
        self.progress.show(format!("{}..", Phase::Export));
        let result = export_node(
            &self.fs,
            &archive,
            node,
            shape,
            target.map(|t| (t, self.naming())),
            sink,
        )
        .await;
        self.progress.update(format!("{}.. done", Phase::Export), 100.0);
        self.progress.hide();
        result
    }

    /// Package the whole export root as `rgc-export.zip`
    pub async fn export_all_as_zip(&self, sink: &dyn DownloadSink) -> Result<()> {
        let archive = self.libraries.base()?;
        self.progress.show(format!("{}..", Phase::Export));
        let result =
            export_all_as_zip(&self.fs, &archive, self.config.wrap_export_archive, sink).await;
        self.progress.update(format!("{}.. done", Phase::Export), 100.0);
        self.progress.hide();
        result
    }

    /// Package every converted mapset as its own container
    pub async fn export_all_mapsets(&self, sink: &dyn DownloadSink) -> Result<Vec<ItemFailure>> {
        let archive = self.libraries.base()?;
        let target = self.export_target()?;
        let keys = self.index.keys();

        self.progress.show(format!("{}..", Phase::Export));
        let failures = {
            let phase = self.progress.phase(0.0..100.0, keys.len());
            export_all_mapsets(&self.fs, &archive, &keys, target, self.naming(), sink, &phase)
                .await
        };
        self.progress.update(format!("{}.. done", Phase::Export), 100.0);
        self.progress.hide();
        Ok(failures)
    }
}
