//! # rgc-convert-core
//!
//! Core library for batch conversion of rhythm game charts between
//! osu!mania, Quaver, fluXis and StepMania.
//!
//! This crate provides the foundational functionality for:
//! - Importing loose charts, mapset packages and zip archives into a
//!   virtual filesystem, one directory per mapset
//! - Parsing every chart into a common representation
//! - Converting the whole batch to a target format
//! - Packaging converted files, single mapsets or the full export tree
//!
//! ## Modules
//!
//! - [`archive`] - Zip unpacking and packing through the virtual filesystem
//! - [`chart`] - Common chart model and per-format codecs
//! - [`config`] - Configuration and virtual filesystem layout
//! - [`error`] - Error types and Result alias
//! - [`index`] - Key-grouped registry of parsed charts
//! - [`library`] - Lazily initialized library bundles
//! - [`pipeline`] - Import, parse, convert and export phases
//! - [`progress`] - Observable progress state
//! - [`vfs`] - Virtual filesystem gateway and in-memory implementation
//!
//! ## Example
//!
//! ```no_run
//! use rgc_convert_core::{ChartFormat, CollectingSink, Config, Converter, InputFile, MemoryFs};
//!
//! # async fn run() -> rgc_convert_core::Result<()> {
//! let converter = Converter::with_builtin(MemoryFs::new(), Config::default());
//! converter.initialize().await?;
//!
//! let data = std::fs::read("Song.osz")?;
//! converter.import_files(&[InputFile::new("Song.osz", data)]).await?;
//! converter.convert_all(ChartFormat::Qua, false).await?;
//!
//! let sink = CollectingSink::new();
//! converter.export_all_as_zip(&sink).await?;
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod chart;
pub mod config;
pub mod error;
pub mod index;
pub mod library;
pub mod pipeline;
pub mod progress;
pub mod vfs;

// Error types
pub use error::{ChartError, Error, FsError, Result};

// Chart types
pub use chart::{Chart, ChartFormat, ChartLibrary, ChartMetadata, MapsetFormat, Note, TimingPoint};

// Config types
pub use config::Config;

// Library types
pub use archive::{ArchiveKind, ArchiveLibrary};
pub use library::{builtin_libraries, ConverterLibraries, LibraryManager};

// Pipeline types
pub use index::{ParseEntry, ParseIndex};
pub use pipeline::{
    CollectingSink, ConvertSummary, Converter, DownloadSink, ExportShape, ImportSummary,
    InputFile, ItemFailure, Phase,
};
pub use progress::{PhaseProgress, Progress, ProgressState};

// Virtual filesystem types
pub use vfs::{FileTreeNode, MemoryFs, VirtualFs};
