//! Configuration and virtual filesystem layout

pub mod layout;

pub use layout::*;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::chart::ChartFormat;
use crate::pipeline::ExportShape;

/// Default deflate level for packed archives
pub const DEFAULT_COMPRESSION_LEVEL: i64 = 1;

/// Default number of mapsets converted at once
pub const DEFAULT_CONVERT_CONCURRENCY: usize = 4;

/// Configuration for rgc-convert
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Target format used when none is given on the command line
    pub default_target: Option<ChartFormat>,
    /// Export shape used when none is given on the command line
    pub export_shape: ExportShape,
    /// Name mapset containers after the game's package extension (`.osz`,
    /// `.qp`, `.fms`) instead of the target chart extension
    pub use_mapset_extension: bool,
    /// Nest the whole-export archive under a top-level `rgc-export/` folder
    pub wrap_export_archive: bool,
    /// Host directory that receives exported artifacts
    pub output_dir: Option<PathBuf>,
    /// Upper bound on mapsets converted concurrently
    pub convert_concurrency: usize,
    /// Deflate level for packed archives (0-9)
    pub compression_level: i64,
    /// Default the log filter to `debug`, like `--verbose`
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_target: None,
            export_shape: ExportShape::Zip,
            use_mapset_extension: false,
            wrap_export_archive: false,
            output_dir: None,
            convert_concurrency: DEFAULT_CONVERT_CONCURRENCY,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            debug: false,
        }
    }
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("rgc-convert").join("config.json"))
    }

    /// Load config from disk, falling back to defaults if not found
    pub fn load() -> Self {
        Self::config_path()
            .and_then(|path| std::fs::read_to_string(&path).ok())
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    /// Concurrency limit, never below one
    pub fn convert_concurrency(&self) -> usize {
        self.convert_concurrency.max(1)
    }

    /// Compression level clamped to the deflate range
    pub fn compression_level(&self) -> i64 {
        self.compression_level.clamp(0, 9)
    }

    /// Output directory, defaulting to the current directory
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{"default_target":"qua"}"#).unwrap();
        assert_eq!(config.default_target, Some(ChartFormat::Qua));
        assert_eq!(config.convert_concurrency, DEFAULT_CONVERT_CONCURRENCY);
        assert_eq!(config.export_shape, ExportShape::Zip);
    }

    #[test]
    fn test_clamping() {
        let config = Config {
            convert_concurrency: 0,
            compression_level: 42,
            ..Default::default()
        };
        assert_eq!(config.convert_concurrency(), 1);
        assert_eq!(config.compression_level(), 9);
    }
}
