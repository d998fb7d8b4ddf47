//! Format-tag indexed parser and writer tables

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::{fsc, osu, qua, sm, Chart, ChartFormat};
use crate::error::ChartError;

/// `raw text -> Chart`
pub type ParseFn = Arc<dyn Fn(&str) -> Result<Chart, ChartError> + Send + Sync>;

/// `Chart -> raw text`
pub type WriteFn = Arc<dyn Fn(&Chart) -> Result<String, ChartError> + Send + Sync>;

/// Target formats a conversion may be requested for
pub const CONVERTIBLE_FORMATS: [ChartFormat; 4] = ChartFormat::ALL;

/// The conversion library: one optional parser and writer per format.
///
/// Built once and shared read-only. A format missing from a table is simply
/// unavailable; callers skip the work instead of failing.
#[derive(Clone, Default)]
pub struct ChartLibrary {
    parsers: HashMap<ChartFormat, ParseFn>,
    writers: HashMap<ChartFormat, WriteFn>,
}

impl fmt::Debug for ChartLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parsers: Vec<_> = self.parsers.keys().collect();
        let mut writers: Vec<_> = self.writers.keys().collect();
        parsers.sort();
        writers.sort();
        f.debug_struct("ChartLibrary")
            .field("parsers", &parsers)
            .field("writers", &writers)
            .finish()
    }
}

impl ChartLibrary {
    /// Library with no registered formats
    pub fn empty() -> Self {
        Self::default()
    }

    /// Library with the built-in osu, qua, fsc and sm codecs
    pub fn builtin() -> Self {
        Self::empty()
            .with_parser(ChartFormat::Osu, osu::parse)
            .with_writer(ChartFormat::Osu, osu::write)
            .with_parser(ChartFormat::Qua, qua::parse)
            .with_writer(ChartFormat::Qua, qua::write)
            .with_parser(ChartFormat::Fsc, fsc::parse)
            .with_writer(ChartFormat::Fsc, fsc::write)
            .with_parser(ChartFormat::Sm, sm::parse)
            .with_writer(ChartFormat::Sm, sm::write)
    }

    /// Register (or replace) the parser for a format
    pub fn with_parser<P>(mut self, format: ChartFormat, parser: P) -> Self
    where
        P: Fn(&str) -> Result<Chart, ChartError> + Send + Sync + 'static,
    {
        self.parsers.insert(format, Arc::new(parser));
        self
    }

    /// Register (or replace) the writer for a format
    pub fn with_writer<W>(mut self, format: ChartFormat, writer: W) -> Self
    where
        W: Fn(&Chart) -> Result<String, ChartError> + Send + Sync + 'static,
    {
        self.writers.insert(format, Arc::new(writer));
        self
    }

    /// Drop the writer for a format
    pub fn without_writer(mut self, format: ChartFormat) -> Self {
        self.writers.remove(&format);
        self
    }

    /// Parser for a file extension, if the extension names a known format
    pub fn parser_for_extension(&self, ext: &str) -> Option<&ParseFn> {
        ChartFormat::from_extension(ext).and_then(|f| self.parsers.get(&f))
    }

    pub fn parser(&self, format: ChartFormat) -> Option<&ParseFn> {
        self.parsers.get(&format)
    }

    /// Writer for a target format; `None` unless the format is convertible
    /// and a writer is registered
    pub fn writer(&self, format: ChartFormat) -> Option<&WriteFn> {
        if !CONVERTIBLE_FORMATS.contains(&format) {
            return None;
        }
        self.writers.get(&format)
    }

    pub fn can_parse(&self, format: ChartFormat) -> bool {
        self.parsers.contains_key(&format)
    }

    pub fn can_write(&self, format: ChartFormat) -> bool {
        self.writer(format).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::fixtures::sample_chart;

    #[test]
    fn test_builtin_registers_all_formats() {
        let lib = ChartLibrary::builtin();
        for format in ChartFormat::ALL {
            assert!(lib.can_parse(format), "{} parser missing", format);
            assert!(lib.can_write(format), "{} writer missing", format);
        }
    }

    #[test]
    fn test_extension_lookup_is_case_insensitive() {
        let lib = ChartLibrary::builtin();
        assert!(lib.parser_for_extension("QUA").is_some());
        assert!(lib.parser_for_extension("png").is_none());
        assert!(lib.parser_for_extension("").is_none());
    }

    #[test]
    fn test_without_writer() {
        let lib = ChartLibrary::builtin().without_writer(ChartFormat::Sm);
        assert!(!lib.can_write(ChartFormat::Sm));
        assert!(lib.can_parse(ChartFormat::Sm));
    }

    #[test]
    fn test_custom_parser_replaces_builtin() {
        let lib = ChartLibrary::builtin().with_parser(ChartFormat::Osu, |_| {
            Err(ChartError::Malformed("always fails".into()))
        });
        let parser = lib.parser(ChartFormat::Osu).unwrap();
        assert!(parser("anything").is_err());

        let writer = lib.writer(ChartFormat::Qua).unwrap();
        assert!(writer(&sample_chart()).is_ok());
    }
}
