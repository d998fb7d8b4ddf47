//! Parse phase: fill the parse index from the import tree

use futures::future::join_all;

use super::{ItemFailure, Phase};
use crate::chart::{Chart, ChartLibrary, ParseFn};
use crate::config::IMPORT_ROOT;
use crate::error::{Error, Result};
use crate::index::ParseIndex;
use crate::library::ConverterLibraries;
use crate::progress::PhaseProgress;
use crate::vfs::{directory_names, file_names, path, VirtualFs};

/// Decode chart bytes as text, dropping a UTF-8 byte order mark
fn decode(data: &[u8]) -> String {
    let text = String::from_utf8_lossy(data);
    text.strip_prefix('\u{feff}').unwrap_or(&text).to_string()
}

async fn parse_file<F: VirtualFs>(
    fs: &F,
    parser: &ParseFn,
    file: &str,
) -> Result<Chart> {
    let data = fs.read_file(file).await?;
    parser(&decode(&data)).map_err(|source| Error::Chart {
        path: file.to_string(),
        source,
    })
}

/// Parse every chart file of one mapset, keeping enumeration order
async fn parse_mapset<F: VirtualFs>(
    fs: &F,
    charts: &ChartLibrary,
    key: &str,
) -> Vec<(String, Result<Chart>)> {
    let dir = path::join(IMPORT_ROOT, key);
    let files: Vec<(String, &ParseFn)> = file_names(fs, &dir)
        .await
        .into_iter()
        .filter_map(|name| {
            let parser = charts.parser_for_extension(&path::extension(&name))?;
            Some((path::join(&dir, &name), parser))
        })
        .collect();

    join_all(files.into_iter().map(|(file, parser)| async move {
        let result = parse_file(fs, parser, &file).await;
        (file, result)
    }))
    .await
}

/// Clear `index` and parse every mapset directory under the import root.
///
/// Only files directly inside a mapset directory are considered; files with
/// no registered parser are skipped silently. Parse failures are returned,
/// never propagated. Entries of one mapset are added in file enumeration
/// order regardless of completion order.
pub async fn parse_import_tree<F: VirtualFs>(
    fs: &F,
    libraries: &ConverterLibraries,
    index: &ParseIndex<Chart>,
    progress: &PhaseProgress<'_>,
) -> Result<Vec<ItemFailure>> {
    let charts = libraries.specific().map_err(|_| Error::LibraryNotReady)?;
    index.clear();

    let mapsets = directory_names(fs, IMPORT_ROOT).await;
    let total = mapsets.len();
    progress.begin(format!("{} Maps.. (0/{})", Phase::Parse, total));

    let charts = &charts;
    let results = join_all(mapsets.iter().map(|key| async move {
        let results = parse_mapset(fs, charts, key).await;
        progress.tick(format!(
            "{} Maps.. ({}/{})",
            Phase::Parse,
            progress.completed() + 1,
            total
        ));
        results
    }))
    .await;

    let mut failures = Vec::new();
    for (key, results) in mapsets.iter().zip(results) {
        for (file, result) in results {
            match result {
                Ok(chart) => {
                    tracing::debug!("Parsed {} ({} notes)", file, chart.notes.len());
                    index.add_entry(key, file, chart);
                }
                Err(e) => failures.push(ItemFailure::new(Phase::Parse, file, e)),
            }
        }
    }

    Ok(failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::{fixtures::sample_chart, ChartFormat};
    use crate::library::{builtin_libraries, builtin_libraries_with};
    use crate::progress::Progress;
    use crate::vfs::MemoryFs;
    use bytes::Bytes;

    async fn write(fs: &MemoryFs, path: &str, data: impl Into<Bytes>) {
        fs.mkdir(path::parent(path).unwrap(), true).await.unwrap();
        fs.write_file(path, data.into()).await.unwrap();
    }

    fn qua_text() -> String {
        ChartLibrary::builtin().writer(ChartFormat::Qua).unwrap()(&sample_chart()).unwrap()
    }

    #[tokio::test]
    async fn test_parse_isolates_failures() {
        let fs = MemoryFs::new();
        for name in ["1.qua", "2.qua", "3.qua", "5.qua"] {
            write(&fs, &format!("/MapImport/set/{}", name), qua_text()).await;
        }
        write(&fs, "/MapImport/set/4.qua", "Mode: [broken").await;
        write(&fs, "/MapImport/set/cover.png", &b"\x89PNG"[..]).await;

        let libs = builtin_libraries(1);
        libs.initialize().await.unwrap();
        let index = ParseIndex::new(IMPORT_ROOT);
        let progress = Progress::new();

        let failures = parse_import_tree(&fs, &libs, &index, &progress.phase(50.0..100.0, 1))
            .await
            .unwrap();

        assert_eq!(index.len(), 4);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].path, "/MapImport/set/4.qua");
        let paths: Vec<_> = index
            .entries_for("set")
            .iter()
            .map(|e| e.original_path.clone())
            .collect();
        assert_eq!(
            paths,
            vec![
                "/MapImport/set/1.qua",
                "/MapImport/set/2.qua",
                "/MapImport/set/3.qua",
                "/MapImport/set/5.qua"
            ]
        );
        assert_eq!(progress.snapshot().progress, 100.0);
    }

    #[tokio::test]
    async fn test_parse_requires_ready_library() {
        let fs = MemoryFs::new();
        let libs = builtin_libraries(1);
        let index = ParseIndex::new(IMPORT_ROOT);
        index.add_entry("old", "/x", sample_chart());
        let progress = Progress::new();

        let result = parse_import_tree(&fs, &libs, &index, &progress.phase(0.0..1.0, 0)).await;
        assert!(matches!(result, Err(Error::LibraryNotReady)));
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn test_parse_clears_previous_entries_and_skips_unknown() {
        let fs = MemoryFs::new();
        write(&fs, "/MapImport/a/readme.txt", "hello").await;
        write(&fs, "/MapImport/b/chart.QUA", qua_text()).await;
        write(&fs, "/MapImport/stray.qua", qua_text()).await;

        let libs = builtin_libraries_with(1, || {
            ChartLibrary::builtin().without_writer(ChartFormat::Osu)
        });
        libs.initialize().await.unwrap();
        let index = ParseIndex::new(IMPORT_ROOT);
        index.add_entry("old", "/x", sample_chart());
        let progress = Progress::new();

        let failures = parse_import_tree(&fs, &libs, &index, &progress.phase(0.0..1.0, 2))
            .await
            .unwrap();

        assert!(failures.is_empty());
        assert_eq!(index.keys(), vec!["b"]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_decode_strips_bom() {
        assert_eq!(decode(b"\xef\xbb\xbfosu file format v14"), "osu file format v14");
    }
}
