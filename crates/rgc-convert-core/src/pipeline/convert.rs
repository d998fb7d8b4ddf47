//! Convert phase: write every indexed chart in the target format

use bytes::Bytes;
use futures::stream::{self, StreamExt};

use super::{ItemFailure, Phase};
use crate::chart::{Chart, ChartFormat, ChartLibrary};
use crate::config::{EXPORT_ROOT, IMPORT_ROOT};
use crate::error::{Error, Result};
use crate::index::ParseIndex;
use crate::progress::PhaseProgress;
use crate::vfs::{clear_dir, copy_dir, path, VirtualFs};

/// Totals of a conversion run
#[derive(Debug, Default)]
pub struct ConvertOutcome {
    pub converted: usize,
    pub skipped: usize,
    pub failures: Vec<ItemFailure>,
}

impl ConvertOutcome {
    fn merge(&mut self, other: ConvertOutcome) {
        self.converted += other.converted;
        self.skipped += other.skipped;
        self.failures.extend(other.failures);
    }
}

/// Copy one mapset into the export tree and replace its charts
async fn convert_mapset<F: VirtualFs>(
    fs: &F,
    charts: &ChartLibrary,
    index: &ParseIndex<Chart>,
    key: &str,
    target: ChartFormat,
) -> ConvertOutcome {
    let mut outcome = ConvertOutcome::default();
    let import_dir = path::join(IMPORT_ROOT, key);
    let export_dir = path::join(EXPORT_ROOT, key);

    if let Err(e) = copy_dir(fs, &import_dir, &export_dir).await {
        outcome
            .failures
            .push(ItemFailure::new(Phase::Convert, &import_dir, e));
        return outcome;
    }

    let writer = charts.writer(target);
    for entry in index.entries_for(key) {
        let file_name = path::file_name(&entry.original_path);
        match fs.unlink(&path::join(&export_dir, file_name)).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => tracing::debug!("Could not remove {}: {}", file_name, e),
        }

        let Some(writer) = writer else {
            outcome.skipped += 1;
            continue;
        };

        let text = match writer(&entry.data) {
            Ok(text) => text,
            Err(source) => {
                let e = Error::Chart {
                    path: entry.original_path.clone(),
                    source,
                };
                outcome
                    .failures
                    .push(ItemFailure::new(Phase::Convert, &entry.original_path, e));
                continue;
            }
        };

        let new_name = format!("{}.{}", path::remove_extension(file_name), target.extension());
        let dest = path::join(&export_dir, &new_name);
        match fs.write_file(&dest, Bytes::from(text)).await {
            Ok(()) => {
                tracing::debug!("Converted {} -> {}", entry.original_path, dest);
                outcome.converted += 1;
            }
            Err(e) => outcome
                .failures
                .push(ItemFailure::new(Phase::Convert, &dest, e)),
        }
    }

    outcome
}

/// Convert every mapset in `index` to `target` under the export root.
///
/// Fails only when the index is empty or the export root cannot be reset.
/// Up to `concurrency` mapsets are processed at once; results are merged
/// in key order.
pub async fn convert_index<F: VirtualFs>(
    fs: &F,
    charts: &ChartLibrary,
    index: &ParseIndex<Chart>,
    target: ChartFormat,
    concurrency: usize,
    progress: &PhaseProgress<'_>,
) -> Result<ConvertOutcome> {
    let keys = index.keys();
    if keys.is_empty() {
        return Err(Error::NothingToConvert);
    }
    if !charts.can_write(target) {
        tracing::warn!("No writer available for {}; charts will be skipped", target);
    }

    clear_dir(fs, EXPORT_ROOT).await?;

    let results: Vec<ConvertOutcome> = stream::iter(keys.iter())
        .map(|key| async move {
            progress.begin(format!("{} {}...", Phase::Convert, key));
            let outcome = convert_mapset(fs, charts, index, key, target).await;
            progress.tick(format!("{} {}... done", Phase::Convert, key));
            outcome
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut total = ConvertOutcome::default();
    for outcome in results {
        total.merge(outcome);
    }
    Ok(total)
}
