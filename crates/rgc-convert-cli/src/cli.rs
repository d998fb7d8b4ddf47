//! Headless command line mode
//!
//! Usage:
//!   rgc-convert convert <inputs...> --to <format>   Convert charts and archives
//!   rgc-convert formats                             List supported formats
//!
//! Options:
//!   --to <format>      Target chart format (osu, qua, fsc, sm)
//!   --shape <shape>    Export shape: file, map or zip
//!   --out <dir>        Output directory
//!   --json             Output in JSON format

use std::path::{Path, PathBuf};

use anyhow::Context;
use rgc_convert_core::{
    ArchiveKind, ChartFormat, Config, ConvertSummary, Converter, ExportShape, FileTreeNode,
    ImportSummary, InputFile, ItemFailure, MapsetFormat, MemoryFs, Phase,
};
use serde::Serialize;
use walkdir::WalkDir;

use crate::sink::DirectorySink;

/// CLI command to execute
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    Convert {
        inputs: Vec<PathBuf>,
        target: Option<ChartFormat>,
        shape: Option<ExportShape>,
        output: Option<PathBuf>,
    },
    Formats,
}

/// CLI options
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CliOptions {
    pub json: bool,
    pub verbose: bool,
}

/// Default log filter when `RGC_LOG` is unset
pub fn default_log_filter(options: CliOptions, config: &Config) -> &'static str {
    if options.verbose || config.debug {
        "debug"
    } else {
        "warn"
    }
}

/// Parse CLI arguments and return command + options
pub fn parse_args(args: &[String]) -> Result<(CliCommand, CliOptions), String> {
    let mut options = CliOptions::default();
    let mut command: Option<&str> = None;
    let mut inputs: Vec<PathBuf> = Vec::new();
    let mut target: Option<ChartFormat> = None;
    let mut shape: Option<ExportShape> = None;
    let mut output: Option<PathBuf> = None;

    let mut i = 0;
    while i < args.len() {
        let arg = &args[i];
        match arg.as_str() {
            "--json" => options.json = true,
            "--verbose" | "-v" => options.verbose = true,
            "--to" | "-t" => {
                i += 1;
                let value = args.get(i).ok_or("--to requires a format")?;
                target = Some(parse_format(value)?);
            }
            "--shape" | "-s" => {
                i += 1;
                let value = args.get(i).ok_or("--shape requires a value")?;
                shape = Some(
                    value
                        .parse()
                        .map_err(|_| format!("Invalid shape '{}'. Use: file, map or zip", value))?,
                );
            }
            "--out" | "-o" => {
                i += 1;
                let value = args.get(i).ok_or("--out requires a directory")?;
                output = Some(PathBuf::from(value));
            }
            "convert" | "formats" if command.is_none() => command = Some(arg.as_str()),
            _ => {
                if arg.starts_with('-') {
                    return Err(format!("Unknown option: {}", arg));
                }
                match command {
                    Some("convert") => inputs.push(PathBuf::from(arg)),
                    Some(_) => return Err(format!("Unexpected argument: {}", arg)),
                    None => return Err(format!("Unknown command: {}", arg)),
                }
            }
        }
        i += 1;
    }

    let command = match command {
        Some("convert") => {
            if inputs.is_empty() {
                return Err("convert requires at least one input file".to_string());
            }
            CliCommand::Convert {
                inputs,
                target,
                shape,
                output,
            }
        }
        Some(_) => CliCommand::Formats,
        None => return Err("No command specified. Use: convert <inputs...> or formats".to_string()),
    };

    Ok((command, options))
}

fn parse_format(s: &str) -> Result<ChartFormat, String> {
    s.parse::<ChartFormat>().map_err(|_| {
        format!(
            "Invalid format '{}'. Use: {}",
            s,
            ChartFormat::ALL
                .iter()
                .map(|f| f.extension())
                .collect::<Vec<_>>()
                .join(", ")
        )
    })
}

/// Run CLI command
pub fn run(command: CliCommand, options: CliOptions) -> anyhow::Result<()> {
    match command {
        CliCommand::Formats => {
            print_formats(options);
            Ok(())
        }
        CliCommand::Convert {
            inputs,
            target,
            shape,
            output,
        } => {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            runtime.block_on(run_convert(inputs, target, shape, output, options))
        }
    }
}

fn print_formats(options: CliOptions) {
    if options.json {
        let charts: Vec<_> = ChartFormat::ALL
            .iter()
            .map(|f| {
                serde_json::json!({
                    "extension": f.extension(),
                    "game": f.game_name(),
                    "mapset_extension": f.mapset_extension(),
                })
            })
            .collect();
        let mapsets: Vec<_> = MapsetFormat::ALL.iter().map(|m| m.extension()).collect();
        let archives: Vec<_> = ArchiveKind::ALL.iter().map(|a| a.extension()).collect();

        println!(
            "{}",
            serde_json::json!({
                "charts": charts,
                "mapsets": mapsets,
                "archives": archives,
            })
        );
    } else {
        println!("Chart formats:");
        for format in ChartFormat::ALL {
            println!(
                "  .{:<4} {:<11} (mapset: .{})",
                format.extension(),
                format.game_name(),
                format.mapset_extension()
            );
        }
        println!();
        println!(
            "Mapset packages: {}",
            MapsetFormat::ALL
                .iter()
                .map(|m| format!(".{}", m.extension()))
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!("Archives:        .zip (.rar, .tar and .7z are recognized but not extracted)");
    }
}

/// Read every input path from the host; directories are walked recursively
pub async fn collect_inputs(paths: &[PathBuf]) -> anyhow::Result<Vec<InputFile>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                files.push(read_input(entry.path()).await?);
            }
        } else {
            files.push(read_input(path).await?);
        }
    }

    Ok(files)
}

async fn read_input(path: &Path) -> anyhow::Result<InputFile> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    tracing::debug!("Read input {} ({} bytes)", path.display(), data.len());
    Ok(InputFile::new(path.to_string_lossy(), data))
}

/// Combined outcome of one convert run
#[derive(Debug, Serialize)]
struct RunReport {
    target: ChartFormat,
    shape: ExportShape,
    output_dir: PathBuf,
    import: ImportSummary,
    convert: ConvertSummary,
    export_failures: Vec<ItemFailure>,
    written: Vec<PathBuf>,
}

async fn run_convert(
    inputs: Vec<PathBuf>,
    target: Option<ChartFormat>,
    shape: Option<ExportShape>,
    output: Option<PathBuf>,
    options: CliOptions,
) -> anyhow::Result<()> {
    let mut config = Config::load();
    if output.is_some() {
        config.output_dir = output;
    }
    let target = target
        .or(config.default_target)
        .ok_or_else(|| anyhow::anyhow!("No target format given. Use --to <format>"))?;
    let shape = shape.unwrap_or(config.export_shape);
    let output_dir = config.output_dir();

    let files = collect_inputs(&inputs).await?;
    let sink = DirectorySink::new(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let converter = Converter::with_builtin(MemoryFs::new(), config);
    converter.initialize().await?;

    // Progress line for non-JSON mode
    let show_progress = !options.json;
    let progress_task = show_progress.then(|| {
        let mut rx = converter.progress().subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let state = rx.borrow_and_update().clone();
                if state.visible {
                    eprint!("\r{:<40} {:>3.0}%", state.status, state.progress);
                }
            }
        })
    });

    let result = convert_and_export(&converter, &files, target, shape, &sink).await;

    if let Some(task) = progress_task {
        task.abort();
        eprintln!(); // New line after progress
    }

    let (import, convert, mut export_failures) = result?;
    for error in sink.take_errors() {
        export_failures.push(ItemFailure::new(
            Phase::Export,
            error.path.to_string_lossy(),
            error.source,
        ));
    }

    let report = RunReport {
        target,
        shape,
        output_dir,
        import,
        convert,
        export_failures,
        written: sink.written(),
    };
    print_report(&report, options)?;

    Ok(())
}

async fn convert_and_export(
    converter: &Converter<MemoryFs>,
    files: &[InputFile],
    target: ChartFormat,
    shape: ExportShape,
    sink: &DirectorySink,
) -> anyhow::Result<(ImportSummary, ConvertSummary, Vec<ItemFailure>)> {
    let import = converter.import_files(files).await?;
    let convert = converter.convert_all(target, false).await?;

    let failures = match shape {
        ExportShape::File => {
            let mut failures = Vec::new();
            for node in leaves(&converter.file_tree().await) {
                if let Err(e) = converter.export_node(&node, ExportShape::File, sink).await {
                    failures.push(ItemFailure::new(
                        Phase::Export,
                        node.path.clone(),
                        e,
                    ));
                }
            }
            failures
        }
        ExportShape::Map => converter.export_all_mapsets(sink).await?,
        ExportShape::Zip => {
            converter.export_all_as_zip(sink).await?;
            Vec::new()
        }
    };

    Ok((import, convert, failures))
}

/// Every file node of a tree, depth first
fn leaves(nodes: &[FileTreeNode]) -> Vec<FileTreeNode> {
    let mut out = Vec::new();
    for node in nodes {
        match &node.children {
            Some(children) => out.extend(leaves(children)),
            None if !node.is_dir() => out.push(node.clone()),
            None => {}
        }
    }
    out
}

fn print_report(report: &RunReport, options: CliOptions) -> anyhow::Result<()> {
    if options.json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("Conversion to {} complete:", report.target.game_name());
    println!("  Mapsets:    {}", report.import.mapsets);
    println!("  Parsed:     {}", report.import.charts);
    println!("  Converted:  {}", report.convert.converted);
    if report.convert.skipped > 0 {
        println!("  Skipped:    {}", report.convert.skipped);
    }
    println!(
        "  Time:       {:.2}s extract, {:.2}s parse, {:.2}s convert",
        report.import.extract_time.as_secs_f64(),
        report.import.parse_time.as_secs_f64(),
        report.convert.convert_time.as_secs_f64()
    );
    println!();

    println!(
        "Wrote {} file(s) to {} ({}):",
        report.written.len(),
        report.output_dir.display(),
        report.shape
    );
    for path in report.written.iter().take(20) {
        println!("  {}", path.display());
    }
    if report.written.len() > 20 {
        println!("  ... and {} more", report.written.len() - 20);
    }

    let failures: Vec<_> = report
        .import
        .failures
        .iter()
        .chain(&report.convert.failures)
        .chain(&report.export_failures)
        .collect();
    if !failures.is_empty() {
        println!();
        println!("Failures ({}):", failures.len());
        for failure in failures {
            println!("  [{}] {}: {}", failure.phase, failure.path, failure.message);
        }
    }

    Ok(())
}

/// Print CLI help
pub fn print_help() {
    println!("rgc-convert - Batch rhythm game chart converter");
    println!();
    println!("USAGE:");
    println!("    rgc-convert convert <inputs...> --to <format> [OPTIONS]");
    println!("    rgc-convert formats [--json]");
    println!();
    println!("COMMANDS:");
    println!("    convert <inputs...>   Convert chart files, mapset packages and zip archives");
    println!("    formats               List supported chart, mapset and archive formats");
    println!();
    println!("INPUTS:");
    println!("    .zip                  Every top-level folder becomes a mapset");
    println!("    .osz .qp .fms         One mapset named after the file");
    println!("    other files           Grouped into one untitled mapset");
    println!("    directories           Walked recursively, files are treated as above");
    println!();
    println!("OPTIONS:");
    println!("    -t, --to <format>     Target format: osu, qua, fsc, sm");
    println!("    -s, --shape <shape>   Export shape (default: zip)");
    println!("                            file  Every converted file on its own");
    println!("                            map   One container per mapset");
    println!("                            zip   Everything in rgc-export.zip");
    println!("    -o, --out <dir>       Output directory (default: current directory)");
    println!("    --json                Output results in JSON format");
    println!("    -v, --verbose         Verbose logging (RGC_LOG overrides)");
    println!("    -h, --help            Show this help message");
    println!();
    println!("EXAMPLES:");
    println!("    rgc-convert convert Song.osz --to qua");
    println!("    rgc-convert convert maps.zip extra.sm --to osu --shape map --out converted");
    println!("    rgc-convert convert ./charts --to fsc --shape file --json");
}

#[cfg(test)]
mod tests {
    use super::*;
    use rgc_convert_core::vfs::EntryKind;

    fn node(name: &str, children: Option<Vec<FileTreeNode>>) -> FileTreeNode {
        FileTreeNode {
            name: name.to_string(),
            kind: if children.is_some() {
                EntryKind::Directory
            } else {
                EntryKind::File
            },
            path: format!("/MapExport/{}", name),
            children,
        }
    }

    #[test]
    fn test_default_log_filter() {
        let quiet = CliOptions::default();
        let verbose = CliOptions {
            verbose: true,
            ..CliOptions::default()
        };
        let debug_config = Config {
            debug: true,
            ..Config::default()
        };

        assert_eq!(default_log_filter(quiet, &Config::default()), "warn");
        assert_eq!(default_log_filter(verbose, &Config::default()), "debug");
        assert_eq!(default_log_filter(quiet, &debug_config), "debug");
    }

    #[test]
    fn test_leaves_skips_directories() {
        let tree = vec![
            node("set", Some(vec![node("a.qua", None), node("empty", Some(vec![]))])),
            node("b.qua", None),
        ];
        let names: Vec<_> = leaves(&tree).into_iter().map(|n| n.name).collect();
        assert_eq!(names, vec!["a.qua", "b.qua"]);
    }

    #[tokio::test]
    async fn test_collect_inputs_walks_directories() {
        let temp = tempfile::TempDir::new().expect("Failed to create temp dir");
        let nested = temp.path().join("charts").join("deep");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(temp.path().join("charts").join("a.osu"), b"a").unwrap();
        std::fs::write(nested.join("b.sm"), b"b").unwrap();
        let single = temp.path().join("Song.osz");
        std::fs::write(&single, b"zip").unwrap();

        let files = collect_inputs(&[temp.path().join("charts"), single])
            .await
            .unwrap();

        let names: Vec<_> = files.iter().map(|f| f.file_name()).collect();
        assert_eq!(names, vec!["a.osu", "b.sm", "Song.osz"]);
        assert_eq!(&files[2].data[..], b"zip");
    }

    #[tokio::test]
    async fn test_collect_inputs_missing_file() {
        let temp = tempfile::TempDir::new().expect("Failed to create temp dir");
        let result = collect_inputs(&[temp.path().join("missing.osz")]).await;
        assert!(result.is_err());
    }
}
