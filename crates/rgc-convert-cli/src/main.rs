//! rgc-convert - Batch rhythm game chart converter
//!
//! Usage:
//!   rgc-convert convert <inputs...> --to <format>   Convert charts
//!   rgc-convert formats                             List formats
//!   rgc-convert --help                              Show help

use tracing_subscriber::EnvFilter;

use rgc_convert_cli::cli;
use rgc_convert_core::Config;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    // Check for --help
    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        cli::print_help();
        return Ok(());
    }

    match cli::parse_args(&args) {
        Ok((command, options)) => {
            init_logging(cli::default_log_filter(options, &Config::load()));
            cli::run(command, options)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            cli::print_help();
            std::process::exit(1);
        }
    }
}

fn init_logging(default: &str) {
    // Logs go to stderr so JSON output on stdout stays parseable
    let filter = EnvFilter::try_from_env("RGC_LOG").unwrap_or_else(|_| EnvFilter::new(default));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
