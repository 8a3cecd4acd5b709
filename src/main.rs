//! vera2pdf - Main Application Entrypoint
//!
//! This file is responsible for parsing command-line arguments, initializing
//! the application environment (like logging), and dispatching the core
//! processing logic.

use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use vera2pdf::error::FatalError;
use vera2pdf::{Config, Metadata, is_programme_dir, run};

/// Converts a VERA council meeting export into a single cross-linked PDF.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the VERA export directory (the one holding index.html)
    #[arg(short, long, env = "VERA_PROGRAMME_PATH")]
    programme: Option<PathBuf>,

    /// Existing directory to write the PDF into
    #[arg(short, long)]
    output: PathBuf,

    /// Name of the town or office that produced the export
    #[arg(long)]
    author: Option<String>,

    /// Your name
    #[arg(long)]
    contributor: Option<String>,

    /// URL of the original export
    #[arg(long)]
    source: Option<String>,

    /// LibreOffice binary used to convert office documents
    #[arg(long)]
    soffice: Option<PathBuf>,

    /// wkhtmltopdf binary used to print the HTML pages
    #[arg(long, default_value = "wkhtmltopdf")]
    wkhtmltopdf: PathBuf,

    /// Write a JSON report next to the PDF
    #[arg(long)]
    report: bool,

    /// Keep the temp directory for inspection
    #[arg(long)]
    keep_temp: bool,

    /// Logging verbosity level
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn main() {
    let args = Args::parse();

    // 1. Initialize Logger
    let log_level = match args.log_level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    info!("Starting vera2pdf...");

    // 2. Validate paths
    let Some(programme_dir) = args.programme else {
        let e = FatalError::NoInputDirectory;
        error!("{}", e);
        std::process::exit(e.exit_code());
    };
    if !is_programme_dir(&programme_dir) {
        error!("Programme path is not a VERA export directory: {:?}", programme_dir);
        std::process::exit(1);
    }
    if !args.output.is_dir() {
        error!("Output directory does not exist: {:?}", args.output);
        std::process::exit(1);
    }

    // 3. Create a configuration object from arguments
    let config = Config {
        programme_dir,
        output_dir: args.output,
        metadata: Metadata {
            author: args.author,
            contributor: args.contributor,
            source: args.source,
        },
        soffice: args.soffice,
        wkhtmltopdf: args.wkhtmltopdf,
        report: args.report,
        keep_temp: args.keep_temp,
    };

    // 4. Run the main application logic
    match run(config) {
        Ok(output) => info!("Complete PDF file was written to {:?}", output),
        Err(e) => {
            error!("Application failed: {:#}", e);
            let code = e.downcast_ref::<FatalError>().map(FatalError::exit_code).unwrap_or(3);
            std::process::exit(code);
        }
    }

    info!("Processing completed successfully.");
    std::process::exit(0);
}
