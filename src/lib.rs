//! vera2pdf - Core Library
//!
//! Turns a VERA council meeting export into one cross-linked PDF: the
//! programme is parsed, attachments are normalized to PDF, every agenda item
//! is printed together with its attachments, and the pieces are joined,
//! given a cover and linked to each other.

use anyhow::{Context, Result};
use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub mod archive;
pub mod assembler;
pub mod converter;
pub mod cover;
pub mod document_builder;
pub mod dom;
pub mod error;
pub mod html_edit;
pub mod item_builder;
pub mod layout;
pub mod linker;
pub mod model;
pub mod naming;
pub mod normalize;
pub mod pdf;
pub mod printer;
pub mod programme;
pub mod report;
pub mod text;

use layout::Placement;
use printer::{HtmlPrinter, WkHtmlToPdf};
use report::RunReport;

/// Publishing metadata written on the cover and into the document info.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    /// Town or office that produced the export.
    pub author: Option<String>,
    /// Person who prepared this document.
    pub contributor: Option<String>,
    /// URL of the original export.
    pub source: Option<String>,
}

/// Application configuration structure.
#[derive(Debug)]
pub struct Config {
    pub programme_dir: PathBuf,
    pub output_dir: PathBuf,
    pub metadata: Metadata,
    /// Office converter binary instead of the platform default.
    pub soffice: Option<PathBuf>,
    pub wkhtmltopdf: PathBuf,
    pub report: bool,
    pub keep_temp: bool,
}

/// Scratch directory layout of one run.
#[derive(Debug, Clone)]
pub struct WorkDirs {
    pub root: PathBuf,
    /// Edited item pages.
    pub html: PathBuf,
    /// Printed item documents.
    pub items: PathBuf,
    /// Normalized and repaired attachment files.
    pub attachments: PathBuf,
    /// Files extracted from zip attachments.
    pub archives: PathBuf,
}

impl WorkDirs {
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let dirs = WorkDirs {
            html: root.join("html"),
            items: root.join("items"),
            attachments: root.join("attachments"),
            archives: root.join("archives"),
            root,
        };
        for dir in [&dirs.html, &dirs.items, &dirs.attachments, &dirs.archives] {
            fs::create_dir_all(dir).with_context(|| format!("Failed to create scratch directory {:?}", dir))?;
        }
        Ok(dirs)
    }
}

/// Runs the whole conversion. Returns the path of the written PDF.
pub fn run(config: Config) -> Result<PathBuf> {
    let printer = WkHtmlToPdf::new(&config.wkhtmltopdf);
    run_with_printer(&config, &printer)
}

/// [`run`] with a caller-supplied HTML printer.
pub fn run_with_printer(config: &Config, printer: &dyn HtmlPrinter) -> Result<PathBuf> {
    info!("Initializing processing with config: {:?}", config);

    let scratch = scratch_dir(config.keep_temp)?;
    let dirs = WorkDirs::create(scratch.path())?;

    // 1. Parse the export
    info!("Parsing programme...");
    let programme::Programme { header, mut items, index_path } = programme::parse_programme(&config.programme_dir)?;
    let output_path = config
        .output_dir
        .join(naming::output_file_name(&header, Local::now().date_naive())?);
    info!("Programme of {:?} has {} items", header.designator, items.len());
    normalize::trace_attachments("parsed", &items);

    // 2. Normalize attachments
    info!("Extracting *.ZIP attachments...");
    archive::expand_archives(&mut items, &dirs.archives);
    normalize::trace_attachments("archives expanded", &items);

    info!("Converting attachments to PDF files...");
    normalize::Normalizer::new(&dirs.attachments, config.soffice.as_deref()).normalize_items(&mut items)?;
    normalize::trace_attachments("converted", &items);

    // 3. Print the index and every item
    info!("Creating PDF for index programme...");
    let index_html = dirs.root.join(programme::INDEX_FILE);
    html_edit::edit_index_page(&index_path, &config.programme_dir, &index_html)?;
    let index_pdf = dirs.root.join("index.pdf");
    printer.print(&index_html, &index_pdf).context("Failed to print the programme index")?;

    info!("Creating PDFs for programme items...");
    let pb = ProgressBar::new(items.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Building items [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) [{elapsed_precise}<{eta}]")
            .context("Invalid progress bar template")?
            .progress_chars("##-"),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    let mut item_pdfs = Vec::with_capacity(items.len());
    for item in items.iter_mut() {
        let build = item_builder::build_item(item, &header, &dirs, printer)?;
        item_pdfs.push(build.pdf);
        pb.inc(1);
    }
    pb.finish_with_message(format!("Built {} items", items.len()));

    // 4. Join, cover, link
    info!("Joining programme with programme items in PDF...");
    let assembler::Assembly { mut pdf, lengths } = assembler::assemble(&index_pdf, &item_pdfs, &dirs.root.join("joined.pdf"))?;

    info!("Inserting title page...");
    let cover_pages = cover::prepend_cover(&mut pdf, &header, &config.metadata, &dirs.root.join("cover.pdf"))?;

    info!("Updating links in joined PDF...");
    linker::link_programme(&mut pdf, &lengths, cover_pages)?;
    let placement = Placement { lengths: &lengths, base: cover_pages, total_pages: pdf.page_count() };
    for (i, item) in items.iter_mut().enumerate() {
        item.pdf_start_page = Some(placement.item_start(i));
    }

    let entries = info_entries(&header, &config.metadata);
    let entries: Vec<(&str, &str)> = entries.iter().map(|(key, value)| (*key, value.as_str())).collect();
    pdf.set_info(&entries)?;
    let page_count = pdf.finalize(&output_path)?;
    info!("Successfully wrote {:?} ({} pages)", output_path, page_count);

    if config.report {
        let report_path = RunReport::path_for(&output_path);
        RunReport::new(&output_path, &header, &items, &lengths, cover_pages, page_count).write(&report_path)?;
        info!("Successfully wrote report {:?}", report_path);
    }
    if !config.keep_temp {
        if let Err(e) = scratch.close() {
            warn!("Failed to remove temp directory: {}", e);
        }
    }
    Ok(output_path)
}

/// Temp directory for one run. With `keep` set it stays on disk after the
/// handle is dropped.
pub fn scratch_dir(keep: bool) -> Result<TempDir> {
    let scratch = tempfile::Builder::new()
        .prefix("vera2pdf-")
        .disable_cleanup(keep)
        .tempdir()
        .context("Failed to create temp directory")?;
    if keep {
        info!("Keeping temp directory {:?}", scratch.path());
    } else {
        debug!("Created temp directory {:?}", scratch.path());
    }
    Ok(scratch)
}

fn info_entries(header: &model::MeetingHeader, metadata: &Metadata) -> Vec<(&'static str, String)> {
    let mut entries = vec![
        ("Title", format!("{} - {}", header.designator, header.title)),
        ("Creator", "vera2pdf".to_string()),
    ];
    let optional = [
        ("Author", &metadata.author),
        ("Subject", &metadata.source),
        ("Keywords", &metadata.contributor),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            entries.push((key, value.clone()));
        }
    }
    entries
}

/// Whether `dir` looks like a VERA export.
pub fn is_programme_dir(dir: &Path) -> bool {
    dir.is_dir() && dir.join(programme::INDEX_FILE).is_file()
}
