//! HTML to PDF printing.

use crate::error::FatalError;
use anyhow::{Context, Result, bail};
use log::{debug, warn};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;

pub trait HtmlPrinter {
    /// Prints the page at `html` to a PDF at `pdf`.
    fn print(&self, html: &Path, pdf: &Path) -> Result<()>;
}

/// Prints through the `wkhtmltopdf` binary.
#[derive(Debug, Clone)]
pub struct WkHtmlToPdf {
    binary: PathBuf,
}

impl WkHtmlToPdf {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        WkHtmlToPdf { binary: binary.into() }
    }

    /// A4 portrait with half inch margins.
    pub fn arguments() -> Vec<&'static str> {
        vec![
            "--page-size", "A4",
            "--margin-top", "0.5in",
            "--margin-right", "0.5in",
            "--margin-bottom", "0.5in",
            "--margin-left", "0.5in",
            "--encoding", "UTF-8",
            "--enable-local-file-access",
            "--no-outline",
            "--orientation", "Portrait",
            "--quiet",
        ]
    }
}

impl HtmlPrinter for WkHtmlToPdf {
    fn print(&self, html: &Path, pdf: &Path) -> Result<()> {
        let output = match Command::new(&self.binary).args(Self::arguments()).arg(html).arg(pdf).output() {
            Ok(output) => output,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(FatalError::PrinterNotFound(self.binary.clone()).into());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to execute {:?} for {:?}", self.binary, html));
            }
        };

        let produced = pdf.metadata().map(|m| m.len() > 0).unwrap_or(false);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // Missing images or stylesheets fail the exit status but still
            // produce a usable document.
            if produced {
                warn!("wkhtmltopdf reported problems printing {:?}: {}", html, stderr.trim());
            } else {
                bail!("wkhtmltopdf failed on {:?} ({}): {}", html, output.status, stderr.trim());
            }
        }
        if !produced {
            bail!("wkhtmltopdf did not produce {:?}", pdf);
        }
        debug!("Printed {:?} to {:?}", html, pdf);
        Ok(())
    }
}
