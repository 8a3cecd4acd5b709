//! Office document conversion through a headless LibreOffice.

use crate::error::FatalError;
use anyhow::{Context, Result, bail};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

#[cfg(target_os = "macos")]
const DEFAULT_SOFFICE: &str = "/Applications/LibreOffice.app/Contents/MacOS/soffice";
#[cfg(target_os = "windows")]
const DEFAULT_SOFFICE: &str = r"C:\Program Files\LibreOffice\program\soffice.exe";
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const DEFAULT_SOFFICE: &str = "/usr/lib/libreoffice/program/soffice";

#[derive(Debug, Clone)]
pub struct OfficeConverter {
    binary: PathBuf,
}

impl OfficeConverter {
    /// Finds the converter binary: `override_path` when given, the
    /// platform's default install location otherwise.
    pub fn locate(override_path: Option<&Path>) -> Result<Self, FatalError> {
        let binary = override_path.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(DEFAULT_SOFFICE));
        if !binary.is_file() {
            return Err(FatalError::ConverterNotFound(binary));
        }
        debug!("Using office converter {:?}", binary);
        Ok(OfficeConverter { binary })
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Converts `file` to PDF inside `outdir` and returns the new file.
    pub fn convert(&self, file: &Path, outdir: &Path) -> Result<PathBuf> {
        if !file.exists() {
            bail!("File to convert {:?} does not exist", file);
        }
        let stem = file.file_stem().context("File to convert has no name")?;
        let target = outdir.join(stem).with_extension("pdf");

        info!("Converting {:?} to {:?} by LibreOffice", file.file_name().unwrap_or_default(), target);
        let status = Command::new(&self.binary)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg(file)
            .arg("--outdir")
            .arg(outdir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .with_context(|| format!("Failed to execute {:?}", self.binary))?;

        if !target.exists() {
            bail!("Converted file {:?} does not exist ({})", target, status);
        }
        Ok(target)
    }
}
