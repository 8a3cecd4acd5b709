//! Fatal error kinds.
//!
//! Only these abort a run. Everything that can go wrong with a single
//! attachment is logged and absorbed where it happens.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FatalError {
    #[error("no programme directory given (use --programme or VERA_PROGRAMME_PATH)")]
    NoInputDirectory,

    #[error("programme does not match the expected VERA export format: {0}")]
    WrongProgrammeFormat(String),

    #[error("office document converter not found at {0:?}")]
    ConverterNotFound(PathBuf),

    #[error("HTML to PDF printer not found at {0:?}")]
    PrinterNotFound(PathBuf),
}

impl FatalError {
    pub fn format(detail: impl Into<String>) -> Self {
        FatalError::WrongProgrammeFormat(detail.into())
    }

    /// Process exit code for this error class.
    pub fn exit_code(&self) -> i32 {
        match self {
            FatalError::NoInputDirectory => 1,
            FatalError::WrongProgrammeFormat(_)
            | FatalError::ConverterNotFound(_)
            | FatalError::PrinterNotFound(_) => 2,
        }
    }
}
