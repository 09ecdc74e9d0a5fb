//! Export strategies that turn a stream of rendered rows into one artifact.

mod archive;
mod document;

pub use archive::{entry_name, ArchiveAdapter};
pub use document::{DocumentAdapter, Orientation};

use log::info;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::engine::{RenderResult, Template};

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Row {index} produced an empty raster")]
    EmptyRaster { index: usize },
    #[error("Row {index} raster is {actual:?}, expected {expected:?}")]
    SizeMismatch {
        index: usize,
        expected: (u32, u32),
        actual: (u32, u32),
    },
    #[error("Image encoding failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("Archive encoding failed: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("PDF encoding failed: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Unknown export format '{0}': expected png or pdf")]
    UnknownFormat(String),
}

/// The finished output of one batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub file_name: String,
    pub media_type: &'static str,
    pub bytes: Vec<u8>,
}

impl Artifact {
    /// Writes the artifact into `dir` under its own file name.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes)?;
        info!("Wrote {} ({} bytes) to {:?}", self.file_name, self.bytes.len(), path);
        Ok(path)
    }
}

/// Accumulates rendered rows and produces an [`Artifact`].
///
/// `append` is called once per row in ascending row order. `finalize` consumes
/// the adapter; an adapter dropped without finalizing produces nothing.
pub trait ExportAdapter: Send {
    fn format(&self) -> ExportFormat;

    fn append(&mut self, index: usize, label: &str, raster: RenderResult) -> Result<(), ExportError>;

    fn finalize(self: Box<Self>) -> Result<Artifact, ExportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// `certificates.zip` with one PNG per row.
    #[serde(alias = "zip", alias = "png-batch")]
    Png,
    /// `certificates.pdf` with one page per row.
    #[serde(alias = "pdf-batch")]
    Pdf,
}

impl ExportFormat {
    pub fn file_name(&self) -> &'static str {
        match self {
            ExportFormat::Png => "certificates.zip",
            ExportFormat::Pdf => "certificates.pdf",
        }
    }

    pub fn adapter(&self, template: &Template) -> Box<dyn ExportAdapter> {
        match self {
            ExportFormat::Png => Box::new(ArchiveAdapter::new()),
            ExportFormat::Pdf => Box::new(DocumentAdapter::new(template.width(), template.height())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Png => write!(f, "png-batch"),
            ExportFormat::Pdf => write!(f, "pdf-batch"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" | "zip" | "png-batch" => Ok(ExportFormat::Png),
            "pdf" | "pdf-batch" => Ok(ExportFormat::Pdf),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

fn check_raster(index: usize, raster: &RenderResult) -> Result<(), ExportError> {
    if raster.width() == 0 || raster.height() == 0 {
        return Err(ExportError::EmptyRaster { index });
    }
    Ok(())
}
