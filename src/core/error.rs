//! Failure taxonomy for the OCR pipeline.
//!
//! Each error type is scoped to the smallest unit it can spoil: a page
//! (`RenderError`, `RecognitionError`), a file (`AssemblyError`, or a
//! `RenderError::Load` on the whole document) or the selection itself
//! (`SelectionError`). Only the last one ever stops a batch.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
  #[error(transparent)]
  Selection(#[from] SelectionError),

  #[error(transparent)]
  Render(#[from] RenderError),

  #[error(transparent)]
  Recognition(#[from] RecognitionError),

  #[error(transparent)]
  Assembly(#[from] AssemblyError),

  #[error(transparent)]
  Config(#[from] ConfigError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
  #[error("no files were selected")]
  Empty,

  /// Names of the files that failed the PDF filter.
  #[error("only original PDF files are accepted (rejected: {})", .0.join(", "))]
  NotPdf(Vec<String>),
}

#[derive(Debug, Error)]
pub enum RenderError {
  #[error("pdfium library is not available: {0}")]
  Bind(String),

  #[error("failed to load PDF: {0}")]
  Load(String),

  #[error("page {page} is out of range (document has {page_count} pages)")]
  PageOutOfRange { page: u32, page_count: u32 },

  #[error("failed to render page {page}: {reason}")]
  Render { page: u32, reason: String },
}

#[derive(Debug, Error)]
pub enum RecognitionError {
  #[error("OCR engine failed: {0}")]
  Engine(String),

  #[error("unreadable OCR output: {0}")]
  Output(String),

  #[error("OCR I/O error: {0}")]
  Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum AssemblyError {
  #[error("failed to encode page image: {0}")]
  Image(String),

  #[error("failed to encode page content: {0}")]
  Content(String),

  #[error("failed to save PDF: {0}")]
  Encode(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
  #[error("{name} must be a positive number, got {value}")]
  InvalidScale { name: &'static str, value: f32 },

  #[error("at least one OCR language is required")]
  NoLanguages,

  #[error("font size bounds are inverted: min {min} > max {max}")]
  FontBounds { min: f32, max: f32 },
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn not_pdf_lists_rejected_names() {
    let err = SelectionError::NotPdf(vec!["a.txt".into(), "b.lnk".into()]);
    assert_eq!(
      err.to_string(),
      "only original PDF files are accepted (rejected: a.txt, b.lnk)"
    );
  }

  #[test]
  fn scoped_errors_convert_into_crate_error() {
    let err: Error = RenderError::Render {
      page: 3,
      reason: "bad stream".into(),
    }
    .into();
    assert!(matches!(err, Error::Render(_)));
    assert_eq!(err.to_string(), "failed to render page 3: bad stream");
  }
}
