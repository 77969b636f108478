#![deny(clippy::all)]

//! Make scanned PDFs searchable: every page is rasterized, run through OCR,
//! and written back as its image with an invisible, selectable text layer
//! laid over the recognized words.
//!
//! The pipeline is exposed as a plain Rust library; the `node` feature adds
//! N-API bindings on top of it.

pub mod core;

#[cfg(feature = "node")]
mod node;
#[cfg(feature = "node")]
mod types;

pub use crate::core::batch::{
  FileJob, FileState, Pipeline, ProgressSink, check_selection, is_accepted_pdf, output_filename,
};
pub use crate::core::config::PipelineConfig;
pub use crate::core::document::{DocumentAssembler, LopdfAssembler};
pub use crate::core::error::{
  AssemblyError, ConfigError, Error, RecognitionError, RenderError, Result, SelectionError,
};
pub use crate::core::images::{PageSource, Rasterizer};
pub use crate::core::model::{
  BBox, EmbeddedImage, FileResult, InputFile, PageResult, ProgressEvent, ProgressPhase,
  RasterPage, RecognizedWord, TextDrawInstruction,
};
pub use crate::core::ocr::{Recognizer, TesseractCli, default_recognizer};
pub use crate::core::text::{LayerStyle, map_word, map_word_with, map_words};

#[cfg(feature = "render")]
pub use crate::core::images::PdfiumRasterizer;
#[cfg(feature = "ocr")]
pub use crate::core::ocr::TesseractApi;
