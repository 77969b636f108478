use crate::core::model::{
  BBox, FileResult, InputFile, ProgressEvent, RecognizedWord, TextDrawInstruction,
};
use napi::bindgen_prelude::Buffer;
use napi_derive::napi;

// ── Napi object types (JS boundary) ─────────────────────────────

#[napi(object)]
pub struct PdfFile {
  pub name: String,
  pub mime_type: String,
  pub data: Buffer,
}

#[napi(object)]
pub struct OcrOptions {
  /// Tesseract languages joined with `+`. Defaults to `ita+eng`.
  pub languages: Option<String>,
  pub ocr_scale: Option<f64>,
  pub preview_scale: Option<f64>,
  pub tessdata_prefix: Option<String>,
  pub tesseract_binary: Option<String>,
  pub pdfium_library_dir: Option<String>,
}

#[napi(object)]
pub struct OcrFileResult {
  pub filename: String,
  /// PNG data URL of page 1, absent when it could not be rendered.
  pub preview_data_url: Option<String>,
  pub output: Option<Buffer>,
  pub output_filename: String,
  pub error: Option<String>,
  pub page_count: u32,
  pub skipped_pages: Vec<u32>,
  pub pages_without_text: Vec<u32>,
}

#[napi(object)]
pub struct ProgressUpdate {
  pub label: String,
  pub percent: u32,
  pub color: String,
}

#[napi(object)]
pub struct WordBox {
  pub x0: f64,
  pub y0: f64,
  pub x1: f64,
  pub y1: f64,
}

#[napi(object)]
pub struct OcrWord {
  pub text: String,
  pub bbox: WordBox,
}

#[napi(object)]
pub struct TextPlacement {
  pub text: String,
  pub x: f64,
  pub y: f64,
  pub font_size: f64,
  pub max_width: f64,
  pub line_height: f64,
  pub opacity: f64,
}

// ── Conversions to and from the thread-safe core types ──

impl From<PdfFile> for InputFile {
  fn from(f: PdfFile) -> Self {
    InputFile::new(f.name, f.mime_type, f.data.to_vec())
  }
}

impl From<FileResult> for OcrFileResult {
  fn from(r: FileResult) -> Self {
    OcrFileResult {
      filename: r.filename,
      preview_data_url: r.preview_data_url,
      output: r.output.map(Buffer::from),
      output_filename: r.output_filename,
      error: r.error,
      page_count: r.page_count,
      skipped_pages: r.skipped_pages,
      pages_without_text: r.pages_without_text,
    }
  }
}

impl From<&ProgressEvent> for ProgressUpdate {
  fn from(e: &ProgressEvent) -> Self {
    ProgressUpdate {
      label: e.label.clone(),
      percent: e.percent,
      color: e.color().to_string(),
    }
  }
}

impl From<OcrWord> for RecognizedWord {
  fn from(w: OcrWord) -> Self {
    let b = w.bbox;
    RecognizedWord::new(
      w.text,
      BBox::new(b.x0 as f32, b.y0 as f32, b.x1 as f32, b.y1 as f32),
    )
  }
}

impl From<TextDrawInstruction> for TextPlacement {
  fn from(i: TextDrawInstruction) -> Self {
    TextPlacement {
      text: i.text,
      x: i.x as f64,
      y: i.y as f64,
      font_size: i.font_size as f64,
      max_width: i.max_width as f64,
      line_height: i.line_height as f64,
      opacity: i.opacity as f64,
    }
  }
}
