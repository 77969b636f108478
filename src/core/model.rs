use image::RgbImage;

/// One file handed over by the host. Read-only for the whole run.
#[derive(Debug, Clone)]
pub struct InputFile {
  pub name: String,
  /// Declared MIME type as reported by the host (may be wrong).
  pub mime_type: String,
  pub data: Vec<u8>,
}

impl InputFile {
  pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
    InputFile {
      name: name.into(),
      mime_type: mime_type.into(),
      data,
    }
  }
}

/// A page rendered to pixels. Owned by the step that produced it and
/// consumed once it has been encoded for embedding.
#[derive(Debug, Clone)]
pub struct RasterPage {
  /// 1-based page number in the source document.
  pub page: u32,
  pub image: RgbImage,
}

impl RasterPage {
  pub fn new(page: u32, image: RgbImage) -> Self {
    RasterPage { page, image }
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }
}

/// Axis-aligned box in raster pixel space, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BBox {
  pub x0: f32,
  pub y0: f32,
  pub x1: f32,
  pub y1: f32,
}

impl BBox {
  pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
    BBox { x0, y0, x1, y1 }
  }

  pub fn width(&self) -> f32 {
    self.x1 - self.x0
  }

  pub fn height(&self) -> f32 {
    self.y1 - self.y0
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedWord {
  pub text: String,
  pub bbox: BBox,
}

impl RecognizedWord {
  pub fn new(text: impl Into<String>, bbox: BBox) -> Self {
    RecognizedWord {
      text: text.into(),
      bbox,
    }
  }
}

/// Invisible text placement in PDF space (origin bottom-left, y up).
#[derive(Debug, Clone, PartialEq)]
pub struct TextDrawInstruction {
  pub text: String,
  pub x: f32,
  pub y: f32,
  pub font_size: f32,
  pub max_width: f32,
  pub line_height: f32,
  pub opacity: f32,
}

/// Page bitmap already packed for the output document: raw 8-bit RGB,
/// zlib-compressed, ready to become a `FlateDecode` image XObject.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
  pub width: u32,
  pub height: u32,
  pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct PageResult {
  /// 1-based page number in the source document.
  pub source_page: u32,
  pub image: EmbeddedImage,
  pub instructions: Vec<TextDrawInstruction>,
}

/// Outcome of one input file. `output` is absent when the document could not
/// be loaded or assembled; `error` then says why.
#[derive(Debug, Clone, Default)]
pub struct FileResult {
  pub filename: String,
  pub preview_data_url: Option<String>,
  pub output: Option<Vec<u8>>,
  pub output_filename: String,
  pub error: Option<String>,
  pub page_count: u32,
  /// Pages dropped because they failed to rasterize.
  pub skipped_pages: Vec<u32>,
  /// Pages embedded without a text layer because OCR failed.
  pub pages_without_text: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressPhase {
  Batch,
  Recognition,
}

impl ProgressPhase {
  /// Colour hint for the presentation layer.
  pub fn color(self) -> &'static str {
    match self {
      ProgressPhase::Batch => "#4f8cff",
      ProgressPhase::Recognition => "#34d49c",
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
  pub label: String,
  /// 0..=100
  pub percent: u32,
  pub phase: ProgressPhase,
}

impl ProgressEvent {
  pub fn new(label: impl Into<String>, fraction: f64, phase: ProgressPhase) -> Self {
    ProgressEvent {
      label: label.into(),
      percent: (fraction.clamp(0.0, 1.0) * 100.0).round() as u32,
      phase,
    }
  }

  pub fn color(&self) -> &'static str {
    self.phase.color()
  }
}
