use crate::core::error::ConfigError;
use crate::core::text::LayerStyle;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock, PoisonError};

pub const DEFAULT_LANGUAGES: &str = "ita+eng";
pub const DEFAULT_OCR_SCALE: f32 = 2.0;
pub const DEFAULT_PREVIEW_SCALE: f32 = 1.0;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
  /// Tesseract language set, applied to every page.
  pub languages: String,
  /// Render scale for OCR input. Higher trades time for accuracy.
  pub ocr_scale: f32,
  /// Render scale for the page-1 thumbnail.
  pub preview_scale: f32,
  pub tessdata_prefix: Option<String>,
  pub tesseract_binary: Option<String>,
  pub pdfium_library_dir: Option<PathBuf>,
  pub layer: LayerStyle,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    PipelineConfig {
      languages: DEFAULT_LANGUAGES.to_string(),
      ocr_scale: DEFAULT_OCR_SCALE,
      preview_scale: DEFAULT_PREVIEW_SCALE,
      tessdata_prefix: None,
      tesseract_binary: None,
      pdfium_library_dir: None,
      layer: LayerStyle::default(),
    }
  }
}

impl PipelineConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    if !(self.ocr_scale.is_finite() && self.ocr_scale > 0.0) {
      return Err(ConfigError::InvalidScale {
        name: "ocr_scale",
        value: self.ocr_scale,
      });
    }
    if !(self.preview_scale.is_finite() && self.preview_scale > 0.0) {
      return Err(ConfigError::InvalidScale {
        name: "preview_scale",
        value: self.preview_scale,
      });
    }
    if self.languages.split('+').all(|l| l.trim().is_empty()) {
      return Err(ConfigError::NoLanguages);
    }
    if self.layer.min_font_size > self.layer.max_font_size {
      return Err(ConfigError::FontBounds {
        min: self.layer.min_font_size,
        max: self.layer.max_font_size,
      });
    }
    Ok(())
  }

  pub fn tesseract_binary(&self) -> &str {
    self.tesseract_binary.as_deref().unwrap_or("tesseract")
  }

  /// Explicit tessdata directory if configured, otherwise whatever the
  /// environment or the configured tesseract binary reports.
  pub fn tessdata_prefix(&self) -> Option<String> {
    match &self.tessdata_prefix {
      Some(p) => Some(p.clone()),
      None => detect_tessdata_prefix(self.tesseract_binary()),
    }
  }
}

/// Auto-detect tessdata path, cached per tesseract binary for the lifetime of
/// the process. Checks `TESSDATA_PREFIX` env var first (user override), then
/// falls back to parsing the output of `<binary> --list-langs` (e.g.
/// `List of available languages in "/usr/share/tesseract-ocr/5/tessdata/" (161):`).
/// Returns `None` if neither source yields a path, letting tesseract use its
/// compiled-in default.
fn detect_tessdata_prefix(binary: &str) -> Option<String> {
  static TESSDATA_PATHS: OnceLock<Mutex<HashMap<String, Option<String>>>> = OnceLock::new();

  let mut paths = TESSDATA_PATHS
    .get_or_init(Default::default)
    .lock()
    .unwrap_or_else(PoisonError::into_inner);
  paths
    .entry(binary.to_string())
    .or_insert_with(|| probe_tessdata_prefix(binary))
    .clone()
}

fn probe_tessdata_prefix(binary: &str) -> Option<String> {
  if let Ok(path) = std::env::var("TESSDATA_PREFIX") {
    return Some(path);
  }

  let output = std::process::Command::new(binary)
    .arg("--list-langs")
    .output()
    .ok()?;

  // tesseract writes the path header to stderr
  let stderr = String::from_utf8_lossy(&output.stderr);
  let text = if stderr.contains('"') {
    stderr
  } else {
    String::from_utf8_lossy(&output.stdout)
  };
  parse_list_langs_path(&text)
}

/// Parse: `List of available languages in "/path/to/tessdata/" (N):`
fn parse_list_langs_path(text: &str) -> Option<String> {
  let start = text.find('"')?;
  let end = text[start + 1..].find('"')?;
  Some(text[start + 1..start + 1 + end].to_string())
}
