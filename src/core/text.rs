use crate::core::font::text_width;
use crate::core::model::{RecognizedWord, TextDrawInstruction};

/// Tunables of the invisible text layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerStyle {
  /// Font size as a fraction of the word box height.
  pub font_size_ratio: f32,
  pub min_font_size: f32,
  pub max_font_size: f32,
  /// Line height as a fraction of the word box height.
  pub line_height_ratio: f32,
  /// Near-zero rather than zero: some viewers refuse to select fully
  /// transparent text.
  pub opacity: f32,
}

impl Default for LayerStyle {
  fn default() -> Self {
    LayerStyle {
      font_size_ratio: 0.85,
      min_font_size: 7.0,
      max_font_size: 32.0,
      line_height_ratio: 1.05,
      opacity: 0.01,
    }
  }
}

/// Map one OCR word to a draw instruction with the default style.
pub fn map_word(word: &RecognizedWord, raster_height: u32) -> Option<TextDrawInstruction> {
  map_word_with(word, raster_height, &LayerStyle::default())
}

/// Convert a word box from top-left pixel space to bottom-left PDF space.
/// The output page is sized 1:1 to the raster, so `x` carries over and `y`
/// flips around the raster height, anchored at the bottom edge of the box.
/// Blank words yield `None`.
pub fn map_word_with(
  word: &RecognizedWord,
  raster_height: u32,
  style: &LayerStyle,
) -> Option<TextDrawInstruction> {
  if word.text.trim().is_empty() {
    return None;
  }
  let bbox = &word.bbox;
  let box_height = bbox.height();
  let font_size = (box_height * style.font_size_ratio).clamp(style.min_font_size, style.max_font_size);
  Some(TextDrawInstruction {
    text: word.text.clone(),
    x: bbox.x0,
    y: raster_height as f32 - bbox.y1,
    font_size,
    max_width: bbox.width(),
    line_height: box_height * style.line_height_ratio,
    opacity: style.opacity,
  })
}

/// Map a whole page, preserving word order and dropping blanks. Words are
/// placed independently; overlapping boxes are left as they are.
pub fn map_words(
  words: &[RecognizedWord],
  raster_height: u32,
  style: &LayerStyle,
) -> Vec<TextDrawInstruction> {
  words
    .iter()
    .filter_map(|w| map_word_with(w, raster_height, style))
    .collect()
}

/// Split `text` into drawable lines: hard breaks on newlines, soft breaks at
/// spaces once a line would exceed `max_width`. A single word wider than
/// `max_width` stays on its own line.
pub(crate) fn break_lines(text: &str, font_size: f32, max_width: f32) -> Vec<String> {
  let mut lines = Vec::new();
  for paragraph in text.split('\n') {
    let paragraph = paragraph.trim_end_matches('\r');
    let mut line = String::new();
    for token in paragraph.split_inclusive(' ') {
      if !line.is_empty() && text_width(&format!("{line}{token}"), font_size) > max_width {
        lines.push(line.trim_end().to_string());
        line.clear();
      }
      line.push_str(token);
    }
    lines.push(line);
  }
  lines
}
