//! Batch orchestration.
//!
//! Files are processed one at a time, in upload order, and each file walks a
//! small state machine:
//!
//! ```text
//! Idle -> Previewing -> Recognizing(1..=n) -> Assembling -> Done
//!   \-> Failed (document could not be loaded)
//! ```
//!
//! A page that fails to render is dropped; a page that fails OCR keeps its
//! image and loses its text layer; a file that fails to assemble ends `Done`
//! without output. Nothing is retried and nothing aborts the batch.

use crate::core::config::PipelineConfig;
use crate::core::document::DocumentAssembler;
use crate::core::error::{Result, SelectionError};
use crate::core::images::{PageSource, Rasterizer, embed_raster, preview_data_url};
use crate::core::model::{FileResult, InputFile, PageResult, ProgressEvent, ProgressPhase};
use crate::core::ocr::Recognizer;
use crate::core::text::map_words;

pub const PDF_MIME_TYPE: &str = "application/pdf";

/// Receives progress notifications. Implemented for any `FnMut(ProgressEvent)`.
pub trait ProgressSink {
  fn report(&mut self, event: ProgressEvent);
}

impl<F: FnMut(ProgressEvent)> ProgressSink for F {
  fn report(&mut self, event: ProgressEvent) {
    self(event)
  }
}

/// Declared PDF type and a `.pdf` name; shortcut files never pass even when
/// the host misreports them as PDF.
pub fn is_accepted_pdf(name: &str, mime_type: &str) -> bool {
  let lower = name.to_lowercase();
  mime_type == PDF_MIME_TYPE && !lower.ends_with(".lnk") && lower.ends_with(".pdf")
}

/// The whole selection is rejected if any file fails the PDF filter.
pub fn check_selection(files: &[InputFile]) -> std::result::Result<(), SelectionError> {
  if files.is_empty() {
    return Err(SelectionError::Empty);
  }
  let rejected: Vec<String> = files
    .iter()
    .filter(|f| !is_accepted_pdf(&f.name, &f.mime_type))
    .map(|f| f.name.clone())
    .collect();
  if !rejected.is_empty() {
    return Err(SelectionError::NotPdf(rejected));
  }
  Ok(())
}

/// `scan.PDF` -> `scan_OCR.pdf`. Names without a trailing `.pdf` are kept.
pub fn output_filename(name: &str) -> String {
  let split = name.len().saturating_sub(4);
  match name.get(split..) {
    Some(ext) if ext.eq_ignore_ascii_case(".pdf") => format!("{}_OCR.pdf", &name[..split]),
    _ => name.to_string(),
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
  Idle,
  Previewing,
  Recognizing { page: u32, total: u32 },
  Assembling,
  Done,
  Failed,
}

impl FileState {
  pub fn is_terminal(&self) -> bool {
    matches!(self, FileState::Done | FileState::Failed)
  }
}

pub struct Pipeline {
  config: PipelineConfig,
  rasterizer: Box<dyn Rasterizer>,
  recognizer: Box<dyn Recognizer>,
  assembler: Box<dyn DocumentAssembler>,
}

impl Pipeline {
  pub fn new(
    config: PipelineConfig,
    rasterizer: Box<dyn Rasterizer>,
    recognizer: Box<dyn Recognizer>,
    assembler: Box<dyn DocumentAssembler>,
  ) -> Self {
    Pipeline {
      config,
      rasterizer,
      recognizer,
      assembler,
    }
  }

  /// pdfium for rendering, the default Tesseract engine, lopdf for output.
  #[cfg(feature = "render")]
  pub fn with_defaults(config: PipelineConfig) -> Result<Self> {
    use crate::core::document::LopdfAssembler;
    use crate::core::images::PdfiumRasterizer;
    use crate::core::ocr::default_recognizer;

    config.validate()?;
    let rasterizer = PdfiumRasterizer::bind(config.pdfium_library_dir.as_deref())?;
    let recognizer = default_recognizer(&config);
    Ok(Pipeline::new(
      config,
      Box::new(rasterizer),
      recognizer,
      Box::new(LopdfAssembler),
    ))
  }

  pub fn config(&self) -> &PipelineConfig {
    &self.config
  }

  pub fn process_file(&self, file: &InputFile, sink: &mut dyn ProgressSink) -> FileResult {
    FileJob::new(self, file).run(sink)
  }

  /// Validate the selection, then process every file in order. Yields one
  /// result per input file whatever happens to the individual files.
  pub fn process_batch(
    &self,
    files: &[InputFile],
    sink: &mut dyn ProgressSink,
  ) -> Result<Vec<FileResult>> {
    self.config.validate()?;
    check_selection(files)?;

    let total = files.len();
    log::info!("[Batch] starting {} file(s)", total);
    sink.report(ProgressEvent::new(
      "Uploading files...",
      0.0,
      ProgressPhase::Batch,
    ));

    let mut results = Vec::with_capacity(total);
    for (idx, file) in files.iter().enumerate() {
      let label = format!("Processing... ({}/{})", idx + 1, total);
      sink.report(ProgressEvent::new(
        label.clone(),
        idx as f64 / total as f64,
        ProgressPhase::Batch,
      ));
      results.push(self.process_file(file, sink));
      sink.report(ProgressEvent::new(
        label,
        (idx + 1) as f64 / total as f64,
        ProgressPhase::Batch,
      ));
    }
    Ok(results)
  }
}

/// One file moving through the pipeline. Drive it with [`FileJob::step`] or
/// run it to completion with [`FileJob::run`].
pub struct FileJob<'a> {
  pipeline: &'a Pipeline,
  file: &'a InputFile,
  state: FileState,
  source: Option<Box<dyn PageSource + 'a>>,
  pages: Vec<PageResult>,
  result: FileResult,
}

impl<'a> FileJob<'a> {
  pub fn new(pipeline: &'a Pipeline, file: &'a InputFile) -> Self {
    FileJob {
      pipeline,
      file,
      state: FileState::Idle,
      source: None,
      pages: Vec::new(),
      result: FileResult {
        filename: file.name.clone(),
        output_filename: output_filename(&file.name),
        ..FileResult::default()
      },
    }
  }

  pub fn state(&self) -> FileState {
    self.state
  }

  /// Perform the work of the current state and move to the next one.
  pub fn step(&mut self, sink: &mut dyn ProgressSink) -> FileState {
    self.state = match self.state {
      FileState::Idle => self.load(),
      FileState::Previewing => self.preview(),
      FileState::Recognizing { page, total } => {
        self.recognize_page(page, total, sink);
        if page < total {
          FileState::Recognizing {
            page: page + 1,
            total,
          }
        } else {
          FileState::Assembling
        }
      }
      FileState::Assembling => self.assemble(sink),
      terminal => terminal,
    };
    self.state
  }

  pub fn run(mut self, sink: &mut dyn ProgressSink) -> FileResult {
    while !self.state.is_terminal() {
      self.step(sink);
    }
    self.into_result()
  }

  pub fn into_result(self) -> FileResult {
    self.result
  }

  fn load(&mut self) -> FileState {
    let pipeline: &'a Pipeline = self.pipeline;
    let file: &'a InputFile = self.file;
    match pipeline.rasterizer.open(&file.data) {
      Ok(source) => {
        self.result.page_count = source.page_count();
        log::info!("[Batch] {}: {} page(s)", file.name, self.result.page_count);
        self.source = Some(source);
        FileState::Previewing
      }
      Err(e) => {
        log::warn!("[Batch] {}: {}", file.name, e);
        self.result.error = Some(e.to_string());
        FileState::Failed
      }
    }
  }

  /// Best effort: a missing thumbnail never stops the file.
  fn preview(&mut self) -> FileState {
    let total = self.result.page_count;
    if let Some(source) = &self.source
      && total > 0
    {
      let rendered = source
        .render(1, self.pipeline.config.preview_scale)
        .map_err(|e| e.to_string())
        .and_then(|raster| preview_data_url(&raster).map_err(|e| e.to_string()));
      match rendered {
        Ok(url) => self.result.preview_data_url = Some(url),
        Err(e) => log::debug!("[Batch] {}: no preview ({})", self.file.name, e),
      }
    }
    if total == 0 {
      FileState::Assembling
    } else {
      FileState::Recognizing { page: 1, total }
    }
  }

  fn recognize_page(&mut self, page: u32, total: u32, sink: &mut dyn ProgressSink) {
    let Some(source) = &self.source else {
      return;
    };
    let config = &self.pipeline.config;
    let name = &self.file.name;
    let done = (page - 1) as f64;

    sink.report(ProgressEvent::new(
      format!("OCR ({name}): page {page}/{total}"),
      done / total as f64,
      ProgressPhase::Recognition,
    ));

    let raster = match source.render(page, config.ocr_scale) {
      Ok(r) => r,
      Err(e) => {
        log::warn!("[Batch] {name}: skipping page {page}: {e}");
        self.result.skipped_pages.push(page);
        return;
      }
    };

    let mut last = 0.0f32;
    let mut on_progress = |fraction: f32| {
      let fraction = fraction.clamp(0.0, 1.0).max(last);
      last = fraction;
      sink.report(ProgressEvent::new(
        format!(
          "OCR ({name}): page {page}/{total} ({}%)",
          (fraction * 100.0).round() as u32
        ),
        (done + fraction as f64) / total as f64,
        ProgressPhase::Recognition,
      ));
    };
    let words = match self
      .pipeline
      .recognizer
      .recognize(&raster, &config.languages, &mut on_progress)
    {
      Ok(words) => words,
      Err(e) => {
        log::warn!("[Batch] {name}: OCR failed on page {page}: {e}");
        self.result.pages_without_text.push(page);
        Vec::new()
      }
    };

    let instructions = map_words(&words, raster.height(), &config.layer);
    log::debug!(
      "[Batch] {name}: page {page} -> {} text instruction(s)",
      instructions.len()
    );
    match embed_raster(raster) {
      Ok(image) => self.pages.push(PageResult {
        source_page: page,
        image,
        instructions,
      }),
      Err(e) => {
        log::warn!("[Batch] {name}: skipping page {page}: {e}");
        self.result.skipped_pages.push(page);
      }
    }
  }

  fn assemble(&mut self, sink: &mut dyn ProgressSink) -> FileState {
    sink.report(ProgressEvent::new(
      "Saving corrected PDF...",
      1.0,
      ProgressPhase::Recognition,
    ));
    // the source document is not needed past this point
    self.source = None;
    let pages = std::mem::take(&mut self.pages);
    match self.pipeline.assembler.assemble(&pages) {
      Ok(bytes) => {
        log::info!(
          "[Batch] {}: wrote {} ({} of {} pages)",
          self.file.name,
          self.result.output_filename,
          pages.len(),
          self.result.page_count
        );
        self.result.output = Some(bytes);
      }
      Err(e) => {
        log::warn!("[Batch] {}: {}", self.file.name, e);
        self.result.error = Some(e.to_string());
      }
    }
    FileState::Done
  }
}
