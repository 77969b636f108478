use napi::bindgen_prelude::*;
use napi::threadsafe_function::{ThreadsafeFunction, ThreadsafeFunctionCallMode};
use napi::{Env, Task};
use napi_derive::napi;
use std::path::PathBuf;

use crate::core::batch::{self, Pipeline, ProgressSink};
use crate::core::config::PipelineConfig;
use crate::core::model::{FileResult, InputFile, ProgressEvent};
use crate::core::text;
use crate::types::{OcrFileResult, OcrOptions, OcrWord, PdfFile, ProgressUpdate, TextPlacement};

// The batch runs on a libuv worker, so everything a task carries must cross threads.
const _: () = {
  fn assert_send<T: Send>() {}
  fn check() {
    assert_send::<InputFile>();
    assert_send::<PipelineConfig>();
    assert_send::<FileResult>();
  }
};

type ProgressCallback = ThreadsafeFunction<ProgressUpdate, (), ProgressUpdate, Status, false>;

fn init_logging() {
  let _ = env_logger::try_init();
}

fn to_napi(e: crate::core::error::Error) -> Error {
  Error::from_reason(e.to_string())
}

fn config_from(opts: Option<&OcrOptions>) -> PipelineConfig {
  let defaults = PipelineConfig::default();
  PipelineConfig {
    languages: opts
      .and_then(|o| o.languages.clone())
      .unwrap_or(defaults.languages),
    ocr_scale: opts
      .and_then(|o| o.ocr_scale)
      .map(|s| s as f32)
      .unwrap_or(defaults.ocr_scale),
    preview_scale: opts
      .and_then(|o| o.preview_scale)
      .map(|s| s as f32)
      .unwrap_or(defaults.preview_scale),
    tessdata_prefix: opts.and_then(|o| o.tessdata_prefix.clone()),
    tesseract_binary: opts.and_then(|o| o.tesseract_binary.clone()),
    pdfium_library_dir: opts
      .and_then(|o| o.pdfium_library_dir.as_ref())
      .map(PathBuf::from),
    layer: defaults.layer,
  }
}

fn run_batch(
  files: &[InputFile],
  config: PipelineConfig,
  sink: &mut dyn ProgressSink,
) -> Result<Vec<FileResult>> {
  let pipeline = Pipeline::with_defaults(config).map_err(to_napi)?;
  pipeline.process_batch(files, sink).map_err(to_napi)
}

// ── Standalone sync functions ───────────────────────────────────

#[napi]
pub fn is_accepted_pdf(name: String, mime_type: String) -> bool {
  batch::is_accepted_pdf(&name, &mime_type)
}

#[napi]
pub fn ocr_output_filename(name: String) -> String {
  batch::output_filename(&name)
}

/// Map one OCR word box (top-left pixel space) to its invisible text placement.
#[napi]
pub fn map_ocr_word(word: OcrWord, raster_height: u32) -> Option<TextPlacement> {
  text::map_word(&word.into(), raster_height).map(TextPlacement::from)
}

/// Blocks the calling thread until the whole batch is done.
#[napi]
pub fn ocr_pdf_files(files: Vec<PdfFile>, opts: Option<OcrOptions>) -> Result<Vec<OcrFileResult>> {
  init_logging();
  let files: Vec<InputFile> = files.into_iter().map(InputFile::from).collect();
  let results = run_batch(&files, config_from(opts.as_ref()), &mut |_: ProgressEvent| {})?;
  Ok(results.into_iter().map(OcrFileResult::from).collect())
}

// ── Async batch (libuv thread pool via AsyncTask) ───────────────

pub struct OcrBatchTask {
  files: Vec<InputFile>,
  config: PipelineConfig,
  on_progress: Option<ProgressCallback>,
}

#[napi]
impl Task for OcrBatchTask {
  type Output = Vec<FileResult>;
  type JsValue = Vec<OcrFileResult>;

  fn compute(&mut self) -> Result<Self::Output> {
    let on_progress = &self.on_progress;
    let mut sink = |event: ProgressEvent| {
      if let Some(callback) = on_progress {
        let status = callback.call(
          ProgressUpdate::from(&event),
          ThreadsafeFunctionCallMode::NonBlocking,
        );
        if status != Status::Ok {
          log::debug!("[Batch] progress event dropped ({status:?}): {}", event.label);
        }
      }
    };
    run_batch(&self.files, self.config.clone(), &mut sink)
  }

  fn resolve(&mut self, _env: Env, output: Self::Output) -> Result<Self::JsValue> {
    Ok(output.into_iter().map(OcrFileResult::from).collect())
  }
}

/// Files are processed one after another on a single worker; `onProgress`
/// receives `{ label, percent, color }` as the batch advances.
#[napi]
pub fn ocr_pdf_files_async(
  files: Vec<PdfFile>,
  opts: Option<OcrOptions>,
  on_progress: Option<ThreadsafeFunction<ProgressUpdate, (), ProgressUpdate, Status, false>>,
) -> AsyncTask<OcrBatchTask> {
  init_logging();
  AsyncTask::new(OcrBatchTask {
    files: files.into_iter().map(InputFile::from).collect(),
    config: config_from(opts.as_ref()),
    on_progress,
  })
}

