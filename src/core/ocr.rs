use crate::core::config::PipelineConfig;
use crate::core::error::RecognitionError;
use crate::core::images::encode_png;
use crate::core::model::{BBox, RasterPage, RecognizedWord};
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Instant;

/// Word-level OCR over one page raster.
///
/// `progress` receives the fraction of this page done, in [0, 1]. Engines may
/// report as coarsely as they like; callers keep the sequence monotonic.
pub trait Recognizer {
  fn recognize(
    &self,
    page: &RasterPage,
    languages: &str,
    progress: &mut dyn FnMut(f32),
  ) -> Result<Vec<RecognizedWord>, RecognitionError>;
}

/// The in-process engine when built with `ocr`, the CLI otherwise.
pub fn default_recognizer(config: &PipelineConfig) -> Box<dyn Recognizer + Send> {
  #[cfg(feature = "ocr")]
  {
    Box::new(TesseractApi::from_config(config))
  }
  #[cfg(not(feature = "ocr"))]
  {
    Box::new(TesseractCli::from_config(config))
  }
}

/// TSV level of a single word.
const TSV_WORD_LEVEL: i32 = 5;

/// Parse Tesseract TSV output into word boxes in pixel space.
///
/// Columns: `level page_num block_num par_num line_num word_num left top
/// width height conf text`. Only word rows with a confidence are kept.
pub fn parse_tsv(tsv: &str) -> Vec<RecognizedWord> {
  let mut words = Vec::new();

  for line in tsv.lines() {
    let cols: Vec<&str> = line.split('\t').collect();
    if cols.len() < 12 {
      continue;
    }

    // header row fails this parse too
    let Ok(level) = cols[0].parse::<i32>() else {
      continue;
    };
    let conf: f32 = cols[10].trim().parse().unwrap_or(-1.0);
    let text = cols[11].trim();
    if level != TSV_WORD_LEVEL || conf < 0.0 || text.is_empty() {
      continue;
    }

    let geometry: Option<Vec<f32>> = cols[6..10].iter().map(|c| c.trim().parse().ok()).collect();
    let Some(g) = geometry else {
      continue;
    };
    let (left, top, width, height) = (g[0], g[1], g[2], g[3]);

    words.push(RecognizedWord::new(
      text,
      BBox::new(left, top, left + width, top + height),
    ));
  }

  words
}

/// Runs the `tesseract` binary, piping the page PNG through stdin.
pub struct TesseractCli {
  binary: String,
  tessdata_prefix: Option<String>,
}

impl TesseractCli {
  pub fn new(binary: impl Into<String>, tessdata_prefix: Option<String>) -> Self {
    TesseractCli {
      binary: binary.into(),
      tessdata_prefix,
    }
  }

  pub fn from_config(config: &PipelineConfig) -> Self {
    TesseractCli::new(
      config.tesseract_binary(),
      config.tessdata_prefix(),
    )
  }
}

impl Recognizer for TesseractCli {
  fn recognize(
    &self,
    page: &RasterPage,
    languages: &str,
    progress: &mut dyn FnMut(f32),
  ) -> Result<Vec<RecognizedWord>, RecognitionError> {
    let start = Instant::now();
    progress(0.0);

    let png = encode_png(&page.image).map_err(|e| RecognitionError::Engine(e.to_string()))?;

    let mut cmd = Command::new(&self.binary);
    cmd
      .args(["stdin", "stdout", "-l", languages, "tsv"])
      .stdin(Stdio::piped())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped());
    if let Some(prefix) = &self.tessdata_prefix {
      cmd.env("TESSDATA_PREFIX", prefix);
    }

    log::debug!("[Tesseract] {} stdin stdout -l {} tsv", self.binary, languages);
    let mut child = cmd.spawn()?;
    // tesseract reads the whole image before writing anything. It may also
    // quit early (missing traineddata), so the child is always reaped and its
    // exit status takes precedence over a broken pipe.
    let written = match child.stdin.take() {
      Some(mut stdin) => stdin.write_all(&png),
      None => Ok(()),
    };
    let output = child.wait_with_output()?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      return Err(RecognitionError::Engine(format!(
        "tesseract exited with {}: {}",
        output.status,
        stderr.trim()
      )));
    }
    written?;

    let tsv =
      String::from_utf8(output.stdout).map_err(|e| RecognitionError::Output(e.to_string()))?;
    let words = parse_tsv(&tsv);
    progress(1.0);

    log::debug!(
      "[Tesseract] page {}: {} words in {} ms",
      page.page,
      words.len(),
      start.elapsed().as_millis()
    );
    Ok(words)
  }
}

#[cfg(feature = "ocr")]
pub struct TesseractApi {
  datapath: String,
}

#[cfg(feature = "ocr")]
impl TesseractApi {
  pub fn from_config(config: &PipelineConfig) -> Self {
    TesseractApi {
      datapath: config.tessdata_prefix().unwrap_or_default(),
    }
  }
}

#[cfg(feature = "ocr")]
impl Recognizer for TesseractApi {
  fn recognize(
    &self,
    page: &RasterPage,
    languages: &str,
    progress: &mut dyn FnMut(f32),
  ) -> Result<Vec<RecognizedWord>, RecognitionError> {
    let engine_err = |e: tesseract_rs::TesseractError| RecognitionError::Engine(format!("{e:?}"));
    progress(0.0);

    let (w, h) = page.image.dimensions();
    let pixels = page.image.as_raw();

    let tess = tesseract_rs::TesseractAPI::new();
    tess.init(&self.datapath, languages).map_err(engine_err)?;
    tess
      .set_image(pixels, w as i32, h as i32, 3, (w * 3) as i32)
      .map_err(engine_err)?;
    progress(0.1);

    let tsv = tess.get_tsv_text(0).map_err(engine_err)?;
    progress(0.9);

    let words = parse_tsv(&tsv);
    progress(1.0);
    Ok(words)
  }
}
