use image::{Rgb, RgbImage};
use lopdf::Document;
use lopdf::content::Content;
use ocrlayer::{
  AssemblyError, BBox, DocumentAssembler, PageResult, FileJob, FileState, InputFile, LopdfAssembler, PageSource, Pipeline, PipelineConfig,
  ProgressEvent, ProgressPhase, RasterPage, Rasterizer, RecognitionError, RecognizedWord,
  Recognizer, RenderError, SelectionError,
};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::Rc;

const PDF: &str = "application/pdf";

/// Documents are described in their bytes: `pages=N;fail=a,b` where `fail`
/// lists pages that refuse to render. `broken` fails to load.
struct FakeRasterizer;

struct FakeSource {
  pages: u32,
  failing: HashSet<u32>,
}

impl Rasterizer for FakeRasterizer {
  fn open<'a>(&'a self, data: &'a [u8]) -> Result<Box<dyn PageSource + 'a>, RenderError> {
    let layout = std::str::from_utf8(data).map_err(|e| RenderError::Load(e.to_string()))?;
    if layout == "broken" {
      return Err(RenderError::Load("not a PDF".into()));
    }
    let mut pages = 0;
    let mut failing = HashSet::new();
    for part in layout.split(';') {
      if let Some(n) = part.strip_prefix("pages=") {
        pages = n.parse().map_err(|_| RenderError::Load(layout.to_string()))?;
      } else if let Some(list) = part.strip_prefix("fail=") {
        failing.extend(list.split(',').filter_map(|p| p.parse::<u32>().ok()));
      }
    }
    Ok(Box::new(FakeSource { pages, failing }))
  }
}

impl PageSource for FakeSource {
  fn page_count(&self) -> u32 {
    self.pages
  }

  fn render(&self, page: u32, scale: f32) -> Result<RasterPage, RenderError> {
    if page == 0 || page > self.pages {
      return Err(RenderError::PageOutOfRange {
        page,
        page_count: self.pages,
      });
    }
    if self.failing.contains(&page) {
      return Err(RenderError::Render {
        page,
        reason: "corrupt page".into(),
      });
    }
    // 595x842 pt (A4) at `scale`, a different grey per page
    let w = (595.0 * scale) as u32;
    let h = (842.0 * scale) as u32;
    Ok(RasterPage::new(
      page,
      RgbImage::from_pixel(w, h, Rgb([page as u8 * 10, 200, 200])),
    ))
  }
}

/// Recognizes "Hello" at (10,10)-(60,30) on every page, except the pages
/// listed in `failing`. Records the page numbers it was asked for.
#[derive(Default)]
struct FakeRecognizer {
  failing: HashSet<u32>,
  seen: Rc<RefCell<Vec<u32>>>,
}

impl Recognizer for FakeRecognizer {
  fn recognize(
    &self,
    page: &RasterPage,
    _languages: &str,
    progress: &mut dyn FnMut(f32),
  ) -> Result<Vec<RecognizedWord>, RecognitionError> {
    self.seen.borrow_mut().push(page.page);
    progress(0.0);
    progress(0.5);
    // engines may go backwards; the pipeline must not
    progress(0.4);
    if self.failing.contains(&page.page) {
      return Err(RecognitionError::Engine("engine crashed".into()));
    }
    progress(1.0);
    Ok(vec![
      RecognizedWord::new("Hello", BBox::new(10.0, 10.0, 60.0, 30.0)),
      RecognizedWord::new("   ", BBox::new(70.0, 10.0, 90.0, 30.0)),
    ])
  }
}

fn pipeline_with(recognizer: FakeRecognizer) -> Pipeline {
  Pipeline::new(
    PipelineConfig::default(),
    Box::new(FakeRasterizer),
    Box::new(recognizer),
    Box::new(LopdfAssembler),
  )
}

fn pipeline() -> Pipeline {
  pipeline_with(FakeRecognizer::default())
}

fn pdf(name: &str, layout: &str) -> InputFile {
  InputFile::new(name, PDF, layout.as_bytes().to_vec())
}

fn run(pipeline: &Pipeline, files: &[InputFile]) -> (Vec<ocrlayer::FileResult>, Vec<ProgressEvent>) {
  let mut events = Vec::new();
  let results = pipeline
    .process_batch(files, &mut |e: ProgressEvent| events.push(e))
    .unwrap();
  (results, events)
}

fn operators(doc: &Document, page_id: lopdf::ObjectId) -> Content {
  let bytes = doc.get_page_content(page_id).unwrap();
  Content::decode(&bytes).unwrap()
}

#[test]
fn single_page_gets_text_layer_at_flipped_position() {
  let (results, _) = run(&pipeline(), &[pdf("scan.pdf", "pages=1")]);
  assert_eq!(results.len(), 1);
  let result = &results[0];
  assert_eq!(result.output_filename, "scan_OCR.pdf");
  assert!(result.error.is_none());
  assert!(
    result
      .preview_data_url
      .as_deref()
      .unwrap()
      .starts_with("data:image/png;base64,")
  );

  let doc = Document::load_mem(result.output.as_ref().unwrap()).unwrap();
  let pages = doc.get_pages();
  assert_eq!(pages.len(), 1);
  let page_id = pages[&1];

  // rendered at the default 2x: 1190x1684 px, one point per pixel
  let page = doc.get_dictionary(page_id).unwrap();
  let media_box: Vec<f32> = page
    .get(b"MediaBox")
    .unwrap()
    .as_array()
    .unwrap()
    .iter()
    .map(|o| o.as_float().unwrap())
    .collect();
  assert_eq!(media_box, vec![0.0, 0.0, 1190.0, 1684.0]);

  let content = operators(&doc, page_id);
  let tm = content.operations.iter().find(|o| o.operator == "Tm").unwrap();
  assert_eq!(tm.operands[4].as_float().unwrap(), 10.0);
  assert_eq!(tm.operands[5].as_float().unwrap(), 1654.0);
  let tf = content.operations.iter().find(|o| o.operator == "Tf").unwrap();
  assert_eq!(tf.operands[1].as_float().unwrap(), 17.0);
  // the blank word produced nothing
  assert_eq!(
    content.operations.iter().filter(|o| o.operator == "Tj").count(),
    1
  );
}

#[test]
fn failed_recognition_keeps_the_image_without_text() {
  let recognizer = FakeRecognizer {
    failing: HashSet::from([2]),
    ..FakeRecognizer::default()
  };
  let (results, _) = run(&pipeline_with(recognizer), &[pdf("a.pdf", "pages=3")]);
  let result = &results[0];
  assert_eq!(result.pages_without_text, vec![2]);
  assert!(result.skipped_pages.is_empty());

  let doc = Document::load_mem(result.output.as_ref().unwrap()).unwrap();
  let pages = doc.get_pages();
  assert_eq!(pages.len(), 3);
  let tj_count = |n: u32| {
    operators(&doc, pages[&n])
      .operations
      .iter()
      .filter(|o| o.operator == "Tj")
      .count()
  };
  assert_eq!(tj_count(1), 1);
  assert_eq!(tj_count(2), 0);
  assert_eq!(tj_count(3), 1);
  let do_count = operators(&doc, pages[&2])
    .operations
    .iter()
    .filter(|o| o.operator == "Do")
    .count();
  assert_eq!(do_count, 1);
}

#[test]
fn unrenderable_pages_are_dropped_in_order() {
  let seen = Rc::new(RefCell::new(Vec::new()));
  let recognizer = FakeRecognizer {
    seen: Rc::clone(&seen),
    ..FakeRecognizer::default()
  };
  let (results, _) = run(
    &pipeline_with(recognizer),
    &[pdf("a.pdf", "pages=4;fail=1,3")],
  );
  let result = &results[0];
  assert_eq!(result.page_count, 4);
  assert_eq!(result.skipped_pages, vec![1, 3]);
  // page 1 is also the preview page
  assert!(result.preview_data_url.is_none());
  assert_eq!(*seen.borrow(), vec![2, 4]);

  let doc = Document::load_mem(result.output.as_ref().unwrap()).unwrap();
  assert_eq!(doc.get_pages().len(), 2);
}

#[test]
fn load_failure_does_not_stop_the_batch() {
  let files = [
    pdf("one.pdf", "pages=1"),
    pdf("two.pdf", "broken"),
    pdf("three.PDF", "pages=2"),
  ];
  let (results, _) = run(&pipeline(), &files);
  let names: Vec<&str> = results.iter().map(|r| r.filename.as_str()).collect();
  assert_eq!(names, vec!["one.pdf", "two.pdf", "three.PDF"]);

  let broken = &results[1];
  assert!(broken.output.is_none());
  assert!(broken.preview_data_url.is_none());
  assert!(broken.error.as_deref().unwrap().contains("not a PDF"));

  assert!(results[0].output.is_some());
  assert_eq!(results[2].output_filename, "three_OCR.pdf");
  let doc = Document::load_mem(results[2].output.as_ref().unwrap()).unwrap();
  assert_eq!(doc.get_pages().len(), 2);
}

#[test]
fn empty_document_yields_empty_output() {
  let (results, _) = run(&pipeline(), &[pdf("empty.pdf", "pages=0")]);
  let result = &results[0];
  assert!(result.preview_data_url.is_none());
  let doc = Document::load_mem(result.output.as_ref().unwrap()).unwrap();
  assert!(doc.get_pages().is_empty());
}

#[test]
fn non_pdf_selection_is_rejected_before_any_work() {
  let seen = Rc::new(RefCell::new(Vec::new()));
  let recognizer = FakeRecognizer {
    seen: Rc::clone(&seen),
    ..FakeRecognizer::default()
  };
  let files = [
    pdf("a.pdf", "pages=1"),
    InputFile::new("shortcut.pdf.lnk", PDF, Vec::new()),
    InputFile::new("notes.txt", "text/plain", Vec::new()),
  ];
  let mut events = Vec::new();
  let err = pipeline_with(recognizer)
    .process_batch(&files, &mut |e: ProgressEvent| events.push(e))
    .unwrap_err();
  match err {
    ocrlayer::Error::Selection(SelectionError::NotPdf(names)) => {
      assert_eq!(names, vec!["shortcut.pdf.lnk", "notes.txt"])
    }
    other => panic!("unexpected error: {other}"),
  }
  assert!(events.is_empty());
  assert!(seen.borrow().is_empty());
}

#[test]
fn invalid_config_is_rejected() {
  let config = PipelineConfig {
    ocr_scale: 0.0,
    ..PipelineConfig::default()
  };
  let pipeline = Pipeline::new(
    config,
    Box::new(FakeRasterizer),
    Box::new(FakeRecognizer::default()),
    Box::new(LopdfAssembler),
  );
  let err = pipeline
    .process_batch(&[pdf("a.pdf", "pages=1")], &mut |_: ProgressEvent| {})
    .unwrap_err();
  assert!(matches!(err, ocrlayer::Error::Config(_)));
}

#[test]
fn progress_is_labelled_and_monotonic_per_file() {
  let (_, events) = run(
    &pipeline(),
    &[pdf("a.pdf", "pages=2"), pdf("b.pdf", "pages=1")],
  );

  assert_eq!(events[0].label, "Uploading files...");
  assert_eq!(events[0].percent, 0);
  assert_eq!(events[0].color(), "#4f8cff");

  let batch: Vec<(&str, u32)> = events
    .iter()
    .filter(|e| e.phase == ProgressPhase::Batch)
    .map(|e| (e.label.as_str(), e.percent))
    .collect();
  assert_eq!(
    batch,
    vec![
      ("Uploading files...", 0),
      ("Processing... (1/2)", 0),
      ("Processing... (1/2)", 50),
      ("Processing... (2/2)", 50),
      ("Processing... (2/2)", 100),
    ]
  );

  let recognition: Vec<&ProgressEvent> = events
    .iter()
    .filter(|e| e.phase == ProgressPhase::Recognition)
    .collect();
  assert!(recognition.iter().all(|e| e.color() == "#34d49c"));
  assert_eq!(recognition[0].label, "OCR (a.pdf): page 1/2");
  assert_eq!(recognition[0].percent, 0);
  assert!(
    recognition
      .iter()
      .any(|e| e.label == "OCR (a.pdf): page 2/2 (50%)" && e.percent == 75)
  );

  // within one file, percentages never go backwards
  let first_file: Vec<u32> = recognition
    .iter()
    .take_while(|e| !e.label.contains("b.pdf"))
    .map(|e| e.percent)
    .collect();
  assert!(first_file.windows(2).all(|w| w[0] <= w[1]));
  assert_eq!(
    first_file.last().copied(),
    Some(100),
    "save step reports completion"
  );
  let saves = recognition
    .iter()
    .filter(|e| e.label == "Saving corrected PDF...")
    .count();
  assert_eq!(saves, 2);
}

#[test]
fn file_job_walks_the_state_machine() {
  let pipeline = pipeline();
  let file = pdf("a.pdf", "pages=2");
  let mut job = FileJob::new(&pipeline, &file);
  let mut sink = |_: ProgressEvent| {};
  assert_eq!(job.state(), FileState::Idle);

  let mut states = Vec::new();
  while !job.state().is_terminal() {
    states.push(job.step(&mut sink));
  }
  assert_eq!(
    states,
    vec![
      FileState::Previewing,
      FileState::Recognizing { page: 1, total: 2 },
      FileState::Recognizing { page: 2, total: 2 },
      FileState::Assembling,
      FileState::Done,
    ]
  );
  // stepping a finished job is a no-op
  assert_eq!(job.step(&mut sink), FileState::Done);
  assert!(job.into_result().output.is_some());
}

#[test]
fn broken_file_ends_failed() {
  let pipeline = pipeline();
  let file = pdf("bad.pdf", "broken");
  let mut job = FileJob::new(&pipeline, &file);
  assert_eq!(job.step(&mut |_: ProgressEvent| {}), FileState::Failed);
}

/// Fails the first `failures` documents, then hands over to lopdf.
struct FlakyAssembler {
  failures: Cell<u32>,
}

impl DocumentAssembler for FlakyAssembler {
  fn assemble(&self, pages: &[PageResult]) -> Result<Vec<u8>, AssemblyError> {
    if self.failures.get() > 0 {
      self.failures.set(self.failures.get() - 1);
      return Err(AssemblyError::Encode("disk full".into()));
    }
    LopdfAssembler.assemble(pages)
  }
}

#[test]
fn assembly_failure_marks_the_file_and_moves_on() {
  let pipeline = Pipeline::new(
    PipelineConfig::default(),
    Box::new(FakeRasterizer),
    Box::new(FakeRecognizer::default()),
    Box::new(FlakyAssembler {
      failures: Cell::new(1),
    }),
  );
  let (results, events) = run(
    &pipeline,
    &[pdf("first.pdf", "pages=2"), pdf("second.pdf", "pages=1")],
  );
  assert_eq!(results.len(), 2);

  let failed = &results[0];
  assert!(failed.output.is_none());
  assert_eq!(failed.error.as_deref(), Some("failed to save PDF: disk full"));
  assert!(failed.preview_data_url.is_some());
  assert_eq!(failed.page_count, 2);

  let next = &results[1];
  assert!(next.error.is_none());
  let doc = Document::load_mem(next.output.as_ref().unwrap()).unwrap();
  assert_eq!(doc.get_pages().len(), 1);

  assert_eq!(events.last().map(|e| e.percent), Some(100));
}

#[test]
fn text_layer_carries_instruction_opacity() {
  let config = PipelineConfig {
    layer: ocrlayer::LayerStyle {
      opacity: 0.25,
      ..ocrlayer::LayerStyle::default()
    },
    ..PipelineConfig::default()
  };
  let pipeline = Pipeline::new(
    config,
    Box::new(FakeRasterizer),
    Box::new(FakeRecognizer::default()),
    Box::new(LopdfAssembler),
  );
  let (results, _) = run(&pipeline, &[pdf("a.pdf", "pages=1")]);
  let doc = Document::load_mem(results[0].output.as_ref().unwrap()).unwrap();
  let alphas: Vec<f32> = doc
    .objects
    .values()
    .filter_map(|o| o.as_dict().ok())
    .filter(|d| d.get(b"Type").and_then(|t| t.as_name()).ok() == Some(b"ExtGState".as_slice()))
    .map(|d| d.get(b"ca").unwrap().as_float().unwrap())
    .collect();
  assert_eq!(alphas.len(), 1);
  assert!((alphas[0] - 0.25).abs() < 1e-4);
}
