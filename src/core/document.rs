use crate::core::error::AssemblyError;
use crate::core::font::{BASE_FONT, FONT_RESOURCE, encode_win_ansi};
use crate::core::model::{PageResult, TextDrawInstruction};
use crate::core::text::break_lines;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

const IMAGE_RESOURCE: &str = "Im0";

/// Builds the output PDF from the pages that made it through OCR.
pub trait DocumentAssembler {
  fn assemble(&self, pages: &[PageResult]) -> Result<Vec<u8>, AssemblyError>;
}

/// lopdf-backed assembler. Every page is its raster image at 1 pt per pixel
/// with the text layer drawn on top in near-invisible white Helvetica.
#[derive(Debug, Clone, Default)]
pub struct LopdfAssembler;

/// Distinct text opacities of a document, in order of first use. Entry `i`
/// becomes the graphics state resource `GS<i>`.
#[derive(Debug, Default)]
pub(crate) struct OpacityStates {
  values: Vec<f32>,
}

impl OpacityStates {
  pub(crate) fn collect(pages: &[PageResult]) -> Self {
    let mut states = OpacityStates::default();
    for ins in pages.iter().flat_map(|p| &p.instructions) {
      if states.index_of(ins.opacity).is_none() {
        states.values.push(ins.opacity);
      }
    }
    states
  }

  fn index_of(&self, opacity: f32) -> Option<usize> {
    self
      .values
      .iter()
      .position(|v| v.to_bits() == opacity.to_bits())
  }

  pub(crate) fn resource_name(&self, opacity: f32) -> String {
    format!("GS{}", self.index_of(opacity).unwrap_or(0))
  }
}

impl DocumentAssembler for LopdfAssembler {
  fn assemble(&self, pages: &[PageResult]) -> Result<Vec<u8>, AssemblyError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    // One font and one graphics state per opacity for the whole document.
    let font_id = doc.add_object(dictionary! {
      "Type" => "Font",
      "Subtype" => "Type1",
      "BaseFont" => BASE_FONT,
      "Encoding" => "WinAnsiEncoding",
    });
    let states = OpacityStates::collect(pages);
    let mut gstates = Dictionary::new();
    for (idx, opacity) in states.values.iter().enumerate() {
      let gs_id = doc.add_object(dictionary! {
        "Type" => "ExtGState",
        "ca" => *opacity,
        "CA" => *opacity,
      });
      gstates.set(format!("GS{idx}"), gs_id);
    }

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for page in pages {
      let page_id = add_page(&mut doc, pages_id, font_id, &gstates, &states, page)?;
      kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
      pages_id,
      Object::Dictionary(dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count,
      }),
    );
    let catalog_id = doc.add_object(dictionary! {
      "Type" => "Catalog",
      "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut out = Vec::new();
    doc
      .save_to(&mut out)
      .map_err(|e| AssemblyError::Encode(e.to_string()))?;
    log::debug!("[Assemble] {} pages, {} bytes", page_count, out.len());
    Ok(out)
  }
}

fn add_page(
  doc: &mut Document,
  pages_id: ObjectId,
  font_id: ObjectId,
  gstates: &Dictionary,
  states: &OpacityStates,
  page: &PageResult,
) -> Result<ObjectId, AssemblyError> {
  let image = &page.image;
  let width = image.width as f32;
  let height = image.height as f32;

  // Already deflated; keep lopdf from compressing it again.
  let image_stream = Stream::new(
    dictionary! {
      "Type" => "XObject",
      "Subtype" => "Image",
      "Width" => image.width as i64,
      "Height" => image.height as i64,
      "ColorSpace" => "DeviceRGB",
      "BitsPerComponent" => 8,
      "Filter" => "FlateDecode",
    },
    image.data.clone(),
  )
  .with_compression(false);
  let image_id = doc.add_object(image_stream);

  let content = page_content(width, height, &page.instructions, states);
  let content_bytes = content
    .encode()
    .map_err(|e| AssemblyError::Content(e.to_string()))?;
  let content_id = doc.add_object(Stream::new(dictionary! {}, content_bytes));

  let page_id = doc.add_object(dictionary! {
    "Type" => "Page",
    "Parent" => pages_id,
    "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
    "Contents" => content_id,
    "Resources" => dictionary! {
      "Font" => dictionary! { FONT_RESOURCE => font_id },
      "XObject" => dictionary! { IMAGE_RESOURCE => image_id },
      "ExtGState" => gstates.clone(),
    },
  });
  Ok(page_id)
}

/// Full-page image, then one text object per instruction.
pub(crate) fn page_content(
  width: f32,
  height: f32,
  instructions: &[TextDrawInstruction],
  states: &OpacityStates,
) -> Content {
  let mut ops = vec![
    Operation::new("q", vec![]),
    Operation::new(
      "cm",
      vec![
        width.into(),
        0.into(),
        0.into(),
        height.into(),
        0.into(),
        0.into(),
      ],
    ),
    Operation::new("Do", vec![Object::Name(IMAGE_RESOURCE.as_bytes().to_vec())]),
    Operation::new("Q", vec![]),
  ];
  for ins in instructions {
    push_text_ops(&mut ops, ins, &states.resource_name(ins.opacity));
  }
  Content { operations: ops }
}

fn push_text_ops(ops: &mut Vec<Operation>, ins: &TextDrawInstruction, gstate: &str) {
  let lines = break_lines(&ins.text, ins.font_size, ins.max_width);
  ops.push(Operation::new("q", vec![]));
  ops.push(Operation::new(
    "gs",
    vec![Object::Name(gstate.as_bytes().to_vec())],
  ));
  ops.push(Operation::new("BT", vec![]));
  ops.push(Operation::new("rg", vec![1.into(), 1.into(), 1.into()]));
  ops.push(Operation::new(
    "Tf",
    vec![
      Object::Name(FONT_RESOURCE.as_bytes().to_vec()),
      ins.font_size.into(),
    ],
  ));
  ops.push(Operation::new("TL", vec![ins.line_height.into()]));
  ops.push(Operation::new(
    "Tm",
    vec![
      1.into(),
      0.into(),
      0.into(),
      1.into(),
      ins.x.into(),
      ins.y.into(),
    ],
  ));
  for line in lines {
    ops.push(Operation::new(
      "Tj",
      vec![Object::string_literal(encode_win_ansi(&line))],
    ));
    ops.push(Operation::new("T*", vec![]));
  }
  ops.push(Operation::new("ET", vec![]));
  ops.push(Operation::new("Q", vec![]));
}
