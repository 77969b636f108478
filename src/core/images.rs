use crate::core::error::{AssemblyError, RenderError};
use crate::core::model::{EmbeddedImage, RasterPage};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::write::ZlibEncoder;
use image::{DynamicImage, ImageFormat, RgbImage};
use std::io::{Cursor, Write};

/// Opens input documents for rendering.
pub trait Rasterizer {
  fn open<'a>(&'a self, data: &'a [u8]) -> Result<Box<dyn PageSource + 'a>, RenderError>;
}

/// A loaded document that can render its pages.
pub trait PageSource {
  fn page_count(&self) -> u32;

  /// Render 1-based `page` at `scale` (1.0 = one pixel per PDF point).
  fn render(&self, page: u32, scale: f32) -> Result<RasterPage, RenderError>;
}

/// Pages are 1-based.
pub fn check_page_range(page: u32, page_count: u32) -> Result<(), RenderError> {
  if page == 0 || page > page_count {
    return Err(RenderError::PageOutOfRange { page, page_count });
  }
  Ok(())
}

/// Drop the alpha channel by compositing over white, the colour a blank
/// sheet renders as.
pub fn flatten_on_white(img: DynamicImage) -> RgbImage {
  match img {
    DynamicImage::ImageRgb8(rgb) => rgb,
    other => {
      let rgba = other.to_rgba8();
      let (width, height) = rgba.dimensions();
      let mut rgb = Vec::with_capacity(rgb_len(width, height));
      for px in rgba.pixels() {
        let alpha = px[3] as u32;
        for c in 0..3 {
          let v = (px[c] as u32 * alpha + 255 * (255 - alpha) + 127) / 255;
          rgb.push(v as u8);
        }
      }
      RgbImage::from_raw(width, height, rgb).unwrap_or_else(|| RgbImage::new(width, height))
    }
  }
}

/// Byte length of an 8-bit RGB buffer, computed without `u32` overflow.
fn rgb_len(width: u32, height: u32) -> usize {
  width as usize * height as usize * 3
}

pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>, image::ImageError> {
  let mut png_buf = Cursor::new(Vec::new());
  img.write_to(&mut png_buf, ImageFormat::Png)?;
  Ok(png_buf.into_inner())
}

/// `data:image/png;base64,…` for the thumbnail shown next to each result.
pub fn preview_data_url(raster: &RasterPage) -> Result<String, image::ImageError> {
  let png = encode_png(&raster.image)?;
  Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

/// Pack a raster for embedding and release its pixel buffer.
pub fn embed_raster(raster: RasterPage) -> Result<EmbeddedImage, AssemblyError> {
  let width = raster.width();
  let height = raster.height();
  let raw = raster.image.into_raw();
  let mut encoder = ZlibEncoder::new(Vec::with_capacity(raw.len() / 4), Compression::default());
  encoder
    .write_all(&raw)
    .map_err(|e| AssemblyError::Image(e.to_string()))?;
  let data = encoder
    .finish()
    .map_err(|e| AssemblyError::Image(e.to_string()))?;
  Ok(EmbeddedImage {
    width,
    height,
    data,
  })
}

#[cfg(feature = "render")]
pub use pdfium::PdfiumRasterizer;

#[cfg(feature = "render")]
mod pdfium {
  use super::{PageSource, Rasterizer, check_page_range, flatten_on_white};
  use crate::core::error::RenderError;
  use crate::core::model::RasterPage;
  use pdfium_render::prelude::*;
  use std::path::{Path, PathBuf};

  pub struct PdfiumRasterizer {
    pdfium: Pdfium,
  }

  impl PdfiumRasterizer {
    /// Bind pdfium from `library_dir` if given, then the working directory,
    /// then the system library path.
    pub fn bind(library_dir: Option<&Path>) -> Result<Self, RenderError> {
      let mut search_paths: Vec<PathBuf> = Vec::new();
      if let Some(dir) = library_dir {
        search_paths.push(dir.to_path_buf());
      }
      search_paths.push(PathBuf::from("./"));

      for path in &search_paths {
        let lib_path = Pdfium::pdfium_platform_library_name_at_path(path);
        log::debug!("[Raster] trying pdfium at {:?}", lib_path);
        if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
          log::info!("[Raster] loaded pdfium from {:?}", path);
          return Ok(PdfiumRasterizer {
            pdfium: Pdfium::new(bindings),
          });
        }
      }

      Pdfium::bind_to_system_library()
        .map(|bindings| PdfiumRasterizer {
          pdfium: Pdfium::new(bindings),
        })
        .map_err(|e| RenderError::Bind(e.to_string()))
    }
  }

  impl Rasterizer for PdfiumRasterizer {
    fn open<'a>(&'a self, data: &'a [u8]) -> Result<Box<dyn PageSource + 'a>, RenderError> {
      let document = self
        .pdfium
        .load_pdf_from_byte_slice(data, None)
        .map_err(|e| RenderError::Load(e.to_string()))?;
      Ok(Box::new(PdfiumSource { document }))
    }
  }

  struct PdfiumSource<'a> {
    document: PdfDocument<'a>,
  }

  impl PageSource for PdfiumSource<'_> {
    fn page_count(&self) -> u32 {
      self.document.pages().len() as u32
    }

    fn render(&self, page: u32, scale: f32) -> Result<RasterPage, RenderError> {
      check_page_range(page, self.page_count())?;
      let render_err = |e: PdfiumError| RenderError::Render {
        page,
        reason: e.to_string(),
      };
      let pdf_page = self
        .document
        .pages()
        .get((page - 1) as u16)
        .map_err(render_err)?;
      let config = PdfRenderConfig::new().scale_page_by_factor(scale);
      let bitmap = pdf_page.render_with_config(&config).map_err(render_err)?;
      let image = flatten_on_white(bitmap.as_image());
      log::debug!(
        "[Raster] page {} at {}x -> {}x{} px",
        page,
        scale,
        image.width(),
        image.height()
      );
      Ok(RasterPage::new(page, image))
    }
  }
}
