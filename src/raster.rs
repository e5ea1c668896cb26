//! Turning a source document into page rasters.

use std::path::Path;

use image::{DynamicImage, ImageReader};
use pdfium_render::prelude::*;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// PDF points per inch
const POINTS_PER_INCH: f32 = 72.0;

/// One rasterized page, numbered from 1
pub struct Page {
    pub number: u32,
    pub image: DynamicImage,
}

/// Produces the pages of a document in order
pub trait Rasterizer {
    /// Render every page and hand it to `visit` as soon as it is ready.
    /// Returns the number of pages. A document without pages is an error.
    fn rasterize(&self, path: &Path, visit: &mut dyn FnMut(Page) -> Result<()>) -> Result<u32>;
}

fn source_error(path: &Path, reason: impl ToString) -> Error {
    Error::SourceRead {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Renders PDF pages with pdfium
pub struct PdfRasterizer {
    pdfium: Pdfium,
    dpi: f32,
}

impl PdfRasterizer {
    /// Bind pdfium from the working directory, falling back to the system library
    pub fn new(dpi: f32) -> std::result::Result<Self, PdfiumError> {
        let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())?;
        Ok(Self {
            pdfium: Pdfium::new(bindings),
            dpi,
        })
    }
}

impl Rasterizer for PdfRasterizer {
    fn rasterize(&self, path: &Path, visit: &mut dyn FnMut(Page) -> Result<()>) -> Result<u32> {
        let document = self
            .pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| source_error(path, format!("failed to load PDF: {e}")))?;

        let page_count = document.pages().len() as u32;
        if page_count == 0 {
            return Err(source_error(path, "document has no pages"));
        }
        info!("Rasterizing {} pages at {} dpi", page_count, self.dpi);

        let scale = self.dpi / POINTS_PER_INCH;
        for (i, page) in document.pages().iter().enumerate() {
            let number = (i + 1) as u32;
            let render_config = PdfRenderConfig::new()
                .set_target_width((page.width().value * scale) as i32)
                .set_target_height((page.height().value * scale) as i32)
                .render_form_data(true)
                .render_annotations(true);

            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| source_error(path, format!("failed to render page {number}: {e}")))?;
            let image = bitmap.as_image();
            debug!(page = number, width = image.width(), height = image.height(), "Page rendered");

            visit(Page { number, image })?;
        }

        Ok(page_count)
    }
}

/// Treats a raster image file as a one-page document
pub struct ImageFileRasterizer;

impl Rasterizer for ImageFileRasterizer {
    fn rasterize(&self, path: &Path, visit: &mut dyn FnMut(Page) -> Result<()>) -> Result<u32> {
        let image = ImageReader::open(path)
            .map_err(|e| source_error(path, e))?
            .with_guessed_format()
            .map_err(|e| source_error(path, e))?
            .decode()
            .map_err(|e| source_error(path, format!("failed to decode image: {e}")))?;

        if image.width() == 0 || image.height() == 0 {
            return Err(source_error(path, "image is empty"));
        }
        debug!(width = image.width(), height = image.height(), "Image loaded");

        visit(Page { number: 1, image })?;
        Ok(1)
    }
}

/// Pick a rasterizer from the file extension: pdfium for `.pdf`, the image
/// decoder for everything else
pub fn rasterizer_for(path: &Path, dpi: f32) -> Result<Box<dyn Rasterizer>> {
    if !path.is_file() {
        return Err(source_error(path, "no such file"));
    }
    let is_pdf = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

    if is_pdf {
        let rasterizer = PdfRasterizer::new(dpi)
            .map_err(|e| source_error(path, format!("failed to bind pdfium library: {e}")))?;
        Ok(Box::new(rasterizer))
    } else {
        Ok(Box::new(ImageFileRasterizer))
    }
}

/// Render all pages into memory
pub fn rasterize_all(rasterizer: &dyn Rasterizer, path: &Path) -> Result<Vec<Page>> {
    let mut pages = Vec::new();
    rasterizer.rasterize(path, &mut |page| {
        pages.push(page);
        Ok(())
    })?;
    Ok(pages)
}
