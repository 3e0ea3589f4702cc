//! In-process MuPDF rasterizer
//!
//! Renders pages with the `mupdf` crate on the blocking pool. MuPDF's
//! context is not thread-safe, so each call opens its own document.

use std::path::Path;

use async_trait::async_trait;
use image::{DynamicImage, RgbImage};
use mupdf::{Colorspace, Document, Matrix, Pixmap};

use super::types::{PageImage, RasterError, RasterOptions, Rasterizer};
use crate::tools::ToolError;

/// PDF user space is 72 points per inch
const POINTS_PER_INCH: f32 = 72.0;

#[derive(Debug, Default)]
pub struct MupdfRasterizer;

impl MupdfRasterizer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Rasterizer for MupdfRasterizer {
    fn name(&self) -> &'static str {
        "mupdf"
    }

    fn locate(&self) -> Result<(), ToolError> {
        // Linked into the binary
        Ok(())
    }

    async fn rasterize(
        &self,
        pdf: &Path,
        options: &RasterOptions,
    ) -> Result<Vec<PageImage>, RasterError> {
        let path = pdf.to_string_lossy().to_string();
        let options = options.clone();

        tokio::task::spawn_blocking(move || render_document(&path, &options))
            .await
            .map_err(|e| RasterError::Join(e.to_string()))?
    }
}

fn render_document(path: &str, options: &RasterOptions) -> Result<Vec<PageImage>, RasterError> {
    let doc = Document::open(path).map_err(render_err)?;
    let page_count = doc.page_count().map_err(render_err)?.max(0) as usize;

    let Some((first, last)) = options.pages.resolve(page_count) else {
        return Ok(Vec::new());
    };

    let scale = options.dpi as f32 / POINTS_PER_INCH;
    let matrix = Matrix::new_scale(scale, scale);
    let colorspace = Colorspace::device_rgb();

    (first..=last)
        .map(|page_number| {
            let page = doc.load_page((page_number - 1) as i32).map_err(render_err)?;
            let pixmap = page
                .to_pixmap(&matrix, &colorspace, false, true)
                .map_err(render_err)?;
            let image = pixmap_to_image(&pixmap, page_number)?;
            Ok(PageImage { page_number, image })
        })
        .collect()
}

fn pixmap_to_image(pixmap: &Pixmap, page_number: usize) -> Result<DynamicImage, RasterError> {
    let width = pixmap.width() as u32;
    let height = pixmap.height() as u32;
    let samples = pixmap.samples();
    let n = pixmap.n() as usize;

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for offset in (0..(width as usize * height as usize)).map(|i| i * n) {
        let r = samples.get(offset).copied().unwrap_or(0);
        let g = samples.get(offset + 1).copied().unwrap_or(r);
        let b = samples.get(offset + 2).copied().unwrap_or(r);
        rgb.extend_from_slice(&[r, g, b]);
    }

    RgbImage::from_raw(width, height, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| RasterError::Decode {
            page: page_number,
            message: "pixmap buffer does not match its dimensions".to_string(),
        })
}

fn render_err(e: mupdf::Error) -> RasterError {
    RasterError::Render(e.to_string())
}
