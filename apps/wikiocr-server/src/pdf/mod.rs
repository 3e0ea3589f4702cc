//! PDF rasterization module
//!
//! Turns a staged PDF into ordered page images for OCR.
//!
//! Backends:
//! - Poppler `pdftoppm` (external binary, default)
//! - MuPDF (in-process, `mupdf` feature)

#[cfg(feature = "mupdf")]
mod mupdf_render;
mod poppler;
mod types;

#[cfg(feature = "mupdf")]
pub use mupdf_render::MupdfRasterizer;
pub use poppler::PopplerRasterizer;
pub use types::{PageImage, PageRange, RasterError, RasterOptions, Rasterizer};
