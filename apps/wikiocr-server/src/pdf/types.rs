//! Rasterization types
//!
//! Page images, render options and the rasterizer error type.

use std::path::Path;

use async_trait::async_trait;
use image::DynamicImage;

use crate::tools::ToolError;

/// One decoded PDF page, ready for recognition
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Page number (1-indexed)
    pub page_number: usize,
    pub image: DynamicImage,
}

/// Inclusive, 1-indexed page range. Unset bounds mean "first"/"last" page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageRange {
    pub first: Option<usize>,
    pub last: Option<usize>,
}

impl PageRange {
    pub fn all() -> Self {
        Self::default()
    }

    /// Clamp the range to a document with `page_count` pages.
    ///
    /// Returns `None` when no page falls inside the range.
    pub fn resolve(&self, page_count: usize) -> Option<(usize, usize)> {
        let first = self.first.unwrap_or(1).max(1);
        let last = self.last.unwrap_or(page_count).min(page_count);
        (first <= last).then_some((first, last))
    }
}

/// Options for one rasterization call
#[derive(Debug, Clone)]
pub struct RasterOptions {
    /// Render resolution in dots per inch
    pub dpi: u32,
    pub pages: PageRange,
}

impl Default for RasterOptions {
    fn default() -> Self {
        Self {
            dpi: 200,
            pages: PageRange::all(),
        }
    }
}

/// Rasterization errors
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error(transparent)]
    ToolUnavailable(#[from] ToolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{tool} exited with {status}: {stderr}")]
    CommandFailed {
        tool: &'static str,
        status: String,
        stderr: String,
    },

    #[error("Failed to decode page {page}: {message}")]
    Decode { page: usize, message: String },

    #[error("Render error: {0}")]
    Render(String),

    #[error("Task join error: {0}")]
    Join(String),
}

/// PDF-to-image capability
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    /// Confirm the backend can run on this host
    fn locate(&self) -> Result<(), ToolError>;

    /// Render the PDF at `pdf` into page images, in page order
    async fn rasterize(
        &self,
        pdf: &Path,
        options: &RasterOptions,
    ) -> Result<Vec<PageImage>, RasterError>;
}
