//! Upload processing types

use axum::body::Bytes;
use serde::{Deserialize, Serialize};

use crate::ocr::OcrError;
use crate::pdf::{PageRange, RasterError};
use crate::tools::ToolError;

pub const MIN_DPI: u32 = 36;
pub const MAX_DPI: u32 = 1200;

/// One uploaded PDF and how to process it
#[derive(Debug, Clone)]
pub struct Upload {
    /// Client-supplied file name (logging only)
    pub filename: String,
    pub data: Bytes,
    pub options: RequestOptions,
}

impl Upload {
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
            options: RequestOptions::default(),
        }
    }

    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }
}

/// Per-request overrides of the configured OCR defaults
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestOptions {
    pub dpi: Option<u32>,
    pub first_page: Option<usize>,
    pub last_page: Option<usize>,
    pub language: Option<String>,
}

impl RequestOptions {
    pub fn page_range(&self) -> PageRange {
        PageRange {
            first: self.first_page,
            last: self.last_page,
        }
    }

    pub fn validate(&self) -> Result<(), OptionsError> {
        if let Some(dpi) = self.dpi {
            if !(MIN_DPI..=MAX_DPI).contains(&dpi) {
                return Err(OptionsError::DpiOutOfRange(dpi));
            }
        }
        if self.first_page == Some(0) || self.last_page == Some(0) {
            return Err(OptionsError::ZeroPage);
        }
        if let (Some(first), Some(last)) = (self.first_page, self.last_page) {
            if first > last {
                return Err(OptionsError::InvertedRange { first, last });
            }
        }
        if let Some(language) = &self.language {
            let valid = !language.is_empty()
                && language
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '+');
            if !valid {
                return Err(OptionsError::InvalidLanguage(language.clone()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OptionsError {
    #[error("dpi must be between 36 and 1200, got {0}")]
    DpiOutOfRange(u32),

    #[error("Page numbers start at 1")]
    ZeroPage,

    #[error("first_page ({first}) is after last_page ({last})")]
    InvertedRange { first: usize, last: usize },

    #[error("Invalid OCR language '{0}'")]
    InvalidLanguage(String),
}

/// Recognized text of one page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageResult {
    /// Page number (1-indexed)
    pub page_number: usize,
    pub text: String,
}

/// Success envelope returned for a processed upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedDocument {
    pub status: String,
    pub message: String,
    pub pages: Vec<PageResult>,
}

impl ProcessedDocument {
    pub fn success(pages: Vec<PageResult>) -> Self {
        Self {
            status: "success".to_string(),
            message: "PDF processed successfully".to_string(),
            pages,
        }
    }
}

/// Request-level processing failure
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Failed to stage upload: {0}")]
    Staging(#[source] std::io::Error),

    #[error(transparent)]
    Configuration(#[from] ToolError),

    #[error("Failed to convert PDF to images. Make sure Poppler is installed correctly. Error: {0}")]
    Conversion(#[source] RasterError),

    #[error("OCR failed on page {page}: {source}")]
    Recognition {
        page: usize,
        #[source]
        source: OcrError,
    },

    #[error("{stage} timed out after {secs} seconds")]
    Timeout { stage: &'static str, secs: u64 },

    #[error("{0}")]
    Unexpected(String),
}
