//! OCR Module
//!
//! Recognizes the text on rasterized PDF pages.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use wikiocr_server::ocr::{TesseractRecognizer, TextRecognizer};
//! use wikiocr_server::tools::ToolLocator;
//!
//! let locator = ToolLocator::tesseract(None);
//! let binary = locator.locate().ok();
//! let recognizer = TesseractRecognizer::new(locator, binary, 3);
//!
//! let text = recognizer.recognize(page_image, "eng").await?;
//! ```

mod provider;
mod types;

pub use provider::{TesseractRecognizer, TextRecognizer};
pub use types::{OcrError, OcrProvider};
