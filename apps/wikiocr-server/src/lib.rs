//! WikiOCR Server
//!
//! Accepts PDF uploads over HTTP, renders each page to an image and returns
//! the text Tesseract recognizes on it.
//!
//! # Modules
//!
//! - `pdf`: Page rasterization (Poppler's `pdftoppm`, optionally MuPDF)
//! - `ocr`: Text recognition backends
//! - `process`: Upload staging and the per-request pipeline
//! - `routes`: HTTP surface

pub mod config;
pub mod error;
pub mod ocr;
pub mod pdf;
pub mod process;
pub mod routes;
pub mod state;
pub mod tools;

#[cfg(test)]
mod testing;
