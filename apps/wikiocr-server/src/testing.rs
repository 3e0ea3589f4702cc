//! Test doubles for the rasterizer and recognizer.
//!
//! A fake PDF is `%PDF-FAKE` followed by one line of text per page. The
//! fake rasterizer stores each page's text in the pixels of a one-row
//! grayscale image and the fake recognizer reads it back, so results only
//! depend on the bytes that were uploaded.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use image::{DynamicImage, GrayImage};

use crate::ocr::{OcrError, OcrProvider, TextRecognizer};
use crate::pdf::{PageImage, RasterError, RasterOptions, Rasterizer};
use crate::process::PdfProcessor;
use crate::tools::ToolError;

const MAGIC: &str = "%PDF-FAKE";

/// Build a fake PDF with one page per entry
pub fn fake_pdf(pages: &[&str]) -> Vec<u8> {
    let mut body = String::from(MAGIC);
    for page in pages {
        body.push('\n');
        body.push_str(page);
    }
    body.into_bytes()
}

#[derive(Default)]
pub struct FakeRasterizer {
    pub unavailable: bool,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
    /// Staged paths seen, with whether the file existed at the time
    pub seen: Mutex<Vec<(PathBuf, bool)>>,
}

#[async_trait]
impl Rasterizer for FakeRasterizer {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn locate(&self) -> Result<(), ToolError> {
        if self.unavailable {
            Err(ToolError::NotFound {
                tool: "pdftoppm",
                package: "Poppler",
            })
        } else {
            Ok(())
        }
    }

    async fn rasterize(
        &self,
        pdf: &Path,
        options: &RasterOptions,
    ) -> Result<Vec<PageImage>, RasterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((pdf.to_path_buf(), pdf.exists()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let body = std::fs::read_to_string(pdf).unwrap_or_default();
        let mut lines = body.split('\n');
        if lines.next() != Some(MAGIC) {
            return Err(RasterError::CommandFailed {
                tool: "pdftoppm",
                status: "exit status: 1".to_string(),
                stderr: "Syntax Error: Couldn't find trailer dictionary".to_string(),
            });
        }

        let texts: Vec<&str> = lines.collect();
        let Some((first, last)) = options.pages.resolve(texts.len()) else {
            return Ok(Vec::new());
        };

        Ok((first..=last)
            .map(|page_number| PageImage {
                page_number,
                image: text_image(texts[page_number - 1]),
            })
            .collect())
    }
}

#[derive(Default)]
pub struct FakeRecognizer {
    /// Page text that makes recognition fail
    pub fail_on: Option<String>,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
    pub languages: Mutex<Vec<String>>,
}

#[async_trait]
impl TextRecognizer for FakeRecognizer {
    fn provider_type(&self) -> OcrProvider {
        OcrProvider::Tesseract
    }

    async fn is_available(&self) -> bool {
        true
    }

    async fn recognize(&self, page: PageImage, language: &str) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.languages.lock().unwrap().push(language.to_string());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let text = image_text(&page.image);
        if self.fail_on.as_deref() == Some(text.as_str()) {
            return Err(OcrError::ProcessingError(format!(
                "Tesseract failed on '{}'",
                text
            )));
        }
        Ok(text)
    }
}

fn text_image(text: &str) -> DynamicImage {
    let mut bytes = text.as_bytes().to_vec();
    if bytes.is_empty() {
        bytes.push(0);
    }
    let width = bytes.len() as u32;
    let buffer = GrayImage::from_raw(width, 1, bytes).expect("one row of pixels");
    DynamicImage::ImageLuma8(buffer)
}

fn image_text(image: &DynamicImage) -> String {
    let bytes: Vec<u8> = image
        .to_luma8()
        .into_raw()
        .into_iter()
        .filter(|b| *b != 0)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// A processor wired to fresh fakes, staging into `staging_dir`
pub fn fake_processor(
    staging_dir: &Path,
) -> (PdfProcessor, Arc<FakeRasterizer>, Arc<FakeRecognizer>) {
    processor_with(staging_dir, FakeRasterizer::default(), FakeRecognizer::default())
}

pub fn processor_with(
    staging_dir: &Path,
    rasterizer: FakeRasterizer,
    recognizer: FakeRecognizer,
) -> (PdfProcessor, Arc<FakeRasterizer>, Arc<FakeRecognizer>) {
    let rasterizer = Arc::new(rasterizer);
    let recognizer = Arc::new(recognizer);
    let processor = PdfProcessor::new(rasterizer.clone(), recognizer.clone())
        .with_staging_dir(staging_dir.to_path_buf());
    (processor, rasterizer, recognizer)
}

/// Files left in a directory
pub fn leftover_files(dir: &Path) -> Vec<PathBuf> {
    std::fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
        .unwrap_or_default()
}
