//! Upload processing
//!
//! The upload-convert-recognize handler. One call to
//! [`PdfProcessor::process`] runs these steps in order:
//!
//! 1. stage the upload to a unique `.pdf` temp file
//! 2. confirm the rasterizer can run on this host
//! 3. rasterize the staged file into page images
//! 4. recognize each page, in page order
//! 5. delete the staged file (on every exit path)
//! 6. return the ordered page texts
//!
//! There is no partial success: any failing page fails the whole request.

mod staging;
mod types;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::ocr::TextRecognizer;
use crate::pdf::{RasterOptions, Rasterizer};

pub use staging::StagedPdf;
pub use types::{
    OptionsError, PageResult, ProcessError, ProcessedDocument, RequestOptions, Upload, MAX_DPI,
    MIN_DPI,
};

/// Converts uploaded PDFs into per-page text
pub struct PdfProcessor {
    rasterizer: Arc<dyn Rasterizer>,
    recognizer: Arc<dyn TextRecognizer>,
    staging_dir: PathBuf,
    default_dpi: u32,
    default_language: String,
    /// Deadline for rasterization and for each page's recognition
    timeout: Option<Duration>,
}

impl PdfProcessor {
    pub fn new(rasterizer: Arc<dyn Rasterizer>, recognizer: Arc<dyn TextRecognizer>) -> Self {
        Self {
            rasterizer,
            recognizer,
            staging_dir: std::env::temp_dir(),
            default_dpi: 200,
            default_language: "eng".to_string(),
            timeout: None,
        }
    }

    pub fn with_staging_dir(mut self, dir: PathBuf) -> Self {
        self.staging_dir = dir;
        self
    }

    pub fn with_defaults(mut self, dpi: u32, language: impl Into<String>) -> Self {
        self.default_dpi = dpi;
        self.default_language = language.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn rasterizer(&self) -> &dyn Rasterizer {
        self.rasterizer.as_ref()
    }

    pub fn recognizer(&self) -> &dyn TextRecognizer {
        self.recognizer.as_ref()
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    /// Process one upload end to end
    pub async fn process(&self, upload: Upload) -> Result<ProcessedDocument, ProcessError> {
        let Upload {
            filename,
            data,
            options,
        } = upload;
        let started = Instant::now();

        tracing::info!(filename = %filename, bytes = data.len(), "Processing PDF upload");

        let staged = StagedPdf::stage(&self.staging_dir, data)
            .await
            .map_err(ProcessError::Staging)?;

        let outcome = self.convert_and_recognize(staged.path(), &options).await;

        if let Err(e) = staged.release() {
            tracing::warn!("Failed to remove staged upload: {}", e);
        }

        let pages = match outcome {
            Ok(pages) => pages,
            Err(e) => {
                tracing::warn!(filename = %filename, "PDF processing failed: {}", e);
                return Err(e);
            }
        };

        tracing::info!(
            filename = %filename,
            pages = pages.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "PDF processed"
        );

        Ok(ProcessedDocument::success(pages))
    }

    async fn convert_and_recognize(
        &self,
        pdf: &Path,
        options: &RequestOptions,
    ) -> Result<Vec<PageResult>, ProcessError> {
        self.rasterizer.locate()?;

        let raster_options = RasterOptions {
            dpi: options.dpi.unwrap_or(self.default_dpi),
            pages: options.page_range(),
        };

        let images = self
            .bounded("rasterization", async {
                self.rasterizer
                    .rasterize(pdf, &raster_options)
                    .await
                    .map_err(ProcessError::Conversion)
            })
            .await?;

        tracing::debug!(
            backend = self.rasterizer.name(),
            pages = images.len(),
            "Rasterized PDF"
        );

        let language = options
            .language
            .as_deref()
            .unwrap_or(&self.default_language);

        let mut pages = Vec::with_capacity(images.len());
        for image in images {
            let page_number = image.page_number;
            let text = self
                .bounded("recognition", async {
                    self.recognizer
                        .recognize(image, language)
                        .await
                        .map_err(|source| ProcessError::Recognition {
                            page: page_number,
                            source,
                        })
                })
                .await?;

            tracing::debug!(page = page_number, chars = text.len(), "Recognized page");
            pages.push(PageResult { page_number, text });
        }

        Ok(pages)
    }

    async fn bounded<T, F>(&self, stage: &'static str, fut: F) -> Result<T, ProcessError>
    where
        F: Future<Output = Result<T, ProcessError>>,
    {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| ProcessError::Timeout {
                    stage,
                    secs: limit.as_secs(),
                })?,
            None => fut.await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::OcrError;
    use crate::pdf::RasterError;
    use crate::testing::{
        fake_pdf, fake_processor, leftover_files, processor_with, FakeRasterizer, FakeRecognizer,
    };
    use std::sync::atomic::Ordering;
    use tempfile::TempDir;

    fn texts(doc: &ProcessedDocument) -> Vec<&str> {
        doc.pages.iter().map(|p| p.text.as_str()).collect()
    }

    #[tokio::test]
    async fn test_pages_are_numbered_in_order() {
        let staging = TempDir::new().unwrap();
        let (processor, _, _) = fake_processor(staging.path());

        let doc = processor
            .process(Upload::new("three.pdf", fake_pdf(&["alpha", "beta", "gamma"])))
            .await
            .unwrap();

        assert_eq!(doc.status, "success");
        assert_eq!(doc.message, "PDF processed successfully");
        let numbers: Vec<usize> = doc.pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert_eq!(texts(&doc), vec!["alpha", "beta", "gamma"]);
    }

    #[tokio::test]
    async fn test_zero_page_pdf_is_empty_success() {
        let staging = TempDir::new().unwrap();
        let (processor, _, recognizer) = fake_processor(staging.path());

        let doc = processor
            .process(Upload::new("empty.pdf", fake_pdf(&[])))
            .await
            .unwrap();

        assert_eq!(doc.status, "success");
        assert!(doc.pages.is_empty());
        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_corrupt_pdf_fails_without_recognition() {
        let staging = TempDir::new().unwrap();
        let (processor, _, recognizer) = fake_processor(staging.path());

        let err = processor
            .process(Upload::new("notes.txt", b"just some text".to_vec()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProcessError::Conversion(RasterError::CommandFailed { .. })
        ));
        assert!(err.to_string().contains("Couldn't find trailer dictionary"));
        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_identical_input_gives_identical_output() {
        let staging = TempDir::new().unwrap();
        let (processor, _, _) = fake_processor(staging.path());
        let pdf = fake_pdf(&["same", "every", "time"]);

        let first = processor.process(Upload::new("a.pdf", pdf.clone())).await.unwrap();
        let second = processor.process(Upload::new("a.pdf", pdf)).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_staged_file_removed_after_success() {
        let staging = TempDir::new().unwrap();
        let (processor, rasterizer, _) = fake_processor(staging.path());

        processor
            .process(Upload::new("ok.pdf", fake_pdf(&["one"])))
            .await
            .unwrap();

        let seen = rasterizer.seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        let (path, existed) = &seen[0];
        assert!(existed, "staged file should exist while rasterizing");
        assert_eq!(path.extension().unwrap(), "pdf");
        assert!(!path.exists());
        assert!(leftover_files(staging.path()).is_empty());
    }

    #[tokio::test]
    async fn test_staged_file_removed_after_conversion_failure() {
        let staging = TempDir::new().unwrap();
        let (processor, _, _) = fake_processor(staging.path());

        let result = processor
            .process(Upload::new("bad.pdf", b"%PDF-broken".to_vec()))
            .await;

        assert!(result.is_err());
        assert!(leftover_files(staging.path()).is_empty());
    }

    #[tokio::test]
    async fn test_recognition_failure_aborts_request() {
        let staging = TempDir::new().unwrap();
        let (processor, _, recognizer) = processor_with(
            staging.path(),
            FakeRasterizer::default(),
            FakeRecognizer {
                fail_on: Some("smudged".to_string()),
                ..Default::default()
            },
        );

        let err = processor
            .process(Upload::new(
                "scan.pdf",
                fake_pdf(&["clean", "smudged", "never read"]),
            ))
            .await
            .unwrap_err();

        match &err {
            ProcessError::Recognition { page, source } => {
                assert_eq!(*page, 2);
                assert!(matches!(source, OcrError::ProcessingError(_)));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        // Page 3 is never attempted
        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 2);
        assert!(leftover_files(staging.path()).is_empty());
    }

    #[tokio::test]
    async fn test_missing_rasterizer_fails_before_conversion() {
        let staging = TempDir::new().unwrap();
        let (processor, rasterizer, _) = processor_with(
            staging.path(),
            FakeRasterizer {
                unavailable: true,
                ..Default::default()
            },
            FakeRecognizer::default(),
        );

        let err = processor
            .process(Upload::new("ok.pdf", fake_pdf(&["one"])))
            .await
            .unwrap_err();

        assert!(matches!(err, ProcessError::Configuration(_)));
        assert!(err.to_string().contains("Poppler"));
        assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 0);
        assert!(leftover_files(staging.path()).is_empty());
    }

    #[tokio::test]
    async fn test_missing_staging_dir_is_staging_error() {
        let (processor, rasterizer, _) = fake_processor(Path::new("/nonexistent/wikiocr/staging"));

        let err = processor
            .process(Upload::new("ok.pdf", fake_pdf(&["one"])))
            .await
            .unwrap_err();

        assert!(matches!(err, ProcessError::Staging(_)));
        assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_request_options_override_defaults() {
        let staging = TempDir::new().unwrap();
        let (processor, _, recognizer) = fake_processor(staging.path());
        let processor = processor.with_defaults(300, "deu");

        let doc = processor
            .process(
                Upload::new("range.pdf", fake_pdf(&["p1", "p2", "p3", "p4"])).with_options(
                    RequestOptions {
                        first_page: Some(2),
                        last_page: Some(3),
                        language: Some("fra".to_string()),
                        ..Default::default()
                    },
                ),
            )
            .await
            .unwrap();

        let numbers: Vec<usize> = doc.pages.iter().map(|p| p.page_number).collect();
        assert_eq!(numbers, vec![2, 3]);
        assert_eq!(texts(&doc), vec!["p2", "p3"]);
        assert_eq!(*recognizer.languages.lock().unwrap(), vec!["fra", "fra"]);
    }

    #[tokio::test]
    async fn test_default_language_used_without_override() {
        let staging = TempDir::new().unwrap();
        let (processor, _, recognizer) = fake_processor(staging.path());
        let processor = processor.with_defaults(200, "eng+deu");

        processor
            .process(Upload::new("a.pdf", fake_pdf(&["x"])))
            .await
            .unwrap();

        assert_eq!(*recognizer.languages.lock().unwrap(), vec!["eng+deu"]);
    }

    #[tokio::test]
    async fn test_slow_recognition_times_out() {
        let staging = TempDir::new().unwrap();
        let (processor, _, _) = processor_with(
            staging.path(),
            FakeRasterizer::default(),
            FakeRecognizer {
                delay: Some(Duration::from_secs(5)),
                ..Default::default()
            },
        );
        let processor = processor.with_timeout(Some(Duration::from_millis(50)));

        let err = processor
            .process(Upload::new("slow.pdf", fake_pdf(&["zzz"])))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ProcessError::Timeout {
                stage: "recognition",
                ..
            }
        ));
        assert!(leftover_files(staging.path()).is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_isolated() {
        let staging = TempDir::new().unwrap();
        let (processor, rasterizer, _) = processor_with(
            staging.path(),
            FakeRasterizer {
                delay: Some(Duration::from_millis(20)),
                ..Default::default()
            },
            FakeRecognizer::default(),
        );
        let processor = Arc::new(processor);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let processor = processor.clone();
                tokio::spawn(async move {
                    let pages: Vec<String> = (1..=3).map(|p| format!("doc{}-page{}", i, p)).collect();
                    let refs: Vec<&str> = pages.iter().map(String::as_str).collect();
                    let doc = processor
                        .process(Upload::new(format!("doc{}.pdf", i), fake_pdf(&refs)))
                        .await
                        .unwrap();
                    (i, doc)
                })
            })
            .collect();

        for (i, doc) in futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap())
        {
            let expected: Vec<String> = (1..=3).map(|p| format!("doc{}-page{}", i, p)).collect();
            let got: Vec<String> = doc.pages.into_iter().map(|p| p.text).collect();
            assert_eq!(got, expected);
        }

        let seen = rasterizer.seen.lock().unwrap().clone();
        let mut paths: Vec<_> = seen.iter().map(|(p, _)| p.clone()).collect();
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 8, "each request must stage to its own file");
        assert!(leftover_files(staging.path()).is_empty());
    }
}
