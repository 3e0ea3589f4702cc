//! OCR Providers
//!
//! Defines the recognizer trait and the Tesseract implementation.

use std::io::Cursor;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::types::{OcrError, OcrProvider};
use crate::pdf::PageImage;
use crate::tools::ToolLocator;

/// Text recognition capability
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Get the provider type
    fn provider_type(&self) -> OcrProvider;

    /// Check if the provider can run right now
    async fn is_available(&self) -> bool;

    /// Recognize the text on one page image
    async fn recognize(&self, page: PageImage, language: &str) -> Result<String, OcrError>;
}

/// Tesseract OCR provider
///
/// Pipes a PNG-encoded page into `tesseract stdin stdout`.
pub struct TesseractRecognizer {
    locator: ToolLocator,
    /// Binary resolved at startup, if any
    binary: Option<PathBuf>,
    /// Page segmentation mode
    psm: u8,
}

impl TesseractRecognizer {
    pub fn new(locator: ToolLocator, binary: Option<PathBuf>, psm: u8) -> Self {
        Self {
            locator,
            binary,
            psm,
        }
    }

    pub fn binary(&self) -> Option<&PathBuf> {
        self.binary.as_ref()
    }

    /// Binary resolved at startup, or a fresh lookup if that failed
    fn resolve_binary(&self) -> Result<PathBuf, OcrError> {
        match &self.binary {
            Some(path) => Ok(path.clone()),
            None => self
                .locator
                .locate()
                .map_err(|e| OcrError::ProviderNotAvailable(e.to_string())),
        }
    }
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    fn provider_type(&self) -> OcrProvider {
        OcrProvider::Tesseract
    }

    async fn is_available(&self) -> bool {
        let Ok(binary) = self.resolve_binary() else {
            return false;
        };
        Command::new(binary)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map(|status| status.success())
            .unwrap_or(false)
    }

    async fn recognize(&self, page: PageImage, language: &str) -> Result<String, OcrError> {
        let binary = self.resolve_binary()?;
        let page_number = page.page_number;

        let png = tokio::task::spawn_blocking(move || {
            let mut buffer = Vec::new();
            page.image
                .write_to(&mut Cursor::new(&mut buffer), image::ImageFormat::Png)?;
            Ok::<_, image::ImageError>(buffer)
        })
        .await
        .map_err(|e| OcrError::ImageEncodingError(format!("Task join error: {}", e)))?
        .map_err(|e| OcrError::ImageEncodingError(e.to_string()))?;

        let mut child = Command::new(&binary)
            .arg("stdin")
            .arg("stdout")
            .arg("-l")
            .arg(language)
            .arg("--psm")
            .arg(self.psm.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| OcrError::ProcessingError(format!("Failed to run tesseract: {}", e)))?;

        // Feed stdin concurrently so a chatty child cannot fill its stdout pipe first
        let stdin = child.stdin.take();
        let writer = tokio::spawn(async move {
            if let Some(mut stdin) = stdin {
                stdin.write_all(&png).await?;
                stdin.shutdown().await?;
            }
            Ok::<_, std::io::Error>(())
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| OcrError::ProcessingError(format!("Failed to run tesseract: {}", e)))?;

        if let Ok(Err(e)) = writer.await {
            tracing::debug!(page = page_number, "tesseract closed stdin early: {}", e);
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(OcrError::ProcessingError(format!(
                "Tesseract failed: {}",
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout);
        // Tesseract terminates each page with a form feed
        Ok(text.trim_end_matches('\u{000C}').to_string())
    }
}
