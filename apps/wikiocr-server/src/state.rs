//! Application state management

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Config, RasterBackend};
use crate::ocr::{TesseractRecognizer, TextRecognizer};
use crate::pdf::{PopplerRasterizer, Rasterizer};
use crate::process::PdfProcessor;
use crate::tools::ToolLocator;

/// Error type for state initialization
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("RASTER_BACKEND=mupdf requires building with the `mupdf` feature")]
    BackendNotCompiled,

    #[error("Staging directory {} is not usable: {source}", .path.display())]
    StagingDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    processor: Arc<PdfProcessor>,
}

impl AppState {
    /// Create the application state from configuration
    ///
    /// Resolves the OCR binary once. A missing binary is logged and the
    /// server still starts, so `/health` keeps answering.
    pub fn new(config: Config) -> Result<Self, StateError> {
        let rasterizer = build_rasterizer(&config)?;
        let recognizer = build_recognizer(&config);

        let staging_dir = match &config.server.staging_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|source| StateError::StagingDir {
                    path: dir.clone(),
                    source,
                })?;
                dir.clone()
            }
            None => std::env::temp_dir(),
        };

        let processor = PdfProcessor::new(rasterizer, recognizer)
            .with_staging_dir(staging_dir)
            .with_defaults(config.ocr.dpi, config.ocr.language.clone())
            .with_timeout(config.ocr.timeout());

        Ok(Self::with_processor(config, processor))
    }

    /// Create state around an already-built processor
    pub fn with_processor(config: Config, processor: PdfProcessor) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                processor: Arc::new(processor),
            }),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Get the upload processor
    pub fn processor(&self) -> &Arc<PdfProcessor> {
        &self.inner.processor
    }
}

fn build_recognizer(config: &Config) -> Arc<dyn TextRecognizer> {
    let locator = ToolLocator::tesseract(config.tools.tesseract_cmd.clone());
    let binary = match locator.locate() {
        Ok(path) => {
            tracing::info!("Using tesseract at {}", path.display());
            Some(path)
        }
        Err(e) => {
            tracing::warn!("{}. OCR requests will fail until it is available", e);
            None
        }
    };
    Arc::new(TesseractRecognizer::new(locator, binary, config.ocr.psm))
}

fn build_rasterizer(config: &Config) -> Result<Arc<dyn Rasterizer>, StateError> {
    match config.tools.raster_backend {
        RasterBackend::Poppler => {
            let rasterizer =
                PopplerRasterizer::new(ToolLocator::pdftoppm(config.tools.poppler_path.clone()));
            // Resolved again per request; this only reports the startup state
            if let Err(e) = rasterizer.locate() {
                tracing::warn!("{}. PDF conversion will fail until it is available", e);
            }
            Ok(Arc::new(rasterizer))
        }
        #[cfg(feature = "mupdf")]
        RasterBackend::Mupdf => Ok(Arc::new(crate::pdf::MupdfRasterizer::new())),
        #[cfg(not(feature = "mupdf"))]
        RasterBackend::Mupdf => Err(StateError::BackendNotCompiled),
    }
}
