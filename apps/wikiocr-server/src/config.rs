//! Configuration management for WikiOCR Server

use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub tools: ToolsConfig,
    pub ocr: OcrConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// The single browser origin allowed by CORS
    pub cors_origin: String,
    /// Upload body limit in megabytes
    pub max_upload_mb: usize,
    /// Directory used for staged uploads (None = OS temp dir)
    pub staging_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ToolsConfig {
    /// Explicit path to the tesseract binary
    pub tesseract_cmd: Option<PathBuf>,
    /// Directory containing the poppler binaries (pdftoppm)
    pub poppler_path: Option<PathBuf>,
    pub raster_backend: RasterBackend,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterBackend {
    Poppler,
    Mupdf,
}

impl std::str::FromStr for RasterBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "poppler" | "pdftoppm" => Ok(Self::Poppler),
            "mupdf" => Ok(Self::Mupdf),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OcrConfig {
    /// Default tesseract language code
    pub language: String,
    /// Default rasterization resolution
    pub dpi: u32,
    /// Tesseract page segmentation mode
    pub psm: u8,
    /// Optional deadline for rasterization and for each page's recognition
    pub timeout_secs: Option<u64>,
}

impl OcrConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unknown RASTER_BACKEND '{0}' (expected 'poppler' or 'mupdf')")]
    UnknownBackend(String),
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
                cors_origin: "http://localhost:3000".to_string(),
                max_upload_mb: 100,
                staging_dir: None,
            },
            tools: ToolsConfig {
                tesseract_cmd: None,
                poppler_path: None,
                raster_backend: RasterBackend::Poppler,
            },
            ocr: OcrConfig {
                language: "eng".to_string(),
                dpi: 200,
                psm: 3,
                timeout_secs: None,
            },
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Missing or unparsable values fall back to [`Config::default`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let raster_backend = match non_empty("RASTER_BACKEND") {
            Some(value) => value.parse()?,
            None => defaults.tools.raster_backend,
        };

        Ok(Config {
            server: ServerConfig {
                host: non_empty("SERVER_HOST").unwrap_or(defaults.server.host),
                port: non_empty("SERVER_PORT")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.server.port),
                cors_origin: non_empty("CORS_ORIGIN").unwrap_or(defaults.server.cors_origin),
                max_upload_mb: non_empty("MAX_UPLOAD_MB")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.server.max_upload_mb),
                staging_dir: non_empty("STAGING_DIR").map(PathBuf::from),
            },
            tools: ToolsConfig {
                tesseract_cmd: non_empty("TESSERACT_CMD").map(PathBuf::from),
                poppler_path: non_empty("POPPLER_PATH").map(PathBuf::from),
                raster_backend,
            },
            ocr: OcrConfig {
                language: non_empty("OCR_LANGUAGE").unwrap_or(defaults.ocr.language),
                dpi: non_empty("OCR_DPI")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.ocr.dpi),
                psm: non_empty("OCR_PSM")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.ocr.psm),
                timeout_secs: non_empty("OCR_TIMEOUT_SECS")
                    .and_then(|v| v.parse().ok())
                    .filter(|secs| *secs > 0),
            },
        })
    }

    /// Upload body limit in bytes
    pub fn max_upload_bytes(&self) -> usize {
        self.server.max_upload_mb.saturating_mul(1024 * 1024)
    }
}
