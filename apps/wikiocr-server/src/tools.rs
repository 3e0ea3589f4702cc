//! External tool location
//!
//! Finds the `tesseract` and `pdftoppm` binaries on the host. Resolution
//! order is: configured override, well-known install locations, then `PATH`.

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Tool location errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    #[error("{tool} not found. Please install {package} and ensure it's in your PATH.")]
    NotFound {
        tool: &'static str,
        package: &'static str,
    },

    #[error("{tool} not found at configured path {}", .path.display())]
    MissingOverride { tool: &'static str, path: PathBuf },
}

/// Resolves one external binary
#[derive(Debug, Clone)]
pub struct ToolLocator {
    tool: &'static str,
    package: &'static str,
    /// Configured path: either the binary itself or its directory
    override_path: Option<PathBuf>,
    /// Directories checked before PATH
    candidates: Vec<PathBuf>,
    /// PATH value to search (None = read the process environment)
    search_path: Option<OsString>,
}

impl ToolLocator {
    pub fn new(tool: &'static str, package: &'static str) -> Self {
        Self {
            tool,
            package,
            override_path: None,
            candidates: Vec::new(),
            search_path: None,
        }
    }

    /// Locator for the Tesseract OCR binary
    pub fn tesseract(override_path: Option<PathBuf>) -> Self {
        Self::new("tesseract", "Tesseract OCR")
            .with_override(override_path)
            .with_candidates(vec![
                PathBuf::from(r"C:\Program Files\Tesseract-OCR"),
                PathBuf::from(r"C:\Program Files (x86)\Tesseract-OCR"),
                PathBuf::from("/usr/bin"),
                PathBuf::from("/usr/local/bin"),
                PathBuf::from("/opt/homebrew/bin"),
            ])
    }

    /// Locator for poppler's `pdftoppm`
    pub fn pdftoppm(poppler_dir: Option<PathBuf>) -> Self {
        Self::new("pdftoppm", "Poppler")
            .with_override(poppler_dir)
            .with_candidates(vec![
                PathBuf::from(r"C:\Program Files\poppler-24.08.0\Library\bin"),
                PathBuf::from(r"C:\Program Files\poppler-24.02.0\Library\bin"),
                PathBuf::from(r"C:\Program Files (x86)\poppler-24.02.0\Library\bin"),
                PathBuf::from(r"C:\poppler-24.02.0\Library\bin"),
                PathBuf::from("/usr/bin"),
                PathBuf::from("/usr/local/bin"),
                PathBuf::from("/opt/homebrew/bin"),
            ])
    }

    pub fn with_override(mut self, path: Option<PathBuf>) -> Self {
        self.override_path = path;
        self
    }

    pub fn with_candidates(mut self, candidates: Vec<PathBuf>) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn with_search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    pub fn tool(&self) -> &'static str {
        self.tool
    }

    /// Resolve the binary path.
    ///
    /// A configured override is authoritative: if it does not point at the
    /// binary, resolution fails rather than falling back to other locations.
    pub fn locate(&self) -> Result<PathBuf, ToolError> {
        let file_name = self.file_name();

        if let Some(path) = &self.override_path {
            let resolved = if path.is_dir() {
                path.join(&file_name)
            } else {
                path.clone()
            };
            return if is_executable(&resolved) {
                Ok(resolved)
            } else {
                Err(ToolError::MissingOverride {
                    tool: self.tool,
                    path: path.clone(),
                })
            };
        }

        let from_candidates = self.candidates.iter().map(|dir| dir.join(&file_name));

        let search_path = self.search_path.clone().or_else(|| env::var_os("PATH"));
        let from_path: Vec<PathBuf> = search_path
            .map(|p| {
                env::split_paths(&p)
                    .filter(|dir| !dir.as_os_str().is_empty())
                    .map(|dir| dir.join(&file_name))
                    .collect()
            })
            .unwrap_or_default();

        from_candidates
            .chain(from_path)
            .find(|candidate| is_executable(candidate))
            .ok_or(ToolError::NotFound {
                tool: self.tool,
                package: self.package,
            })
    }

    fn file_name(&self) -> String {
        format!("{}{}", self.tool, env::consts::EXE_SUFFIX)
    }
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
