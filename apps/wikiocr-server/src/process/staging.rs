//! Staged uploads
//!
//! The rasterizer needs a path, so each upload is written to its own
//! randomly named `.pdf` file. The file is removed when the guard is
//! released or dropped, whichever comes first.

use std::io::Write;
use std::path::{Path, PathBuf};

use axum::body::Bytes;
use tempfile::TempPath;

pub struct StagedPdf {
    path: TempPath,
}

impl StagedPdf {
    /// Write `data` to a fresh `upload-*.pdf` file inside `dir`
    pub async fn stage(dir: &Path, data: Bytes) -> std::io::Result<Self> {
        let dir = dir.to_path_buf();
        let path = tokio::task::spawn_blocking(move || -> std::io::Result<TempPath> {
            let mut file = tempfile::Builder::new()
                .prefix("upload-")
                .suffix(".pdf")
                .tempfile_in(&dir)?;
            file.write_all(&data)?;
            file.flush()?;
            Ok(file.into_temp_path())
        })
        .await
        .map_err(std::io::Error::other)??;

        tracing::debug!(path = %path.display(), "Staged upload");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the staged file, reporting failures instead of swallowing them
    pub fn release(self) -> std::io::Result<PathBuf> {
        let path = self.path.to_path_buf();
        self.path.close()?;
        tracing::debug!(path = %path.display(), "Released staged upload");
        Ok(path)
    }
}
