//! Poppler rasterizer
//!
//! Shells out to `pdftoppm` (and `pdfinfo` when it sits next to it) and
//! decodes the PNG pages it writes into a scratch directory.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use super::types::{PageImage, RasterError, RasterOptions, Rasterizer};
use crate::tools::{ToolError, ToolLocator};

const PAGE_PREFIX: &str = "page";
/// Prefix of the pdftoppm error for a range with no pages
const WRONG_PAGE_RANGE: &str = "Wrong page range";

pub struct PopplerRasterizer {
    locator: ToolLocator,
}

impl PopplerRasterizer {
    pub fn new(locator: ToolLocator) -> Self {
        Self { locator }
    }

    /// Ask `pdfinfo` for the page count.
    ///
    /// Returns `Ok(None)` when `pdfinfo` is not installed beside `pdftoppm`;
    /// the requested bounds are then handed to `pdftoppm` unchanged.
    async fn page_count(&self, pdftoppm: &Path, pdf: &Path) -> Result<Option<usize>, RasterError> {
        let pdfinfo = pdftoppm.with_file_name(format!("pdfinfo{}", std::env::consts::EXE_SUFFIX));
        if !pdfinfo.is_file() {
            tracing::debug!("pdfinfo not found beside {}, skipping page count", pdftoppm.display());
            return Ok(None);
        }

        let output = Command::new(&pdfinfo)
            .arg(pdf)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(RasterError::CommandFailed {
                tool: "pdfinfo",
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(parse_page_count(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[async_trait]
impl Rasterizer for PopplerRasterizer {
    fn name(&self) -> &'static str {
        "poppler"
    }

    fn locate(&self) -> Result<(), ToolError> {
        self.locator.locate().map(|_| ())
    }

    async fn rasterize(
        &self,
        pdf: &Path,
        options: &RasterOptions,
    ) -> Result<Vec<PageImage>, RasterError> {
        let pdftoppm = self.locator.locate()?;

        let page_count = self.page_count(&pdftoppm, pdf).await?;
        let (first, last) = match page_count {
            Some(count) => match options.pages.resolve(count) {
                Some((first, last)) => (Some(first), Some(last)),
                None => {
                    tracing::debug!(page_count = count, "No pages in requested range");
                    return Ok(Vec::new());
                }
            },
            None => (options.pages.first, options.pages.last),
        };

        let out_dir = tempfile::Builder::new()
            .prefix("wikiocr-pages-")
            .tempdir()?;
        let prefix = out_dir.path().join(PAGE_PREFIX);

        let mut command = Command::new(&pdftoppm);
        command.arg("-png").arg("-r").arg(options.dpi.to_string());
        if let Some(first) = first {
            command.arg("-f").arg(first.to_string());
        }
        if let Some(last) = last {
            command.arg("-l").arg(last.to_string());
        }
        command.arg(pdf).arg(&prefix).kill_on_drop(true);

        tracing::debug!(dpi = options.dpi, ?first, ?last, "Running pdftoppm");
        let output = command.output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            // Without pdfinfo the range is unchecked; pdftoppm rejects empty ones
            if page_count.is_none() && stderr.contains(WRONG_PAGE_RANGE) {
                tracing::debug!("pdftoppm found no pages in requested range");
                return Ok(Vec::new());
            }
            return Err(RasterError::CommandFailed {
                tool: "pdftoppm",
                status: output.status.to_string(),
                stderr,
            });
        }

        let files = collect_page_files(out_dir.path())?;
        tracing::debug!("pdftoppm rendered {} pages", files.len());

        let images = tokio::task::spawn_blocking(move || decode_pages(files))
            .await
            .map_err(|e| RasterError::Join(e.to_string()))??;

        drop(out_dir);
        Ok(images)
    }
}

/// Extract `Pages: N` from `pdfinfo` output
fn parse_page_count(info: &str) -> Option<usize> {
    info.lines()
        .find_map(|line| line.strip_prefix("Pages:"))
        .and_then(|value| value.trim().parse().ok())
}

/// Page number from a `pdftoppm` output name such as `page-07.png`
fn page_number_from_file(path: &Path) -> Option<usize> {
    if path.extension()? != "png" {
        return None;
    }
    path.file_stem()?
        .to_str()?
        .strip_prefix(PAGE_PREFIX)?
        .strip_prefix('-')?
        .parse()
        .ok()
}

/// List rendered pages, ordered by page number
fn collect_page_files(dir: &Path) -> Result<Vec<(usize, PathBuf)>, RasterError> {
    let mut files: Vec<(usize, PathBuf)> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter_map(|path| page_number_from_file(&path).map(|n| (n, path)))
        .collect();

    files.sort_by_key(|(page, _)| *page);
    Ok(files)
}

fn decode_pages(files: Vec<(usize, PathBuf)>) -> Result<Vec<PageImage>, RasterError> {
    files
        .into_iter()
        .map(|(page_number, path)| {
            let image = image::open(&path).map_err(|e| RasterError::Decode {
                page: page_number,
                message: e.to_string(),
            })?;
            Ok(PageImage { page_number, image })
        })
        .collect()
}
