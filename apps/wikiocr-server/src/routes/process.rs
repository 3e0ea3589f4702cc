//! PDF OCR endpoint
//!
//! `POST /process-pdf` takes a multipart upload and answers with the text
//! of every page, or a single `{detail}` error.

use std::str::FromStr;

use axum::{
    body::Bytes,
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use tracing::Instrument;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::process::{ProcessError, ProcessedDocument, RequestOptions, Upload};
use crate::state::AppState;

/// Create the processing router
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/process-pdf", post(process_pdf))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

/// POST /process-pdf
async fn process_pdf(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<ProcessedDocument>> {
    let mut multipart = multipart?;
    let upload = read_upload(&mut multipart).await?;
    upload.options.validate()?;

    let span = tracing::info_span!(
        "process_pdf",
        request_id = %Uuid::new_v4(),
        filename = %upload.filename,
    );

    // Own task: a panic inside a backend becomes an error response
    let processor = state.processor().clone();
    let document = tokio::spawn(async move { processor.process(upload).await }.instrument(span))
        .await
        .map_err(|e| ProcessError::Unexpected(format!("Processing task failed: {}", e)))??;

    Ok(Json(document))
}

/// Collect the file and option fields of the multipart body
async fn read_upload(multipart: &mut Multipart) -> Result<Upload> {
    let mut file: Option<(String, Bytes)> = None;
    let mut options = RequestOptions::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" | "pdf" => {
                let filename = field
                    .file_name()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "upload.pdf".to_string());
                let data = field.bytes().await?;
                tracing::debug!("Read {} bytes of file data from '{}'", data.len(), filename);
                file = Some((filename, data));
            }
            "dpi" => options.dpi = parse_field("dpi", &field.text().await?)?,
            "first_page" => options.first_page = parse_field("first_page", &field.text().await?)?,
            "last_page" => options.last_page = parse_field("last_page", &field.text().await?)?,
            "lang" | "language" => {
                let value = field.text().await?;
                let value = value.trim();
                options.language = (!value.is_empty()).then(|| value.to_string());
            }
            other => tracing::debug!("Ignoring multipart field '{}'", other),
        }
    }

    let (filename, data) = file.ok_or(AppError::MissingFile)?;

    Ok(Upload {
        filename,
        data,
        options,
    })
}

/// Parse an optional numeric form field; blank means unset
fn parse_field<T: FromStr>(name: &str, value: &str) -> Result<Option<T>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| AppError::BadRequest(format!("Invalid value for '{}': '{}'", name, value)))
}
