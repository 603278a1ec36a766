use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::domain::AudioUpload;
use crate::presentation::handlers::ApiError;
use crate::presentation::state::AppState;

pub const FILE_FIELD: &str = "file";

#[tracing::instrument(skip(state, multipart))]
pub async fn speech_to_text_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let mut multipart = multipart
        .map_err(|e| ApiError::InvalidRequest(format!("Invalid multipart request: {}", e)))?;

    let read_timeout = state.upload.read_timeout();
    let upload = tokio::time::timeout(read_timeout, read_upload(&mut multipart))
        .await
        .map_err(|_| ApiError::UploadTimeout(read_timeout))??;

    if upload.is_empty() {
        return Err(ApiError::InvalidRequest(
            "Uploaded file is empty".to_string(),
        ));
    }

    tracing::debug!(
        filename = upload.filename.as_deref().unwrap_or("unknown"),
        content_type = upload.content_type.as_deref().unwrap_or("unknown"),
        bytes = upload.len(),
        "Audio upload received"
    );

    let transcript = state.transcription_service.transcribe(upload).await?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        transcript.text,
    )
        .into_response())
}

/// Returns the first field named `file` or carrying a filename.
async fn read_upload(multipart: &mut Multipart) -> Result<AudioUpload, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidRequest(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) && field.file_name().is_none() {
            continue;
        }

        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to read file: {}", e)))?;

        let mut upload = AudioUpload::new(data);
        upload.filename = filename;
        upload.content_type = content_type;
        return Ok(upload);
    }

    Err(ApiError::InvalidRequest("No file uploaded".to_string()))
}
