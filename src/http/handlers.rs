//! HTTP request handlers

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;

use crate::archive::{self, ARCHIVE_NAME};
use crate::compose::{remove_files, CaptionSpec, Delivery, OutputArtifact, SegmentJob};
use crate::error::SegmenterError;
use crate::plan::RequestId;
use crate::state::AppState;
use crate::timing::TimingInput;

use super::upload::{UploadForm, UploadedVideo};

/// HTTP error type, rendered as `{"error": message}`
#[derive(Debug)]
pub enum HttpError {
    BadRequest(String),
    NotFound(String),
    PayloadTooLarge(String),
    InternalError(String),
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            HttpError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            HttpError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            HttpError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg),
            HttpError::InternalError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<SegmenterError> for HttpError {
    fn from(err: SegmenterError) -> Self {
        match err {
            SegmenterError::NotFound(msg) => HttpError::NotFound(msg),
            SegmenterError::SourceTooLong { .. } => HttpError::PayloadTooLarge(err.to_string()),
            SegmenterError::MissingInput(msg) => HttpError::BadRequest(msg),
            SegmenterError::UnsupportedFormat(_) => {
                HttpError::BadRequest("Invalid file format".to_string())
            }
            err if err.is_client_error() => HttpError::BadRequest(err.to_string()),
            err => {
                tracing::error!("Request failed: {}", err);
                HttpError::InternalError(err.to_string())
            }
        }
    }
}

impl From<MultipartError> for HttpError {
    fn from(err: MultipartError) -> Self {
        let message = err.body_text();
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            HttpError::PayloadTooLarge(message)
        } else {
            HttpError::BadRequest(message)
        }
    }
}

impl From<std::io::Error> for HttpError {
    fn from(err: std::io::Error) -> Self {
        SegmenterError::Io(err).into()
    }
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "OK"
}

/// Version endpoint
pub async fn version_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Job counters
pub async fn job_stats(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let stats = state.job_stats();
    Json(serde_json::json!({
        "active": stats.active,
        "completed": stats.completed,
        "failed": stats.failed,
        "segments_produced": stats.segments_produced,
        "max_concurrent_jobs": state.config.limits.max_concurrent_jobs,
    }))
}

/// `POST /upload_video`: captioned segmentation of a time range
pub async fn upload_video(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, HttpError> {
    let request_id = RequestId::new();
    let form = read_form(&state, multipart, request_id).await?;

    let (video, caption) = match (form.video(), form.text("text_two")) {
        (Some(video), Some(caption)) => (video, caption),
        _ => {
            return Err(
                SegmenterError::MissingInput("Missing video or text inputs".to_string()).into(),
            )
        }
    };
    let source_path = staged_source(video)?;
    let delivery = parse_delivery(form.text("delivery"))?;

    let job = SegmentJob {
        request_id,
        source_path,
        timing: TimingInput {
            start_time: form.text_owned("start_time"),
            end_time: form.text_owned("end_time"),
            output_duration: form.text_owned("output_duration"),
        },
        caption: Some(CaptionSpec::new(caption, &state.config.caption)),
        delivery,
    };

    run_job(&state, &job).await
}

/// `POST /process-video`: fixed-length segmentation of the whole source
pub async fn process_video(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, HttpError> {
    let request_id = RequestId::new();
    let form = read_form(&state, multipart, request_id).await?;

    let video = form
        .video()
        .ok_or_else(|| SegmenterError::MissingInput("No file provided".to_string()))?;
    let source_path = staged_source(video)?;

    let job = SegmentJob {
        request_id,
        source_path,
        timing: TimingInput::fixed(state.config.fixed_segment_secs),
        caption: None,
        delivery: Delivery::Archive,
    };

    run_job(&state, &job).await
}

/// `GET /output/{filename}`: download a retained artifact
pub async fn get_output(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, HttpError> {
    if !is_safe_filename(&filename) {
        return Err(HttpError::BadRequest(format!(
            "Invalid output filename: {}",
            filename
        )));
    }

    let path = state.segmenter.output_dir().join(&filename);
    let data = match tokio::fs::read(&path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SegmenterError::NotFound(filename).into());
        }
        Err(e) => return Err(e.into()),
    };

    attachment(content_type_for(&filename), &filename, Bytes::from(data))
}

async fn read_form(
    state: &AppState,
    multipart: Multipart,
    request_id: RequestId,
) -> Result<UploadForm, HttpError> {
    UploadForm::read(
        multipart,
        &state.config.limits,
        &state.config.storage.upload_dir,
        request_id,
    )
    .await
}

fn staged_source(video: &UploadedVideo) -> Result<PathBuf, HttpError> {
    video
        .staged_path()
        .map(|p| p.to_path_buf())
        .ok_or_else(|| SegmenterError::UnsupportedFormat(video.filename.clone()).into())
}

fn parse_delivery(value: Option<&str>) -> Result<Delivery, HttpError> {
    match value.map(str::trim) {
        None | Some("") | Some("zip") => Ok(Delivery::Archive),
        Some("file") => Ok(Delivery::SingleFile),
        Some(other) => Err(HttpError::BadRequest(format!(
            "Unknown delivery '{}', expected 'zip' or 'file'",
            other
        ))),
    }
}

/// Run the job under a job slot and package its artifacts
async fn run_job(state: &AppState, job: &SegmentJob) -> Result<Response, HttpError> {
    let permit = state.begin_job().await?;
    let artifacts = state.segmenter.run(job).await?;

    let response = deliver(&artifacts, job.delivery).await;
    if response.is_err() || !state.config.storage.retain_outputs {
        let paths: Vec<&std::path::Path> = artifacts.iter().map(|a| a.path.as_path()).collect();
        remove_files(paths).await;
    }
    let response = response?;

    permit.succeeded(artifacts.len());
    Ok(response)
}

async fn deliver(artifacts: &[OutputArtifact], delivery: Delivery) -> Result<Response, HttpError> {
    match delivery {
        Delivery::Archive => {
            let body = archive::bundle(artifacts).await?;
            attachment("application/zip", ARCHIVE_NAME, body)
        }
        Delivery::SingleFile => {
            let artifact = artifacts.first().ok_or_else(|| {
                SegmenterError::SingleFileUnavailable {
                    segments: artifacts.len(),
                }
            })?;
            let data = tokio::fs::read(&artifact.path).await?;
            attachment("video/mp4", &artifact.filename, Bytes::from(data))
        }
    }
}

fn attachment(content_type: &'static str, filename: &str, body: Bytes) -> Result<Response, HttpError> {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .map_err(|e| HttpError::InternalError(format!("Invalid header: {}", e)))?;
    headers.insert(header::CONTENT_DISPOSITION, disposition);

    Ok((headers, body).into_response())
}

fn is_safe_filename(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains("..")
}

fn content_type_for(filename: &str) -> &'static str {
    match filename.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "mp4" => "video/mp4",
        Some(ext) if ext == "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}
