//! Multipart form reading
//!
//! The `video` part is streamed straight into a per-request staging
//! directory under the upload dir. Parts with a filename outside the
//! allow-list are never written; the handler rejects them once the whole
//! form has been read. Staged files are removed when the [`UploadForm`]
//! is dropped.

use axum::extract::multipart::{Field, Multipart};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;

use crate::config::LimitsConfig;
use crate::plan::RequestId;

use super::handlers::HttpError;

/// Multipart field carrying the source video
pub const VIDEO_FIELD: &str = "video";

/// Source file received in the `video` part
#[derive(Debug)]
pub struct UploadedVideo {
    /// Client-supplied filename, empty when the part had none
    pub filename: String,
    staged: Option<StagedFile>,
}

impl UploadedVideo {
    /// Path of the staged copy; `None` when the extension was rejected
    pub fn staged_path(&self) -> Option<&Path> {
        self.staged.as_ref().map(|s| s.path.as_path())
    }
}

#[derive(Debug)]
struct StagedFile {
    _dir: TempDir,
    path: PathBuf,
}

/// Parsed upload form
#[derive(Debug, Default)]
pub struct UploadForm {
    video: Option<UploadedVideo>,
    fields: HashMap<String, String>,
}

impl UploadForm {
    /// Read every part of `multipart`. Only the first `video` part and the
    /// first occurrence of each text field are kept.
    pub async fn read(
        mut multipart: Multipart,
        limits: &LimitsConfig,
        upload_dir: &Path,
        request_id: RequestId,
    ) -> Result<Self, HttpError> {
        let mut form = UploadForm::default();

        while let Some(mut field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();

            if name == VIDEO_FIELD {
                if form.video.is_some() {
                    continue;
                }
                let filename = field.file_name().unwrap_or_default().to_string();
                let staged = if limits.is_allowed_file(&filename) {
                    Some(stage(&mut field, &filename, upload_dir, request_id).await?)
                } else {
                    tracing::debug!("Not staging upload with rejected name {:?}", filename);
                    None
                };
                form.video = Some(UploadedVideo { filename, staged });
            } else {
                let value = field.text().await?;
                form.fields.entry(name).or_insert(value);
            }
        }

        Ok(form)
    }

    pub fn video(&self) -> Option<&UploadedVideo> {
        self.video.as_ref()
    }

    /// Text field value; blank values count as present
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn text_owned(&self, name: &str) -> Option<String> {
        self.text(name).map(str::to_string)
    }
}

async fn stage(
    field: &mut Field<'_>,
    filename: &str,
    upload_dir: &Path,
    request_id: RequestId,
) -> Result<StagedFile, HttpError> {
    tokio::fs::create_dir_all(upload_dir).await?;
    let dir = tempfile::Builder::new()
        .prefix(&format!("upload-{}-", request_id))
        .tempdir_in(upload_dir)?;

    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    let path = dir.path().join(format!("source.{}", extension));

    let mut file = tokio::fs::File::create(&path).await?;
    let mut written = 0u64;
    while let Some(chunk) = field.chunk().await? {
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    tracing::info!(
        "Staged upload {:?} ({} bytes) at {}",
        filename,
        written,
        path.display()
    );

    Ok(StagedFile { _dir: dir, path })
}
