//! Zip packaging of produced segments

use bytes::Bytes;
use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::compose::OutputArtifact;
use crate::error::{Result, SegmenterError};

/// Download name of the archive
pub const ARCHIVE_NAME: &str = "output_videos.zip";

/// Bundle artifacts into an in-memory zip, one entry per artifact in
/// index order. Runs on the blocking pool since it reads whole files.
pub async fn bundle(artifacts: &[OutputArtifact]) -> Result<Bytes> {
    let artifacts = artifacts.to_vec();
    tokio::task::spawn_blocking(move || bundle_blocking(&artifacts))
        .await
        .map_err(|e| SegmenterError::Archive(e.to_string()))?
}

fn bundle_blocking(artifacts: &[OutputArtifact]) -> Result<Bytes> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut ordered: Vec<&OutputArtifact> = artifacts.iter().collect();
    ordered.sort_by_key(|a| a.index);

    for artifact in ordered {
        let data = std::fs::read(&artifact.path)?;
        writer
            .start_file(artifact.filename.as_str(), options)
            .map_err(|e| SegmenterError::Archive(e.to_string()))?;
        writer.write_all(&data)?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| SegmenterError::Archive(e.to_string()))?;
    Ok(Bytes::from(cursor.into_inner()))
}
