//! Downloads: single images and zip archives of outputs.
//!
//! Images are re-encoded into the configured [`DownloadFormat`]. With
//! `embed_metadata` set, the generation metadata is also written into the
//! file as an EXIF `ImageDescription` (not available for WebP, which is
//! written without it). Zip archives hold a `<id>.<ext>` image and a
//! `<id>.json` metadata file per output.

use std::fs::File;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use horde_core::media::{convert_base64, embed_exif_comment, DownloadFormat, MediaError};
use horde_core::params::GenerationParams;
use horde_core::registry::OutputRecord;
use horde_core::types::{OutputId, Timestamp};
use serde::Serialize;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error(transparent)]
    Media(#[from] MediaError),

    #[error("Metadata encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExportOptions {
    pub format: DownloadFormat,
    pub embed_metadata: bool,
}

/// The `<id>.json` sidecar and EXIF description of one output.
#[derive(Debug, Serialize)]
pub struct OutputMetadata<'a> {
    pub id: OutputId,
    pub prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<&'a str>,
    pub seed: &'a str,
    pub model: Option<&'a str>,
    pub worker_id: Option<&'a str>,
    pub worker_name: Option<&'a str>,
    pub job_id: Option<&'a str>,
    pub params: &'a GenerationParams,
    pub starred: bool,
    pub created_at: Timestamp,
}

impl<'a> From<&'a OutputRecord> for OutputMetadata<'a> {
    fn from(record: &'a OutputRecord) -> Self {
        Self {
            id: record.id,
            prompt: &record.prompt,
            negative_prompt: record.request.negative_prompt.as_deref(),
            seed: &record.seed,
            model: record.model.as_deref(),
            worker_id: record.worker_id.as_deref(),
            worker_name: record.worker_name.as_deref(),
            job_id: record.job_id.as_deref(),
            params: &record.request.params,
            starred: record.starred,
            created_at: record.created_at,
        }
    }
}

/// `<id>.<ext>` for the given format.
pub fn file_name(record: &OutputRecord, format: DownloadFormat) -> String {
    format!("{}.{}", record.id, format.extension())
}

/// Encode one output as a downloadable file.
pub fn render_image(record: &OutputRecord, options: ExportOptions) -> Result<Vec<u8>, ExportError> {
    let bytes = convert_base64(&record.image, options.format)?;
    if !options.embed_metadata {
        return Ok(bytes);
    }

    let description = serde_json::to_string(&OutputMetadata::from(record))?;
    match embed_exif_comment(&bytes, options.format, &description) {
        Ok(tagged) => Ok(tagged),
        Err(MediaError::Unsupported(reason)) => {
            tracing::warn!(id = record.id, %reason, "Writing image without metadata");
            Ok(bytes)
        }
        Err(e) => Err(e.into()),
    }
}

/// Write one output into `dir`. Returns the written path.
pub fn write_image(
    dir: &Path,
    record: &OutputRecord,
    options: ExportOptions,
) -> Result<PathBuf, ExportError> {
    let bytes = render_image(record, options)?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name(record, options.format));
    std::fs::write(&path, bytes)?;
    tracing::info!(id = record.id, path = %path.display(), "Image exported");
    Ok(path)
}

/// Write every record as an image plus JSON metadata pair.
pub fn write_zip<W: Write + Seek>(
    writer: W,
    records: &[OutputRecord],
    options: ExportOptions,
) -> Result<W, ExportError> {
    let mut zip = ZipWriter::new(writer);
    let file_options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for record in records {
        let image = render_image(record, options)?;
        zip.start_file(file_name(record, options.format), file_options)?;
        zip.write_all(&image)?;

        let metadata = serde_json::to_vec_pretty(&OutputMetadata::from(record))?;
        zip.start_file(format!("{}.json", record.id), file_options)?;
        zip.write_all(&metadata)?;
    }

    Ok(zip.finish()?)
}

/// Write a zip archive of `records` to `path`.
pub fn export_zip_file(
    path: &Path,
    records: &[OutputRecord],
    options: ExportOptions,
) -> Result<(), ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    write_zip(file, records, options)?;
    tracing::info!(count = records.len(), path = %path.display(), "Outputs exported");
    Ok(())
}
