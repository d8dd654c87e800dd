//! Image payload helpers: base64 transport, format conversion and EXIF.
//!
//! The Horde ships images as base64 WEBP. Downloads may be re-encoded as
//! PNG or JPEG and may carry the generation metadata as an EXIF
//! `ImageDescription` tag.

use std::io::Cursor;
use std::str::FromStr;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// EXIF tag id for `ImageDescription`.
const TAG_IMAGE_DESCRIPTION: u16 = 0x010E;
/// EXIF field type for NUL-terminated ASCII.
const TYPE_ASCII: u16 = 2;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("Invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Malformed {format} data: {reason}")]
    Malformed { format: &'static str, reason: String },
}

/// Output encodings offered for downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadFormat {
    #[default]
    Webp,
    Png,
    Jpeg,
}

impl DownloadFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Webp => "webp",
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Webp => "image/webp",
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    fn image_format(self) -> ImageFormat {
        match self {
            Self::Webp => ImageFormat::WebP,
            Self::Png => ImageFormat::Png,
            Self::Jpeg => ImageFormat::Jpeg,
        }
    }
}

impl FromStr for DownloadFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "webp" => Ok(Self::Webp),
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            other => Err(CoreError::Validation(format!(
                "Invalid download format '{other}'. Must be one of: webp, png, jpeg"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Base64
// ---------------------------------------------------------------------------

/// Drop a `data:<mime>;base64,` prefix if present.
pub fn strip_data_url(payload: &str) -> &str {
    match payload.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => payload,
    }
}

/// Decode a base64 payload (with or without a data-URL prefix).
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, MediaError> {
    Ok(STANDARD.decode(strip_data_url(payload).trim())?)
}

pub fn encode_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Wrap raw bytes as a data URL.
pub fn to_data_url(bytes: &[u8], format: DownloadFormat) -> String {
    format!("data:{};base64,{}", format.mime_type(), encode_base64(bytes))
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, MediaError> {
    Ok(image::load_from_memory(bytes)?)
}

/// Encode an image in the requested format.
///
/// JPEG has no alpha channel and the WebP encoder is lossless RGBA, so the
/// pixel layout is converted first.
pub fn encode_image(image: &DynamicImage, format: DownloadFormat) -> Result<Vec<u8>, MediaError> {
    let converted = match format {
        DownloadFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        DownloadFormat::Webp => DynamicImage::ImageRgba8(image.to_rgba8()),
        DownloadFormat::Png => image.clone(),
    };
    let mut buffer = Cursor::new(Vec::new());
    converted.write_to(&mut buffer, format.image_format())?;
    Ok(buffer.into_inner())
}

/// Decode a base64 image and re-encode it in `format`.
pub fn convert_base64(payload: &str, format: DownloadFormat) -> Result<Vec<u8>, MediaError> {
    let bytes = decode_base64(payload)?;
    let image = decode_image(&bytes)?;
    encode_image(&image, format)
}

// ---------------------------------------------------------------------------
// EXIF
// ---------------------------------------------------------------------------

/// Build a little-endian TIFF block with a single `ImageDescription` entry.
pub fn exif_description_block(description: &str) -> Vec<u8> {
    let mut text = description.as_bytes().to_vec();
    text.push(0);
    let count = text.len() as u32;

    // header (8) + entry count (2) + one entry (12) + next-IFD offset (4)
    let data_offset: u32 = 8 + 2 + 12 + 4;

    let mut tiff = Vec::with_capacity(data_offset as usize + text.len());
    tiff.extend_from_slice(b"II");
    tiff.extend_from_slice(&42u16.to_le_bytes());
    tiff.extend_from_slice(&8u32.to_le_bytes());
    tiff.extend_from_slice(&1u16.to_le_bytes());
    tiff.extend_from_slice(&TAG_IMAGE_DESCRIPTION.to_le_bytes());
    tiff.extend_from_slice(&TYPE_ASCII.to_le_bytes());
    tiff.extend_from_slice(&count.to_le_bytes());
    if text.len() <= 4 {
        let mut inline = [0u8; 4];
        inline[..text.len()].copy_from_slice(&text);
        tiff.extend_from_slice(&inline);
        tiff.extend_from_slice(&0u32.to_le_bytes());
    } else {
        tiff.extend_from_slice(&data_offset.to_le_bytes());
        tiff.extend_from_slice(&0u32.to_le_bytes());
        tiff.extend_from_slice(&text);
    }
    tiff
}

/// Embed `description` as EXIF metadata into an encoded image.
///
/// JPEG gets an APP1 segment after SOI/APP0, PNG an `eXIf` chunk after
/// IHDR. WebP is not supported.
pub fn embed_exif_comment(
    bytes: &[u8],
    format: DownloadFormat,
    description: &str,
) -> Result<Vec<u8>, MediaError> {
    let tiff = exif_description_block(description);
    match format {
        DownloadFormat::Jpeg => embed_jpeg_exif(bytes, &tiff),
        DownloadFormat::Png => embed_png_exif(bytes, &tiff),
        DownloadFormat::Webp => Err(MediaError::Unsupported(
            "EXIF embedding is not available for WebP".to_string(),
        )),
    }
}

fn embed_jpeg_exif(bytes: &[u8], tiff: &[u8]) -> Result<Vec<u8>, MediaError> {
    if bytes.len() < 4 || bytes[0] != 0xFF || bytes[1] != 0xD8 {
        return Err(MediaError::Malformed {
            format: "JPEG",
            reason: "missing SOI marker".to_string(),
        });
    }

    let segment_len = 2 + 6 + tiff.len();
    let segment_len = u16::try_from(segment_len).map_err(|_| MediaError::Malformed {
        format: "JPEG",
        reason: "EXIF payload exceeds 64 KiB".to_string(),
    })?;

    // Keep a leading JFIF APP0 segment first.
    let mut insert_at = 2;
    if bytes[2] == 0xFF && bytes[3] == 0xE0 && bytes.len() >= 6 {
        let app0_len = u16::from_be_bytes([bytes[4], bytes[5]]) as usize;
        insert_at = (4 + app0_len).min(bytes.len());
    }

    let mut out = Vec::with_capacity(bytes.len() + segment_len as usize + 2);
    out.extend_from_slice(&bytes[..insert_at]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&segment_len.to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(tiff);
    out.extend_from_slice(&bytes[insert_at..]);
    Ok(out)
}

fn embed_png_exif(bytes: &[u8], tiff: &[u8]) -> Result<Vec<u8>, MediaError> {
    const SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
    // signature + IHDR (length, type, 13 data bytes, crc)
    const IHDR_END: usize = 8 + 4 + 4 + 13 + 4;

    if bytes.len() < IHDR_END || &bytes[..8] != SIGNATURE || &bytes[12..16] != b"IHDR" {
        return Err(MediaError::Malformed {
            format: "PNG",
            reason: "missing signature or IHDR".to_string(),
        });
    }

    let mut crc = flate2::Crc::new();
    crc.update(b"eXIf");
    crc.update(tiff);

    let mut out = Vec::with_capacity(bytes.len() + tiff.len() + 12);
    out.extend_from_slice(&bytes[..IHDR_END]);
    out.extend_from_slice(&(tiff.len() as u32).to_be_bytes());
    out.extend_from_slice(b"eXIf");
    out.extend_from_slice(tiff);
    out.extend_from_slice(&crc.sum().to_be_bytes());
    out.extend_from_slice(&bytes[IHDR_END..]);
    Ok(out)
}
