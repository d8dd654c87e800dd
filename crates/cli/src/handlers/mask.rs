//! `mask`: paint an inpainting mask offline.

use std::path::Path;

use anyhow::{Context, Result};
use horde_core::mask::{MaskEditor, Stroke};
use horde_core::media::{decode_image, encode_image, DownloadFormat};
use image::DynamicImage;

use crate::cli::MaskArgs;

pub fn execute(args: &MaskArgs) -> Result<()> {
    let bytes = std::fs::read(&args.image)
        .with_context(|| format!("Failed to read {}", args.image.display()))?;
    let mut editor = MaskEditor::new(&decode_image(&bytes)?);

    let strokes: Vec<Stroke> = serde_json::from_slice(
        &std::fs::read(&args.strokes)
            .with_context(|| format!("Failed to read {}", args.strokes.display()))?,
    )
    .context("Strokes must be a JSON array of {points, brush_size, mode}")?;
    for stroke in strokes {
        editor.draw(stroke)?;
    }
    for _ in 0..args.undo {
        if !editor.undo() {
            break;
        }
    }

    if !editor.has_mask() {
        tracing::warn!("Mask is empty; inpainting will change nothing");
    }
    write(&args.output, DynamicImage::ImageLuma8(editor.mask().clone()))?;
    if let Some(preview) = &args.preview {
        write(preview, DynamicImage::ImageRgba8(editor.composite_preview()))?;
    }
    println!(
        "Wrote {} ({} stroke(s))",
        args.output.display(),
        editor.history_len()
    );
    Ok(())
}

fn write(path: &Path, image: DynamicImage) -> Result<()> {
    let format = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("png")
        .to_ascii_lowercase()
        .parse::<DownloadFormat>()?;
    std::fs::write(path, encode_image(&image, format)?)
        .with_context(|| format!("Failed to write {}", path.display()))
}
