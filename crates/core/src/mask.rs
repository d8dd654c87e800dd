//! Inpainting mask editor.
//!
//! The editor keeps three layers of identical size:
//!
//! - the background image being inpainted,
//! - a visible overlay that previews the painted area,
//! - a hidden grayscale mask that becomes the server-bound `source_mask`.
//!
//! Every stroke is rasterised into both the overlay and the hidden mask.
//! Undo moves the newest stroke to the redo stack and rebuilds both layers
//! from the remaining history; redo moves it back. Neither stack is bounded
//! and nothing is persisted.

use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::media::{self, DownloadFormat, MediaError};

/// Tint used to preview painted regions on the overlay.
pub const OVERLAY_COLOR: Rgba<u8> = Rgba([255, 0, 255, 128]);
const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);
const MASKED: Luma<u8> = Luma([255]);
const UNMASKED: Luma<u8> = Luma([0]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrushMode {
    #[default]
    Draw,
    Erase,
}

/// A freehand stroke in image pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    pub points: Vec<(f32, f32)>,
    /// Brush diameter in pixels.
    pub brush_size: f32,
    #[serde(default)]
    pub mode: BrushMode,
}

impl Stroke {
    pub fn new(points: Vec<(f32, f32)>, brush_size: f32, mode: BrushMode) -> Self {
        Self {
            points,
            brush_size,
            mode,
        }
    }
}

pub struct MaskEditor {
    background: RgbaImage,
    overlay: RgbaImage,
    mask: GrayImage,
    history: Vec<Stroke>,
    redo: Vec<Stroke>,
}

impl MaskEditor {
    /// Start editing over `background`; both paint layers start empty.
    pub fn new(background: &DynamicImage) -> Self {
        let background = background.to_rgba8();
        let (width, height) = background.dimensions();
        Self {
            background,
            overlay: RgbaImage::from_pixel(width, height, CLEAR),
            mask: GrayImage::from_pixel(width, height, UNMASKED),
            history: Vec::new(),
            redo: Vec::new(),
        }
    }

    /// Start editing over a base64-encoded image.
    pub fn from_base64(payload: &str) -> Result<Self, MediaError> {
        let bytes = media::decode_base64(payload)?;
        let image = media::decode_image(&bytes)?;
        Ok(Self::new(&image))
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.background.dimensions()
    }

    /// Paint a stroke onto both layers. Discards any redo history.
    pub fn draw(&mut self, stroke: Stroke) -> Result<(), CoreError> {
        if stroke.points.is_empty() {
            return Err(CoreError::Validation("Stroke has no points".to_string()));
        }
        if !(stroke.brush_size > 0.0) {
            return Err(CoreError::Validation(
                "Brush size must be positive".to_string(),
            ));
        }
        self.rasterise(&stroke);
        self.history.push(stroke);
        self.redo.clear();
        Ok(())
    }

    /// Undo the newest stroke. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(stroke) = self.history.pop() else {
            return false;
        };
        self.redo.push(stroke);
        self.rebuild();
        true
    }

    /// Re-apply the most recently undone stroke.
    pub fn redo(&mut self) -> bool {
        let Some(stroke) = self.redo.pop() else {
            return false;
        };
        self.rasterise(&stroke);
        self.history.push(stroke);
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.history.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Drop all strokes and both stacks.
    pub fn clear(&mut self) {
        self.history.clear();
        self.redo.clear();
        self.rebuild();
    }

    pub fn background(&self) -> &RgbaImage {
        &self.background
    }

    pub fn overlay(&self) -> &RgbaImage {
        &self.overlay
    }

    pub fn mask(&self) -> &GrayImage {
        &self.mask
    }

    /// Background with the overlay alpha-blended on top.
    pub fn composite_preview(&self) -> RgbaImage {
        let mut composed = self.background.clone();
        image::imageops::overlay(&mut composed, &self.overlay, 0, 0);
        composed
    }

    /// Encode the hidden mask as base64 for the `source_mask` field.
    pub fn export_mask_base64(&self, format: DownloadFormat) -> Result<String, MediaError> {
        let image = DynamicImage::ImageLuma8(self.mask.clone());
        let bytes = media::encode_image(&image, format)?;
        Ok(media::encode_base64(&bytes))
    }

    /// Whether any pixel is currently masked.
    pub fn has_mask(&self) -> bool {
        self.mask.pixels().any(|p| p.0[0] > 0)
    }

    // ---- private helpers ----

    fn rebuild(&mut self) {
        let (width, height) = self.background.dimensions();
        self.overlay = RgbaImage::from_pixel(width, height, CLEAR);
        self.mask = GrayImage::from_pixel(width, height, UNMASKED);
        let history = std::mem::take(&mut self.history);
        for stroke in &history {
            self.rasterise(stroke);
        }
        self.history = history;
    }

    fn rasterise(&mut self, stroke: &Stroke) {
        let radius = stroke.brush_size / 2.0;
        let (preview, hidden) = match stroke.mode {
            BrushMode::Draw => (OVERLAY_COLOR, MASKED),
            BrushMode::Erase => (CLEAR, UNMASKED),
        };

        let step = (radius / 2.0).max(0.5);
        let mut stamp = |x: f32, y: f32| self.stamp(x, y, radius, preview, hidden);

        let mut points = stroke.points.iter().copied();
        let Some(mut prev) = points.next() else {
            return;
        };
        stamp(prev.0, prev.1);
        for next in points {
            let (dx, dy) = (next.0 - prev.0, next.1 - prev.1);
            let distance = (dx * dx + dy * dy).sqrt();
            let steps = (distance / step).ceil().max(1.0) as u32;
            for i in 1..=steps {
                let t = i as f32 / steps as f32;
                stamp(prev.0 + dx * t, prev.1 + dy * t);
            }
            prev = next;
        }
    }

    fn stamp(&mut self, cx: f32, cy: f32, radius: f32, preview: Rgba<u8>, hidden: Luma<u8>) {
        let (width, height) = self.mask.dimensions();
        let min_x = (cx - radius).floor().max(0.0) as u32;
        let min_y = (cy - radius).floor().max(0.0) as u32;
        let max_x = ((cx + radius).ceil().max(0.0) as u32).min(width.saturating_sub(1));
        let max_y = ((cy + radius).ceil().max(0.0) as u32).min(height.saturating_sub(1));
        if cx + radius < 0.0 || cy + radius < 0.0 || min_x >= width || min_y >= height {
            return;
        }

        let r2 = radius * radius;
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                if dx * dx + dy * dy <= r2 {
                    self.overlay.put_pixel(x, y, preview);
                    self.mask.put_pixel(x, y, hidden);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor() -> MaskEditor {
        MaskEditor::new(&DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            32,
            32,
            Rgba([10, 20, 30, 255]),
        )))
    }

    fn masked(editor: &MaskEditor, x: u32, y: u32) -> bool {
        editor.mask().get_pixel(x, y).0[0] == 255
    }

    #[test]
    fn draw_marks_both_layers() {
        let mut editor = editor();
        editor
            .draw(Stroke::new(vec![(4.0, 16.0), (28.0, 16.0)], 4.0, BrushMode::Draw))
            .unwrap();

        assert!(masked(&editor, 16, 16));
        assert_eq!(*editor.overlay().get_pixel(16, 16), OVERLAY_COLOR);
        assert!(!masked(&editor, 16, 2));
        assert_eq!(editor.overlay().get_pixel(16, 2).0[3], 0);
    }

    #[test]
    fn erase_clears_painted_pixels() {
        let mut editor = editor();
        editor
            .draw(Stroke::new(vec![(16.0, 16.0)], 10.0, BrushMode::Draw))
            .unwrap();
        editor
            .draw(Stroke::new(vec![(16.0, 16.0)], 4.0, BrushMode::Erase))
            .unwrap();

        assert!(!masked(&editor, 16, 16));
        assert!(masked(&editor, 12, 16));
    }

    #[test]
    fn undo_and_redo_replay_history() {
        let mut editor = editor();
        editor
            .draw(Stroke::new(vec![(16.0, 16.0)], 10.0, BrushMode::Draw))
            .unwrap();
        editor
            .draw(Stroke::new(vec![(16.0, 16.0)], 4.0, BrushMode::Erase))
            .unwrap();

        assert!(editor.undo());
        assert!(masked(&editor, 16, 16));
        assert!(editor.can_redo());

        assert!(editor.undo());
        assert!(!editor.has_mask());
        assert!(!editor.undo());

        assert!(editor.redo());
        assert!(editor.redo());
        assert!(!masked(&editor, 16, 16));
        assert!(!editor.redo());
        assert_eq!(editor.history_len(), 2);
    }

    #[test]
    fn new_stroke_discards_redo_stack() {
        let mut editor = editor();
        editor
            .draw(Stroke::new(vec![(5.0, 5.0)], 2.0, BrushMode::Draw))
            .unwrap();
        editor.undo();
        assert!(editor.can_redo());
        editor
            .draw(Stroke::new(vec![(6.0, 6.0)], 2.0, BrushMode::Draw))
            .unwrap();
        assert!(!editor.can_redo());
    }

    #[test]
    fn strokes_outside_canvas_are_clipped() {
        let mut editor = editor();
        editor
            .draw(Stroke::new(vec![(-50.0, -50.0), (40.0, 40.0)], 6.0, BrushMode::Draw))
            .unwrap();
        assert!(masked(&editor, 31, 31));
        assert!(masked(&editor, 0, 0));
    }

    #[test]
    fn invalid_strokes_are_rejected() {
        let mut editor = editor();
        assert!(editor.draw(Stroke::new(vec![], 4.0, BrushMode::Draw)).is_err());
        assert!(editor
            .draw(Stroke::new(vec![(1.0, 1.0)], 0.0, BrushMode::Draw))
            .is_err());
        assert!(!editor.can_undo());
    }

    #[test]
    fn clear_resets_everything() {
        let mut editor = editor();
        editor
            .draw(Stroke::new(vec![(5.0, 5.0)], 4.0, BrushMode::Draw))
            .unwrap();
        editor.clear();
        assert!(!editor.has_mask());
        assert!(!editor.can_undo());
        assert!(!editor.can_redo());
    }

    #[test]
    fn composite_preview_tints_painted_area() {
        let mut editor = editor();
        editor
            .draw(Stroke::new(vec![(16.0, 16.0)], 8.0, BrushMode::Draw))
            .unwrap();
        let preview = editor.composite_preview();
        assert_ne!(preview.get_pixel(16, 16), editor.background().get_pixel(16, 16));
        assert_eq!(preview.get_pixel(0, 0), editor.background().get_pixel(0, 0));
    }

    #[test]
    fn exported_mask_decodes_to_same_size() {
        let mut editor = editor();
        editor
            .draw(Stroke::new(vec![(16.0, 16.0)], 8.0, BrushMode::Draw))
            .unwrap();
        let payload = editor.export_mask_base64(DownloadFormat::Png).unwrap();
        let bytes = media::decode_base64(&payload).unwrap();
        let decoded = media::decode_image(&bytes).unwrap().to_luma8();
        assert_eq!(decoded.dimensions(), (32, 32));
        assert_eq!(decoded.get_pixel(16, 16).0[0], 255);
    }
}
