use eframe::egui;
use egui::{Color32, ColorImage, Event, PointerButton, Pos2, Rect, Sense, TextureHandle, TextureOptions};
use image::{Rgba, RgbaImage};

// ============================================================================
// SURFACES
// ============================================================================

/// Whether a surface's pixels may leave the app through export.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SurfaceAccess {
    #[default]
    Readable,
    /// Pixels came from a source that did not grant anonymous reuse.
    /// Still displayed, but export must refuse to read them.
    Tainted,
}

/// One fixed-size RGBA raster (straight, non-premultiplied alpha).
pub struct Layer {
    pub name: String,
    pub pixels: RgbaImage,
    pub access: SurfaceAccess,
}

impl Layer {
    /// Create a fully transparent layer.
    pub fn new(name: &str, width: u32, height: u32) -> Self {
        Self {
            name: name.to_string(),
            pixels: RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0])),
            access: SurfaceAccess::Readable,
        }
    }

    /// Reset every pixel to transparent. Access is left alone.
    pub fn clear(&mut self) {
        self.pixels
            .pixels_mut()
            .for_each(|p| *p = Rgba([0, 0, 0, 0]));
    }

    pub fn is_blank(&self) -> bool {
        self.pixels.pixels().all(|p| p[3] == 0)
    }

    pub fn is_tainted(&self) -> bool {
        self.access == SurfaceAccess::Tainted
    }
}

/// The two surfaces behind the coloring page.
///
/// `base` holds the background picture, `drawing` holds the child's strokes.
/// Both always have the same dimensions so they can be composited pixel for
/// pixel without resampling.
pub struct CanvasState {
    pub base: Layer,
    pub drawing: Layer,
    pub width: u32,
    pub height: u32,
    /// Bumped whenever `base` pixels change; the view re-uploads on mismatch.
    pub base_generation: u64,
    /// Bumped whenever `drawing` pixels change.
    pub drawing_generation: u64,
}

impl CanvasState {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            base: Layer::new("Background", width, height),
            drawing: Layer::new("Drawing", width, height),
            width,
            height,
            base_generation: 0,
            drawing_generation: 0,
        }
    }

    pub fn mark_base_dirty(&mut self) {
        self.base_generation = self.base_generation.wrapping_add(1);
    }

    pub fn mark_drawing_dirty(&mut self) {
        self.drawing_generation = self.drawing_generation.wrapping_add(1);
    }

    /// Wipe the drawing layer back to transparent. The base is untouched.
    pub fn clear_drawing(&mut self) {
        self.drawing.clear();
        self.mark_drawing_dirty();
    }
}

// ============================================================================
// COORDINATE MAPPING
// ============================================================================

/// On-screen bounding box of the canvas element, in display pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScreenRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ScreenRect {
    pub fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self { left, top, width, height }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && x <= self.left + self.width && y >= self.top && y <= self.top + self.height
    }
}

impl From<Rect> for ScreenRect {
    fn from(r: Rect) -> Self {
        Self::new(r.min.x, r.min.y, r.width(), r.height())
    }
}

/// Convert a client-space position to backing-store pixels.
///
/// The element may be shown at any size; each axis is scaled independently
/// by `backing / displayed`. Returns `None` for a degenerate box.
pub fn map_to_canvas(
    client: (f32, f32),
    rect: &ScreenRect,
    backing_width: u32,
    backing_height: u32,
) -> Option<(f32, f32)> {
    if !(rect.width > 0.0 && rect.height > 0.0) {
        return None;
    }
    let scale_x = backing_width as f32 / rect.width;
    let scale_y = backing_height as f32 / rect.height;
    Some((
        (client.0 - rect.left) * scale_x,
        (client.1 - rect.top) * scale_y,
    ))
}

// ============================================================================
// INPUT ADAPTER
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputPhase {
    Start,
    Move,
    End,
}

/// One pointer sample, already in backing-store coordinates.
///
/// Mouse and touch sources both funnel into this type so the stroke state
/// machine never branches on the device. `pos` is `None` when the source had
/// no usable position (e.g. a touch event with no active touch points).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CanvasInput {
    pub phase: InputPhase,
    pub pos: Option<(f32, f32)>,
}

impl CanvasInput {
    pub fn end() -> Self {
        Self { phase: InputPhase::End, pos: None }
    }

    pub fn from_mouse(
        phase: InputPhase,
        client: (f32, f32),
        rect: &ScreenRect,
        backing_width: u32,
        backing_height: u32,
    ) -> Self {
        Self {
            phase,
            pos: map_to_canvas(client, rect, backing_width, backing_height),
        }
    }

    /// Only the first active touch point drives the stroke.
    pub fn from_touches(
        phase: InputPhase,
        touches: &[(f32, f32)],
        rect: &ScreenRect,
        backing_width: u32,
        backing_height: u32,
    ) -> Self {
        Self {
            phase,
            pos: touches
                .first()
                .and_then(|&t| map_to_canvas(t, rect, backing_width, backing_height)),
        }
    }
}

// ============================================================================
// CANVAS VIEW (egui)
// ============================================================================

/// Displays both surfaces stacked in a square and turns raw pointer events
/// into `CanvasInput` samples.
#[derive(Default)]
pub struct Canvas {
    base_texture: Option<TextureHandle>,
    drawing_texture: Option<TextureHandle>,
    uploaded_base_generation: Option<u64>,
    uploaded_drawing_generation: Option<u64>,
    /// True between a press inside the canvas and the matching release/leave.
    pointer_captured: bool,
}

impl Canvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw the canvas into the available space and return the pointer
    /// samples that arrived this frame, in arrival order.
    pub fn show(&mut self, ui: &mut egui::Ui, state: &CanvasState) -> Vec<CanvasInput> {
        let avail = ui.available_size();
        let side = avail.x.min(avail.y).max(64.0);
        let (rect, response) = ui.allocate_exact_size(egui::vec2(side, side), Sense::click_and_drag());
        let response = response.on_hover_cursor(egui::CursorIcon::Crosshair);

        self.sync_textures(ui.ctx(), state);

        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 24.0, Color32::WHITE);
        let uv = Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0));
        if let Some(tex) = &self.base_texture {
            painter.image(tex.id(), rect, uv, Color32::WHITE);
        }
        if let Some(tex) = &self.drawing_texture {
            painter.image(tex.id(), rect, uv, Color32::WHITE);
        }
        painter.rect_stroke(rect, 24.0, egui::Stroke::new(8.0, Color32::from_rgb(0xfa, 0xcc, 0x15)));

        if !response.hovered() && !self.pointer_captured {
            return Vec::new();
        }
        self.collect_inputs(ui, rect.into(), state.width, state.height)
    }

    fn collect_inputs(
        &mut self,
        ui: &egui::Ui,
        rect: ScreenRect,
        width: u32,
        height: u32,
    ) -> Vec<CanvasInput> {
        let events = ui.input(|i| i.events.clone());
        let mut out = Vec::new();
        for event in events {
            match event {
                Event::PointerButton { pos, button: PointerButton::Primary, pressed: true, .. } => {
                    if rect.contains(pos.x, pos.y) {
                        self.pointer_captured = true;
                        out.push(CanvasInput::from_mouse(InputPhase::Start, (pos.x, pos.y), &rect, width, height));
                    }
                }
                Event::PointerButton { button: PointerButton::Primary, pressed: false, .. } => {
                    if self.pointer_captured {
                        self.pointer_captured = false;
                        out.push(CanvasInput::end());
                    }
                }
                Event::PointerMoved(pos) => {
                    if !self.pointer_captured {
                        continue;
                    }
                    if rect.contains(pos.x, pos.y) {
                        out.push(CanvasInput::from_mouse(InputPhase::Move, (pos.x, pos.y), &rect, width, height));
                    } else {
                        // Leaving the canvas ends the stroke
                        self.pointer_captured = false;
                        out.push(CanvasInput::end());
                    }
                }
                Event::PointerGone => {
                    if self.pointer_captured {
                        self.pointer_captured = false;
                        out.push(CanvasInput::end());
                    }
                }
                _ => {}
            }
        }
        out
    }

    fn sync_textures(&mut self, ctx: &egui::Context, state: &CanvasState) {
        if self.uploaded_base_generation != Some(state.base_generation) {
            let img = rgba_image_to_color_image(&state.base.pixels);
            match &mut self.base_texture {
                Some(tex) => tex.set(img, TextureOptions::LINEAR),
                None => self.base_texture = Some(ctx.load_texture(state.base.name.as_str(), img, TextureOptions::LINEAR)),
            }
            self.uploaded_base_generation = Some(state.base_generation);
        }
        if self.uploaded_drawing_generation != Some(state.drawing_generation) {
            let img = rgba_image_to_color_image(&state.drawing.pixels);
            match &mut self.drawing_texture {
                Some(tex) => tex.set(img, TextureOptions::LINEAR),
                None => {
                    self.drawing_texture = Some(ctx.load_texture(state.drawing.name.as_str(), img, TextureOptions::LINEAR))
                }
            }
            self.uploaded_drawing_generation = Some(state.drawing_generation);
        }
    }
}

fn rgba_image_to_color_image(img: &RgbaImage) -> ColorImage {
    ColorImage::from_rgba_unmultiplied([img.width() as usize, img.height() as usize], img.as_raw())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_scales_each_axis_independently() {
        // 1024×1024 backing shown at 512×256
        let rect = ScreenRect::new(100.0, 50.0, 512.0, 256.0);
        assert_eq!(map_to_canvas((100.0, 50.0), &rect, 1024, 1024), Some((0.0, 0.0)));
        assert_eq!(map_to_canvas((356.0, 178.0), &rect, 1024, 1024), Some((512.0, 512.0)));
        assert_eq!(map_to_canvas((612.0, 306.0), &rect, 1024, 1024), Some((1024.0, 1024.0)));
    }

    #[test]
    fn mapping_is_scale_invariant() {
        let small = ScreenRect::new(0.0, 0.0, 300.0, 300.0);
        let large = ScreenRect::new(0.0, 0.0, 600.0, 600.0);
        for &(x, y) in &[(0.0, 0.0), (37.5, 120.0), (150.0, 299.0)] {
            assert_eq!(
                map_to_canvas((x, y), &small, 1024, 1024),
                map_to_canvas((x * 2.0, y * 2.0), &large, 1024, 1024),
            );
        }
    }

    #[test]
    fn degenerate_rect_yields_no_position() {
        let rect = ScreenRect::new(0.0, 0.0, 0.0, 100.0);
        assert_eq!(map_to_canvas((1.0, 1.0), &rect, 1024, 1024), None);
        let flipped = ScreenRect::new(0.0, 0.0, -5.0, 100.0);
        assert_eq!(map_to_canvas((-1.0, 1.0), &flipped, 1024, 1024), None);
        let flat = ScreenRect::new(0.0, 0.0, 100.0, -5.0);
        assert_eq!(map_to_canvas((1.0, -1.0), &flat, 1024, 1024), None);
    }

    #[test]
    fn surfaces_get_distinct_texture_names() {
        let state = CanvasState::new(8, 8);
        assert_ne!(state.base.name, state.drawing.name);
        assert!(!state.base.name.is_empty() && !state.drawing.name.is_empty());
    }

    #[test]
    fn mouse_and_single_touch_map_identically() {
        let rect = ScreenRect::new(10.0, 20.0, 400.0, 400.0);
        let mouse = CanvasInput::from_mouse(InputPhase::Move, (210.0, 220.0), &rect, 1024, 1024);
        let touch = CanvasInput::from_touches(InputPhase::Move, &[(210.0, 220.0), (5.0, 5.0)], &rect, 1024, 1024);
        assert_eq!(mouse, touch);
        assert_eq!(mouse.pos, Some((512.0, 512.0)));
    }

    #[test]
    fn touch_without_points_has_no_position() {
        let rect = ScreenRect::new(0.0, 0.0, 400.0, 400.0);
        let input = CanvasInput::from_touches(InputPhase::Start, &[], &rect, 1024, 1024);
        assert_eq!(input.pos, None);
        assert_eq!(input.phase, InputPhase::Start);
    }

    #[test]
    fn clearing_drawing_leaves_base_alone() {
        let mut state = CanvasState::new(8, 8);
        state.base.pixels.put_pixel(3, 3, Rgba([1, 2, 3, 255]));
        state.drawing.pixels.put_pixel(3, 3, Rgba([9, 9, 9, 255]));
        let before = state.drawing_generation;
        state.clear_drawing();
        assert!(state.drawing.is_blank());
        assert_eq!(*state.base.pixels.get_pixel(3, 3), Rgba([1, 2, 3, 255]));
        assert_ne!(state.drawing_generation, before);
    }
}
