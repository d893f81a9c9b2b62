use eframe::egui;
use egui::{Color32, Vec2};
use image::RgbaImage;

use crate::canvas::{CanvasInput, InputPhase};
use crate::components::colors::HexColor;
use crate::ops::canvas_ops::{destination_out, source_over};

/// Brush diameters offered by the size picker, in backing pixels.
pub const BRUSH_SIZES: &[u32] = &[5, 10, 15, 25, 40];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Tool {
    #[default]
    Brush,
    Eraser,
}

impl Tool {
    pub fn label(&self) -> &'static str {
        match self {
            Tool::Brush => "Brush 🖌",
            Tool::Eraser => "Eraser 🧽",
        }
    }

    pub fn all() -> &'static [Tool] {
        &[Tool::Brush, Tool::Eraser]
    }
}

/// What the next stroke segment will look like.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BrushState {
    pub color: HexColor,
    /// Diameter in backing pixels, always > 0.
    pub size: u32,
    pub tool: Tool,
}

impl Default for BrushState {
    fn default() -> Self {
        Self {
            color: HexColor::rgb(0xef, 0x44, 0x44),
            size: 15,
            tool: Tool::Brush,
        }
    }
}

impl BrushState {
    pub fn from_settings(settings: &crate::assets::AppSettings) -> Self {
        let mut brush = Self::default();
        if let Some(c) = HexColor::parse(&settings.default_color) {
            brush.color = c;
        }
        if settings.default_brush_size > 0 {
            brush.size = settings.default_brush_size;
        }
        brush
    }
}

// ============================================================================
// SEGMENT RENDERING
// ============================================================================

/// Paint one round-capped line segment onto `target`.
///
/// The segment is the set of points within `size / 2` of the line from
/// `start` to `end` (a capsule), so consecutive segments sharing an endpoint
/// join without seams. Edge pixels get fractional coverage over one pixel.
/// Brush composites source-over; eraser composites destination-out and
/// ignores the color.
pub fn draw_segment(target: &mut RgbaImage, start: (f32, f32), end: (f32, f32), brush: &BrushState) {
    let (width, height) = target.dimensions();
    if width == 0 || height == 0 {
        return;
    }
    let radius = (brush.size.max(1) as f32) / 2.0;

    // Bounding box of the capsule, padded by one pixel for the AA fringe
    let min_x = (start.0.min(end.0) - radius - 1.0).floor().max(0.0);
    let min_y = (start.1.min(end.1) - radius - 1.0).floor().max(0.0);
    let max_x = (start.0.max(end.0) + radius + 1.0).ceil().min((width - 1) as f32);
    let max_y = (start.1.max(end.1) + radius + 1.0).ceil().min((height - 1) as f32);
    if !(min_x <= max_x && min_y <= max_y) {
        return;
    }

    let (dx, dy) = (end.0 - start.0, end.1 - start.1);
    let len_sq = dx * dx + dy * dy;
    let color = [brush.color.r, brush.color.g, brush.color.b];

    for y in min_y as u32..=max_y as u32 {
        let py = y as f32 + 0.5;
        for x in min_x as u32..=max_x as u32 {
            let px = x as f32 + 0.5;

            // Distance from the pixel center to the closest point on the segment
            let t = if len_sq < 1e-6 {
                0.0
            } else {
                (((px - start.0) * dx + (py - start.1) * dy) / len_sq).clamp(0.0, 1.0)
            };
            let cx = start.0 + dx * t;
            let cy = start.1 + dy * t;
            let dist = ((px - cx) * (px - cx) + (py - cy) * (py - cy)).sqrt();

            let coverage = (radius + 0.5 - dist).clamp(0.0, 1.0);
            if coverage <= 0.0 {
                continue;
            }
            let pixel = target.get_pixel_mut(x, y);
            match brush.tool {
                Tool::Brush => source_over(pixel, color, coverage),
                Tool::Eraser => destination_out(pixel, coverage),
            }
        }
    }
}

// ============================================================================
// STROKE STATE MACHINE
// ============================================================================

/// Idle until a press lands on the canvas; while drawing only the previous
/// point is kept.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum StrokeState {
    #[default]
    Idle,
    Drawing { last: (f32, f32) },
}

impl StrokeState {
    pub fn is_drawing(&self) -> bool {
        matches!(self, StrokeState::Drawing { .. })
    }

    /// Advance the machine by one input sample, painting onto `target` when
    /// a move continues a stroke. Returns true if `target` was modified.
    pub fn handle(&mut self, input: CanvasInput, brush: &BrushState, target: &mut RgbaImage) -> bool {
        match (input.phase, *self) {
            (InputPhase::Start, _) => {
                *self = match input.pos {
                    Some(pos) => StrokeState::Drawing { last: pos },
                    None => StrokeState::Idle,
                };
                false
            }
            (InputPhase::Move, StrokeState::Drawing { last }) => {
                let Some(pos) = input.pos else { return false };
                draw_segment(target, last, pos, brush);
                *self = StrokeState::Drawing { last: pos };
                true
            }
            (InputPhase::Move, StrokeState::Idle) => false,
            (InputPhase::End, _) => {
                *self = StrokeState::Idle;
                false
            }
        }
    }
}

// ============================================================================
// TOOLS PANEL (tool + size pickers)
// ============================================================================

pub struct ToolsPanel;

impl ToolsPanel {
    pub fn show(ui: &mut egui::Ui, brush: &mut BrushState) {
        let accent = Color32::from_rgb(0xa8, 0x55, 0xf7);

        ui.heading(egui::RichText::new("🎨 Tools").color(accent).strong());
        ui.horizontal(|ui| {
            for &tool in Tool::all() {
                let selected = brush.tool == tool;
                let text = egui::RichText::new(tool.label()).strong().color(if selected {
                    Color32::WHITE
                } else {
                    accent
                });
                let button = egui::Button::new(text)
                    .fill(if selected { accent } else { Color32::from_rgb(0xf3, 0xe8, 0xff) })
                    .min_size(Vec2::new(110.0, 40.0));
                if ui.add(button).clicked() {
                    brush.tool = tool;
                }
            }
        });

        ui.add_space(16.0);
        ui.heading(egui::RichText::new("📏 Size").color(accent).strong());
        ui.horizontal(|ui| {
            for &size in BRUSH_SIZES {
                let (rect, resp) = ui.allocate_exact_size(Vec2::splat(40.0), egui::Sense::click());
                if ui.is_rect_visible(rect) {
                    let p = ui.painter();
                    let selected = brush.size == size;
                    p.circle_filled(
                        rect.center(),
                        20.0,
                        if selected { Color32::from_rgb(0xf3, 0xe8, 0xff) } else { Color32::from_gray(243) },
                    );
                    if selected {
                        p.circle_stroke(rect.center(), 19.0, egui::Stroke::new(3.0, accent));
                    }
                    p.circle_filled(rect.center(), size as f32 * 0.4, Color32::from_rgb(0x6b, 0x72, 0x80));
                }
                if resp.on_hover_text(format!("{} px", size)).clicked() {
                    brush.size = size;
                }
            }
        });
    }
}
