use eframe::egui;
use egui::{Color32, Stroke, Vec2};

// ============================================================================
// HexColor — `#rrggbb` brush color
// ============================================================================

/// An opaque RGB color that round-trips through its `#rrggbb` form.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HexColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl HexColor {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Accepts `#rrggbb` or `rrggbb`, any case.
    pub fn parse(s: &str) -> Option<Self> {
        let hex = s.trim();
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        let val = u32::from_str_radix(hex, 16).ok()?;
        Some(Self::rgb(
            ((val >> 16) & 0xFF) as u8,
            ((val >> 8) & 0xFF) as u8,
            (val & 0xFF) as u8,
        ))
    }

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    pub fn to_color32(self) -> Color32 {
        Color32::from_rgb(self.r, self.g, self.b)
    }
}

// ============================================================================
// Palette
// ============================================================================

pub struct PaletteColor {
    pub name: &'static str,
    pub color: HexColor,
}

pub const PALETTE: &[PaletteColor] = &[
    PaletteColor { name: "Red", color: HexColor::rgb(0xef, 0x44, 0x44) },
    PaletteColor { name: "Orange", color: HexColor::rgb(0xf9, 0x73, 0x16) },
    PaletteColor { name: "Yellow", color: HexColor::rgb(0xfa, 0xcc, 0x15) },
    PaletteColor { name: "Green", color: HexColor::rgb(0x22, 0xc5, 0x5e) },
    PaletteColor { name: "Blue", color: HexColor::rgb(0x3b, 0x82, 0xf6) },
    PaletteColor { name: "Indigo", color: HexColor::rgb(0x63, 0x66, 0xf1) },
    PaletteColor { name: "Purple", color: HexColor::rgb(0xa8, 0x55, 0xf7) },
    PaletteColor { name: "Pink", color: HexColor::rgb(0xec, 0x48, 0x99) },
    PaletteColor { name: "Brown", color: HexColor::rgb(0x78, 0x35, 0x0f) },
    PaletteColor { name: "Black", color: HexColor::rgb(0x00, 0x00, 0x00) },
    PaletteColor { name: "White", color: HexColor::rgb(0xff, 0xff, 0xff) },
];

// ============================================================================
// ColorPalette — row of round swatches
// ============================================================================

pub struct ColorPalette;

impl ColorPalette {
    /// Draw the swatches; returns the color the user clicked this frame.
    pub fn show(ui: &mut egui::Ui, selected: HexColor) -> Option<HexColor> {
        let mut picked = None;
        ui.horizontal_wrapped(|ui| {
            for entry in PALETTE {
                let size = Vec2::splat(48.0);
                let (rect, resp) = ui.allocate_exact_size(size, egui::Sense::click());
                if ui.is_rect_visible(rect) {
                    let grow = if resp.hovered() { 2.0 } else { 0.0 };
                    let center = rect.center();
                    let radius = size.x / 2.0 - 4.0 + grow;
                    let p = ui.painter();
                    p.circle_filled(center, radius, entry.color.to_color32());
                    let border = if entry.color == selected {
                        Stroke::new(4.0, Color32::from_rgb(0x1f, 0x29, 0x37))
                    } else {
                        Stroke::new(1.0, Color32::from_gray(200))
                    };
                    p.circle_stroke(center, radius, border);
                }
                if resp.on_hover_text(entry.name).clicked() {
                    picked = Some(entry.color);
                }
            }
        });
        picked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_with_and_without_hash() {
        assert_eq!(HexColor::parse("#ef4444"), Some(HexColor::rgb(0xef, 0x44, 0x44)));
        assert_eq!(HexColor::parse("A855F7"), Some(HexColor::rgb(0xa8, 0x55, 0xf7)));
        assert_eq!(HexColor::parse("#fff"), None);
        assert_eq!(HexColor::parse("#gg0000"), None);
        assert_eq!(HexColor::parse("#+12345"), None);
    }

    #[test]
    fn palette_hex_strings_match_names() {
        let red = PALETTE.iter().find(|c| c.name == "Red").map(|c| c.color.to_hex());
        assert_eq!(red.as_deref(), Some("#ef4444"));
        assert_eq!(PALETTE.len(), 11);
    }
}
