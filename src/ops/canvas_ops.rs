// ============================================================================
// CANVAS-LEVEL OPERATIONS — pixel blending, background fit, export flatten
// ============================================================================

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use rayon::prelude::*;
use thiserror::Error;

use crate::canvas::{CanvasState, Layer, SurfaceAccess};

// ----------------------------------------------------------------------------
// Pixel blending (straight alpha, RGBA8)
// ----------------------------------------------------------------------------

/// Source-over one color sample onto `dst` at `alpha` (0.0–1.0).
pub fn source_over(dst: &mut Rgba<u8>, src: [u8; 3], alpha: f32) {
    blend_over(&mut dst.0, src, alpha);
}

/// Destination-out: remove `coverage` (0.0–1.0) of `dst`'s alpha.
/// Color channels are left as-is; a fully erased pixel is zeroed.
pub fn destination_out(dst: &mut Rgba<u8>, coverage: f32) {
    let keep = 1.0 - coverage.clamp(0.0, 1.0);
    let a = (dst[3] as f32 * keep).round() as u8;
    if a == 0 {
        *dst = Rgba([0, 0, 0, 0]);
    } else {
        dst[3] = a;
    }
}

fn blend_over(dst: &mut [u8], src: [u8; 3], alpha: f32) {
    let sa = alpha.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return;
    }
    let dst_weight = da * (1.0 - sa);
    for c in 0..3 {
        let v = (src[c] as f32 * sa + dst[c] as f32 * dst_weight) / out_a;
        dst[c] = v.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round() as u8;
}

// ----------------------------------------------------------------------------
// Background compositing
// ----------------------------------------------------------------------------

/// Placement of an aspect-fit image inside a target box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub scale: f32,
}

/// Largest uniform scale that keeps `src` inside `dst`, centered. Never crops.
pub fn aspect_fit(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> FitRect {
    if src_w == 0 || src_h == 0 {
        return FitRect { x: dst_w / 2, y: dst_h / 2, width: 0, height: 0, scale: 0.0 };
    }
    let scale = (dst_w as f32 / src_w as f32).min(dst_h as f32 / src_h as f32);
    let width = ((src_w as f32 * scale).round() as u32).clamp(1, dst_w);
    let height = ((src_h as f32 * scale).round() as u32).clamp(1, dst_h);
    FitRect {
        x: (dst_w - width) / 2,
        y: (dst_h - height) / 2,
        width,
        height,
        scale,
    }
}

/// Replace the base layer's contents with `image`, aspect-fit and centered
/// on a transparent field.
pub fn paint_background(base: &mut Layer, image: &RgbaImage, access: SurfaceAccess) {
    base.clear();
    base.access = access;

    let (dst_w, dst_h) = base.pixels.dimensions();
    let fit = aspect_fit(image.width(), image.height(), dst_w, dst_h);
    if fit.width == 0 || fit.height == 0 {
        return;
    }

    if fit.width == image.width() && fit.height == image.height() {
        imageops::replace(&mut base.pixels, image, fit.x as i64, fit.y as i64);
    } else {
        let scaled = imageops::resize(image, fit.width, fit.height, FilterType::Triangle);
        imageops::replace(&mut base.pixels, &scaled, fit.x as i64, fit.y as i64);
    }
}

// ----------------------------------------------------------------------------
// Export flattening
// ----------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ExportError {
    /// The background came from a source that did not allow its pixels to be copied.
    #[error("the picture's source does not allow it to be saved")]
    Tainted,

    #[error("layer sizes differ ({0}×{1} vs {2}×{3})")]
    SizeMismatch(u32, u32, u32, u32),

    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),

    #[error("could not write file: {0}")]
    Io(#[from] std::io::Error),
}

/// Merge base then drawing into a fresh buffer. Sources are not modified.
pub fn flatten(state: &CanvasState) -> Result<RgbaImage, ExportError> {
    if state.base.is_tainted() || state.drawing.is_tainted() {
        return Err(ExportError::Tainted);
    }
    let (bw, bh) = state.base.pixels.dimensions();
    let (dw, dh) = state.drawing.pixels.dimensions();
    if (bw, bh) != (dw, dh) {
        return Err(ExportError::SizeMismatch(bw, bh, dw, dh));
    }

    let mut out = RgbaImage::from_pixel(state.width, state.height, Rgba([0, 0, 0, 0]));
    imageops::replace(&mut out, &state.base.pixels, 0, 0);

    let row_bytes = bw as usize * 4;
    if row_bytes == 0 {
        return Ok(out);
    }
    out.par_chunks_mut(row_bytes)
        .zip(state.drawing.pixels.par_chunks(row_bytes))
        .for_each(|(dst_row, src_row)| {
            for (d, s) in dst_row.chunks_exact_mut(4).zip(src_row.chunks_exact(4)) {
                if s[3] == 0 {
                    continue;
                }
                blend_over(d, [s[0], s[1], s[2]], s[3] as f32 / 255.0);
            }
        });
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::colors::HexColor;
    use crate::components::tools::{BrushState, Tool, draw_segment};

    fn checker(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 { Rgba([0, 0, 0, 255]) } else { Rgba([255, 255, 255, 255]) }
        })
    }

    #[test]
    fn opaque_source_over_replaces_and_transparent_is_noop() {
        let mut px = Rgba([10, 20, 30, 255]);
        source_over(&mut px, [200, 100, 50], 1.0);
        assert_eq!(px, Rgba([200, 100, 50, 255]));
        source_over(&mut px, [0, 0, 0], 0.0);
        assert_eq!(px, Rgba([200, 100, 50, 255]));
    }

    #[test]
    fn half_alpha_over_opaque_mixes() {
        let mut px = Rgba([0, 0, 0, 255]);
        source_over(&mut px, [255, 255, 255], 0.5);
        assert_eq!(px[3], 255);
        assert!((126..=129).contains(&px[0]));
    }

    #[test]
    fn destination_out_scales_alpha() {
        let mut px = Rgba([50, 60, 70, 200]);
        destination_out(&mut px, 0.5);
        assert_eq!(px, Rgba([50, 60, 70, 100]));
        destination_out(&mut px, 1.0);
        assert_eq!(px, Rgba([0, 0, 0, 0]));
    }

    #[test]
    fn fit_wide_image_letterboxes_vertically() {
        let fit = aspect_fit(2048, 1024, 1024, 1024);
        assert_eq!((fit.x, fit.y, fit.width, fit.height), (0, 256, 1024, 512));
        assert!((fit.scale - 0.5).abs() < 1e-6);
    }

    #[test]
    fn fit_small_tall_image_scales_up_and_centers() {
        let fit = aspect_fit(100, 200, 1024, 1024);
        assert_eq!((fit.x, fit.y, fit.width, fit.height), (256, 0, 512, 1024));
    }

    #[test]
    fn background_is_centered_on_transparent_field() {
        let mut base = Layer::new("Background", 64, 64);
        let img = RgbaImage::from_pixel(32, 16, Rgba([9, 9, 9, 255]));
        paint_background(&mut base, &img, SurfaceAccess::Readable);
        // 32×16 fits as 64×32 starting at y = 16
        assert_eq!(base.pixels.get_pixel(0, 15)[3], 0);
        assert_eq!(*base.pixels.get_pixel(0, 16), Rgba([9, 9, 9, 255]));
        assert_eq!(*base.pixels.get_pixel(63, 47), Rgba([9, 9, 9, 255]));
        assert_eq!(base.pixels.get_pixel(63, 48)[3], 0);
    }

    #[test]
    fn new_background_replaces_old_one_wholesale() {
        let mut base = Layer::new("Background", 16, 16);
        paint_background(&mut base, &RgbaImage::from_pixel(16, 16, Rgba([1, 1, 1, 255])), SurfaceAccess::Tainted);
        assert!(base.is_tainted());
        paint_background(&mut base, &RgbaImage::from_pixel(16, 8, Rgba([2, 2, 2, 255])), SurfaceAccess::Readable);
        assert!(!base.is_tainted());
        assert_eq!(base.pixels.get_pixel(0, 0)[3], 0);
        assert_eq!(*base.pixels.get_pixel(0, 8), Rgba([2, 2, 2, 255]));
    }

    #[test]
    fn flatten_with_empty_drawing_equals_base() {
        let mut state = CanvasState::new(32, 32);
        paint_background(&mut state.base, &checker(32, 32), SurfaceAccess::Readable);
        let out = flatten(&state).expect("flatten");
        assert_eq!(out, state.base.pixels);
    }

    #[test]
    fn brush_occludes_and_eraser_reveals_base() {
        let mut state = CanvasState::new(32, 32);
        paint_background(&mut state.base, &checker(32, 32), SurfaceAccess::Readable);
        let blue = BrushState { color: HexColor::rgb(0, 0, 255), size: 8, tool: Tool::Brush };
        draw_segment(&mut state.drawing.pixels, (2.0, 16.0), (30.0, 16.0), &blue);

        let painted = flatten(&state).expect("flatten");
        assert_eq!(*painted.get_pixel(16, 16), Rgba([0, 0, 255, 255]));

        let eraser = BrushState { tool: Tool::Eraser, ..blue };
        draw_segment(&mut state.drawing.pixels, (2.0, 16.0), (30.0, 16.0), &eraser);
        let erased = flatten(&state).expect("flatten");
        // The checker is black under (16,16); a white-painting eraser would show white
        assert_eq!(*erased.get_pixel(16, 16), Rgba([0, 0, 0, 255]));
        assert_eq!(*erased.get_pixel(16, 16), *state.base.pixels.get_pixel(16, 16));
    }

    #[test]
    fn flatten_refuses_tainted_base_and_leaves_sources_alone() {
        let mut state = CanvasState::new(8, 8);
        paint_background(&mut state.base, &checker(8, 8), SurfaceAccess::Tainted);
        let before = state.base.pixels.clone();
        assert!(matches!(flatten(&state), Err(ExportError::Tainted)));
        assert_eq!(state.base.pixels, before);
    }
}
