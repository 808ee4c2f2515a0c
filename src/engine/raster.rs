//! Affine layer painting
//!
//! Paints a source image onto the canvas under a translate / rotate / scale
//! transform, the way a 2D canvas `drawImage` does after `translate`,
//! `rotate` and `scale`. Each destination pixel is inverse-mapped into the
//! source and sampled bilinearly, then blended source-over.

use image::{Rgba, RgbaImage};
use rayon::prelude::*;

/// Placement of a source image on the canvas, in physical pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Canvas position of the source image center
    pub center_x: f64,
    pub center_y: f64,
    /// Clockwise rotation in degrees
    pub rotation_deg: f64,
    /// Source pixel -> canvas pixel factor
    pub scale: f64,
}

/// Paint `source` centered at the placement origin onto `canvas`
pub fn paint_layer(canvas: &mut RgbaImage, source: &RgbaImage, placement: Placement) {
    let (src_w, src_h) = source.dimensions();
    if src_w == 0 || src_h == 0 || !(placement.scale > 0.0) {
        return;
    }

    let (canvas_w, canvas_h) = canvas.dimensions();
    let theta = placement.rotation_deg.to_radians();
    let (sin, cos) = theta.sin_cos();
    let half_w = src_w as f64 / 2.0;
    let half_h = src_h as f64 / 2.0;

    // Canvas-space bounding box of the transformed source rectangle
    let corners = [(-half_w, -half_h), (half_w, -half_h), (half_w, half_h), (-half_w, half_h)];
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
    for (u, v) in corners {
        let x = placement.center_x + placement.scale * (u * cos - v * sin);
        let y = placement.center_y + placement.scale * (u * sin + v * cos);
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }

    let x_start = min_x.floor().max(0.0) as u32;
    let y_start = min_y.floor().max(0.0) as u32;
    let x_end = (max_x.ceil().max(0.0) as u32).min(canvas_w);
    let y_end = (max_y.ceil().max(0.0) as u32).min(canvas_h);
    if x_start >= x_end || y_start >= y_end {
        return;
    }

    let inv_scale = 1.0 / placement.scale;
    let row_bytes = canvas_w as usize * 4;
    let buffer: &mut [u8] = &mut **canvas;

    // Rows are independent, process them in parallel
    buffer
        .par_chunks_mut(row_bytes)
        .enumerate()
        .skip(y_start as usize)
        .take((y_end - y_start) as usize)
        .for_each(|(y, row)| {
            let py = y as f64 + 0.5 - placement.center_y;

            for x in x_start..x_end {
                let px = x as f64 + 0.5 - placement.center_x;

                // Undo rotation, then scale; result is relative to the source center
                let u = (px * cos + py * sin) * inv_scale + half_w - 0.5;
                let v = (-px * sin + py * cos) * inv_scale + half_h - 0.5;

                if u < -0.5 || v < -0.5 || u > src_w as f64 - 0.5 || v > src_h as f64 - 0.5 {
                    continue;
                }

                let sample = bilinear_sample(source, u.max(0.0), v.max(0.0));
                if sample.0[3] == 0 {
                    continue;
                }

                let offset = x as usize * 4;
                let dst = Rgba([row[offset], row[offset + 1], row[offset + 2], row[offset + 3]]);
                let blended = blend_source_over(&dst, &sample);
                row[offset..offset + 4].copy_from_slice(&blended.0);
            }
        });
}

/// Bilinear interpolation for smooth pixel sampling
pub fn bilinear_sample(image: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let (width, height) = image.dimensions();

    let x = x.clamp(0.0, (width - 1) as f64);
    let y = y.clamp(0.0, (height - 1) as f64);

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let dx = x - x0 as f64;
    let dy = y - y0 as f64;

    let p00 = image.get_pixel(x0, y0);
    let p10 = image.get_pixel(x1, y0);
    let p01 = image.get_pixel(x0, y1);
    let p11 = image.get_pixel(x1, y1);

    let mut result = [0u8; 4];
    for i in 0..4 {
        let value = p00.0[i] as f64 * (1.0 - dx) * (1.0 - dy)
            + p10.0[i] as f64 * dx * (1.0 - dy)
            + p01.0[i] as f64 * (1.0 - dx) * dy
            + p11.0[i] as f64 * dx * dy;

        result[i] = value.round().clamp(0.0, 255.0) as u8;
    }

    Rgba(result)
}

/// Source-over alpha compositing (non-premultiplied)
pub fn blend_source_over(base: &Rgba<u8>, overlay: &Rgba<u8>) -> Rgba<u8> {
    let src_a = overlay.0[3] as f64 / 255.0;
    let dst_a = base.0[3] as f64 / 255.0;
    let out_a = src_a + dst_a * (1.0 - src_a);

    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let mut result = [0u8; 4];
    for i in 0..3 {
        let value = (overlay.0[i] as f64 * src_a + base.0[i] as f64 * dst_a * (1.0 - src_a)) / out_a;
        result[i] = value.round().clamp(0.0, 255.0) as u8;
    }
    result[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;

    Rgba(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BG: Rgba<u8> = Rgba([0, 0, 255, 255]);
    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);

    fn centered(canvas: u32, rotation_deg: f64, scale: f64) -> Placement {
        Placement {
            center_x: canvas as f64 / 2.0,
            center_y: canvas as f64 / 2.0,
            rotation_deg,
            scale,
        }
    }

    #[test]
    fn test_bilinear_sample_center() {
        let mut img = RgbaImage::new(2, 2);
        img.put_pixel(0, 0, Rgba([100, 100, 100, 255]));
        img.put_pixel(1, 0, Rgba([200, 200, 200, 255]));
        img.put_pixel(0, 1, Rgba([100, 100, 100, 255]));
        img.put_pixel(1, 1, Rgba([200, 200, 200, 255]));

        let result = bilinear_sample(&img, 0.5, 0.5);
        assert!((result.0[0] as i32 - 150).abs() < 5);
    }

    #[test]
    fn test_unrotated_layer_covers_exact_pixels() {
        let mut canvas = RgbaImage::from_pixel(16, 16, BG);
        let source = RgbaImage::from_pixel(4, 2, RED);

        paint_layer(&mut canvas, &source, centered(16, 0.0, 1.0));

        for y in 0..16 {
            for x in 0..16 {
                let inside = (6..10).contains(&x) && (7..9).contains(&y);
                let expected = if inside { RED } else { BG };
                assert_eq!(canvas.get_pixel(x, y), &expected, "pixel ({}, {})", x, y);
            }
        }
    }

    #[test]
    fn test_quarter_turn_swaps_extent() {
        let mut canvas = RgbaImage::from_pixel(16, 16, BG);
        let source = RgbaImage::from_pixel(4, 2, RED);

        paint_layer(&mut canvas, &source, centered(16, 90.0, 1.0));

        assert_eq!(canvas.get_pixel(7, 6), &RED);
        assert_eq!(canvas.get_pixel(8, 9), &RED);
        assert_eq!(canvas.get_pixel(6, 8), &BG);
        assert_eq!(canvas.get_pixel(9, 8), &BG);
    }

    #[test]
    fn test_scale_doubles_footprint() {
        let mut canvas = RgbaImage::from_pixel(16, 16, BG);
        let source = RgbaImage::from_pixel(2, 2, RED);

        paint_layer(&mut canvas, &source, centered(16, 0.0, 2.0));

        assert_eq!(canvas.get_pixel(6, 6), &RED);
        assert_eq!(canvas.get_pixel(9, 9), &RED);
        assert_eq!(canvas.get_pixel(5, 5), &BG);
        assert_eq!(canvas.get_pixel(10, 10), &BG);
    }

    #[test]
    fn test_transparent_pixels_keep_background() {
        let mut canvas = RgbaImage::from_pixel(8, 8, BG);
        let source = RgbaImage::from_pixel(8, 8, Rgba([255, 255, 255, 0]));

        paint_layer(&mut canvas, &source, centered(8, 0.0, 1.0));

        assert!(canvas.pixels().all(|p| *p == BG));
    }

    #[test]
    fn test_half_alpha_blend() {
        let blended = blend_source_over(&Rgba([0, 0, 0, 255]), &Rgba([255, 255, 255, 128]));
        assert_eq!(blended.0[3], 255);
        assert!((blended.0[0] as i32 - 128).abs() <= 1);
    }

    #[test]
    fn test_offcanvas_layer_is_ignored() {
        let mut canvas = RgbaImage::from_pixel(8, 8, BG);
        let source = RgbaImage::from_pixel(2, 2, RED);
        let placement = Placement { center_x: -50.0, center_y: 4.0, rotation_deg: 0.0, scale: 1.0 };

        paint_layer(&mut canvas, &source, placement);

        assert!(canvas.pixels().all(|p| *p == BG));
    }
}
