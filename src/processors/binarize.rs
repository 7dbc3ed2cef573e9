//! Contrast enhancement and binarization.
//!
//! All binary images produced here use ink-as-foreground: dark pixels become
//! 255, paper becomes 0, which is what contour extraction expects.

use image::{GrayImage, Luma};
use imageproc::contrast::{ThresholdType, otsu_level, threshold};

use crate::processors::PixelRect;

/// Images whose darkest and brightest pixels differ by less than this carry no ink.
const MIN_INK_CONTRAST: u8 = 16;

/// Inverted Otsu threshold: pixels at or below the automatic level become 255.
///
/// A (nearly) uniform image has no ink and yields an all-zero result.
pub fn otsu_inverted(gray: &GrayImage) -> GrayImage {
    let (min, max) = gray
        .pixels()
        .fold((u8::MAX, u8::MIN), |(lo, hi), p| (lo.min(p[0]), hi.max(p[0])));
    if gray.width() == 0 || gray.height() == 0 || max.saturating_sub(min) < MIN_INK_CONTRAST {
        return GrayImage::new(gray.width(), gray.height());
    }
    threshold(gray, otsu_level(gray), ThresholdType::BinaryInverted)
}

/// Fraction of pixels inside `rect` darker than `below`.
pub fn dark_pixel_ratio(gray: &GrayImage, rect: &PixelRect, below: u8) -> f32 {
    let rect = rect.clip(gray.width(), gray.height());
    if rect.is_empty() {
        return 0.0;
    }
    let mut dark = 0u64;
    for y in rect.y..rect.bottom() {
        for x in rect.x..rect.right() {
            if gray.get_pixel(x, y)[0] < below {
                dark += 1;
            }
        }
    }
    dark as f32 / rect.area() as f32
}

/// Contrast-limited adaptive histogram equalization.
///
/// The image is split into a `grid x grid` lattice of tiles (fewer on images
/// smaller than the grid). Each tile's histogram is clipped at
/// `clip_limit * tile_area / 256`, the excess is spread evenly over all bins,
/// and the resulting mappings are bilinearly interpolated between tile centers.
pub fn clahe(gray: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (width, height) = gray.dimensions();
    if width == 0 || height == 0 || grid == 0 {
        return gray.clone();
    }

    let tile_w = width.div_ceil(grid.min(width));
    let tile_h = height.div_ceil(grid.min(height));
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    let mut luts = vec![[0u8; 256]; (tiles_x * tiles_y) as usize];
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);
            luts[(ty * tiles_x + tx) as usize] = tile_lut(gray, x0, y0, x1, y1, clip_limit);
        }
    }

    // Position of a pixel between tile centers: lower tile index and weight of the upper one.
    let axis = |p: u32, tile: u32, tiles: u32| -> (u32, u32, f32) {
        let f = (p as f32 + 0.5) / tile as f32 - 0.5;
        if f <= 0.0 {
            return (0, 0, 0.0);
        }
        let lo = (f.floor() as u32).min(tiles - 1);
        let hi = (lo + 1).min(tiles - 1);
        let w = if hi == lo { 0.0 } else { f - lo as f32 };
        (lo, hi, w)
    };

    GrayImage::from_fn(width, height, |x, y| {
        let v = gray.get_pixel(x, y)[0] as usize;
        let (x_lo, x_hi, wx) = axis(x, tile_w, tiles_x);
        let (y_lo, y_hi, wy) = axis(y, tile_h, tiles_y);
        let at = |tx: u32, ty: u32| luts[(ty * tiles_x + tx) as usize][v] as f32;
        let top = at(x_lo, y_lo) * (1.0 - wx) + at(x_hi, y_lo) * wx;
        let bottom = at(x_lo, y_hi) * (1.0 - wx) + at(x_hi, y_hi) * wx;
        let value = top * (1.0 - wy) + bottom * wy;
        Luma([value.round().clamp(0.0, 255.0) as u8])
    })
}

fn tile_lut(gray: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, clip_limit: f32) -> [u8; 256] {
    let mut hist = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[gray.get_pixel(x, y)[0] as usize] += 1;
        }
    }
    let area = ((x1 - x0) * (y1 - y0)).max(1);

    if clip_limit > 0.0 {
        let limit = ((clip_limit * area as f32 / 256.0) as u32).max(1);
        let mut excess = 0u32;
        for bin in hist.iter_mut() {
            if *bin > limit {
                excess += *bin - limit;
                *bin = limit;
            }
        }
        let share = excess / 256;
        let remainder = (excess % 256) as usize;
        for (i, bin) in hist.iter_mut().enumerate() {
            *bin += share;
            if i < remainder {
                *bin += 1;
            }
        }
    }

    let mut lut = [0u8; 256];
    let mut cdf = 0u32;
    let scale = 255.0 / area as f32;
    for (i, &count) in hist.iter().enumerate() {
        cdf += count;
        lut[i] = (cdf as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}
