//! Morphology with a one-row horizontal structuring element.
//!
//! Used to keep only long horizontal strokes (ruling lines) of a binary image.
//! Pixels outside the image never constrain the result.

use image::{GrayImage, Luma};

/// Erosion with a `1 x width` element anchored at its center.
pub fn erode_horizontal(binary: &GrayImage, width: u32) -> GrayImage {
    sweep(binary, width, |count, span| count == span)
}

/// Dilation with a `1 x width` element anchored at its center.
pub fn dilate_horizontal(binary: &GrayImage, width: u32) -> GrayImage {
    sweep(binary, width, |count, _| count > 0)
}

/// Opening (erosion then dilation) with a `1 x width` element.
pub fn open_horizontal(binary: &GrayImage, width: u32) -> GrayImage {
    dilate_horizontal(&erode_horizontal(binary, width), width)
}

fn sweep(binary: &GrayImage, width: u32, keep: impl Fn(u32, u32) -> bool) -> GrayImage {
    let (w, h) = binary.dimensions();
    let width = width.max(1);
    let left = width / 2;
    let right = width - 1 - left;
    let mut out = GrayImage::new(w, h);
    let mut prefix = vec![0u32; w as usize + 1];

    for y in 0..h {
        for x in 0..w {
            let on = u32::from(binary.get_pixel(x, y)[0] > 0);
            prefix[x as usize + 1] = prefix[x as usize] + on;
        }
        for x in 0..w {
            let lo = x.saturating_sub(left);
            let hi = (x + right).min(w - 1);
            let count = prefix[hi as usize + 1] - prefix[lo as usize];
            if keep(count, hi - lo + 1) {
                out.put_pixel(x, y, Luma([255]));
            }
        }
    }
    out
}
