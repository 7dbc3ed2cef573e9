//! External contour envelopes of a binary image.

use image::GrayImage;
use image::imageops;
use imageproc::contours::{BorderType, find_contours};

use crate::processors::PixelRect;

/// Bounding boxes of the outermost contours of `binary`.
///
/// Holes and anything nested inside another component are skipped, so a
/// digit like `8` yields one box. Non-zero pixels are foreground.
pub fn external_boxes(binary: &GrayImage) -> Vec<PixelRect> {
    // Border following never starts an outer border in column 0, so the
    // image is traced inside a one-pixel background frame.
    let mut framed = GrayImage::new(binary.width() + 2, binary.height() + 2);
    imageops::replace(&mut framed, binary, 1, 1);

    find_contours::<u32>(&framed)
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .filter_map(PixelRect::from_contour)
        .map(|b| PixelRect::new(b.x - 1, b.y - 1, b.width, b.height))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn draw_rect(img: &mut GrayImage, rect: PixelRect) {
        for y in rect.y..rect.bottom() {
            for x in rect.x..rect.right() {
                img.put_pixel(x, y, Luma([255]));
            }
        }
    }

    #[test]
    fn test_external_boxes_finds_each_component() {
        let mut img = GrayImage::new(40, 20);
        draw_rect(&mut img, PixelRect::new(2, 3, 5, 10));
        draw_rect(&mut img, PixelRect::new(20, 5, 8, 4));
        let mut boxes = external_boxes(&img);
        boxes.sort_by_key(|b| b.x);
        assert_eq!(
            boxes,
            vec![PixelRect::new(2, 3, 5, 10), PixelRect::new(20, 5, 8, 4)]
        );
    }

    #[test]
    fn test_external_boxes_ignores_holes() {
        let mut img = GrayImage::new(20, 20);
        draw_rect(&mut img, PixelRect::new(2, 2, 12, 12));
        // Punch a hole.
        for y in 5..10 {
            for x in 5..10 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        let boxes = external_boxes(&img);
        assert_eq!(boxes, vec![PixelRect::new(2, 2, 12, 12)]);
    }

    #[test]
    fn test_components_touching_the_border_are_found() {
        let mut img = GrayImage::new(30, 12);
        draw_rect(&mut img, PixelRect::new(0, 4, 30, 3));
        draw_rect(&mut img, PixelRect::new(0, 0, 2, 2));
        draw_rect(&mut img, PixelRect::new(26, 9, 4, 3));
        let mut boxes = external_boxes(&img);
        boxes.sort_by_key(|b| (b.y, b.x));
        assert_eq!(
            boxes,
            vec![
                PixelRect::new(0, 0, 2, 2),
                PixelRect::new(0, 4, 30, 3),
                PixelRect::new(26, 9, 4, 3),
            ]
        );
    }

    #[test]
    fn test_empty_image_has_no_boxes() {
        assert!(external_boxes(&GrayImage::new(10, 10)).is_empty());
    }
}
