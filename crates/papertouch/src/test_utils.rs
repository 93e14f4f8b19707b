//! Shared synthetic-image helpers for unit tests.

use image::{GrayImage, Luma};

use crate::geometry::point_in_polygon;
use crate::shape::RotatedRect;

const ON: Luma<u8> = Luma([255]);

/// Set every pixel whose center lies within `radius` of `center`.
pub(crate) fn fill_disc(img: &mut GrayImage, center: [f64; 2], radius: f64) {
    let (w, h) = img.dimensions();
    let r2 = radius * radius;
    for y in 0..h {
        for x in 0..w {
            let dx = x as f64 - center[0];
            let dy = y as f64 - center[1];
            if dx * dx + dy * dy <= r2 {
                img.put_pixel(x, y, ON);
            }
        }
    }
}

/// Set every pixel whose center lies inside the oriented rectangle.
pub(crate) fn fill_rotated_rect(img: &mut GrayImage, rect: &RotatedRect) {
    let (w, h) = img.dimensions();
    for y in 0..h {
        for x in 0..w {
            if rect.contains([x as f64, y as f64]) {
                img.put_pixel(x, y, ON);
            }
        }
    }
}

/// Set every pixel whose center lies inside `poly`.
pub(crate) fn fill_polygon(img: &mut GrayImage, poly: &[[f64; 2]]) {
    let (w, h) = img.dimensions();
    for y in 0..h {
        for x in 0..w {
            if point_in_polygon(poly, [x as f64 + 0.01, y as f64 + 0.01]) {
                img.put_pixel(x, y, ON);
            }
        }
    }
}

/// A palm disc with one raised index finger pointing toward −y.
///
/// Returns the image and the nominal fingertip (middle of the finger's top
/// edge).
pub(crate) fn draw_hand(w: u32, h: u32, palm: [f64; 2], palm_radius: f64) -> (GrayImage, [f64; 2]) {
    let mut img = GrayImage::new(w, h);
    fill_disc(&mut img, palm, palm_radius);
    let finger = RotatedRect {
        center: [palm[0], palm[1] - palm_radius - 20.0],
        width: 20.0,
        height: 2.0 * palm_radius + 40.0,
        angle_deg: 0.0,
    };
    fill_rotated_rect(&mut img, &finger);
    let tip = [palm[0], finger.center[1] - 0.5 * finger.height];
    (img, tip)
}

/// Paper-like bright quad on a dark background.
pub(crate) fn draw_sheet(w: u32, h: u32, corners: &[[f64; 2]; 4]) -> GrayImage {
    let mut img = GrayImage::new(w, h);
    fill_polygon(&mut img, corners);
    img
}
