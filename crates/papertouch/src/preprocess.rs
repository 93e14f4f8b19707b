//! Frame preparation: paper mask, control edge map and rectification.

use image::{GrayImage, Luma};
use imageproc::contrast::ThresholdType;
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::homography::HomographyError;
use crate::morphology::{self, MorphStep};

/// Edge-map parameters for the control classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeMapConfig {
    pub canny_low: f32,
    pub canny_high: f32,
    /// Joins broken pen strokes into closed outlines.
    pub morphology: Vec<MorphStep>,
    /// Band along the image border that is blanked (the paper's own edge).
    pub border_px: u32,
}

impl Default for EdgeMapConfig {
    fn default() -> Self {
        Self {
            canny_low: 160.0,
            canny_high: 180.0,
            morphology: vec![MorphStep::dilate(2, 7), MorphStep::erode(2, 5)],
            border_px: 8,
        }
    }
}

/// Pixels brighter than `threshold` become 255, the rest 0.
pub fn binarize(gray: &GrayImage, threshold: u8) -> GrayImage {
    imageproc::contrast::threshold(gray, threshold, ThresholdType::Binary)
}

/// Canny edges, closed with morphology, with the border band blanked.
pub fn edge_map(gray: &GrayImage, cfg: &EdgeMapConfig) -> GrayImage {
    let edges = imageproc::edges::canny(gray, cfg.canny_low, cfg.canny_high);
    let mut closed = morphology::apply(&edges, &cfg.morphology);
    clear_border(&mut closed, cfg.border_px);
    closed
}

/// Zero every pixel within `border` of an image edge. Coordinates are kept.
pub fn clear_border(image: &mut GrayImage, border: u32) {
    if border == 0 {
        return;
    }
    let (w, h) = image.dimensions();
    for (x, y, p) in image.enumerate_pixels_mut() {
        if x < border || y < border || x + border >= w || y + border >= h {
            *p = Luma([0]);
        }
    }
}

/// Warp `gray` through `homography` (source → output) into a
/// `width × height` image with bilinear sampling.
pub fn rectify(
    gray: &GrayImage,
    homography: &Matrix3<f64>,
    width: u32,
    height: u32,
) -> Result<GrayImage, HomographyError> {
    // `Projection` scales by the last entry and its own inverse check does
    // not catch NaN, so reject degenerate matrices here.
    let invertible = homography.iter().all(|v| v.is_finite())
        && homography[(2, 2)].abs() > f64::EPSILON
        && homography.try_inverse().is_some();
    if !invertible {
        return Err(HomographyError::Singular);
    }
    let m: [f32; 9] = std::array::from_fn(|i| homography[(i / 3, i % 3)] as f32);
    let projection = Projection::from_matrix(m).ok_or(HomographyError::Singular)?;
    let mut out = GrayImage::new(width, height);
    warp_into(gray, &projection, Interpolation::Bilinear, Luma([0]), &mut out);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{ControlType, ShapeClassifier};
    use crate::notify::EventLog;
    use crate::test_utils::{fill_disc, fill_polygon};

    #[test]
    fn binarize_is_strictly_greater_than_threshold() {
        let img = GrayImage::from_fn(4, 1, |x, _| Luma([[0, 120, 121, 255][x as usize]]));
        let bin = binarize(&img, 120);
        let row: Vec<u8> = bin.pixels().map(|p| p[0]).collect();
        assert_eq!(row, vec![0, 0, 255, 255]);
    }

    #[test]
    fn border_band_is_cleared_in_place() {
        let mut img = GrayImage::from_pixel(20, 12, Luma([255]));
        clear_border(&mut img, 3);
        assert_eq!(img.dimensions(), (20, 12));
        assert_eq!(img.get_pixel(2, 6)[0], 0);
        assert_eq!(img.get_pixel(17, 6)[0], 0);
        assert_eq!(img.get_pixel(10, 8)[0], 255);
        assert_eq!(img.get_pixel(10, 9)[0], 0);
        assert_eq!(img.pixels().filter(|p| p[0] > 0).count(), 14 * 6);
    }

    #[test]
    fn edge_map_outlines_drawn_square() {
        let mut gray = GrayImage::new(120, 120);
        let sq = [[30.0, 30.0], [90.0, 30.0], [90.0, 90.0], [30.0, 90.0]];
        fill_polygon(&mut gray, &sq);
        let edges = edge_map(&gray, &EdgeMapConfig::default());
        assert!(edges.pixels().any(|p| p[0] > 0));
        assert_eq!(edges.get_pixel(60, 60)[0], 0);
        assert_eq!(edges.get_pixel(3, 60)[0], 0);
        // Edges hug the square outline.
        for (x, y, p) in edges.enumerate_pixels() {
            if p[0] > 0 {
                assert!((20..=100).contains(&x) && (20..=100).contains(&y), "{x},{y}");
            }
        }
    }

    #[test]
    fn drawn_dot_classifies_as_button_through_edge_map() {
        let mut gray = GrayImage::new(160, 160);
        fill_disc(&mut gray, [80.0, 80.0], 35.0);
        let edges = edge_map(&gray, &EdgeMapConfig::default());
        let set = ShapeClassifier::default().classify(&edges, &mut EventLog::new());
        assert_eq!(set.count(ControlType::Button), 1);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn rectify_with_translation_shifts_content() {
        let gray = GrayImage::from_fn(60, 60, |x, y| Luma([(x + y) as u8]));
        let h = Matrix3::new(1.0, 0.0, -10.0, 0.0, 1.0, -20.0, 0.0, 0.0, 1.0);
        let out = rectify(&gray, &h, 30, 30).expect("invertible");
        assert_eq!(out.dimensions(), (30, 30));
        for &(x, y) in &[(0u32, 0u32), (5, 7), (20, 25)] {
            let expected = (x + 10 + y + 20) as i32;
            let got = out.get_pixel(x, y)[0] as i32;
            assert!((got - expected).abs() <= 1, "({x},{y}): {got} vs {expected}");
        }
    }

    #[test]
    fn rectify_rejects_singular_matrix() {
        let gray = GrayImage::new(10, 10);
        assert_eq!(
            rectify(&gray, &Matrix3::zeros(), 5, 5),
            Err(HomographyError::Singular)
        );
    }

    #[test]
    fn rectify_rejects_rank_deficient_matrix() {
        let gray = GrayImage::from_pixel(10, 10, Luma([200]));
        let h = Matrix3::new(1.0, 2.0, 3.0, 2.0, 4.0, 6.0, 0.0, 0.0, 1.0);
        assert_eq!(rectify(&gray, &h, 5, 5), Err(HomographyError::Singular));
    }
}
