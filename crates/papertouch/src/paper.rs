//! Paper boundary detection and camera ↔ paper perspective mapping.
//!
//! The detector is sticky: a frame without an acceptable quad leaves the
//! previously accepted boundary (and its cached transform) untouched.

use image::GrayImage;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::geometry::{is_rectangle, polygon_area, Quad, DEFAULT_RECT_ANGLE_TOL_DEG};
use crate::homography::{
    estimate_homography_dlt, invert, project, rect_corners, HomographyError,
};
use crate::preprocess::{binarize, rectify};
use crate::shape::{find_contours, ContourAreaLimits};

// ── Config / errors ──────────────────────────────────────────────────────

/// Paper detector parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperDetectorConfig {
    /// Gray level above which a pixel counts as paper.
    pub threshold: u8,
    pub contour_limits: ContourAreaLimits,
    /// Allowed deviation of each corner from 90°, in degrees.
    pub rect_angle_tol_deg: f64,
}

impl Default for PaperDetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 120,
            contour_limits: ContourAreaLimits::new(50.0, 200.0),
            rect_angle_tol_deg: DEFAULT_RECT_ANGLE_TOL_DEG,
        }
    }
}

/// Errors from the paper detector's mapping operations.
#[derive(Debug, Clone, PartialEq)]
pub enum PaperError {
    /// No boundary has ever been accepted.
    NoPaper,
    /// `compute_transform` has not run since the boundary last changed.
    TransformNotComputed,
    Homography(HomographyError),
}

impl std::fmt::Display for PaperError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPaper => write!(f, "no paper boundary has been detected"),
            Self::TransformNotComputed => write!(f, "paper transform has not been computed"),
            Self::Homography(e) => write!(f, "paper transform: {}", e),
        }
    }
}

impl std::error::Error for PaperError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Homography(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HomographyError> for PaperError {
    fn from(e: HomographyError) -> Self {
        Self::Homography(e)
    }
}

// ── Transform ────────────────────────────────────────────────────────────

/// Direction for [`PaperDetector::map_point`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapDirection {
    CameraToPaper,
    PaperToCamera,
}

/// Camera quad → `width × height` rectangle, and back.
#[derive(Debug, Clone, PartialEq)]
pub struct PaperTransform {
    pub forward: Matrix3<f64>,
    pub inverse: Matrix3<f64>,
    pub width: u32,
    pub height: u32,
}

impl PaperTransform {
    pub fn map(&self, p: [f64; 2], direction: MapDirection) -> [f64; 2] {
        match direction {
            MapDirection::CameraToPaper => project(&self.forward, p),
            MapDirection::PaperToCamera => project(&self.inverse, p),
        }
    }
}

// ── Detector ─────────────────────────────────────────────────────────────

/// Finds the paper sheet and owns its rectification transform.
#[derive(Debug, Clone, Default)]
pub struct PaperDetector {
    config: PaperDetectorConfig,
    quad: Option<Quad>,
    source: Option<GrayImage>,
    transform: Option<PaperTransform>,
}

impl PaperDetector {
    pub fn new(config: PaperDetectorConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &PaperDetectorConfig {
        &self.config
    }

    /// Look for the paper in a binary image.
    ///
    /// Every contour within the area limits is reduced to a quad; the one
    /// with the largest area is accepted if it passes the rectangle test.
    /// Returns whether a new boundary was accepted.
    pub fn detect(&mut self, binary: &GrayImage) -> bool {
        let contours = find_contours(binary, &self.config.contour_limits);
        let Some(best) = contours
            .iter()
            .map(|c| c.fit_quad())
            .max_by(|a, b| polygon_area(a).abs().total_cmp(&polygon_area(b).abs()))
        else {
            tracing::debug!("no paper candidates");
            return false;
        };

        if !is_rectangle(&best, self.config.rect_angle_tol_deg) {
            tracing::debug!(vertices = best.len(), "largest candidate is not a rectangle");
            return false;
        }
        let Some(quad) = Quad::from_slice(&best) else {
            return false;
        };
        if self.quad.as_ref() != Some(&quad) {
            self.transform = None;
        }
        tracing::info!(area = quad.area(), corners = ?quad.corners(), "paper accepted");
        self.quad = Some(quad);
        true
    }

    /// Binarize a gray frame, run [`detect`](Self::detect), and keep the frame
    /// as the rectification source when a boundary is accepted.
    pub fn detect_frame(&mut self, gray: &GrayImage) -> bool {
        let accepted = self.detect(&binarize(gray, self.config.threshold));
        if accepted {
            self.source = Some(gray.clone());
        }
        accepted
    }

    /// Solve (or reuse) the homography from the current quad onto the
    /// corners (0,0), (w,0), (w,h), (0,h).
    pub fn compute_transform(
        &mut self,
        width: u32,
        height: u32,
    ) -> Result<&PaperTransform, PaperError> {
        let quad = self.quad.ok_or(PaperError::NoPaper)?;
        let cached = self
            .transform
            .as_ref()
            .is_some_and(|t| t.width == width && t.height == height);
        if !cached {
            let dst = rect_corners(width as f64, height as f64);
            let forward = estimate_homography_dlt(quad.corners(), &dst)?;
            let inverse = invert(&forward)?;
            tracing::debug!(width, height, "paper transform computed");
            self.transform = Some(PaperTransform {
                forward,
                inverse,
                width,
                height,
            });
        }
        self.transform.as_ref().ok_or(PaperError::TransformNotComputed)
    }

    /// Cached transform, if computed for the current quad.
    pub fn transform(&self) -> Option<&PaperTransform> {
        self.transform.as_ref()
    }

    /// Map one point through the cached transform.
    pub fn map_point(&self, p: [f64; 2], direction: MapDirection) -> Result<[f64; 2], PaperError> {
        let t = self.transform.as_ref().ok_or(if self.quad.is_some() {
            PaperError::TransformNotComputed
        } else {
            PaperError::NoPaper
        })?;
        Ok(t.map(p, direction))
    }

    pub fn quad(&self) -> Option<&Quad> {
        self.quad.as_ref()
    }

    /// The accepted boundary as a polygon; empty before the first detection.
    pub fn paper_polygon(&self) -> Vec<[f64; 2]> {
        self.quad.map(|q| q.corners().to_vec()).unwrap_or_default()
    }

    pub fn has_paper(&self) -> bool {
        self.quad.is_some()
    }

    /// Rectify the frame stored by [`detect_frame`](Self::detect_frame).
    pub fn rectify_source(&mut self, width: u32, height: u32) -> Result<GrayImage, PaperError> {
        let forward = self.compute_transform(width, height)?.forward;
        let source = self.source.as_ref().ok_or(PaperError::NoPaper)?;
        Ok(rectify(source, &forward, width, height)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::dist_sq;
    use crate::shape::RotatedRect;
    use crate::test_utils::draw_sheet;
    use approx::assert_abs_diff_eq;
    use image::Luma;

    fn sheet_rect() -> RotatedRect {
        RotatedRect {
            center: [160.0, 120.0],
            width: 200.0,
            height: 140.0,
            angle_deg: 10.0,
        }
    }

    fn assert_corners_near(found: &[[f64; 2]], expected: &[[f64; 2]; 4], tol: f64) {
        for e in expected {
            let nearest = found
                .iter()
                .map(|p| dist_sq(*p, *e).sqrt())
                .fold(f64::INFINITY, f64::min);
            assert!(nearest < tol, "corner {:?} missed by {}", e, nearest);
        }
    }

    #[test]
    fn detects_rotated_sheet() {
        let rect = sheet_rect();
        let mut det = PaperDetector::default();
        assert!(det.detect(&draw_sheet(320, 240, &rect.corners())));
        let quad = det.quad().expect("quad");
        assert_corners_near(quad.corners(), &rect.corners(), 3.0);
        // Canonical order: clockwise in image coordinates, width edge first.
        let c = quad.corners();
        let e01 = [c[1][0] - c[0][0], c[1][1] - c[0][1]];
        assert!(e01[0] > 0.0);
        assert!(polygon_area(c) > 0.0);
    }

    #[test]
    fn transform_maps_corners_to_output_rectangle() {
        let rect = sheet_rect();
        let mut det = PaperDetector::default();
        assert!(det.detect(&draw_sheet(320, 240, &rect.corners())));
        let corners = *det.quad().expect("quad").corners();
        det.compute_transform(518, 400).expect("transform");

        let dst = rect_corners(518.0, 400.0);
        for (src, d) in corners.iter().zip(dst.iter()) {
            let p = det.map_point(*src, MapDirection::CameraToPaper).expect("mapped");
            assert_abs_diff_eq!(p[0], d[0], epsilon = 1e-6);
            assert_abs_diff_eq!(p[1], d[1], epsilon = 1e-6);
        }

        let cam = [170.0, 110.0];
        let paper = det.map_point(cam, MapDirection::CameraToPaper).expect("fwd");
        let back = det.map_point(paper, MapDirection::PaperToCamera).expect("inv");
        assert_abs_diff_eq!(back[0], cam[0], epsilon = 1e-6);
        assert_abs_diff_eq!(back[1], cam[1], epsilon = 1e-6);
    }

    #[test]
    fn failed_detection_keeps_previous_boundary() {
        let rect = sheet_rect();
        let mut det = PaperDetector::default();
        assert!(det.detect(&draw_sheet(320, 240, &rect.corners())));
        det.compute_transform(100, 80).expect("transform");
        let before = det.paper_polygon();

        assert!(!det.detect(&GrayImage::new(320, 240)));
        assert!(det.has_paper());
        assert_eq!(det.paper_polygon(), before);
        assert!(det.transform().is_some());
    }

    #[test]
    fn skewed_quad_is_rejected() {
        let trapezoid = [[60.0, 60.0], [260.0, 60.0], [220.0, 200.0], [100.0, 200.0]];
        let mut det = PaperDetector::default();
        assert!(!det.detect(&draw_sheet(320, 240, &trapezoid)));
        assert!(!det.has_paper());
        assert!(det.paper_polygon().is_empty());
    }

    #[test]
    fn mapping_errors_distinguish_missing_paper_and_transform() {
        let mut det = PaperDetector::default();
        assert_eq!(
            det.compute_transform(10, 10).err(),
            Some(PaperError::NoPaper)
        );
        assert_eq!(
            det.map_point([0.0, 0.0], MapDirection::CameraToPaper),
            Err(PaperError::NoPaper)
        );
        assert!(det.detect(&draw_sheet(320, 240, &sheet_rect().corners())));
        assert_eq!(
            det.map_point([0.0, 0.0], MapDirection::CameraToPaper),
            Err(PaperError::TransformNotComputed)
        );
    }

    #[test]
    fn new_boundary_invalidates_cached_transform() {
        let mut det = PaperDetector::default();
        assert!(det.detect(&draw_sheet(320, 240, &sheet_rect().corners())));
        det.compute_transform(50, 40).expect("transform");

        let moved = RotatedRect {
            center: [150.0, 125.0],
            angle_deg: -5.0,
            ..sheet_rect()
        };
        assert!(det.detect(&draw_sheet(320, 240, &moved.corners())));
        assert!(det.transform().is_none());
    }

    #[test]
    fn rectified_source_shows_paper_content() {
        let rect = sheet_rect();
        let mut gray = GrayImage::from_pixel(320, 240, Luma([40]));
        let sheet = draw_sheet(320, 240, &rect.corners());
        for (x, y, p) in sheet.enumerate_pixels() {
            if p[0] > 0 {
                gray.put_pixel(x, y, Luma([210]));
            }
        }
        let mut det = PaperDetector::default();
        assert_eq!(
            det.rectify_source(10, 10).err(),
            Some(PaperError::NoPaper)
        );
        assert!(det.detect_frame(&gray));
        let out = det.rectify_source(100, 70).expect("rectified");
        assert_eq!(out.dimensions(), (100, 70));
        assert!(out.get_pixel(50, 35)[0] > 120);
        assert!(out.get_pixel(10, 60)[0] > 120);
    }
}
