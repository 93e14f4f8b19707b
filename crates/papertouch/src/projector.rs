//! Camera → projector alignment from four operator-clicked points.
//!
//! The clicked points are the camera-space images of the projector's
//! corners, in the order (0,0), (W,0), (W,H), (0,H).

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::homography::{estimate_homography_dlt, project, rect_corners, HomographyError};

#[derive(Debug, Clone, PartialEq)]
pub enum AlignmentError {
    /// Fewer than four points have been clicked.
    Incomplete { got: usize },
    Homography(HomographyError),
}

impl std::fmt::Display for AlignmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Incomplete { got } => {
                write!(f, "projector alignment needs 4 points, got {}", got)
            }
            Self::Homography(e) => write!(f, "projector alignment: {}", e),
        }
    }
}

impl std::error::Error for AlignmentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Homography(e) => Some(e),
            Self::Incomplete { .. } => None,
        }
    }
}

impl From<HomographyError> for AlignmentError {
    fn from(e: HomographyError) -> Self {
        Self::Homography(e)
    }
}

/// Clicked points plus the resulting camera → projector homography.
///
/// Only the points and projector size are serialized; call
/// [`compute`](Self::compute) after loading to restore the matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectorAlignment {
    pub width: u32,
    pub height: u32,
    points: Vec<[f64; 2]>,
    #[serde(skip, default = "Matrix3::identity")]
    matrix: Matrix3<f64>,
}

impl Default for ProjectorAlignment {
    fn default() -> Self {
        Self::new(848, 480)
    }
}

impl ProjectorAlignment {
    pub const POINTS: usize = 4;

    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            points: Vec::with_capacity(Self::POINTS),
            matrix: Matrix3::identity(),
        }
    }

    /// Record the next corner. Returns `false` once four are recorded.
    pub fn add_point(&mut self, p: [f64; 2]) -> bool {
        if self.points.len() >= Self::POINTS {
            return false;
        }
        self.points.push(p);
        true
    }

    pub fn points(&self) -> &[[f64; 2]] {
        &self.points
    }

    pub fn is_complete(&self) -> bool {
        self.points.len() == Self::POINTS
    }

    /// Drop the points and restore the identity mapping.
    pub fn reset(&mut self) {
        self.points.clear();
        self.matrix = Matrix3::identity();
    }

    pub fn compute(&mut self) -> Result<&Matrix3<f64>, AlignmentError> {
        if !self.is_complete() {
            return Err(AlignmentError::Incomplete {
                got: self.points.len(),
            });
        }
        let dst = rect_corners(self.width as f64, self.height as f64);
        self.matrix = estimate_homography_dlt(&self.points, &dst)?;
        tracing::info!(width = self.width, height = self.height, "projector alignment computed");
        Ok(&self.matrix)
    }

    /// Camera → projector homography (identity until computed).
    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    /// Map a camera-space point into projector pixels.
    pub fn map(&self, p: [f64; 2]) -> [f64; 2] {
        project(&self.matrix, p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const CLICKS: [[f64; 2]; 4] = [[102.0, 61.0], [541.0, 74.0], [530.0, 402.0], [95.0, 390.0]];

    fn aligned() -> ProjectorAlignment {
        let mut a = ProjectorAlignment::default();
        for p in CLICKS {
            assert!(a.add_point(p));
        }
        a
    }

    #[test]
    fn fifth_point_is_ignored() {
        let mut a = aligned();
        assert!(!a.add_point([0.0, 0.0]));
        assert_eq!(a.points(), &CLICKS);
    }

    #[test]
    fn compute_requires_four_points() {
        let mut a = ProjectorAlignment::default();
        a.add_point([1.0, 2.0]);
        a.add_point([3.0, 4.0]);
        a.add_point([5.0, 9.0]);
        assert_eq!(a.compute().err(), Some(AlignmentError::Incomplete { got: 3 }));
    }

    #[test]
    fn clicked_points_map_to_projector_corners() {
        let mut a = aligned();
        a.compute().expect("alignment");
        for (p, q) in CLICKS.iter().zip(rect_corners(848.0, 480.0).iter()) {
            let m = a.map(*p);
            assert_abs_diff_eq!(m[0], q[0], epsilon = 1e-6);
            assert_abs_diff_eq!(m[1], q[1], epsilon = 1e-6);
        }
    }

    #[test]
    fn reset_restores_identity() {
        let mut a = aligned();
        a.compute().expect("alignment");
        a.reset();
        assert!(a.points().is_empty());
        assert_eq!(a.matrix(), &Matrix3::identity());
        assert_eq!(a.map([3.0, 4.0]), [3.0, 4.0]);
    }

    #[test]
    fn points_survive_json_and_recompute() {
        let mut a = aligned();
        a.compute().expect("alignment");
        let json = serde_json::to_string(&a).expect("serialize");
        let mut back: ProjectorAlignment = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back.points(), a.points());
        assert_eq!(back.matrix(), &Matrix3::identity());
        back.compute().expect("alignment");
        let p = back.map([300.0, 200.0]);
        let q = a.map([300.0, 200.0]);
        assert_abs_diff_eq!(p[0], q[0], epsilon = 1e-9);
        assert_abs_diff_eq!(p[1], q[1], epsilon = 1e-9);
    }
}
