//! Planar homography estimation via DLT with Hartley normalization.
//!
//! Used for camera ↔ paper rectification and camera → projector alignment.
//! Both are exact four-corner correspondences, but the solver accepts any
//! number ≥ 4 in a least-squares sense.

use nalgebra::{DMatrix, Matrix3, Vector3};

// ── Error type ───────────────────────────────────────────────────────────

/// Errors raised while estimating or inverting a homography.
#[derive(Debug, Clone, PartialEq)]
pub enum HomographyError {
    /// Fewer correspondences than the solver needs.
    TooFewPoints {
        /// Required minimum number of correspondences.
        needed: usize,
        /// Number of correspondences provided.
        got: usize,
    },
    /// Degenerate configuration or mismatched inputs.
    NumericalFailure(String),
    /// The matrix has no inverse.
    Singular,
}

impl std::fmt::Display for HomographyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewPoints { needed, got } => {
                write!(f, "too few points: need {}, got {}", needed, got)
            }
            Self::NumericalFailure(msg) => write!(f, "numerical failure: {}", msg),
            Self::Singular => write!(f, "homography is singular"),
        }
    }
}

impl std::error::Error for HomographyError {}

// ── Projection ───────────────────────────────────────────────────────────

/// Project a 2D point through a 3×3 homography: H * [x, y, 1]^T → [u, v].
///
/// Points mapped to the line at infinity come back as NaN.
pub fn project(h: &Matrix3<f64>, p: [f64; 2]) -> [f64; 2] {
    let q = h * Vector3::new(p[0], p[1], 1.0);
    if q[2].abs() < 1e-15 {
        return [f64::NAN, f64::NAN];
    }
    [q[0] / q[2], q[1] / q[2]]
}

/// Invert a homography and rescale so that `H[2][2] = 1` where possible.
pub fn invert(h: &Matrix3<f64>) -> Result<Matrix3<f64>, HomographyError> {
    let inv = h.try_inverse().ok_or(HomographyError::Singular)?;
    Ok(normalize_scale(inv))
}

fn normalize_scale(h: Matrix3<f64>) -> Matrix3<f64> {
    let scale = h[(2, 2)];
    if scale.abs() < 1e-15 {
        h
    } else {
        h / scale
    }
}

/// Row-major array form, for serialization.
pub fn matrix3_to_array(m: &Matrix3<f64>) -> [[f64; 3]; 3] {
    [
        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
        [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
    ]
}

/// Destination corners (0,0), (w,0), (w,h), (0,h), in that order.
pub fn rect_corners(width: f64, height: f64) -> [[f64; 2]; 4] {
    [[0.0, 0.0], [width, 0.0], [width, height], [0.0, height]]
}

// ── Hartley normalization ────────────────────────────────────────────────

/// Similarity that moves the centroid of `pts` to the origin and makes the
/// mean distance from it √2, together with the transformed points.
fn hartley(pts: &[[f64; 2]]) -> (Matrix3<f64>, Vec<[f64; 2]>) {
    let inv_n = 1.0 / pts.len() as f64;
    let (sum_x, sum_y) = pts
        .iter()
        .fold((0.0, 0.0), |(ax, ay), p| (ax + p[0], ay + p[1]));
    let c = [sum_x * inv_n, sum_y * inv_n];
    let spread = inv_n
        * pts
            .iter()
            .map(|p| (p[0] - c[0]).hypot(p[1] - c[1]))
            .sum::<f64>();
    let s = if spread > 1e-15 {
        std::f64::consts::SQRT_2 / spread
    } else {
        1.0
    };

    #[rustfmt::skip]
    let t = Matrix3::new(
        s,   0.0, -s * c[0],
        0.0, s,   -s * c[1],
        0.0, 0.0, 1.0,
    );
    let moved = pts.iter().map(|p| [s * (p[0] - c[0]), s * (p[1] - c[1])]).collect();
    (t, moved)
}

// ── DLT ──────────────────────────────────────────────────────────────────

/// Estimate H such that `dst ≈ project(H, src)` from ≥4 correspondences.
///
/// Each pair contributes two rows of the DLT system `A h = 0`; `h` is the
/// eigenvector of `AᵀA` with the smallest eigenvalue.
pub fn estimate_homography_dlt(
    src: &[[f64; 2]],
    dst: &[[f64; 2]],
) -> Result<Matrix3<f64>, HomographyError> {
    let got = src.len().min(dst.len());
    if got < 4 {
        return Err(HomographyError::TooFewPoints { needed: 4, got });
    }
    if src.len() != dst.len() {
        return Err(HomographyError::NumericalFailure(format!(
            "{} source points but {} destination points",
            src.len(),
            dst.len()
        )));
    }

    let (t_src, src_h) = hartley(src);
    let (t_dst, dst_h) = hartley(dst);

    let mut a = DMatrix::<f64>::zeros(2 * got, 9);
    for (i, (&[x, y], &[u, v])) in src_h.iter().zip(dst_h.iter()).enumerate() {
        a.row_mut(2 * i)
            .copy_from_slice(&[0.0, 0.0, 0.0, -x, -y, -1.0, v * x, v * y, v]);
        a.row_mut(2 * i + 1)
            .copy_from_slice(&[x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y, -u]);
    }

    let eig = nalgebra::SymmetricEigen::new(a.transpose() * &a);
    let smallest = eig
        .eigenvalues
        .iter()
        .enumerate()
        .min_by(|(_, l), (_, r)| l.abs().total_cmp(&r.abs()))
        .map(|(i, _)| i)
        .ok_or_else(|| HomographyError::NumericalFailure("empty eigen decomposition".into()))?;
    let h_vec: Vec<f64> = eig.eigenvectors.column(smallest).iter().copied().collect();
    let h_norm = Matrix3::from_row_slice(&h_vec);

    let t_dst_inv = t_dst
        .try_inverse()
        .ok_or_else(|| HomographyError::NumericalFailure("degenerate destination points".into()))?;
    let h = t_dst_inv * h_norm * t_src;
    if h.iter().any(|v| !v.is_finite()) {
        return Err(HomographyError::NumericalFailure("non-finite homography".into()));
    }
    Ok(normalize_scale(h))
}
