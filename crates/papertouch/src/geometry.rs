//! Polygon math shared by every stage of the pipeline.
//!
//! Polygons are closed vertex loops stored as `[x, y]` pairs; insertion
//! order is winding order. All routines work in whatever frame the caller
//! hands them (camera pixels or rectified paper pixels).

use serde::{Deserialize, Serialize};

/// Default angular tolerance (degrees) for [`is_rectangle`].
pub const DEFAULT_RECT_ANGLE_TOL_DEG: f64 = 2.5;

/// Areas below this magnitude are treated as degenerate.
const DEGENERATE_AREA: f64 = 1e-9;

#[inline]
pub(crate) fn sub(a: [f64; 2], b: [f64; 2]) -> [f64; 2] {
    [a[0] - b[0], a[1] - b[1]]
}

#[inline]
pub(crate) fn dot(a: [f64; 2], b: [f64; 2]) -> f64 {
    a[0] * b[0] + a[1] * b[1]
}

/// Squared Euclidean distance between two points.
#[inline]
pub fn dist_sq(a: [f64; 2], b: [f64; 2]) -> f64 {
    let d = sub(a, b);
    dot(d, d)
}

// ── Area / centroid ──────────────────────────────────────────────────────

/// Signed polygon area (shoelace formula).
///
/// The sign encodes the winding: reversing the vertex order negates it.
/// Fewer than two vertices yield `0.0`.
pub fn polygon_area(poly: &[[f64; 2]]) -> f64 {
    let n = poly.len();
    if n < 2 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..n {
        let p = poly[i];
        let q = poly[(i + 1) % n];
        acc += p[0] * q[1] - q[0] * p[1];
    }
    0.5 * acc
}

/// Area-weighted centroid of a simple polygon.
///
/// Returns `None` for fewer than three vertices or a (near-)zero area,
/// where the vertex formula would divide by zero.
pub fn polygon_centroid(poly: &[[f64; 2]]) -> Option<[f64; 2]> {
    let n = poly.len();
    if n < 3 {
        return None;
    }
    let area = polygon_area(poly);
    if !area.is_finite() || area.abs() < DEGENERATE_AREA {
        return None;
    }
    let mut cx = 0.0;
    let mut cy = 0.0;
    for i in 0..n {
        let p = poly[i];
        let q = poly[(i + 1) % n];
        let cross = p[0] * q[1] - q[0] * p[1];
        cx += (p[0] + q[0]) * cross;
        cy += (p[1] + q[1]) * cross;
    }
    Some([cx / (6.0 * area), cy / (6.0 * area)])
}

// ── Containment ──────────────────────────────────────────────────────────

/// Ray-casting parity test against the horizontal line through `p`.
///
/// Edges with both endpoints at the same `y` are skipped. The crossing test
/// is `p.x <= x_intersection`, so a point exactly on a right-hand vertical
/// edge counts as inside while one on a left-hand vertical edge does not.
/// An empty polygon contains nothing.
pub fn point_in_polygon(poly: &[[f64; 2]], p: [f64; 2]) -> bool {
    let n = poly.len();
    if n == 0 {
        return false;
    }
    let [x, y] = p;
    let mut crossings = 0usize;
    let mut p1 = poly[0];
    for i in 1..=n {
        let p2 = poly[i % n];
        if y > p1[1].min(p2[1]) && y <= p1[1].max(p2[1]) && x <= p1[0].max(p2[0]) && p1[1] != p2[1]
        {
            let x_inter = (y - p1[1]) * (p2[0] - p1[0]) / (p2[1] - p1[1]) + p1[0];
            if p1[0] == p2[0] || x <= x_inter {
                crossings += 1;
            }
        }
        p1 = p2;
    }
    crossings % 2 == 1
}

// ── Rectangle test / quad canonicalization ────────────────────────────────

fn unit(v: [f64; 2]) -> [f64; 2] {
    let len = dot(v, v).sqrt();
    if len > 0.0 {
        [v[0] / len, v[1] / len]
    } else {
        [0.0, 0.0]
    }
}

/// Whether a 4-vertex loop has every pair of adjacent edges within
/// `angle_tol_deg` of perpendicular.
pub fn is_rectangle(poly: &[[f64; 2]], angle_tol_deg: f64) -> bool {
    if poly.len() != 4 {
        return false;
    }
    let max_dot = ((90.0 - angle_tol_deg) * std::f64::consts::PI / 180.0).cos();
    let edges: Vec<[f64; 2]> = (0..4).map(|i| unit(sub(poly[(i + 1) % 4], poly[i]))).collect();
    (0..4).all(|i| dot(edges[i], edges[(i + 1) % 4]).abs() < max_dot)
}

/// Reorder four corners into clockwise winding (positive cross product in
/// image coordinates) starting at a deterministic corner.
///
/// After fixing the winding, the loop is rotated so that edge 0→1 is the
/// longer of the first two sides and points toward +x. The same physical
/// rectangle therefore produces the same corner order regardless of which
/// corner or direction the input started with.
pub fn canonicalize_quad(mut pts: [[f64; 2]; 4]) -> [[f64; 2]; 4] {
    let mut e01 = sub(pts[1], pts[0]);
    let mut e12 = sub(pts[2], pts[1]);
    let cross_z = e01[0] * e12[1] - e01[1] * e12[0];
    if cross_z < 0.0 {
        pts.reverse();
        e01 = sub(pts[1], pts[0]);
        e12 = sub(pts[2], pts[1]);
    }

    let mut rotate = 0usize;
    let mut width_edge = e01;
    if dot(e01, e01) < dot(e12, e12) {
        rotate += 1;
        width_edge = e12;
    }
    if width_edge[0] < 0.0 {
        rotate += 2;
    }
    pts.rotate_left(rotate % 4);
    pts
}

// ── Smoothing ────────────────────────────────────────────────────────────

/// Circular moving average over `2k + 1` vertices centered on each vertex.
pub fn smooth_polygon(poly: &[[f64; 2]], k: usize) -> Vec<[f64; 2]> {
    let n = poly.len();
    if n == 0 {
        return Vec::new();
    }
    let window = 2 * k + 1;
    let n_i = n as isize;
    let k_i = k as isize;
    (0..n_i)
        .map(|i| {
            let mut acc = [0.0, 0.0];
            for j in (i - k_i)..=(i + k_i) {
                let p = poly[j.rem_euclid(n_i) as usize];
                acc[0] += p[0];
                acc[1] += p[1];
            }
            [acc[0] / window as f64, acc[1] / window as f64]
        })
        .collect()
}

// ── Quad ─────────────────────────────────────────────────────────────────

/// A validated paper boundary: four corners in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad {
    corners: [[f64; 2]; 4],
}

impl Quad {
    /// Build from arbitrary corner order; the corners are canonicalized.
    pub fn new(corners: [[f64; 2]; 4]) -> Self {
        Self {
            corners: canonicalize_quad(corners),
        }
    }

    /// Build from a 4-point slice, or `None` for any other length.
    pub fn from_slice(points: &[[f64; 2]]) -> Option<Self> {
        let corners: [[f64; 2]; 4] = points.try_into().ok()?;
        Some(Self::new(corners))
    }

    /// Corners in canonical (clockwise, deterministic start) order.
    pub fn corners(&self) -> &[[f64; 2]; 4] {
        &self.corners
    }

    /// Unsigned area.
    pub fn area(&self) -> f64 {
        polygon_area(&self.corners).abs()
    }

    pub fn contains(&self, p: [f64; 2]) -> bool {
        point_in_polygon(&self.corners, p)
    }
}
