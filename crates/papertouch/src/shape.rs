//! Contour extraction and shape fitting on binary images.
//!
//! Border following, convex hulls and Douglas–Peucker come from
//! `imageproc`; enclosing circles and minimum-area rectangles are fitted
//! here over the convex hull.

use image::GrayImage;
use imageproc::contours::BorderType;
use imageproc::point::Point;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::geometry::{dist_sq, dot, polygon_area, polygon_centroid, sub};

/// Seed for the shuffle in [`min_enclosing_circle`]; fixed so results are
/// reproducible frame to frame.
const CIRCLE_SHUFFLE_SEED: u64 = 0x5eed;

// ── Contours ─────────────────────────────────────────────────────────────

/// Accepted contour sizes, expressed as radii of equal-area discs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContourAreaLimits {
    /// Smallest accepted area is `π · min_radius_px²`.
    pub min_radius_px: f64,
    /// Largest accepted area is `π · max_radius_px²`.
    pub max_radius_px: f64,
}

impl ContourAreaLimits {
    pub const fn new(min_radius_px: f64, max_radius_px: f64) -> Self {
        Self {
            min_radius_px,
            max_radius_px,
        }
    }

    pub fn accepts(&self, area: f64) -> bool {
        let pi = std::f64::consts::PI;
        let min_area = pi * self.min_radius_px * self.min_radius_px;
        let max_area = pi * self.max_radius_px * self.max_radius_px;
        area >= min_area && area <= max_area
    }
}

/// An outer border traced in a binary image.
///
/// Transient: rebuilt on every pass, never carried across frames.
#[derive(Debug, Clone)]
pub struct Contour {
    /// Border pixels in tracing order.
    pub points: Vec<[f64; 2]>,
    /// Unsigned enclosed area of `points`.
    pub area: f64,
    pixels: Vec<Point<i32>>,
}

impl Contour {
    /// Build a contour from integer border pixels.
    pub fn from_pixels(pixels: Vec<Point<i32>>) -> Self {
        let points: Vec<[f64; 2]> = pixels.iter().map(|p| [p.x as f64, p.y as f64]).collect();
        let area = polygon_area(&points).abs();
        Self {
            points,
            area,
            pixels,
        }
    }

    /// Build a contour from arbitrary points; hull-based fits use the points
    /// rounded to the pixel grid.
    pub fn from_points(points: Vec<[f64; 2]>) -> Self {
        let pixels = points
            .iter()
            .map(|p| Point::new(p[0].round() as i32, p[1].round() as i32))
            .collect();
        let area = polygon_area(&points).abs();
        Self {
            points,
            area,
            pixels,
        }
    }

    /// Convex hull in cyclic order.
    pub fn convex_hull(&self) -> Vec<[f64; 2]> {
        if self.pixels.is_empty() {
            return Vec::new();
        }
        to_f64(&imageproc::geometry::convex_hull(self.pixels.as_slice()))
    }

    /// Smallest circle containing every contour point.
    pub fn enclosing_circle(&self) -> Option<Circle> {
        min_enclosing_circle(&self.convex_hull())
    }

    /// Minimum-area oriented bounding rectangle.
    pub fn min_area_rect(&self) -> Option<RotatedRect> {
        min_area_rect(&self.convex_hull())
    }

    /// Simplify the convex hull toward exactly four vertices.
    ///
    /// Douglas–Peucker epsilon is searched with an unbounded binary search
    /// (doubling until too few vertices remain, then bisecting). The result
    /// may still have a vertex count other than four when no epsilon in the
    /// search budget hits it.
    pub fn fit_quad(&self) -> Vec<[f64; 2]> {
        const TARGET: usize = 4;
        const MAX_ITERS: usize = 16;

        if self.pixels.is_empty() {
            return Vec::new();
        }
        let hull = imageproc::geometry::convex_hull(self.pixels.as_slice());
        let mut quad = hull.clone();
        if quad.len() > TARGET {
            let mut min_eps = 0.0f64;
            let mut max_eps = f64::INFINITY;
            let mut eps = 16.0f64;
            for _ in 0..MAX_ITERS {
                quad = imageproc::geometry::approximate_polygon_dp(&hull, eps, true);
                match quad.len().cmp(&TARGET) {
                    std::cmp::Ordering::Equal => break,
                    std::cmp::Ordering::Greater => {
                        min_eps = eps;
                        eps = if max_eps.is_infinite() {
                            eps * 2.0
                        } else {
                            0.5 * (min_eps + max_eps)
                        };
                    }
                    std::cmp::Ordering::Less => {
                        max_eps = eps;
                        eps = 0.5 * (min_eps + max_eps);
                    }
                }
            }
        }
        let quad = to_f64(&quad);
        if quad.len() == TARGET {
            snap_to_hull_extremes(&quad, &to_f64(&hull))
        } else {
            quad
        }
    }
}

/// Move each vertex of a simplified polygon to the hull point that lies
/// farthest along the direction from the polygon's centroid through it.
///
/// Douglas–Peucker may keep a point partway along an edge next to a clipped
/// corner; the support point in the corner's direction is the corner itself.
fn snap_to_hull_extremes(poly: &[[f64; 2]], hull: &[[f64; 2]]) -> Vec<[f64; 2]> {
    let Some(center) = polygon_centroid(poly) else {
        return poly.to_vec();
    };
    let snapped: Vec<[f64; 2]> = poly
        .iter()
        .map(|&v| {
            let dir = sub(v, center);
            hull.iter()
                .copied()
                .max_by(|&a, &b| dot(a, dir).total_cmp(&dot(b, dir)))
                .unwrap_or(v)
        })
        .collect();
    let distinct = snapped
        .iter()
        .enumerate()
        .all(|(i, a)| snapped[i + 1..].iter().all(|b| a != b));
    if distinct {
        snapped
    } else {
        poly.to_vec()
    }
}

fn to_f64(points: &[Point<i32>]) -> Vec<[f64; 2]> {
    points.iter().map(|p| [p.x as f64, p.y as f64]).collect()
}

/// Trace outermost borders of the non-zero regions and keep those whose
/// area falls within `limits`.
pub fn find_contours(binary: &GrayImage, limits: &ContourAreaLimits) -> Vec<Contour> {
    let traced = imageproc::contours::find_contours::<i32>(binary);
    let n_traced = traced.len();
    let contours: Vec<Contour> = traced
        .into_iter()
        .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        .map(|c| Contour::from_pixels(c.points))
        .filter(|c| limits.accepts(c.area))
        .collect();
    tracing::trace!(
        "{} borders traced, {} outer contours within area limits",
        n_traced,
        contours.len()
    );
    contours
}

// ── Enclosing circle ─────────────────────────────────────────────────────

/// A circle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: [f64; 2],
    pub radius: f64,
}

impl Circle {
    pub fn area(&self) -> f64 {
        std::f64::consts::PI * self.radius * self.radius
    }

    fn covers(&self, p: [f64; 2]) -> bool {
        dist_sq(self.center, p).sqrt() <= self.radius + 1e-7 * (1.0 + self.radius)
    }

    fn from_diameter(a: [f64; 2], b: [f64; 2]) -> Self {
        Self {
            center: [0.5 * (a[0] + b[0]), 0.5 * (a[1] + b[1])],
            radius: 0.5 * dist_sq(a, b).sqrt(),
        }
    }

    fn circumscribe(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> Self {
        let ab = sub(b, a);
        let ac = sub(c, a);
        let d = 2.0 * (ab[0] * ac[1] - ab[1] * ac[0]);
        if d.abs() < 1e-12 {
            // Collinear: the widest pair spans the other point.
            let pairs = [(a, b), (a, c), (b, c)];
            let (p, q) = pairs
                .into_iter()
                .max_by(|x, y| dist_sq(x.0, x.1).total_cmp(&dist_sq(y.0, y.1)))
                .unwrap_or((a, b));
            return Self::from_diameter(p, q);
        }
        let ab2 = dot(ab, ab);
        let ac2 = dot(ac, ac);
        let ux = (ac[1] * ab2 - ab[1] * ac2) / d;
        let uy = (ab[0] * ac2 - ac[0] * ab2) / d;
        Self {
            center: [a[0] + ux, a[1] + uy],
            radius: (ux * ux + uy * uy).sqrt(),
        }
    }
}

/// Smallest enclosing circle (Welzl's incremental algorithm, expected linear
/// time on shuffled input).
pub fn min_enclosing_circle(points: &[[f64; 2]]) -> Option<Circle> {
    if points.is_empty() {
        return None;
    }
    let mut pts = points.to_vec();
    let mut rng = StdRng::seed_from_u64(CIRCLE_SHUFFLE_SEED);
    pts.shuffle(&mut rng);

    let mut circle = Circle {
        center: pts[0],
        radius: 0.0,
    };
    for i in 1..pts.len() {
        if circle.covers(pts[i]) {
            continue;
        }
        circle = Circle {
            center: pts[i],
            radius: 0.0,
        };
        for j in 0..i {
            if circle.covers(pts[j]) {
                continue;
            }
            circle = Circle::from_diameter(pts[i], pts[j]);
            for k in 0..j {
                if !circle.covers(pts[k]) {
                    circle = Circle::circumscribe(pts[i], pts[j], pts[k]);
                }
            }
        }
    }
    Some(circle)
}

// ── Oriented rectangle ───────────────────────────────────────────────────

/// Oriented rectangle: `width` is measured along the direction at
/// `angle_deg` from +x, `height` along its normal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RotatedRect {
    pub center: [f64; 2],
    pub width: f64,
    pub height: f64,
    /// Angle of the width axis in degrees, normalized to (−90, 90].
    pub angle_deg: f64,
}

impl RotatedRect {
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Unit vectors of the width and height axes.
    pub fn axes(&self) -> ([f64; 2], [f64; 2]) {
        let (s, c) = self.angle_deg.to_radians().sin_cos();
        ([c, s], [-s, c])
    }

    /// Express `p` in the rectangle frame: origin at the center, x along the
    /// width axis.
    pub fn to_local(&self, p: [f64; 2]) -> [f64; 2] {
        let (u, v) = self.axes();
        let d = sub(p, self.center);
        [dot(d, u), dot(d, v)]
    }

    /// Closed-boundary containment test in the rectangle frame.
    pub fn contains(&self, p: [f64; 2]) -> bool {
        let [lx, ly] = self.to_local(p);
        lx.abs() <= 0.5 * self.width && ly.abs() <= 0.5 * self.height
    }

    pub fn corners(&self) -> [[f64; 2]; 4] {
        let (u, v) = self.axes();
        let (hw, hh) = (0.5 * self.width, 0.5 * self.height);
        [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)].map(|(a, b)| {
            [
                self.center[0] + a * u[0] + b * v[0],
                self.center[1] + a * u[1] + b * v[1],
            ]
        })
    }
}

/// Fold an axis angle into (−90, 90]; a rectangle axis has no direction.
pub(crate) fn normalize_axis_angle(mut deg: f64) -> f64 {
    while deg > 90.0 {
        deg -= 180.0;
    }
    while deg <= -90.0 {
        deg += 180.0;
    }
    deg
}

/// Minimum-area bounding rectangle of a convex hull by rotating calipers.
///
/// `hull` must be in cyclic order (as returned by [`Contour::convex_hull`]).
/// Width and height stay sub-pixel, unlike `imageproc`'s integer-cornered
/// variant.
pub fn min_area_rect(hull: &[[f64; 2]]) -> Option<RotatedRect> {
    match hull.len() {
        0 => return None,
        1 => {
            return Some(RotatedRect {
                center: hull[0],
                width: 0.0,
                height: 0.0,
                angle_deg: 0.0,
            })
        }
        _ => {}
    }

    let n = hull.len();
    let mut best: Option<RotatedRect> = None;
    for i in 0..n {
        let e = sub(hull[(i + 1) % n], hull[i]);
        let len = dot(e, e).sqrt();
        if len < 1e-12 {
            continue;
        }
        let u = [e[0] / len, e[1] / len];
        let v = [-u[1], u[0]];
        let (mut u_min, mut u_max) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut v_min, mut v_max) = (f64::INFINITY, f64::NEG_INFINITY);
        for &p in hull {
            let pu = dot(p, u);
            let pv = dot(p, v);
            u_min = u_min.min(pu);
            u_max = u_max.max(pu);
            v_min = v_min.min(pv);
            v_max = v_max.max(pv);
        }
        let width = u_max - u_min;
        let height = v_max - v_min;
        if best.is_some_and(|b| b.area() <= width * height) {
            continue;
        }
        let cu = 0.5 * (u_min + u_max);
        let cv = 0.5 * (v_min + v_max);
        best = Some(RotatedRect {
            center: [cu * u[0] + cv * v[0], cu * u[1] + cv * v[1]],
            width,
            height,
            angle_deg: normalize_axis_angle(u[1].atan2(u[0]).to_degrees()),
        });
    }
    best
}
