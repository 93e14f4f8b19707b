//! Fingertip extraction from a hand silhouette.
//!
//! The outline of the largest blob is smoothed, then walked once while
//! tracking squared distance to its centroid. A hysteresis scan picks the
//! local maxima; the farthest one inside the reference polygon (the paper
//! boundary) is the raw fingertip, which is then blended with the previous
//! frame's estimate.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::geometry::{dist_sq, point_in_polygon, polygon_centroid, smooth_polygon};
use crate::morphology::{self, MorphStep};
use crate::shape::{find_contours, ContourAreaLimits};

/// Reported by [`FingertipTracker::fingertip_point`] while no fingertip is
/// tracked. Lies outside any image.
pub const FINGERTIP_SENTINEL: [f64; 2] = [-5.0, -5.0];

/// Fingertip tracker parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingertipConfig {
    /// Mask cleanup: close gaps, erode noise away, fill holes, shrink.
    pub morphology: Vec<MorphStep>,
    pub contour_limits: ContourAreaLimits,
    /// Outline smoothing window is `2k + 1` vertices.
    pub smoothing_half_window: usize,
    /// Hysteresis gap of the peak scan, in squared pixels.
    pub peak_threshold_sq: f64,
    /// Weight of the previous estimate when blending.
    pub smoothing_alpha: f64,
}

impl Default for FingertipConfig {
    fn default() -> Self {
        Self {
            morphology: vec![
                MorphStep::dilate(2, 2),
                MorphStep::erode(2, 6),
                MorphStep::dilate(3, 5),
                MorphStep::erode(2, 3),
            ],
            contour_limits: ContourAreaLimits::new(20.0, 200.0),
            smoothing_half_window: 7,
            peak_threshold_sq: 40.0 * 40.0,
            smoothing_alpha: 0.2,
        }
    }
}

/// Indices of local maxima in a cyclic distance profile, found in a single
/// pass with hysteresis `threshold`.
///
/// A maximum is recorded once the profile falls more than `threshold` below
/// it; the scan then waits for a rise of more than `threshold` above the
/// following minimum before looking for the next maximum. A maximum still
/// open when the profile ends is not recorded.
pub fn scan_peaks(distances: &[f64], threshold: f64) -> Vec<usize> {
    let mut peaks = Vec::new();
    let mut looking_for_max = true;
    let mut extreme = f64::NEG_INFINITY;
    let mut extreme_idx = 0usize;
    for (i, &d) in distances.iter().enumerate() {
        if looking_for_max {
            if d > extreme {
                extreme = d;
                extreme_idx = i;
            }
            if d < extreme - threshold {
                peaks.push(extreme_idx);
                extreme = d;
                looking_for_max = false;
            }
        } else {
            if d < extreme {
                extreme = d;
            }
            if d > extreme + threshold {
                extreme = d;
                extreme_idx = i;
                looking_for_max = true;
            }
        }
    }
    peaks
}

/// `alpha · previous + (1 − alpha) · raw`.
pub fn blend(previous: [f64; 2], raw: [f64; 2], alpha: f64) -> [f64; 2] {
    [
        alpha * previous[0] + (1.0 - alpha) * raw[0],
        alpha * previous[1] + (1.0 - alpha) * raw[1],
    ]
}

/// Temporally smoothed single-fingertip tracker.
#[derive(Debug, Clone)]
pub struct FingertipTracker {
    config: FingertipConfig,
    point: [f64; 2],
    valid: bool,
    outline: Vec<[f64; 2]>,
    centroid: Option<[f64; 2]>,
    peaks: Vec<usize>,
}

impl Default for FingertipTracker {
    fn default() -> Self {
        Self::new(FingertipConfig::default())
    }
}

impl FingertipTracker {
    pub fn new(config: FingertipConfig) -> Self {
        Self {
            config,
            point: FINGERTIP_SENTINEL,
            valid: false,
            outline: Vec::new(),
            centroid: None,
            peaks: Vec::new(),
        }
    }

    pub fn config(&self) -> &FingertipConfig {
        &self.config
    }

    /// Forget all history.
    pub fn reset(&mut self) {
        self.point = FINGERTIP_SENTINEL;
        self.valid = false;
        self.outline.clear();
        self.centroid = None;
        self.peaks.clear();
    }

    /// Process one hand mask. Returns whether a fingertip was found inside
    /// `reference`.
    pub fn detect(&mut self, mask: &GrayImage, reference: &[[f64; 2]]) -> bool {
        let cleaned = morphology::apply(mask, &self.config.morphology);
        let contours = find_contours(&cleaned, &self.config.contour_limits);
        let Some(hand) = contours
            .into_iter()
            .max_by(|a, b| a.area.total_cmp(&b.area))
        else {
            tracing::trace!("no hand contour");
            self.reset();
            return false;
        };

        self.outline = smooth_polygon(&hand.points, self.config.smoothing_half_window);
        self.centroid = polygon_centroid(&self.outline);
        let Some(center) = self.centroid else {
            tracing::warn!("degenerate hand outline ({} points)", self.outline.len());
            self.peaks.clear();
            self.valid = false;
            return false;
        };

        let distances: Vec<f64> = self.outline.iter().map(|&p| dist_sq(p, center)).collect();
        self.peaks = scan_peaks(&distances, self.config.peak_threshold_sq);

        let best = self
            .peaks
            .iter()
            .copied()
            .filter(|&i| point_in_polygon(reference, self.outline[i]))
            .max_by(|&a, &b| distances[a].total_cmp(&distances[b]));

        match best {
            Some(i) => {
                let raw = self.outline[i];
                self.point = if self.valid {
                    blend(self.point, raw, self.config.smoothing_alpha)
                } else {
                    raw
                };
                self.valid = true;
                tracing::trace!(?raw, point = ?self.point, peaks = self.peaks.len(), "fingertip");
            }
            None => {
                tracing::trace!(peaks = self.peaks.len(), "no peak inside reference polygon");
                self.valid = false;
            }
        }
        self.valid
    }

    /// Whether the last [`detect`](Self::detect) found a fingertip.
    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The smoothed fingertip, if valid.
    pub fn fingertip(&self) -> Option<[f64; 2]> {
        self.valid.then_some(self.point)
    }

    /// The smoothed fingertip, or [`FINGERTIP_SENTINEL`] when invalid.
    pub fn fingertip_point(&self) -> [f64; 2] {
        self.fingertip().unwrap_or(FINGERTIP_SENTINEL)
    }

    /// Smoothed outline from the last frame with a hand.
    pub fn outline(&self) -> &[[f64; 2]] {
        &self.outline
    }

    pub fn centroid(&self) -> Option<[f64; 2]> {
        self.centroid
    }

    /// Peak indices into [`outline`](Self::outline) from the last frame.
    pub fn peaks(&self) -> &[usize] {
        &self.peaks
    }
}
