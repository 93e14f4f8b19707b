//! Contour → control-type classification by area ratios.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use super::{Button, Control, ControlSet, ControlType, Rgb, Slider, Switch, DEFAULT_PALETTE};
use crate::notify::Notifier;
use crate::shape::{find_contours, Contour, ContourAreaLimits};

/// Classifier thresholds.
///
/// The ratio thresholds are tuned to one camera/paper resolution. Changing
/// them moves the decision boundaries between the three control types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Contours outside these limits are not considered.
    pub contour_limits: ContourAreaLimits,
    /// Button when `|1 − circle/contour|` is below this.
    pub button_circle_ratio_tol: f64,
    /// Slider when `circle/contour` exceeds this.
    pub slider_circle_ratio_min: f64,
    /// Switch when `|1 − rect/contour|` is below this ...
    pub switch_rect_ratio_tol: f64,
    /// ... and `|1 − width/height|` exceeds this.
    pub switch_min_aspect_dev: f64,
    /// Cyclic display palette indexed by per-type id.
    pub palette: Vec<Rgb>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            contour_limits: ContourAreaLimits::new(20.0, 120.0),
            button_circle_ratio_tol: 0.3,
            slider_circle_ratio_min: 12.0,
            switch_rect_ratio_tol: 0.25,
            switch_min_aspect_dev: 0.1,
            palette: DEFAULT_PALETTE.to_vec(),
        }
    }
}

/// The measurements a classification decision is made from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeMetrics {
    pub contour_area: f64,
    pub circle_area: f64,
    pub rect_width: f64,
    pub rect_height: f64,
}

impl ShapeMetrics {
    pub fn rect_area(&self) -> f64 {
        self.rect_width * self.rect_height
    }
}

/// Apply the ordered rules (button, slider, switch); first match wins.
///
/// Contours with a non-positive or non-finite area are never classified.
pub fn classify_metrics(m: &ShapeMetrics, cfg: &ClassifierConfig) -> Option<ControlType> {
    if !(m.contour_area.is_finite() && m.contour_area > 0.0) {
        return None;
    }
    let circle_ratio = m.circle_area / m.contour_area;
    if (1.0 - circle_ratio).abs() < cfg.button_circle_ratio_tol {
        return Some(ControlType::Button);
    }
    if circle_ratio > cfg.slider_circle_ratio_min {
        return Some(ControlType::Slider);
    }
    if m.rect_height > 0.0 {
        let rect_ratio = m.rect_area() / m.contour_area;
        let aspect = m.rect_width / m.rect_height;
        if (1.0 - rect_ratio).abs() < cfg.switch_rect_ratio_tol
            && (1.0 - aspect).abs() > cfg.switch_min_aspect_dev
        {
            return Some(ControlType::Switch);
        }
    }
    None
}

/// Builds a [`ControlSet`] from a binary edge image.
#[derive(Debug, Clone, Default)]
pub struct ShapeClassifier {
    config: ClassifierConfig,
}

impl ShapeClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Classify one contour into a control (ids and colors unassigned).
    pub fn classify_contour(&self, contour: &Contour) -> Option<Control> {
        let circle = contour.enclosing_circle()?;
        let rect = contour.min_area_rect()?;
        let metrics = ShapeMetrics {
            contour_area: contour.area,
            circle_area: circle.area(),
            rect_width: rect.width,
            rect_height: rect.height,
        };
        let kind = classify_metrics(&metrics, &self.config);
        tracing::debug!(?metrics, ?kind, "contour classified");
        Some(match kind? {
            ControlType::Button => Control::Button(Button::new(circle.center, circle.radius)),
            ControlType::Slider => Control::Slider(Slider::new(rect)),
            ControlType::Switch => Control::Switch(Switch::new(rect)),
        })
    }

    /// Extract contours from `edges`, classify each and report per-channel
    /// counts to `notifier`.
    pub fn classify(&self, edges: &GrayImage, notifier: &mut dyn Notifier) -> ControlSet {
        let contours = find_contours(edges, &self.config.contour_limits);
        let controls: Vec<Control> = contours
            .iter()
            .filter_map(|c| self.classify_contour(c))
            .collect();
        let set = ControlSet::from_controls(controls, &self.config.palette);
        let [(_, buttons), (_, sliders), (_, switches)] = set.summary();
        tracing::info!(
            "{} contours -> {} buttons, {} sliders, {} switches",
            contours.len(),
            buttons,
            sliders,
            switches
        );
        set.announce_counts(notifier);
        set
    }
}
