//! Interactive controls recognized on the sheet, and the set that owns them.
//!
//! A [`ControlSet`] is rebuilt wholesale by each classification pass. Ids are
//! dense per type (`0..n`) in detection order and only change on rebuild.
//! Interaction is first-match-wins over detection order.

mod classify;

pub use classify::{classify_metrics, ClassifierConfig, ShapeClassifier, ShapeMetrics};

use serde::{Deserialize, Serialize};

use crate::geometry::dist_sq;
use crate::notify::{ControlChannel, Notifier};
use crate::shape::{normalize_axis_angle, RotatedRect};

/// RGB display color.
pub type Rgb = [u8; 3];

/// Cyclic palette assigned to controls of each type by id.
pub const DEFAULT_PALETTE: [Rgb; 2] = [[140, 0, 100], [87, 0, 210]];

/// Geometry tolerance (pixels and degrees) for [`Control::approx_eq`].
pub const LAYOUT_TOLERANCE: f64 = 10.0;

/// Control variant tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlType {
    Button,
    Slider,
    Switch,
}

impl ControlType {
    /// Reporting order for counts: momentary, continuous, toggle.
    pub const ALL: [ControlType; 3] = [Self::Button, Self::Slider, Self::Switch];

    pub fn channel(self) -> ControlChannel {
        match self {
            Self::Button => ControlChannel::Momentary,
            Self::Slider => ControlChannel::Continuous,
            Self::Switch => ControlChannel::Toggle,
        }
    }

    pub fn plural(self) -> &'static str {
        match self {
            Self::Button => "buttons",
            Self::Slider => "sliders",
            Self::Switch => "switches",
        }
    }

    fn index(self) -> usize {
        match self {
            Self::Button => 0,
            Self::Slider => 1,
            Self::Switch => 2,
        }
    }
}

/// Orient a fitted rectangle so that `width >= height`, rotating the axis by
/// 90° when the sides are swapped.
pub(crate) fn control_rect(rect: RotatedRect) -> RotatedRect {
    if rect.width < rect.height {
        RotatedRect {
            center: rect.center,
            width: rect.height,
            height: rect.width,
            angle_deg: normalize_axis_angle(rect.angle_deg + 90.0),
        }
    } else {
        rect
    }
}

// ── Variants ─────────────────────────────────────────────────────────────

/// Round momentary button.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Button {
    pub id: usize,
    pub color: Rgb,
    pub center: [f64; 2],
    pub radius: f64,
    active: bool,
    #[serde(default)]
    entered: bool,
}

impl Button {
    pub fn new(center: [f64; 2], radius: f64) -> Self {
        Self {
            id: 0,
            color: DEFAULT_PALETTE[0],
            center,
            radius,
            active: false,
            entered: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn contains(&self, p: [f64; 2]) -> bool {
        dist_sq(self.center, p) < self.radius * self.radius
    }

    /// Edge-triggered press/release. Returns whether `p` is inside.
    pub fn on_interaction(&mut self, p: [f64; 2], notifier: &mut dyn Notifier) -> bool {
        let inside = self.contains(p);
        if inside && !self.entered {
            self.entered = true;
            self.active = true;
            notifier.on_momentary_value(self.id, true);
        } else if !inside && self.entered {
            self.entered = false;
            self.active = false;
            notifier.on_momentary_value(self.id, false);
        }
        inside
    }
}

/// Linear slider; `value` runs 0 → 1 along the rectangle's width axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slider {
    pub id: usize,
    pub color: Rgb,
    pub rect: RotatedRect,
    value: f64,
}

impl Slider {
    pub fn new(rect: RotatedRect) -> Self {
        Self {
            id: 0,
            color: DEFAULT_PALETTE[0],
            rect: control_rect(rect),
            value: 0.0,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn contains(&self, p: [f64; 2]) -> bool {
        self.rect.contains(p)
    }

    /// Set the value from the touch position and report it.
    pub fn on_interaction(&mut self, p: [f64; 2], notifier: &mut dyn Notifier) -> bool {
        if !self.contains(p) {
            return false;
        }
        if self.rect.width > 0.0 {
            let [lx, _] = self.rect.to_local(p);
            self.value = ((lx + 0.5 * self.rect.width) / self.rect.width).clamp(0.0, 1.0);
        }
        notifier.on_continuous_value(self.id, self.value);
        true
    }
}

/// Two-state switch: touching the right half turns it on, the left half off.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Switch {
    pub id: usize,
    pub color: Rgb,
    pub rect: RotatedRect,
    active: bool,
}

impl Switch {
    pub fn new(rect: RotatedRect) -> Self {
        Self {
            id: 0,
            color: DEFAULT_PALETTE[0],
            rect: control_rect(rect),
            active: false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn contains(&self, p: [f64; 2]) -> bool {
        self.rect.contains(p)
    }

    pub fn on_interaction(&mut self, p: [f64; 2], notifier: &mut dyn Notifier) -> bool {
        if !self.contains(p) {
            return false;
        }
        let right = self.rect.to_local(p)[0] > 0.0;
        if right != self.active {
            self.active = right;
            notifier.on_toggle_value(self.id, right);
        }
        true
    }
}

// ── Control ──────────────────────────────────────────────────────────────

/// A recognized control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Control {
    Button(Button),
    Slider(Slider),
    Switch(Switch),
}

impl Control {
    pub fn kind(&self) -> ControlType {
        match self {
            Self::Button(_) => ControlType::Button,
            Self::Slider(_) => ControlType::Slider,
            Self::Switch(_) => ControlType::Switch,
        }
    }

    pub fn id(&self) -> usize {
        match self {
            Self::Button(b) => b.id,
            Self::Slider(s) => s.id,
            Self::Switch(s) => s.id,
        }
    }

    pub fn color(&self) -> Rgb {
        match self {
            Self::Button(b) => b.color,
            Self::Slider(s) => s.color,
            Self::Switch(s) => s.color,
        }
    }

    fn assign(&mut self, id: usize, color: Rgb) {
        match self {
            Self::Button(b) => (b.id, b.color) = (id, color),
            Self::Slider(s) => (s.id, s.color) = (id, color),
            Self::Switch(s) => (s.id, s.color) = (id, color),
        }
    }

    pub fn contains(&self, p: [f64; 2]) -> bool {
        match self {
            Self::Button(b) => b.contains(p),
            Self::Slider(s) => s.contains(p),
            Self::Switch(s) => s.contains(p),
        }
    }

    /// Dispatch a paper-space touch. Returns `true` when this control claims
    /// the point.
    pub fn on_interaction(&mut self, p: [f64; 2], notifier: &mut dyn Notifier) -> bool {
        match self {
            Self::Button(b) => b.on_interaction(p, notifier),
            Self::Slider(s) => s.on_interaction(p, notifier),
            Self::Switch(s) => s.on_interaction(p, notifier),
        }
    }

    /// Same type and geometry within `tol` (pixels for positions and sizes,
    /// degrees for angles).
    pub fn approx_eq(&self, other: &Control, tol: f64) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() < tol;
        let rects_close = |a: &RotatedRect, b: &RotatedRect| {
            close(a.angle_deg, b.angle_deg)
                && close(a.center[0], b.center[0])
                && close(a.center[1], b.center[1])
                && close(a.width, b.width)
                && close(a.height, b.height)
        };
        match (self, other) {
            (Self::Button(a), Self::Button(b)) => {
                close(a.center[0], b.center[0])
                    && close(a.center[1], b.center[1])
                    && close(a.radius, b.radius)
            }
            (Self::Slider(a), Self::Slider(b)) => rects_close(&a.rect, &b.rect),
            (Self::Switch(a), Self::Switch(b)) => rects_close(&a.rect, &b.rect),
            _ => false,
        }
    }
}

// ── ControlSet ───────────────────────────────────────────────────────────

/// All controls from one classification pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ControlSet {
    controls: Vec<Control>,
    #[serde(skip)]
    by_type: [Vec<usize>; 3],
    #[serde(skip_serializing_if = "Option::is_none")]
    last_input: Option<[f64; 2]>,
}

impl ControlSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `controls` in detection order, assigning dense
    /// per-type ids and palette colors.
    pub fn from_controls(controls: Vec<Control>, palette: &[Rgb]) -> Self {
        let mut set = Self {
            controls,
            ..Self::default()
        };
        for (i, control) in set.controls.iter_mut().enumerate() {
            let slot = &mut set.by_type[control.kind().index()];
            let id = slot.len();
            let color = if palette.is_empty() {
                DEFAULT_PALETTE[id % DEFAULT_PALETTE.len()]
            } else {
                palette[id % palette.len()]
            };
            control.assign(id, color);
            slot.push(i);
        }
        set
    }

    /// Drop every control.
    pub fn reset(&mut self) {
        self.controls.clear();
        for ids in &mut self.by_type {
            ids.clear();
        }
        self.last_input = None;
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    /// Controls in hit-testing order.
    pub fn iter(&self) -> impl Iterator<Item = &Control> {
        self.controls.iter()
    }

    pub fn count(&self, kind: ControlType) -> usize {
        self.by_type[kind.index()].len()
    }

    /// Controls of one type, ordered by id.
    pub fn of_type(&self, kind: ControlType) -> impl Iterator<Item = &Control> {
        self.by_type[kind.index()].iter().map(|&i| &self.controls[i])
    }

    pub fn get(&self, kind: ControlType, id: usize) -> Option<&Control> {
        self.by_type[kind.index()]
            .get(id)
            .map(|&i| &self.controls[i])
    }

    /// Per-type counts in reporting order.
    pub fn summary(&self) -> [(ControlType, usize); 3] {
        ControlType::ALL.map(|kind| (kind, self.count(kind)))
    }

    /// Report per-channel counts to `notifier`.
    pub fn announce_counts(&self, notifier: &mut dyn Notifier) {
        for (kind, count) in self.summary() {
            notifier.on_control_count(kind.channel(), count);
        }
    }

    /// Offer a paper-space point to each control in order; the first control
    /// that claims it stops the search.
    pub fn process_interaction(
        &mut self,
        p: [f64; 2],
        notifier: &mut dyn Notifier,
    ) -> Option<(ControlType, usize)> {
        self.last_input = Some(p);
        self.controls
            .iter_mut()
            .find_map(|c| c.on_interaction(p, notifier).then(|| (c.kind(), c.id())))
    }

    /// Last point passed to [`process_interaction`](Self::process_interaction).
    pub fn last_input(&self) -> Option<[f64; 2]> {
        self.last_input
    }

    /// Whether `other` holds the same controls, in the same order, within
    /// [`LAYOUT_TOLERANCE`].
    pub fn matches_layout(&self, other: &ControlSet) -> bool {
        self.controls.len() == other.controls.len()
            && self
                .controls
                .iter()
                .zip(other.controls.iter())
                .all(|(a, b)| a.approx_eq(b, LAYOUT_TOLERANCE))
    }
}
