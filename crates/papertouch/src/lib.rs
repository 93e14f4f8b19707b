//! papertouch — turn a camera view of a paper sheet into a touch surface.
//!
//! The pipeline stages are:
//!
//! 1. **Paper** – threshold the frame, find the largest rectangular quad and
//!    solve the camera ↔ paper homography.
//! 2. **Controls** – edge-map the rectified sheet and classify each drawn
//!    outline as a button, slider or switch by area ratios.
//! 3. **Fingertip** – subtract a running background to get the hand mask,
//!    scan its outline for the farthest excursion inside the paper and
//!    smooth it over time.
//! 4. **Dispatch** – map the fingertip into paper space and hand it to the
//!    controls, which report value changes through a [`Notifier`].
//!
//! [`Session`] drives all four per frame. Each stage is also usable on its
//! own; see the module docs.

pub mod background;
pub mod config;
pub mod control;
pub mod fingertip;
pub mod geometry;
pub mod homography;
pub mod morphology;
pub mod notify;
pub mod paper;
pub mod preprocess;
pub mod projector;
pub mod session;
pub mod shape;

#[cfg(test)]
pub(crate) mod test_utils;

pub use background::{BackgroundConfig, BackgroundModel};
pub use config::PipelineConfig;
pub use control::{
    Button, ClassifierConfig, Control, ControlSet, ControlType, ShapeClassifier, Slider, Switch,
};
pub use fingertip::{FingertipConfig, FingertipTracker, FINGERTIP_SENTINEL};
pub use geometry::Quad;
pub use homography::HomographyError;
pub use notify::{ControlChannel, ControlEvent, EventLog, Notifier, TracingNotifier};
pub use paper::{MapDirection, PaperDetector, PaperDetectorConfig, PaperError, PaperTransform};
pub use preprocess::EdgeMapConfig;
pub use projector::{AlignmentError, ProjectorAlignment};
pub use session::{Frame, FrameReport, Mode, Session, SessionConfig};
pub use shape::{Circle, Contour, ContourAreaLimits, RotatedRect};
