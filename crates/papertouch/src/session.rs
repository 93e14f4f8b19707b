//! Per-frame driver tying every stage together.
//!
//! A [`Session`] owns the detectors, the control set and the event sink.
//! The caller feeds it gray camera frames and switches modes:
//!
//! - **Setup**: look for the paper; collect projector alignment clicks.
//! - **Edit**: the operator draws on the sheet; frames are ignored.
//! - **Play**: after a short delay, classify the sheet once and then track
//!   the fingertip every frame, dispatching touches to the controls.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::background::BackgroundModel;
use crate::config::PipelineConfig;
use crate::control::{ControlSet, ControlType, ShapeClassifier};
use crate::fingertip::FingertipTracker;
use crate::notify::Notifier;
use crate::paper::{MapDirection, PaperDetector};
use crate::preprocess::{edge_map, rectify, EdgeMapConfig};
use crate::projector::ProjectorAlignment;

/// Operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Setup,
    Edit,
    Play,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Rectified paper size in pixels.
    pub paper_width: u32,
    pub paper_height: u32,
    pub projector_width: u32,
    pub projector_height: u32,
    /// Frames arriving within this long after entering play are ignored.
    pub play_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            paper_width: 518,
            paper_height: 400,
            projector_width: 848,
            projector_height: 480,
            play_delay_ms: 250,
        }
    }
}

/// One camera frame.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub gray: &'a GrayImage,
    pub timestamp_ms: u64,
}

/// What [`Session::update`] did with a frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub mode: Mode,
    pub paper_found: bool,
    /// Fingertip in paper coordinates.
    pub fingertip: Option<[f64; 2]>,
    /// Control that claimed the fingertip.
    pub claimed: Option<(ControlType, usize)>,
    pub controls_rebuilt: bool,
}

impl FrameReport {
    fn new(mode: Mode, paper_found: bool) -> Self {
        Self {
            mode,
            paper_found,
            fingertip: None,
            claimed: None,
            controls_rebuilt: false,
        }
    }
}

pub struct Session<N: Notifier> {
    mode: Mode,
    config: SessionConfig,
    edge_map: EdgeMapConfig,
    paper: PaperDetector,
    classifier: ShapeClassifier,
    controls: ControlSet,
    previous_layout: ControlSet,
    background: BackgroundModel,
    tracker: FingertipTracker,
    alignment: ProjectorAlignment,
    notifier: N,
    play_started_ms: u64,
    paper_found: bool,
    classify_pending: bool,
}

impl<N: Notifier> Session<N> {
    /// Start in setup mode.
    pub fn new(config: PipelineConfig, notifier: N) -> Self {
        let PipelineConfig {
            paper,
            edge_map,
            classifier,
            fingertip,
            background,
            session,
        } = config;
        Self {
            mode: Mode::Setup,
            alignment: ProjectorAlignment::new(session.projector_width, session.projector_height),
            config: session,
            edge_map,
            paper: PaperDetector::new(paper),
            classifier: ShapeClassifier::new(classifier),
            controls: ControlSet::new(),
            previous_layout: ControlSet::new(),
            background: BackgroundModel::new(background),
            tracker: FingertipTracker::new(fingertip),
            notifier,
            play_started_ms: 0,
            paper_found: false,
            classify_pending: false,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn controls(&self) -> &ControlSet {
        &self.controls
    }

    pub fn paper(&self) -> &PaperDetector {
        &self.paper
    }

    pub fn tracker(&self) -> &FingertipTracker {
        &self.tracker
    }

    pub fn alignment(&self) -> &ProjectorAlignment {
        &self.alignment
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn notifier_mut(&mut self) -> &mut N {
        &mut self.notifier
    }

    // ── Mode transitions ─────────────────────────────────────────────────

    /// Enter play mode. Coming from setup or edit this discards the
    /// controls, schedules a classification pass, forgets the background and
    /// fingertip history, and restarts the paper search.
    pub fn enter_play(&mut self, now_ms: u64) {
        if self.mode != Mode::Play {
            self.previous_layout = std::mem::take(&mut self.controls);
            self.classify_pending = true;
            self.background.reset();
            self.tracker.reset();
            self.paper_found = false;
            self.play_started_ms = now_ms;
            tracing::info!(now_ms, "entering play mode");
        }
        self.mode = Mode::Play;
    }

    pub fn enter_edit(&mut self) {
        self.leave_play();
        self.mode = Mode::Edit;
    }

    pub fn enter_setup(&mut self) {
        self.leave_play();
        self.mode = Mode::Setup;
    }

    fn leave_play(&mut self) {
        if self.mode == Mode::Play {
            self.notifier.on_stop_all();
        }
    }

    // ── Projector alignment ──────────────────────────────────────────────

    /// Record an alignment click (setup mode only). The fourth click
    /// computes the alignment.
    pub fn add_projector_point(&mut self, p: [f64; 2]) -> bool {
        if self.mode != Mode::Setup || !self.alignment.add_point(p) {
            return false;
        }
        if self.alignment.is_complete() {
            if let Err(e) = self.alignment.compute() {
                tracing::warn!("projector alignment failed: {}", e);
            }
        }
        true
    }

    /// Clear the alignment clicks (setup mode only).
    pub fn reset_alignment(&mut self) -> bool {
        if self.mode != Mode::Setup {
            return false;
        }
        self.alignment.reset();
        true
    }

    // ── Frames ───────────────────────────────────────────────────────────

    pub fn update(&mut self, frame: Frame<'_>) -> FrameReport {
        match self.mode {
            Mode::Setup => {
                self.paper_found = self.paper.detect_frame(frame.gray);
                FrameReport::new(self.mode, self.paper_found)
            }
            Mode::Edit => FrameReport::new(self.mode, self.paper_found),
            Mode::Play => self.play_update(frame),
        }
    }

    fn play_update(&mut self, frame: Frame<'_>) -> FrameReport {
        let mut report = FrameReport::new(self.mode, self.paper_found);
        if frame.timestamp_ms.saturating_sub(self.play_started_ms) <= self.config.play_delay_ms {
            return report;
        }

        if self.paper.detect_frame(frame.gray) {
            self.paper_found = true;
        }
        report.paper_found = self.paper_found;
        if !self.paper_found {
            return report;
        }

        let (w, h) = (self.config.paper_width, self.config.paper_height);
        let transform = match self.paper.compute_transform(w, h) {
            Ok(t) => t.clone(),
            Err(e) => {
                tracing::warn!("paper transform unavailable: {}", e);
                return report;
            }
        };

        if self.classify_pending {
            match rectify(frame.gray, &transform.forward, w, h) {
                Ok(rectified) => {
                    let edges = edge_map(&rectified, &self.edge_map);
                    let controls = self.classifier.classify(&edges, &mut self.notifier);
                    if !self.previous_layout.is_empty() {
                        let same = controls.matches_layout(&self.previous_layout);
                        tracing::info!(same, "sheet layout compared with previous play session");
                    }
                    self.controls = controls;
                    self.classify_pending = false;
                    report.controls_rebuilt = true;
                }
                Err(e) => tracing::warn!("rectification failed: {}", e),
            }
        }

        let mask = self.background.update(frame.gray);
        let polygon = self.paper.paper_polygon();
        if self.tracker.detect(&mask, &polygon) {
            if let Some(tip) = self.tracker.fingertip() {
                let p = transform.map(tip, MapDirection::CameraToPaper);
                report.fingertip = Some(p);
                report.claimed = self.controls.process_interaction(p, &mut self.notifier);
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{ControlEvent, EventLog};
    use crate::test_utils::{draw_hand, draw_sheet, fill_disc};
    use image::Luma;

    const SHEET: [[f64; 2]; 4] = [[60.0, 50.0], [260.0, 50.0], [260.0, 190.0], [60.0, 190.0]];
    const DOT: [f64; 2] = [163.0, 130.0];

    fn paint(dst: &mut GrayImage, mask: &GrayImage, value: u8) {
        for (x, y, p) in mask.enumerate_pixels() {
            if p[0] > 0 {
                dst.put_pixel(x, y, Luma([value]));
            }
        }
    }

    /// Bright sheet with one drawn dot on a dark table, optionally with a
    /// hand reaching in from the bottom edge.
    fn scene(with_hand: bool) -> GrayImage {
        let mut gray = GrayImage::from_pixel(320, 240, Luma([40]));
        paint(&mut gray, &draw_sheet(320, 240, &SHEET), 210);
        let mut dot = GrayImage::new(320, 240);
        fill_disc(&mut dot, DOT, 20.0);
        paint(&mut gray, &dot, 40);
        if with_hand {
            let (hand, _) = draw_hand(320, 240, [160.0, 215.0], 25.0);
            paint(&mut gray, &hand, 120);
        }
        gray
    }

    fn frame(gray: &GrayImage, timestamp_ms: u64) -> Frame<'_> {
        Frame { gray, timestamp_ms }
    }

    #[test]
    fn setup_mode_detects_paper_and_edit_mode_idles() {
        let mut s = Session::new(PipelineConfig::default(), EventLog::new());
        assert_eq!(s.mode(), Mode::Setup);
        let img = scene(false);
        let report = s.update(frame(&img, 0));
        assert!(report.paper_found);
        assert!(s.paper().has_paper());

        s.enter_edit();
        let report = s.update(frame(&GrayImage::new(320, 240), 10));
        assert_eq!(report.mode, Mode::Edit);
        assert!(report.fingertip.is_none());
        assert!(s.notifier().is_empty());
    }

    #[test]
    fn play_waits_then_classifies_and_dispatches_touch() {
        let mut s = Session::new(PipelineConfig::default(), EventLog::new());
        s.enter_play(1000);

        let empty = scene(false);
        let early = s.update(frame(&empty, 1100));
        assert!(!early.paper_found);
        assert!(!early.controls_rebuilt);

        let first = s.update(frame(&empty, 1300));
        assert!(first.paper_found);
        assert!(first.controls_rebuilt);
        assert_eq!(s.controls().count(ControlType::Button), 1);
        assert_eq!(s.controls().len(), 1);
        assert!(first.fingertip.is_none());

        let touched = scene(true);
        let report = s.update(frame(&touched, 1340));
        assert!(!report.controls_rebuilt);
        let tip = report.fingertip.expect("fingertip");
        assert!(tip[0] > 0.0 && tip[0] < 518.0 && tip[1] > 0.0 && tip[1] < 400.0);
        assert_eq!(report.claimed, Some((ControlType::Button, 0)));
        assert!(s
            .notifier()
            .events()
            .contains(&ControlEvent::Momentary { id: 0, on: true }));
    }

    #[test]
    fn leaving_play_stops_all_and_reentering_reschedules() {
        let mut s = Session::new(PipelineConfig::default(), EventLog::new());
        s.enter_play(0);
        s.enter_play(50);
        s.enter_setup();
        assert_eq!(s.notifier().events(), &[ControlEvent::StopAll]);
        s.enter_edit();
        assert_eq!(s.notifier().events().len(), 1);

        s.enter_play(500);
        let img = scene(false);
        assert!(s.update(frame(&img, 800)).controls_rebuilt);
        s.enter_edit();
        s.enter_play(1000);
        assert!(s.controls().is_empty());
        assert!(s.update(frame(&img, 1300)).controls_rebuilt);
    }

    #[test]
    fn alignment_clicks_only_in_setup() {
        let mut s = Session::new(PipelineConfig::default(), EventLog::new());
        let clicks = [[10.0, 10.0], [300.0, 12.0], [305.0, 230.0], [8.0, 228.0]];
        for p in clicks {
            assert!(s.add_projector_point(p));
        }
        assert!(!s.add_projector_point([1.0, 1.0]));
        assert!(s.alignment().is_complete());
        let corner = s.alignment().map(clicks[2]);
        assert!((corner[0] - 848.0).abs() < 1e-6 && (corner[1] - 480.0).abs() < 1e-6);

        s.enter_play(0);
        assert!(!s.reset_alignment());
        s.enter_setup();
        assert!(s.reset_alignment());
        assert!(s.alignment().points().is_empty());
    }
}
