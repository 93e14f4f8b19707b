//! Running-average background model producing the hand mask.

use image::{GrayImage, ImageBuffer, Luma};
use serde::{Deserialize, Serialize};

type FloatImage = ImageBuffer<Luma<f32>, Vec<f32>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    /// Frames after which the blend rate stops decreasing.
    pub learning_time: u32,
    /// Absolute difference above which a pixel is foreground.
    pub threshold: u8,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            learning_time: 1800,
            threshold: 40,
        }
    }
}

/// Cumulative mean of the first `learning_time` frames, exponential
/// average afterwards.
#[derive(Debug, Clone, Default)]
pub struct BackgroundModel {
    config: BackgroundConfig,
    background: Option<FloatImage>,
    frames_seen: u32,
}

impl BackgroundModel {
    pub fn new(config: BackgroundConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn reset(&mut self) {
        self.background = None;
        self.frames_seen = 0;
    }

    pub fn frames_seen(&self) -> u32 {
        self.frames_seen
    }

    /// Foreground mask of `frame` against the model learned so far, then fold
    /// `frame` into the model. The first frame (or one of a new size) seeds
    /// the model and yields an empty mask.
    pub fn update(&mut self, frame: &GrayImage) -> GrayImage {
        let (w, h) = frame.dimensions();
        let seeded = self
            .background
            .as_ref()
            .is_some_and(|bg| bg.dimensions() == (w, h));
        if !seeded {
            self.background = Some(FloatImage::from_fn(w, h, |x, y| {
                Luma([frame.get_pixel(x, y)[0] as f32])
            }));
            self.frames_seen = 1;
            return GrayImage::new(w, h);
        }
        let Some(background) = self.background.as_mut() else {
            return GrayImage::new(w, h);
        };

        self.frames_seen = self.frames_seen.saturating_add(1);
        let rate = 1.0 / self.frames_seen.min(self.config.learning_time.max(1)) as f32;
        let threshold = self.config.threshold as f32;
        let mut mask = GrayImage::new(w, h);
        for ((p, b), m) in frame
            .pixels()
            .zip(background.pixels_mut())
            .zip(mask.pixels_mut())
        {
            let v = p[0] as f32;
            if (v - b[0]).abs() > threshold {
                m[0] = 255;
            }
            b[0] += rate * (v - b[0]);
        }
        mask
    }
}
