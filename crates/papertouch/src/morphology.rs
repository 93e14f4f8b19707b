//! Rectangular-kernel morphology on grayscale/binary masks.
//!
//! Kernels are `k × k` squares anchored at `(k / 2, k / 2)`, so even-sized
//! kernels are asymmetric: a 2×2 dilation grows a region toward +x/+y and a
//! 2×2 erosion shrinks it from −x/−y. Pixels outside the image do not take
//! part in the min/max.

use image::{GrayImage, Luma};
use imageproc::morphology::{grayscale_dilate, grayscale_erode, Mask};
use serde::{Deserialize, Serialize};

/// Largest kernel side; the anchor must fit a `u8`.
const MAX_KERNEL: u32 = 255;

/// Morphological operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MorphOp {
    Dilate,
    Erode,
}

/// One operator applied `iterations` times with a square `kernel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MorphStep {
    pub op: MorphOp,
    /// Side length of the square structuring element (pixels, ≥ 1).
    pub kernel: u32,
    pub iterations: u32,
}

impl MorphStep {
    pub const fn dilate(kernel: u32, iterations: u32) -> Self {
        Self {
            op: MorphOp::Dilate,
            kernel,
            iterations,
        }
    }

    pub const fn erode(kernel: u32, iterations: u32) -> Self {
        Self {
            op: MorphOp::Erode,
            kernel,
            iterations,
        }
    }
}

/// Run `steps` in order and return the processed image.
pub fn apply(image: &GrayImage, steps: &[MorphStep]) -> GrayImage {
    let mut out = image.clone();
    for step in steps {
        if step.kernel <= 1 || step.iterations == 0 {
            continue;
        }
        let mask = square_mask(step.kernel);
        for _ in 0..step.iterations {
            out = match step.op {
                MorphOp::Dilate => grayscale_dilate(&out, &mask),
                MorphOp::Erode => grayscale_erode(&out, &mask),
            };
        }
    }
    out
}

/// Square structuring element of side `k`, anchored at `(k / 2, k / 2)`.
fn square_mask(k: u32) -> Mask {
    let k = k.clamp(1, MAX_KERNEL);
    let anchor = (k / 2) as u8;
    Mask::from_image(&GrayImage::from_pixel(k, k, Luma([255])), anchor, anchor)
}
