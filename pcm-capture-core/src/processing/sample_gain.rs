//! Soft-knee gain stage for 16-bit PCM.
//!
//! Scaled samples pass through unchanged in the linear region and bend
//! quadratically into saturation within `margin` units of either rail,
//! instead of clipping hard at the i16 limits.
//!
//! ```text
//!  out
//!  32767 ┤                 ╭──────
//!        │               ╭─╯  knee
//!        │             ╱
//!        │           ╱   linear
//!        │         ╱
//! -32768 ┼──────╯
//!        └──┬──┬──────────┬──┬──── x0 = sample * scale
//!          -M  +M        -M  +M   (around each rail)
//! ```
use serde::{Deserialize, Serialize};

use crate::models::error::CaptureError;

/// Default knee width in sample units.
pub const GAIN_MARGIN: i32 = 4096;

const LOW: f64 = i16::MIN as f64;
const HIGH: f64 = i16::MAX as f64;

/// Gain settings for one capture session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GainParameters {
    /// Linear scale factor applied before limiting.
    pub scale: f32,

    /// Knee width in sample units (default: 4096).
    #[serde(default = "default_margin")]
    pub margin: i32,
}

fn default_margin() -> i32 {
    GAIN_MARGIN
}

impl GainParameters {
    pub fn new(scale: f32) -> Self {
        Self {
            scale,
            margin: GAIN_MARGIN,
        }
    }

    pub fn validate(&self) -> Result<(), CaptureError> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(CaptureError::ConfigurationFailed(format!(
                "gain scale must be finite and positive, got {}",
                self.scale
            )));
        }
        if self.margin <= 0 || self.margin > i16::MAX as i32 {
            return Err(CaptureError::ConfigurationFailed(format!(
                "gain margin out of range: {}",
                self.margin
            )));
        }
        Ok(())
    }

    /// Apply the curve to one sample.
    pub fn apply(&self, sample: i16) -> i16 {
        gain_with_margin(sample as i32, self.scale, self.margin)
    }

    /// Apply the curve in place to a buffer of little-endian i16 samples.
    ///
    /// A trailing odd byte is left untouched.
    pub fn apply_le_bytes(&self, buf: &mut [u8]) {
        for pair in buf.chunks_exact_mut(2) {
            let sample = i16::from_le_bytes([pair[0], pair[1]]);
            pair.copy_from_slice(&self.apply(sample).to_le_bytes());
        }
    }
}

impl Default for GainParameters {
    fn default() -> Self {
        Self::new(1.0)
    }
}

/// Scale `sample` and limit it with the default 4096-unit knee.
pub fn gain(sample: i32, scale: f32) -> i16 {
    gain_with_margin(sample, scale, GAIN_MARGIN)
}

/// Scale `sample` and limit it with a knee of width `margin`.
pub fn gain_with_margin(sample: i32, scale: f32, margin: i32) -> i16 {
    soft_limit(sample as f64 * scale as f64, margin)
}

/// The limiter curve evaluated on an already-scaled value.
pub fn soft_limit(x0: f64, margin: i32) -> i16 {
    let m = margin as f64;
    let k = 0.25 / m;

    let y = if x0 <= LOW - m {
        LOW
    } else if x0 < LOW + m {
        let x1 = x0 - LOW + m;
        (k * (x1 * x1 + 2.0 * m) + LOW).round()
    } else if x0 <= HIGH - m {
        x0.round()
    } else if x0 < HIGH + m {
        let x1 = x0 - HIGH - m;
        (-k * (x1 * x1 - 2.0 * m) + HIGH).round()
    } else {
        HIGH
    };

    // The upper knee reaches 32767.5 at its outer edge.
    y.clamp(LOW, HIGH) as i16
}
