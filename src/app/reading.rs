//! Motion and heading sample types.

use serde::{Deserialize, Serialize};

/// Payload of one native motion success event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMotion {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    /// Device clock at capture.
    pub timestamp: f64,
}

/// Compass update from the heading provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadingSample {
    pub magnetic_heading: f64,
    /// Degrees from true north; the only field that enriches readings.
    pub true_heading: f64,
    pub heading_accuracy: f64,
    pub timestamp: f64,
}

/// Reading delivered to consumers.
///
/// Immutable: each native event produces a new one that supersedes the
/// cached value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionReading {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    /// Compass heading in degrees, or `alpha` when no heading is known.
    pub heading: f64,
    pub timestamp: f64,
}

impl MotionReading {
    /// Combine a native sample with the last known true heading.
    pub fn from_raw(raw: &RawMotion, heading: Option<f64>) -> Self {
        Self {
            yaw: raw.yaw,
            pitch: raw.pitch,
            roll: raw.roll,
            alpha: raw.alpha,
            beta: raw.beta,
            gamma: raw.gamma,
            // Due north (0.0) is a real heading and is kept.  A truthiness
            // check on the cached heading would fall back to alpha there.
            heading: heading.unwrap_or(raw.alpha),
            timestamp: raw.timestamp,
        }
    }
}
