//! Runtime configuration and per-request options.
//!
//! [`MotionConfig`] holds the tunables of a [`DeviceMotion`](crate::runtime::DeviceMotion)
//! instance and can be loaded from JSON.  [`RequestOptions`] and
//! [`WatchOptions`] replace the dynamic option objects of script hosts:
//! an invalid frequency is never an error, it falls back to the default.

use core::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, UsageError};

/// Default cadence for watches and the heading subscription (milliseconds).
pub const DEFAULT_FREQUENCY_MS: u32 = 50;

/// Upper bound for `max_watches`; the executor run queue must also fit the
/// event pump task.
pub const WATCH_LIMIT_CEILING: usize = 48;

/// Core configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionConfig {
    /// Cadence used when a watch does not specify a usable frequency.
    pub default_frequency_ms: u32,
    /// Frequency requested from the heading provider on start.
    pub heading_frequency_ms: u32,
    /// Maximum number of concurrent watches.
    pub max_watches: usize,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            default_frequency_ms: DEFAULT_FREQUENCY_MS,
            heading_frequency_ms: DEFAULT_FREQUENCY_MS,
            max_watches: 32,
        }
    }
}

impl MotionConfig {
    /// Parse and validate a JSON config.  Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject out-of-range values instead of clamping them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_frequency_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "default_frequency_ms must be > 0",
            ));
        }
        if self.heading_frequency_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "heading_frequency_ms must be > 0",
            ));
        }
        if self.max_watches == 0 || self.max_watches > WATCH_LIMIT_CEILING {
            return Err(ConfigError::ValidationFailed(
                "max_watches must be within 1..=48",
            ));
        }
        Ok(())
    }

    pub fn default_period(&self) -> Duration {
        Duration::from_millis(u64::from(self.default_frequency_ms))
    }

    pub fn heading_period(&self) -> Duration {
        Duration::from_millis(u64::from(self.heading_frequency_ms))
    }
}

// ---------------------------------------------------------------------------
// Request options
// ---------------------------------------------------------------------------

/// Options for a one-shot read.  Accepted for symmetry; no field affects
/// one-shot delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RequestOptions;

impl RequestOptions {
    /// Validate a dynamic options value (`null` or an object).
    pub fn from_json(value: &Value) -> Result<Self, UsageError> {
        expect_object(value, "devicemotion.getCurrentMotion")?;
        Ok(Self)
    }
}

/// Options for a recurring watch.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WatchOptions {
    /// Requested cadence in milliseconds.  `None` or `Some(0)` use the
    /// configured default.
    pub frequency_ms: Option<u32>,
}

impl WatchOptions {
    pub fn with_frequency_ms(frequency_ms: u32) -> Self {
        Self {
            frequency_ms: Some(frequency_ms),
        }
    }

    /// Validate a dynamic options value.
    ///
    /// `null` and objects are accepted.  A `frequency` that is not a
    /// positive finite number is ignored; fractional values round up to
    /// the next millisecond.
    pub fn from_json(value: &Value) -> Result<Self, UsageError> {
        let Some(map) = expect_object(value, "devicemotion.watchMotion")? else {
            return Ok(Self::default());
        };
        let frequency_ms = map
            .get("frequency")
            .and_then(Value::as_f64)
            .filter(|f| f.is_finite() && *f > 0.0)
            .map(|f| f.ceil().min(f64::from(u32::MAX)) as u32);
        Ok(Self { frequency_ms })
    }

    /// Effective cadence for this watch.
    pub fn period(&self, config: &MotionConfig) -> Duration {
        match self.frequency_ms {
            Some(ms) if ms > 0 => Duration::from_millis(u64::from(ms)),
            _ => config.default_period(),
        }
    }
}

fn expect_object<'v>(
    value: &'v Value,
    call: &'static str,
) -> Result<Option<&'v serde_json::Map<String, Value>>, UsageError> {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        other => Err(UsageError::OptionsNotObject {
            call,
            found: json_kind(other),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
