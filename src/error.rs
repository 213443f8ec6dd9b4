//! Unified error types for the device motion library.
//!
//! Three families, matching how failures reach the caller:
//!
//! - [`UsageError`]: malformed arguments, raised synchronously before any
//!   subscription state changes.
//! - [`Error::TooManyWatches`] and [`Error::WatchIdInUse`]: the runtime
//!   cannot host another cadence task under a fresh id.
//! - [`StreamError`]: reported by the native bridge or heading provider and
//!   delivered asynchronously through consumers' error callbacks.  Never
//!   returned from a public call.

use core::fmt;

use crate::app::watch::WatchId;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every synchronous failure of the public surface funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Arguments did not have the expected shape.
    Usage(UsageError),
    /// The watch table is full.
    TooManyWatches { limit: usize },
    /// The watch id source produced an id that is still registered.
    WatchIdInUse { id: WatchId },
    /// Configuration is out of range.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage(e) => write!(f, "usage: {e}"),
            Self::TooManyWatches { limit } => write!(f, "too many watches (limit {limit})"),
            Self::WatchIdInUse { id } => write!(f, "watch id {id} already in use"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Usage errors
// ---------------------------------------------------------------------------

/// Wrong argument shape passed to a public entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageError {
    /// The options argument was present but not an object.
    OptionsNotObject {
        /// Qualified name of the call, e.g. `devicemotion.watchMotion`.
        call: &'static str,
        /// JSON kind that was supplied instead.
        found: &'static str,
    },
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OptionsNotObject { call, found } => {
                write!(f, "{call}: options must be an object, got {found}")
            }
        }
    }
}

impl From<UsageError> for Error {
    fn from(e: UsageError) -> Self {
        Self::Usage(e)
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

/// A [`MotionConfig`](crate::config::MotionConfig) field failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Field name and the reason it was rejected.
    ValidationFailed(&'static str),
    /// JSON could not be parsed into a config.
    Malformed(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::Malformed(msg) => write!(f, "malformed config: {msg}"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Stream errors
// ---------------------------------------------------------------------------

/// Failure reported by a native sensor source.
///
/// Delivered to consumers' error callbacks; the stream keeps running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The device has no motion sensor, or it could not be opened.
    SensorUnavailable,
    /// The platform refused access to the sensor.
    PermissionDenied,
    /// Platform-specific failure with its native code.
    Native { code: i32, message: String },
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SensorUnavailable => write!(f, "motion sensor unavailable"),
            Self::PermissionDenied => write!(f, "motion sensor permission denied"),
            Self::Native { code, message } => write!(f, "native error {code}: {message}"),
        }
    }
}

impl std::error::Error for StreamError {}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
