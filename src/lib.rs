//! Device motion subscription manager.
//!
//! Multiplexes one native motion stream across any number of one-shot
//! requests and cadence-driven watches.  The stream runs exactly while at
//! least one consumer is registered.  See [`runtime::DeviceMotion`] for the
//! public surface and [`app::service::MotionService`] for the core.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod runtime;

pub use app::consumer::Callbacks;
pub use app::reading::MotionReading;
pub use app::watch::WatchId;
pub use config::{MotionConfig, RequestOptions, WatchOptions};
pub use error::{Error, Result, StreamError};
pub use runtime::DeviceMotion;
