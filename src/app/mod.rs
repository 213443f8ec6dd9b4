//! Application core: subscription logic, zero I/O.
//!
//! Consumers, watches and the stream lifecycle live in [`service`].  All
//! interaction with native sensors happens through the **port traits** in
//! [`ports`], keeping this layer testable without real hardware.

pub mod consumer;
pub mod ports;
pub mod reading;
pub mod service;
pub mod watch;
