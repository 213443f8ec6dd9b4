//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements       | Connects to                      |
//! |-------------|------------------|----------------------------------|
//! | `simulated` | MotionBridge     | Worker thread, waveform / trace  |
//! |             | HeadingProvider  | Worker thread, rotating heading  |
//! | `log_sink`  | Callbacks        | `log` facade                     |
//!
//! Platform bridges live with their host integration and implement the
//! same traits.

pub mod log_sink;
pub mod simulated;
