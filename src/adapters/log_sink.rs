//! Log-based consumer.
//!
//! [`logging_callbacks`] builds a [`Callbacks`] pair that writes every
//! delivered reading and error to the `log` facade.  Handy for soak runs
//! against the simulated adapters, or for tracing a live stream alongside
//! real consumers.

use log::{info, warn};

use crate::app::consumer::Callbacks;

/// Callbacks that log each reading under `label`.
pub fn logging_callbacks(label: &'static str) -> Callbacks {
    Callbacks::new(move |r| {
        info!(
            "MOTION | {} | a={:.1} b={:.1} g={:.1} | ypr={:.1}/{:.1}/{:.1} | \
             heading={:.1}\u{00b0} | t={:.0}",
            label, r.alpha, r.beta, r.gamma, r.yaw, r.pitch, r.roll, r.heading, r.timestamp,
        );
    })
    .on_error(move |e| warn!("MOTION | {} | error: {}", label, e))
}
