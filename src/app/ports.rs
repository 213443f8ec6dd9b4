//! Port traits: the boundary between subscription logic and the platform.
//!
//! ```text
//!   Native adapter ──▶ Port trait ──▶ MotionService (domain)
//! ```
//!
//! The [`MotionService`](super::service::MotionService) owns one bridge and
//! one heading provider and drives them only through these traits.  Adapters
//! report data asynchronously through the [`SampleSink`] they are handed;
//! they must never call back into the service from `start`/`watch_heading`.

use core::time::Duration;

use crate::events::SampleSink;

use super::watch::WatchId;

// ───────────────────────────────────────────────────────────────
// Native motion bridge
// ───────────────────────────────────────────────────────────────

/// Platform component producing raw orientation/motion samples.
pub trait MotionBridge {
    /// Begin streaming.  Samples and failures (including failure to start)
    /// go to `sink`, never synchronously to the caller.
    fn start(&mut self, sink: SampleSink);

    /// End streaming.  Must be idempotent.
    fn stop(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Heading provider
// ───────────────────────────────────────────────────────────────

/// Opaque handle to an active heading subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HeadingHandle(pub u32);

/// Compass subsystem used to enrich readings with a true heading.
pub trait HeadingProvider {
    /// Subscribe to heading updates delivered to `sink` at roughly
    /// `frequency`.
    fn watch_heading(&mut self, sink: SampleSink, frequency: Duration) -> HeadingHandle;

    /// Cancel a prior subscription.  Unknown handles are ignored.
    fn clear_watch(&mut self, handle: HeadingHandle);
}

// ───────────────────────────────────────────────────────────────
// Watch identifiers
// ───────────────────────────────────────────────────────────────

/// Source of opaque watch identifiers.
///
/// Identifiers must be unique for the lifetime of the process.
pub trait WatchIdSource {
    fn next_id(&mut self) -> WatchId;
}
