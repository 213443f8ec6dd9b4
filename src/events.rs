//! Sensor event queue.
//!
//! Native adapters never touch consumers.  Each start of the stream hands
//! them a [`SampleSink`] stamped with the session number; they push raw
//! samples into a bounded channel that the manager drains on its own loop.
//!
//! ```text
//! ┌──────────────────┐             ┌──────────────┐     ┌────────────────┐
//! │ MotionBridge     │──SampleSink▶│              │     │                │
//! │ (native thread)  │             │ EventChannel │────▶│ MotionService  │
//! │ HeadingProvider  │──SampleSink▶│ (bounded 32) │     │ (event loop)   │
//! └──────────────────┘             └──────────────┘     └────────────────┘
//! ```

use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::warn;

use crate::app::reading::{HeadingSample, RawMotion};
use crate::error::StreamError;

/// Maximum number of undelivered sensor events.
pub const EVENT_QUEUE_DEPTH: usize = 32;

type EventChannel = Channel<CriticalSectionRawMutex, SensorEvent, EVENT_QUEUE_DEPTH>;

/// One sample (or failure) from a native source, tagged with the stream
/// session that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorEvent {
    pub session: u32,
    pub sample: Sample,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    /// Native motion success event.
    Motion(RawMotion),
    /// Native motion failure.
    MotionError(StreamError),
    /// Heading provider update.
    Heading(HeadingSample),
    /// Heading provider failure (logged, never fanned out).
    HeadingError(StreamError),
}

// ── Queue ─────────────────────────────────────────────────────

/// Shared handle to the event channel.  Cheap to clone.
#[derive(Clone)]
pub struct EventQueue {
    channel: Arc<EventChannel>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        Self {
            channel: Arc::new(Channel::new()),
        }
    }

    /// Sink for adapters started under `session`.
    pub fn sink(&self, session: u32) -> SampleSink {
        SampleSink {
            queue: self.clone(),
            session,
        }
    }

    /// Wait for the next event.
    pub async fn receive(&self) -> SensorEvent {
        self.channel.receive().await
    }

    /// Pop the next event without waiting.
    pub fn try_receive(&self) -> Option<SensorEvent> {
        self.channel.try_receive().ok()
    }

    pub fn len(&self) -> usize {
        self.channel.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    fn push(&self, event: SensorEvent) -> bool {
        if self.channel.try_send(event).is_err() {
            warn!("sensor event queue full, dropping event");
            return false;
        }
        true
    }
}

// ── Sink ──────────────────────────────────────────────────────

/// Producer half handed to native adapters.
///
/// `Send + Sync + Clone`: adapters may move it onto their own worker
/// threads.  Every push returns `false` if the event was dropped.
#[derive(Clone)]
pub struct SampleSink {
    queue: EventQueue,
    session: u32,
}

impl SampleSink {
    pub fn session(&self) -> u32 {
        self.session
    }

    pub fn motion(&self, raw: RawMotion) -> bool {
        self.send(Sample::Motion(raw))
    }

    pub fn motion_error(&self, error: StreamError) -> bool {
        self.send(Sample::MotionError(error))
    }

    pub fn heading(&self, heading: HeadingSample) -> bool {
        self.send(Sample::Heading(heading))
    }

    pub fn heading_error(&self, error: StreamError) -> bool {
        self.send(Sample::HeadingError(error))
    }

    fn send(&self, sample: Sample) -> bool {
        self.queue.push(SensorEvent {
            session: self.session,
            sample,
        })
    }
}
