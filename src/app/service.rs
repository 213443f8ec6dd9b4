//! Motion subscription service: the hexagonal core.
//!
//! [`MotionService`] owns the active-consumer set, the watch table and the
//! stream state.  It drives the native bridge and the heading provider
//! through port traits and never invokes a consumer itself: every operation
//! that notifies someone returns [`Delivery`] values for the caller to
//! dispatch.
//!
//! ```text
//!  get_current_motion ─┐                     ┌──▶ MotionBridge::start/stop
//!  watch_motion ───────┼──▶ MotionService ───┤
//!  clear_watch ────────┘    consumers        └──▶ HeadingProvider::watch/clear
//!                           watches
//!  SensorEvent ────────────▶ latest reading ───▶ Vec<Delivery>
//! ```
//!
//! Invariant: the stream is running iff the consumer set is non-empty.

use core::time::Duration;
use std::collections::HashMap;

use log::{debug, info, warn};

use crate::config::{MotionConfig, RequestOptions, WatchOptions};
use crate::error::{ConfigError, Error, StreamError};
use crate::events::{EventQueue, Sample, SensorEvent};

use super::consumer::{Callbacks, ConsumerId, Delivery, ReadingCallback};
use super::ports::{HeadingHandle, HeadingProvider, MotionBridge, WatchIdSource};
use super::reading::{MotionReading, RawMotion};
use super::watch::{ProcessWatchIds, WatchId};

// ───────────────────────────────────────────────────────────────
// Stream state
// ───────────────────────────────────────────────────────────────

/// Lifecycle state of the native stream.
#[derive(Debug, Default)]
pub struct StreamState {
    running: bool,
    latest: Option<MotionReading>,
    heading_handle: Option<HeadingHandle>,
    last_heading: Option<f64>,
    session: u32,
}

impl StreamState {
    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn latest(&self) -> Option<&MotionReading> {
        self.latest.as_ref()
    }

    pub fn heading_handle(&self) -> Option<HeadingHandle> {
        self.heading_handle
    }

    /// Last true heading reported during the current session.
    pub fn last_heading(&self) -> Option<f64> {
        self.last_heading
    }

    /// Incremented on every start.
    pub fn session(&self) -> u32 {
        self.session
    }
}

// ───────────────────────────────────────────────────────────────
// Registrations
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    /// Resolved by the next native event, then removed.
    OneShot,
    /// Serviced by a cadence timer; push events are ignored.
    Watch,
}

struct Consumer {
    id: ConsumerId,
    role: Role,
    callbacks: Callbacks,
}

struct Watch {
    consumer: ConsumerId,
    on_reading: ReadingCallback,
    period: Duration,
}

/// Result of [`MotionService::watch_motion`].
#[derive(Debug)]
pub struct WatchRegistration {
    pub id: WatchId,
    /// Cadence the timer must run at.
    pub period: Duration,
    /// Cached reading to hand over immediately, present only when the
    /// stream was already running and had produced a reading.
    pub replay: Option<Delivery>,
}

/// Outcome of one cadence tick.
#[derive(Debug)]
pub enum Tick {
    /// The watch no longer exists; stop the timer.
    Cancelled,
    /// No reading cached yet.
    Idle,
    Deliver(Delivery),
}

// ───────────────────────────────────────────────────────────────
// MotionService
// ───────────────────────────────────────────────────────────────

/// Subscription manager for one motion stream.
pub struct MotionService<B, H> {
    bridge: B,
    heading: H,
    config: MotionConfig,
    queue: EventQueue,
    ids: Box<dyn WatchIdSource>,
    /// Active consumers in registration order.
    consumers: Vec<Consumer>,
    watches: HashMap<WatchId, Watch>,
    next_consumer: u64,
    stream: StreamState,
}

impl<B: MotionBridge, H: HeadingProvider> MotionService<B, H> {
    /// Build a stopped service.  Adapters receive sinks feeding `queue`.
    pub fn new(
        bridge: B,
        heading: H,
        config: MotionConfig,
        queue: EventQueue,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            bridge,
            heading,
            config,
            queue,
            ids: Box::new(ProcessWatchIds),
            consumers: Vec::new(),
            watches: HashMap::new(),
            next_consumer: 0,
            stream: StreamState::default(),
        })
    }

    /// Replace the watch id source.
    #[must_use]
    pub fn with_id_source(mut self, ids: impl WatchIdSource + 'static) -> Self {
        self.ids = Box::new(ids);
        self
    }

    // ── Requests ──────────────────────────────────────────────

    /// Register a one-shot consumer.  It is resolved by the next native
    /// event (reading or error), never by the cached reading.
    pub fn get_current_motion(
        &mut self,
        callbacks: Callbacks,
        _options: RequestOptions,
    ) -> ConsumerId {
        let id = self.register(Role::OneShot, callbacks);
        debug!("one-shot consumer {:?} registered", id);
        if !self.stream.running {
            self.start();
        }
        id
    }

    /// Register a recurring consumer serviced at `options`' cadence.
    pub fn watch_motion(
        &mut self,
        callbacks: Callbacks,
        options: &WatchOptions,
    ) -> Result<WatchRegistration, Error> {
        if self.watches.len() >= self.config.max_watches {
            return Err(Error::TooManyWatches {
                limit: self.config.max_watches,
            });
        }

        let id = self.ids.next_id();
        if self.watches.contains_key(&id) {
            warn!("watch id source repeated {}", id);
            return Err(Error::WatchIdInUse { id });
        }
        let period = options.period(&self.config);
        let on_reading = callbacks.on_reading.clone();
        let consumer = self.register(Role::Watch, callbacks);
        self.watches.insert(
            id.clone(),
            Watch {
                consumer,
                on_reading: on_reading.clone(),
                period,
            },
        );
        info!("watch {} registered ({} ms)", id, period.as_millis());

        let replay = if self.stream.running {
            self.stream
                .latest
                .map(|reading| Delivery::reading(on_reading, reading))
        } else {
            self.start();
            None
        };

        Ok(WatchRegistration { id, period, replay })
    }

    /// Cancel a watch.  Returns `false` for unknown or already-cleared ids.
    pub fn clear_watch(&mut self, id: &WatchId) -> bool {
        let Some(watch) = self.watches.remove(id) else {
            debug!("clear_watch: unknown id {}", id);
            return false;
        };
        info!("watch {} cleared", id);
        self.remove_consumer(watch.consumer);
        true
    }

    // ── Event handling ────────────────────────────────────────

    /// Apply one sensor event and return the deliveries it causes.
    ///
    /// Fan-out covers the consumer set as it stood when the event arrived.
    /// Resolved consumers stay registered until the caller releases them
    /// (see [`Delivery::release`]), so the stream keeps running while the
    /// batch is being dispatched.  Events from an earlier session, or
    /// arriving while stopped, are dropped.
    pub fn handle_event(&mut self, event: SensorEvent) -> Vec<Delivery> {
        if !self.stream.running || event.session != self.stream.session {
            debug!(
                "dropping stale event from session {} (current {}, running={})",
                event.session, self.stream.session, self.stream.running
            );
            return Vec::new();
        }

        match event.sample {
            Sample::Motion(raw) => self.on_motion(&raw),
            Sample::MotionError(error) => self.on_motion_error(&error),
            Sample::Heading(h) => {
                self.stream.last_heading = Some(h.true_heading);
                Vec::new()
            }
            Sample::HeadingError(error) => {
                warn!("heading provider error: {}", error);
                Vec::new()
            }
        }
    }

    /// Drain and settle every queued event without waiting.  Returns the
    /// number of events applied.
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Some(event) = self.queue.try_receive() {
            let deliveries = self.handle_event(event);
            self.settle(deliveries);
            applied += 1;
        }
        applied
    }

    /// Release and dispatch a batch in order, for owners driving the
    /// service directly.  Callbacks cannot reach `self` while it is
    /// mutably borrowed here.
    pub fn settle(&mut self, deliveries: Vec<Delivery>) {
        for delivery in deliveries {
            if let Some(id) = delivery.release() {
                self.release(id);
            }
            delivery.dispatch();
        }
    }

    /// Remove a resolved consumer; stops the stream when none remain.
    /// Returns `false` if it was already gone.
    pub fn release(&mut self, id: ConsumerId) -> bool {
        self.remove_consumer(id)
    }

    /// Service one cadence tick of watch `id`.
    pub fn tick_watch(&self, id: &WatchId) -> Tick {
        let Some(watch) = self.watches.get(id) else {
            return Tick::Cancelled;
        };
        match self.stream.latest {
            Some(reading) => {
                Tick::Deliver(Delivery::reading(watch.on_reading.clone(), reading))
            }
            None => Tick::Idle,
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn is_running(&self) -> bool {
        self.stream.running
    }

    pub fn stream(&self) -> &StreamState {
        &self.stream
    }

    pub fn latest_reading(&self) -> Option<&MotionReading> {
        self.stream.latest.as_ref()
    }

    /// Number of consumers in the active set.
    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    pub fn watch_count(&self) -> usize {
        self.watches.len()
    }

    pub fn has_watch(&self, id: &WatchId) -> bool {
        self.watches.contains_key(id)
    }

    pub fn watch_period(&self, id: &WatchId) -> Option<Duration> {
        self.watches.get(id).map(|w| w.period)
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    pub fn heading(&self) -> &H {
        &self.heading
    }

    // ── Internal ──────────────────────────────────────────────

    fn register(&mut self, role: Role, callbacks: Callbacks) -> ConsumerId {
        let id = ConsumerId(self.next_consumer);
        self.next_consumer += 1;
        self.consumers.push(Consumer {
            id,
            role,
            callbacks,
        });
        id
    }

    /// Remove a consumer; stop the stream when none remain.  Idempotent.
    fn remove_consumer(&mut self, id: ConsumerId) -> bool {
        let Some(idx) = self.consumers.iter().position(|c| c.id == id) else {
            return false;
        };
        self.consumers.remove(idx);
        if self.consumers.is_empty() {
            self.stop();
        }
        true
    }

    fn snapshot(&self) -> Vec<(ConsumerId, Role, Callbacks)> {
        self.consumers
            .iter()
            .map(|c| (c.id, c.role, c.callbacks.clone()))
            .collect()
    }

    fn on_motion(&mut self, raw: &RawMotion) -> Vec<Delivery> {
        let reading = MotionReading::from_raw(raw, self.stream.last_heading);
        self.stream.latest = Some(reading);

        self.snapshot()
            .into_iter()
            .filter(|(_, role, _)| *role == Role::OneShot)
            .map(|(id, _, callbacks)| {
                Delivery::reading(callbacks.on_reading, reading).releasing(id)
            })
            .collect()
    }

    fn on_motion_error(&mut self, error: &StreamError) -> Vec<Delivery> {
        warn!("motion stream error: {}", error);
        // Both roles deregister on error; a watch keeps its timer until
        // clear_watch.
        self.snapshot()
            .into_iter()
            .map(|(id, _, callbacks)| {
                Delivery::error(callbacks.on_error, error.clone()).releasing(id)
            })
            .collect()
    }

    fn start(&mut self) {
        self.stream.session = self.stream.session.wrapping_add(1);
        let session = self.stream.session;
        self.stream.last_heading = None;

        let handle = self
            .heading
            .watch_heading(self.queue.sink(session), self.config.heading_period());
        self.stream.heading_handle = Some(handle);

        self.bridge.start(self.queue.sink(session));
        self.stream.running = true;
        info!("motion stream started (session {})", session);
    }

    fn stop(&mut self) {
        if let Some(handle) = self.stream.heading_handle.take() {
            self.heading.clear_watch(handle);
        }
        self.bridge.stop();
        self.stream.latest = None;
        self.stream.last_heading = None;
        self.stream.running = false;
        info!("motion stream stopped (session {})", self.stream.session);
    }
}
