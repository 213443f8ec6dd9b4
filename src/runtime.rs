//! Async runtime: executor-driven event pump and cadence timers.
//!
//! [`DeviceMotion`] is the public surface.  It wraps a [`MotionService`]
//! and runs two kinds of cooperative tasks on an `edge-executor`
//! [`LocalExecutor`]:
//!
//! 1. **Event pump**: wakes on `EventQueue::receive().await` whenever a
//!    native adapter pushes a sample, applies it, then releases each
//!    resolved consumer just before running its callback.
//! 2. **Cadence**: one per watch; sleeps on an `async-io-mini` reactor
//!    timer and hands the cached reading to the watch's callback.
//!
//! ```text
//!  ┌─────────────────────────────────────────────────────────────┐
//!  │  futures_lite::future::block_on                             │
//!  │  ┌────────────────────────────────────────────────────────┐ │
//!  │  │  edge_executor::LocalExecutor                          │ │
//!  │  │                                                        │ │
//!  │  │  ┌──────────────┐  ┌───────────┐  ┌───────────┐        │ │
//!  │  │  │ Event pump   │  │ Watch #1  │  │ Watch #n  │  ...   │ │
//!  │  │  │ wake-on-send │  │ 50ms ⏱    │  │ 100ms ⏱   │        │ │
//!  │  │  └──────────────┘  └───────────┘  └───────────┘        │ │
//!  │  └────────────────────────────────────────────────────────┘ │
//!  └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Callbacks always run after the service borrow is released, so they may
//! call back into a clone of the same `DeviceMotion` (for example to clear
//! their own watch).  They must not call [`DeviceMotion::run_for`] or
//! [`DeviceMotion::run_until`].

use core::future::Future;
use core::time::Duration;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use edge_executor::{LocalExecutor, Task};
// Host time driver behind the async-io-mini timers.
use embassy_time as _;
use log::{debug, info};
use serde_json::Value;

use crate::app::consumer::{Callbacks, Delivery};
use crate::app::ports::{HeadingProvider, MotionBridge};
use crate::app::reading::MotionReading;
use crate::app::service::{MotionService, Tick};
use crate::app::watch::WatchId;
use crate::config::{MotionConfig, RequestOptions, WatchOptions};
use crate::error::Result;
use crate::events::EventQueue;

/// Run-queue capacity of the executor: every watch task plus the pump
/// must fit.
const EXECUTOR_QUEUE_DEPTH: usize = 64;

// ── Shared state ─────────────────────────────────────────────

struct Inner<B, H> {
    service: RefCell<MotionService<B, H>>,
    /// Cadence task per watch.  Dropping a handle cancels the task.
    /// Declared before `executor` so handles drop first.
    timers: RefCell<HashMap<WatchId, Task<()>>>,
    executor: LocalExecutor<'static, EXECUTOR_QUEUE_DEPTH>,
}

type SharedInner<B, H> = Weak<Inner<B, H>>;

// ── Tasks ────────────────────────────────────────────────────

/// Event pump: truly async, wakes when an adapter pushes into the queue.
async fn event_loop<B: MotionBridge, H: HeadingProvider>(
    queue: EventQueue,
    inner: SharedInner<B, H>,
) {
    loop {
        let event = queue.receive().await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let deliveries = inner.service.borrow_mut().handle_event(event);
        settle(&inner, deliveries);
    }
}

/// Release each resolved consumer immediately before its callback runs.
/// The service borrow is dropped before every dispatch.
fn settle<B: MotionBridge, H: HeadingProvider>(
    inner: &Inner<B, H>,
    deliveries: Vec<Delivery>,
) {
    for delivery in deliveries {
        if let Some(id) = delivery.release() {
            inner.service.borrow_mut().release(id);
        }
        delivery.dispatch();
    }
}

/// Cadence task for one watch.  Exits once the watch is gone.
async fn cadence_loop<B: MotionBridge, H: HeadingProvider>(
    inner: SharedInner<B, H>,
    id: WatchId,
    period: Duration,
) {
    loop {
        async_io_mini::Timer::after(period).await;
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let tick = inner.service.borrow().tick_watch(&id);
        match tick {
            Tick::Cancelled => {
                debug!("cadence task for {} exiting", id);
                break;
            }
            Tick::Idle => {}
            Tick::Deliver(delivery) => delivery.dispatch(),
        }
    }
}

// ── Public surface ───────────────────────────────────────────

/// Device motion API: one-shot reads, cadence watches, cancellation.
///
/// Cheap to clone; clones share one service and one executor.
pub struct DeviceMotion<B, H> {
    inner: Rc<Inner<B, H>>,
}

impl<B, H> Clone for DeviceMotion<B, H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<B: MotionBridge + 'static, H: HeadingProvider + 'static> DeviceMotion<B, H> {
    /// Build a runtime around fresh adapters.
    pub fn new(bridge: B, heading: H, config: MotionConfig) -> Result<Self> {
        let service = MotionService::new(bridge, heading, config, EventQueue::new())?;
        Ok(Self::from_service(service))
    }

    /// Build a runtime around a pre-configured service (custom id source).
    pub fn from_service(service: MotionService<B, H>) -> Self {
        let queue = service.queue().clone();
        let inner = Rc::new(Inner {
            service: RefCell::new(service),
            timers: RefCell::new(HashMap::new()),
            executor: LocalExecutor::new(),
        });

        inner
            .executor
            .spawn(event_loop(queue, Rc::downgrade(&inner)))
            .detach();
        info!("device motion runtime ready");

        Self { inner }
    }

    // ── Requests ──────────────────────────────────────────────

    /// Request exactly one reading (or one error) from the next native event.
    pub fn get_current_motion(&self, callbacks: Callbacks, options: RequestOptions) {
        self.inner
            .service
            .borrow_mut()
            .get_current_motion(callbacks, options);
    }

    /// [`get_current_motion`](Self::get_current_motion) with dynamic options.
    pub fn get_current_motion_json(&self, callbacks: Callbacks, options: &Value) -> Result<()> {
        let options = RequestOptions::from_json(options)?;
        self.get_current_motion(callbacks, options);
        Ok(())
    }

    /// Deliver the latest reading to `callbacks` at the requested cadence.
    ///
    /// If the stream is already running with a cached reading, that
    /// reading is delivered once before this returns.
    pub fn watch_motion(&self, callbacks: Callbacks, options: WatchOptions) -> Result<WatchId> {
        let registration = self
            .inner
            .service
            .borrow_mut()
            .watch_motion(callbacks, &options)?;

        let task = self.inner.executor.spawn(cadence_loop(
            Rc::downgrade(&self.inner),
            registration.id.clone(),
            registration.period,
        ));
        self.inner
            .timers
            .borrow_mut()
            .insert(registration.id.clone(), task);

        if let Some(replay) = registration.replay {
            replay.dispatch();
        }
        Ok(registration.id)
    }

    /// [`watch_motion`](Self::watch_motion) with dynamic options.
    pub fn watch_motion_json(&self, callbacks: Callbacks, options: &Value) -> Result<WatchId> {
        let options = WatchOptions::from_json(options)?;
        self.watch_motion(callbacks, options)
    }

    /// Cancel a watch.  Unknown or already-cleared ids are ignored.
    pub fn clear_watch(&self, id: &WatchId) {
        let task = self.inner.timers.borrow_mut().remove(id);
        drop(task);
        self.inner.service.borrow_mut().clear_watch(id);
    }

    // ── Driving the loop ──────────────────────────────────────

    /// Run the event loop for `duration`.
    pub fn run_for(&self, duration: Duration) {
        self.run_until(async move {
            async_io_mini::Timer::after(duration).await;
        });
    }

    /// Run the event loop until `fut` completes.
    pub fn run_until<F: Future>(&self, fut: F) -> F::Output {
        futures_lite::future::block_on(self.inner.executor.run(fut))
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn is_running(&self) -> bool {
        self.inner.service.borrow().is_running()
    }

    pub fn consumer_count(&self) -> usize {
        self.inner.service.borrow().consumer_count()
    }

    /// Number of live cadence tasks.
    pub fn timer_count(&self) -> usize {
        self.inner.timers.borrow().len()
    }

    pub fn latest_reading(&self) -> Option<MotionReading> {
        self.inner.service.borrow().latest_reading().copied()
    }

    /// Borrow the service for inspection.
    pub fn inspect<R>(&self, f: impl FnOnce(&MotionService<B, H>) -> R) -> R {
        f(&self.inner.service.borrow())
    }
}
