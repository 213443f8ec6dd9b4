//! Consumer callbacks and deferred deliveries.
//!
//! The service never invokes callbacks while it is being mutated.  Every
//! operation that would notify a consumer returns [`Delivery`] values
//! instead; the caller dispatches them once its borrow of the service is
//! released, so a callback is free to call back into the runtime.
//!
//! A delivery that resolves a consumer carries that consumer's id.  The
//! caller releases it from the service immediately before running the
//! callback, one delivery at a time, so the stream only stops when the
//! last consumer of a batch is released.

use std::rc::Rc;

use crate::error::StreamError;

use super::reading::MotionReading;

pub type ReadingCallback = Rc<dyn Fn(&MotionReading)>;
pub type ErrorCallback = Rc<dyn Fn(&StreamError)>;

/// Success/error callback pair supplied by a caller.
#[derive(Clone)]
pub struct Callbacks {
    pub(crate) on_reading: ReadingCallback,
    pub(crate) on_error: Option<ErrorCallback>,
}

impl Callbacks {
    pub fn new(on_reading: impl Fn(&MotionReading) + 'static) -> Self {
        Self {
            on_reading: Rc::new(on_reading),
            on_error: None,
        }
    }

    /// Attach an error callback.
    #[must_use]
    pub fn on_error(mut self, on_error: impl Fn(&StreamError) + 'static) -> Self {
        self.on_error = Some(Rc::new(on_error));
        self
    }
}

impl core::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_error", &self.on_error.is_some())
            .finish_non_exhaustive()
    }
}

/// Identity of a registered consumer within one service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(pub(crate) u64);

enum Notify {
    Reading {
        callback: ReadingCallback,
        reading: MotionReading,
    },
    Error {
        callback: ErrorCallback,
        error: StreamError,
    },
    /// Consumer resolved without a matching callback (error, no `on_error`).
    Nothing,
}

/// A callback invocation waiting to run.
pub struct Delivery {
    release: Option<ConsumerId>,
    notify: Notify,
}

impl Delivery {
    pub(crate) fn reading(callback: ReadingCallback, reading: MotionReading) -> Self {
        Self {
            release: None,
            notify: Notify::Reading { callback, reading },
        }
    }

    pub(crate) fn error(callback: Option<ErrorCallback>, error: StreamError) -> Self {
        let notify = match callback {
            Some(callback) => Notify::Error { callback, error },
            None => Notify::Nothing,
        };
        Self {
            release: None,
            notify,
        }
    }

    /// Mark this delivery as resolving consumer `id`.
    #[must_use]
    pub(crate) fn releasing(mut self, id: ConsumerId) -> Self {
        self.release = Some(id);
        self
    }

    /// Consumer to release from the service before [`dispatch`](Self::dispatch).
    pub fn release(&self) -> Option<ConsumerId> {
        self.release
    }

    /// Invoke the callback, if any.
    pub fn dispatch(self) {
        match self.notify {
            Notify::Reading { callback, reading } => callback(&reading),
            Notify::Error { callback, error } => callback(&error),
            Notify::Nothing => {}
        }
    }

    /// Reading carried by this delivery.
    pub fn reading_value(&self) -> Option<&MotionReading> {
        match &self.notify {
            Notify::Reading { reading, .. } => Some(reading),
            _ => None,
        }
    }
}

impl core::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut s = f.debug_struct("Delivery");
        s.field("release", &self.release);
        match &self.notify {
            Notify::Reading { reading, .. } => s.field("reading", reading),
            Notify::Error { error, .. } => s.field("error", error),
            Notify::Nothing => s.field("notify", &"nothing"),
        };
        s.finish()
    }
}
