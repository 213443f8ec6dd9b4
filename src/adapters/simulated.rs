//! Simulated motion bridge and compass.
//!
//! Stand-ins for the platform adapters on hosts without motion hardware.
//! Each active stream runs on its own worker thread and pushes samples
//! through the [`SampleSink`] it was started with, exactly like a native
//! bridge delivering on its own thread.
//!
//! - [`SimulatedBridge`]: a synthetic rotation waveform, or a recorded
//!   JSON trace of [`RawMotion`] samples replayed in a loop.
//! - [`SimulatedCompass`]: a heading that rotates at a fixed rate.

use core::time::Duration;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use anyhow::{Context, ensure};
use log::{info, warn};

use crate::app::ports::{HeadingHandle, HeadingProvider, MotionBridge};
use crate::app::reading::{HeadingSample, RawMotion};
use crate::error::StreamError;
use crate::events::SampleSink;

// ── Worker thread ────────────────────────────────────────────

struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl Worker {
    fn spawn(
        name: &str,
        body: impl FnOnce(Arc<AtomicBool>) + Send + 'static,
    ) -> std::io::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let flag = stop.clone();
        let handle = thread::Builder::new()
            .name(name.into())
            .spawn(move || body(flag))?;
        Ok(Self { stop, handle })
    }

    fn shutdown(self) {
        self.stop.store(true, Ordering::Release);
        if self.handle.join().is_err() {
            warn!("simulated sensor worker panicked");
        }
    }
}

fn spawn_failure(error: &std::io::Error) -> StreamError {
    StreamError::Native {
        code: -1,
        message: format!("worker spawn failed: {error}"),
    }
}

// ── Motion bridge ────────────────────────────────────────────

#[derive(Clone)]
enum SampleSource {
    Waveform,
    Trace(Arc<[RawMotion]>),
}

impl SampleSource {
    fn sample(&self, n: u64, period: Duration) -> RawMotion {
        match self {
            Self::Waveform => {
                let t = n as f64 * period.as_secs_f64();
                let alpha = (n as f64 * 3.0) % 360.0;
                let beta = 30.0 * (t * 1.5).sin();
                let gamma = 15.0 * (t * 0.8).cos();
                RawMotion {
                    yaw: alpha,
                    pitch: beta,
                    roll: gamma,
                    alpha,
                    beta,
                    gamma,
                    timestamp: t * 1000.0,
                }
            }
            Self::Trace(samples) => samples[(n % samples.len() as u64) as usize],
        }
    }
}

/// Motion bridge emitting synthetic or recorded samples at a fixed period.
pub struct SimulatedBridge {
    source: SampleSource,
    period: Duration,
    fail_with: Option<StreamError>,
    worker: Option<Worker>,
}

impl SimulatedBridge {
    /// Synthetic waveform at `period`.
    pub fn waveform(period: Duration) -> Self {
        Self {
            source: SampleSource::Waveform,
            period,
            fail_with: None,
            worker: None,
        }
    }

    /// Replay a JSON array of bridge payloads in a loop.
    pub fn from_trace_json(json: &str, period: Duration) -> anyhow::Result<Self> {
        let samples: Vec<RawMotion> =
            serde_json::from_str(json).context("parsing motion trace")?;
        ensure!(!samples.is_empty(), "motion trace is empty");
        Ok(Self {
            source: SampleSource::Trace(samples.into()),
            period,
            fail_with: None,
            worker: None,
        })
    }

    /// [`from_trace_json`](Self::from_trace_json) reading from a file.
    pub fn from_trace_file(path: impl AsRef<Path>, period: Duration) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading motion trace {}", path.display()))?;
        Self::from_trace_json(&json, period)
    }

    /// Report `error` instead of streaming on every start.
    #[must_use]
    pub fn failing_with(mut self, error: StreamError) -> Self {
        self.fail_with = Some(error);
        self
    }

    pub fn is_streaming(&self) -> bool {
        self.worker.is_some()
    }
}

impl MotionBridge for SimulatedBridge {
    fn start(&mut self, sink: SampleSink) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
        if let Some(error) = &self.fail_with {
            sink.motion_error(error.clone());
            return;
        }

        let source = self.source.clone();
        let period = self.period;
        let worker_sink = sink.clone();
        let spawned = Worker::spawn("motion-sim", move |stop| {
            let mut n = 0u64;
            while !stop.load(Ordering::Acquire) {
                worker_sink.motion(source.sample(n, period));
                n = n.wrapping_add(1);
                thread::sleep(period);
            }
        });

        match spawned {
            Ok(worker) => {
                info!(
                    "simulated bridge streaming every {} ms (session {})",
                    period.as_millis(),
                    sink.session()
                );
                self.worker = Some(worker);
            }
            Err(e) => {
                sink.motion_error(spawn_failure(&e));
            }
        }
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
            info!("simulated bridge stopped");
        }
    }
}

impl Drop for SimulatedBridge {
    fn drop(&mut self) {
        self.stop();
    }
}

// ── Compass ──────────────────────────────────────────────────

/// Heading provider rotating `degrees_per_sec` from `initial` degrees.
pub struct SimulatedCompass {
    initial: f64,
    degrees_per_sec: f64,
    next_handle: u32,
    watches: HashMap<HeadingHandle, Worker>,
}

impl SimulatedCompass {
    pub fn new(initial: f64, degrees_per_sec: f64) -> Self {
        Self {
            initial,
            degrees_per_sec,
            next_handle: 0,
            watches: HashMap::new(),
        }
    }

    pub fn active_watches(&self) -> usize {
        self.watches.len()
    }
}

impl Default for SimulatedCompass {
    fn default() -> Self {
        Self::new(0.0, 10.0)
    }
}

impl HeadingProvider for SimulatedCompass {
    fn watch_heading(&mut self, sink: SampleSink, frequency: Duration) -> HeadingHandle {
        self.next_handle = self.next_handle.wrapping_add(1);
        let handle = HeadingHandle(self.next_handle);

        let (initial, rate) = (self.initial, self.degrees_per_sec);
        let worker_sink = sink.clone();
        let spawned = Worker::spawn("compass-sim", move |stop| {
            let mut n = 0u64;
            while !stop.load(Ordering::Acquire) {
                let t = n as f64 * frequency.as_secs_f64();
                let true_heading = (initial + rate * t).rem_euclid(360.0);
                worker_sink.heading(HeadingSample {
                    magnetic_heading: (true_heading - 4.0).rem_euclid(360.0),
                    true_heading,
                    heading_accuracy: 5.0,
                    timestamp: t * 1000.0,
                });
                n = n.wrapping_add(1);
                thread::sleep(frequency);
            }
        });

        match spawned {
            Ok(worker) => {
                self.watches.insert(handle, worker);
            }
            Err(e) => {
                sink.heading_error(spawn_failure(&e));
            }
        }
        handle
    }

    fn clear_watch(&mut self, handle: HeadingHandle) {
        if let Some(worker) = self.watches.remove(&handle) {
            worker.shutdown();
        }
    }
}

impl Drop for SimulatedCompass {
    fn drop(&mut self) {
        for (_, worker) in self.watches.drain() {
            worker.shutdown();
        }
    }
}
