//! Integration tests: DeviceMotion runtime → MotionService → mock sensors.

use core::time::Duration;
use std::cell::RefCell;
use std::rc::Rc;

use devicemotion::app::consumer::Callbacks;
use devicemotion::app::watch::WatchId;
use devicemotion::config::{MotionConfig, RequestOptions, WatchOptions};
use devicemotion::error::{Error, StreamError, UsageError};
use devicemotion::runtime::DeviceMotion;
use serde_json::json;

use super::mock_sensors::{MockBridge, MockCompass, Tap, Recorder, mock_sensors, raw};

type Motion = DeviceMotion<MockBridge, MockCompass>;

fn make_motion() -> (Motion, Tap) {
    let (bridge, compass, tap) = mock_sensors();
    let motion = DeviceMotion::new(bridge, compass, MotionConfig::default()).unwrap();
    (motion, tap)
}

const SETTLE: Duration = Duration::from_millis(15);

// ── One-shot ─────────────────────────────────────────────────

#[test]
fn one_shot_resolves_once_and_stops_stream() {
    let (motion, tap) = make_motion();
    let rec = Recorder::default();
    motion.get_current_motion(rec.callbacks(), RequestOptions);
    assert!(motion.is_running());
    assert_eq!(tap.starts(), 1);
    assert_eq!(tap.heading_watches(), 1);
    assert_eq!(tap.heading_frequency(), Some(Duration::from_millis(50)));

    tap.emit(raw(7.0));
    assert_eq!(rec.reading_count(), 0, "delivery is never synchronous with the push");

    motion.run_for(SETTLE);
    assert_eq!(rec.reading_count(), 1);
    assert_eq!(rec.error_count(), 0);
    assert!(!motion.is_running());
    assert_eq!(tap.stops(), 1);
    assert_eq!(tap.heading_watches(), 0);
    assert!(motion.latest_reading().is_none());
}

#[test]
fn one_shot_error_is_delivered_once() {
    let (motion, tap) = make_motion();
    let rec = Recorder::default();
    motion.get_current_motion(rec.callbacks(), RequestOptions);
    tap.emit_error(StreamError::SensorUnavailable);
    tap.emit(raw(1.0));
    motion.run_for(SETTLE);
    assert_eq!(rec.error_count(), 1);
    assert_eq!(rec.reading_count(), 0);
    assert_eq!(motion.consumer_count(), 0);
}

#[test]
fn pending_one_shot_never_resolves_without_events() {
    let (motion, _tap) = make_motion();
    let rec = Recorder::default();
    motion.get_current_motion(rec.callbacks(), RequestOptions);
    motion.run_for(Duration::from_millis(60));
    assert_eq!(rec.reading_count() + rec.error_count(), 0);
    assert!(motion.is_running());
}

// ── Watches ──────────────────────────────────────────────────

#[test]
fn watch_skips_ticks_before_first_reading_then_delivers_at_cadence() {
    let (motion, tap) = make_motion();
    let rec = Recorder::default();
    let id = motion
        .watch_motion(rec.callbacks(), WatchOptions::with_frequency_ms(20))
        .unwrap();
    assert_eq!(motion.timer_count(), 1);

    motion.run_for(Duration::from_millis(70));
    assert_eq!(rec.reading_count(), 0);

    tap.emit(raw(3.0));
    motion.run_for(Duration::from_millis(130));
    assert!(
        rec.reading_count() >= 2,
        "expected repeated deliveries, got {}",
        rec.reading_count()
    );
    assert!(rec.readings.borrow().iter().all(|r| (r.alpha - 3.0).abs() < f64::EPSILON));

    motion.clear_watch(&id);
    assert_eq!(motion.timer_count(), 0);
    assert!(!motion.is_running());
    assert_eq!(tap.stops(), 1);

    let after_clear = rec.reading_count();
    motion.run_for(Duration::from_millis(60));
    assert_eq!(rec.reading_count(), after_clear);
}

#[test]
fn concurrent_watches_keep_independent_cadences() {
    let (motion, tap) = make_motion();
    let fast = Recorder::default();
    let slow = Recorder::default();
    let fast_id = motion
        .watch_motion(fast.callbacks(), WatchOptions::with_frequency_ms(10))
        .unwrap();
    let slow_id = motion
        .watch_motion(slow.callbacks(), WatchOptions::with_frequency_ms(60))
        .unwrap();
    assert_eq!(motion.timer_count(), 2);

    tap.emit(raw(4.0));
    motion.run_for(Duration::from_millis(200));
    let (fast_n, slow_n) = (fast.reading_count(), slow.reading_count());
    assert!((1..=4).contains(&slow_n), "slow watch delivered {slow_n} times");
    assert!(fast_n >= 8, "fast watch delivered {fast_n} times");
    assert!(fast_n > 2 * slow_n);

    motion.clear_watch(&fast_id);
    assert!(motion.is_running());
    assert_eq!(motion.timer_count(), 1);
    motion.run_for(Duration::from_millis(150));
    assert_eq!(fast.reading_count(), fast_n);
    assert!(slow.reading_count() > slow_n, "slow watch kept delivering");
    assert_eq!(slow.last_alpha(), Some(4.0));

    motion.clear_watch(&slow_id);
    assert!(!motion.is_running());
}

#[test]
fn watch_delivers_only_the_latest_reading() {
    let (motion, tap) = make_motion();
    let rec = Recorder::default();
    motion
        .watch_motion(rec.callbacks(), WatchOptions::with_frequency_ms(40))
        .unwrap();
    tap.emit(raw(1.0));
    tap.emit(raw(2.0));
    tap.emit(raw(3.0));
    motion.run_for(Duration::from_millis(60));
    assert!(rec.reading_count() >= 1);
    assert_eq!(rec.last_alpha(), Some(3.0));
    assert!(rec.readings.borrow().iter().all(|r| (r.alpha - 3.0).abs() < f64::EPSILON));
}

#[test]
fn non_numeric_frequency_uses_default_cadence() {
    let (motion, _tap) = make_motion();
    let id = motion
        .watch_motion_json(Callbacks::new(|_| {}), &json!({ "frequency": "fast" }))
        .unwrap();
    let period = motion.inspect(|s| s.watch_period(&id));
    assert_eq!(period, Some(Duration::from_millis(50)));

    let id = motion
        .watch_motion_json(Callbacks::new(|_| {}), &json!(null))
        .unwrap();
    assert_eq!(
        motion.inspect(|s| s.watch_period(&id)),
        Some(Duration::from_millis(50))
    );
}

#[test]
fn malformed_options_fail_before_any_state_change() {
    let (motion, tap) = make_motion();
    let err = motion
        .watch_motion_json(Callbacks::new(|_| {}), &json!(42))
        .unwrap_err();
    assert_eq!(
        err,
        Error::Usage(UsageError::OptionsNotObject {
            call: "devicemotion.watchMotion",
            found: "number",
        })
    );
    assert!(
        motion
            .get_current_motion_json(Callbacks::new(|_| {}), &json!("x"))
            .is_err()
    );
    assert_eq!(motion.consumer_count(), 0);
    assert_eq!(motion.timer_count(), 0);
    assert_eq!(tap.starts(), 0);
    assert!(!motion.is_running());
}

#[test]
fn new_watch_replays_cached_reading_synchronously() {
    let (motion, tap) = make_motion();
    let first = Recorder::default();
    motion
        .watch_motion(first.callbacks(), WatchOptions::with_frequency_ms(500))
        .unwrap();
    tap.emit(raw(9.0));
    motion.run_for(SETTLE);

    let second = Recorder::default();
    motion
        .watch_motion(second.callbacks(), WatchOptions::with_frequency_ms(500))
        .unwrap();
    assert_eq!(second.reading_count(), 1, "replayed before watch_motion returned");
    assert_eq!(second.last_alpha(), Some(9.0));
    assert_eq!(tap.starts(), 1);
}

#[test]
fn clear_watch_twice_is_safe() {
    let (motion, tap) = make_motion();
    let id = motion
        .watch_motion(Callbacks::new(|_| {}), WatchOptions::default())
        .unwrap();
    motion.clear_watch(&id);
    motion.clear_watch(&id);
    motion.clear_watch(&WatchId::new("never-issued").unwrap());
    assert_eq!(tap.stops(), 1);
    assert!(!motion.is_running());
}

#[test]
fn callback_can_clear_its_own_watch() {
    let (motion, tap) = make_motion();
    let hits = Rc::new(RefCell::new(0u32));
    let own_id: Rc<RefCell<Option<WatchId>>> = Rc::default();

    let cb_motion = motion.clone();
    let cb_hits = hits.clone();
    let cb_id = own_id.clone();
    let id = motion
        .watch_motion(
            Callbacks::new(move |_| {
                *cb_hits.borrow_mut() += 1;
                if let Some(id) = cb_id.borrow().as_ref() {
                    cb_motion.clear_watch(id);
                }
            }),
            WatchOptions::with_frequency_ms(10),
        )
        .unwrap();
    *own_id.borrow_mut() = Some(id);

    tap.emit(raw(1.0));
    motion.run_for(Duration::from_millis(80));
    assert_eq!(*hits.borrow(), 1);
    assert!(!motion.is_running());
    assert_eq!(motion.timer_count(), 0);
}

#[test]
fn consumer_added_during_fan_out_waits_for_next_event() {
    let (motion, tap) = make_motion();
    let late = Recorder::default();

    let cb_motion = motion.clone();
    let cb_late = late.clone();
    motion.get_current_motion(
        Callbacks::new(move |_| {
            cb_motion.get_current_motion(cb_late.callbacks(), RequestOptions);
        }),
        RequestOptions,
    );

    tap.emit(raw(1.0));
    motion.run_for(SETTLE);
    assert_eq!(late.reading_count(), 0);
    // First consumer's removal stopped the stream; the late one restarted it.
    assert_eq!(tap.starts(), 2);
    assert!(motion.is_running());

    tap.emit(raw(2.0));
    motion.run_for(SETTLE);
    assert_eq!(late.last_alpha(), Some(2.0));
    assert!(!motion.is_running());
}

#[test]
fn re_entrant_one_shot_keeps_stream_running() {
    let (motion, tap) = make_motion();
    let late = Recorder::default();
    let seen_running: Rc<RefCell<Option<(bool, u32)>>> = Rc::default();

    let cb_motion = motion.clone();
    let cb_tap = tap.clone();
    let cb_seen = seen_running.clone();
    let cb_late = late.clone();
    motion.get_current_motion(
        Callbacks::new(move |_| {
            *cb_seen.borrow_mut() = Some((cb_motion.is_running(), cb_tap.stops()));
            cb_motion.get_current_motion(cb_late.callbacks(), RequestOptions);
        }),
        RequestOptions,
    );
    let second = Recorder::default();
    motion.get_current_motion(second.callbacks(), RequestOptions);

    tap.emit(raw(1.0));
    motion.run_for(SETTLE);
    // The second one-shot was still pending when the first callback ran.
    assert_eq!(*seen_running.borrow(), Some((true, 0)));
    assert_eq!(second.last_alpha(), Some(1.0));
    assert_eq!(late.reading_count(), 0);
    assert!(motion.is_running());
    assert_eq!(tap.starts(), 1);
    assert_eq!(tap.stops(), 0);

    tap.emit(raw(2.0));
    motion.run_for(SETTLE);
    assert_eq!(late.last_alpha(), Some(2.0));
    assert!(!motion.is_running());
    assert_eq!(tap.starts(), 1);
    assert_eq!(tap.stops(), 1);
}

#[test]
fn events_from_stopped_session_are_ignored() {
    let (motion, tap) = make_motion();
    motion.get_current_motion(Callbacks::new(|_| {}), RequestOptions);
    let stale = tap.last_motion_sink().unwrap();
    tap.emit(raw(1.0));
    motion.run_for(SETTLE);

    let rec = Recorder::default();
    motion.get_current_motion(rec.callbacks(), RequestOptions);
    stale.motion(raw(66.0));
    motion.run_for(SETTLE);
    assert_eq!(rec.reading_count(), 0);

    tap.emit(raw(2.0));
    motion.run_for(SETTLE);
    assert_eq!(rec.last_alpha(), Some(2.0));
}

#[test]
fn heading_enriches_readings() {
    let (motion, tap) = make_motion();
    let rec = Recorder::default();
    motion
        .watch_motion(rec.callbacks(), WatchOptions::with_frequency_ms(10))
        .unwrap();
    tap.emit(raw(20.0));
    motion.run_for(SETTLE);
    assert!((motion.latest_reading().unwrap().heading - 20.0).abs() < f64::EPSILON);

    tap.emit_heading(181.5);
    tap.emit(raw(21.0));
    motion.run_for(SETTLE);
    let latest = motion.latest_reading().unwrap();
    assert!((latest.heading - 181.5).abs() < f64::EPSILON);
    assert!((latest.alpha - 21.0).abs() < f64::EPSILON);
}

#[test]
fn watch_error_deregisters_and_forwards() {
    let (motion, tap) = make_motion();
    let a = Recorder::default();
    let id = motion
        .watch_motion(a.callbacks(), WatchOptions::default())
        .unwrap();
    tap.emit_error(StreamError::PermissionDenied);
    motion.run_for(SETTLE);
    assert_eq!(*a.errors.borrow(), vec![StreamError::PermissionDenied]);
    assert_eq!(motion.consumer_count(), 0);
    assert!(!motion.is_running());
    motion.clear_watch(&id);
    assert_eq!(tap.stops(), 1);
}

#[test]
fn too_many_watches_is_reported() {
    let (bridge, compass, _tap) = mock_sensors();
    let config = MotionConfig {
        max_watches: 1,
        ..MotionConfig::default()
    };
    let motion = DeviceMotion::new(bridge, compass, config).unwrap();
    motion
        .watch_motion(Callbacks::new(|_| {}), WatchOptions::default())
        .unwrap();
    let err = motion
        .watch_motion(Callbacks::new(|_| {}), WatchOptions::default())
        .unwrap_err();
    assert_eq!(err, Error::TooManyWatches { limit: 1 });
    assert_eq!(motion.timer_count(), 1);
}

// ── End-to-end scenario ──────────────────────────────────────

#[test]
fn recurring_then_one_shot_then_cancel() {
    let (motion, tap) = make_motion();

    let a = Recorder::default();
    let id_a = motion
        .watch_motion(a.callbacks(), WatchOptions::with_frequency_ms(50))
        .unwrap();
    assert!(motion.is_running());

    tap.emit(raw(1.0));
    motion.run_for(Duration::from_millis(80));
    assert_eq!(a.last_alpha(), Some(1.0));

    let b = Recorder::default();
    motion.get_current_motion(b.callbacks(), RequestOptions);
    assert_eq!(tap.starts(), 1, "running stream is not restarted");

    tap.emit(raw(2.0));
    motion.run_for(Duration::from_millis(80));
    assert_eq!(b.reading_count(), 1);
    assert_eq!(b.last_alpha(), Some(2.0));
    assert_eq!(a.last_alpha(), Some(2.0));

    motion.clear_watch(&id_a);
    assert_eq!(motion.consumer_count(), 0);
    assert!(!motion.is_running());
    assert_eq!(tap.stops(), 1);
}
