use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use forms_platform_core::PlatformConfig;
use forms_platform_std::StdPlatform;
use futures::channel::oneshot;

fn platform() -> StdPlatform {
    StdPlatform::new(PlatformConfig::default()).expect("platform")
}

/// Resolves to `value` after `delay`, without blocking the main thread.
fn settle_after(delay: Duration, value: bool) -> impl std::future::Future<Output = bool> {
    let (tx, rx) = oneshot::channel();
    thread::spawn(move || {
        thread::sleep(delay);
        let _ = tx.send(value);
    });
    async move { rx.await.unwrap_or(false) }
}

#[test]
fn slow_async_callback_is_bounded_by_non_overlap() {
    let platform = platform();
    let calls = Arc::new(AtomicUsize::new(0));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_in_flight = Arc::new(AtomicUsize::new(0));

    let (calls_cb, in_flight_cb, max_cb) = (calls.clone(), in_flight.clone(), max_in_flight.clone());
    platform
        .services()
        .start_async_timer(Duration::from_millis(10), move || {
            calls_cb.fetch_add(1, Ordering::SeqCst);
            let now = in_flight_cb.fetch_add(1, Ordering::SeqCst) + 1;
            max_cb.fetch_max(now, Ordering::SeqCst);
            let in_flight = in_flight_cb.clone();
            let pending = settle_after(Duration::from_millis(25), true);
            async move {
                let keep = pending.await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                keep
            }
        })
        .expect("start timer");

    platform.run_for(Duration::from_millis(100));

    let calls = calls.load(Ordering::SeqCst);
    assert!(calls >= 1, "callback never ran");
    assert!(calls <= 4, "expected at most 4 invocations, got {calls}");
    assert_eq!(max_in_flight.load(Ordering::SeqCst), 1);
}

#[test]
fn sync_timer_stops_after_returning_false() {
    let platform = platform();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_cb = calls.clone();

    let handle = platform
        .services()
        .start_timer(Duration::from_millis(5), move || {
            calls_cb.fetch_add(1, Ordering::SeqCst) + 1 < 3
        })
        .expect("start timer");

    platform.run_until(Duration::from_secs(2), || calls.load(Ordering::SeqCst) >= 3);
    platform.run_for(Duration::from_millis(50));

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(!handle.is_active());
    assert_eq!(platform.alarms().armed_count(), 0);
}

#[test]
fn callbacks_run_on_the_main_thread() {
    let platform = platform();
    let services = platform.services().clone();
    let on_main = Arc::new(AtomicBool::new(true));
    let calls = Arc::new(AtomicUsize::new(0));
    let (on_main_cb, calls_cb) = (on_main.clone(), calls.clone());

    platform
        .services()
        .start_timer(Duration::from_millis(5), move || {
            if services.is_invoke_required() {
                on_main_cb.store(false, Ordering::SeqCst);
            }
            calls_cb.fetch_add(1, Ordering::SeqCst) + 1 < 3
        })
        .expect("start timer");

    platform.run_until(Duration::from_secs(2), || calls.load(Ordering::SeqCst) >= 3);

    assert!(on_main.load(Ordering::SeqCst));
}

#[test]
fn main_thread_is_detected_across_threads() {
    let platform = platform();
    let services = platform.services();
    assert!(services.is_main_thread());

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let services = services.clone();
            thread::spawn(move || services.is_main_thread())
        })
        .collect();

    for worker in workers {
        assert!(!worker.join().expect("worker"));
    }
}

#[test]
fn ticker_delivers_frames_only_while_enabled() {
    let platform = platform();
    let ticker = platform.services().create_ticker().expect("ticker");
    let frames = Arc::new(AtomicUsize::new(0));
    let frames_cb = frames.clone();
    ticker
        .insert(move |_| {
            frames_cb.fetch_add(1, Ordering::SeqCst);
            true
        })
        .expect("insert");

    platform.run_until(Duration::from_secs(2), || frames.load(Ordering::SeqCst) >= 2);
    assert!(frames.load(Ordering::SeqCst) >= 2);

    ticker.disable().expect("disable");
    platform.run_pending();
    let frozen = frames.load(Ordering::SeqCst);
    platform.run_for(Duration::from_millis(60));
    assert_eq!(frames.load(Ordering::SeqCst), frozen);

    ticker.enable().expect("enable");
    platform.run_until(Duration::from_secs(2), || {
        frames.load(Ordering::SeqCst) >= frozen + 2
    });
    assert!(frames.load(Ordering::SeqCst) >= frozen + 2);
}

#[test]
fn quit_from_timer_callback_ends_run() {
    let platform = platform();
    let services = platform.services().clone();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_cb = calls.clone();

    platform
        .services()
        .start_timer(Duration::from_millis(5), move || {
            if calls_cb.fetch_add(1, Ordering::SeqCst) + 1 == 2 {
                services.quit_application();
            }
            true
        })
        .expect("start timer");

    platform.run();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(platform.services().timers().active_count(), 0);
}
