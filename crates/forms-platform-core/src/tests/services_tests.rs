use super::*;
use crate::named_size::TargetIdiom;
use crate::test_host::TestHost;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

fn services(host: &Arc<TestHost>, config: PlatformConfig) -> PlatformServices {
    PlatformServices::new(host.clone(), host.clone(), config).expect("services")
}

#[test]
fn invalid_config_is_rejected() {
    let host = TestHost::new();
    let config = PlatformConfig::default().with_ticker_interval(Duration::ZERO);

    let err = PlatformServices::new(host.clone(), host.clone(), config).expect_err("invalid");

    assert!(matches!(err, PlatformError::InvalidConfig { .. }));
}

#[test]
fn begin_invoke_runs_on_main_queue() {
    let host = TestHost::new();
    let services = services(&host, PlatformConfig::default());
    let ran = Arc::new(AtomicBool::new(false));
    let ran_in_action = ran.clone();

    services.begin_invoke_on_main_thread(move || ran_in_action.store(true, Ordering::SeqCst));

    assert!(!ran.load(Ordering::SeqCst));
    host.run_pending();
    assert!(ran.load(Ordering::SeqCst));
}

#[test]
fn invoke_required_only_off_main_thread() {
    let host = TestHost::new();
    let services = services(&host, PlatformConfig::default());
    assert!(!services.is_invoke_required());

    let workers: Vec<_> = (0..2)
        .map(|_| {
            let services = services.clone();
            thread::spawn(move || services.is_invoke_required())
        })
        .collect();
    for worker in workers {
        assert!(worker.join().expect("worker"));
    }
}

#[test]
fn named_size_follows_configured_platform() {
    let host = TestHost::new();
    let gtk = services(&host, PlatformConfig::gtk());
    let watch = services(
        &host,
        PlatformConfig::tizen(TargetIdiom::Watch).with_font_scale(2.0),
    );

    assert_eq!(gtk.runtime_platform(), RuntimePlatform::Gtk);
    assert_eq!(gtk.named_size(NamedSize::Large), 22.0);
    assert_eq!(watch.runtime_platform(), RuntimePlatform::Tizen);
    assert_eq!(watch.named_size(NamedSize::Large), 72.0);
}

#[test]
fn created_ticker_uses_configured_cadence() {
    let host = TestHost::new();
    let config = PlatformConfig::default().with_ticker_interval(Duration::from_millis(33));
    let services = services(&host, config);

    let ticker = services.create_ticker().expect("ticker");

    assert_eq!(ticker.interval(), Duration::from_millis(33));
    assert!(!ticker.is_enabled());
}

#[test]
fn quit_cancels_timers_and_stops_loop() {
    let host = TestHost::new();
    let services = services(&host, PlatformConfig::default());
    let handle = services
        .start_timer(Duration::from_millis(5), || true)
        .expect("timer");

    services.quit_application();

    assert!(!handle.is_active());
    assert!(host.quit_requested());
    assert_eq!(services.timers().active_count(), 0);
}
