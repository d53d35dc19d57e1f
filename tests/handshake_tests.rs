//! Integration tests for the producer/consumer handshake and the driver
//! loop, exercising the session, adapter and consumer together.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use snowfield::driver::{run_once, Ticker};
use snowfield::prelude::*;
use snowfield::MAX_DELAY_MS;

/// Ticker whose sleeps are instantaneous, so tests can run thousands of
/// driver iterations in real time.
struct InstantTicker;

impl Ticker for InstantTicker {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, _duration: Duration) {}
}

fn small_session(double_buffered: bool) -> SnowSession {
    SnowSession::new(SnowConfig {
        flake_count: 30,
        size: PixelSize::new(48, 32),
        delay_ms: 0,
        double_buffered,
        ..SnowConfig::default()
    })
    .unwrap()
}

#[test]
fn producer_consumer_round_trip() {
    let session = small_session(true);
    let consumer = FrameConsumer::attach(session.display());

    // Producer ticks; auto-invalidate opens a render request.
    assert!(session.step());
    let fut = session.display().invalidate_and_render();
    assert!(!fut.is_resolved());

    // Consumer answers.
    let mut seen = None;
    consumer.render_with(session.display(), |surface| {
        seen = Some(surface.size());
    });
    assert_eq!(seen, Some(PixelSize::new(48, 32)));
    assert_eq!(fut.try_value(), Some(true));
    assert_eq!(consumer.frames(), 1);
}

#[test]
fn rapid_invalidations_coalesce() {
    let session = small_session(true);
    let _consumer = FrameConsumer::attach(session.display());
    session.step();

    let first = session.display().invalidate_and_render();
    let second = session.display().invalidate_and_render();
    let third = session.display().invalidate_and_render();
    assert!(first.same_future(&second));
    assert!(second.same_future(&third));

    session.display().render(|_| {});
    assert_eq!(first.try_value(), Some(true));
}

#[test]
fn waiting_for_the_first_meaningful_frame() {
    let session = small_session(true);
    let _consumer = FrameConsumer::attach(session.display());

    // Nothing was ever written: a render is a no-op and the future stays
    // pending.
    let fut = session.display().invalidate_and_render();
    session.display().render(|_| panic!("no frame to show yet"));
    assert!(!fut.is_resolved());

    // First tick materializes the surface; the next render resolves.
    session.step();
    session.display().render(|_| {});
    assert_eq!(fut.try_value(), Some(true));
}

#[test]
fn driver_iterations_keep_flakes_in_bounds() {
    let session = small_session(true);
    let _consumer = FrameConsumer::attach(session.display());
    // Keep the pending slot drained so coalescing never blocks the loop.
    let renderer = session.clone();
    session.display().on_invalidate(move || {
        renderer.display().render(|_| {});
    });

    for _ in 0..1500 {
        run_once(&session, &InstantTicker);
    }

    let size = session.display().size();
    session.with_flakes(|flakes| {
        assert!(flakes.iter().all(|f| {
            f.x >= 0 && (f.x as u32) < size.width && f.y >= 0 && (f.y as u32) < size.height
        }));
    });
}

#[test]
fn backpressure_blocks_until_rendered() {
    let session = small_session(true);
    session.display().set_auto_invalidate(false);

    let renders = Arc::new(AtomicUsize::new(0));
    let render_session = session.clone();
    let counter = renders.clone();
    session.display().on_invalidate(move || {
        render_session.display().render(|_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    });

    for _ in 0..10 {
        run_once(&session, &InstantTicker);
    }
    // One render per iteration: the driver never schedules a second frame
    // over an unrendered one.
    assert_eq!(renders.load(Ordering::SeqCst), 10);
}

#[test]
fn concurrent_painting_does_not_tear_ticks() {
    let session = small_session(true);
    let painter = session.clone();
    let handle = std::thread::spawn(move || {
        for i in 0..300 {
            painter.put_pixel((i % 10) as f64 / 10.0, 0.5, 2);
        }
    });
    for _ in 0..300 {
        session.step();
    }
    handle.join().unwrap();

    let size = session.display().size();
    session.with_flakes(|flakes| {
        assert!(flakes
            .iter()
            .all(|f| (f.x as u32) < size.width && (f.y as u32) < size.height));
    });
}

#[test]
fn resize_during_simulation_is_safe() {
    let session = small_session(true);
    for _ in 0..50 {
        session.step();
    }
    session.set_size(SurfacePreset::Qvga).unwrap();
    for _ in 0..50 {
        session.step();
    }

    let size = SurfacePreset::Qvga.size();
    session.display().render(|surface| {
        assert_eq!(surface.size(), size);
        assert_eq!(surface.lock().bytes().len(), size.byte_len());
    });
}

#[test]
fn direct_mode_draws_into_the_display_surface() {
    let session = small_session(false);
    for _ in 0..200 {
        session.step();
    }
    let mut non_zero = 0;
    session.display().render(|surface| {
        non_zero = surface.lock().bytes().iter().filter(|&&b| b != 0).count();
    });
    // At least the terrain floor plus some flakes are visible.
    assert!(non_zero >= 48 * 4);
}

#[test]
fn paused_driver_leaves_the_frame_untouched() {
    let session = small_session(true);
    session.step();
    let before = session.with_write_frame(|frame| frame.bytes().to_vec());

    session.set_delay_ms(MAX_DELAY_MS);
    for _ in 0..20 {
        run_once(&session, &InstantTicker);
    }
    let after = session.with_write_frame(|frame| frame.bytes().to_vec());
    assert_eq!(before, after);
}

#[test]
fn save_round_trip_through_the_codec() {
    let session = small_session(true);
    session.step();

    let path = std::env::temp_dir().join("snowfield_save_test.png");
    session.save_to(&path).unwrap();
    let decoded = image::open(&path).unwrap();
    assert_eq!(decoded.width(), 48);
    assert_eq!(decoded.height(), 32);
    std::fs::remove_file(&path).ok();
}
