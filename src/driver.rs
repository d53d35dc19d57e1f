//! The simulation driver: a dedicated thread advancing the session at a
//! configurable cadence.
//!
//! The loop self-corrects for simulation cost: each iteration measures the
//! time spent ticking and sleeps for the configured delay minus that work,
//! floored at one millisecond so a slow tick never degenerates into a busy
//! loop. When the display is not auto-invalidating, the driver explicitly
//! requests a render and blocks until the previous frame was consumed —
//! backpressure that caps simulation rate at render rate.

use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::session::SnowSession;

/// Clock and sleep source for the driver loop. Injectable so tests can run
/// many ticks without real-time waits.
pub trait Ticker: Send {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall-clock ticker backed by `Instant` and `thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTicker;

impl Ticker for SystemTicker {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Spawn the driver on a dedicated thread. The loop runs for the life of
/// the process; the handle is returned for callers that want to park on
/// it.
pub fn spawn(session: SnowSession) -> JoinHandle<()> {
    std::thread::Builder::new()
        .name("snowfield-driver".into())
        .spawn(move || run_loop(&session, &SystemTicker))
        .expect("failed to spawn driver thread")
}

/// Drive the session forever. A tick that finds nothing to do (paused
/// session, mid-resize copy skip) never stops the loop.
pub fn run_loop(session: &SnowSession, ticker: &impl Ticker) -> ! {
    loop {
        run_once(session, ticker);
    }
}

/// One driver iteration: tick, backpressure, pacing sleep. Split out so
/// callers can drive a bounded number of iterations, e.g. in tests.
pub fn run_once(session: &SnowSession, ticker: &impl Ticker) {
    let start = ticker.now();
    let worked = session.step();
    let work = if worked {
        ticker.now().saturating_duration_since(start)
    } else {
        Duration::ZERO
    };

    if !session.display().auto_invalidate() {
        // Never schedule a second frame over an unrendered one.
        session.display().invalidate_and_render().wait();
    }

    let delay = Duration::from_millis(u64::from(session.delay_ms()));
    let pause = delay.saturating_sub(work).max(Duration::from_millis(1));
    ticker.sleep(pause);
}
