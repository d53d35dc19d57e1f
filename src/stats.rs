//! Render statistics and the diagnostic overlay input.
//!
//! [`RenderStats`] keeps fixed-capacity rolling windows of render duration,
//! frame-copy (blit) duration, schedule-to-render latency and frame
//! timestamps. Derived averages are recomputed every 10 frames or once a
//! second, whichever comes first, to bound recomputation cost — the exact
//! cadence is not a correctness property.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::dynamic::DynamicSurface;
use crate::surface::Surface;

/// Window capacity in samples.
const SAMPLES: usize = 60;
/// Derived values stay at zero until this many frames were observed.
const MIN_SAMPLES: usize = 10;
/// Forced recomputation interval.
const STAT_INTERVAL: Duration = Duration::from_millis(1000);

/// Rolling render-path statistics.
#[derive(Debug)]
pub struct RenderStats {
    frames: u64,

    scheduled: Option<Instant>,
    begin: Option<Instant>,
    begin_blit: Option<Instant>,
    blit_ms: f64,

    render_window: VecDeque<f64>,
    blit_window: VecDeque<f64>,
    latency_window: VecDeque<f64>,
    frame_times: VecDeque<Instant>,

    avg_render_ms: f64,
    avg_blit_ms: f64,
    avg_latency_ms: f64,
    fps: f64,
    last_stat: Instant,
}

impl RenderStats {
    pub fn new() -> Self {
        RenderStats {
            frames: 0,
            scheduled: None,
            begin: None,
            begin_blit: None,
            blit_ms: 0.0,
            render_window: VecDeque::with_capacity(SAMPLES),
            blit_window: VecDeque::with_capacity(SAMPLES),
            latency_window: VecDeque::with_capacity(SAMPLES),
            frame_times: VecDeque::with_capacity(SAMPLES),
            avg_render_ms: 0.0,
            avg_blit_ms: 0.0,
            avg_latency_ms: 0.0,
            fps: 0.0,
            last_stat: Instant::now(),
        }
    }

    /// Record that a render was just requested (invalidate fired).
    pub fn render_scheduled(&mut self) {
        self.scheduled = Some(Instant::now());
    }

    pub fn begin_render(&mut self) {
        self.begin = Some(Instant::now());
        self.frames += 1;
    }

    pub fn begin_blit(&mut self) {
        self.begin_blit = Some(Instant::now());
    }

    pub fn end_blit(&mut self) {
        if let Some(begin) = self.begin_blit.take() {
            self.blit_ms = begin.elapsed().as_secs_f64() * 1000.0;
        }
    }

    /// Close the current frame: push samples into the windows and, at the
    /// recomputation cadence, refresh the derived averages.
    pub fn end_render(&mut self) {
        let end = Instant::now();
        let Some(begin) = self.begin.take() else {
            return;
        };

        let latency = self
            .scheduled
            .map(|s| begin.saturating_duration_since(s).as_secs_f64() * 1000.0)
            .unwrap_or(0.0);

        push(&mut self.render_window, (end - begin).as_secs_f64() * 1000.0);
        push(&mut self.blit_window, self.blit_ms);
        push(&mut self.latency_window, latency);
        if self.frame_times.len() == SAMPLES {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(begin);

        if self.frame_times.len() < MIN_SAMPLES {
            return;
        }

        if self.frames % 10 == 0 || end.duration_since(self.last_stat) > STAT_INTERVAL {
            self.avg_render_ms = avg(&self.render_window);
            self.avg_blit_ms = avg(&self.blit_window);
            self.avg_latency_ms = avg(&self.latency_window);
            let span = end
                .duration_since(*self.frame_times.front().expect("window non-empty"))
                .as_secs_f64();
            if span > 0.0 {
                self.fps = self.frame_times.len() as f64 / span;
            }
            self.last_stat = end;
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Instantaneous FPS over the timestamp window.
    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn avg_render_ms(&self) -> f64 {
        self.avg_render_ms
    }

    pub fn avg_blit_ms(&self) -> f64 {
        self.avg_blit_ms
    }

    /// Average invalidate-to-render latency.
    pub fn avg_latency_ms(&self) -> f64 {
        self.avg_latency_ms
    }

    /// The diagnostic overlay text: FPS, invalidate-to-render latency, and
    /// the max achievable FPS of the render and blit paths.
    pub fn report(&self) -> String {
        format!(
            "RenderStats (last {} frames)\n\
             Current FPS: {:.2} InvalidateToRender (ms): {:.2}\n\
             Render: Max FPS {:.2}, ms {:.2}\n\
             Blit: Max FPS {:.2}, ms {:.2}",
            SAMPLES,
            self.fps,
            self.avg_latency_ms,
            max_fps(self.avg_render_ms),
            self.avg_render_ms,
            max_fps(self.avg_blit_ms),
            self.avg_blit_ms,
        )
    }
}

impl Default for RenderStats {
    fn default() -> Self {
        Self::new()
    }
}

fn push(window: &mut VecDeque<f64>, sample: f64) {
    if window.len() == SAMPLES {
        window.pop_front();
    }
    window.push_back(sample);
}

fn avg(window: &VecDeque<f64>) -> f64 {
    if window.is_empty() {
        0.0
    } else {
        window.iter().sum::<f64>() / window.len() as f64
    }
}

fn max_fps(avg_ms: f64) -> f64 {
    if avg_ms > 0.0 {
        1000.0 / avg_ms
    } else {
        0.0
    }
}

/// The consumer side of the handshake: subscribes to a display surface's
/// invalidate notifications and wraps its render calls with statistics
/// bookkeeping.
pub struct FrameConsumer {
    stats: Arc<Mutex<RenderStats>>,
}

impl FrameConsumer {
    /// Attach to a display surface. From now on every opened render
    /// request stamps a schedule time.
    pub fn attach(display: &DynamicSurface) -> Self {
        let stats = Arc::new(Mutex::new(RenderStats::new()));
        let scheduled = stats.clone();
        display.on_invalidate(move || {
            scheduled
                .lock()
                .expect("stats lock poisoned")
                .render_scheduled();
        });
        FrameConsumer { stats }
    }

    /// Render the display surface through `consumer`, timing the full
    /// render and the inner blit separately.
    pub fn render_with(&self, display: &DynamicSurface, consumer: impl FnOnce(&Surface)) {
        let mut stats = self.stats.lock().expect("stats lock poisoned");
        stats.begin_render();
        display.render(|surface| {
            stats.begin_blit();
            consumer(surface);
            stats.end_blit();
        });
        stats.end_render();
    }

    pub fn report(&self) -> String {
        self.stats.lock().expect("stats lock poisoned").report()
    }

    pub fn frames(&self) -> u64 {
        self.stats.lock().expect("stats lock poisoned").frames()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_stay_bounded() {
        let mut stats = RenderStats::new();
        for _ in 0..200 {
            stats.render_scheduled();
            stats.begin_render();
            stats.begin_blit();
            stats.end_blit();
            stats.end_render();
        }
        assert_eq!(stats.frames(), 200);
        assert_eq!(stats.render_window.len(), SAMPLES);
        assert_eq!(stats.frame_times.len(), SAMPLES);
    }

    #[test]
    fn derived_values_wait_for_min_samples() {
        let mut stats = RenderStats::new();
        for _ in 0..MIN_SAMPLES - 1 {
            stats.begin_render();
            stats.end_render();
        }
        assert_eq!(stats.fps(), 0.0);
    }

    #[test]
    fn report_lists_all_lines() {
        let mut stats = RenderStats::new();
        for _ in 0..30 {
            stats.begin_render();
            stats.end_render();
        }
        let report = stats.report();
        assert!(report.contains("Current FPS"));
        assert!(report.contains("InvalidateToRender"));
        assert!(report.contains("Render: Max FPS"));
        assert!(report.contains("Blit: Max FPS"));
    }

    #[test]
    fn end_render_without_begin_is_ignored() {
        let mut stats = RenderStats::new();
        stats.end_render();
        assert_eq!(stats.frames(), 0);
        assert!(stats.render_window.is_empty());
    }
}
