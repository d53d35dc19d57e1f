//! Simulation session: one coarse lock over the writable surface, the
//! flake field, and the double-buffering flag.
//!
//! A [`SnowSession`] owns the state shared between the simulation thread,
//! the render consumer and an optional external writer (paint input). All
//! mutations of the write surface, the flake array and size changes go
//! through the session lock; the display adapter keeps its own finer lock
//! so the render path only contends with the brief copy window of a tick.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::dynamic::DynamicSurface;
use crate::error::{PersistError, SurfaceError};
use crate::flake::FlakeField;
use crate::pixel::{Bgra8, PixelFormat, PixelSize};
use crate::surface::{Frame, Surface};

/// Inter-tick delay meaning "paused". A delay of zero runs flat out.
pub const MAX_DELAY_MS: u32 = 50;

/// The enumerated surface sizes the configuration surface offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfacePreset {
    Qvga,
    Vga,
    Hd720,
    FullHd,
}

impl SurfacePreset {
    pub const ALL: [SurfacePreset; 4] = [
        SurfacePreset::Qvga,
        SurfacePreset::Vga,
        SurfacePreset::Hd720,
        SurfacePreset::FullHd,
    ];

    pub const fn size(self) -> PixelSize {
        match self {
            SurfacePreset::Qvga => PixelSize::new(320, 240),
            SurfacePreset::Vga => PixelSize::new(640, 480),
            SurfacePreset::Hd720 => PixelSize::new(1280, 720),
            SurfacePreset::FullHd => PixelSize::new(1920, 1080),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            SurfacePreset::Qvga => "320x240",
            SurfacePreset::Vga => "640x480",
            SurfacePreset::Hd720 => "1280x720",
            SurfacePreset::FullHd => "1920x1080",
        }
    }
}

/// Session configuration. Defaults mirror the reference setup: 3000
/// flakes over 640x480, 10 ms cadence, double-buffered, auto-invalidate.
#[derive(Debug, Clone)]
pub struct SnowConfig {
    pub flake_count: usize,
    pub size: PixelSize,
    pub delay_ms: u32,
    pub double_buffered: bool,
    pub auto_invalidate: bool,
    /// Foreground color for the paint-input collaborator.
    pub brush: Bgra8,
}

impl Default for SnowConfig {
    fn default() -> Self {
        SnowConfig {
            flake_count: 3000,
            size: SurfacePreset::Vga.size(),
            delay_ms: 10,
            double_buffered: true,
            auto_invalidate: true,
            brush: Bgra8::new(0, 0, 0xFF, 0xFF),
        }
    }
}

struct State {
    /// The simulation writes here when double-buffered; discarded and
    /// recreated on size change, never resized.
    write: Surface,
    field: FlakeField,
    double_buffered: bool,
    delay_ms: u32,
    brush: Bgra8,
}

struct Shared {
    state: Mutex<State>,
    display: DynamicSurface,
}

/// Handle to a running snow simulation. Clones share the session.
#[derive(Clone)]
pub struct SnowSession {
    shared: Arc<Shared>,
}

impl SnowSession {
    pub fn new(config: SnowConfig) -> Result<Self, SurfaceError> {
        let display = DynamicSurface::new(config.size, PixelFormat::Bgra8888)?;
        display.set_auto_invalidate(config.auto_invalidate);
        let write = Surface::new(config.size, PixelFormat::Bgra8888)?;

        let field = {
            let mut frame = write.lock();
            FlakeField::new(config.flake_count, &mut frame)
        };

        let session = SnowSession {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    write,
                    field,
                    double_buffered: config.double_buffered,
                    delay_ms: config.delay_ms.min(MAX_DELAY_MS),
                    brush: config.brush,
                }),
                display,
            }),
        };
        // When writes go straight to the display, its frame needs the
        // terrain floor too.
        if !config.double_buffered {
            session.reset();
        }
        Ok(session)
    }

    /// The surface the render path consumes.
    pub fn display(&self) -> &DynamicSurface {
        &self.shared.display
    }

    /// One simulation tick: advance every flake and, when double-buffered,
    /// propagate the writable frame into the display frame. Returns
    /// `false` without touching anything when the session is paused.
    pub fn step(&self) -> bool {
        let mut state = self.lock_state();
        if state.delay_ms >= MAX_DELAY_MS {
            return false;
        }

        let State {
            write,
            field,
            double_buffered,
            ..
        } = &mut *state;

        if *double_buffered {
            let mut frame = write.lock();
            field.tick(&mut frame);

            // Propagate into the display surface; a size mismatch during a
            // resize skips this tick's copy rather than failing.
            let guard = self.shared.display.lock_for_write();
            let mut dst = guard.frame();
            if dst.bytes().len() == frame.bytes().len() {
                dst.bytes_mut().copy_from_slice(frame.bytes());
            } else {
                log::debug!(
                    "skipping frame copy: display {} bytes, write {} bytes",
                    dst.bytes().len(),
                    frame.bytes().len()
                );
            }
        } else {
            let guard = self.shared.display.lock_for_write();
            let mut frame = guard.frame();
            field.tick(&mut frame);
        }
        true
    }

    /// Respawn all flakes and reset the write target to a clear sky over
    /// an opaque floor.
    pub fn reset(&self) {
        let mut state = self.lock_state();
        let State {
            write,
            field,
            double_buffered,
            ..
        } = &mut *state;
        if *double_buffered {
            let mut frame = write.lock();
            field.reset(&mut frame);
        } else {
            let guard = self.shared.display.lock_for_write();
            let mut frame = guard.frame();
            field.reset(&mut frame);
        }
    }

    pub fn flake_count(&self) -> usize {
        self.lock_state().field.len()
    }

    /// Grow or shrink the field; safe to call while the driver is running.
    pub fn set_flake_count(&self, count: usize) {
        let mut state = self.lock_state();
        let State { write, field, .. } = &mut *state;
        let mut frame = write.lock();
        field.set_count(count, &mut frame);
    }

    /// Switch to a new surface size: the display surface is marked for
    /// lazy recreation, the write surface is rebuilt, and the field
    /// restarts.
    pub fn set_size(&self, preset: SurfacePreset) -> Result<(), SurfaceError> {
        self.set_size_px(preset.size())
    }

    pub fn set_size_px(&self, size: PixelSize) -> Result<(), SurfaceError> {
        let mut state = self.lock_state();
        self.shared.display.update(size, PixelFormat::Bgra8888)?;
        state.write = Surface::new(size, PixelFormat::Bgra8888)?;
        let State {
            write,
            field,
            double_buffered,
            ..
        } = &mut *state;
        if *double_buffered {
            let mut frame = write.lock();
            field.reset(&mut frame);
        } else {
            let guard = self.shared.display.lock_for_write();
            let mut frame = guard.frame();
            field.reset(&mut frame);
        }
        Ok(())
    }

    pub fn delay_ms(&self) -> u32 {
        self.lock_state().delay_ms
    }

    /// Set the inter-tick delay; clamped to `[0, MAX_DELAY_MS]`, with the
    /// maximum meaning paused.
    pub fn set_delay_ms(&self, delay_ms: u32) {
        self.lock_state().delay_ms = delay_ms.min(MAX_DELAY_MS);
    }

    pub fn is_paused(&self) -> bool {
        self.delay_ms() >= MAX_DELAY_MS
    }

    /// Human-readable cadence summary for the overlay.
    pub fn delay_info(&self) -> String {
        let delay_ms = self.delay_ms();
        if delay_ms >= MAX_DELAY_MS {
            "Paused".to_string()
        } else {
            format!("{} ms, max FPS={:03}", delay_ms, 1000 / delay_ms.max(1))
        }
    }

    pub fn is_double_buffered(&self) -> bool {
        self.lock_state().double_buffered
    }

    pub fn set_double_buffered(&self, enabled: bool) {
        self.lock_state().double_buffered = enabled;
    }

    pub fn brush(&self) -> Bgra8 {
        self.lock_state().brush
    }

    pub fn set_brush(&self, brush: Bgra8) {
        self.lock_state().brush = brush;
    }

    /// Paint a square brush stroke of the session's brush color, centered
    /// at relative coordinates `(x, y)` in `[0, 1)`.
    pub fn put_pixel(&self, x: f64, y: f64, radius: i32) {
        let mut state = self.lock_state();
        let size = state.write.size();
        let px = (x * size.width as f64) as i32;
        let py = (y * size.height as f64) as i32;
        let brush = state.brush;

        let State {
            write,
            double_buffered,
            ..
        } = &mut *state;
        let width = size.width as i32;
        let height = size.height as i32;
        let paint = |frame: &mut Frame| {
            for x0 in px - radius..=px + radius {
                for y0 in py - radius..=py + radius {
                    if x0 >= 0 && x0 < width && y0 >= 0 && y0 < height {
                        frame.put(x0 as u32, y0 as u32, brush);
                    }
                }
            }
        };
        if *double_buffered {
            paint(&mut write.lock());
        } else {
            let guard = self.shared.display.lock_for_write();
            paint(&mut guard.frame());
        }
    }

    /// Stamp a decoded RGBA image into the write target at relative
    /// coordinates, clipped to the surface. Flakes inside the target
    /// rectangle respawn first; only source pixels with alpha above 200
    /// are copied, and copied pixels become settled terrain.
    pub fn stamp_image(&self, img: &image::RgbaImage, x: f64, y: f64) {
        let mut state = self.lock_state();
        let size = state.write.size();
        let px = ((x * size.width as f64) as i32).max(0);
        let py = ((y * size.height as f64) as i32).max(0);
        let w = (size.width as i32 - px).min(img.width() as i32).max(0);
        let h = (size.height as i32 - py).min(img.height() as i32).max(0);

        let State {
            write,
            field,
            double_buffered,
            ..
        } = &mut *state;
        let stamp = |field: &mut FlakeField, frame: &mut Frame| {
            field.evict_rect(px, py, w, h, frame);
            for i in 0..w {
                for j in 0..h {
                    let src = img.get_pixel(i as u32, j as u32).0;
                    // Transparent pixels don't work with the snow logic.
                    if src[3] > 200 {
                        frame.put(
                            (px + i) as u32,
                            (py + j) as u32,
                            Bgra8::new(src[2], src[1], src[0], 0xFF),
                        );
                    }
                }
            }
        };
        if *double_buffered {
            stamp(field, &mut write.lock());
        } else {
            let guard = self.shared.display.lock_for_write();
            stamp(field, &mut guard.frame());
        }
    }

    /// Decode an image file and stamp it at relative coordinates.
    pub fn load_file(
        &self,
        path: impl AsRef<std::path::Path>,
        x: f64,
        y: f64,
    ) -> Result<(), PersistError> {
        let img = image::open(path)?.to_rgba8();
        self.stamp_image(&img, x, y);
        Ok(())
    }

    /// Encode the display surface as PNG at `path`.
    pub fn save_to(&self, path: impl AsRef<std::path::Path>) -> Result<(), PersistError> {
        self.shared.display.save_to(path)
    }

    /// Peek at the current write-target frame. Test and diagnostics hook;
    /// takes the session lock.
    pub fn with_write_frame<R>(&self, f: impl FnOnce(&Frame) -> R) -> R {
        let mut state = self.lock_state();
        let State {
            write,
            double_buffered,
            ..
        } = &mut *state;
        if *double_buffered {
            f(&write.lock())
        } else {
            let guard = self.shared.display.lock_for_write();
            let frame = guard.frame();
            f(&frame)
        }
    }

    /// Snapshot of the flake array for invariant checks.
    pub fn with_flakes<R>(&self, f: impl FnOnce(&[crate::flake::Flake]) -> R) -> R {
        f(self.lock_state().field.flakes())
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.shared.state.lock().expect("session lock poisoned")
    }
}
