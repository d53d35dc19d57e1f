//! # snowfield
//!
//! A falling-snow particle simulation rendered into a packed-pixel
//! framebuffer, built to be driven from a background thread while a
//! foreground consumer pulls frames without tearing.
//!
//! ## Quick Start
//!
//! ```ignore
//! use snowfield::prelude::*;
//!
//! fn main() {
//!     let session = SnowSession::new(SnowConfig::default()).unwrap();
//!
//!     // Consumer side: get told when a frame is ready, pull it.
//!     let consumer = FrameConsumer::attach(session.display());
//!
//!     // Producer side: simulate forever on a dedicated thread.
//!     snowfield::driver::spawn(session.clone());
//!
//!     loop {
//!         consumer.render_with(session.display(), |surface| {
//!             let frame = surface.lock();
//!             present(frame.bytes()); // hand off to your blitter
//!         });
//!     }
//! }
//! ```
//!
//! ## Core Concepts
//!
//! ### Surfaces
//!
//! A [`Surface`] is a fixed-size BGRA buffer behind an exclusive lock. A
//! [`DynamicSurface`] wraps one and adds resize-on-demand plus the
//! invalidate/render handshake: producers write through
//! [`DynamicSurface::lock_for_write`], consumers register an observer with
//! [`DynamicSurface::on_invalidate`] and answer with
//! [`DynamicSurface::render`]. Duplicate invalidations coalesce onto one
//! [`RenderFuture`], which resolves exactly once when a render happens.
//!
//! ### Flakes
//!
//! Each flake is four integers: column, row, a sub-pixel accumulator and a
//! speed. The accumulator produces variable fall rates without floating
//! point; the alpha channel of the frame doubles as collision state
//! (`0xFF` = settled terrain, `0xFE` = flake in flight). Blocked flakes
//! slide down slopes one column at a time before settling and respawning
//! at the top.
//!
//! ### Sessions and the driver
//!
//! A [`SnowSession`] holds everything behind one coarse lock: writable
//! surface, flake field, double-buffering flag. [`driver::spawn`] runs the
//! tick loop on its own thread, pacing itself against elapsed work time
//! and, when auto-invalidate is off, blocking until the previous frame was
//! rendered.

pub mod completion;
pub mod driver;
pub mod dynamic;
pub mod error;
pub mod flake;
pub mod pixel;
pub mod session;
pub mod stats;
pub mod surface;

pub use completion::RenderFuture;
pub use dynamic::{DynamicSurface, WriteGuard};
pub use error::{PersistError, SurfaceError};
pub use flake::{Flake, FlakeField, SLOWDOWN};
pub use pixel::{Bgra8, PixelFormat, PixelSize, ALPHA_MOVING, ALPHA_SETTLED, MAX_SPEED};
pub use session::{SnowConfig, SnowSession, SurfacePreset, MAX_DELAY_MS};
pub use stats::{FrameConsumer, RenderStats};
pub use surface::{Frame, FrameGuard, Surface};

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::driver::{SystemTicker, Ticker};
    pub use crate::dynamic::DynamicSurface;
    pub use crate::pixel::{Bgra8, PixelFormat, PixelSize};
    pub use crate::session::{SnowConfig, SnowSession, SurfacePreset};
    pub use crate::stats::FrameConsumer;
    pub use crate::surface::Surface;
    pub use crate::RenderFuture;
}
