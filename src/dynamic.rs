//! Dynamic surface adapter: resize-on-demand plus the asynchronous
//! invalidate/render handshake.
//!
//! [`DynamicSurface`] decouples "who wants this drawn" from "who owns the
//! pixels". A producer writes through [`DynamicSurface::lock_for_write`];
//! a consumer registers a "needs invalidate" observer and later calls
//! [`DynamicSurface::render`] to pull the latest frame. Between the two
//! sits an at-most-one-outstanding [`RenderFuture`]: repeated invalidate
//! requests coalesce onto the same future, and a render resolves it.
//!
//! The adapter has its own internal lock, independent of any simulation
//! lock, so the render path never contends with per-tick surface writes
//! except while a write guard is actually held.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::completion::RenderFuture;
use crate::error::{PersistError, SurfaceError};
use crate::pixel::{PixelFormat, PixelSize};
use crate::surface::{FrameGuard, Surface};

type Observer = Arc<dyn Fn() + Send + Sync>;

struct Inner {
    size: PixelSize,
    format: PixelFormat,
    /// Lazily created; dropped (not resized) on dimension/format change.
    surface: Option<Arc<Surface>>,
    /// At most one outstanding render completion.
    pending: Option<RenderFuture>,
    observers: Vec<Observer>,
}

impl Inner {
    /// Instantiate the wrapped surface on first access after construction
    /// or after an `update` invalidated the previous one.
    fn ensure_surface(&mut self) -> Arc<Surface> {
        if self.surface.is_none() {
            log::debug!(
                "creating {}x{} backing surface",
                self.size.width,
                self.size.height
            );
            let surface = Surface::new(self.size, self.format)
                .expect("dimensions validated on construction/update");
            self.surface = Some(Arc::new(surface));
        }
        self.surface.as_ref().cloned().expect("just ensured")
    }

    /// Core of the handshake. Returns the future to hand to the caller and
    /// the observers to notify (empty when the request coalesced or nobody
    /// is listening). Observers are invoked by the caller *after* the
    /// internal lock is released, so an observer may call back into the
    /// adapter.
    fn request_invalidate(&mut self) -> (RenderFuture, Vec<Observer>) {
        if let Some(pending) = &self.pending {
            return (pending.clone(), Vec::new());
        }
        if self.observers.is_empty() {
            // Nothing will ever render this; resolve immediately.
            return (RenderFuture::ready(false), Vec::new());
        }
        let fut = RenderFuture::pending();
        self.pending = Some(fut.clone());
        (fut, self.observers.clone())
    }
}

/// A pixel surface that can be re-dimensioned on demand and observed for
/// invalidation.
pub struct DynamicSurface {
    inner: Mutex<Inner>,
    auto_invalidate: AtomicBool,
}

impl DynamicSurface {
    /// Create an adapter for the given dimensions. The backing surface is
    /// not allocated until first access.
    pub fn new(size: PixelSize, format: PixelFormat) -> Result<Self, SurfaceError> {
        validate(size)?;
        Ok(DynamicSurface {
            inner: Mutex::new(Inner {
                size,
                format,
                surface: None,
                pending: None,
                observers: Vec::new(),
            }),
            auto_invalidate: AtomicBool::new(true),
        })
    }

    pub fn size(&self) -> PixelSize {
        self.lock_inner().size
    }

    pub fn format(&self) -> PixelFormat {
        self.lock_inner().format
    }

    /// When enabled (the default), releasing a write guard fires the
    /// invalidate protocol automatically.
    pub fn set_auto_invalidate(&self, enabled: bool) {
        self.auto_invalidate.store(enabled, Ordering::SeqCst);
    }

    pub fn auto_invalidate(&self) -> bool {
        self.auto_invalidate.load(Ordering::SeqCst)
    }

    /// Change dimensions/format. Constant-time: only marks the wrapped
    /// surface for lazy recreation, and is idempotent when nothing
    /// changed.
    pub fn update(&self, size: PixelSize, format: PixelFormat) -> Result<(), SurfaceError> {
        validate(size)?;
        let mut inner = self.lock_inner();
        if inner.size != size || inner.format != format {
            log::debug!(
                "surface update {}x{} -> {}x{}",
                inner.size.width,
                inner.size.height,
                size.width,
                size.height
            );
            inner.size = size;
            inner.format = format;
            inner.surface = None;
        }
        Ok(())
    }

    /// Register a "needs invalidate" observer. Observers are notified
    /// (outside the adapter's internal lock) each time a new render
    /// request is opened.
    pub fn on_invalidate(&self, observer: impl Fn() + Send + Sync + 'static) {
        self.lock_inner().observers.push(Arc::new(observer));
    }

    /// Fire-and-forget invalidation; safe to call repeatedly.
    pub fn invalidate(&self) {
        let _ = self.invalidate_and_render();
    }

    /// Request a render and obtain a future resolving when it happened.
    ///
    /// - With a request already outstanding, returns that same future.
    /// - Otherwise, with observers registered, opens a new request,
    ///   notifies the observers and returns the new future.
    /// - With no observers, returns a future already resolved to `false`.
    pub fn invalidate_and_render(&self) -> RenderFuture {
        let (fut, observers) = self.lock_inner().request_invalidate();
        for observer in observers {
            observer();
        }
        fut
    }

    /// Acquire write access, lazily creating the backing surface. The
    /// adapter's internal lock is held until the guard drops; on release,
    /// with auto-invalidate enabled, the invalidate protocol runs before
    /// the lock is given up.
    pub fn lock_for_write(&self) -> WriteGuard<'_> {
        let mut inner = self.lock_inner();
        let surface = inner.ensure_surface();
        WriteGuard {
            owner: self,
            surface,
            inner: Some(inner),
        }
    }

    /// Render path: resolve the outstanding future (if any) with `true`,
    /// then hand the current surface to `consumer` under the internal
    /// lock.
    ///
    /// If the backing surface was never instantiated there is nothing
    /// meaningful to show: the consumer is skipped and a pending future
    /// stays pending until the first successful render. That lets callers
    /// wait for the first real frame.
    pub fn render(&self, consumer: impl FnOnce(&Surface)) {
        let mut inner = self.lock_inner();
        let Some(surface) = inner.surface.as_ref().cloned() else {
            log::debug!("render skipped: no backing surface yet");
            return;
        };
        if let Some(pending) = inner.pending.take() {
            pending.resolve(true);
        }
        consumer(&surface);
    }

    /// Encode the current backing surface as PNG at `path`, instantiating
    /// it first if it was never written to.
    pub fn save_to(&self, path: impl AsRef<std::path::Path>) -> Result<(), PersistError> {
        let surface = self.lock_inner().ensure_surface();
        surface.save_to(path)
    }

    /// Whether a render request is currently outstanding.
    pub fn has_pending_render(&self) -> bool {
        self.lock_inner().pending.is_some()
    }

    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("dynamic surface lock poisoned")
    }
}

fn validate(size: PixelSize) -> Result<(), SurfaceError> {
    if size.width == 0 || size.height == 0 {
        return Err(SurfaceError::InvalidDimensions {
            width: size.width,
            height: size.height,
        });
    }
    Ok(())
}

/// Scoped write access to the adapter's backing surface.
pub struct WriteGuard<'a> {
    owner: &'a DynamicSurface,
    surface: Arc<Surface>,
    inner: Option<MutexGuard<'a, Inner>>,
}

impl WriteGuard<'_> {
    /// Lock the backing surface's pixel buffer.
    pub fn frame(&self) -> FrameGuard<'_> {
        self.surface.lock()
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        let mut inner = self.inner.take().expect("guard dropped twice");
        let observers = if self.owner.auto_invalidate() {
            let (_, observers) = inner.request_invalidate();
            observers
        } else {
            Vec::new()
        };
        drop(inner);
        for observer in observers {
            observer();
        }
    }
}
