//! Error types for snowfield.
//!
//! Construction-time invariant violations fail loudly; steady-state per-tick
//! anomalies (double-buffer size mismatch, render on an absent surface) are
//! not errors at all — they degrade to skipped work so the simulation loop
//! never halts on a single bad tick.

use std::fmt;

/// Errors that can occur when creating or reconfiguring a surface.
#[derive(Debug)]
pub enum SurfaceError {
    /// Width or height of zero was supplied. Rejected before any
    /// allocation happens.
    InvalidDimensions { width: u32, height: u32 },
}

impl fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SurfaceError::InvalidDimensions { width, height } => write!(
                f,
                "Invalid surface dimensions {}x{}: both sides must be positive",
                width, height
            ),
        }
    }
}

impl std::error::Error for SurfaceError {}

/// Errors that can occur while persisting a surface or stamping an image
/// into it.
#[derive(Debug)]
pub enum PersistError {
    /// Failed to read or write the backing file/stream.
    Io(std::io::Error),
    /// The image codec rejected the data.
    Image(image::ImageError),
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistError::Io(e) => write!(f, "Failed to access image file: {}", e),
            PersistError::Image(e) => write!(f, "Image codec error: {}", e),
        }
    }
}

impl std::error::Error for PersistError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PersistError::Io(e) => Some(e),
            PersistError::Image(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for PersistError {
    fn from(e: std::io::Error) -> Self {
        PersistError::Io(e)
    }
}

impl From<image::ImageError> for PersistError {
    fn from(e: image::ImageError) -> Self {
        PersistError::Image(e)
    }
}
