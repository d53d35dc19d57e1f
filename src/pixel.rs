//! Packed-pixel primitives shared by the surface and the flake field.
//!
//! The whole crate works on one fixed layout: 32-bit BGRA, four bytes per
//! pixel in B,G,R,A order. The alpha channel is overloaded as a state flag
//! rather than transparency: `0xFF` marks settled terrain, `0xFE` marks a
//! flake in flight, anything else is background (or user-painted content).

use bytemuck::{Pod, Zeroable};

/// Alpha value of a settled (terrain) pixel. Flakes treat these cells as
/// static ground.
pub const ALPHA_SETTLED: u8 = 0xFF;

/// Alpha value of a moving flake's pixel. Deliberately one below
/// [`ALPHA_SETTLED`] so the landing check can tell the two apart.
pub const ALPHA_MOVING: u8 = 0xFE;

/// Upper bound (exclusive) for flake speeds, and the base tone of the
/// moving-flake gray ramp.
pub const MAX_SPEED: u8 = 200;

/// One 32-bit packed pixel, byte order B,G,R,A (little-endian word
/// `B | G<<8 | R<<16 | A<<24`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct Bgra8 {
    pub b: u8,
    pub g: u8,
    pub r: u8,
    pub a: u8,
}

impl Bgra8 {
    /// Fully transparent black; the background/erased value.
    pub const CLEAR: Bgra8 = Bgra8 { b: 0, g: 0, r: 0, a: 0 };

    /// Opaque white; the terrain line at the bottom of a fresh frame.
    pub const TERRAIN: Bgra8 = Bgra8 { b: 0xFF, g: 0xFF, r: 0xFF, a: 0xFF };

    pub const fn new(b: u8, g: u8, r: u8, a: u8) -> Self {
        Bgra8 { b, g, r, a }
    }

    /// True when this cell counts as settled ground for the landing check.
    #[inline]
    pub fn is_settled(self) -> bool {
        self.a == ALPHA_SETTLED
    }

    /// Same pixel with the alpha forced to the settled sentinel.
    #[inline]
    pub fn settled(self) -> Self {
        Bgra8 { a: ALPHA_SETTLED, ..self }
    }
}

/// Gray ramp for a flake in flight. Faster flakes render brighter:
/// channel value `0xFF - MAX_SPEED + tone`, alpha set to the moving
/// sentinel.
#[inline]
pub fn gray(tone: u8) -> Bgra8 {
    let c = u8::MAX - MAX_SPEED + tone;
    Bgra8 { b: c, g: c, r: c, a: ALPHA_MOVING }
}

/// Brightness of a settled flake: a weighted blend of the ramp ceiling and
/// the flake's own speed, so piled snow shows subtle variation.
#[inline]
pub fn settled_gray(speed: u8) -> Bgra8 {
    let tone = (MAX_SPEED as f64 * 0.8 + speed as f64 * 0.2) as u8;
    gray(tone).settled()
}

/// Surface dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub const fn new(width: u32, height: u32) -> Self {
        PixelSize { width, height }
    }

    /// Byte length of a frame at this size (4 bytes per pixel).
    pub const fn byte_len(self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Pixel formats a surface can carry. BGRA 8:8:8:8 is the only supported
/// layout; the enum exists so dimension/format changes share one update
/// path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    #[default]
    Bgra8888,
}

impl PixelFormat {
    /// Bytes per pixel for this format.
    pub const fn bytes_per_pixel(self) -> usize {
        4
    }
}
