//! Fixed-size, fixed-format pixel surface with exclusive-writer locking.
//!
//! A [`Surface`] owns one contiguous `width * height * 4` byte buffer. The
//! buffer is only reachable through [`Surface::lock`], which hands out a
//! RAII guard; the guard releases the lock on every exit path, including
//! panics. Surfaces are never resized in place — new dimensions mean a new
//! surface.

use std::fs::File;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::{PersistError, SurfaceError};
use crate::pixel::{Bgra8, PixelFormat, PixelSize};

/// The locked pixel contents of a surface: the raw byte buffer plus
/// stride-aware accessors.
#[derive(Debug)]
pub struct Frame {
    size: PixelSize,
    buf: Vec<u8>,
}

impl Frame {
    fn new(size: PixelSize) -> Self {
        Frame {
            size,
            buf: vec![0; size.byte_len()],
        }
    }

    #[inline]
    pub fn size(&self) -> PixelSize {
        self.size
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.size.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.size.height
    }

    /// Row length in bytes.
    #[inline]
    pub fn stride(&self) -> usize {
        self.size.width as usize * 4
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// The buffer viewed as packed pixels, row-major.
    #[inline]
    pub fn pixels(&self) -> &[Bgra8] {
        bytemuck::cast_slice(&self.buf)
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [Bgra8] {
        bytemuck::cast_slice_mut(&mut self.buf)
    }

    /// Flat index of cell `(x, y)`. Callers guarantee both are in bounds.
    #[inline]
    pub fn index(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.size.width && y < self.size.height);
        (y as usize) * self.size.width as usize + x as usize
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> Bgra8 {
        self.pixels()[self.index(x, y)]
    }

    #[inline]
    pub fn put(&mut self, x: u32, y: u32, px: Bgra8) {
        let i = self.index(x, y);
        self.pixels_mut()[i] = px;
    }

    /// Clear everything, then draw an opaque terrain line across the
    /// bottom row so falling flakes always have ground to land on.
    pub fn clear_with_floor(&mut self) {
        let floor_start = self.size.width as usize * (self.size.height as usize - 1);
        let pixels = self.pixels_mut();
        pixels[..floor_start].fill(Bgra8::CLEAR);
        pixels[floor_start..].fill(Bgra8::TERRAIN);
    }
}

/// Exclusive lock over a surface's pixel buffer.
pub struct FrameGuard<'a> {
    guard: MutexGuard<'a, Frame>,
}

impl std::ops::Deref for FrameGuard<'_> {
    type Target = Frame;

    fn deref(&self) -> &Frame {
        &self.guard
    }
}

impl std::ops::DerefMut for FrameGuard<'_> {
    fn deref_mut(&mut self) -> &mut Frame {
        &mut self.guard
    }
}

/// One addressable image plane: fixed dimensions, fixed format, exactly one
/// writer at a time.
#[derive(Debug)]
pub struct Surface {
    size: PixelSize,
    format: PixelFormat,
    frame: Mutex<Frame>,
}

impl Surface {
    /// Create a surface with the given dimensions. Fails with
    /// [`SurfaceError::InvalidDimensions`] before allocating anything if
    /// either side is zero.
    pub fn new(size: PixelSize, format: PixelFormat) -> Result<Self, SurfaceError> {
        if size.width == 0 || size.height == 0 {
            return Err(SurfaceError::InvalidDimensions {
                width: size.width,
                height: size.height,
            });
        }

        Ok(Surface {
            size,
            format,
            frame: Mutex::new(Frame::new(size)),
        })
    }

    #[inline]
    pub fn size(&self) -> PixelSize {
        self.size
    }

    #[inline]
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Acquire exclusive access to the pixel buffer.
    ///
    /// Lock acquisition only fails when a previous holder panicked, which
    /// is a programming error; it aborts rather than retries.
    pub fn lock(&self) -> FrameGuard<'_> {
        FrameGuard {
            guard: self.frame.lock().expect("surface lock poisoned"),
        }
    }

    /// Encode the current contents as PNG at `path`. Acquires the surface
    /// lock internally.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer, image::ImageFormat::Png)
    }

    /// Encode the current contents into `writer` using the given codec.
    /// Acquires the surface lock internally.
    pub fn write_to<W: Write + Seek>(
        &self,
        writer: &mut W,
        format: image::ImageFormat,
    ) -> Result<(), PersistError> {
        let rgba = {
            let frame = self.lock();
            let mut rgba = frame.bytes().to_vec();
            // The codec wants RGBA; the buffer is BGRA.
            for px in rgba.chunks_exact_mut(4) {
                px.swap(0, 2);
            }
            rgba
        };

        let img = image::RgbaImage::from_raw(self.size.width, self.size.height, rgba)
            .expect("frame buffer length matches dimensions");
        img.write_to(writer, format)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::ALPHA_SETTLED;

    #[test]
    fn rejects_zero_dimensions() {
        assert!(matches!(
            Surface::new(PixelSize::new(0, 480), PixelFormat::Bgra8888),
            Err(SurfaceError::InvalidDimensions { width: 0, height: 480 })
        ));
        assert!(matches!(
            Surface::new(PixelSize::new(640, 0), PixelFormat::Bgra8888),
            Err(SurfaceError::InvalidDimensions { .. })
        ));
    }

    #[test]
    fn buffer_is_sized_and_zeroed() {
        let surface = Surface::new(PixelSize::new(8, 4), PixelFormat::Bgra8888).unwrap();
        let frame = surface.lock();
        assert_eq!(frame.bytes().len(), 8 * 4 * 4);
        assert!(frame.bytes().iter().all(|&b| b == 0));
        assert_eq!(frame.stride(), 32);
    }

    #[test]
    fn put_get_round_trip() {
        let surface = Surface::new(PixelSize::new(4, 4), PixelFormat::Bgra8888).unwrap();
        let mut frame = surface.lock();
        let px = Bgra8::new(1, 2, 3, 4);
        frame.put(2, 3, px);
        assert_eq!(frame.get(2, 3), px);
        // Word layout: B | G<<8 | R<<16 | A<<24.
        let i = frame.index(2, 3) * 4;
        assert_eq!(&frame.bytes()[i..i + 4], &[1, 2, 3, 4]);
    }

    #[test]
    fn clear_with_floor_marks_bottom_row() {
        let surface = Surface::new(PixelSize::new(3, 3), PixelFormat::Bgra8888).unwrap();
        let mut frame = surface.lock();
        frame.put(1, 1, Bgra8::new(9, 9, 9, 9));
        frame.clear_with_floor();
        assert_eq!(frame.get(1, 1), Bgra8::CLEAR);
        for x in 0..3 {
            assert_eq!(frame.get(x, 2).a, ALPHA_SETTLED);
        }
    }

    #[test]
    fn write_to_encodes_png() {
        let surface = Surface::new(PixelSize::new(2, 2), PixelFormat::Bgra8888).unwrap();
        surface.lock().put(0, 0, Bgra8::new(0xFF, 0, 0, 0xFF));

        let mut out = std::io::Cursor::new(Vec::new());
        surface.write_to(&mut out, image::ImageFormat::Png).unwrap();
        let png = out.into_inner();
        assert_eq!(&png[1..4], b"PNG");

        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        // BGRA (255,0,0,255) is pure blue in RGBA.
        assert_eq!(decoded.get_pixel(0, 0).0, [0, 0, 0xFF, 0xFF]);
    }
}
