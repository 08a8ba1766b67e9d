//! The drawable pixel surface and the memory seam behind it.
//!
//! The surface region is one physically contiguous, DMA-capable allocation
//! holding the pixel buffer with the descriptor table packed immediately
//! after it. The allocation itself comes from the integrator through
//! [`SurfaceMemory`]; this module only provides the software-drawing view
//! over the pixel sub-region.
//!
//! [`Surface`] is where the crate meets the rasterizer: it implements
//! `embedded-graphics`' `DrawTarget`, packing [`Color`] values through the
//! resolved channel layout into the native pixel format, and
//! `embedded-dma`'s `ReadBuffer` so the pixel bytes can be handed to other
//! DMA plumbing. Drawing is plain memory access; the engine reads the same
//! bytes asynchronously, and a half-drawn frame on screen for a refresh is
//! the accepted cost of a single-buffered design.

use core::convert::Infallible;
use core::marker::PhantomData;

use embedded_dma::ReadBuffer;
use embedded_graphics::pixelcolor::RgbColor;
use embedded_graphics::prelude::{OriginDimensions, Point, Size};

use crate::geometry::Geometry;
use crate::Color;

/// One physically contiguous, DMA-capable allocation.
///
/// Implementors pair a CPU-visible pointer with the bus address the engine
/// uses for the same bytes, and free the allocation exactly once when
/// dropped. The whole region is exclusively owned by one display instance
/// for its lifetime; nothing in this crate ever frees it directly.
pub trait SurfaceMemory {
    /// CPU pointer to the start of the region.
    ///
    /// Must be at least 4-byte aligned.
    fn cpu_base(&self) -> *mut u8;

    /// Bus address of the same bytes, as the DMA engine sees them.
    fn bus_base(&self) -> u32;

    /// Total length of the region in bytes.
    fn len(&self) -> usize;

    /// Whether the region is zero bytes long.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Mutable drawing view over the pixel sub-region of a surface.
///
/// Linear, stride-addressed: `stride` bytes per row, `height` rows, pixel
/// encoding per the resolved [`Geometry`]. Created by
/// [`Display::surface`](crate::display::Display::surface); borrows the
/// region for as long as the view lives.
pub struct Surface<'a> {
    pixels: *mut u8,
    geometry: Geometry,
    _region: PhantomData<&'a mut [u8]>,
}

impl<'a> Surface<'a> {
    /// Build a drawing view over raw pixel memory.
    ///
    /// # Safety
    ///
    /// `pixels` must point to at least `geometry.pixel_len()` writable bytes
    /// that stay valid for `'a`, with no other CPU-side writer while the
    /// view exists.
    #[must_use]
    pub unsafe fn from_raw(pixels: *mut u8, geometry: Geometry) -> Self {
        Self {
            pixels,
            geometry,
            _region: PhantomData,
        }
    }

    /// The geometry this surface was resolved with.
    #[must_use]
    pub const fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// The whole pixel buffer as bytes.
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        // Valid for pixel_len bytes per the from_raw contract.
        unsafe { core::slice::from_raw_parts_mut(self.pixels, self.geometry.pixel_len()) }
    }

    /// Pack a color into the native pixel value through the resolved
    /// channel layout (RGB565 quantization for 16-bpp modes).
    #[must_use]
    pub fn pack(&self, color: Color) -> u32 {
        let layout = self.geometry.layout();
        let fold = |value: u8, channel: crate::geometry::Channel| -> u32 {
            u32::from(value >> (8 - channel.length)) << channel.offset
        };
        fold(color.r(), layout.red) | fold(color.g(), layout.green) | fold(color.b(), layout.blue)
    }

    /// Set a pixel. Out-of-bounds points are ignored.
    pub fn set_pixel(&mut self, p: Point, color: Color) {
        let raw = self.pack(color);
        self.set_pixel_raw(p, raw);
    }

    /// Set a pixel from a native pixel value, bypassing color packing.
    ///
    /// This is the drawing path for palette-indexed 8-bpp surfaces, where
    /// the stored value is a palette index resolved by an external palette
    /// collaborator. Out-of-bounds points are ignored.
    pub fn set_pixel_raw(&mut self, p: Point, raw: u32) {
        if p.x < 0 || p.y < 0 {
            return;
        }
        let (x, y) = (p.x as usize, p.y as usize);
        if x >= self.geometry.width() as usize || y >= self.geometry.height() as usize {
            return;
        }
        let offset = y * self.geometry.stride() + x * self.geometry.bytes_per_pixel();
        // In bounds by the checks above; unaligned stores keep odd strides
        // legal.
        unsafe {
            let ptr = self.pixels.add(offset);
            match self.geometry.bytes_per_pixel() {
                1 => ptr.write(raw as u8),
                2 => ptr.cast::<u16>().write_unaligned(raw as u16),
                _ => ptr.cast::<u32>().write_unaligned(raw),
            }
        }
    }
}

impl OriginDimensions for Surface<'_> {
    fn size(&self) -> Size {
        Size::new(self.geometry.width(), self.geometry.height())
    }
}

impl embedded_graphics::draw_target::DrawTarget for Surface<'_> {
    type Color = Color;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = embedded_graphics::Pixel<Self::Color>>,
    {
        for pixel in pixels {
            self.set_pixel(pixel.0, pixel.1);
        }
        Ok(())
    }
}

unsafe impl ReadBuffer for Surface<'_> {
    type Word = u8;

    unsafe fn read_buffer(&self) -> (*const u8, usize) {
        (self.pixels.cast_const(), self.geometry.pixel_len())
    }
}

impl core::fmt::Debug for Surface<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.geometry.width())
            .field("height", &self.geometry.height())
            .field("stride", &self.geometry.stride())
            .field("bits_per_pixel", &self.geometry.bits_per_pixel())
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for Surface<'_> {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Surface {}x{} stride {} bpp {}",
            self.geometry.width(),
            self.geometry.height(),
            self.geometry.stride(),
            self.geometry.bits_per_pixel()
        );
    }
}
