//! Resolves a requested display mode into a concrete buffer layout.
//!
//! The device description hands us three numbers (width, height and bits
//! per pixel) and everything else in the driver is derived from them here:
//! the row stride, the total pixel-buffer length, the size of the combined
//! surface region (pixel bytes plus descriptor table), and the RGB channel
//! layout the surface uses to pack colors.
//!
//! Resolution is a pure computation. It touches no hardware and creates no
//! partial state; a bad description fails the whole attach before anything
//! has been allocated.

use crate::descriptor::descriptor_table_len;
use crate::ConfigurationError;

/// Requested display mode, as read from the device description.
///
/// Each property is mandatory; `None` models "the description does not carry
/// this property" and fails resolution. This is an immutable value object:
/// build one, pass it to [`Geometry::resolve`], done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisplayConfig {
    /// Horizontal resolution in pixels.
    pub width: Option<u32>,
    /// Vertical resolution in pixels.
    pub height: Option<u32>,
    /// Requested bits per pixel. One of 8, 16, 24 or 32.
    pub bpp: Option<u32>,
}

impl DisplayConfig {
    /// Build a config with every required property present.
    #[must_use]
    pub const fn new(width: u32, height: u32, bpp: u32) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            bpp: Some(bpp),
        }
    }
}

/// Bit position and width of one color channel within a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Channel {
    /// Offset of the least significant bit of the channel.
    pub offset: u8,
    /// Number of bits in the channel.
    pub length: u8,
}

/// RGB channel layout of the native pixel format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PixelLayout {
    /// Red channel.
    pub red: Channel,
    /// Green channel.
    pub green: Channel,
    /// Blue channel.
    pub blue: Channel,
}

/// RGB565: red at 11/5, green at 5/6, blue at 0/5.
pub const RGB565: PixelLayout = PixelLayout {
    red: Channel {
        offset: 11,
        length: 5,
    },
    green: Channel {
        offset: 5,
        length: 6,
    },
    blue: Channel {
        offset: 0,
        length: 5,
    },
};

/// RGB888: red at 16/8, green at 8/8, blue at 0/8.
pub const RGB888: PixelLayout = PixelLayout {
    red: Channel {
        offset: 16,
        length: 8,
    },
    green: Channel {
        offset: 8,
        length: 8,
    },
    blue: Channel {
        offset: 0,
        length: 8,
    },
};

/// A fully resolved display geometry.
///
/// Produced by [`Geometry::resolve`]; immutable afterwards. A mode change
/// requires a full detach and re-attach, so nothing here is ever updated in
/// place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Geometry {
    width: u32,
    height: u32,
    bits_per_pixel: u32,
    stride: usize,
    pixel_len: usize,
    layout: PixelLayout,
}

impl Geometry {
    /// Resolve a device description into a concrete geometry.
    ///
    /// A requested depth of 24 is silently promoted to 32 so that pixel rows
    /// stay aligned to 16-bit addresses; the stride is computed from the
    /// effective depth.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::MissingWidth`], [`ConfigurationError::MissingHeight`]
    /// or [`ConfigurationError::MissingDepth`] when the description lacks the
    /// property, and [`ConfigurationError::UnsupportedDepth`] when `bpp` is
    /// not one of 8, 16, 24 or 32.
    pub fn resolve(config: &DisplayConfig) -> Result<Self, ConfigurationError> {
        let width = config.width.ok_or(ConfigurationError::MissingWidth)?;
        let height = config.height.ok_or(ConfigurationError::MissingHeight)?;
        let bpp = config.bpp.ok_or(ConfigurationError::MissingDepth)?;

        let bits_per_pixel = match bpp {
            24 => 32,
            8 | 16 | 32 => bpp,
            other => return Err(ConfigurationError::UnsupportedDepth(other)),
        };

        let layout = if bits_per_pixel == 16 { RGB565 } else { RGB888 };
        let stride = width as usize * (bits_per_pixel as usize / 8);
        let pixel_len = stride * height as usize;

        Ok(Self {
            width,
            height,
            bits_per_pixel,
            stride,
            pixel_len,
            layout,
        })
    }

    /// Horizontal resolution in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Vertical resolution in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Effective bits per pixel (24 has been promoted to 32).
    #[must_use]
    pub const fn bits_per_pixel(&self) -> u32 {
        self.bits_per_pixel
    }

    /// Bytes per pixel.
    #[must_use]
    pub const fn bytes_per_pixel(&self) -> usize {
        self.bits_per_pixel as usize / 8
    }

    /// Bytes per row of the pixel surface.
    #[must_use]
    pub const fn stride(&self) -> usize {
        self.stride
    }

    /// Total length of the pixel buffer in bytes.
    #[must_use]
    pub const fn pixel_len(&self) -> usize {
        self.pixel_len
    }

    /// RGB channel layout of the native pixel format.
    #[must_use]
    pub const fn layout(&self) -> PixelLayout {
        self.layout
    }

    /// Length of the combined surface region: the pixel buffer plus the
    /// descriptor table that is packed immediately after it.
    #[must_use]
    pub const fn surface_len(&self) -> usize {
        self.pixel_len + descriptor_table_len(self.pixel_len)
    }
}
