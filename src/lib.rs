//! Framebuffer driver for display controllers fed by a scatter-gather DMA
//! (SGDMA) engine.
//!
//! ## How an SGDMA-fed display works
//!
//! The display controller on these systems has no framebuffer of its own. It
//! is a sink on the bus that must be *streamed* pixel data continuously, and
//! the streaming is done by a small scatter-gather DMA engine sitting between
//! DRAM and the controller.
//!
//! The engine does not understand "a framebuffer". It understands a chain of
//! fixed-size **descriptor** records, each naming a source address, a byte
//! count, and the address of the next descriptor. Two properties of the
//! hardware shape everything in this crate:
//!
//! - A single descriptor can move at most [`MAX_DESCRIPTOR_TRANSFER`]
//!   (`0xFF00`) bytes, so any realistic pixel buffer has to be cut into a
//!   chain of chunk-sized descriptors.
//! - In **park mode** the engine, upon reaching the end-of-packet
//!   descriptor, follows its `next` pointer back to the start of the chain
//!   and keeps going. Make the chain circular and the engine refreshes the
//!   display from DRAM forever with zero software involvement.
//!
//! So bringing up the display means:
//!
//! 1. Resolve the requested width/height/depth into a concrete buffer layout
//!    ([`geometry`]).
//! 2. Allocate one physically contiguous region holding the pixel buffer
//!    with the descriptor table packed right after it ([`display`], through
//!    the integrator's [`display::DisplayPlatform`]).
//! 3. Build the circular descriptor ring in the tail of that region
//!    ([`descriptor`]).
//! 4. Issue the engine's reset/arm/run register sequence, in exactly the
//!    right order ([`engine`]).
//!
//! After step 4 the engine free-runs. Software draws into the pixel region
//! through [`surface::Surface`] (an [`embedded-graphics`] `DrawTarget`) and
//! never touches the ring or the registers again; a mode change means tearing
//! the whole device down and attaching again.
//!
//! [`embedded-graphics`]: https://docs.rs/embedded-graphics
//!
//! ## Hardware seams
//!
//! The crate is `no_std` and owns no hardware. Three small traits are the
//! integration points:
//!
//! - [`display::DisplayPlatform`] – allocates the DMA-capable surface region
//!   and claims/maps the engine's register block (the OS driver-model side)
//! - [`surface::SurfaceMemory`] – one contiguous allocation with a CPU
//!   pointer and a bus address, freed when dropped
//! - [`engine::RegisterBus`] – 32-bit register access;
//!   [`engine::MmioRegisters`] is the provided memory-mapped implementation
//!
//! ## Available Feature Flags
//!
//! ### `color-bars` Feature (disabled by default)
//! Adds the classic 8-bar startup test pattern
//! (`bars::paint` / `Display::paint_color_bars`), useful to verify the
//! descriptor ring and engine bring-up before any real drawing code runs.
//!
//! ### `defmt` Feature
//! Implements `defmt::Format` for the error and state types so they can be
//! emitted with the `defmt` logging framework. No functional changes; purely
//! adds trait impls.
#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use embedded_graphics::pixelcolor::Rgb888;

#[cfg(feature = "color-bars")]
pub mod bars;
pub mod descriptor;
pub mod display;
pub mod engine;
pub mod geometry;
pub mod surface;

pub use descriptor::MAX_DESCRIPTOR_TRANSFER;

/// Color type used for drawing into a surface.
///
/// Quantization to the surface's native pixel format (RGB565 for 16-bpp
/// modes) happens at the surface boundary.
pub type Color = Rgb888;

/// Reasons a device description cannot be resolved into a working geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigurationError {
    /// The `width` property is absent from the device description.
    MissingWidth,
    /// The `height` property is absent from the device description.
    MissingHeight,
    /// The `bpp` property is absent from the device description.
    MissingDepth,
    /// The `bpp` property is not one of 8, 16, 24 or 32.
    UnsupportedDepth(u32),
    /// The resolved pixel buffer is zero bytes long; an empty descriptor
    /// ring cannot be started.
    EmptySurface,
}

impl core::fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MissingWidth => write!(f, "missing required property 'width'"),
            Self::MissingHeight => write!(f, "missing required property 'height'"),
            Self::MissingDepth => write!(f, "missing required property 'bpp'"),
            Self::UnsupportedDepth(bpp) => write!(f, "unsupported bits-per-pixel {bpp}"),
            Self::EmptySurface => write!(f, "pixel buffer is empty"),
        }
    }
}

/// Errors raised while attaching a display.
///
/// Every variant is fatal to the attach attempt: the caller gets either a
/// fully running display or no device artifact at all. There is no retry
/// path anywhere in the crate; register programming is synchronous, and if
/// the bus does not respond the failure is structural.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The device description is missing or invalid. No hardware was
    /// touched.
    Configuration(ConfigurationError),
    /// The surface region could not be obtained. Nothing to roll back.
    Allocation,
    /// The engine register block is already claimed by another owner.
    ResourceBusy,
    /// The engine register block could not be mapped. The claim is released
    /// before this is returned.
    DeviceUnavailable,
    /// The start sequence could not be issued against the engine.
    EngineStart,
}

impl From<ConfigurationError> for Error {
    fn from(err: ConfigurationError) -> Self {
        Self::Configuration(err)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Configuration(err) => write!(f, "configuration error: {err}"),
            Self::Allocation => write!(f, "unable to allocate surface region"),
            Self::ResourceBusy => write!(f, "register block busy"),
            Self::DeviceUnavailable => write!(f, "unable to map register block"),
            Self::EngineStart => write!(f, "unable to start DMA engine"),
        }
    }
}
