//! Device attach/detach orchestration.
//!
//! [`Display::attach`] is the one place where the pieces meet, in a fixed
//! order: resolve geometry, allocate the surface region, build the
//! descriptor ring into its tail, claim and map the engine's register
//! block, issue the start sequence, and unmap the block again; the parked
//! engine free-runs and software never touches the registers afterwards.
//!
//! Everything acquired along the way is held in a droppable value
//! (the platform's memory, claim and register types), so any failure
//! unwinds the acquisitions in reverse order simply by leaving the scope:
//! mapped registers go first, then the claim, then the surface region. A
//! failed attach leaves zero resident resources; callers see either a fully
//! running display or no device artifact at all.

use crate::descriptor::{Descriptor, DescriptorRing};
use crate::engine::{EngineState, RegisterBus, Sgdma};
use crate::geometry::{DisplayConfig, Geometry};
use crate::surface::{Surface, SurfaceMemory};
use crate::Error;

/// The OS/board side of device attach.
///
/// Implementations supply DMA-capable memory and access to the engine's
/// register block. All three associated types are RAII values:
///
/// - dropping `Memory` frees the allocation,
/// - dropping `Claim` releases the register-block reservation,
/// - dropping `Registers` unmaps the block *and* releases the reservation
///   it absorbed in [`DisplayPlatform::map_registers`].
///
/// That contract is what gives [`Display::attach`] its guaranteed
/// reverse-order teardown; implementations that leak in `Drop` break the
/// attach-is-atomic promise.
pub trait DisplayPlatform {
    /// A physically contiguous, DMA-capable allocation.
    type Memory: SurfaceMemory;
    /// An exclusive reservation of the engine's register block.
    type Claim;
    /// A mapped register block.
    type Registers: RegisterBus;

    /// Allocate `len` bytes of physically contiguous, DMA-capable memory.
    /// Zero-initialization is not required.
    ///
    /// # Errors
    ///
    /// [`Error::Allocation`] when the region cannot be obtained.
    fn alloc_surface(&mut self, len: usize) -> Result<Self::Memory, Error>;

    /// Exclusively reserve the engine's register block
    /// ([`regs::BLOCK_LEN`](crate::engine::regs::BLOCK_LEN) bytes).
    ///
    /// # Errors
    ///
    /// [`Error::ResourceBusy`] when another owner holds the block.
    fn claim_registers(&mut self) -> Result<Self::Claim, Error>;

    /// Map the claimed block into the CPU's address space.
    ///
    /// Consumes the claim; on failure the implementation must release it
    /// (dropping it suffices) before returning.
    ///
    /// # Errors
    ///
    /// [`Error::DeviceUnavailable`] when the block cannot be mapped.
    fn map_registers(&mut self, claim: Self::Claim) -> Result<Self::Registers, Error>;
}

/// A running display device.
///
/// Owns the surface region for its whole lifetime. Dropping the display (or
/// calling [`Display::detach`]) frees the region exactly once; the engine is
/// not quiesced and keeps refreshing from the last valid buffer until
/// power-down, matching the hardware's free-run design. A mode change
/// requires detach and a fresh [`Display::attach`].
pub struct Display<M: SurfaceMemory> {
    memory: M,
    geometry: Geometry,
    state: EngineState,
}

impl<M: SurfaceMemory> Display<M> {
    /// Bring up a display: resolve `config`, allocate the surface region,
    /// build the descriptor ring, and start the engine parked on it.
    ///
    /// On success the register block has already been unmapped and
    /// released; setup is the only time software touches it.
    ///
    /// # Errors
    ///
    /// Any [`Error`]; every failure fully unwinds whatever was acquired
    /// before it, in reverse order, so a failed attach leaves nothing
    /// resident.
    pub fn attach<P>(platform: &mut P, config: &DisplayConfig) -> Result<Self, Error>
    where
        P: DisplayPlatform<Memory = M>,
    {
        let geometry = Geometry::resolve(config)?;

        let memory = platform.alloc_surface(geometry.surface_len())?;
        if memory.len() < geometry.surface_len() {
            return Err(Error::Allocation);
        }

        // The descriptor table lives at the tail of the surface region,
        // right after the pixel buffer.
        let pixel_bus = memory.bus_base();
        let table_bus = pixel_bus.wrapping_add(geometry.pixel_len() as u32);
        let table_cpu = unsafe { memory.cpu_base().add(geometry.pixel_len()) }.cast::<Descriptor>();
        // Table memory is inside the allocation just obtained and nothing
        // else writes it; the region outlives the engine's use by ownership.
        let ring =
            unsafe { DescriptorRing::build(pixel_bus, geometry.pixel_len(), table_cpu, table_bus) }?;

        let claim = platform.claim_registers()?;
        let registers = platform.map_registers(claim)?;

        let mut engine = Sgdma::new(registers);
        engine.start(ring.base_address())?;
        let state = engine.state();

        // Setup is done: unmap and release the register block while the
        // engine free-runs.
        drop(engine.release());

        Ok(Self {
            memory,
            geometry,
            state,
        })
    }

    /// The resolved geometry this display runs with.
    #[must_use]
    pub const fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Engine state as of the end of attach.
    #[must_use]
    pub const fn engine_state(&self) -> EngineState {
        self.state
    }

    /// Borrow the pixel sub-region for software drawing.
    pub fn surface(&mut self) -> Surface<'_> {
        // The pixel buffer is the head of the owned region; the borrow of
        // self keeps it alive and exclusive for the view's lifetime.
        unsafe { Surface::from_raw(self.memory.cpu_base(), self.geometry) }
    }

    /// Paint the 8-bar startup test pattern.
    #[cfg(feature = "color-bars")]
    pub fn paint_color_bars(&mut self) {
        crate::bars::paint(&mut self.surface());
    }

    /// Tear the device down, freeing the surface region exactly once.
    ///
    /// Equivalent to dropping the display; provided so call sites can name
    /// the intent.
    pub fn detach(self) {
        drop(self);
    }
}

impl<M: SurfaceMemory> core::fmt::Debug for Display<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Display")
            .field("width", &self.geometry.width())
            .field("height", &self.geometry.height())
            .field("bits_per_pixel", &self.geometry.bits_per_pixel())
            .field("surface_len", &self.geometry.surface_len())
            .field("state", &self.state)
            .finish()
    }
}
