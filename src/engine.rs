//! The SGDMA engine controller: register map and start sequence.
//!
//! The engine exposes a small memory-mapped control block. Starting it
//! against a built descriptor ring is a fixed, ordered register sequence
//! (reset, clear, arm, run), and the ordering is a correctness invariant:
//! programming the descriptor pointer before status is cleared, or setting
//! the run bit before the pointer is programmed, leaves the engine chasing a
//! stale or undefined descriptor.
//!
//! Because the ring is parked (continuous replay), there is no completion to
//! wait for. Once [`Sgdma::start`] returns, software is done with the
//! register block for the lifetime of the device; the integrator can unmap
//! it immediately.

use bitfield::bitfield;

use crate::Error;

/// Engine register byte offsets and fixed patterns.
pub mod regs {
    /// Span of the register block. Must be exclusively reserved for the
    /// duration of setup.
    pub const BLOCK_LEN: usize = 0x400;

    /// Status register.
    pub const STATUS: usize = 0x00;
    /// Control register.
    pub const CONTROL: usize = 0x10;
    /// Next-descriptor-pointer register.
    pub const NEXT_DESCRIPTOR_POINTER: usize = 0x20;

    /// Write this to [`STATUS`] to clear every event bit.
    pub const CLEAR_STATUS: u32 = 0xFF;
}

bitfield! {
    /// Engine control register word.
    ///
    /// The bit layout is as follows:
    /// - Bit 17: Park (replay the ring instead of stopping at EOP)
    /// - Bit 16: Software reset
    /// - Bit 5: Run
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct Control(u32);
    impl Debug;
    pub run, set_run: 5;
    pub software_reset, set_software_reset: 16;
    pub park, set_park: 17;
}

impl Control {
    /// An all-clear control word.
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Raw register value.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

bitfield! {
    /// Engine status register word.
    ///
    /// The bit layout is as follows:
    /// - Bit 4: Busy
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct Status(u32);
    impl Debug;
    pub busy, _: 4;
}

impl Status {
    /// Wrap a raw status register value.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }
}

/// 32-bit access to the engine's register block.
///
/// [`MmioRegisters`] is the real implementation; tests substitute a
/// recording fake. Register access is infallible: by the time a bus exists
/// the block is mapped, and a bus that stops responding is a structural
/// fault no retry will fix.
pub trait RegisterBus {
    /// Read the register at `offset`.
    fn read(&self, offset: usize) -> u32;
    /// Write the register at `offset`.
    fn write(&mut self, offset: usize, value: u32);
}

/// Memory-mapped register block access.
pub struct MmioRegisters {
    base: *mut u8,
}

impl MmioRegisters {
    /// Wrap a mapped register block.
    ///
    /// # Safety
    ///
    /// `base` must point to at least [`regs::BLOCK_LEN`] bytes of mapped,
    /// 4-byte-aligned device memory that this value has exclusive access to
    /// for its lifetime.
    #[must_use]
    pub const unsafe fn new(base: *mut u8) -> Self {
        Self { base }
    }
}

impl RegisterBus for MmioRegisters {
    fn read(&self, offset: usize) -> u32 {
        // Offsets come from `regs`, all well inside BLOCK_LEN.
        unsafe { self.base.add(offset).cast::<u32>().read_volatile() }
    }

    fn write(&mut self, offset: usize, value: u32) {
        unsafe { self.base.add(offset).cast::<u32>().write_volatile(value) }
    }
}

/// Where the engine is in its one-way life cycle.
///
/// There is no transition back to `Idle`: shutdown is external. The region
/// backing the ring is freed while the engine keeps refreshing from the last
/// valid buffer until power-down, per the hardware's free-run design.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngineState {
    /// Constructed, nothing written yet.
    Idle,
    /// Software reset issued; any in-flight transfer halted.
    Resetting,
    /// First-descriptor pointer programmed.
    Armed,
    /// Run and park bits written; the engine is replaying the ring.
    Running,
}

/// The DMA engine controller.
pub struct Sgdma<B: RegisterBus> {
    bus: B,
    state: EngineState,
}

impl<B: RegisterBus> Sgdma<B> {
    /// Wrap a register bus; the engine is considered idle until started.
    pub const fn new(bus: B) -> Self {
        Self {
            bus,
            state: EngineState::Idle,
        }
    }

    /// Current point in the engine's life cycle.
    #[must_use]
    pub const fn state(&self) -> EngineState {
        self.state
    }

    /// Whether the engine reports a transfer in flight.
    ///
    /// Diagnostics only; a parked engine is busy for as long as the display
    /// lives.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        Status::from_bits(self.bus.read(regs::STATUS)).busy()
    }

    /// Reset, arm and start continuous replay of the ring at
    /// `first_descriptor`.
    ///
    /// Issues exactly this sequence, in order, with no early return once the
    /// first write has been made:
    ///
    /// 1. Control = software-reset (halt any in-flight transfer)
    /// 2. Control = 0 (clear reset, disable interrupts)
    /// 3. Status = all-ones (clear stale event bits)
    /// 4. Next-Descriptor-Pointer = `first_descriptor`
    /// 5. Control = run | park (start continuous replay)
    ///
    /// There is nothing to poll afterwards; park mode never completes.
    ///
    /// # Errors
    ///
    /// [`Error::EngineStart`] when `first_descriptor` is null, detected
    /// before any register is written.
    pub fn start(&mut self, first_descriptor: u32) -> Result<(), Error> {
        if first_descriptor == 0 {
            return Err(Error::EngineStart);
        }

        let mut reset = Control::new();
        reset.set_software_reset(true);
        self.bus.write(regs::CONTROL, reset.bits());
        self.state = EngineState::Resetting;

        self.bus.write(regs::CONTROL, Control::new().bits());
        self.bus.write(regs::STATUS, regs::CLEAR_STATUS);

        self.bus
            .write(regs::NEXT_DESCRIPTOR_POINTER, first_descriptor);
        self.state = EngineState::Armed;

        let mut run = Control::new();
        run.set_run(true);
        run.set_park(true);
        self.bus.write(regs::CONTROL, run.bits());
        self.state = EngineState::Running;

        Ok(())
    }

    /// Give the bus back, typically so the integrator can unmap the block
    /// after a successful start.
    pub fn release(self) -> B {
        self.bus
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::vec;
    use std::vec::Vec;

    use super::*;

    /// Records writes and serves reads from a shadow register file.
    struct FakeBus {
        writes: Vec<(usize, u32)>,
        shadow: [u32; regs::BLOCK_LEN / 4],
    }

    impl FakeBus {
        fn new() -> Self {
            Self {
                writes: Vec::new(),
                shadow: [0; regs::BLOCK_LEN / 4],
            }
        }
    }

    impl RegisterBus for FakeBus {
        fn read(&self, offset: usize) -> u32 {
            self.shadow[offset / 4]
        }

        fn write(&mut self, offset: usize, value: u32) {
            self.writes.push((offset, value));
            self.shadow[offset / 4] = value;
        }
    }

    #[test]
    fn test_control_register_bits() {
        let mut control = Control::new();
        control.set_run(true);
        assert_eq!(control.bits(), 0x20);

        let mut control = Control::new();
        control.set_software_reset(true);
        assert_eq!(control.bits(), 0x1_0000);

        let mut control = Control::new();
        control.set_park(true);
        assert_eq!(control.bits(), 0x2_0000);
    }

    #[test]
    fn test_status_busy_bit() {
        assert!(Status::from_bits(0x10).busy());
        assert!(!Status::from_bits(0x0F).busy());
    }

    #[test]
    fn test_start_issues_exact_write_sequence() {
        let mut engine = Sgdma::new(FakeBus::new());
        engine.start(0x2000_0000).unwrap();

        assert_eq!(
            engine.release().writes,
            vec![
                (regs::CONTROL, 0x1_0000),
                (regs::CONTROL, 0),
                (regs::STATUS, 0xFF),
                (regs::NEXT_DESCRIPTOR_POINTER, 0x2000_0000),
                (regs::CONTROL, 0x20 | 0x2_0000),
            ]
        );
    }

    #[test]
    fn test_state_progression() {
        let mut engine = Sgdma::new(FakeBus::new());
        assert_eq!(engine.state(), EngineState::Idle);
        engine.start(0x1000).unwrap();
        assert_eq!(engine.state(), EngineState::Running);
    }

    #[test]
    fn test_null_ring_rejected_before_any_write() {
        let mut engine = Sgdma::new(FakeBus::new());
        assert_eq!(engine.start(0), Err(Error::EngineStart));
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.release().writes.is_empty());
    }

    #[test]
    fn test_is_busy_reads_status() {
        let mut bus = FakeBus::new();
        bus.shadow[regs::STATUS / 4] = 0x10;
        let engine = Sgdma::new(bus);
        assert!(engine.is_busy());

        let engine = Sgdma::new(FakeBus::new());
        assert!(!engine.is_busy());
    }

    #[test]
    fn test_mmio_registers_volatile_access() {
        let mut block = vec![0u32; regs::BLOCK_LEN / 4].into_boxed_slice();
        let base = block.as_mut_ptr().cast::<u8>();
        let mut mmio = unsafe { MmioRegisters::new(base) };

        mmio.write(regs::NEXT_DESCRIPTOR_POINTER, 0xDEAD_BEEF);
        assert_eq!(mmio.read(regs::NEXT_DESCRIPTOR_POINTER), 0xDEAD_BEEF);
        assert_eq!(block[regs::NEXT_DESCRIPTOR_POINTER / 4], 0xDEAD_BEEF);
    }

    #[test]
    fn test_register_offsets_match_block_layout() {
        assert_eq!(regs::STATUS, 0x00);
        assert_eq!(regs::CONTROL, 0x10);
        assert_eq!(regs::NEXT_DESCRIPTOR_POINTER, 0x20);
        assert_eq!(regs::BLOCK_LEN, 0x400);
    }
}
