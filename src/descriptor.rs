//! The SGDMA descriptor record and the circular ring builder.
//!
//! The engine walks a singly linked chain of fixed-size descriptor records.
//! Each record names where to read, how many bytes to move, and the
//! *physical* address of the next record. The hardware dereferences `next`
//! on its own, so the links must be bus addresses computed from the table
//! base, never CPU-side pointers.
//!
//! [`DescriptorRing::build`] partitions a pixel buffer into
//! [`MAX_DESCRIPTOR_TRANSFER`]-sized chunks and materializes one descriptor
//! per chunk directly into the descriptor table (the tail of the surface
//! region). The chain is closed into a ring, the last record pointing back
//! at the first, so that an engine running in park mode replays the whole
//! buffer indefinitely.
//!
//! Construction is two-pass: descriptors are written forward with the
//! hardware-owned bit set, then the first and last records are patched with
//! the start-of-packet and end-of-packet flags. The flags cannot be assigned
//! in a single pass because which record is last is only known once the walk
//! has consumed the whole buffer.

use core::mem::size_of;
use core::ptr;
use core::sync::atomic::{fence, Ordering};

use bitfield::bitfield;

use crate::ConfigurationError;

/// Hard per-descriptor transfer limit imposed by the engine.
pub const MAX_DESCRIPTOR_TRANSFER: usize = 0xFF00;

/// Number of descriptors needed to cover a buffer of `len` bytes.
#[must_use]
pub const fn descriptor_count(len: usize) -> usize {
    len.div_ceil(MAX_DESCRIPTOR_TRANSFER)
}

/// Bytes of descriptor-table storage needed for a buffer of `len` bytes.
#[must_use]
pub const fn descriptor_table_len(len: usize) -> usize {
    descriptor_count(len) * size_of::<Descriptor>()
}

bitfield! {
    /// Software-written control byte of a descriptor.
    ///
    /// The bit layout is as follows:
    /// - Bit 7: Owned-by-hardware
    /// - Bit 2: Generate start-of-packet
    /// - Bit 0: Generate end-of-packet
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct DescriptorControl(u8);
    impl Debug;
    pub generate_eop, set_generate_eop: 0;
    pub generate_sop, set_generate_sop: 2;
    pub owned_by_hw, set_owned_by_hw: 7;
}

impl DescriptorControl {
    /// An all-clear control byte.
    #[must_use]
    pub const fn new() -> Self {
        Self(0)
    }

    /// Raw byte value.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }
}

/// One SGDMA transfer descriptor, exactly as the hardware reads it.
///
/// 32 bytes, packed, no implicit padding. The `status` and
/// `actual_bytes_transferred` fields are written by the hardware; software
/// only ever initializes them to zero.
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    /// Read pointer into the source buffer (bus address).
    pub read_addr: u32,
    /// Upper half of a 64-bit read address; unused, kept zero.
    pub read_addr_pad: u32,
    /// Write pointer; unused for a streaming display sink, kept zero.
    pub write_addr: u32,
    /// Upper half of a 64-bit write address; unused, kept zero.
    pub write_addr_pad: u32,
    /// Bus address of the next descriptor in the ring.
    pub next: u32,
    /// Upper half of a 64-bit next pointer; unused, kept zero.
    pub next_pad: u32,
    /// Number of bytes this descriptor transfers.
    pub bytes_to_transfer: u16,
    /// Read-side burst size hint.
    pub read_burst: u8,
    /// Write-side burst size hint.
    pub write_burst: u8,
    /// Hardware-written transfer count.
    pub actual_bytes_transferred: u16,
    /// Hardware-written status byte.
    pub status: u8,
    /// Software-written control byte, see [`DescriptorControl`].
    pub control: u8,
}

// The record layout is a hardware contract.
const _: () = assert!(size_of::<Descriptor>() == 32);

impl Descriptor {
    /// Control byte as a typed view.
    #[must_use]
    pub const fn control_flags(&self) -> DescriptorControl {
        DescriptorControl(self.control)
    }
}

/// A built, circular descriptor ring.
///
/// Holds the location of the table it was built into; the memory itself is
/// owned by the surface region, never by the ring.
#[derive(Debug)]
pub struct DescriptorRing {
    table_cpu: *mut Descriptor,
    table_bus: u32,
    count: usize,
}

impl DescriptorRing {
    /// Partition `pixel_len` bytes starting at bus address `pixel_bus` into
    /// chunks of at most [`MAX_DESCRIPTOR_TRANSFER`] bytes and write one
    /// descriptor per chunk at `table_cpu`, linked through bus addresses
    /// derived from `table_bus`.
    ///
    /// The last descriptor's size is the true remainder, and the loop never
    /// emits a trailing zero-length record when the buffer divides evenly.
    /// On success the table ends with a release fence so the engine observes
    /// a fully written ring.
    ///
    /// # Errors
    ///
    /// [`ConfigurationError::EmptySurface`] when `pixel_len` is zero; an
    /// empty ring cannot be started. Nothing is written in that case.
    ///
    /// # Safety
    ///
    /// `table_cpu` must point to at least `descriptor_table_len(pixel_len)`
    /// writable bytes that stay valid (and are not written by anyone else)
    /// for as long as the returned ring, and the engine consuming it, is
    /// in use. `table_bus` must be the bus address of the same memory.
    pub unsafe fn build(
        pixel_bus: u32,
        pixel_len: usize,
        table_cpu: *mut Descriptor,
        table_bus: u32,
    ) -> Result<Self, ConfigurationError> {
        let count = descriptor_count(pixel_len);
        if count == 0 {
            return Err(ConfigurationError::EmptySurface);
        }

        let mut owned = DescriptorControl::new();
        owned.set_owned_by_hw(true);

        let mut src = pixel_bus;
        let mut next = table_bus;
        let mut remaining = pixel_len;
        for index in 0..count {
            let chunk = remaining.min(MAX_DESCRIPTOR_TRANSFER);
            next = next.wrapping_add(size_of::<Descriptor>() as u32);
            let descriptor = Descriptor {
                read_addr: src,
                read_addr_pad: 0,
                write_addr: 0,
                write_addr_pad: 0,
                next,
                next_pad: 0,
                bytes_to_transfer: chunk as u16,
                read_burst: 0,
                write_burst: 0,
                actual_bytes_transferred: 0,
                status: 0,
                control: owned.bits(),
            };
            ptr::write_volatile(table_cpu.add(index), descriptor);
            src = src.wrapping_add(chunk as u32);
            remaining -= chunk;
        }

        // Patch pass: close the ring and mark the packet edges. In a ring of
        // one the same record carries both flags.
        let last = table_cpu.add(count - 1);
        let mut descriptor = ptr::read_volatile(last);
        descriptor.next = table_bus;
        let mut control = descriptor.control_flags();
        control.set_generate_eop(true);
        descriptor.control = control.bits();
        ptr::write_volatile(last, descriptor);

        let mut descriptor = ptr::read_volatile(table_cpu);
        let mut control = descriptor.control_flags();
        control.set_generate_sop(true);
        descriptor.control = control.bits();
        ptr::write_volatile(table_cpu, descriptor);

        fence(Ordering::Release);

        Ok(Self {
            table_cpu,
            table_bus,
            count,
        })
    }

    /// Bus address of the first descriptor, i.e. what the engine's
    /// next-descriptor-pointer register is programmed with.
    #[must_use]
    pub const fn base_address(&self) -> u32 {
        self.table_bus
    }

    /// Number of descriptors in the ring.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// A built ring is never empty; zero-length buffers are rejected by
    /// [`DescriptorRing::build`].
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Read descriptor `index` back from the table.
    ///
    /// Volatile, because the hardware updates the status fields in place
    /// once the engine is running. Returns `None` past the end of the ring.
    #[must_use]
    pub fn descriptor(&self, index: usize) -> Option<Descriptor> {
        if index < self.count {
            // In bounds of the table memory vouched for at build time.
            Some(unsafe { ptr::read_volatile(self.table_cpu.add(index)) })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::vec;
    use std::vec::Vec;

    use super::*;

    const TABLE_BUS: u32 = 0x2000_0000;
    const PIXEL_BUS: u32 = 0x1000_0000;

    fn build_ring(pixel_len: usize) -> (Vec<u8>, DescriptorRing) {
        let mut table = vec![0u8; descriptor_table_len(pixel_len).max(1)];
        let ring = unsafe {
            DescriptorRing::build(
                PIXEL_BUS,
                pixel_len,
                table.as_mut_ptr().cast::<Descriptor>(),
                TABLE_BUS,
            )
        }
        .unwrap();
        (table, ring)
    }

    #[test]
    fn test_descriptor_record_is_32_bytes() {
        assert_eq!(size_of::<Descriptor>(), 32);
    }

    #[test]
    fn test_descriptor_count() {
        assert_eq!(descriptor_count(0), 0);
        assert_eq!(descriptor_count(1), 1);
        assert_eq!(descriptor_count(MAX_DESCRIPTOR_TRANSFER - 1), 1);
        assert_eq!(descriptor_count(MAX_DESCRIPTOR_TRANSFER), 1);
        assert_eq!(descriptor_count(MAX_DESCRIPTOR_TRANSFER + 1), 2);
        assert_eq!(descriptor_count(3 * MAX_DESCRIPTOR_TRANSFER), 3);
        // 640x480x16: 614400 / 65280 rounds up to 10.
        assert_eq!(descriptor_count(614_400), 10);
    }

    #[test]
    fn test_descriptor_table_len() {
        assert_eq!(descriptor_table_len(0), 0);
        assert_eq!(descriptor_table_len(1), 32);
        assert_eq!(descriptor_table_len(614_400), 320);
    }

    #[test]
    fn test_control_byte_bits() {
        let mut control = DescriptorControl::new();
        assert_eq!(control.bits(), 0);

        control.set_generate_eop(true);
        assert_eq!(control.bits(), 0x01);
        control.set_generate_sop(true);
        assert_eq!(control.bits(), 0x05);
        control.set_owned_by_hw(true);
        assert_eq!(control.bits(), 0x85);

        assert!(control.generate_eop());
        assert!(control.generate_sop());
        assert!(control.owned_by_hw());
    }

    #[test]
    fn test_empty_buffer_rejected_and_table_untouched() {
        let mut table = vec![0xABu8; 64];
        let result = unsafe {
            DescriptorRing::build(PIXEL_BUS, 0, table.as_mut_ptr().cast::<Descriptor>(), TABLE_BUS)
        };
        assert_eq!(result.unwrap_err(), ConfigurationError::EmptySurface);
        assert!(table.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn test_sizes_sum_to_buffer_length() {
        for pixel_len in [
            1,
            100,
            MAX_DESCRIPTOR_TRANSFER - 1,
            MAX_DESCRIPTOR_TRANSFER,
            MAX_DESCRIPTOR_TRANSFER + 1,
            3 * MAX_DESCRIPTOR_TRANSFER,
            3 * MAX_DESCRIPTOR_TRANSFER + 7,
            614_400,
        ] {
            let (_table, ring) = build_ring(pixel_len);
            assert_eq!(ring.len(), descriptor_count(pixel_len));

            let total: usize = (0..ring.len())
                .map(|i| ring.descriptor(i).unwrap().bytes_to_transfer as usize)
                .sum();
            assert_eq!(total, pixel_len, "sum mismatch for len {pixel_len}");

            let last = ring.descriptor(ring.len() - 1).unwrap();
            let last_len = last.bytes_to_transfer as usize;
            assert!(last_len > 0);
            assert!(last_len <= MAX_DESCRIPTOR_TRANSFER);
        }
    }

    #[test]
    fn test_no_trailing_zero_descriptor_on_exact_multiple() {
        let (_table, ring) = build_ring(2 * MAX_DESCRIPTOR_TRANSFER);
        assert_eq!(ring.len(), 2);
        assert_eq!(
            ring.descriptor(1).unwrap().bytes_to_transfer as usize,
            MAX_DESCRIPTOR_TRANSFER
        );
    }

    #[test]
    fn test_read_addresses_are_cumulative() {
        let (_table, ring) = build_ring(3 * MAX_DESCRIPTOR_TRANSFER + 7);
        let mut expected = PIXEL_BUS;
        for i in 0..ring.len() {
            let descriptor = ring.descriptor(i).unwrap();
            assert_eq!({ descriptor.read_addr }, expected);
            assert_eq!({ descriptor.write_addr }, 0);
            assert_eq!({ descriptor.actual_bytes_transferred }, 0);
            assert_eq!(descriptor.status, 0);
            expected += u32::from(descriptor.bytes_to_transfer);
        }
    }

    #[test]
    fn test_ring_is_circular_and_visits_each_once() {
        let (_table, ring) = build_ring(614_400);
        let mut visited = vec![false; ring.len()];
        let mut address = ring.base_address();
        for _ in 0..ring.len() {
            let offset = (address - TABLE_BUS) as usize;
            assert_eq!(offset % size_of::<Descriptor>(), 0);
            let index = offset / size_of::<Descriptor>();
            assert!(index < ring.len(), "next pointer left the ring");
            assert!(!visited[index], "descriptor {index} visited twice");
            visited[index] = true;
            address = ring.descriptor(index).unwrap().next;
        }
        assert!(visited.iter().all(|&v| v));
        assert_eq!(address, ring.base_address());
    }

    #[test]
    fn test_exactly_one_sop_and_one_eop() {
        let (_table, ring) = build_ring(614_400);
        let sop = (0..ring.len())
            .filter(|&i| ring.descriptor(i).unwrap().control_flags().generate_sop())
            .count();
        let eop = (0..ring.len())
            .filter(|&i| ring.descriptor(i).unwrap().control_flags().generate_eop())
            .count();
        assert_eq!(sop, 1);
        assert_eq!(eop, 1);
        assert!(ring.descriptor(0).unwrap().control_flags().generate_sop());
        assert!(ring
            .descriptor(ring.len() - 1)
            .unwrap()
            .control_flags()
            .generate_eop());
    }

    #[test]
    fn test_single_descriptor_ring_carries_both_flags() {
        let (_table, ring) = build_ring(4096);
        assert_eq!(ring.len(), 1);
        assert!(!ring.is_empty());
        let control = ring.descriptor(0).unwrap().control_flags();
        assert!(control.generate_sop());
        assert!(control.generate_eop());
        assert!(control.owned_by_hw());
        assert_eq!({ ring.descriptor(0).unwrap().next }, TABLE_BUS);
    }

    #[test]
    fn test_all_descriptors_owned_by_hardware() {
        let (_table, ring) = build_ring(5 * MAX_DESCRIPTOR_TRANSFER + 123);
        for i in 0..ring.len() {
            assert!(ring.descriptor(i).unwrap().control_flags().owned_by_hw());
        }
    }

    #[test]
    fn test_scenario_640x480x16() {
        let (_table, ring) = build_ring(614_400);
        assert_eq!(ring.len(), 10);
        let last = ring.descriptor(9).unwrap();
        assert_eq!({ last.bytes_to_transfer }, 26_880);
        assert_eq!({ last.read_addr }, PIXEL_BUS + 9 * 65_280);
    }

    #[test]
    fn test_descriptor_out_of_range() {
        let (_table, ring) = build_ring(4096);
        assert!(ring.descriptor(1).is_none());
    }
}
