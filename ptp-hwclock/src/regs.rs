//! Register map of the Ethernet MAC time stamp unit
//!
//! The layout follows the IEEE-1588 block of the Synopsys Ethernet MAC as
//! found in STM32F4/F7 parts, starting at offset `0x700` of the MAC. Only the
//! registers the clock and timer touch are described.

use core::ptr::NonNull;

use bitflags::bitflags;

/// Registers of the time stamp unit, by byte offset from its base
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(usize)]
pub enum Register {
    /// Time stamp control
    Control = 0x00,
    /// Subsecond increment, the resolution in nanoseconds per tick
    SubsecondIncrement = 0x04,
    /// Live seconds counter, read only
    Seconds = 0x08,
    /// Live nanoseconds counter, read only
    Nanoseconds = 0x0c,
    /// Staged seconds for initialize and update
    SecondsUpdate = 0x10,
    /// Staged nanoseconds for initialize and update, with [`UPDATE_SUBTRACT`]
    NanosecondsUpdate = 0x14,
    /// Accumulator increment
    Addend = 0x18,
    /// Comparator target seconds
    TargetSeconds = 0x1c,
    /// Comparator target nanoseconds
    TargetNanoseconds = 0x20,
    /// Status, cleared on read
    Status = 0x28,
    /// Pulse per second output frequency
    PpsControl = 0x2c,
}

impl Register {
    pub const fn offset(self) -> usize {
        self as usize
    }
}

bitflags! {
    /// Bits of [`Register::Control`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Control: u32 {
        /// Counter and time stamping enabled
        const ENABLE = 1 << 0;
        /// Fine update: the accumulator drives the counter
        const FINE_UPDATE = 1 << 1;
        /// Strobe: load the staged time as the absolute time
        const INITIALIZE = 1 << 2;
        /// Strobe: add or subtract the staged time
        const UPDATE = 1 << 3;
        /// Raise an interrupt when the counter reaches the target
        const TARGET_INTERRUPT = 1 << 4;
        /// Strobe: latch the addend register into the accumulator
        const ADDEND_UPDATE = 1 << 5;
        /// Nanoseconds roll over at 10^9 instead of 2^31
        const DIGITAL_ROLLOVER = 1 << 9;

        /// Strobes that stay set while a staged update is in flight
        const PENDING = Self::INITIALIZE.bits() | Self::UPDATE.bits() | Self::ADDEND_UPDATE.bits();
    }
}

bitflags! {
    /// Bits of [`Register::Status`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Status: u32 {
        /// The seconds counter wrapped
        const SECONDS_OVERFLOW = 1 << 0;
        /// The counter reached the comparator target
        const TARGET_REACHED = 1 << 1;
    }
}

/// Set in [`Register::NanosecondsUpdate`] to subtract the staged time
pub const UPDATE_SUBTRACT: u32 = 1 << 31;

/// Mask of the value part of the nanoseconds registers
pub const NANOSECONDS_MASK: u32 = !UPDATE_SUBTRACT;

/// Mask of [`Register::PpsControl`] holding the log2 output frequency
pub const PPS_FREQUENCY_MASK: u32 = 0xf;

/// Raw access to the time stamp unit.
///
/// All register reads and writes of the crate go through this trait, which
/// keeps MMIO in a single place and lets the hardware be replaced by
/// [`SimHardware`](crate::sim::SimHardware) in tests.
pub trait RegisterAccess {
    /// Whether the comparator also fires for a target that is already in the
    /// past when the interrupt gets enabled. When `false` the timer moves such
    /// targets slightly into the future instead.
    const LATCHES_PAST_TARGETS: bool = true;

    fn read(&mut self, register: Register) -> u32;

    fn write(&mut self, register: Register, value: u32);

    fn modify(&mut self, register: Register, f: impl FnOnce(u32) -> u32) {
        let value = self.read(register);
        self.write(register, f(value));
    }
}

/// Memory mapped time stamp unit
#[derive(Debug)]
pub struct Mmio {
    base: NonNull<u32>,
}

impl Mmio {
    /// Access the time stamp unit at `base`.
    ///
    /// # Safety
    ///
    /// `base` must point at the time stamp unit registers, and no other code
    /// may access those registers while this value exists.
    pub const unsafe fn new(base: NonNull<u32>) -> Self {
        Self { base }
    }

    fn pointer(&self, register: Register) -> *mut u32 {
        // Offsets are multiples of 4 and within the register block
        unsafe {
            self.base
                .as_ptr()
                .cast::<u8>()
                .add(register.offset())
                .cast::<u32>()
        }
    }
}

// The registers are not tied to the thread that created the handle
unsafe impl Send for Mmio {}

impl RegisterAccess for Mmio {
    fn read(&mut self, register: Register) -> u32 {
        unsafe { core::ptr::read_volatile(self.pointer(register)) }
    }

    fn write(&mut self, register: Register, value: u32) {
        unsafe { core::ptr::write_volatile(self.pointer(register), value) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_covers_all_strobes() {
        assert!(Control::PENDING.contains(Control::INITIALIZE));
        assert!(Control::PENDING.contains(Control::UPDATE));
        assert!(Control::PENDING.contains(Control::ADDEND_UPDATE));
        assert!(!Control::PENDING.intersects(Control::ENABLE | Control::TARGET_INTERRUPT));
    }

    #[test]
    fn mmio_uses_register_offsets() {
        let mut block = [0u32; 12];
        let base = NonNull::new(block.as_mut_ptr()).unwrap();
        let mut mmio = unsafe { Mmio::new(base) };

        mmio.write(Register::Addend, 0xdead_beef);
        mmio.modify(Register::Control, |v| v | Control::ENABLE.bits());
        assert_eq!(mmio.read(Register::Addend), 0xdead_beef);
        drop(mmio);

        assert_eq!(block[Register::Addend.offset() / 4], 0xdead_beef);
        assert_eq!(block[0], Control::ENABLE.bits());
    }
}
