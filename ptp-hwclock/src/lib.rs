//! Driver for the IEEE 1588 time stamp unit of Ethernet MACs such as the one
//! found in STM32 microcontrollers.
//!
//! The time stamp unit is a free running seconds and nanoseconds counter,
//! driven by an accumulator that can be trimmed in steps of 2^-32 of its
//! nominal rate. This crate turns it into:
//!
//! - a clock that can be read, set, shifted by an offset and slowed down or
//!   sped up ([`PtpClock`]),
//! - a timer with a single deadline on the comparator of the same counter
//!   ([`PtpTimer`]),
//! - a backend for schedulers that multiplex many timers on one hardware
//!   deadline ([`ClockBackend`]).
//!
//! Everything goes through one context object, [`Ptp`], which owns the
//! registers. Board support code constructs it once and shares a reference
//! with the interrupt handler of the peripheral:
//!
//! ```no_run
//! use ptp_hwclock::{ClockConfig, Mmio, Ptp, PtpClock, PtpTimer};
//!
//! const CONFIG: ClockConfig = ClockConfig::for_bus_clock(216_000_000);
//!
//! # fn main() -> ptp_hwclock::Result<()> {
//! // Safety: the Ethernet PTP register block of the MAC lives at this address
//! let regs = unsafe { Mmio::new(core::ptr::NonNull::new(0x4002_8700 as *mut u32).unwrap()) };
//! let ptp = Ptp::new(regs, CONFIG)?;
//!
//! ptp.set_ns(1_700_000_000_000_000_000)?;
//! ptp.adjust(-1_337)?;
//! ptp.adjust_speed(ptp_hwclock::correction_from_ppb(250))?;
//! PtpTimer::set(&ptp, 10_000_000);
//! # Ok(())
//! # }
//! ```
//!
//! For host side testing, [`SimHardware`] provides a cycle accurate software
//! model of the registers.
#![cfg_attr(all(not(test), not(feature = "std")), no_std)]

mod backend;
mod clock;
mod config;
mod driver;
mod error;
pub mod regs;
pub mod sim;
mod time;
mod timer;

pub use backend::{ClockBackend, PtpBackend};
pub use clock::{
    correction_from_multiplier, correction_from_ppb, ppb_from_correction, Ptp, PtpClock,
};
pub use config::{
    default_resolution_ns, nominal_addend, resolution_fits, ClockConfig, DEFAULT_SPIN_LIMIT,
    MAX_RESOLUTION_NS,
};
pub use driver::{PtpDriver, UpdateState};
pub use error::{Error, Result};
pub use regs::{Mmio, RegisterAccess};
pub use sim::SimHardware;
pub use time::{Timestamp, NS_PER_SEC};
pub use timer::PtpTimer;
