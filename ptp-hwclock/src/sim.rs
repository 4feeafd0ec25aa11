//! Software model of the time stamp unit
//!
//! [`SimHardware`] behaves like the registers described in [`regs`](crate::regs)
//! and is driven by simulated bus clock cycles instead of real time. Every
//! register access costs a configurable amount of cycles, so busy waits make
//! progress and reads race the counter the same way they do on silicon.
//!
//! The model is exact: advancing by any amount of cycles gives the same result
//! as advancing cycle by cycle, and comparator matches are found at the exact
//! cycle they occur on.

use core::cell::RefCell;

use crate::{
    regs::{Control, Register, RegisterAccess, Status, NANOSECONDS_MASK, UPDATE_SUBTRACT},
    time::{Timestamp, NS_PER_SEC},
};

const DEFAULT_ACCESS_CYCLES: u64 = 1;

#[derive(Debug, Default)]
struct SimState {
    bus_clock_hz: u32,
    access_cycles: u64,
    stuck: bool,
    cycles: u64,

    control: u32,
    subsecond_increment: u32,
    seconds: u32,
    nanoseconds: u32,
    accumulator: u32,
    addend_register: u32,
    addend_active: u32,
    seconds_update: u32,
    nanoseconds_update: u32,
    target_seconds: u32,
    target_nanoseconds: u32,
    status: u32,
    pps_control: u32,

    interrupt_pending: bool,
}

impl SimState {
    fn control(&self) -> Control {
        Control::from_bits_retain(self.control)
    }

    fn now(&self) -> Timestamp {
        Timestamp {
            seconds: self.seconds,
            nanoseconds: self.nanoseconds,
        }
    }

    fn target(&self) -> Timestamp {
        Timestamp {
            seconds: self.target_seconds,
            nanoseconds: self.target_nanoseconds,
        }
    }

    fn set_now(&mut self, time: Timestamp) {
        self.seconds = time.seconds;
        self.nanoseconds = time.nanoseconds;
    }

    /// Complete staged updates, which happens on the first cycle after the
    /// strobe unless the model is stuck
    fn apply_pending(&mut self) {
        let pending = self.control() & Control::PENDING;
        if self.stuck || pending.is_empty() {
            return;
        }

        if pending.contains(Control::INITIALIZE) {
            self.set_now(Timestamp {
                seconds: self.seconds_update,
                nanoseconds: (self.nanoseconds_update & NANOSECONDS_MASK) % NS_PER_SEC,
            });
        }

        if pending.contains(Control::UPDATE) {
            let magnitude = self.seconds_update as i64 * NS_PER_SEC as i64
                + (self.nanoseconds_update & NANOSECONDS_MASK) as i64;
            let offset = if self.nanoseconds_update & UPDATE_SUBTRACT != 0 {
                -magnitude
            } else {
                magnitude
            };
            self.set_now(self.now().add_nanos(offset));
        }

        if pending.contains(Control::ADDEND_UPDATE) {
            self.addend_active = self.addend_register;
        }

        self.control &= !Control::PENDING.bits();
    }

    /// Amount of ticks the counter makes in the next `cycles` bus cycles
    fn ticks_in(&self, cycles: u64) -> u128 {
        let control = self.control();
        if !control.contains(Control::ENABLE) {
            0
        } else if control.contains(Control::FINE_UPDATE) {
            (self.accumulator as u128 + cycles as u128 * self.addend_active as u128) >> 32
        } else {
            cycles as u128
        }
    }

    /// Bus cycles until the counter has made `ticks` more ticks
    fn cycles_for_ticks(&self, ticks: u128) -> Option<u64> {
        let control = self.control();
        if !control.contains(Control::ENABLE) {
            None
        } else if control.contains(Control::FINE_UPDATE) {
            if self.addend_active == 0 {
                return None;
            }
            let needed = (ticks << 32) - self.accumulator as u128;
            let addend = self.addend_active as u128;
            Some(u64::try_from((needed + addend - 1) / addend).unwrap_or(u64::MAX))
        } else {
            Some(u64::try_from(ticks).unwrap_or(u64::MAX))
        }
    }

    fn step(&mut self, cycles: u64) {
        let ticks = self.ticks_in(cycles);

        let control = self.control();
        if control.contains(Control::ENABLE) && control.contains(Control::FINE_UPDATE) {
            let total = self.accumulator as u128 + cycles as u128 * self.addend_active as u128;
            self.accumulator = total as u32;
        }

        let nanos = self.nanoseconds as u128 + ticks * self.subsecond_increment as u128;
        let carry = nanos / NS_PER_SEC as u128;
        let (seconds, overflow) = self.seconds.overflowing_add(carry as u32);
        if overflow || carry > u32::MAX as u128 {
            self.status |= Status::SECONDS_OVERFLOW.bits();
        }
        self.seconds = seconds;
        self.nanoseconds = (nanos % NS_PER_SEC as u128) as u32;
        self.cycles += cycles;
    }

    /// Bus cycles until the comparator raises its interrupt, if it will
    fn cycles_until_match(&self, latching: bool) -> Option<u64> {
        if !self.control().contains(Control::TARGET_INTERRUPT) {
            return None;
        }

        let now = self.now().to_nanos();
        let target = self.target().to_nanos();
        if now >= target {
            return latching.then_some(0);
        }

        if self.subsecond_increment == 0 {
            return None;
        }
        let increment = self.subsecond_increment as u64;
        let ticks = (target - now + increment - 1) / increment;
        self.cycles_for_ticks(ticks as u128)
    }

    fn latch_target(&mut self) {
        self.status |= Status::TARGET_REACHED.bits();
        self.control &= !Control::TARGET_INTERRUPT.bits();
        self.interrupt_pending = true;
    }

    /// Run the model for `cycles` bus cycles, optionally stopping right at a
    /// comparator match. Returns the amount of cycles that passed.
    fn advance(&mut self, cycles: u64, latching: bool, stop_on_interrupt: bool) -> u64 {
        if cycles == 0 {
            return 0;
        }
        self.apply_pending();

        let mut remaining = cycles;
        loop {
            if stop_on_interrupt && self.interrupt_pending {
                return cycles - remaining;
            }

            match self.cycles_until_match(latching) {
                Some(until) if until <= remaining => {
                    self.step(until);
                    remaining -= until;
                    self.latch_target();
                }
                _ => {
                    self.step(remaining);
                    return cycles;
                }
            }
        }
    }

    fn cycles_from_ns(&self, nanos: u64) -> u64 {
        (nanos as u128 * self.bus_clock_hz as u128 / NS_PER_SEC as u128) as u64
    }

    fn ns_from_cycles(&self, cycles: u64) -> u64 {
        (cycles as u128 * NS_PER_SEC as u128 / self.bus_clock_hz as u128) as u64
    }
}

/// Simulated time stamp unit.
///
/// `LATCHING` selects whether the comparator fires for targets that are
/// already in the past when its interrupt gets enabled, like the STM32 part
/// does, or only when the counter crosses the target.
///
/// Registers are accessed through `&SimHardware`, so a test can keep advancing
/// time while a [`Ptp`](crate::Ptp) owns the register handle.
#[derive(Debug)]
pub struct SimHardware<const LATCHING: bool = true> {
    state: RefCell<SimState>,
}

impl SimHardware {
    /// A powered-on but unconfigured unit whose accumulator runs at
    /// `bus_clock_hz`
    pub fn new(bus_clock_hz: u32) -> Self {
        Self::with_bus_clock(bus_clock_hz)
    }
}

impl SimHardware<false> {
    /// Like [`SimHardware::new`], with a comparator that only fires when the
    /// counter crosses its target
    pub fn non_latching(bus_clock_hz: u32) -> Self {
        Self::with_bus_clock(bus_clock_hz)
    }
}

impl<const LATCHING: bool> SimHardware<LATCHING> {
    fn with_bus_clock(bus_clock_hz: u32) -> Self {
        assert!(bus_clock_hz > 0, "bus clock must be running");
        Self {
            state: RefCell::new(SimState {
                bus_clock_hz,
                access_cycles: DEFAULT_ACCESS_CYCLES,
                ..Default::default()
            }),
        }
    }

    /// Bus cycles each register access takes
    pub fn with_access_cycles(self, cycles: u64) -> Self {
        self.state.borrow_mut().access_cycles = cycles;
        self
    }

    /// While stuck, staged updates never complete and their pending bits stay
    /// set
    pub fn set_stuck(&self, stuck: bool) {
        self.state.borrow_mut().stuck = stuck;
    }

    pub fn advance_cycles(&self, cycles: u64) {
        self.state.borrow_mut().advance(cycles, LATCHING, false);
    }

    /// Advance by an amount of reference time, measured in bus clock cycles
    pub fn advance_ns(&self, nanos: u64) {
        let mut state = self.state.borrow_mut();
        let cycles = state.cycles_from_ns(nanos);
        state.advance(cycles, LATCHING, false);
    }

    /// Advance until the comparator raises its interrupt, for at most
    /// `max_nanos` of reference time. Returns the reference time that passed
    /// if the interrupt was raised.
    pub fn advance_until_interrupt(&self, max_nanos: u64) -> Option<u64> {
        let mut state = self.state.borrow_mut();
        if state.interrupt_pending {
            return Some(0);
        }

        let cycles = state.cycles_from_ns(max_nanos);
        let passed = state.advance(cycles, LATCHING, true);
        state
            .interrupt_pending
            .then(|| state.ns_from_cycles(passed))
    }

    pub fn interrupt_pending(&self) -> bool {
        self.state.borrow().interrupt_pending
    }

    /// Acknowledge the interrupt line, returning whether it was raised
    pub fn take_interrupt(&self) -> bool {
        core::mem::take(&mut self.state.borrow_mut().interrupt_pending)
    }

    /// The counter value, without spending bus cycles
    pub fn now(&self) -> Timestamp {
        self.state.borrow().now()
    }

    pub fn elapsed_cycles(&self) -> u64 {
        self.state.borrow().cycles
    }

    /// Reference time since power on, derived from the bus clock
    pub fn elapsed_ns(&self) -> u64 {
        let state = self.state.borrow();
        state.ns_from_cycles(state.cycles)
    }

    /// The accumulator increment the counter is running with
    pub fn active_addend(&self) -> u32 {
        self.state.borrow().addend_active
    }

    pub fn subsecond_increment(&self) -> u32 {
        self.state.borrow().subsecond_increment
    }

    pub fn pps_frequency(&self) -> u32 {
        self.state.borrow().pps_control & crate::regs::PPS_FREQUENCY_MASK
    }
}

impl<const LATCHING: bool> RegisterAccess for &SimHardware<LATCHING> {
    const LATCHES_PAST_TARGETS: bool = LATCHING;

    fn read(&mut self, register: Register) -> u32 {
        let mut state = self.state.borrow_mut();
        let cycles = state.access_cycles;
        state.advance(cycles, LATCHING, false);

        match register {
            Register::Control => state.control,
            Register::SubsecondIncrement => state.subsecond_increment,
            Register::Seconds => state.seconds,
            Register::Nanoseconds => state.nanoseconds,
            Register::SecondsUpdate => state.seconds_update,
            Register::NanosecondsUpdate => state.nanoseconds_update,
            Register::Addend => state.addend_register,
            Register::TargetSeconds => state.target_seconds,
            Register::TargetNanoseconds => state.target_nanoseconds,
            Register::Status => core::mem::take(&mut state.status),
            Register::PpsControl => state.pps_control,
        }
    }

    fn write(&mut self, register: Register, value: u32) {
        let mut state = self.state.borrow_mut();
        let cycles = state.access_cycles;
        state.advance(cycles, LATCHING, false);

        match register {
            Register::Control => {
                // Strobes are only cleared by the hardware
                let pending = state.control & Control::PENDING.bits();
                state.control = value | pending;
            }
            Register::SubsecondIncrement => state.subsecond_increment = value & 0xff,
            Register::SecondsUpdate => state.seconds_update = value,
            Register::NanosecondsUpdate => state.nanoseconds_update = value,
            Register::Addend => state.addend_register = value,
            Register::TargetSeconds => state.target_seconds = value,
            Register::TargetNanoseconds => state.target_nanoseconds = value,
            Register::PpsControl => state.pps_control = value,
            // Read only
            Register::Seconds | Register::Nanoseconds | Register::Status => {}
        }
    }
}
