//! Register level driver of the time stamp unit

use crate::{
    config::ClockConfig,
    error::{Error, Result},
    regs::{
        Control, Register, RegisterAccess, Status, NANOSECONDS_MASK, PPS_FREQUENCY_MASK,
        UPDATE_SUBTRACT,
    },
    time::{Timestamp, NS_PER_SEC},
};

/// Whether the hardware is still applying a staged update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UpdateState {
    Idle,
    UpdatePending,
}

/// Makes the free running counter of the time stamp unit behave like a
/// correctable nanosecond clock.
///
/// None of the operations are atomic across all registers they touch. The
/// driver is normally used through [`Ptp`](crate::Ptp), which serializes
/// access with critical sections.
#[derive(Debug)]
pub struct PtpDriver<R> {
    regs: R,
    config: ClockConfig,
    deadline: Option<Timestamp>,
}

impl<R: RegisterAccess> PtpDriver<R> {
    /// Take ownership of the registers and initialize the clock to zero,
    /// running at nominal speed.
    pub fn new(regs: R, config: ClockConfig) -> Result<Self> {
        let mut driver = Self {
            regs,
            config,
            deadline: None,
        };
        driver.init()?;
        Ok(driver)
    }

    fn init(&mut self) -> Result<()> {
        self.regs.write(Register::SubsecondIncrement, self.config.resolution_ns());
        self.regs.write(
            Register::Control,
            (Control::ENABLE | Control::FINE_UPDATE | Control::DIGITAL_ROLLOVER).bits(),
        );

        self.adjust_speed(0)?;
        self.set(Timestamp::ZERO)?;

        log::debug!(
            "PTP clock initialized: {} ns per tick, nominal addend {:#010x}",
            self.config.resolution_ns(),
            self.config.nominal_addend()
        );

        Ok(())
    }

    pub fn config(&self) -> &ClockConfig {
        &self.config
    }

    /// Give the registers back, leaving the counter running
    pub fn release(self) -> R {
        self.regs
    }

    fn control(&mut self) -> Control {
        Control::from_bits_retain(self.regs.read(Register::Control))
    }

    /// Whether a staged update is still being applied by the hardware
    pub fn update_state(&mut self) -> UpdateState {
        if self.control().intersects(Control::PENDING) {
            UpdateState::UpdatePending
        } else {
            UpdateState::Idle
        }
    }

    /// Wait until no staged update is in flight.
    ///
    /// Gives up after the configured amount of polls, since a pending bit that
    /// never clears would otherwise hang the caller forever.
    fn wait_idle(&mut self) -> Result<()> {
        for _ in 0..self.config.spin_limit() {
            if self.update_state() == UpdateState::Idle {
                return Ok(());
            }
            core::hint::spin_loop();
        }

        log::error!(
            "Staged clock update still pending after {} polls",
            self.config.spin_limit()
        );
        Err(Error::UpdateTimeout)
    }

    fn strobe(&mut self, bits: Control) {
        self.regs.modify(Register::Control, |value| value | bits.bits());
    }

    /// Change the clock speed relative to nominal.
    ///
    /// `correction` is a fraction of the nominal rate in units of 2^-32, the
    /// usable range is roughly ±50%. Every call starts again from nominal, so
    /// repeating a correction does not accumulate. The new rate is in effect
    /// from the next tick on.
    pub fn adjust_speed(&mut self, correction: i32) -> Result<()> {
        let addend = self.config.addend_for(correction);

        self.wait_idle()?;
        self.regs.write(Register::Addend, addend);
        self.strobe(Control::ADDEND_UPDATE);

        log::trace!("Clock speed correction {}, addend {:#010x}", correction, addend);
        Ok(())
    }

    /// Set the clock to an absolute time.
    ///
    /// # Panics
    ///
    /// Panics if the nanoseconds of `time` are not below 10^9.
    pub fn set(&mut self, time: Timestamp) -> Result<()> {
        assert!(time.is_valid(), "nanoseconds out of range: {}", time.nanoseconds);

        self.wait_idle()?;
        self.regs.write(Register::SecondsUpdate, time.seconds);
        self.regs.write(Register::NanosecondsUpdate, time.nanoseconds);
        self.strobe(Control::INITIALIZE);

        log::trace!("Clock set to {}", time);
        Ok(())
    }

    /// Shift the clock by a signed amount of nanoseconds
    ///
    /// # Panics
    ///
    /// Panics if the offset does not fit the 32 bit seconds field, about 136
    /// years.
    pub fn adjust(&mut self, offset: i64) -> Result<()> {
        let magnitude = offset.unsigned_abs();
        let seconds = magnitude / NS_PER_SEC as u64;
        let nanoseconds = (magnitude % NS_PER_SEC as u64) as u32;
        assert!(
            seconds <= u32::MAX as u64,
            "offset exceeds the seconds field: {} ns",
            offset
        );

        let sign = if offset < 0 { UPDATE_SUBTRACT } else { 0 };

        self.wait_idle()?;
        self.regs.write(Register::SecondsUpdate, seconds as u32);
        self.regs.write(Register::NanosecondsUpdate, nanoseconds | sign);
        self.strobe(Control::UPDATE);

        log::trace!("Clock adjusted by {} ns", offset);
        Ok(())
    }

    /// Read the current time.
    ///
    /// Seconds are read before and after the nanoseconds, and the read is
    /// retried if they differ, so a nanosecond rollover between the two
    /// register reads can not produce a torn value.
    pub fn read(&mut self) -> Timestamp {
        loop {
            let seconds = self.regs.read(Register::Seconds);
            let nanoseconds = self.regs.read(Register::Nanoseconds) & NANOSECONDS_MASK;
            if self.regs.read(Register::Seconds) == seconds {
                return Timestamp {
                    seconds,
                    nanoseconds,
                };
            }
        }
    }

    /// The accumulator increment currently programmed
    pub fn addend(&mut self) -> u32 {
        self.regs.read(Register::Addend)
    }

    /// Output `2^log2_hz` pulses per second on the PPS pin, 0 gives 1 PPS
    pub fn set_pps_frequency(&mut self, log2_hz: u8) {
        let log2_hz = (log2_hz as u32).min(PPS_FREQUENCY_MASK);
        self.regs.modify(Register::PpsControl, |value| {
            (value & !PPS_FREQUENCY_MASK) | log2_hz
        });
    }

    /// The deadline the comparator is armed for
    pub fn deadline(&self) -> Option<Timestamp> {
        self.deadline
    }

    /// Program the comparator, replacing any earlier target.
    ///
    /// The interrupt is disabled and a stale match is cleared before the new
    /// target is written, so the old deadline can not fire anymore.
    pub fn arm_target(&mut self, target: Timestamp) {
        assert!(target.is_valid(), "nanoseconds out of range: {}", target.nanoseconds);

        let target = if R::LATCHES_PAST_TARGETS {
            target
        } else {
            self.earliest_reachable(target)
        };

        self.disarm_target();
        self.regs.read(Register::Status);
        self.regs.write(Register::TargetSeconds, target.seconds);
        self.regs.write(Register::TargetNanoseconds, target.nanoseconds);
        self.regs.modify(Register::Control, |value| {
            value | Control::TARGET_INTERRUPT.bits()
        });
        self.deadline = Some(target);
    }

    /// For comparators that only fire when the counter crosses the target,
    /// move targets that are (nearly) due a few ticks into the future.
    fn earliest_reachable(&mut self, target: Timestamp) -> Timestamp {
        const LEAD_TICKS: u32 = 16;

        let earliest = self
            .read()
            .add_nanos((LEAD_TICKS * self.config.resolution_ns()) as i64);
        if target < earliest {
            log::trace!("Target {} already due, firing at {}", target, earliest);
            earliest
        } else {
            target
        }
    }

    /// Disable the comparator interrupt. The counter keeps running.
    pub fn disarm_target(&mut self) {
        self.regs.modify(Register::Control, |value| {
            value & !Control::TARGET_INTERRUPT.bits()
        });
        self.deadline = None;
    }

    /// Read and clear the comparator status, returning whether the target was
    /// reached since the last call.
    pub fn take_target_reached(&mut self) -> bool {
        let status = Status::from_bits_retain(self.regs.read(Register::Status));
        if status.contains(Status::TARGET_REACHED) {
            self.deadline = None;
            true
        } else {
            false
        }
    }
}
