//! Clock capability layer and the hardware clock context

use core::cell::RefCell;

use critical_section::Mutex;

use crate::{
    config::ClockConfig,
    driver::{PtpDriver, UpdateState},
    error::Result,
    regs::RegisterAccess,
    time::Timestamp,
};

mod frequency;

pub use frequency::{correction_from_multiplier, correction_from_ppb, ppb_from_correction};

/// Adjustable clock, usable both with [`Timestamp`]s and with nanosecond
/// counts since the epoch.
///
/// An implementation provides whichever of [`read`](PtpClock::read) and
/// [`read_ns`](PtpClock::read_ns) (and of [`set`](PtpClock::set) and
/// [`set_ns`](PtpClock::set_ns)) is natural for it; the other one is derived
/// through the conversions of [`Timestamp`]. Implementing neither of a pair
/// makes the defaults call each other forever.
pub trait PtpClock {
    /// Get the current time
    fn read(&self) -> Timestamp {
        Timestamp::from_nanos(self.read_ns())
    }

    /// Get the current time in nanoseconds since the epoch
    fn read_ns(&self) -> u64 {
        self.read().to_nanos()
    }

    /// Set the clock to an absolute time
    ///
    /// # Panics
    ///
    /// Panics if the nanoseconds of `time` are not below 10^9.
    fn set(&self, time: Timestamp) -> Result<()> {
        assert!(time.is_valid(), "nanoseconds out of range: {}", time.nanoseconds);
        self.set_ns(time.to_nanos())
    }

    /// Set the clock to an absolute time in nanoseconds since the epoch
    ///
    /// # Panics
    ///
    /// Panics if `nanos` lies beyond [`Timestamp::MAX`].
    fn set_ns(&self, nanos: u64) -> Result<()> {
        assert!(
            nanos <= Timestamp::MAX.to_nanos(),
            "time beyond the seconds range: {} ns",
            nanos
        );
        self.set(Timestamp::from_nanos(nanos))
    }

    /// Shift the clock by a signed amount of nanoseconds.
    ///
    /// The default reads and sets the clock within one critical section, so
    /// no interrupt can delay the write after the time was measured.
    fn adjust(&self, offset: i64) -> Result<()> {
        critical_section::with(|_| {
            let now = self.read();
            self.set(now.add_nanos(offset))
        })
    }

    /// Run the clock at `1 + correction / 2^32` times its nominal speed.
    ///
    /// Corrections are always relative to the nominal speed, so repeating a
    /// correction has no further effect.
    fn adjust_speed(&self, correction: i32) -> Result<()>;
}

/// The time stamp unit of the board, shared between thread mode and its
/// interrupt handler.
///
/// There is one of these per peripheral. Construct it where the peripheral
/// is brought up and hand out references, for example by putting it in a
/// `static` cell.
pub struct Ptp<R> {
    inner: Mutex<RefCell<PtpDriver<R>>>,
}

impl<R: RegisterAccess> Ptp<R> {
    /// Initialize the time stamp unit: counter at zero, running at nominal
    /// speed, no deadline armed.
    pub fn new(regs: R, config: ClockConfig) -> Result<Self> {
        let driver = PtpDriver::new(regs, config)?;

        Ok(Self {
            inner: Mutex::new(RefCell::new(driver)),
        })
    }

    /// Run `f` on the register driver inside a critical section
    pub fn access<T>(&self, f: impl FnOnce(&mut PtpDriver<R>) -> T) -> T {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }

    pub fn config(&self) -> ClockConfig {
        self.access(|driver| *driver.config())
    }

    pub fn update_state(&self) -> UpdateState {
        self.access(|driver| driver.update_state())
    }

    /// Run the clock at `multiplier` times its nominal speed
    pub fn adjust_frequency(&self, multiplier: f64) -> Result<()> {
        let correction = correction_from_multiplier(multiplier);
        log::debug!(
            "Frequency multiplier {}, speed correction {}",
            multiplier,
            correction
        );
        self.adjust_speed(correction)
    }

    /// Output `2^log2_hz` pulses per second, 0 gives 1 PPS
    pub fn set_pps_frequency(&self, log2_hz: u8) {
        self.access(|driver| driver.set_pps_frequency(log2_hz))
    }

    /// Give the registers back, leaving the counter running
    pub fn release(self) -> R {
        self.inner.into_inner().into_inner().release()
    }
}

impl<R: RegisterAccess> PtpClock for Ptp<R> {
    fn read(&self) -> Timestamp {
        self.access(|driver| driver.read())
    }

    fn set(&self, time: Timestamp) -> Result<()> {
        self.access(|driver| driver.set(time))
    }

    /// Shifts the clock with the hardware's relative update, which leaves no
    /// window between measuring and correcting the time at all.
    fn adjust(&self, offset: i64) -> Result<()> {
        self.access(|driver| driver.adjust(offset))
    }

    fn adjust_speed(&self, correction: i32) -> Result<()> {
        self.access(|driver| driver.adjust_speed(correction))
    }
}

impl<R: RegisterAccess> core::fmt::Debug for Ptp<R> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut debug = f.debug_struct("Ptp");
        critical_section::with(|cs| match self.inner.borrow(cs).try_borrow() {
            Ok(driver) => debug.field("config", driver.config()),
            // Formatted from within `access`
            Err(_) => debug.field("config", &format_args!("<in use>")),
        });
        debug.finish()
    }
}
