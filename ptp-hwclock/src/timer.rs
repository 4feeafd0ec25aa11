//! Single deadline timer on the comparator of the time stamp unit

use crate::{
    clock::{Ptp, PtpClock},
    regs::RegisterAccess,
    time::Timestamp,
};

/// Oneshot timer with exactly one outstanding deadline.
///
/// Arming replaces the previous deadline, it never adds a second one.
/// Multiplexing many timers on top of this is left to a scheduler using
/// [`ClockBackend`](crate::ClockBackend).
pub trait PtpTimer {
    /// Fire when the clock reaches `target`. A target in the past fires right
    /// away.
    fn set_absolute(&self, target: Timestamp);

    /// Like [`set_absolute`](PtpTimer::set_absolute). Targets beyond
    /// [`Timestamp::MAX`], such as `u64::MAX` for "never", are clamped to it.
    fn set_absolute_ns(&self, target: u64) {
        self.set_absolute(Timestamp::from_nanos_saturating(target))
    }

    /// Fire `delay` nanoseconds from now
    fn set(&self, delay: u64);

    /// Disarm the timer.
    ///
    /// An expiry that was already latched by the hardware may still be
    /// delivered once after this returns.
    fn cancel(&self);
}

impl<R: RegisterAccess> PtpTimer for Ptp<R> {
    fn set_absolute(&self, target: Timestamp) {
        log::trace!("Arming timer for {}", target);
        self.access(|driver| driver.arm_target(target));
    }

    /// Reading the clock and arming happen in a single critical section, so
    /// the jitter added to `delay` does not depend on interrupt load.
    fn set(&self, delay: u64) {
        self.access(|driver| {
            let now = driver.read().to_nanos();
            let target = Timestamp::from_nanos_saturating(now.saturating_add(delay));
            log::trace!("Arming timer in {} ns, at {}", delay, target);
            driver.arm_target(target);
        });
    }

    fn cancel(&self) {
        self.access(|driver| driver.disarm_target());
    }
}

impl<R: RegisterAccess> Ptp<R> {
    /// Handle the time stamp unit interrupt.
    ///
    /// Call this from the interrupt handler of the peripheral. When the armed
    /// deadline was reached, `on_expiry` runs once, still in interrupt
    /// context, and `true` is returned. The driver is not locked while
    /// `on_expiry` runs, so it may read the clock or re-arm the timer.
    pub fn on_interrupt(&self, on_expiry: impl FnOnce()) -> bool {
        let expired = self.access(|driver| driver.take_target_reached());
        if expired {
            on_expiry();
        }
        expired
    }

    /// The deadline currently armed, if any
    pub fn deadline(&self) -> Option<Timestamp> {
        self.access(|driver| driver.deadline())
    }

    /// Nanoseconds until the armed deadline, zero if it is already due
    pub fn time_to_deadline(&self) -> Option<u64> {
        let deadline = self.deadline()?;
        Some(deadline.to_nanos().saturating_sub(self.read_ns()))
    }
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;

    use super::*;
    use crate::{config::ClockConfig, sim::SimHardware};

    const BUS_CLOCK_HZ: u32 = 100_000_000;
    const CONFIG: ClockConfig = ClockConfig::new(20, BUS_CLOCK_HZ);

    #[test]
    fn relative_deadline() {
        let sim = SimHardware::new(BUS_CLOCK_HZ);
        let ptp = Ptp::new(&sim, CONFIG).unwrap();
        PtpClock::set(&ptp, Timestamp::new(100, 0)).unwrap();

        PtpTimer::set(&ptp, 5_000);
        let deadline = ptp.deadline().unwrap();
        assert!(deadline > Timestamp::new(100, 5_000));
        assert!(deadline < Timestamp::new(100, 6_000));
        assert!(ptp.time_to_deadline().unwrap() <= 5_000);

        let fired = Cell::new(None);
        sim.advance_until_interrupt(1_000_000).unwrap();
        assert!(ptp.on_interrupt(|| fired.set(Some(ptp.read()))));

        let fired = fired.get().unwrap();
        assert!(fired >= deadline);
        assert!(fired.nanos_since(deadline) < 200);
        assert_eq!(ptp.deadline(), None);
    }

    #[test]
    fn spurious_interrupt_is_ignored() {
        let sim = SimHardware::new(BUS_CLOCK_HZ);
        let ptp = Ptp::new(&sim, CONFIG).unwrap();

        assert!(!ptp.on_interrupt(|| panic!("no deadline was armed")));
    }

    #[test]
    fn past_deadline_on_crossing_comparator() {
        let sim = SimHardware::non_latching(BUS_CLOCK_HZ);
        let ptp = Ptp::new(&sim, CONFIG).unwrap();
        PtpClock::set(&ptp, Timestamp::new(50, 0)).unwrap();

        ptp.set_absolute(Timestamp::new(49, 0));
        let deadline = ptp.deadline().unwrap();
        assert!(deadline > Timestamp::new(50, 0));

        let waited = sim.advance_until_interrupt(1_000_000).unwrap();
        assert!(waited < 1_000);
        assert!(ptp.on_interrupt(|| {}));
    }

    #[test]
    fn rearm_from_callback() {
        let sim = SimHardware::new(BUS_CLOCK_HZ);
        let ptp = Ptp::new(&sim, CONFIG).unwrap();

        let count = Cell::new(0);
        ptp.set_absolute_ns(ptp.read_ns() + 1_000_000);
        for _ in 0..3 {
            sim.advance_until_interrupt(10_000_000).unwrap();
            sim.take_interrupt();
            ptp.on_interrupt(|| {
                count.set(count.get() + 1);
                PtpTimer::set(&ptp, 1_000_000);
            });
        }

        assert_eq!(count.get(), 3);
        assert!(ptp.deadline().is_some());
    }

    #[test]
    fn far_future_deadlines_are_clamped() {
        let sim = SimHardware::new(BUS_CLOCK_HZ);
        let ptp = Ptp::new(&sim, CONFIG).unwrap();
        PtpClock::set(&ptp, Timestamp::new(1_700_000_000, 0)).unwrap();

        ptp.set_absolute_ns(u64::MAX);
        assert_eq!(ptp.deadline(), Some(Timestamp::MAX));
        assert_eq!(sim.advance_until_interrupt(10_000_000), None);

        PtpTimer::set(&ptp, u64::MAX);
        assert_eq!(ptp.deadline(), Some(Timestamp::MAX));
        assert_eq!(sim.advance_until_interrupt(10_000_000), None);
        assert!(!ptp.on_interrupt(|| panic!("deadline at the end of time fired")));
    }
}
