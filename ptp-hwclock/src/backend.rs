//! The hardware clock as backend of a generic timer scheduler

use crate::{
    clock::{Ptp, PtpClock},
    regs::RegisterAccess,
    timer::PtpTimer,
};

/// What a multi-timer scheduler needs from the clock it runs on.
///
/// Times are nanoseconds since the epoch. Expiry of the armed deadline is
/// reported out of band, through the notification the backend was created
/// with, from interrupt context.
pub trait ClockBackend {
    fn now(&self) -> u64;

    /// Arm the single deadline, replacing any earlier one
    fn arm(&self, deadline: u64);

    fn cancel(&self);
}

/// [`ClockBackend`] on top of the time stamp unit
pub struct PtpBackend<'a, R, N> {
    ptp: &'a Ptp<R>,
    notify: N,
}

impl<'a, R, N> PtpBackend<'a, R, N>
where
    R: RegisterAccess,
    N: Fn(),
{
    /// `notify` is called from interrupt context whenever the armed deadline
    /// expires
    pub fn new(ptp: &'a Ptp<R>, notify: N) -> Self {
        Self { ptp, notify }
    }

    pub fn ptp(&self) -> &'a Ptp<R> {
        self.ptp
    }

    /// Forward the time stamp unit interrupt, see [`Ptp::on_interrupt`]
    pub fn on_interrupt(&self) -> bool {
        self.ptp.on_interrupt(|| (self.notify)())
    }
}

impl<R, N> ClockBackend for PtpBackend<'_, R, N>
where
    R: RegisterAccess,
    N: Fn(),
{
    fn now(&self) -> u64 {
        self.ptp.read_ns()
    }

    fn arm(&self, deadline: u64) {
        self.ptp.set_absolute_ns(deadline)
    }

    fn cancel(&self) {
        PtpTimer::cancel(self.ptp)
    }
}

impl<R: RegisterAccess, N> core::fmt::Debug for PtpBackend<'_, R, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PtpBackend")
            .field("ptp", self.ptp)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use core::cell::{Cell, RefCell};

    use super::*;
    use crate::{config::ClockConfig, sim::SimHardware};

    const BUS_CLOCK_HZ: u32 = 100_000_000;

    /// Minimal scheduler keeping a few deadlines sorted on one backend
    struct Scheduler<'b, B> {
        backend: &'b B,
        deadlines: RefCell<Vec<u64>>,
    }

    impl<'b, B: ClockBackend> Scheduler<'b, B> {
        fn add(&self, deadline: u64) {
            let mut deadlines = self.deadlines.borrow_mut();
            deadlines.push(deadline);
            deadlines.sort_unstable();
            self.backend.arm(deadlines[0]);
        }

        fn expired(&self) -> Vec<u64> {
            let now = self.backend.now();
            let mut deadlines = self.deadlines.borrow_mut();
            let split = deadlines.partition_point(|&d| d <= now);
            let expired = deadlines.drain(..split).collect();
            match deadlines.first() {
                Some(&next) => self.backend.arm(next),
                None => self.backend.cancel(),
            }
            expired
        }
    }

    #[test]
    fn scheduler_multiplexes_single_deadline() {
        let sim = SimHardware::new(BUS_CLOCK_HZ);
        let ptp = Ptp::new(&sim, ClockConfig::new(20, BUS_CLOCK_HZ)).unwrap();
        let notified = Cell::new(0);
        let backend = PtpBackend::new(&ptp, || notified.set(notified.get() + 1));

        let scheduler = Scheduler {
            backend: &backend,
            deadlines: RefCell::new(Vec::new()),
        };
        let start = backend.now();
        scheduler.add(start + 3_000_000);
        scheduler.add(start + 1_000_000);
        scheduler.add(start + 2_000_000);
        assert_eq!(ptp.deadline().unwrap().to_nanos(), start + 1_000_000);

        let mut fired = Vec::new();
        while sim.advance_until_interrupt(10_000_000).is_some() {
            sim.take_interrupt();
            if backend.on_interrupt() {
                fired.extend(scheduler.expired());
            }
        }

        assert_eq!(notified.get(), 3);
        assert_eq!(
            fired,
            [start + 1_000_000, start + 2_000_000, start + 3_000_000]
        );
        assert_eq!(ptp.deadline(), None);
    }

    #[test]
    fn cancel_stops_notifications() {
        let sim = SimHardware::new(BUS_CLOCK_HZ);
        let ptp = Ptp::new(&sim, ClockConfig::new(20, BUS_CLOCK_HZ)).unwrap();
        let backend = PtpBackend::new(&ptp, || panic!("canceled deadline fired"));

        backend.arm(backend.now() + 500_000);
        backend.cancel();
        assert_eq!(sim.advance_until_interrupt(5_000_000), None);
        assert!(!backend.on_interrupt());
    }

    #[test]
    fn arm_never() {
        let sim = SimHardware::new(BUS_CLOCK_HZ);
        let ptp = Ptp::new(&sim, ClockConfig::new(20, BUS_CLOCK_HZ)).unwrap();
        ptp.set_ns(1_700_000_000_000_000_000).unwrap();
        let backend = PtpBackend::new(&ptp, || panic!("unreachable deadline fired"));

        backend.arm(u64::MAX);
        assert_eq!(ptp.deadline(), Some(crate::time::Timestamp::MAX));
        assert_eq!(sim.advance_until_interrupt(5_000_000), None);
        assert!(!backend.on_interrupt());
    }
}
