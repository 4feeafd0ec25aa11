use std::cell::Cell;

use ptp_hwclock::{ClockConfig, Ptp, PtpClock, PtpTimer, SimHardware, Timestamp};

const BUS_CLOCK_HZ: u32 = 216_000_000;
const CONFIG: ClockConfig = ClockConfig::for_bus_clock(BUS_CLOCK_HZ);

/// Run the simulated interrupt handler until nothing is pending anymore,
/// for at most `max_ns` of reference time. Returns the clock times at which
/// the expiry callback ran.
fn run_interrupts<const L: bool>(
    sim: &SimHardware<L>,
    ptp: &Ptp<&SimHardware<L>>,
    max_ns: u64,
) -> Vec<Timestamp> {
    let fired = Cell::new(Vec::new());
    let start = sim.elapsed_ns();
    while sim.elapsed_ns() - start < max_ns {
        let remaining = max_ns - (sim.elapsed_ns() - start);
        if sim.advance_until_interrupt(remaining).is_none() {
            break;
        }
        sim.take_interrupt();
        ptp.on_interrupt(|| {
            let mut times = fired.take();
            times.push(ptp.read());
            fired.set(times);
        });
    }
    fired.into_inner()
}

fn clock<const L: bool>(sim: &SimHardware<L>) -> Ptp<&SimHardware<L>> {
    let ptp = Ptp::new(sim, CONFIG).unwrap();
    PtpClock::set(&ptp, Timestamp::new(1_000, 0)).unwrap();
    ptp
}

#[test]
fn fires_at_absolute_deadline() {
    let sim = SimHardware::new(BUS_CLOCK_HZ);
    let ptp = clock(&sim);

    let deadline = ptp.read() + 1_000_000_000;
    ptp.set_absolute(deadline);

    let fired = run_interrupts(&sim, &ptp, 2_000_000_000);
    assert_eq!(fired.len(), 1);
    assert!(fired[0] >= deadline);
    assert!(fired[0].nanos_since(deadline) <= 10_000, "fired at {}", fired[0]);
}

#[test]
fn fires_after_relative_delay() {
    let sim = SimHardware::new(BUS_CLOCK_HZ);
    let ptp = clock(&sim);

    let armed_at = sim.elapsed_ns();
    PtpTimer::set(&ptp, 1_000_000_000);
    sim.advance_until_interrupt(2_000_000_000).unwrap();

    let waited = sim.elapsed_ns() - armed_at;
    assert!(waited.abs_diff(1_000_000_000) <= 10_000, "{waited}");
    assert!(ptp.on_interrupt(|| {}));
}

fn past_deadline_fires_immediately<const L: bool>(sim: &SimHardware<L>) {
    let ptp = clock(sim);

    for deadline in [ptp.read(), Timestamp::new(999, 0), Timestamp::ZERO] {
        ptp.set_absolute(deadline);
        let waited = sim.advance_until_interrupt(1_000_000);
        assert!(matches!(waited, Some(ns) if ns < 1_000), "{deadline}: {waited:?}");

        sim.take_interrupt();
        assert!(ptp.on_interrupt(|| {}));
    }
}

#[test]
fn past_deadline_latching_comparator() {
    past_deadline_fires_immediately(&SimHardware::new(BUS_CLOCK_HZ));
}

#[test]
fn past_deadline_crossing_comparator() {
    past_deadline_fires_immediately(&SimHardware::non_latching(BUS_CLOCK_HZ));
}

#[test]
fn rearm_fires_once_at_latest_deadline() {
    let sim = SimHardware::new(BUS_CLOCK_HZ);
    let ptp = clock(&sim);

    let now = ptp.read();
    ptp.set_absolute(now + 3_000_000);
    ptp.set_absolute(now + 1_000_000);
    // Already due, then replaced before the interrupt was handled
    ptp.set_absolute(now);
    let latest = now + 2_000_000;
    ptp.set_absolute(latest);

    let fired = run_interrupts(&sim, &ptp, 10_000_000);
    assert_eq!(fired.len(), 1);
    assert!(fired[0] >= latest);
    assert!(fired[0].nanos_since(latest) < 1_000);
}

#[test]
fn cancel_before_expiry() {
    let sim = SimHardware::new(BUS_CLOCK_HZ);
    let ptp = clock(&sim);

    PtpTimer::set(&ptp, 1_000_000);
    ptp.cancel();
    assert_eq!(ptp.deadline(), None);

    let fired = run_interrupts(&sim, &ptp, 10_000_000);
    assert!(fired.is_empty());
}

#[test]
fn cancel_after_latch_allows_one_stray() {
    let sim = SimHardware::new(BUS_CLOCK_HZ);
    let ptp = clock(&sim);

    ptp.set_absolute(Timestamp::new(10, 0));
    // The comparator has latched before the cancel takes effect
    sim.advance_ns(1_000);
    ptp.cancel();

    let fired = run_interrupts(&sim, &ptp, 10_000_000);
    assert!(fired.len() <= 1);

    sim.advance_ns(10_000_000);
    assert!(!ptp.on_interrupt(|| panic!("callback after cancel")));
}

#[test]
fn periodic_rearm_from_callback() {
    const PERIOD_NS: u64 = 10_000_000;

    let sim = SimHardware::new(BUS_CLOCK_HZ);
    let ptp = clock(&sim);

    let mut next = ptp.read() + PERIOD_NS as i64;
    ptp.set_absolute(next);

    let mut fired = Vec::new();
    for _ in 0..20 {
        sim.advance_until_interrupt(2 * PERIOD_NS).unwrap();
        sim.take_interrupt();
        ptp.on_interrupt(|| {
            fired.push(ptp.read());
            next += PERIOD_NS as i64;
            ptp.set_absolute(next);
        });
    }

    assert_eq!(fired.len(), 20);
    for pair in fired.windows(2) {
        let period = pair[1] - pair[0];
        assert!(period.abs_diff(PERIOD_NS as i64) < 100, "{period}");
    }
}
