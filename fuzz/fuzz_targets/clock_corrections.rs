#![no_main]
use std::cell::Cell;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use ptp_hwclock::{ClockConfig, Ptp, PtpClock, PtpTimer, SimHardware, Timestamp, NS_PER_SEC};

const BUS_CLOCK_HZ: u32 = 216_000_000;

#[derive(Debug, Arbitrary)]
enum Operation {
    Advance(u32),
    Set(u32, u32),
    Adjust(i32),
    AdjustSpeed(i32),
    Arm(u32, u32),
    ArmIn(u32),
    Cancel,
    Interrupt,
}

fuzz_target!(|operations: Vec<Operation>| {
    let sim = SimHardware::new(BUS_CLOCK_HZ);
    let Ok(ptp) = Ptp::new(&sim, ClockConfig::for_bus_clock(BUS_CLOCK_HZ)) else {
        return;
    };

    let mut armed = 0;
    let fired = Cell::new(0);
    for operation in operations {
        match operation {
            Operation::Advance(nanos) => sim.advance_ns(nanos as u64),
            Operation::Set(seconds, nanoseconds) => {
                let _ = PtpClock::set(&ptp, Timestamp::new(seconds, nanoseconds % NS_PER_SEC));
            }
            Operation::Adjust(offset) => {
                let _ = ptp.adjust(offset as i64);
            }
            Operation::AdjustSpeed(correction) => {
                let _ = ptp.adjust_speed(correction);
            }
            Operation::Arm(seconds, nanoseconds) => {
                armed += 1;
                ptp.set_absolute(Timestamp::new(seconds, nanoseconds % NS_PER_SEC));
            }
            Operation::ArmIn(delay) => {
                armed += 1;
                PtpTimer::set(&ptp, delay as u64);
            }
            Operation::Cancel => ptp.cancel(),
            Operation::Interrupt => {
                sim.take_interrupt();
                ptp.on_interrupt(|| fired.set(fired.get() + 1));
            }
        }

        // Every arming fires at most once
        assert!(fired.get() <= armed);
        assert!(ptp.read().is_valid());
    }
});
