//! Compile-time clock configuration

use crate::time::NS_PER_SEC;

/// Largest subsecond increment the hardware register can hold
pub const MAX_RESOLUTION_NS: u32 = 0xff;

/// Amount of status polls after which a staged update is considered stuck
pub const DEFAULT_SPIN_LIMIT: u32 = 100_000;

/// Resolution tiers tried by [`default_resolution_ns`], finest first
const RESOLUTION_TIERS: [u32; 5] = [10, 20, 50, 100, 200];

/// Accumulator increment that makes the counter run at exactly one nanosecond
/// per nanosecond when `resolution_ns` is added on every accumulator overflow.
///
/// This is `round(10^9 * 2^32 / (bus_clock_hz * resolution_ns))`, computed
/// without floating point. The rounding error stays below one resolution unit
/// per second.
pub const fn nominal_addend(resolution_ns: u32, bus_clock_hz: u32) -> u64 {
    let numerator = (NS_PER_SEC as u128) << 32;
    let denominator = bus_clock_hz as u128 * resolution_ns as u128;
    ((numerator + denominator / 2) / denominator) as u64
}

/// Accumulator increment for the largest speed-up `adjust_speed` accepts
const fn max_addend(nominal: u64) -> u128 {
    let nominal = nominal as u128;
    nominal + ((nominal * i32::MAX as u128) >> 32)
}

/// Whether a resolution works for the given bus clock, including headroom
/// for the full correction range.
pub const fn resolution_fits(resolution_ns: u32, bus_clock_hz: u32) -> bool {
    if resolution_ns == 0 || resolution_ns > MAX_RESOLUTION_NS || bus_clock_hz == 0 {
        return false;
    }

    let nominal = nominal_addend(resolution_ns, bus_clock_hz);
    nominal > 0 && nominal <= u32::MAX as u64 && max_addend(nominal) <= u32::MAX as u128
}

/// Pick the finest of the usual 10/20/50/100/200 ns resolutions that the bus
/// clock can drive. Fails const evaluation if none fits.
pub const fn default_resolution_ns(bus_clock_hz: u32) -> u32 {
    let mut i = 0;
    while i < RESOLUTION_TIERS.len() {
        if resolution_fits(RESOLUTION_TIERS[i], bus_clock_hz) {
            return RESOLUTION_TIERS[i];
        }
        i += 1;
    }
    panic!("bus clock too slow for any supported clock resolution")
}

/// Board specific clock parameters.
///
/// Meant to be built in a `const` item so an infeasible combination of
/// resolution and bus clock is rejected at compile time:
///
/// ```
/// use ptp_hwclock::ClockConfig;
///
/// const CONFIG: ClockConfig = ClockConfig::new(20, 216_000_000);
/// assert_eq!(CONFIG.nominal_addend(), 994_205_393);
/// ```
///
/// ```compile_fail
/// use ptp_hwclock::ClockConfig;
///
/// // 1 ns per tick at 100 MHz would need an addend above 2^32
/// const CONFIG: ClockConfig = ClockConfig::new(1, 100_000_000);
/// let _ = CONFIG;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClockConfig {
    resolution_ns: u32,
    bus_clock_hz: u32,
    nominal_addend: u32,
    spin_limit: u32,
}

impl ClockConfig {
    /// Configuration for a counter advancing `resolution_ns` per tick, with
    /// the accumulator clocked at `bus_clock_hz`.
    pub const fn new(resolution_ns: u32, bus_clock_hz: u32) -> Self {
        assert!(
            resolution_ns > 0 && resolution_ns <= MAX_RESOLUTION_NS,
            "resolution does not fit the subsecond increment register"
        );
        assert!(bus_clock_hz > 0, "bus clock must be running");
        assert!(
            resolution_fits(resolution_ns, bus_clock_hz),
            "accumulator increment out of range for this resolution and bus clock"
        );

        Self {
            resolution_ns,
            bus_clock_hz,
            nominal_addend: nominal_addend(resolution_ns, bus_clock_hz) as u32,
            spin_limit: DEFAULT_SPIN_LIMIT,
        }
    }

    /// Configuration using [`default_resolution_ns`] for the bus clock
    pub const fn for_bus_clock(bus_clock_hz: u32) -> Self {
        Self::new(default_resolution_ns(bus_clock_hz), bus_clock_hz)
    }

    /// Override the amount of status polls before giving up on a staged update
    pub const fn with_spin_limit(mut self, spin_limit: u32) -> Self {
        assert!(spin_limit > 0, "spin limit must allow at least one poll");
        self.spin_limit = spin_limit;
        self
    }

    pub const fn resolution_ns(&self) -> u32 {
        self.resolution_ns
    }

    pub const fn bus_clock_hz(&self) -> u32 {
        self.bus_clock_hz
    }

    pub const fn nominal_addend(&self) -> u32 {
        self.nominal_addend
    }

    pub const fn spin_limit(&self) -> u32 {
        self.spin_limit
    }

    /// Accumulator increment for a speed correction relative to nominal.
    ///
    /// `correction` is a signed fraction of the nominal rate in units of
    /// 2^-32, so `i32::MAX` runs the clock about 50% fast and `i32::MIN` 50%
    /// slow.
    pub const fn addend_for(&self, correction: i32) -> u32 {
        let nominal = self.nominal_addend as i64;
        // Arithmetic shift, the result stays within u32 by construction
        (nominal + ((nominal * correction as i64) >> 32)) as u32
    }
}
