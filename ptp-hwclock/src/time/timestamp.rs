//! Implementation of the [Timestamp] type

use core::{
    fmt::Display,
    ops::{Add, AddAssign, Sub, SubAssign},
};

/// Amount of nanoseconds in a second
pub const NS_PER_SEC: u32 = 1_000_000_000;

/// A point in time as kept by the hardware counter.
///
/// The seconds field is 32 bits wide, so this representation rolls over in
/// the year 2106. The nanosecond count since the epoch ([`Timestamp::to_nanos`])
/// has no such limitation until 2554. Widening the seconds field would change
/// the layout seen by existing consumers, so it stays 32 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timestamp {
    /// Seconds since the epoch
    pub seconds: u32,
    /// Nanoseconds within the second, must be less than 10^9
    pub nanoseconds: u32,
}

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp {
        seconds: 0,
        nanoseconds: 0,
    };

    pub const MAX: Timestamp = Timestamp {
        seconds: u32::MAX,
        nanoseconds: NS_PER_SEC - 1,
    };

    /// Create a timestamp, panicking if `nanoseconds` is not below 10^9
    pub const fn new(seconds: u32, nanoseconds: u32) -> Self {
        assert!(nanoseconds < NS_PER_SEC, "nanoseconds out of range");
        Self {
            seconds,
            nanoseconds,
        }
    }

    /// Whether the nanoseconds field is within `[0, 10^9)`
    pub const fn is_valid(&self) -> bool {
        self.nanoseconds < NS_PER_SEC
    }

    /// Convert a nanosecond count since the epoch.
    ///
    /// Only counts below `(u32::MAX + 1) * 10^9` are representable; larger
    /// values wrap the seconds field.
    pub const fn from_nanos(nanos: u64) -> Self {
        let seconds = nanos / NS_PER_SEC as u64;
        debug_assert!(seconds <= u32::MAX as u64, "seconds field overflow");

        Self {
            seconds: seconds as u32,
            nanoseconds: (nanos % NS_PER_SEC as u64) as u32,
        }
    }

    /// Convert a nanosecond count since the epoch, clamping counts past the
    /// seconds range to [`Timestamp::MAX`]
    pub const fn from_nanos_saturating(nanos: u64) -> Self {
        if nanos > Self::MAX.to_nanos() {
            Self::MAX
        } else {
            Self::from_nanos(nanos)
        }
    }

    /// Get the total amount of nanoseconds since the epoch
    pub const fn to_nanos(self) -> u64 {
        self.seconds as u64 * NS_PER_SEC as u64 + self.nanoseconds as u64
    }

    /// Add a signed nanosecond offset.
    ///
    /// The nanoseconds of the result are always in `[0, 10^9)`. Sign and
    /// magnitude are handled separately, the remainder operator only ever sees
    /// unsigned operands. Offsets that move the result outside of the seconds
    /// range wrap around.
    pub const fn add_nanos(self, offset: i64) -> Self {
        let magnitude = offset.unsigned_abs();
        let delta_seconds = (magnitude / NS_PER_SEC as u64) as u32;
        let delta_nanos = (magnitude % NS_PER_SEC as u64) as u32;

        if offset >= 0 {
            let mut seconds = self.seconds.wrapping_add(delta_seconds);
            let mut nanoseconds = self.nanoseconds + delta_nanos;
            if nanoseconds >= NS_PER_SEC {
                nanoseconds -= NS_PER_SEC;
                seconds = seconds.wrapping_add(1);
            }
            Self {
                seconds,
                nanoseconds,
            }
        } else {
            let mut seconds = self.seconds.wrapping_sub(delta_seconds);
            let nanoseconds = if self.nanoseconds < delta_nanos {
                seconds = seconds.wrapping_sub(1);
                self.nanoseconds + NS_PER_SEC - delta_nanos
            } else {
                self.nanoseconds - delta_nanos
            };
            Self {
                seconds,
                nanoseconds,
            }
        }
    }

    /// Signed distance from `earlier` to `self` in nanoseconds
    pub const fn nanos_since(self, earlier: Timestamp) -> i64 {
        self.to_nanos() as i64 - earlier.to_nanos() as i64
    }
}

impl From<u64> for Timestamp {
    fn from(nanos: u64) -> Self {
        Self::from_nanos(nanos)
    }
}

impl From<Timestamp> for u64 {
    fn from(ts: Timestamp) -> Self {
        ts.to_nanos()
    }
}

impl From<Timestamp> for core::time::Duration {
    fn from(ts: Timestamp) -> Self {
        core::time::Duration::new(ts.seconds as u64, ts.nanoseconds)
    }
}

impl Add<i64> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: i64) -> Self::Output {
        self.add_nanos(rhs)
    }
}

impl AddAssign<i64> for Timestamp {
    fn add_assign(&mut self, rhs: i64) {
        *self = *self + rhs;
    }
}

impl Sub<i64> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: i64) -> Self::Output {
        match rhs.checked_neg() {
            Some(negated) => self.add_nanos(negated),
            // -i64::MIN does not fit, split it in two steps
            None => self.add_nanos(i64::MAX).add_nanos(1),
        }
    }
}

impl SubAssign<i64> for Timestamp {
    fn sub_assign(&mut self, rhs: i64) {
        *self = *self - rhs;
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = i64;

    fn sub(self, rhs: Timestamp) -> Self::Output {
        self.nanos_since(rhs)
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanoseconds)
    }
}
