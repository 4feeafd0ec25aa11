#![no_main]
use libfuzzer_sys::fuzz_target;
use ptp_hwclock::{Timestamp, NS_PER_SEC};

fuzz_target!(|input: (u32, u32, i64)| {
    let (seconds, nanoseconds, offset) = input;
    let time = Timestamp::new(seconds, nanoseconds % NS_PER_SEC);

    assert_eq!(Timestamp::from_nanos(time.to_nanos()), time);

    let shifted = time.add_nanos(offset);
    assert!(shifted.is_valid());

    // Offsets that stay within the seconds field are exact and reversible
    let target = time.to_nanos() as i128 + offset as i128;
    if (0..=Timestamp::MAX.to_nanos() as i128).contains(&target) {
        assert_eq!(shifted.to_nanos() as i128, target);
        assert_eq!(shifted - time, offset);
        assert_eq!(shifted.cmp(&time), offset.cmp(&0));
    }
});
