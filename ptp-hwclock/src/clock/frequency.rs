//! Conversions between frequency corrections and speed corrections

use fixed::types::I32F32;

const PPB_PER_UNIT: i64 = 1_000_000_000;

/// Speed correction for a frequency multiplier, e.g. `1.000_001` for one ppm
/// fast. Saturates at the range of the correction.
pub fn correction_from_multiplier(multiplier: f64) -> i32 {
    if multiplier.is_nan() {
        return 0;
    }

    // The bits of a 32.32 fixed point number are the correction in 2^-32 units
    let fraction = I32F32::saturating_from_num(multiplier - 1.0);
    saturate(fraction.to_bits())
}

/// Speed correction for a frequency offset in parts per billion
pub fn correction_from_ppb(ppb: i64) -> i32 {
    let ppb = ppb.clamp(-PPB_PER_UNIT, PPB_PER_UNIT) as i128;
    let scaled = (ppb << 32) / PPB_PER_UNIT as i128;
    saturate(scaled as i64)
}

/// Frequency offset in parts per billion of a speed correction, rounded down
pub fn ppb_from_correction(correction: i32) -> i64 {
    ((correction as i128 * PPB_PER_UNIT as i128) >> 32) as i64
}

fn saturate(bits: i64) -> i32 {
    bits.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}
