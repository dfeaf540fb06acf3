//! Saturating int8 arithmetic for the soft-decision decoders
//!
//! The polar list decoder and the QPSK soft demapper work on int8 values
//! clamped to [-127, 127]. Saturation bounds are part of the wire contract:
//! downstream comparisons assume the symmetric range.

/// Largest soft magnitude.
pub const SOFT_MAX: i8 = 127;

/// Saturating add clamped to [-127, 127].
pub fn qadd(a: i8, b: i8) -> i8 {
    (a as i16 + b as i16).clamp(-127, 127) as i8
}

/// Absolute value clamped to 127 (|-128| would overflow).
pub fn qabs(a: i8) -> i8 {
    (a as i16).abs().min(127) as i8
}

pub fn qmin(a: i8, b: i8) -> i8 {
    a.min(b)
}

/// Check-node min-sum product: sgn(a)*sgn(b)*min(|a|,|b|).
pub fn prod(a: i8, b: i8) -> i8 {
    let m = qmin(qabs(a), qabs(b));
    if (a < 0) != (b < 0) {
        -m
    } else {
        m
    }
}

/// Saturating multiply-add: clamp(a*b + c).
pub fn madd(a: i8, b: i8, c: i8) -> i8 {
    (a as i16 * b as i16 + c as i16).clamp(-127, 127) as i8
}

/// Clamp a float to the int8 soft range, rounding to nearest.
pub fn quantize(v: f32) -> i8 {
    v.round().clamp(-127.0, 127.0) as i8
}
