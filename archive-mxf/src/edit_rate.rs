//! Edit rate conversion.
//!
//! Tracks in one clip may count positions at different edit rates. Plain
//! conversions scale by the rate ratio with explicit rounding. Readers at a
//! non-integer multiple of the clip rate use a repeating sample sequence,
//! e.g. 1602, 1601, 1602, 1601, 1602 audio samples per 29.97 Hz frame.

use crate::types::Rational;
use std::cmp::Ordering;

/// Longest sample sequence accepted.
pub const MAX_SAMPLE_SEQUENCE_LEN: i64 = 128;

/// Rounding applied when a conversion is inexact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    /// Towards negative infinity
    Down,
    /// Towards positive infinity
    Up,
    /// To the nearest value, halves away from zero
    Nearest,
    /// Direction chosen from the conversion; see [`convert_position`] and
    /// [`convert_duration`]
    Auto,
}

fn divide(value: i128, divisor: i128, rounding: Rounding) -> i128 {
    match rounding {
        Rounding::Down | Rounding::Auto => value.div_euclid(divisor),
        Rounding::Up => -(-value).div_euclid(divisor),
        Rounding::Nearest => {
            if value >= 0 {
                (2 * value + divisor) / (2 * divisor)
            } else {
                -((2 * -value + divisor) / (2 * divisor))
            }
        }
    }
}

fn scale(value: i64, from: Rational, to: Rational, rounding: Rounding) -> i64 {
    if from.same_rate(&to) || value == 0 {
        return value;
    }
    let numerator = value as i128 * to.numerator as i128 * from.denominator as i128;
    let divisor = from.numerator as i128 * to.denominator as i128;
    if divisor == 0 {
        return value;
    }
    divide(numerator, divisor, rounding).clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

/// Convert a position between edit rates.
///
/// [`Rounding::Auto`] rounds up when converting to a lower rate and down
/// when converting to a higher one.
pub fn convert_position(position: i64, from: Rational, to: Rational, rounding: Rounding) -> i64 {
    let rounding = match rounding {
        Rounding::Auto if to.cmp_rate(&from) == Ordering::Less => Rounding::Up,
        Rounding::Auto => Rounding::Down,
        other => other,
    };
    scale(position, from, to, rounding)
}

/// Convert a duration between edit rates. Negative (unknown) durations are
/// passed through.
///
/// [`Rounding::Auto`] rounds down when converting to a lower rate, so only
/// complete edit units are counted, and up when converting to a higher one.
pub fn convert_duration(duration: i64, from: Rational, to: Rational, rounding: Rounding) -> i64 {
    if duration < 0 {
        return duration;
    }
    let rounding = match rounding {
        Rounding::Auto if to.cmp_rate(&from) == Ordering::Less => Rounding::Down,
        Rounding::Auto => Rounding::Up,
        other => other,
    };
    scale(duration, from, to, rounding)
}

fn gcd(mut a: i64, mut b: i64) -> i64 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a.abs()
}

/// Samples at `higher` per edit unit at `lower`, repeating.
///
/// Returns `None` when `higher` is the lower rate or the pattern would be
/// longer than [`MAX_SAMPLE_SEQUENCE_LEN`].
pub fn sample_sequence(lower: Rational, higher: Rational) -> Option<Vec<u32>> {
    if !lower.is_valid() || !higher.is_valid() {
        return None;
    }
    match higher.cmp_rate(&lower) {
        Ordering::Equal => return Some(vec![1]),
        Ordering::Less => return None,
        Ordering::Greater => {}
    }

    let mut num = higher.numerator as i64 * lower.denominator as i64;
    let mut den = higher.denominator as i64 * lower.numerator as i64;
    let divisor = gcd(num, den);
    num /= divisor;
    den /= divisor;
    if den > MAX_SAMPLE_SEQUENCE_LEN {
        return None;
    }

    let round_half_up = |i: i64| (2 * i * num + den) / (2 * den);
    (0..den)
        .map(|i| u32::try_from(round_half_up(i + 1) - round_half_up(i)).ok())
        .collect()
}

/// Total samples in one repetition of a sequence.
pub fn sequence_total(sequence: &[u32]) -> i64 {
    sequence.iter().map(|&n| n as i64).sum()
}

/// Convert a lower rate position to the higher rate using `sequence`.
pub fn to_higher(position: i64, sequence: &[u32]) -> i64 {
    let len = sequence.len() as i64;
    if len == 0 {
        return position;
    }
    let cycles = position.div_euclid(len);
    let remainder = position.rem_euclid(len) as usize;
    cycles * sequence_total(sequence) + sequence_total(&sequence[..remainder])
}

/// Convert a higher rate position back to the lower rate using `sequence`.
///
/// [`Rounding::Auto`] rounds up.
pub fn to_lower(position: i64, sequence: &[u32], rounding: Rounding) -> i64 {
    let len = sequence.len() as i64;
    let total = sequence_total(sequence);
    if len == 0 || total == 0 {
        return position;
    }
    let cycles = position.div_euclid(total);
    let mut remainder = position.rem_euclid(total);

    let mut index = 0i64;
    for &samples in sequence {
        let samples = samples as i64;
        if remainder < samples {
            break;
        }
        remainder -= samples;
        index += 1;
    }

    let base = cycles * len + index;
    if remainder == 0 {
        return base;
    }
    match rounding {
        Rounding::Down => base,
        Rounding::Up | Rounding::Auto => base + 1,
        Rounding::Nearest => {
            let samples = sequence[index as usize] as i64;
            if 2 * remainder >= samples {
                base + 1
            } else {
                base
            }
        }
    }
}
