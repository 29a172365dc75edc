//! MXF type definitions

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Rational number for edit rates, sample rates and aspect ratios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rational {
    /// Numerator
    pub numerator: i32,
    /// Denominator
    pub denominator: i32,
}

impl Rational {
    /// Create new rational
    pub const fn new(numerator: i32, denominator: i32) -> Self {
        Rational {
            numerator,
            denominator,
        }
    }

    /// The all-zero value written for absent rationals.
    pub const ZERO: Rational = Rational::new(0, 0);

    /// Convert to f64
    pub fn to_f64(&self) -> f64 {
        if self.denominator == 0 {
            0.0
        } else {
            self.numerator as f64 / self.denominator as f64
        }
    }

    /// Both terms positive.
    pub fn is_valid(&self) -> bool {
        self.numerator > 0 && self.denominator > 0
    }

    /// Compare rate values rather than terms, so 50/2 equals 25/1.
    pub fn cmp_rate(&self, other: &Rational) -> Ordering {
        let lhs = self.numerator as i64 * other.denominator as i64;
        let rhs = other.numerator as i64 * self.denominator as i64;
        lhs.cmp(&rhs)
    }

    /// Same rate value.
    pub fn same_rate(&self, other: &Rational) -> bool {
        self.cmp_rate(other) == Ordering::Equal
    }

    /// Common rates
    pub fn fps_25() -> Self {
        Rational::new(25, 1)
    }

    pub fn fps_29_97() -> Self {
        Rational::new(30000, 1001)
    }

    pub fn fps_50() -> Self {
        Rational::new(50, 1)
    }

    pub fn hz_48000() -> Self {
        Rational::new(48000, 1)
    }
}

impl Default for Rational {
    fn default() -> Self {
        Rational::ZERO
    }
}

impl fmt::Display for Rational {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

/// Edit rate (typically same as frame rate for video)
pub type EditRate = Rational;

/// UMID (Unique Material Identifier) - 32 bytes
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Umid(pub [u8; 32]);

impl Umid {
    /// Create new UMID
    pub fn new(bytes: [u8; 32]) -> Self {
        Umid(bytes)
    }

    /// Create zero UMID
    pub fn zero() -> Self {
        Umid([0; 32])
    }

    /// UMID from a 32-byte slice.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        <[u8; 32]>::try_from(bytes).ok().map(Umid)
    }

    /// Generate a new random UMID
    pub fn generate() -> Self {
        use uuid::Uuid;

        let mut bytes = [0u8; 32];

        // SMPTE 330M label, length 0x13, instance type and number method
        bytes[0..12].copy_from_slice(&[
            0x06, 0x0A, 0x2B, 0x34, 0x01, 0x01, 0x01, 0x05, 0x01, 0x01, 0x0D, 0x20,
        ]);
        bytes[12] = 0x13;

        // material number
        bytes[16..32].copy_from_slice(Uuid::new_v4().as_bytes());

        Umid(bytes)
    }

    /// Check if this is a zero UMID
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    /// The material number (bytes 16-31)
    pub fn material_number(&self) -> &[u8] {
        &self.0[16..32]
    }
}

impl fmt::Debug for Umid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UMID({})", self)
    }
}

impl fmt::Display for Umid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 && i % 4 == 0 {
                write!(f, "-")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl Default for Umid {
    fn default() -> Self {
        Umid::zero()
    }
}
