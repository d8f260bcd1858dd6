//! Exact fixed-point amounts
//!
//! All money in the engine is represented as a signed 64-bit integer at a
//! fixed base-10 scale of 8 fractional digits. Addition and subtraction are
//! native integer operations; multiplication and division widen to 128 bits.
//! Floating point never touches the money path.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scale factor: 10^8 (8 fractional digits)
pub const SCALE: i64 = 100_000_000;

const SCALE_DIGITS: u32 = 8;

/// Exact fixed-point number: the represented value is `raw / 10^8`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FixedPoint(i64);

impl FixedPoint {
    /// Zero
    pub const ZERO: Self = Self(0);

    /// Smallest representable step (10^-8)
    pub const EPSILON: Self = Self(1);

    /// Wrap a raw scaled value (already multiplied by 10^8)
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// Raw scaled value
    pub const fn raw(&self) -> i64 {
        self.0
    }

    /// Whole number of units
    pub fn from_integer(n: i64) -> Result<Self> {
        n.checked_mul(SCALE)
            .map(Self)
            .ok_or_else(|| Error::Overflow(format!("{} does not fit at scale 8", n)))
    }

    /// Treat `cents` as hundredths and rescale to 8 fractional digits
    pub fn from_cents(cents: i64) -> Result<Self> {
        cents
            .checked_mul(SCALE / 100)
            .map(Self)
            .ok_or_else(|| Error::Overflow(format!("{} cents does not fit at scale 8", cents)))
    }

    /// Parse a decimal string: optional leading `-`, integer digits, and up
    /// to 8 fractional digits. Longer fractions are truncated, not rounded.
    pub fn from_string(s: &str) -> Result<Self> {
        let (negative, body) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        if body.is_empty() {
            return Err(Error::InvalidAmount(s.to_string()));
        }

        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => (i, f),
            None => (body, ""),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(Error::InvalidAmount(s.to_string()));
        }
        if !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
        {
            return Err(Error::InvalidAmount(s.to_string()));
        }

        let int_value: i64 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| Error::Overflow(format!("integer part of {} overflows i64", s)))?
        };

        // Truncate beyond 8 digits, zero-pad shorter fractions on the right.
        let frac_digits: String = frac_part.chars().take(SCALE_DIGITS as usize).collect();
        let frac_value: i64 = if frac_digits.is_empty() {
            0
        } else {
            let padded = format!("{:0<8}", frac_digits);
            padded.parse().expect("at most 8 ascii digits")
        };

        let raw = int_value
            .checked_mul(SCALE)
            .and_then(|v| v.checked_add(frac_value))
            .ok_or_else(|| Error::Overflow(format!("{} does not fit at scale 8", s)))?;

        Ok(Self(if negative { -raw } else { raw }))
    }

    /// Checked addition
    pub fn checked_add(self, other: Self) -> Result<Self> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or_else(|| Error::Overflow(format!("{} + {}", self, other)))
    }

    /// Checked subtraction
    pub fn checked_sub(self, other: Self) -> Result<Self> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or_else(|| Error::Overflow(format!("{} - {}", self, other)))
    }

    /// Multiplication with 128-bit intermediate, rounded toward zero
    pub fn mul(self, other: Self) -> Result<Self> {
        let wide = (self.0 as i128) * (other.0 as i128) / (SCALE as i128);
        i64::try_from(wide)
            .map(Self)
            .map_err(|_| Error::Overflow(format!("{} * {}", self, other)))
    }

    /// Division, rounded toward zero
    pub fn div(self, other: Self) -> Result<Self> {
        if other.0 == 0 {
            return Err(Error::DivisionByZero);
        }
        let wide = (self.0 as i128) * (SCALE as i128) / (other.0 as i128);
        i64::try_from(wide)
            .map(Self)
            .map_err(|_| Error::Overflow(format!("{} / {}", self, other)))
    }

    /// Absolute value
    pub fn abs(self) -> Self {
        Self(self.0.abs())
    }

    /// Negation
    pub fn neg(self) -> Self {
        Self(-self.0)
    }

    /// True if exactly zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// True if strictly negative
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Round to `places` fractional digits, half away from zero.
    /// Identity for `places >= 8`.
    pub fn round(self, places: u32) -> Self {
        if places >= SCALE_DIGITS {
            return self;
        }
        let step = 10_i64.pow(SCALE_DIGITS - places);
        let quotient = self.0 / step;
        let remainder = self.0 % step;
        let rounded = if remainder.abs() * 2 >= step {
            quotient + self.0.signum()
        } else {
            quotient
        };
        Self(rounded * step)
    }

    /// Lossy conversion for diagnostics only; never used for accounting
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / SCALE as f64
    }
}

impl fmt::Display for FixedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        let int_part = magnitude / SCALE as u64;
        let frac_part = magnitude % SCALE as u64;
        if frac_part == 0 {
            write!(f, "{}{}", sign, int_part)
        } else {
            let frac = format!("{:08}", frac_part);
            write!(f, "{}{}.{}", sign, int_part, frac.trim_end_matches('0'))
        }
    }
}

impl FromStr for FixedPoint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_string(s)
    }
}
