//! Decimal real numbers in the calculator's 9-byte floating point format.
//!
//! # The TI real format (for beginners)
//!
//! The calculator stores a real number as:
//!
//! ```text
//! [sign:1][exponent:1][mantissa:7]
//! ```
//!
//! - `sign` is `0x00` for positive values and `0x80` for negative values.
//! - `exponent` is biased by `0x80`: `0x80` means 10⁰, `0x81` means 10¹,
//!   `0x7F` means 10⁻¹.
//! - `mantissa` holds 14 decimal digits packed two per byte (BCD), most
//!   significant first.  Host-side values carry at most 10 digits, so the
//!   last two mantissa bytes are always zero and are written by the packet
//!   builder rather than stored here.
//!
//! So `42` becomes `00 81 42 00 00 00 00` and `0.5` becomes
//! `00 7F 50 00 00 00 00`.
//!
//! Values whose integer part is zero always use exponent `0x7F` and place
//! the fraction digits verbatim.  `0.05` is not renormalised: it is sent as
//! `7F 05 00 ...`.

use thiserror::Error;

/// Maximum number of significant digits accepted from the host.
pub const MAX_DIGITS: usize = 10;

/// Exponent byte for values with a zero integer part.
const FRACTION_EXPONENT: u8 = 0x7F;

/// Exponent bias: `0x80` is 10⁰.
const EXPONENT_BIAS: u8 = 0x80;

/// Sign byte for negative values.
const NEGATIVE_SIGN: u8 = 0x80;

/// Reasons a value string is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RealError {
    /// The string contains no digits at all.
    #[error("no digits in value")]
    NoDigits,

    /// A character other than a digit, one leading `-`, or a separator.
    #[error("unexpected character {0:?} in value")]
    InvalidCharacter(char),

    /// More than one `.` or `,` separator.
    #[error("more than one decimal separator")]
    MultipleSeparators,

    /// More digits than the mantissa can carry.
    #[error("{0} digits exceed the {MAX_DIGITS}-digit limit")]
    TooManyDigits(usize),
}

/// A validated decimal real ready to be written to a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiReal {
    negative: bool,
    exponent: u8,
    digits: [u8; MAX_DIGITS],
}

impl TiReal {
    /// Parses a decimal string such as `"42"`, `"-3.5"`, or `"0,25"`.
    ///
    /// Accepts an optional single leading `-`, digits, and at most one
    /// separator (`.` or `,`).  At most [`MAX_DIGITS`] digits in total.
    ///
    /// # Errors
    ///
    /// Returns a [`RealError`] describing the first rule the string breaks.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use calclink_core::TiReal;
    ///
    /// let real = TiReal::parse("42").unwrap();
    /// assert_eq!(real.to_bytes(), [0x00, 0x81, 0x42, 0x00, 0x00, 0x00, 0x00]);
    /// ```
    pub fn parse(value: &str) -> Result<Self, RealError> {
        let (negative, body) = match value.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, value),
        };

        let mut integer = Vec::new();
        let mut fraction = Vec::new();
        let mut seen_separator = false;

        for ch in body.chars() {
            match ch {
                '0'..='9' => {
                    let digit = ch as u8 - b'0';
                    if seen_separator {
                        fraction.push(digit);
                    } else {
                        integer.push(digit);
                    }
                }
                '.' | ',' if seen_separator => return Err(RealError::MultipleSeparators),
                '.' | ',' => seen_separator = true,
                other => return Err(RealError::InvalidCharacter(other)),
            }
        }

        let total = integer.len() + fraction.len();
        if total == 0 {
            return Err(RealError::NoDigits);
        }
        if total > MAX_DIGITS {
            return Err(RealError::TooManyDigits(total));
        }

        let zero_integer_part = seen_separator && matches!(integer.as_slice(), [] | [0]);
        let (exponent, significant): (u8, Vec<u8>) = if zero_integer_part {
            (FRACTION_EXPONENT, fraction)
        } else {
            // `integer` is non-empty here: either there is no separator (so all
            // digits are integer digits) or the integer part is non-zero.
            let exponent = EXPONENT_BIAS + (integer.len().max(1) - 1) as u8;
            (exponent, integer.into_iter().chain(fraction).collect())
        };

        let mut digits = [0u8; MAX_DIGITS];
        for (slot, digit) in digits.iter_mut().zip(significant) {
            *slot = digit;
        }

        Ok(Self {
            negative,
            exponent,
            digits,
        })
    }

    /// Returns `true` for values parsed with a leading `-`.
    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// Returns the biased exponent byte.
    pub fn exponent(&self) -> u8 {
        self.exponent
    }

    /// Encodes the sign, exponent, and the 10 host digits as 5 BCD bytes.
    pub fn to_bytes(&self) -> [u8; 7] {
        let mut out = [0u8; 7];
        out[0] = if self.negative { NEGATIVE_SIGN } else { 0x00 };
        out[1] = self.exponent;
        for (i, pair) in self.digits.chunks_exact(2).enumerate() {
            out[2 + i] = (pair[0] << 4) | pair[1];
        }
        out
    }
}
