//! Program titles.
//!
//! The calculator's program names are uppercase.  The host normalises any
//! title it is given by trimming surrounding whitespace and uppercasing; it
//! does not re-check length or character set, so an over-long title is sent
//! as-is and the calculator decides what to do with it.

use std::fmt;

/// A normalised program title.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProgramTitle(String);

impl ProgramTitle {
    /// Trims and uppercases `raw`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use calclink_core::ProgramTitle;
    ///
    /// assert_eq!(ProgramTitle::new("  send ").as_str(), "SEND");
    /// ```
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().to_uppercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Title bytes as they appear in request packets.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Length in bytes, as written into the `u16` title length field.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ProgramTitle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProgramTitle {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}
