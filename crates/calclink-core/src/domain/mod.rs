//! Domain value types for calculator variables and programs.
//!
//! # Sub-modules
//!
//! - **`number`** – Validation and byte encoding of the decimal real numbers
//!   that can be stored in a single-letter variable (`A`–`Z`).
//!
//! - **`title`** – The naming convention for programs stored on the
//!   calculator.

pub mod number;
pub mod title;

pub use number::{RealError, TiReal};
pub use title::ProgramTitle;
