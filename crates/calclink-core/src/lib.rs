//! # calclink-core
//!
//! Shared library for CalcLink containing the TI-84 Plus CE link protocol:
//! the token codec, the request packet builder, the transaction step model,
//! and the fixed handshake sequences.
//!
//! It has zero dependencies on USB libraries, threads, or the file system.
//! Everything here is pure data in, data out, which keeps the byte-exact
//! parts of the protocol unit-testable without a calculator attached.
//!
//! # Architecture overview (for beginners)
//!
//! The calculator speaks a binary protocol over two USB bulk endpoints.  Every
//! operation (send a program, read a program, list programs) is a fixed
//! choreography of "host sends N bytes" and "calculator answers with M bytes"
//! steps.  This crate describes those choreographies as values:
//!
//! - **`tokens`** – The calculator does not store text as ASCII.  Each
//!   character is a one- or two-byte *token*.  The codec translates in both
//!   directions.
//!
//! - **`domain`** – Small value types with validation rules: the decimal real
//!   number format used for variables and the program title convention.
//!
//! - **`protocol`** – Transaction steps and sequences, the preset handshakes,
//!   the packet builder that fills request templates, and the parsers that
//!   turn calculator responses back into text.
//!
//! The companion crate `calclink-bridge` executes these sequences against a
//! real device.

pub mod domain;
pub mod protocol;
pub mod tokens;

pub use domain::number::TiReal;
pub use domain::title::ProgramTitle;
pub use protocol::packet::{PacketError, PacketRequest};
pub use protocol::response::{parse_program_content, parse_program_titles};
pub use protocol::step::{
    Direction, Expect, StepAction, TransactionSequence, TransactionStep, TransferMode,
};
pub use tokens::TokenCodec;
