//! Request packet builder.
//!
//! Wire format of a data packet (all integers big-endian):
//! ```text
//! [total_len:4][0x04][payload_len:4][command:2][fields...]
//! ```
//! `total_len` counts every byte after itself and the type byte, so a packet
//! is always `total_len + 5` bytes long.  `payload_len` counts the bytes after
//! the command's own length word (`total_len - 6`).
//!
//! Commands used here:
//!
//! | command | meaning                         |
//! |---------|---------------------------------|
//! | `000b`  | announce a variable or program  |
//! | `000c`  | request a program               |
//! | `000d`  | variable or program data        |
//!
//! A transfer (variable or program) is the same 12-step exchange with only
//! the header (step 0) and the data packet (step 6) depending on the
//! request.  A read is a 6-step exchange that
//! captures the calculator's second answer.

use thiserror::Error;

use crate::domain::number::{RealError, TiReal};
use crate::domain::title::ProgramTitle;
use crate::protocol::presets::{ACK, CONTINUE, END_OF_TRANSMISSION, READY};
use crate::protocol::step::{TransactionSequence, TransactionStep};
use crate::protocol::wire::parse_hex;
use crate::tokens::TokenCodec;

/// Packet type byte for data packets.
const DATA_PACKET: u8 = 0x04;

const CMD_ANNOUNCE: [u8; 2] = [0x00, 0x0B];
const CMD_REQUEST: [u8; 2] = [0x00, 0x0C];
const CMD_DATA: [u8; 2] = [0x00, 0x0D];

/// Attribute block following the variable name in a variable header.
const VARIABLE_ATTRIBUTES: &str =
    "0000000009010005000100040000000900020004f00b0000000300010000410001000008000400000000";

/// Attribute block closing a program header.
const PROGRAM_ATTRIBUTES: &str = "00020004f00b0005000300010000410001000008000400000000";

/// Attribute request closing a read request.
const READ_ATTRIBUTES: &str = "00017fffffff0006000100020003000500080041000100110004f00f00050000";

/// Largest value a two-byte length field can carry.
pub const MAX_LENGTH_FIELD: usize = 0xFFFF;

/// Errors raised while building request packets.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PacketError {
    /// Variable names are a single letter `A`–`Z`.
    #[error("invalid variable name {0:?}: expected a single letter A-Z")]
    InvalidVariableName(String),

    /// The value string is not a decimal real the calculator accepts.
    #[error("invalid variable value {value:?}")]
    InvalidVariableValue {
        value: String,
        #[source]
        reason: RealError,
    },

    /// A length does not fit its field.
    #[error("{field} of {value} bytes does not fit the packet field")]
    EncodingOverflow { field: &'static str, value: usize },

    /// A hex payload could not be parsed.
    #[error("malformed hex payload in {context}")]
    MalformedHex {
        context: String,
        #[source]
        source: hex::FromHexError,
    },
}

/// Encodes a program length into the two-byte field of a program data packet.
///
/// The calculator expects a quirky layout taken from captured transfers:
///
/// - `v <= 0xFF`: `[v, 0x00]`
/// - `v <= 0xFFF`: hex digits `abc` become `[0xab, 0x0c]`
/// - `v <= 0xFFFF`: big-endian
///
/// # Errors
///
/// Returns [`PacketError::EncodingOverflow`] above `0xFFFF`.
///
/// # Examples
///
/// ```rust
/// use calclink_core::protocol::format_length_field;
///
/// assert_eq!(format_length_field(5).unwrap(), [0x05, 0x00]);
/// assert_eq!(format_length_field(0x123).unwrap(), [0x12, 0x03]);
/// assert_eq!(format_length_field(0x1234).unwrap(), [0x12, 0x34]);
/// assert!(format_length_field(0x10000).is_err());
/// ```
pub fn format_length_field(value: usize) -> Result<[u8; 2], PacketError> {
    match value {
        0..=0xFF => Ok([value as u8, 0x00]),
        0x100..=0xFFF => Ok([(value >> 4) as u8, (value & 0x0F) as u8]),
        0x1000..=MAX_LENGTH_FIELD => Ok((value as u16).to_be_bytes()),
        _ => Err(PacketError::EncodingOverflow {
            field: "program length",
            value,
        }),
    }
}

/// A request the host can make of the calculator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketRequest {
    /// Store a real number in a single-letter variable.
    SendVariable { name: u8, value: TiReal },
    /// Store a program; `program` is already token-encoded.
    SendProgram {
        title: ProgramTitle,
        program: Vec<u8>,
        replace: bool,
    },
    /// Fetch a program's content.
    ReadProgram { title: ProgramTitle },
}

impl PacketRequest {
    /// Validates a variable assignment such as `("a", "3.14")`.
    ///
    /// # Errors
    ///
    /// [`PacketError::InvalidVariableName`] unless the trimmed name is one
    /// ASCII letter; [`PacketError::InvalidVariableValue`] if the value is not
    /// a decimal real with at most 10 digits.
    pub fn send_variable(name: &str, value: &str) -> Result<Self, PacketError> {
        let normalised = name.trim().to_ascii_uppercase();
        let name = match normalised.as_bytes() {
            [letter] if letter.is_ascii_uppercase() => *letter,
            _ => return Err(PacketError::InvalidVariableName(name.to_owned())),
        };

        let value = TiReal::parse(value).map_err(|reason| PacketError::InvalidVariableValue {
            value: value.to_owned(),
            reason,
        })?;

        Ok(Self::SendVariable { name, value })
    }

    /// Encodes `text` with the shared token codec.
    ///
    /// `replace` selects the overwrite flag; it must be `true` when a program
    /// with the same title already exists.
    pub fn send_program(title: &str, text: &str, replace: bool) -> Self {
        Self::SendProgram {
            title: ProgramTitle::new(title),
            program: TokenCodec::shared().encode(text),
            replace,
        }
    }

    pub fn read_program(title: &str) -> Self {
        Self::ReadProgram {
            title: ProgramTitle::new(title),
        }
    }

    /// Produces the transaction sequence for this request.
    ///
    /// # Errors
    ///
    /// [`PacketError::EncodingOverflow`] when the program or title is too long
    /// for its length field.
    pub fn build(&self) -> Result<TransactionSequence, PacketError> {
        match self {
            Self::SendVariable { name, value } => Ok(transfer_sequence(
                variable_header(*name)?,
                "variable header",
                variable_data(value),
                "variable data",
            )),
            Self::SendProgram {
                title,
                program,
                replace,
            } => Ok(transfer_sequence(
                program_header(title, program.len(), *replace)?,
                "program header",
                program_data(program)?,
                "program data",
            )),
            Self::ReadProgram { title } => Ok(read_sequence(read_request(title)?)),
        }
    }
}

// ── Templates ─────────────────────────────────────────────────────────────────

/// The 12-step transfer exchange shared by variables and programs.
fn transfer_sequence(
    header: Vec<u8>,
    header_description: &str,
    data: Vec<u8>,
    data_description: &str,
) -> TransactionSequence {
    TransactionSequence::new(vec![
        TransactionStep::out(header, header_description),
        TransactionStep::expect(ACK.to_vec(), "ack"),
        TransactionStep::expect(READY.to_vec(), "ready to receive"),
        TransactionStep::out(ACK.to_vec(), "ack"),
        TransactionStep::expect(CONTINUE.to_vec(), "continue"),
        TransactionStep::out(ACK.to_vec(), "ack"),
        TransactionStep::out(data, data_description),
        TransactionStep::expect(ACK.to_vec(), "ack"),
        TransactionStep::expect(CONTINUE.to_vec(), "complete"),
        TransactionStep::out(ACK.to_vec(), "ack"),
        TransactionStep::out(END_OF_TRANSMISSION.to_vec(), "end transmission"),
        TransactionStep::expect(ACK.to_vec(), "final ack"),
    ])
}

/// The 6-step read exchange.  Step 4 captures the program content.
fn read_sequence(request: Vec<u8>) -> TransactionSequence {
    TransactionSequence::new(vec![
        TransactionStep::out(request, "read request"),
        TransactionStep::expect(ACK.to_vec(), "ack"),
        TransactionStep::skip("program attributes"),
        TransactionStep::out(ACK.to_vec(), "ack"),
        TransactionStep::capture("program content"),
        TransactionStep::out(ACK.to_vec(), "final ack"),
    ])
}

// ── Packet bodies ─────────────────────────────────────────────────────────────

fn packet_prefix(buf: &mut Vec<u8>, total_len: u32, payload_len: u32, command: [u8; 2]) {
    buf.extend_from_slice(&total_len.to_be_bytes());
    buf.push(DATA_PACKET);
    buf.extend_from_slice(&payload_len.to_be_bytes());
    buf.extend_from_slice(&command);
}

fn to_u32(field: &'static str, value: usize) -> Result<u32, PacketError> {
    u32::try_from(value).map_err(|_| PacketError::EncodingOverflow { field, value })
}

fn to_u16(field: &'static str, value: usize) -> Result<u16, PacketError> {
    u16::try_from(value).map_err(|_| PacketError::EncodingOverflow { field, value })
}

fn variable_header(name: u8) -> Result<Vec<u8>, PacketError> {
    let mut buf = Vec::with_capacity(56);
    packet_prefix(&mut buf, 0x33, 0x2D, CMD_ANNOUNCE);
    buf.extend_from_slice(&1u16.to_be_bytes());
    buf.push(name);
    buf.extend(parse_hex("variable attributes", VARIABLE_ATTRIBUTES)?);
    Ok(buf)
}

fn variable_data(value: &TiReal) -> Vec<u8> {
    let mut buf = Vec::with_capacity(20);
    packet_prefix(&mut buf, 0x0F, 0x09, CMD_DATA);
    buf.extend_from_slice(&value.to_bytes());
    // The last 4 mantissa digits are always zero.
    buf.extend_from_slice(&[0x00, 0x00]);
    buf
}

fn program_header(title: &ProgramTitle, program_len: usize, replace: bool) -> Result<Vec<u8>, PacketError> {
    let title_len = title.len();
    let size = to_u32("program length", program_len + 2)?;

    let mut buf = Vec::with_capacity(55 + title_len);
    packet_prefix(
        &mut buf,
        to_u32("title length", 50 + title_len)?,
        to_u32("title length", 44 + title_len)?,
        CMD_ANNOUNCE,
    );
    buf.extend_from_slice(&to_u16("title length", title_len)?.to_be_bytes());
    buf.extend_from_slice(title.as_bytes());
    buf.push(0x00);
    buf.extend_from_slice(&size.to_be_bytes());
    buf.push(u8::from(replace));
    buf.extend_from_slice(&[0x00, 0x05, 0x00, 0x01, 0x00, 0x04]);
    buf.extend_from_slice(&size.to_be_bytes());
    buf.extend(parse_hex("program attributes", PROGRAM_ATTRIBUTES)?);
    Ok(buf)
}

fn program_data(program: &[u8]) -> Result<Vec<u8>, PacketError> {
    let length_field = format_length_field(program.len())?;

    let mut buf = Vec::with_capacity(program.len() + 13);
    packet_prefix(
        &mut buf,
        to_u32("program length", program.len() + 8)?,
        to_u32("program length", program.len() + 2)?,
        CMD_DATA,
    );
    buf.extend_from_slice(&length_field);
    buf.extend_from_slice(program);
    Ok(buf)
}

fn read_request(title: &ProgramTitle) -> Result<Vec<u8>, PacketError> {
    let title_len = title.len();

    let mut buf = Vec::with_capacity(45 + title_len);
    packet_prefix(
        &mut buf,
        to_u32("title length", 40 + title_len)?,
        to_u32("title length", 34 + title_len)?,
        CMD_REQUEST,
    );
    buf.extend_from_slice(&to_u16("title length", title_len)?.to_be_bytes());
    buf.extend_from_slice(title.as_bytes());
    buf.extend(parse_hex("read attributes", READ_ATTRIBUTES)?);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::step::{Direction, Expect, TransferMode};

    fn step_hex(seq: &TransactionSequence, index: usize) -> String {
        hex::encode(seq.steps()[index].payload().unwrap())
    }

    // ── format_length_field ─────────────────────────────────────────────────

    #[test]
    fn test_length_field_boundaries() {
        assert_eq!(format_length_field(0).unwrap(), [0x00, 0x00]);
        assert_eq!(format_length_field(0xFF).unwrap(), [0xFF, 0x00]);
        assert_eq!(format_length_field(0x100).unwrap(), [0x10, 0x00]);
        assert_eq!(format_length_field(0xABC).unwrap(), [0xAB, 0x0C]);
        assert_eq!(format_length_field(0xFFF).unwrap(), [0xFF, 0x0F]);
        assert_eq!(format_length_field(0x1000).unwrap(), [0x10, 0x00]);
        assert_eq!(format_length_field(0xFFFF).unwrap(), [0xFF, 0xFF]);
    }

    #[test]
    fn test_length_field_overflow() {
        assert!(matches!(
            format_length_field(0x10000),
            Err(PacketError::EncodingOverflow { value: 0x10000, .. })
        ));
    }

    // ── Variables ───────────────────────────────────────────────────────────

    #[test]
    fn test_variable_name_validation() {
        assert!(PacketRequest::send_variable("A", "1").is_ok());
        assert!(PacketRequest::send_variable(" z ", "1").is_ok());
        assert_eq!(
            PacketRequest::send_variable("AB", "1"),
            Err(PacketError::InvalidVariableName("AB".to_owned()))
        );
        assert!(matches!(
            PacketRequest::send_variable("1", "1"),
            Err(PacketError::InvalidVariableName(_))
        ));
        assert!(matches!(
            PacketRequest::send_variable("", "1"),
            Err(PacketError::InvalidVariableName(_))
        ));
    }

    #[test]
    fn test_variable_value_validation() {
        assert!(matches!(
            PacketRequest::send_variable("A", "abc"),
            Err(PacketError::InvalidVariableValue {
                reason: RealError::InvalidCharacter('a'),
                ..
            })
        ));
        assert!(matches!(
            PacketRequest::send_variable("A", "12345678901"),
            Err(PacketError::InvalidVariableValue { .. })
        ));
    }

    #[test]
    fn test_variable_sequence_is_byte_exact() {
        // Arrange
        let request = PacketRequest::send_variable("a", "42").unwrap();

        // Act
        let seq = request.build().unwrap();

        // Assert
        assert_eq!(seq.len(), 12);
        assert_eq!(
            step_hex(&seq, 0),
            "00000033040000002d000b000141\
             0000000009010005000100040000000900020004f00b0000000300010000410001000008000400000000"
        );
        assert_eq!(step_hex(&seq, 6), "0000000f0400000009000d008142000000000000");
    }

    #[test]
    fn test_variable_fraction_value_data_step() {
        let seq = PacketRequest::send_variable("B", "0.5").unwrap().build().unwrap();
        assert_eq!(step_hex(&seq, 6), "0000000f0400000009000d007f50000000000000");
    }

    // ── Programs ────────────────────────────────────────────────────────────

    #[test]
    fn test_program_sequence_is_byte_exact() {
        // Arrange
        let request = PacketRequest::send_program("q1", "2+2ENTER=", true);

        // Act
        let seq = request.build().unwrap();

        // Assert
        assert_eq!(
            step_hex(&seq, 0),
            "00000034040000002e000b0002513100000000070100050001000400000007\
             00020004f00b0005000300010000410001000008000400000000"
        );
        assert_eq!(step_hex(&seq, 6), "0000000d0400000007000d05003270323f6a");
    }

    #[test]
    fn test_program_create_flag_is_zero() {
        let seq = PacketRequest::send_program("Q1", "2+2ENTER=", false).build().unwrap();
        let header = seq.steps()[0].payload().unwrap();
        // prefix 13 + title len 2 + title 2 + 0x00 + size 4 → flag at 22
        assert_eq!(header[22], 0x00);
        assert_eq!(header.len(), 57);
    }

    #[test]
    fn test_empty_program_is_valid() {
        let seq = PacketRequest::send_program("SEND", "", true).build().unwrap();
        assert_eq!(step_hex(&seq, 6), "000000080400000002000d0000");
    }

    #[test]
    fn test_program_too_long_overflows() {
        let text = "A".repeat(0x10000);
        let err = PacketRequest::send_program("BIG", &text, false).build().unwrap_err();
        assert!(matches!(err, PacketError::EncodingOverflow { value: 0x10000, .. }));
    }

    #[test]
    fn test_transfer_template_shape() {
        let seq = PacketRequest::send_program("X", "1", false).build().unwrap();
        let directions: Vec<Direction> = seq.iter().map(|s| s.direction()).collect();
        use Direction::{In, Out};
        assert_eq!(
            directions,
            vec![Out, In, In, Out, In, Out, Out, In, In, Out, Out, In]
        );
        assert_eq!(seq.steps()[2].expectation(), Some(&Expect::Pattern(READY.to_vec())));
        assert_eq!(seq.steps()[10].payload(), Some(END_OF_TRANSMISSION));
    }

    // ── Reads ───────────────────────────────────────────────────────────────

    #[test]
    fn test_read_sequence_is_byte_exact() {
        let seq = PacketRequest::read_program(" question ").build().unwrap();

        assert_eq!(
            step_hex(&seq, 0),
            "00000030040000002a000c00085155455354494f4e\
             00017fffffff0006000100020003000500080041000100110004f00f00050000"
        );
        assert_eq!(seq.len(), 6);
        assert_eq!(seq.capture_index(), Some(4));
        assert_eq!(seq.steps()[4].mode(), TransferMode::Standard);
        assert_eq!(seq.steps()[2].expectation(), Some(&Expect::Skip));
    }
}
