//! Fixed handshake sequences captured from TI-Connect CE sessions.
//!
//! These sequences never change with user input, so they are stored in hex
//! wire notation exactly as they appear in the capture and parsed on demand.
//! The packet builder reuses the short control packets below as byte
//! constants.

use std::time::Duration;

use crate::protocol::packet::PacketError;
use crate::protocol::step::{TransactionSequence, TransactionStep};
use crate::protocol::wire::parse_hex;

// ── Control packets ───────────────────────────────────────────────────────────

/// Acknowledgement, sent and received after almost every packet.
pub const ACK: &[u8] = &[0x00, 0x00, 0x00, 0x02, 0x05, 0xE0, 0x00];

/// "Ready to receive", sent by the calculator after a transfer header.
pub const READY: &[u8] = &[
    0x00, 0x00, 0x00, 0x0A, 0x04, 0x00, 0x00, 0x00, 0x04, 0xBB, 0x00, 0x00, 0x07, 0x53, 0x00,
];

/// "Continue" / "complete", sent by the calculator around the data packet.
pub const CONTINUE: &[u8] = &[
    0x00, 0x00, 0x00, 0x07, 0x04, 0x00, 0x00, 0x00, 0x01, 0xAA, 0x00, 0x01,
];

/// End of transmission.  Also the calculator's last packet in a listing.
pub const END_OF_TRANSMISSION: &[u8] = &[
    0x00, 0x00, 0x00, 0x06, 0x04, 0x00, 0x00, 0x00, 0x00, 0xDD, 0x00,
];

/// Byte run present in every program-listing entry.
pub const LIST_MARKER: &[u8] = &[
    0x00, 0x05, 0x00, 0x03, 0x00, 0x00, 0x01, 0x00, 0x00, 0x05, 0x01, 0x00, 0x08, 0x00, 0x00,
    0x04, 0x00, 0x00, 0x00,
];

/// Pre-step delay of every exit-exam-mode step.
pub const EXIT_EXAM_DELAY: Duration = Duration::from_millis(100);

// ── Preset tables ─────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Kind {
    Out,
    Expect,
    Skip,
}

#[derive(Clone, Copy)]
struct PresetStep {
    kind: Kind,
    hex: &'static str,
    description: &'static str,
}

const fn out(hex: &'static str, description: &'static str) -> PresetStep {
    PresetStep {
        kind: Kind::Out,
        hex,
        description,
    }
}

const fn expect(hex: &'static str, description: &'static str) -> PresetStep {
    PresetStep {
        kind: Kind::Expect,
        hex,
        description,
    }
}

const fn skip(description: &'static str) -> PresetStep {
    PresetStep {
        kind: Kind::Skip,
        hex: "",
        description,
    }
}

const ACK_HEX: &str = "0000000205e000";

const INIT_HANDSHAKE: &[PresetStep] = &[
    out("000000040100000400", "initialization"),
    expect("0000000402000003ff", "init response"),
    out("00000010040000000a0001000300010000000007d5", "capability request"),
    expect(ACK_HEX, "ack"),
    expect("0000000a04000000040012000007d5", "capability data"),
    out(ACK_HEX, "ack"),
    out("0000000a040000000400070001000a", "device info request"),
    expect(ACK_HEX, "ack"),
    expect("0000000e040000000800080001000a00000101", "device info"),
    out(ACK_HEX, "ack"),
    out(
        "00000024040000001e0007000e000800190023002d003700380012000c0011000f001e001f001d0000",
        "variable type request",
    ),
    expect(ACK_HEX, "ack"),
    expect(
        "00000075040000006f0008000e00080000020073001900000101002301002d00000101003700000101\
         00380000010000120000080000000000310000000c000008000000000004000000110000080000000000\
         132b47000f0000080000000000400000001e0000020140001f00000200f0001d00000110000001",
        "variable info",
    ),
    out(ACK_HEX, "ack"),
    out(
        "00000020040000001a0007000c00010004000600070009000b002d001b00480049004b005d",
        "program type request",
    ),
    expect(ACK_HEX, "ack"),
    expect(
        "0000005c04000000560008000c00010000040000001300040000020007000600000109000700000101\
         000900000400050601000b00000400050700002d00000101001b000001010048000002001100490000\
         020006004b00000100005d00000101",
        "program info",
    ),
    out(ACK_HEX, "final ack"),
];

const EXIT_EXAM_MODE: &[PresetStep] = &[
    out("000000060400000000dd00", "exit exam mode"),
    expect(ACK_HEX, "confirm exit"),
];

const LIST_PROGRAMS_INITIAL: &[PresetStep] = &[
    out(
        "00000023040000001d00090000000900010002000300050008004100800081000400010001000101",
        "directory listing request",
    ),
    expect(ACK_HEX, "ack"),
    expect("0000000a0400000004bb0000075300", "listing ready"),
    out(ACK_HEX, "ack"),
];

const LIST_PROGRAMS_FINAL: &[PresetStep] = &[
    out(ACK_HEX, "ack"),
    out(
        "00000014040000000e0007000600060007000e000c0011000f",
        "listing close request",
    ),
    expect(ACK_HEX, "ack"),
    skip("listing close response"),
    out(ACK_HEX, "ack"),
];

fn build(name: &str, table: &[PresetStep], delay: Duration) -> Result<TransactionSequence, PacketError> {
    table
        .iter()
        .enumerate()
        .map(|(index, preset)| {
            let context = format!("{name} step {index} ({})", preset.description);
            let step = match preset.kind {
                Kind::Out => TransactionStep::out(parse_hex(&context, preset.hex)?, preset.description),
                Kind::Expect => TransactionStep::expect(parse_hex(&context, preset.hex)?, preset.description),
                Kind::Skip => TransactionStep::skip(preset.description),
            };
            Ok(step.with_delay(delay))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(TransactionSequence::new)
}

// ── Public API ────────────────────────────────────────────────────────────────

/// The 18-step session handshake: init, capabilities, device info, variable
/// types, program types.
pub fn init_handshake() -> Result<TransactionSequence, PacketError> {
    build("init handshake", INIT_HANDSHAKE, Duration::ZERO)
}

/// Leaves exam ("press-to-test") mode.
pub fn exit_exam_mode() -> Result<TransactionSequence, PacketError> {
    build("exit exam mode", EXIT_EXAM_MODE, EXIT_EXAM_DELAY)
}

/// Opens a program directory listing.
pub fn list_programs_initial() -> Result<TransactionSequence, PacketError> {
    build("list programs (initial)", LIST_PROGRAMS_INITIAL, Duration::ZERO)
}

/// Closes a program directory listing.
pub fn list_programs_final() -> Result<TransactionSequence, PacketError> {
    build("list programs (final)", LIST_PROGRAMS_FINAL, Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::step::{Direction, Expect};

    #[test]
    fn test_all_presets_parse() {
        assert_eq!(init_handshake().unwrap().len(), 18);
        assert_eq!(exit_exam_mode().unwrap().len(), 2);
        assert_eq!(list_programs_initial().unwrap().len(), 4);
        assert_eq!(list_programs_final().unwrap().len(), 5);
    }

    #[test]
    fn test_control_constants_match_hex_notation() {
        assert_eq!(ACK, parse_hex("ack", ACK_HEX).unwrap().as_slice());
        assert_eq!(READY, parse_hex("ready", "0000000a0400000004bb0000075300").unwrap().as_slice());
        assert_eq!(CONTINUE, parse_hex("continue", "000000070400000001aa0001").unwrap().as_slice());
        assert_eq!(
            END_OF_TRANSMISSION,
            parse_hex("end", "000000060400000000dd00").unwrap().as_slice()
        );
        assert_eq!(
            LIST_MARKER,
            parse_hex("marker", "00050003000001000005010008000004000000").unwrap().as_slice()
        );
    }

    #[test]
    fn test_init_handshake_long_payloads_have_declared_length() {
        // The first u32 of a data packet is the byte count after the 5-byte
        // prefix (u32 length + packet type).
        let seq = init_handshake().unwrap();
        for step in seq.iter() {
            let bytes = match step.expectation() {
                Some(Expect::Pattern(p)) => p.as_slice(),
                _ => step.payload().unwrap_or(&[]),
            };
            if bytes.len() > 7 {
                let declared = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
                assert_eq!(declared + 5, bytes.len(), "step {:?}", step.description());
            }
        }
    }

    #[test]
    fn test_exit_exam_mode_steps_are_delayed() {
        // Arrange
        let seq = exit_exam_mode().unwrap();

        // Act
        let delays: Vec<Duration> = seq.iter().map(|s| s.delay()).collect();

        // Assert
        assert_eq!(delays, vec![EXIT_EXAM_DELAY, EXIT_EXAM_DELAY]);
        assert_eq!(seq.steps()[0].payload(), Some(END_OF_TRANSMISSION));
    }

    #[test]
    fn test_list_final_skips_close_response() {
        let seq = list_programs_final().unwrap();
        assert_eq!(seq.steps()[3].direction(), Direction::In);
        assert_eq!(seq.steps()[3].expectation(), Some(&Expect::Skip));
    }
}
