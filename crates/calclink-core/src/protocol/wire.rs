//! Hex wire notation used for the captured handshake payloads.
//!
//! Payloads are written the way they appear in a USB capture dump: pairs of
//! hex digits, either case, optionally separated by whitespace.

use crate::protocol::packet::PacketError;

/// Parses a hex payload, ignoring whitespace.
///
/// `context` names the payload in the error so a typo in a preset can be
/// traced back to the step it belongs to.
///
/// # Errors
///
/// Returns [`PacketError::MalformedHex`] on an odd digit count or a non-hex
/// character.
///
/// # Examples
///
/// ```rust
/// use calclink_core::protocol::parse_hex;
///
/// assert_eq!(parse_hex("ack", "0000 0002 05E0 00").unwrap(), vec![0, 0, 0, 2, 5, 0xE0, 0]);
/// ```
pub fn parse_hex(context: &str, text: &str) -> Result<Vec<u8>, PacketError> {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(compact).map_err(|source| PacketError::MalformedHex {
        context: context.to_owned(),
        source,
    })
}
