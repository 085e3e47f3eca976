//! Parsers for calculator responses.

use crate::tokens::TokenCodec;

/// Bytes preceding the token stream in a captured program read, and the
/// title field in a listing entry.
pub const RESPONSE_HEADER_LEN: usize = 13;

/// Attribute bytes following the title in a listing entry.
pub const LISTING_TRAILER_LEN: usize = 54;

/// Decodes the content of a program read.
///
/// The first [`RESPONSE_HEADER_LEN`] bytes are packet framing; the rest is
/// decoded with the shared token codec.  Empty or header-only input yields an
/// empty string.
pub fn parse_program_content(bytes: &[u8]) -> String {
    match bytes.get(RESPONSE_HEADER_LEN..) {
        Some(tokens) => TokenCodec::shared().decode(tokens),
        None => String::new(),
    }
}

/// Extracts program titles from raw listing entries.
///
/// Each entry is framed by a [`RESPONSE_HEADER_LEN`]-byte prefix and a
/// [`LISTING_TRAILER_LEN`]-byte suffix; what lies between is the ASCII title.
/// An entry too short for both trims yields `""`.  A title that is not ASCII
/// yields `"<Error decoding: ...>"` so the caller still sees one string per
/// entry.
pub fn parse_program_titles<B: AsRef<[u8]>>(entries: &[B]) -> Vec<String> {
    entries.iter().map(|e| parse_title(e.as_ref())).collect()
}

fn parse_title(entry: &[u8]) -> String {
    let end = entry.len().saturating_sub(LISTING_TRAILER_LEN);
    let Some(title) = entry.get(RESPONSE_HEADER_LEN..end) else {
        return String::new();
    };

    match title.iter().position(|b| !b.is_ascii()) {
        None => title.iter().map(|&b| b as char).collect(),
        Some(offset) => format!(
            "<Error decoding: byte 0x{:02x} at offset {offset} is not ASCII>",
            title[offset]
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing_entry(title: &[u8]) -> Vec<u8> {
        let mut entry = vec![0xAA; RESPONSE_HEADER_LEN];
        entry.extend_from_slice(title);
        entry.extend(std::iter::repeat(0x00).take(LISTING_TRAILER_LEN));
        entry
    }

    #[test]
    fn test_content_of_empty_response_is_empty() {
        assert_eq!(parse_program_content(&[]), "");
    }

    #[test]
    fn test_content_shorter_than_header_is_empty() {
        assert_eq!(parse_program_content(&[0x00; 5]), "");
    }

    #[test]
    fn test_content_skips_header_and_decodes_tokens() {
        // Arrange
        let mut response = vec![0x00; RESPONSE_HEADER_LEN];
        response.extend_from_slice(&[0x53, 0x45, 0x4E, 0x44]);

        // Act
        let text = parse_program_content(&response);

        // Assert
        assert_eq!(text, "SEND");
    }

    #[test]
    fn test_titles_are_trimmed_from_both_ends() {
        let entries = vec![listing_entry(b"SEND"), listing_entry(b"QUESTION")];
        assert_eq!(parse_program_titles(&entries), vec!["SEND", "QUESTION"]);
    }

    #[test]
    fn test_non_ascii_title_is_marked() {
        let entries = vec![listing_entry(&[0x41, 0xFF])];
        let titles = parse_program_titles(&entries);
        assert!(titles[0].starts_with("<Error decoding:"), "{}", titles[0]);
    }

    #[test]
    fn test_short_entry_yields_empty_title() {
        let entries: Vec<Vec<u8>> = vec![vec![0x00; 20], Vec::new()];
        assert_eq!(parse_program_titles(&entries), vec!["", ""]);
    }
}
