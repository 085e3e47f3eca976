//! Bidirectional text codec between ASCII and calculator tokens.
//!
//! The forward direction is used when a program is written to the calculator;
//! the reverse direction turns a program read back from the calculator into
//! text.  Neither direction fails: unknown characters are skipped on encode,
//! unknown bytes become `?` on decode.

mod table;

use std::collections::HashMap;
use std::sync::OnceLock;

use tracing::warn;

use table::TOKEN_TABLE;

/// Literal marker that callers use to write a line break in a single-line
/// message.  It is replaced by `\n` before encoding.
pub const NEWLINE_MARKER: &str = "ENTER";

/// Placeholder emitted for bytes that match no token.
pub const UNKNOWN_TOKEN: char = '?';

/// Token lookup tables in both directions.
///
/// Built once per process from the static table and shared read-only; obtain
/// it with [`TokenCodec::shared`].
#[derive(Debug)]
pub struct TokenCodec {
    forward: HashMap<char, &'static [u8]>,
    single: HashMap<u8, char>,
    pair: HashMap<[u8; 2], char>,
}

static SHARED: OnceLock<TokenCodec> = OnceLock::new();

impl TokenCodec {
    /// Returns the process-wide codec, building it on first use.
    pub fn shared() -> &'static TokenCodec {
        SHARED.get_or_init(TokenCodec::build)
    }

    fn build() -> Self {
        let mut forward = HashMap::with_capacity(TOKEN_TABLE.len());
        let mut single = HashMap::new();
        let mut pair = HashMap::new();

        for &(ch, codes) in TOKEN_TABLE {
            forward.insert(ch, codes);
            match *codes {
                [b] => {
                    single.insert(b, ch);
                }
                [a, b] => {
                    pair.insert([a, b], ch);
                }
                _ => warn!("token for {ch:?} has {} bytes; only the encoder will use it", codes.len()),
            }
        }

        Self {
            forward,
            single,
            pair,
        }
    }

    /// Returns the token bytes for `ch`, or `None` if the table has no entry.
    pub fn token_for(&self, ch: char) -> Option<&'static [u8]> {
        self.forward.get(&ch).copied()
    }

    /// Encodes `text` into calculator tokens.
    ///
    /// Every occurrence of [`NEWLINE_MARKER`] is first replaced by a line
    /// break.  Characters without a token are skipped and logged.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use calclink_core::TokenCodec;
    ///
    /// let bytes = TokenCodec::shared().encode("2+2ENTER=");
    /// assert_eq!(bytes, vec![0x32, 0x70, 0x32, 0x3F, 0x6A]);
    /// ```
    pub fn encode(&self, text: &str) -> Vec<u8> {
        let text = text.replace(NEWLINE_MARKER, "\n");
        let mut out = Vec::with_capacity(text.len() * 2);

        for ch in text.chars() {
            match self.token_for(ch) {
                Some(codes) => out.extend_from_slice(codes),
                None => warn!("no calculator token for character {ch:?}, skipping"),
            }
        }
        out
    }

    /// Decodes calculator tokens back into text.
    ///
    /// Two-byte tokens are tried first, then single bytes; anything else
    /// becomes [`UNKNOWN_TOKEN`] and the decoder advances one byte.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use calclink_core::TokenCodec;
    ///
    /// let text = TokenCodec::shared().decode(&[0x48, 0xBB, 0xB8, 0x00]);
    /// assert_eq!(text, "Hi?");
    /// ```
    pub fn decode(&self, bytes: &[u8]) -> String {
        let mut out = String::with_capacity(bytes.len());
        let mut i = 0;

        while i < bytes.len() {
            if let Some(&[a, b]) = bytes.get(i..i + 2) {
                if let Some(&ch) = self.pair.get(&[a, b]) {
                    out.push(ch);
                    i += 2;
                    continue;
                }
            }

            out.push(self.single.get(&bytes[i]).copied().unwrap_or(UNKNOWN_TOKEN));
            i += 1;
        }
        out
    }

    /// Iterates over every character the codec can encode.
    pub fn characters(&self) -> impl Iterator<Item = char> + '_ {
        TOKEN_TABLE.iter().map(|&(ch, _)| ch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_table_character_round_trips() {
        let codec = TokenCodec::shared();
        for ch in codec.characters() {
            let encoded = codec.encode(&ch.to_string());
            assert_eq!(codec.decode(&encoded), ch.to_string(), "char {ch:?}");
        }
    }

    #[test]
    fn test_every_character_pair_round_trips() {
        // Guards the decoding invariant described in `table.rs`.
        let codec = TokenCodec::shared();
        let chars: Vec<char> = codec.characters().collect();
        for &a in &chars {
            for &b in &chars {
                let text: String = [a, b].iter().collect();
                assert_eq!(codec.decode(&codec.encode(&text)), text, "pair {text:?}");
            }
        }
    }

    #[test]
    fn test_sentence_round_trips() {
        // Arrange
        let codec = TokenCodec::shared();
        let text = "What is 2+2? (x^2 = y_1) #tag @me 50% ~ok; \"quoted\" 'single' [a]{b}|c\\d`e$&";

        // Act
        let decoded = codec.decode(&codec.encode(text));

        // Assert
        assert_eq!(decoded, text);
    }

    #[test]
    fn test_encode_replaces_newline_marker() {
        let codec = TokenCodec::shared();
        assert_eq!(codec.encode("2+2ENTER="), vec![0x32, 0x70, 0x32, 0x3F, 0x6A]);
    }

    #[test]
    fn test_encode_skips_unmapped_characters() {
        let codec = TokenCodec::shared();
        assert_eq!(codec.encode("A\té"), vec![0x41]);
    }

    #[test]
    fn test_encode_lowercase_uses_two_byte_tokens() {
        let codec = TokenCodec::shared();
        assert_eq!(codec.encode("hi"), vec![0xBB, 0xB7, 0xBB, 0xB8]);
    }

    #[test]
    fn test_decode_unknown_byte_yields_placeholder() {
        let codec = TokenCodec::shared();
        assert_eq!(codec.decode(&[0x00, 0x41, 0xFF]), "?A?");
    }

    #[test]
    fn test_decode_lone_page_prefix_falls_back_to_single_byte() {
        // 0xBB alone is ';'; followed by a non-page byte it must not swallow it.
        let codec = TokenCodec::shared();
        assert_eq!(codec.decode(&[0xBB, 0x41]), ";A");
        assert_eq!(codec.decode(&[0xBB]), ";");
    }

    #[test]
    fn test_decode_truncated_two_byte_token_degrades() {
        // 0x62 is only ever a page prefix; on its own it is unknown.
        let codec = TokenCodec::shared();
        assert_eq!(codec.decode(&[0x41, 0x62]), "A?");
    }

    #[test]
    fn test_decode_empty_input_is_empty() {
        assert_eq!(TokenCodec::shared().decode(&[]), "");
    }
}
