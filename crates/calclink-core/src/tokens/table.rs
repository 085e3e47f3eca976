//! Character → calculator token translation table.
//!
//! Reference: captured USB traffic of TI-Connect CE program transfers.
//!
//! # How the table is laid out (for beginners)
//!
//! TI-BASIC programs are stored as a sequence of *tokens*, not characters.
//! Uppercase letters, digits, and most punctuation are one byte and happen to
//! reuse the ASCII value for letters and digits.  Lowercase letters and a few
//! symbols live on extended token pages and take two bytes: a page prefix
//! (`0x62`, `0x5E`, or `0xBB`) followed by the index on that page.
//!
//! # Decoding invariant
//!
//! The decoder matches two-byte codes greedily before single bytes.  Only
//! `0xBB` is both a single-byte code (`;`) and a page prefix, so no second
//! byte of a `0xBB xx` code may also be a single-byte code.  Keep it that way
//! when adding entries; `tests::test_every_character_pair_round_trips` in the
//! parent module guards it.

/// Every character the codec understands, with its token bytes.
pub(crate) const TOKEN_TABLE: &[(char, &[u8])] = &[
    // ── Lowercase letters (two-byte tokens) ──────────────────────────────────
    ('a', &[0x62, 0x16]),
    ('b', &[0x62, 0x17]),
    ('c', &[0x62, 0x18]),
    ('d', &[0x62, 0x19]),
    ('e', &[0x62, 0x1A]),
    ('f', &[0xBB, 0xB5]),
    ('g', &[0xBB, 0xB6]),
    ('h', &[0xBB, 0xB7]),
    ('i', &[0xBB, 0xB8]),
    ('j', &[0xBB, 0xB9]),
    ('k', &[0xBB, 0xBA]),
    ('l', &[0xBB, 0xBC]),
    ('m', &[0xBB, 0xBD]),
    ('n', &[0x62, 0x02]),
    ('o', &[0xBB, 0xBF]),
    ('p', &[0x62, 0x22]),
    ('q', &[0xBB, 0xC1]),
    ('r', &[0x62, 0x12]),
    ('s', &[0x62, 0x34]),
    ('t', &[0x62, 0x24]),
    ('u', &[0x5E, 0x80]),
    ('v', &[0x5E, 0x81]),
    ('w', &[0x5E, 0x82]),
    ('x', &[0xBB, 0xC8]),
    ('y', &[0xBB, 0xC9]),
    ('z', &[0x62, 0x23]),
    // ── Uppercase letters (ASCII value) ──────────────────────────────────────
    ('A', &[0x41]),
    ('B', &[0x42]),
    ('C', &[0x43]),
    ('D', &[0x44]),
    ('E', &[0x45]),
    ('F', &[0x46]),
    ('G', &[0x47]),
    ('H', &[0x48]),
    ('I', &[0x49]),
    ('J', &[0x4A]),
    ('K', &[0x4B]),
    ('L', &[0x4C]),
    ('M', &[0x4D]),
    ('N', &[0x4E]),
    ('O', &[0x4F]),
    ('P', &[0x50]),
    ('Q', &[0x51]),
    ('R', &[0x52]),
    ('S', &[0x53]),
    ('T', &[0x54]),
    ('U', &[0x55]),
    ('V', &[0x56]),
    ('W', &[0x57]),
    ('X', &[0x58]),
    ('Y', &[0x59]),
    ('Z', &[0x5A]),
    // ── Digits (ASCII value) ─────────────────────────────────────────────────
    ('0', &[0x30]),
    ('1', &[0x31]),
    ('2', &[0x32]),
    ('3', &[0x33]),
    ('4', &[0x34]),
    ('5', &[0x35]),
    ('6', &[0x36]),
    ('7', &[0x37]),
    ('8', &[0x38]),
    ('9', &[0x39]),
    // ── Common symbols ───────────────────────────────────────────────────────
    (' ', &[0x29]),
    ('\n', &[0x3F]), // tEnter: line break inside a program
    ('.', &[0x3A]),
    (',', &[0x2B]),
    (':', &[0x3E]),
    (';', &[0xBB]),
    ('!', &[0x2D]),
    ('?', &[0xAF]),
    ('\'', &[0xAE]),
    ('"', &[0x2A]),
    ('(', &[0x10]),
    (')', &[0x11]),
    ('[', &[0x06]),
    (']', &[0x07]),
    ('{', &[0x08]),
    ('}', &[0x09]),
    ('+', &[0x70]),
    ('-', &[0x71]),
    ('*', &[0x82]),
    ('/', &[0x83]),
    ('=', &[0x6A]),
    ('<', &[0x6B]),
    ('>', &[0x6C]),
    ('^', &[0xF0]),
    // ── Extended symbols (0xBB page) ─────────────────────────────────────────
    ('`', &[0xBB, 0xD5]),
    ('~', &[0xBB, 0xCF]),
    ('@', &[0xBB, 0xD1]),
    ('#', &[0xBB, 0xD2]),
    ('$', &[0xBB, 0xD3]),
    ('%', &[0xBB, 0xDA]),
    ('&', &[0xBB, 0xD4]),
    ('_', &[0xBB, 0xD9]),
    ('\\', &[0xBB, 0xD7]),
    ('|', &[0xBB, 0xD8]),
];
