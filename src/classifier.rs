//! Partition Key Classifier
//!
//! Maps a recording name to a single canonical symbol in the 36-symbol
//! sharding alphabet (`0`-`9`, `a`-`z`). The mapping is deterministic,
//! case-insensitive and accent-insensitive, so that visually similar
//! titles land in the same bucket regardless of locale-specific
//! capitalization or accenting.
//!
//! The function is total over arbitrary byte sequences, including empty
//! input and truncated multi-byte encodings. It is implemented as an
//! iterative state machine over a byte cursor rather than recursion, so
//! adversarial input cannot grow the stack.

/// The fixed sharding alphabet. Total order over symbols equals sequence
/// order. Immutable for the process lifetime.
pub const ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Number of symbols in [`ALPHABET`].
pub const ALPHABET_LEN: usize = 36;

/// Position of a symbol within [`ALPHABET`], if it is one.
pub fn alphabet_index(symbol: u8) -> Option<usize> {
    match symbol {
        b'0'..=b'9' => Some((symbol - b'0') as usize),
        b'a'..=b'z' => Some((symbol - b'a') as usize + 10),
        _ => None,
    }
}

/// Derive the partition key for a recording name.
///
/// The leading path separator and one `%` escape marker (used by
/// recorders to mark "hidden" entries) are skipped if a further byte
/// follows. The first classifiable character decides the key:
///
/// - ASCII digits and lowercase letters map to themselves
/// - ASCII uppercase letters are lowercased
/// - Accented Latin-1 supplement letters fold onto their base letter
///   (`é` → `e`, `ö` → `o`, `ß` → `s`, ...)
/// - unmapped or undecodable sequences are skipped and classification
///   continues on the remainder
///
/// Returns `'0'` when the input ends without a classifiable character.
pub fn classify(name: &[u8]) -> u8 {
    let mut i = 0;

    if name.first() == Some(&b'/') && name.len() > 1 {
        i += 1;
    }
    if name.get(i) == Some(&b'%') && name.len() > i + 1 {
        i += 1;
    }

    while i < name.len() {
        let b = name[i];
        match b {
            0x00 => return b'0',
            b'0'..=b'9' | b'a'..=b'z' => return b,
            b'A'..=b'Z' => return b + 32,
            // U+0080..U+00BF: punctuation and symbols, never letters
            0xC2 => i += 2,
            // U+00C0..U+00FF: accented Latin letters
            0xC3 => match name.get(i + 1) {
                Some(&c) => match c {
                    0x80..=0x86 | 0xA0..=0xA6 => return b'a',
                    0x87 | 0xA7 => return b'c',
                    0x88..=0x8B | 0xA8..=0xAB => return b'e',
                    0x8C..=0x8F | 0xAC..=0xAF => return b'i',
                    0x90 | 0xB0 => return b'd',
                    0x91 | 0xB1 => return b'n',
                    0x92..=0x96 | 0xB2..=0xB6 => return b'o',
                    0x98 | 0xB8 => return b'o',
                    0x99..=0x9C | 0xB9..=0xBC => return b'u',
                    0x9D | 0xBD => return b'y',
                    0x9E | 0xBE => return b't',
                    0x9F => return b's',
                    0xBF => return b'y',
                    // 0x97 / 0xB7 are the multiplication and division
                    // signs; no base letter exists, skip the character.
                    _ => i += 2,
                },
                None => return b'0',
            },
            // multi-byte sequences outside the transliteration table:
            // skip the whole encoded character and keep scanning
            0xC4..=0xDF => i += 2,
            0xE0..=0xEF => i += 3,
            0xF0..=0xF4 => i += 4,
            // separators, punctuation, stray continuation bytes
            _ => i += 1,
        }
    }

    b'0'
}

/// Convenience wrapper over [`classify`] for string input.
pub fn classify_str(name: &str) -> u8 {
    classify(name.as_bytes())
}
