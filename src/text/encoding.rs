//! # Input Encoding Detection
//!
//! Recovers readable text from bytes whose encoding is unknown. Pipes from
//! other applications (and Windows consoles in particular) deliver text as
//! UTF-8, UTF-16 or a legacy Cyrillic code page without saying which.
//!
//! ## Detection order:
//! 1. **BOM sniffing**: UTF-8, UTF-16LE, UTF-16BE byte-order marks
//! 2. **UTF-16 heuristic**: more than 20% zero bytes, no BOM
//! 3. **Scored candidates**: UTF-8, Windows-1251, CP866 ranked by Cyrillic characters
//! 4. **Fallback**: strict UTF-8, then lossy UTF-8 (never fails)

use encoding_rs::{Encoding, IBM866, UTF_16BE, UTF_16LE, WINDOWS_1251};
use std::borrow::Cow;
use std::fmt;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];
pub(crate) const UTF16LE_BOM: &[u8] = &[0xFF, 0xFE];
pub(crate) const UTF16BE_BOM: &[u8] = &[0xFE, 0xFF];

/// Share of zero bytes above which a BOM-less buffer is tried as UTF-16.
pub(crate) const UTF16_ZERO_RATIO: f64 = 0.2;

/// How many leading characters must contain something printable for a
/// UTF-16 guess to be accepted.
const UTF16_SAMPLE_CHARS: usize = 100;

/// The encoding a buffer was decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectedEncoding {
    /// UTF-8 introduced by a byte-order mark
    Utf8Bom,
    Utf16Le,
    Utf16Be,
    Utf8,
    Windows1251,
    Cp866,
    /// UTF-8 with invalid sequences replaced by U+FFFD
    Utf8Lossy,
}

impl DetectedEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            DetectedEncoding::Utf8Bom => "utf-8-sig",
            DetectedEncoding::Utf16Le => "utf-16-le",
            DetectedEncoding::Utf16Be => "utf-16-be",
            DetectedEncoding::Utf8 => "utf-8",
            DetectedEncoding::Windows1251 => "windows-1251",
            DetectedEncoding::Cp866 => "cp866",
            DetectedEncoding::Utf8Lossy => "utf-8 (lossy)",
        }
    }
}

impl fmt::Display for DetectedEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of decoding one buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub encoding: DetectedEncoding,
    pub text: String,
}

impl Decoded {
    fn new(encoding: DetectedEncoding, text: impl Into<String>) -> Self {
        Self {
            encoding,
            text: text.into(),
        }
    }
}

/// Stateless detector over raw byte buffers.
pub struct EncodingDetector;

impl EncodingDetector {
    /// Decode `bytes` with the most plausible encoding.
    ///
    /// Pure function; the lossy fallback guarantees a result for any input.
    pub fn decode(bytes: &[u8]) -> Decoded {
        if bytes.is_empty() {
            return Decoded::new(DetectedEncoding::Utf8, String::new());
        }

        if let Some(decoded) = Self::sniff_bom(bytes) {
            return decoded;
        }

        if let Some(decoded) = Self::guess_utf16(bytes) {
            return decoded;
        }

        if let Some(decoded) = Self::best_candidate(bytes) {
            return decoded;
        }

        match std::str::from_utf8(bytes) {
            Ok(text) => Decoded::new(DetectedEncoding::Utf8, text),
            Err(_) => Decoded::new(
                DetectedEncoding::Utf8Lossy,
                String::from_utf8_lossy(bytes).into_owned(),
            ),
        }
    }

    fn sniff_bom(bytes: &[u8]) -> Option<Decoded> {
        if let Some(rest) = bytes.strip_prefix(UTF8_BOM) {
            if let Ok(text) = std::str::from_utf8(rest) {
                return Some(Decoded::new(DetectedEncoding::Utf8Bom, text));
            }
        }
        if let Some(rest) = bytes.strip_prefix(UTF16LE_BOM) {
            if let Some(text) = strict(UTF_16LE, rest) {
                return Some(Decoded::new(DetectedEncoding::Utf16Le, text));
            }
        }
        if let Some(rest) = bytes.strip_prefix(UTF16BE_BOM) {
            if let Some(text) = strict(UTF_16BE, rest) {
                return Some(Decoded::new(DetectedEncoding::Utf16Be, text));
            }
        }
        None
    }

    fn guess_utf16(bytes: &[u8]) -> Option<Decoded> {
        let zeros = bytes.iter().filter(|&&b| b == 0).count();
        if (zeros as f64) / (bytes.len() as f64) <= UTF16_ZERO_RATIO {
            return None;
        }

        for (encoding, detected) in [
            (UTF_16LE, DetectedEncoding::Utf16Le),
            (UTF_16BE, DetectedEncoding::Utf16Be),
        ] {
            if let Some(text) = strict(encoding, bytes) {
                let printable = text
                    .chars()
                    .take(UTF16_SAMPLE_CHARS)
                    .any(|c| !c.is_whitespace() && !c.is_control());
                if printable {
                    return Some(Decoded::new(detected, text));
                }
            }
        }
        None
    }

    /// Rank UTF-8 and the Cyrillic code pages by how many Cyrillic-block
    /// characters each decoding yields. Earlier candidates win ties.
    ///
    /// A candidate that is Cyrillic apart from whitespace is taken at once.
    /// Otherwise the highest score wins, even over valid UTF-8: two-byte
    /// UTF-8 Cyrillic mixed with punctuation reads as more Cyrillic under
    /// Windows-1251. Stream payloads are base64 UTF-8 and never get here.
    fn best_candidate(bytes: &[u8]) -> Option<Decoded> {
        let mut best: Option<(usize, Decoded)> = None;

        let candidates: [(DetectedEncoding, Option<Cow<'_, str>>); 3] = [
            (
                DetectedEncoding::Utf8,
                std::str::from_utf8(bytes).ok().map(Cow::Borrowed),
            ),
            (DetectedEncoding::Windows1251, strict(WINDOWS_1251, bytes)),
            (DetectedEncoding::Cp866, strict(IBM866, bytes)),
        ];

        for (encoding, text) in candidates {
            let Some(text) = text else { continue };
            let score = cyrillic_score(&text);
            let non_whitespace = text.chars().filter(|c| !c.is_whitespace()).count();

            if score == non_whitespace {
                return Some(Decoded::new(encoding, text));
            }
            if best.as_ref().map_or(true, |(best_score, _)| score > *best_score) {
                best = Some((score, Decoded::new(encoding, text)));
            }
        }

        best.map(|(score, decoded)| {
            tracing::trace!(encoding = %decoded.encoding, score, "selected scored candidate");
            decoded
        })
    }
}

/// Decode without BOM handling; `None` on any malformed sequence.
fn strict<'a>(encoding: &'static Encoding, bytes: &'a [u8]) -> Option<Cow<'a, str>> {
    encoding.decode_without_bom_handling_and_without_replacement(bytes)
}

/// Count of characters in the Cyrillic block U+0400..=U+04FF.
pub fn cyrillic_score(text: &str) -> usize {
    text.chars()
        .filter(|c| ('\u{0400}'..='\u{04FF}').contains(c))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf16le(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(|u| u.to_le_bytes()).collect()
    }

    fn utf16be(text: &str) -> Vec<u8> {
        text.encode_utf16().flat_map(|u| u.to_be_bytes()).collect()
    }

    #[test]
    fn test_empty_buffer_is_empty_utf8() {
        let decoded = EncodingDetector::decode(b"");
        assert_eq!(decoded.encoding, DetectedEncoding::Utf8);
        assert_eq!(decoded.text, "");
    }

    #[test]
    fn test_ascii_decodes_as_utf8() {
        for sample in ["hello", "Hello, world! 123", "  spaced  ", "a|b?c\t"] {
            let decoded = EncodingDetector::decode(sample.as_bytes());
            assert_eq!(decoded.text, sample);
            assert_eq!(decoded.encoding, DetectedEncoding::Utf8);
        }
    }

    #[test]
    fn test_utf16le_with_bom() {
        let mut bytes = UTF16LE_BOM.to_vec();
        bytes.extend(utf16le("Привет, мир"));
        let decoded = EncodingDetector::decode(&bytes);
        assert_eq!(decoded.encoding.name(), "utf-16-le");
        assert_eq!(decoded.text, "Привет, мир");
    }

    #[test]
    fn test_utf16be_with_bom() {
        let mut bytes = UTF16BE_BOM.to_vec();
        bytes.extend(utf16be("Hi"));
        let decoded = EncodingDetector::decode(&bytes);
        assert_eq!(decoded.encoding, DetectedEncoding::Utf16Be);
        assert_eq!(decoded.text, "Hi");
    }

    #[test]
    fn test_utf8_bom_is_consumed() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("текст".as_bytes());
        let decoded = EncodingDetector::decode(&bytes);
        assert_eq!(decoded.encoding, DetectedEncoding::Utf8Bom);
        assert_eq!(decoded.text, "текст");
    }

    #[test]
    fn test_utf16_without_bom_by_zero_ratio() {
        let decoded = EncodingDetector::decode(&utf16le("speech synthesis"));
        assert_eq!(decoded.encoding, DetectedEncoding::Utf16Le);
        assert_eq!(decoded.text, "speech synthesis");
    }

    #[test]
    fn test_utf16be_without_bom_falls_back_when_le_is_unprintable() {
        // Read little-endian, the first unit is a lone surrogate.
        let bytes = [0x00, 0xD8, 0x00, 0x41];
        let decoded = EncodingDetector::decode(&bytes);
        assert_eq!(decoded.encoding, DetectedEncoding::Utf16Be);
        assert_eq!(decoded.text, "\u{D8}A");
    }

    #[test]
    fn test_windows_1251_cyrillic() {
        let (bytes, _, _) = WINDOWS_1251.encode("Привет мир");
        assert!(std::str::from_utf8(&bytes).is_err());
        assert!(!bytes.contains(&0));

        let decoded = EncodingDetector::decode(&bytes);
        assert_eq!(decoded.encoding, DetectedEncoding::Windows1251);
        assert_eq!(decoded.text, "Привет мир");
    }

    #[test]
    fn test_windows_1251_with_punctuation_beats_cp866() {
        let (bytes, _, _) = WINDOWS_1251.encode("Съешь же ещё этих булок, да выпей чаю!");
        let decoded = EncodingDetector::decode(&bytes);
        assert_eq!(decoded.encoding, DetectedEncoding::Windows1251);
        assert_eq!(decoded.text, "Съешь же ещё этих булок, да выпей чаю!");
    }

    #[test]
    fn test_cp866_cyrillic() {
        let (bytes, _, _) = IBM866.encode("ДОБРЫЙ ДЕНЬ");
        let decoded = EncodingDetector::decode(&bytes);
        // Upper-case CP866 letters land on Windows-1251 punctuation and symbols,
        // so only the OEM page decodes them as a fully Cyrillic string.
        assert_eq!(decoded.encoding, DetectedEncoding::Cp866);
        assert_eq!(decoded.text, "ДОБРЫЙ ДЕНЬ");
    }

    #[test]
    fn test_all_cyrillic_utf8_short_circuits() {
        let decoded = EncodingDetector::decode("Привет мир".as_bytes());
        assert_eq!(decoded.encoding, DetectedEncoding::Utf8);
        assert_eq!(decoded.text, "Привет мир");
    }

    #[test]
    fn test_higher_scoring_code_page_beats_valid_utf8() {
        // UTF-8 "и x" has one Cyrillic letter; read as Windows-1251 it has two.
        let bytes = [0xD0, 0xB8, 0x20, 0x78];
        assert_eq!(std::str::from_utf8(&bytes).unwrap(), "и x");

        let decoded = EncodingDetector::decode(&bytes);
        assert_eq!(decoded.encoding, DetectedEncoding::Windows1251);
        assert_eq!(decoded.text, "Рё x");
    }

    #[test]
    fn test_utf8_wins_ties_with_code_pages() {
        // Windows-1251 reads D0 B0 as "Р°", one letter, the same as UTF-8.
        let bytes = "а x".as_bytes();
        let decoded = EncodingDetector::decode(bytes);
        assert_eq!(decoded.encoding, DetectedEncoding::Utf8);
        assert_eq!(decoded.text, "а x");
    }

    #[test]
    fn test_cyrillic_score_counts_block_only() {
        assert_eq!(cyrillic_score("abc"), 0);
        assert_eq!(cyrillic_score("аб в!"), 3);
        assert_eq!(cyrillic_score("Ёё"), 2);
    }
}
