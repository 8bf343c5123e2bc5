//! Caller-side handling of decoded input text.
//!
//! `EncodingDetector` answers "which encoding is this". This module answers
//! the two follow-up questions for text read from stdin: is there a stray
//! BOM left, and did the characters already die upstream (a console that
//! replaced everything it could not encode with `?` before the bytes ever
//! reached us).

use super::encoding::{DetectedEncoding, EncodingDetector};

const BOM: char = '\u{FEFF}';

/// Problems with input that decoded fine but is still unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputDiagnostic {
    /// Text is only `?` and whitespace and the raw bytes carried literal
    /// `?` bytes: the terminal or pipe destroyed the original characters.
    UpstreamCharactersLost,
}

impl InputDiagnostic {
    pub fn message(&self) -> &'static str {
        match self {
            InputDiagnostic::UpstreamCharactersLost => {
                "input arrived as question marks only; the calling terminal or pipe \
                 could not represent the original characters (pass the text with --base64)"
            }
        }
    }
}

/// Text recovered from raw input bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputText {
    pub encoding: DetectedEncoding,
    pub text: String,
    pub diagnostic: Option<InputDiagnostic>,
}

impl InputText {
    pub fn from_bytes(raw: &[u8]) -> Self {
        let decoded = EncodingDetector::decode(raw);
        let text = decoded
            .text
            .strip_prefix(BOM)
            .map(str::to_string)
            .unwrap_or(decoded.text);

        let diagnostic = if is_false_success(raw, &text) {
            Some(InputDiagnostic::UpstreamCharactersLost)
        } else {
            None
        };

        Self {
            encoding: decoded.encoding,
            text,
            diagnostic,
        }
    }

    /// Trimmed text for synthesis.
    pub fn trimmed(&self) -> &str {
        self.text.trim()
    }
}

fn is_false_success(raw: &[u8], text: &str) -> bool {
    let mut saw_question_mark = false;
    for c in text.chars() {
        match c {
            '?' => saw_question_mark = true,
            c if c.is_whitespace() => {}
            _ => return false,
        }
    }
    saw_question_mark && raw.contains(&b'?')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_has_no_diagnostic() {
        let input = InputText::from_bytes("Привет\n".as_bytes());
        assert_eq!(input.trimmed(), "Привет");
        assert_eq!(input.diagnostic, None);
    }

    #[test]
    fn test_question_marks_only_is_flagged() {
        let input = InputText::from_bytes(b"?????? ???\r\n");
        assert_eq!(input.diagnostic, Some(InputDiagnostic::UpstreamCharactersLost));
    }

    #[test]
    fn test_question_inside_text_is_fine() {
        let input = InputText::from_bytes(b"How are you?");
        assert_eq!(input.diagnostic, None);
    }

    #[test]
    fn test_whitespace_only_is_not_flagged() {
        let input = InputText::from_bytes(b"   \n");
        assert_eq!(input.diagnostic, None);
        assert_eq!(input.trimmed(), "");
    }

    #[test]
    fn test_surviving_bom_is_stripped() {
        // The detector consumes the first BOM; a doubled one survives as U+FEFF.
        let doubled = "\u{FEFF}\u{FEFF}текст".as_bytes();

        let input = InputText::from_bytes(doubled);
        assert_eq!(input.text, "текст");
    }
}
