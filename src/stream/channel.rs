//! # Control Channel Reader
//!
//! Splits the stream-mode control channel into lines. The channel's
//! encoding is settled once, from the bytes read up to the first newline
//! byte:
//!
//! ## Modes:
//! - **Wide**: a UTF-16 BOM, or more than 20% zero bytes. The whole stream
//!   runs through one `encoding_rs` decoder and lines are split on the
//!   decoded `\n`, so code units never straddle a line boundary
//! - **Bytes**: anything else. Lines are split on the `\n` byte and each line
//!   goes through `EncodingDetector`, which copes with UTF-8 and the Cyrillic
//!   code pages line by line
//!
//! Returned lines keep their terminator; `ControlLine::parse` trims it.

use crate::text::encoding::{UTF16BE_BOM, UTF16LE_BOM, UTF16_ZERO_RATIO};
use crate::text::EncodingDetector;
use encoding_rs::{CoderResult, Decoder, Encoding, UTF_16BE, UTF_16LE};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::debug;

const READ_CHUNK: usize = 4096;

/// Undecided bytes buffered at most before the encoding is settled anyway.
const SNIFF_LIMIT: usize = 4096;

enum Mode {
    Undecided,
    Bytes,
    Wide(Decoder),
}

pub struct ControlReader<R> {
    input: R,
    mode: Mode,
    /// Raw bytes not yet split into lines (undecided and byte modes)
    raw: Vec<u8>,
    /// Decoded text not yet split into lines (wide mode)
    text: String,
    eof: bool,
}

impl<R: AsyncRead + Unpin> ControlReader<R> {
    pub fn new(input: R) -> Self {
        Self {
            input,
            mode: Mode::Undecided,
            raw: Vec::new(),
            text: String::new(),
            eof: false,
        }
    }

    /// Next line, or `None` once the channel is closed and fully consumed.
    ///
    /// Cancel-safe: bytes are only taken from `input` by a completed read,
    /// and anything read is kept until a later call returns it.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            if let Some(line) = self.take_line() {
                return Ok(Some(line));
            }
            if self.eof {
                return Ok(self.take_rest());
            }

            let n = self.input.read(&mut chunk).await?;
            self.eof = n == 0;
            self.accept(&chunk[..n]);
        }
    }

    fn accept(&mut self, bytes: &[u8]) {
        match &mut self.mode {
            Mode::Wide(decoder) => decode_into(decoder, bytes, &mut self.text, self.eof),
            Mode::Bytes => self.raw.extend_from_slice(bytes),
            Mode::Undecided => {
                self.raw.extend_from_slice(bytes);
                if self.eof || self.raw.len() >= SNIFF_LIMIT || self.raw.contains(&b'\n') {
                    self.settle();
                }
            }
        }
    }

    fn settle(&mut self) {
        match wide_encoding(&self.raw) {
            Some(encoding) => {
                debug!(encoding = encoding.name(), "control channel is UTF-16");
                let mut decoder = encoding.new_decoder_with_bom_removal();
                let raw = std::mem::take(&mut self.raw);
                decode_into(&mut decoder, &raw, &mut self.text, self.eof);
                self.mode = Mode::Wide(decoder);
            }
            None => {
                debug!("control channel is byte oriented");
                self.mode = Mode::Bytes;
            }
        }
    }

    fn take_line(&mut self) -> Option<String> {
        match self.mode {
            Mode::Undecided => None,
            Mode::Bytes => {
                let end = self.raw.iter().position(|&b| b == b'\n')?;
                let line: Vec<u8> = self.raw.drain(..=end).collect();
                Some(EncodingDetector::decode(&line).text)
            }
            Mode::Wide(_) => {
                let end = self.text.find('\n')?;
                Some(self.text.drain(..=end).collect())
            }
        }
    }

    /// The unterminated tail after end of input.
    fn take_rest(&mut self) -> Option<String> {
        match self.mode {
            Mode::Wide(_) => Some(std::mem::take(&mut self.text)).filter(|t| !t.is_empty()),
            Mode::Undecided | Mode::Bytes => {
                if self.raw.is_empty() {
                    return None;
                }
                let raw = std::mem::take(&mut self.raw);
                Some(EncodingDetector::decode(&raw).text)
            }
        }
    }
}

/// UTF-16 flavour of the channel's first bytes, if they look like UTF-16.
fn wide_encoding(raw: &[u8]) -> Option<&'static Encoding> {
    if raw.starts_with(UTF16LE_BOM) {
        return Some(UTF_16LE);
    }
    if raw.starts_with(UTF16BE_BOM) {
        return Some(UTF_16BE);
    }

    let zeros = raw.iter().filter(|&&b| b == 0).count();
    if raw.is_empty() || (zeros as f64) / (raw.len() as f64) <= UTF16_ZERO_RATIO {
        return None;
    }
    // ASCII in UTF-16LE puts the zero byte second.
    let odd_zeros = raw.iter().skip(1).step_by(2).filter(|&&b| b == 0).count();
    Some(if odd_zeros * 2 >= zeros { UTF_16LE } else { UTF_16BE })
}

fn decode_into(decoder: &mut Decoder, mut src: &[u8], out: &mut String, last: bool) {
    loop {
        let needed = decoder
            .max_utf8_buffer_length(src.len())
            .unwrap_or(READ_CHUNK * 3);
        out.reserve(needed);
        let (result, read, _) = decoder.decode_to_string(src, out, last);
        src = &src[read..];
        if let CoderResult::InputEmpty = result {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::WINDOWS_1251;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    /// Hands out one byte per read.
    struct Trickle {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl AsyncRead for Trickle {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if let Some(&byte) = self.bytes.get(self.pos) {
                buf.put_slice(&[byte]);
                self.pos += 1;
            }
            Poll::Ready(Ok(()))
        }
    }

    fn utf16le_with_bom(text: &str) -> Vec<u8> {
        let mut bytes = UTF16LE_BOM.to_vec();
        bytes.extend(text.encode_utf16().flat_map(|u| u.to_le_bytes()));
        bytes
    }

    async fn all_lines<R: AsyncRead + Unpin>(input: R) -> Vec<String> {
        let mut reader = ControlReader::new(input);
        let mut lines = Vec::new();
        while let Some(line) = reader.next_line().await.unwrap() {
            lines.push(line);
        }
        lines
    }

    #[tokio::test]
    async fn test_utf16le_channel_with_bom() {
        let bytes = utf16le_with_bom("aGVsbG8=|a.wav\r\nexit\n");
        let lines = all_lines(bytes.as_slice()).await;
        assert_eq!(lines, vec!["aGVsbG8=|a.wav\r\n", "exit\n"]);
    }

    #[tokio::test]
    async fn test_utf16be_channel_without_bom() {
        let bytes: Vec<u8> = "hello\nworld"
            .encode_utf16()
            .flat_map(|u| u.to_be_bytes())
            .collect();
        let lines = all_lines(bytes.as_slice()).await;
        assert_eq!(lines, vec!["hello\n", "world"]);
    }

    #[tokio::test]
    async fn test_one_byte_reads_keep_code_units_whole() {
        let bytes = utf16le_with_bom("Привет\nмир\n");
        let lines = all_lines(Trickle { bytes, pos: 0 }).await;
        assert_eq!(lines, vec!["Привет\n", "мир\n"]);
    }

    #[tokio::test]
    async fn test_byte_channel_detects_each_line() {
        let mut bytes = "Привет\n".as_bytes().to_vec();
        let (legacy, _, _) = WINDOWS_1251.encode("мир");
        bytes.extend_from_slice(&legacy);
        bytes.extend_from_slice(b"\nexit");

        let lines = all_lines(bytes.as_slice()).await;
        assert_eq!(lines, vec!["Привет\n", "мир\n", "exit"]);
    }

    #[tokio::test]
    async fn test_empty_channel() {
        assert!(all_lines(&b""[..]).await.is_empty());
    }

    #[test]
    fn test_wide_encoding_heuristic() {
        assert_eq!(wide_encoding(b"plain ascii\n"), None);
        assert_eq!(wide_encoding(&[b'h', 0, b'i', 0, b'\n', 0]), Some(UTF_16LE));
        assert_eq!(wide_encoding(&[0, b'h', 0, b'i', 0, b'\n']), Some(UTF_16BE));
        assert_eq!(wide_encoding(&[0xFE, 0xFF, 0x04, 0x1F]), Some(UTF_16BE));
    }
}
