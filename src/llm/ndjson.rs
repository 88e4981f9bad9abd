//! Incremental newline-delimited JSON framing

/// Splits a byte stream into complete lines
///
/// Bytes are buffered until a `\n` arrives, so a JSON object split across
/// network chunks (or a multi-byte character split mid-sequence) is only
/// decoded once it is whole.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
}

impl NdjsonDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every line it completed
    ///
    /// Blank lines are skipped. Lines are decoded lossily; Ollama only
    /// emits UTF-8.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            let text = text.trim();
            if !text.is_empty() {
                lines.push(text.to_string());
            }
        }
        lines
    }

    /// Flush the unterminated tail, if any
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let text = String::from_utf8_lossy(&rest);
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_complete_lines() {
        let mut decoder = NdjsonDecoder::new();
        let lines = decoder.push(b"{\"a\":1}\n{\"b\":2}\n");
        assert_eq!(lines, vec!["{\"a\":1}", "{\"b\":2}"]);
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn holds_partial_line_until_newline() {
        let mut decoder = NdjsonDecoder::new();
        assert!(decoder.push(b"{\"message\":").is_empty());
        assert!(decoder.push(b"\"hi\"").is_empty());
        assert_eq!(decoder.push(b"}\n{\"x\""), vec!["{\"message\":\"hi\"}"]);
        assert_eq!(decoder.finish().as_deref(), Some("{\"x\""));
    }

    #[test]
    fn multibyte_character_split_across_chunks() {
        let line = "{\"content\":\"caf\u{e9}\"}\n".as_bytes();
        let split = line.iter().position(|&b| b == 0xC3).unwrap() + 1;

        let mut decoder = NdjsonDecoder::new();
        assert!(decoder.push(&line[..split]).is_empty());
        assert_eq!(decoder.push(&line[split..]), vec!["{\"content\":\"caf\u{e9}\"}"]);
    }

    #[test]
    fn skips_blank_lines_and_crlf() {
        let mut decoder = NdjsonDecoder::new();
        let lines = decoder.push(b"\n\r\n{\"a\":1}\r\n\n");
        assert_eq!(lines, vec!["{\"a\":1}"]);
    }
}
