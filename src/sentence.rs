//! Incremental sentence segmentation for streamed replies
//!
//! Model output arrives a few characters at a time. Speech is synthesized per
//! sentence, so fragments are buffered until a sentence boundary is seen.

use serde::Deserialize;

/// How a streamed reply is cut into pieces for synthesis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Segmentation {
    /// Synthesize each sentence as soon as it is complete
    #[default]
    Sentence,
    /// Wait for the whole reply and synthesize it once
    Full,
}

/// Buffers text fragments and releases complete sentences
///
/// A sentence ends at `.`, `!` or `?` (plus any closing quotes or brackets)
/// followed by whitespace, or at a newline. Numbered list markers such as
/// `1. ` do not end a sentence. Returned sentences are trimmed and never
/// empty.
#[derive(Debug, Default)]
pub struct SentenceSplitter {
    buffer: String,
    /// Byte offset in `buffer` where the next boundary search starts
    scanned: usize,
    mode: Segmentation,
}

impl SentenceSplitter {
    #[must_use]
    pub fn new(mode: Segmentation) -> Self {
        Self {
            buffer: String::new(),
            scanned: 0,
            mode,
        }
    }

    /// Append a fragment and return every sentence it completed
    pub fn push(&mut self, fragment: &str) -> Vec<String> {
        self.buffer.push_str(fragment);

        if self.mode == Segmentation::Full {
            return Vec::new();
        }

        let mut sentences = Vec::new();
        while let Some(end) = find_boundary(&self.buffer, self.scanned) {
            let sentence: String = self.buffer.drain(..end).collect();
            self.scanned = 0;
            let trimmed = sentence.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
        }
        self.scanned = resume_offset(&self.buffer);
        sentences
    }

    /// Release whatever text is left once the reply has ended
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        let trimmed = rest.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }
}

const fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?')
}

const fn is_closer(c: char) -> bool {
    matches!(c, '"' | '\'' | ')' | ']' | '\u{201D}' | '\u{2019}' | '*' | '_')
}

/// Where to resume searching once `text` holds no boundary
///
/// Only a trailing run of terminators and closers can still become a
/// boundary when more text arrives, so everything before it is settled.
fn resume_offset(text: &str) -> usize {
    text.char_indices()
        .rev()
        .take_while(|&(_, c)| is_terminator(c) || is_closer(c))
        .last()
        .map_or(text.len(), |(i, _)| i)
}

/// Byte offset just past the first sentence boundary in `text`, searching
/// from byte offset `from`
fn find_boundary(text: &str, from: usize) -> Option<usize> {
    let mut chars = text[from..]
        .char_indices()
        .map(|(i, c)| (i + from, c))
        .peekable();

    while let Some((i, c)) = chars.next() {
        if c == '\n' {
            if text[..i].trim().is_empty() {
                continue;
            }
            return Some(i + 1);
        }

        if !is_terminator(c) {
            continue;
        }

        let mut end = i + c.len_utf8();
        while let Some(&(j, next)) = chars.peek() {
            if is_terminator(next) || is_closer(next) {
                end = j + next.len_utf8();
                chars.next();
            } else {
                break;
            }
        }

        let followed_by_space = chars.peek().is_some_and(|&(_, next)| next.is_whitespace());
        if followed_by_space && !is_list_marker(&text[..i]) {
            return Some(end);
        }
    }

    None
}

/// Whether the text before a period is a bare ordinal like `12`
fn is_list_marker(prefix: &str) -> bool {
    let word = prefix.trim();
    !word.is_empty() && word.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_all(fragments: &[&str]) -> Vec<String> {
        let mut splitter = SentenceSplitter::new(Segmentation::Sentence);
        let mut out: Vec<String> = fragments.iter().flat_map(|f| splitter.push(f)).collect();
        out.extend(splitter.finish());
        out
    }

    #[test]
    fn splits_on_terminal_punctuation() {
        let out = split_all(&["Hello there. How are you? I am fine! Thanks"]);
        assert_eq!(out, vec!["Hello there.", "How are you?", "I am fine!", "Thanks"]);
    }

    #[test]
    fn waits_for_whitespace_after_terminator() {
        let mut splitter = SentenceSplitter::new(Segmentation::Sentence);
        assert!(splitter.push("It costs 3").is_empty());
        assert!(splitter.push(".").is_empty());
        assert!(splitter.push("50 today.").is_empty());
        assert_eq!(splitter.push(" Next"), vec!["It costs 3.50 today."]);
        assert_eq!(splitter.finish().as_deref(), Some("Next"));
    }

    #[test]
    fn token_by_token_matches_whole_text() {
        let text = "First one. Second, longer one! Third?";
        let tokens: Vec<String> = text.chars().map(String::from).collect();
        let refs: Vec<&str> = tokens.iter().map(String::as_str).collect();
        assert_eq!(split_all(&refs), split_all(&[text]));
    }

    #[test]
    fn keeps_closing_quotes_with_sentence() {
        let out = split_all(&["She said \"stop.\" Then she left."]);
        assert_eq!(out, vec!["She said \"stop.\"", "Then she left."]);
    }

    #[test]
    fn ellipsis_is_one_boundary() {
        let out = split_all(&["Well... maybe. "]);
        assert_eq!(out, vec!["Well...", "maybe."]);
    }

    #[test]
    fn newlines_end_sentences_and_blank_lines_vanish() {
        let out = split_all(&["Heading\n\nBody text"]);
        assert_eq!(out, vec!["Heading", "Body text"]);
    }

    #[test]
    fn numbered_list_markers_do_not_split() {
        let out = split_all(&["1. Preheat the oven. 2. Mix the flour."]);
        assert_eq!(out, vec!["1. Preheat the oven.", "2. Mix the flour."]);
    }

    #[test]
    fn whitespace_only_input_yields_nothing() {
        assert!(split_all(&["   ", "\n", " "]).is_empty());
    }

    #[test]
    fn full_mode_buffers_everything() {
        let mut splitter = SentenceSplitter::new(Segmentation::Full);
        assert!(splitter.push("One. Two. ").is_empty());
        assert!(splitter.push("Three.").is_empty());
        assert_eq!(splitter.finish().as_deref(), Some("One. Two. Three."));
    }

    #[test]
    fn long_reply_without_boundary_is_scanned_once() {
        let mut splitter = SentenceSplitter::new(Segmentation::Sentence);
        for _ in 0..1000 {
            assert!(splitter.push("let x = 1; ").is_empty());
            assert_eq!(splitter.scanned, splitter.buffer.len());
        }
        assert_eq!(splitter.push("Done. Next"), vec![format!("{}Done.", "let x = 1; ".repeat(1000)).trim().to_string()]);
        assert_eq!(splitter.scanned, splitter.buffer.len());
    }

    #[test]
    fn pending_terminator_is_rescanned() {
        let mut splitter = SentenceSplitter::new(Segmentation::Sentence);
        assert!(splitter.push("Really?!").is_empty());
        assert_eq!(splitter.scanned, "Really".len());
        assert!(splitter.push("\"").is_empty());
        assert_eq!(splitter.push(" Yes"), vec!["Really?!\""]);
        assert_eq!(splitter.finish().as_deref(), Some("Yes"));
    }

    #[test]
    fn multibyte_text_is_safe() {
        let out = split_all(&["Caf\u{e9} ouvert. \u{1F600} Super!"]);
        assert_eq!(out, vec!["Caf\u{e9} ouvert.", "\u{1F600} Super!"]);
    }
}
