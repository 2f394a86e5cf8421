//! Reflowing flat transcripts into display paragraphs.

use crate::tokenizer;

/// Default minimum paragraph length, in characters, for the reflow path.
pub const DEFAULT_MIN_LENGTH: usize = 665;

/// Shown by [`preview`] for an empty body.
pub const NO_TRANSCRIPTION: &str = "(No transcription available)";

/// Split `body` into paragraphs.
///
/// Bodies that already carry blank-line breaks keep them: every
/// `"\n\n"`-delimited block becomes one trimmed paragraph. Otherwise
/// sentences are accumulated until a paragraph reaches `min_length`
/// characters; the remainder forms the last paragraph whatever its length.
/// No paragraph is empty.
///
/// # Examples
///
/// ```
/// use lectern::paragraph::format;
///
/// let body = "One. Two. Three.";
/// assert_eq!(format(body, 8), ["One. Two.", "Three."]);
///
/// let body = "First block.\n\n\n\nSecond block.";
/// assert_eq!(format(body, 665), ["First block.", "Second block."]);
/// ```
pub fn format(body: &str, min_length: usize) -> Vec<String> {
    if body.contains("\n\n") {
        return body
            .split("\n\n")
            .map(str::trim)
            .filter(|block| !block.is_empty())
            .map(str::to_string)
            .collect();
    }

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for sentence in tokenizer::sentences(body) {
        if !current.is_empty() {
            current.push(' ');
            current_chars += 1;
        }
        current.push_str(sentence);
        current_chars += sentence.chars().count();

        if current_chars >= min_length {
            paragraphs.push(std::mem::take(&mut current));
            current_chars = 0;
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }
    paragraphs
}

/// The first `count` sentences of `body`, joined by single spaces.
pub fn preview(body: &str, count: usize) -> String {
    let sentences = tokenizer::sentences(body);
    if sentences.is_empty() {
        return NO_TRANSCRIPTION.to_string();
    }
    sentences
        .into_iter()
        .take(count)
        .collect::<Vec<_>>()
        .join(" ")
}
