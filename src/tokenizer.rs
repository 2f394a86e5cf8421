//! Word and sentence segmentation.
//!
//! Indexing, query planning and statistics all go through the same tantivy
//! analyzer chain so that "a word" means the same thing everywhere: runs of
//! alphanumeric codepoints, lower-cased, with tokens longer than
//! [`MAX_TOKEN_BYTES`] dropped. There is no stemming.

use std::ops::Range;

use tantivy::tokenizer::{
    LowerCaser,
    RemoveLongFilter,
    SimpleTokenizer,
    StopWordFilter,
    TextAnalyzer,
    TokenStream,
};

use crate::document::Language;

/// Name the word analyzer is registered under in the index.
pub const ANALYZER_NAME: &str = "lectern_words";

/// Tokens at or above this byte length are not indexed.
pub const MAX_TOKEN_BYTES: usize = 40;

/// A lower-cased token with the byte span it came from in the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub start: usize,
    pub end: usize,
}

/// The analyzer used for indexed text fields and query planning.
pub fn analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(MAX_TOKEN_BYTES))
        .filter(LowerCaser)
        .build()
}

/// Same as [`analyzer`] with the language's stop words removed.
pub fn stop_word_analyzer(language: Language) -> TextAnalyzer {
    let words = match language {
        Language::English => tantivy::tokenizer::Language::English,
        Language::Spanish => tantivy::tokenizer::Language::Spanish,
    };
    let builder = TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(MAX_TOKEN_BYTES))
        .filter(LowerCaser);
    match StopWordFilter::new(words) {
        Some(filter) => builder.filter(filter).build(),
        None => builder.build(),
    }
}

/// Split text into lower-cased word tokens with byte offsets into `text`.
///
/// Offsets always fall on codepoint boundaries, so `&text[t.start..t.end]`
/// yields the original-case spelling.
///
/// # Examples
///
/// ```
/// use lectern::tokenizer::tokenize;
///
/// let text = "Grace, through FAITH!";
/// let tokens = tokenize(text);
/// let words: Vec<_> = tokens.iter().map(|t| t.text.as_str()).collect();
/// assert_eq!(words, ["grace", "through", "faith"]);
/// assert_eq!(&text[tokens[2].start..tokens[2].end], "FAITH");
/// ```
pub fn tokenize(text: &str) -> Vec<Token> {
    tokens_with(&mut analyzer(), text)
}

pub(crate) fn tokens_with(analyzer: &mut TextAnalyzer, text: &str) -> Vec<Token> {
    let mut stream = analyzer.token_stream(text);
    let mut tokens = Vec::new();
    while stream.advance() {
        let token = stream.token();
        tokens.push(Token {
            text: token.text.clone(),
            start: token.offset_from,
            end: token.offset_to,
        });
    }
    tokens
}

/// Byte spans of the sentences in `text`.
///
/// A boundary sits after `.`, `!` or `?` when whitespace follows. Spans are
/// trimmed and never empty; the whitespace between sentences belongs to no
/// span.
///
/// # Examples
///
/// ```
/// use lectern::tokenizer::sentences;
///
/// let s = sentences("The quick brown fox jumps. The lazy dog sleeps.");
/// assert_eq!(s, ["The quick brown fox jumps.", "The lazy dog sleeps."]);
/// ```
pub fn split_sentences(text: &str) -> Vec<Range<usize>> {
    let mut spans = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        if let Some(&(_, next)) = chars.peek()
            && next.is_whitespace()
        {
            push_trimmed(text, start..idx + c.len_utf8(), &mut spans);

            start = text.len();
            while let Some(&(i, w)) = chars.peek() {
                if !w.is_whitespace() {
                    start = i;
                    break;
                }
                chars.next();
            }
        }
    }

    if start < text.len() {
        push_trimmed(text, start..text.len(), &mut spans);
    }
    spans
}

/// Convenience wrapper over [`split_sentences`] returning the slices.
pub fn sentences(text: &str) -> Vec<&str> {
    split_sentences(text)
        .into_iter()
        .map(|span| &text[span])
        .collect()
}

fn push_trimmed(text: &str, span: Range<usize>, out: &mut Vec<Range<usize>>) {
    let slice = &text[span.clone()];
    let trimmed = slice.trim();
    if trimmed.is_empty() {
        return;
    }
    let start = span.start + (slice.len() - slice.trim_start().len());
    out.push(start..start + trimmed.len());
}

/// Strip everything except word characters, whitespace and hyphens.
///
/// # Examples
///
/// ```
/// use lectern::tokenizer::sanitize;
///
/// assert_eq!(sanitize("  \"born-again\" (John 3:16)! "), "born-again John 316");
/// ```
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(|&c| {
            c.is_alphanumeric() || c == '_' || c == '-' || c.is_whitespace()
        })
        .collect::<String>()
        .trim()
        .to_string()
}
