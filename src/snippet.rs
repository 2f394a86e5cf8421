//! Context windows around literal query occurrences.
//!
//! Matching here is on raw text, not tokens: a snippet shows the literal
//! occurrence even when the document was found by a phrase, any-of or
//! substring match.

use std::ops::Range;

/// Returned in place of snippets when the body has no literal occurrence.
pub const NO_MATCH: &str = "(No exact match found)";

pub const DEFAULT_MAX_SNIPPETS: usize = 3;
pub const DEFAULT_CONTEXT_CHARS: usize = 40;

/// One window of a body, with the occurrences it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub text: String,
    /// Byte ranges of query occurrences, relative to `text`.
    pub matches: Vec<Range<usize>>,
    /// Byte range of `text` within the body.
    pub span: Range<usize>,
}

/// Byte ranges of the case-insensitive, non-overlapping occurrences of
/// `query` in `text`, in document order.
///
/// Ranges always fall on codepoint boundaries of `text`, including when
/// lower-casing changes byte lengths. A whitespace-only query matches
/// nothing.
///
/// # Examples
///
/// ```
/// use lectern::snippet::find_matches;
///
/// let text = "Faith, FAITH and faithful";
/// let spans: Vec<_> = find_matches(text, "faith")
///     .into_iter()
///     .map(|r| &text[r])
///     .collect();
/// assert_eq!(spans, ["Faith", "FAITH", "faith"]);
/// ```
pub fn find_matches(text: &str, query: &str) -> Vec<Range<usize>> {
    let needle = fold(query.trim());
    if needle.is_empty() {
        return Vec::new();
    }

    // folded byte offset -> original byte offset, at char boundaries only
    let mut folded = String::with_capacity(text.len());
    let mut origin: Vec<Option<usize>> = Vec::with_capacity(text.len() + 1);
    for (idx, c) in text.char_indices() {
        let before = folded.len();
        folded.extend(c.to_lowercase());
        origin.push(Some(idx));
        origin.extend(std::iter::repeat_n(None, folded.len() - before - 1));
    }
    origin.push(Some(text.len()));

    // Candidates start only where an original character starts, so an
    // unaligned hit inside an expansion cannot shadow an aligned one.
    let mut matches = Vec::new();
    let mut at = 0;
    while at + needle.len() <= folded.len() {
        if let Some(start) = origin[at]
            && folded[at..].starts_with(needle.as_str())
            && let Some(end) = origin[at + needle.len()]
        {
            matches.push(start..end);
            at += needle.len();
            continue;
        }
        at += folded[at..].chars().next().map_or(1, char::len_utf8);
    }
    matches
}

/// Whether [`find_matches`] finds at least one occurrence.
pub fn contains(text: &str, query: &str) -> bool {
    !find_matches(text, query).is_empty()
}

/// Up to `max_snippets` word-aligned windows around occurrences of `query`.
///
/// Each window reaches `context_chars` characters either side of its
/// occurrence and is then widened outward so no word is cut. A window that
/// would start before the previous window ends is skipped. With no
/// occurrence the result is `[NO_MATCH]`.
///
/// # Examples
///
/// ```
/// use lectern::snippet::{extract, NO_MATCH};
///
/// let body = "The quick brown fox jumps. The lazy dog sleeps.";
/// assert_eq!(extract(body, "fox", 3, 11), ["quick brown fox jumps. The"]);
/// assert_eq!(extract(body, "xyz123", 3, 40), [NO_MATCH]);
/// ```
pub fn extract(
    body: &str,
    query: &str,
    max_snippets: usize,
    context_chars: usize,
) -> Vec<String> {
    let snippets = extract_annotated(body, query, max_snippets, context_chars);
    if snippets.is_empty() && max_snippets > 0 {
        return vec![NO_MATCH.to_string()];
    }
    snippets.into_iter().map(|s| s.text).collect()
}

/// Like [`extract`], keeping match positions and returning an empty list
/// instead of the sentinel.
pub fn extract_annotated(
    body: &str,
    query: &str,
    max_snippets: usize,
    context_chars: usize,
) -> Vec<Snippet> {
    let matches = find_matches(body, query);
    let mut snippets: Vec<Snippet> = Vec::new();
    let mut previous_end = 0;

    for occurrence in &matches {
        if snippets.len() >= max_snippets {
            break;
        }
        let span = window(body, occurrence.clone(), context_chars);
        if !snippets.is_empty() && span.start < previous_end {
            continue;
        }
        previous_end = span.end;
        snippets.push(Snippet {
            text: body[span.clone()].to_string(),
            matches: matches
                .iter()
                .filter(|m| m.start >= span.start && m.end <= span.end)
                .map(|m| m.start - span.start..m.end - span.start)
                .collect(),
            span,
        });
    }
    snippets
}

/// Wrap every occurrence of `query` in `open`/`close`.
///
/// # Examples
///
/// ```
/// use lectern::snippet::highlight;
///
/// assert_eq!(highlight("Grace upon grace", "grace", "[", "]"), "[Grace] upon [grace]");
/// ```
pub fn highlight(text: &str, query: &str, open: &str, close: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for m in find_matches(text, query) {
        out.push_str(&text[last..m.start]);
        out.push_str(open);
        out.push_str(&text[m.clone()]);
        out.push_str(close);
        last = m.end;
    }
    out.push_str(&text[last..]);
    out
}

fn fold(s: &str) -> String {
    s.chars().flat_map(char::to_lowercase).collect()
}

/// Word-aligned, trimmed window around `occurrence`.
fn window(
    text: &str,
    occurrence: Range<usize>,
    context_chars: usize,
) -> Range<usize> {
    let start = widen_start(text, back_chars(text, occurrence.start, context_chars));
    let end = widen_end(text, forward_chars(text, occurrence.end, context_chars));

    let slice = &text[start..end];
    let start = start + (slice.len() - slice.trim_start().len());
    start..start + slice.trim().len()
}

fn back_chars(text: &str, from: usize, n: usize) -> usize {
    text[..from]
        .char_indices()
        .rev()
        .take(n)
        .last()
        .map_or(from, |(i, _)| i)
}

fn forward_chars(text: &str, from: usize, n: usize) -> usize {
    text[from..]
        .char_indices()
        .nth(n)
        .map_or(text.len(), |(i, _)| from + i)
}

fn is_space_at(text: &str, at: usize) -> bool {
    text[at..].chars().next().is_some_and(char::is_whitespace)
}

fn is_space_before(text: &str, at: usize) -> bool {
    text[..at].chars().next_back().is_some_and(char::is_whitespace)
}

fn widen_start(text: &str, start: usize) -> usize {
    if start == 0 || is_space_before(text, start) || is_space_at(text, start) {
        return start;
    }
    text[..start]
        .char_indices()
        .rev()
        .find(|(_, c)| c.is_whitespace())
        .map_or(0, |(i, c)| i + c.len_utf8())
}

fn widen_end(text: &str, end: usize) -> usize {
    if end == text.len() || is_space_at(text, end) || is_space_before(text, end) {
        return end;
    }
    text[end..]
        .char_indices()
        .find(|(_, c)| c.is_whitespace())
        .map_or(text.len(), |(i, _)| end + i)
}
