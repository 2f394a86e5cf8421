//! Turning a raw query string into something the index can answer.

use crate::tokenizer;

/// Shortest token that is matched as a prefix rather than exactly.
pub const MIN_PREFIX_CHARS: usize = 2;

/// The index-level shape of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructuredQuery {
    /// Nothing survived sanitization; matches no document at any tier.
    Empty,
    /// One token, matched against the start of indexed tokens.
    Prefix(String),
    /// One token too short to be a useful prefix, matched exactly.
    Term(String),
    /// Several tokens: adjacent phrase first, then any-of at execution time.
    Phrase(Vec<String>),
}

/// A planned query together with the text it was planned from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    /// The caller's input, untouched. The substring tier scans for this.
    pub raw: String,
    pub query: StructuredQuery,
}

impl QueryPlan {
    /// No token reached the index. The substring tier may still match.
    pub fn is_empty(&self) -> bool {
        self.query == StructuredQuery::Empty
    }

    /// Nothing but punctuation and whitespace: matches nothing at any tier.
    ///
    /// A plan can be empty without being blank when every word is longer
    /// than the tokenizer keeps.
    pub fn is_blank(&self) -> bool {
        tokenizer::sanitize(&self.raw).is_empty()
    }

    /// Distinct tokens in first-seen order, used by the any-of tier.
    pub fn distinct_tokens(&self) -> Vec<&str> {
        let tokens: &[String] = match &self.query {
            StructuredQuery::Empty => &[],
            StructuredQuery::Prefix(t) | StructuredQuery::Term(t) => {
                std::slice::from_ref(t)
            }
            StructuredQuery::Phrase(tokens) => tokens,
        };
        let mut out: Vec<&str> = Vec::with_capacity(tokens.len());
        for token in tokens {
            if !out.contains(&token.as_str()) {
                out.push(token);
            }
        }
        out
    }
}

/// Plan a raw query.
///
/// # Examples
///
/// ```
/// use lectern::query::{plan, StructuredQuery};
///
/// assert_eq!(plan("Faith").query, StructuredQuery::Prefix("faith".into()));
/// assert_eq!(
///     plan("grace, faith!").query,
///     StructuredQuery::Phrase(vec!["grace".into(), "faith".into()])
/// );
/// assert_eq!(plan("  ?! ").query, StructuredQuery::Empty);
/// ```
pub fn plan(raw: &str) -> QueryPlan {
    let sanitized = tokenizer::sanitize(raw);
    let mut tokens: Vec<String> = tokenizer::tokenize(&sanitized)
        .into_iter()
        .map(|t| t.text)
        .collect();

    let query = match tokens.len() {
        0 => StructuredQuery::Empty,
        1 => {
            let token = tokens.remove(0);
            if token.chars().count() >= MIN_PREFIX_CHARS {
                StructuredQuery::Prefix(token)
            } else {
                StructuredQuery::Term(token)
            }
        }
        _ => StructuredQuery::Phrase(tokens),
    };

    QueryPlan {
        raw: raw.to_string(),
        query,
    }
}
