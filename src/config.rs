use std::time::Duration;

use crate::{
    document::Language,
    document_store::DocumentStore,
    error::{Error, Result},
    paragraph,
    search,
    snippet,
};

/// Setting keys persisted in the store's settings table.
pub mod keys {
    pub const PAGE_SIZE: &str = "search.page_size";
    pub const MAX_SNIPPETS: &str = "snippets.max";
    pub const SNIPPET_CONTEXT_CHARS: &str = "snippets.context_chars";
    pub const PARAGRAPH_MIN_LENGTH: &str = "paragraphs.min_length";
    pub const PREVIEW_SENTENCES: &str = "preview.sentences";
    pub const SCAN_TIMEOUT_MS: &str = "scan.timeout_ms";
    pub const SCAN_MAX_DOCUMENTS: &str = "scan.max_documents";
    pub const FALLBACK_LANGUAGE: &str = "fallback_language";

    pub const ALL: &[&str] = &[
        PAGE_SIZE,
        MAX_SNIPPETS,
        SNIPPET_CONTEXT_CHARS,
        PARAGRAPH_MIN_LENGTH,
        PREVIEW_SENTENCES,
        SCAN_TIMEOUT_MS,
        SCAN_MAX_DOCUMENTS,
        FALLBACK_LANGUAGE,
    ];
}

/// Tunables for search, snippets and paragraph reflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    pub page_size: usize,
    pub max_snippets: usize,
    pub snippet_context_chars: usize,
    pub paragraph_min_length: usize,
    pub preview_sentences: usize,
    /// Wall-time bound of the substring tier.
    pub scan_timeout: Duration,
    /// Optional document-count bound of the substring tier.
    pub scan_max_documents: Option<usize>,
    /// Variant served by `get` when the requested language is missing.
    pub fallback_language: Option<Language>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            page_size: search::DEFAULT_PAGE_SIZE,
            max_snippets: snippet::DEFAULT_MAX_SNIPPETS,
            snippet_context_chars: snippet::DEFAULT_CONTEXT_CHARS,
            paragraph_min_length: paragraph::DEFAULT_MIN_LENGTH,
            preview_sentences: 3,
            scan_timeout: search::DEFAULT_SCAN_TIMEOUT,
            scan_max_documents: None,
            fallback_language: Some(Language::English),
        }
    }
}

impl SearchConfig {
    /// Defaults overridden by whatever the store's settings table holds.
    pub fn load(store: &DocumentStore) -> Result<Self> {
        let mut config = Self::default();
        for key in keys::ALL {
            if let Some(value) = store.get_setting(key)? {
                config.apply(key, &value)?;
            }
        }
        Ok(config)
    }

    /// Check that `value` parses for `key` without persisting anything.
    pub fn validate(key: &str, value: &str) -> Result<()> {
        Self::default().apply(key, value)
    }

    /// Set one field from its textual setting.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            keys::PAGE_SIZE => self.page_size = parse_positive(key, value)?,
            keys::MAX_SNIPPETS => {
                self.max_snippets = parse_positive(key, value)?
            }
            keys::SNIPPET_CONTEXT_CHARS => {
                self.snippet_context_chars = parse_count(key, value)?
            }
            keys::PARAGRAPH_MIN_LENGTH => {
                self.paragraph_min_length = parse_positive(key, value)?
            }
            keys::PREVIEW_SENTENCES => {
                self.preview_sentences = parse_positive(key, value)?
            }
            keys::SCAN_TIMEOUT_MS => {
                self.scan_timeout =
                    Duration::from_millis(parse_positive(key, value)? as u64)
            }
            keys::SCAN_MAX_DOCUMENTS => {
                self.scan_max_documents = if is_unset(value) {
                    None
                } else {
                    Some(parse_positive(key, value)?)
                }
            }
            keys::FALLBACK_LANGUAGE => {
                self.fallback_language = if is_unset(value) {
                    None
                } else {
                    Some(value.parse()?)
                }
            }
            other => {
                return Err(Error::Config(format!(
                    "unknown setting '{other}' (known: {})",
                    keys::ALL.join(", ")
                )));
            }
        }
        Ok(())
    }

    /// Every setting with its effective value, in a stable order.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            (keys::PAGE_SIZE, self.page_size.to_string()),
            (keys::MAX_SNIPPETS, self.max_snippets.to_string()),
            (
                keys::SNIPPET_CONTEXT_CHARS,
                self.snippet_context_chars.to_string(),
            ),
            (
                keys::PARAGRAPH_MIN_LENGTH,
                self.paragraph_min_length.to_string(),
            ),
            (keys::PREVIEW_SENTENCES, self.preview_sentences.to_string()),
            (
                keys::SCAN_TIMEOUT_MS,
                self.scan_timeout.as_millis().to_string(),
            ),
            (
                keys::SCAN_MAX_DOCUMENTS,
                self.scan_max_documents
                    .map_or_else(|| "none".to_string(), |n| n.to_string()),
            ),
            (
                keys::FALLBACK_LANGUAGE,
                self.fallback_language
                    .map_or_else(|| "none".to_string(), |l| l.to_string()),
            ),
        ]
    }
}

fn is_unset(value: &str) -> bool {
    value.is_empty() || value.eq_ignore_ascii_case("none")
}

fn parse_count(key: &str, value: &str) -> Result<usize> {
    value.parse().map_err(|_| {
        Error::Config(format!("invalid value for {key}: {value:?}"))
    })
}

fn parse_positive(key: &str, value: &str) -> Result<usize> {
    match parse_count(key, value)? {
        0 => Err(Error::Config(format!("{key} must be greater than zero"))),
        n => Ok(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> (tempfile::TempDir, DocumentStore) {
        let tmp = tempfile::tempdir().unwrap();
        let store = DocumentStore::open(&tmp.path().join("docs.redb")).unwrap();
        (tmp, store)
    }

    #[test]
    fn defaults_without_settings() {
        let (_tmp, store) = test_store();
        assert_eq!(SearchConfig::load(&store).unwrap(), SearchConfig::default());
    }

    #[test]
    fn stored_settings_override_defaults() {
        let (_tmp, store) = test_store();
        store.set_setting(keys::PAGE_SIZE, "25").unwrap();
        store.set_setting(keys::SCAN_MAX_DOCUMENTS, "500").unwrap();
        store.set_setting(keys::FALLBACK_LANGUAGE, "none").unwrap();

        let config = SearchConfig::load(&store).unwrap();
        assert_eq!(config.page_size, 25);
        assert_eq!(config.scan_max_documents, Some(500));
        assert_eq!(config.fallback_language, None);
        assert_eq!(config.max_snippets, 3);
    }

    #[test]
    fn invalid_stored_value_is_a_config_error() {
        let (_tmp, store) = test_store();
        store.set_setting(keys::SCAN_TIMEOUT_MS, "soon").unwrap();
        assert!(matches!(
            SearchConfig::load(&store),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn validate_rejects_zero_and_unknown_keys() {
        assert!(SearchConfig::validate(keys::PAGE_SIZE, "0").is_err());
        assert!(SearchConfig::validate(keys::SNIPPET_CONTEXT_CHARS, "0").is_ok());
        assert!(SearchConfig::validate("search.colour", "blue").is_err());
        assert!(matches!(
            SearchConfig::validate(keys::FALLBACK_LANGUAGE, "de"),
            Err(Error::UnknownLanguage(_))
        ));
    }

    #[test]
    fn entries_cover_every_key() {
        let entries = SearchConfig::default().entries();
        let names: Vec<_> = entries.iter().map(|(k, _)| *k).collect();
        assert_eq!(names, keys::ALL);
        assert!(entries.contains(&(keys::FALLBACK_LANGUAGE, "en".to_string())));
    }
}
