use std::{
    fmt,
    str::FromStr,
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// Languages a document variant can be published in.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
pub enum Language {
    #[serde(rename = "en")]
    English,
    #[serde(rename = "es")]
    Spanish,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::English, Language::Spanish];

    /// The two-letter tag used in keys, settings and the CLI.
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Spanish => "es",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let tag = s.trim().to_ascii_lowercase();
        Language::ALL
            .into_iter()
            .find(|lang| lang.code() == tag)
            .ok_or_else(|| Error::UnknownLanguage(s.to_string()))
    }
}

/// Identity of a document variant: the same external id may exist once per
/// language.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey {
    pub id: String,
    pub language: Language,
}

impl DocumentKey {
    pub fn new(id: impl Into<String>, language: Language) -> Self {
        Self {
            id: id.into(),
            language,
        }
    }

    /// Parse the `"<lang>:<id>"` form produced by `Display`.
    ///
    /// The id itself may contain colons; only the first one separates.
    pub fn parse(s: &str) -> Option<Self> {
        let (lang, id) = s.split_once(':')?;
        let language = lang.parse().ok()?;
        Some(Self::new(id, language))
    }
}

impl fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.language, self.id)
    }
}

/// A transcribed document, the unit of indexing and retrieval.
///
/// Field aliases accept the upload format of the sermon archive this crate
/// grew out of (`sermon_guid`, `sermon_title`, `transcription`), and
/// `categories` may be either a JSON array or a comma-separated string.
///
/// # Examples
///
/// ```
/// use lectern::{Document, Language};
///
/// let doc: Document = serde_json::from_str(
///     r#"{"sermon_guid": "a1", "language": "en", "sermon_title": "Faith",
///         "transcription": "grace through faith", "categories": "Grace, Faith"}"#,
/// )
/// .unwrap();
/// assert_eq!(doc.id, "a1");
/// assert_eq!(doc.language, Language::English);
/// assert_eq!(doc.categories, vec!["Grace", "Faith"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(alias = "sermon_guid")]
    pub id: String,
    pub language: Language,
    #[serde(alias = "sermon_title")]
    pub title: String,
    #[serde(alias = "transcription")]
    pub body: String,
    #[serde(default, deserialize_with = "deserialize_categories")]
    pub categories: Vec<String>,
    /// Milliseconds since the Unix epoch. Zero means "not yet stamped"; the
    /// library stamps it on first insert and preserves it on update.
    #[serde(default)]
    pub inserted_at: u64,
}

impl Document {
    pub fn new(
        id: impl Into<String>,
        language: Language,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            language,
            title: title.into(),
            body: body.into(),
            categories: Vec::new(),
            inserted_at: 0,
        }
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.categories = normalize_categories(categories);
        self
    }

    pub fn with_inserted_at(mut self, millis: u64) -> Self {
        self.inserted_at = millis;
        self
    }

    pub fn key(&self) -> DocumentKey {
        DocumentKey::new(self.id.clone(), self.language)
    }

    /// Whitespace-delimited word count of the body.
    pub fn word_count(&self) -> usize {
        self.body.split_whitespace().count()
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::InvalidDocument("empty id".into()));
        }
        if self.id.chars().any(char::is_control) {
            return Err(Error::InvalidDocument(format!(
                "id contains control characters: {:?}",
                self.id
            )));
        }
        if self.title.trim().is_empty() {
            return Err(Error::InvalidDocument(format!(
                "empty title for {}",
                self.key()
            )));
        }
        Ok(())
    }
}

/// Trim labels, drop empties and duplicates, keep first-seen order.
pub fn normalize_categories<I, S>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for label in labels {
        let label = label.as_ref().trim();
        if !label.is_empty() && !out.iter().any(|l| l == label) {
            out.push(label.to_string());
        }
    }
    out
}

/// True when `labels` carries at least one of `selected` (case-insensitive).
/// An empty selection matches everything.
pub fn matches_any_category(labels: &[String], selected: &[String]) -> bool {
    if selected.is_empty() {
        return true;
    }
    selected.iter().any(|wanted| {
        let wanted = wanted.trim().to_lowercase();
        labels.iter().any(|label| label.to_lowercase() == wanted)
    })
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CategoriesRepr {
    List(Vec<String>),
    Joined(String),
    Missing(()),
}

fn deserialize_categories<'de, D>(
    deserializer: D,
) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match CategoriesRepr::deserialize(deserializer)? {
        CategoriesRepr::List(labels) => normalize_categories(labels),
        CategoriesRepr::Joined(joined) => {
            normalize_categories(joined.split(','))
        }
        CategoriesRepr::Missing(()) => Vec::new(),
    })
}
