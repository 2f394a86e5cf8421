use std::{collections::HashSet, path::Path};

use tantivy::{
    DocAddress,
    Index,
    IndexReader,
    IndexWriter,
    ReloadPolicy,
    Searcher,
    TantivyDocument,
    Term,
    collector::DocSetCollector,
    query::{BooleanQuery, Occur, PhraseQuery, Query, RegexQuery, TermQuery},
    schema::*,
};

use crate::{
    document::{Document, DocumentKey, Language},
    error::Result,
    tokenizer,
};

/// Memory budget handed to the single index writer.
pub const WRITER_MEMORY_BUDGET: usize = 50_000_000;

/// Field names used in the schema.
pub mod fields {
    pub const KEY: &str = "key";
    pub const ID: &str = "id";
    pub const LANGUAGE: &str = "language";
    pub const TITLE: &str = "title";
    pub const BODY: &str = "body";
    pub const CATEGORIES: &str = "categories";
    pub const CATEGORY_WORDS: &str = "category_words";
    pub const INSERTED_AT: &str = "inserted_at";
}

/// Inverted index over document titles and bodies.
///
/// Readers use a manual reload policy: a searcher is a point-in-time
/// snapshot, and new commits only become visible after [`reload`].
///
/// [`reload`]: SearchIndex::reload
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    fields: SchemaFields,
}

/// Resolved field handles for the schema.
#[derive(Clone, Copy)]
pub struct SchemaFields {
    pub key: Field,
    pub id: Field,
    pub language: Field,
    pub title: Field,
    pub body: Field,
    pub categories: Field,
    pub category_words: Field,
    pub inserted_at: Field,
}

/// The tokenized fields a query can match in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextField {
    Title,
    Body,
    Categories,
}

impl TextField {
    pub const ALL: [TextField; 3] =
        [TextField::Title, TextField::Body, TextField::Categories];
}

/// A match clause evaluated against one text field.
#[derive(Debug, Clone, Copy)]
pub enum FieldQuery<'a> {
    /// Any token starting with the given lower-cased prefix.
    Prefix(&'a str),
    /// Exactly this token.
    Term(&'a str),
    /// These tokens at adjacent positions, in order.
    Phrase(&'a [String]),
}

/// Stored fields of an indexed document.
#[derive(Debug, Clone)]
pub struct IndexedDocument {
    pub key: String,
    pub title: String,
    pub categories: Vec<String>,
    pub inserted_at: u64,
}

fn build_schema() -> Schema {
    let mut builder = Schema::builder();

    builder.add_text_field(fields::KEY, STRING | STORED);
    builder.add_text_field(fields::ID, STRING | STORED);
    builder.add_text_field(fields::LANGUAGE, STRING | STORED);

    let words = TextFieldIndexing::default()
        .set_tokenizer(tokenizer::ANALYZER_NAME)
        .set_index_option(IndexRecordOption::WithFreqsAndPositions);
    builder.add_text_field(
        fields::TITLE,
        TextOptions::default()
            .set_indexing_options(words.clone())
            .set_stored(),
    );
    builder.add_text_field(
        fields::BODY,
        TextOptions::default().set_indexing_options(words.clone()),
    );

    // labels twice: exact values for filtering, words for matching
    builder.add_text_field(fields::CATEGORIES, STRING | STORED);
    builder.add_text_field(
        fields::CATEGORY_WORDS,
        TextOptions::default().set_indexing_options(words),
    );
    builder.add_u64_field(fields::INSERTED_AT, STORED | FAST);

    builder.build()
}

fn resolve_fields(schema: &Schema) -> Result<SchemaFields> {
    Ok(SchemaFields {
        key: schema.get_field(fields::KEY)?,
        id: schema.get_field(fields::ID)?,
        language: schema.get_field(fields::LANGUAGE)?,
        title: schema.get_field(fields::TITLE)?,
        body: schema.get_field(fields::BODY)?,
        categories: schema.get_field(fields::CATEGORIES)?,
        category_words: schema.get_field(fields::CATEGORY_WORDS)?,
        inserted_at: schema.get_field(fields::INSERTED_AT)?,
    })
}

impl SearchIndex {
    /// Open or create a search index at the given directory.
    pub fn open(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;

        let mmap_dir = tantivy::directory::MmapDirectory::open(dir)?;
        let index = if Index::exists(&mmap_dir)
            .map_err(|e| tantivy::TantivyError::SystemError(e.to_string()))?
        {
            Index::open(mmap_dir)?
        } else {
            Index::create(
                mmap_dir,
                build_schema(),
                tantivy::IndexSettings::default(),
            )?
        };

        Self::from_index(index)
    }

    /// Create an in-memory search index (for testing).
    pub fn open_in_ram() -> Result<Self> {
        Self::from_index(Index::create_in_ram(build_schema()))
    }

    fn from_index(index: Index) -> Result<Self> {
        index
            .tokenizers()
            .register(tokenizer::ANALYZER_NAME, tokenizer::analyzer());
        let fields = resolve_fields(&index.schema())?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            reader,
            fields,
        })
    }

    /// Create a writer with the given memory budget (in bytes).
    pub fn writer(&self, memory_budget: usize) -> Result<IndexWriter> {
        Ok(self.index.writer(memory_budget)?)
    }

    /// Stage a document on the writer, replacing any variant with the same
    /// key. Nothing is visible until the writer commits and readers reload.
    pub fn add_document(
        &self,
        writer: &IndexWriter,
        document: &Document,
    ) -> Result<()> {
        let f = self.fields;
        let key = document.key().to_string();

        writer.delete_term(Term::from_field_text(f.key, &key));

        let mut doc = TantivyDocument::default();
        doc.add_text(f.key, &key);
        doc.add_text(f.id, &document.id);
        doc.add_text(f.language, document.language.code());
        doc.add_text(f.title, &document.title);
        doc.add_text(f.body, &document.body);
        for category in &document.categories {
            doc.add_text(f.categories, category);
            doc.add_text(f.category_words, category);
        }
        doc.add_u64(f.inserted_at, document.inserted_at);
        writer.add_document(doc)?;

        Ok(())
    }

    /// Stage the removal of a single document variant.
    pub fn delete_document(&self, writer: &IndexWriter, key: &DocumentKey) {
        let term = Term::from_field_text(self.fields.key, &key.to_string());
        writer.delete_term(term);
    }

    /// Stage the removal of every document.
    pub fn clear(&self, writer: &IndexWriter) -> Result<()> {
        writer.delete_all_documents()?;
        Ok(())
    }

    /// Make the latest commit visible to new searchers.
    pub fn reload(&self) -> Result<()> {
        Ok(self.reader.reload()?)
    }

    /// A point-in-time snapshot of the committed index.
    pub fn searcher(&self) -> Searcher {
        self.reader.searcher()
    }

    /// Whether readers have reloaded past the snapshot `searcher` reads.
    pub fn is_stale(&self, searcher: &Searcher) -> bool {
        self.reader.searcher().generation().generation_id()
            != searcher.generation().generation_id()
    }

    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    /// Documents of `language` matching `clause` in `field`.
    pub fn matching(
        &self,
        searcher: &Searcher,
        language: Language,
        field: TextField,
        clause: FieldQuery<'_>,
    ) -> Result<HashSet<DocAddress>> {
        let f = self.fields;
        let target = match field {
            TextField::Title => f.title,
            TextField::Body => f.body,
            TextField::Categories => f.category_words,
        };

        let matcher: Box<dyn Query> = match clause {
            FieldQuery::Prefix("") | FieldQuery::Phrase([]) => {
                return Ok(HashSet::new());
            }
            FieldQuery::Prefix(prefix) => {
                // Tokens are alphanumeric only, so the prefix carries no
                // regex metacharacters.
                debug_assert!(prefix.chars().all(char::is_alphanumeric));
                Box::new(RegexQuery::from_pattern(
                    &format!("{prefix}.*"),
                    target,
                )?)
            }
            FieldQuery::Term(token) => Box::new(TermQuery::new(
                Term::from_field_text(target, token),
                IndexRecordOption::Basic,
            )),
            FieldQuery::Phrase([single]) => Box::new(TermQuery::new(
                Term::from_field_text(target, single),
                IndexRecordOption::Basic,
            )),
            FieldQuery::Phrase(tokens) => Box::new(PhraseQuery::new(
                tokens
                    .iter()
                    .map(|t| Term::from_field_text(target, t))
                    .collect(),
            )),
        };

        let language_filter: Box<dyn Query> = Box::new(TermQuery::new(
            Term::from_field_text(f.language, language.code()),
            IndexRecordOption::Basic,
        ));
        let query = BooleanQuery::new(vec![
            (Occur::Must, language_filter),
            (Occur::Must, matcher),
        ]);

        Ok(searcher.search(&query, &DocSetCollector)?)
    }

    /// Load the stored fields of a matched document.
    pub fn stored(
        &self,
        searcher: &Searcher,
        address: DocAddress,
    ) -> Result<IndexedDocument> {
        let f = self.fields;
        let doc: TantivyDocument = searcher.doc(address)?;
        Ok(IndexedDocument {
            key: extract_text(&doc, f.key),
            title: extract_text(&doc, f.title),
            categories: doc
                .get_all(f.categories)
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            inserted_at: extract_u64(&doc, f.inserted_at),
        })
    }
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex").finish_non_exhaustive()
    }
}

fn extract_text(doc: &TantivyDocument, field: Field) -> String {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

fn extract_u64(doc: &TantivyDocument, field: Field) -> u64 {
    doc.get_first(field).and_then(|v| v.as_u64()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(id: &str, language: Language, title: &str, body: &str) -> Document {
        Document::new(id, language, title, body).with_inserted_at(1000)
    }

    fn index_with(docs: &[Document]) -> SearchIndex {
        let idx = SearchIndex::open_in_ram().unwrap();
        let mut writer = idx.writer(15_000_000).unwrap();
        for d in docs {
            idx.add_document(&writer, d).unwrap();
        }
        writer.commit().unwrap();
        idx.reload().unwrap();
        idx
    }

    fn keys(
        idx: &SearchIndex,
        language: Language,
        field: TextField,
        clause: FieldQuery<'_>,
    ) -> Vec<String> {
        let searcher = idx.searcher();
        let mut keys: Vec<String> = idx
            .matching(&searcher, language, field, clause)
            .unwrap()
            .into_iter()
            .map(|addr| idx.stored(&searcher, addr).unwrap().key)
            .collect();
        keys.sort();
        keys
    }

    #[test]
    fn prefix_matches_token_starts() {
        let idx = index_with(&[
            doc("a", Language::English, "Faithful", "grace abounds"),
            doc("b", Language::English, "Works", "faith without works"),
            doc("c", Language::English, "Other", "unfaithful servant"),
        ]);

        assert_eq!(
            keys(&idx, Language::English, TextField::Title, FieldQuery::Prefix("fa")),
            ["en:a"]
        );
        assert_eq!(
            keys(&idx, Language::English, TextField::Body, FieldQuery::Prefix("fa")),
            ["en:b"]
        );
    }

    #[test]
    fn language_is_a_hard_filter() {
        let idx = index_with(&[
            doc("s1", Language::English, "Hope", "hope endures"),
            doc("s1", Language::Spanish, "Esperanza", "hope y esperanza"),
        ]);

        assert_eq!(
            keys(&idx, Language::English, TextField::Body, FieldQuery::Term("hope")),
            ["en:s1"]
        );
        assert_eq!(
            keys(&idx, Language::Spanish, TextField::Body, FieldQuery::Term("hope")),
            ["es:s1"]
        );
    }

    #[test]
    fn phrase_requires_adjacent_order() {
        let idx = index_with(&[
            doc("a", Language::English, "One", "saved by grace through faith"),
            doc("b", Language::English, "Two", "faith and then grace"),
        ]);
        let phrase = ["grace".to_string(), "through".to_string()];
        assert_eq!(
            keys(&idx, Language::English, TextField::Body, FieldQuery::Phrase(&phrase)),
            ["en:a"]
        );

        let reversed = ["faith".to_string(), "grace".to_string()];
        assert!(
            keys(&idx, Language::English, TextField::Body, FieldQuery::Phrase(&reversed))
                .is_empty()
        );
    }

    #[test]
    fn single_token_phrase_degrades_to_term() {
        let idx = index_with(&[doc("a", Language::English, "T", "grace")]);
        let phrase = ["grace".to_string()];
        assert_eq!(
            keys(&idx, Language::English, TextField::Body, FieldQuery::Phrase(&phrase)),
            ["en:a"]
        );
    }

    #[test]
    fn stored_fields_roundtrip() {
        let d = doc("a1", Language::English, "Faith and Works", "body")
            .with_categories(["Faith", "James"])
            .with_inserted_at(42);
        let idx = index_with(&[d]);
        let searcher = idx.searcher();
        let addr = *idx
            .matching(&searcher, Language::English, TextField::Title, FieldQuery::Term("works"))
            .unwrap()
            .iter()
            .next()
            .unwrap();
        let stored = idx.stored(&searcher, addr).unwrap();
        assert_eq!(stored.key, "en:a1");
        assert_eq!(stored.title, "Faith and Works");
        assert_eq!(stored.categories, vec!["Faith", "James"]);
        assert_eq!(stored.inserted_at, 42);
    }

    #[test]
    fn category_labels_are_matchable_words() {
        let idx = index_with(&[
            doc("a", Language::English, "Sunday talk", "we met today")
                .with_categories(["Advent Season"]),
            doc("b", Language::English, "Advent", "body"),
        ]);
        assert_eq!(
            keys(&idx, Language::English, TextField::Categories, FieldQuery::Prefix("adv")),
            ["en:a"]
        );
        let phrase = ["advent".to_string(), "season".to_string()];
        assert_eq!(
            keys(&idx, Language::English, TextField::Categories, FieldQuery::Phrase(&phrase)),
            ["en:a"]
        );
    }

    #[test]
    fn reload_leaves_older_searchers_stale() {
        let idx = index_with(&[doc("a", Language::English, "T", "words")]);
        let before = idx.searcher();
        assert!(!idx.is_stale(&before));

        let mut writer = idx.writer(15_000_000).unwrap();
        idx.delete_document(&writer, &DocumentKey::new("a", Language::English));
        writer.commit().unwrap();
        assert!(!idx.is_stale(&before));

        idx.reload().unwrap();
        assert!(idx.is_stale(&before));
        assert!(!idx.is_stale(&idx.searcher()));
    }

    #[test]
    fn add_replaces_same_key() {
        let idx = index_with(&[doc("a", Language::English, "Old", "old words")]);
        let mut writer = idx.writer(15_000_000).unwrap();
        idx.add_document(&writer, &doc("a", Language::English, "New", "new words"))
            .unwrap();
        writer.commit().unwrap();
        idx.reload().unwrap();

        assert_eq!(idx.num_docs(), 1);
        assert!(
            keys(&idx, Language::English, TextField::Body, FieldQuery::Term("old"))
                .is_empty()
        );
        assert_eq!(
            keys(&idx, Language::English, TextField::Body, FieldQuery::Term("new")),
            ["en:a"]
        );
    }

    #[test]
    fn delete_only_touches_one_variant() {
        let idx = index_with(&[
            doc("s1", Language::English, "Hope", "hope"),
            doc("s1", Language::Spanish, "Esperanza", "hope"),
        ]);
        let mut writer = idx.writer(15_000_000).unwrap();
        idx.delete_document(&writer, &DocumentKey::new("s1", Language::English));
        writer.commit().unwrap();
        idx.reload().unwrap();

        assert!(
            keys(&idx, Language::English, TextField::Body, FieldQuery::Term("hope"))
                .is_empty()
        );
        assert_eq!(
            keys(&idx, Language::Spanish, TextField::Body, FieldQuery::Term("hope")),
            ["es:s1"]
        );
    }

    #[test]
    fn uncommitted_changes_are_invisible() {
        let idx = index_with(&[doc("a", Language::English, "T", "grace")]);
        let writer = idx.writer(15_000_000).unwrap();
        let before = idx.searcher();

        idx.delete_document(&writer, &DocumentKey::new("a", Language::English));
        idx.reload().unwrap();
        assert_eq!(idx.num_docs(), 1);
        assert_eq!(before.num_docs(), 1);
    }

    #[test]
    fn clear_removes_everything() {
        let idx = index_with(&[
            doc("a", Language::English, "A", "x"),
            doc("b", Language::Spanish, "B", "y"),
        ]);
        let mut writer = idx.writer(15_000_000).unwrap();
        idx.clear(&writer).unwrap();
        writer.commit().unwrap();
        idx.reload().unwrap();
        assert_eq!(idx.num_docs(), 0);
    }

    #[test]
    fn disk_persistence() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("tantivy");

        {
            let idx = SearchIndex::open(&dir).unwrap();
            let mut writer = idx.writer(15_000_000).unwrap();
            idx.add_document(
                &writer,
                &doc("abc", Language::English, "Test", "persistent data"),
            )
            .unwrap();
            writer.commit().unwrap();
        }

        {
            let idx = SearchIndex::open(&dir).unwrap();
            assert_eq!(
                keys(&idx, Language::English, TextField::Body, FieldQuery::Prefix("pers")),
                ["en:abc"]
            );
        }
    }
}
