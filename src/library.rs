use std::{collections::BTreeSet, path::Path, sync::Mutex};

use serde::Serialize;
use tantivy::IndexWriter;
use tracing::{debug, error, info, warn};

use crate::{
    config::{SearchConfig, keys},
    data_dir::DataDir,
    document::{Document, DocumentKey, Language, now_millis},
    document_store::{DocumentStore, StoreTxn},
    error::{Error, Result},
    paragraph,
    search::{self, ScanBudget, SearchRequest, SearchResults},
    snippet,
    stats::{self, CorpusStats},
    tantivy_index::{SearchIndex, WRITER_MEMORY_BUDGET},
};

/// Prior state of every key a write touched, used to put the index back if
/// the store commit fails after the index commit succeeded.
type Undo = Vec<(DocumentKey, Option<Document>)>;

/// A document store and its inverted index, kept in step.
///
/// Every mutation takes the single writer lock, stages the store write,
/// applies it to the index, commits the index and then the store. Readers
/// reload before the store commit when the mutation adds no key, and after
/// it otherwise. Searches run against a reader snapshot and never block on
/// writers.
pub struct Library {
    store: DocumentStore,
    index: SearchIndex,
    writer: Mutex<IndexWriter>,
    config: SearchConfig,
}

/// One row of a title-ordered listing.
#[derive(Debug, Clone, Serialize)]
pub struct ListEntry {
    pub id: String,
    pub language: Language,
    pub title: String,
    pub categories: Vec<String>,
    pub inserted_at: u64,
    pub preview: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub entries: Vec<ListEntry>,
    pub total_count: usize,
    pub page: usize,
    pub page_size: usize,
}

impl Library {
    /// Open the store and on-disk index under `data_dir`.
    pub fn open(data_dir: &DataDir) -> Result<Self> {
        let store = DocumentStore::open(&data_dir.documents_db())?;
        let index = SearchIndex::open(&data_dir.tantivy_dir()?)?;
        Self::assemble(store, index)
    }

    /// Open the store under `dir` with an in-memory index built from it.
    pub fn open_in_memory(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let store = DocumentStore::open(&dir.join("documents.redb"))?;
        let index = SearchIndex::open_in_ram()?;
        Self::assemble(store, index)
    }

    fn assemble(store: DocumentStore, index: SearchIndex) -> Result<Self> {
        let writer = index.writer(WRITER_MEMORY_BUDGET)?;
        let config = SearchConfig::load(&store)?;
        let library = Self {
            store,
            index,
            writer: Mutex::new(writer),
            config,
        };

        let stored = library.store.len()?;
        let indexed = library.index.num_docs();
        if stored != indexed {
            warn!(stored, indexed, "index out of step with the store, rebuilding");
            library.rebuild()?;
        }
        Ok(library)
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    pub fn index(&self) -> &SearchIndex {
        &self.index
    }

    // -- Writes --

    /// Insert or update one document variant.
    ///
    /// An update keeps the `inserted_at` of the variant it replaces; a new
    /// variant with `inserted_at == 0` is stamped with the current time.
    pub fn ingest(&self, document: Document) -> Result<()> {
        self.ingest_batch([document]).map(|_| ())
    }

    /// Upsert many documents as one atomic unit.
    pub fn ingest_batch<I>(&self, documents: I) -> Result<usize>
    where
        I: IntoIterator<Item = Document>,
    {
        let mut documents: Vec<Document> = documents.into_iter().collect();
        for document in &documents {
            document.validate()?;
        }
        if documents.is_empty() {
            return Ok(0);
        }

        let now = now_millis();
        let count = self.write(|txn, writer, undo| {
            for document in &mut documents {
                self.upsert(txn, writer, undo, document, now)?;
            }
            Ok(documents.len())
        })?;
        info!(count, "ingested documents");
        Ok(count)
    }

    /// Update an existing variant; [`Error::NotFound`] if there is none.
    pub fn replace(&self, mut document: Document) -> Result<()> {
        document.validate()?;
        let key = document.key();
        self.write(|txn, writer, undo| {
            if txn.get(&key)?.is_none() {
                return Err(Error::NotFound {
                    kind: "document",
                    name: key.to_string(),
                });
            }
            self.upsert(txn, writer, undo, &mut document, now_millis())
        })?;
        info!(%key, "replaced document");
        Ok(())
    }

    /// Delete one variant and its index entries. Returns whether anything
    /// was stored under the key.
    pub fn remove(&self, id: &str, language: Language) -> Result<bool> {
        let key = DocumentKey::new(id, language);
        let removed = self.write(|txn, writer, undo| {
            let Some(previous) = txn.remove(&key)? else {
                return Ok(false);
            };
            self.index.delete_document(writer, &key);
            undo.push((key.clone(), Some(previous)));
            Ok(true)
        })?;
        if removed {
            info!(%key, "removed document");
        } else {
            debug!(%key, "nothing to remove");
        }
        Ok(removed)
    }

    /// Rebuild the whole index from the store.
    ///
    /// Searchers keep seeing the previous snapshot until the rebuilt index
    /// is committed.
    pub fn rebuild(&self) -> Result<usize> {
        let mut writer = self.writer.lock().map_err(|_| Error::WriterPoisoned)?;
        let documents = self.store.all_documents()?;

        let staged = self.index.clear(&writer).and_then(|()| {
            documents
                .iter()
                .try_for_each(|doc| self.index.add_document(&writer, doc))
        });
        if let Err(e) = staged.and_then(|()| Ok(writer.commit().map(|_| ())?)) {
            if let Err(rollback) = writer.rollback() {
                error!(error = %rollback, "index rollback failed");
            }
            return Err(e);
        }
        self.index.reload()?;

        info!(documents = documents.len(), "rebuilt index");
        Ok(documents.len())
    }

    fn upsert(
        &self,
        txn: &StoreTxn,
        writer: &IndexWriter,
        undo: &mut Undo,
        document: &mut Document,
        now: u64,
    ) -> Result<()> {
        let key = document.key();
        let previous = txn.get(&key)?;
        match &previous {
            Some(existing) => document.inserted_at = existing.inserted_at,
            None if document.inserted_at == 0 => document.inserted_at = now,
            None => {}
        }
        txn.put(document)?;
        self.index.add_document(writer, document)?;
        undo.push((key, previous));
        Ok(())
    }

    /// Run one mutation under the writer lock and commit it to both sides.
    fn write<T, F>(&self, stage: F) -> Result<T>
    where
        F: FnOnce(&StoreTxn, &IndexWriter, &mut Undo) -> Result<T>,
    {
        let mut writer = self.writer.lock().map_err(|_| Error::WriterPoisoned)?;
        let txn = self.store.begin()?;
        let mut undo = Undo::new();

        let staged = stage(&txn, &writer, &mut undo)
            .and_then(|value| Ok(writer.commit().map(|_| value)?));
        let value = match staged {
            Ok(value) => value,
            Err(e) => {
                if let Err(rollback) = writer.rollback() {
                    error!(error = %rollback, "index rollback failed");
                }
                if let Err(abort) = txn.abort() {
                    error!(error = %abort, "store abort failed");
                }
                return Err(e);
            }
        };

        // Removals and updates touch only keys the store already has, so
        // readers can move on before the store commits. New keys wait until
        // the store has them.
        let adds_keys = undo.iter().any(|(_, previous)| previous.is_none());
        let mut reloaded = false;
        if !adds_keys {
            match self.index.reload() {
                Ok(()) => reloaded = true,
                Err(e) => warn!(error = %e, "early reader reload failed"),
            }
        }

        if let Err(e) = txn.commit() {
            error!(error = %e, "store commit failed, reverting index");
            for (key, previous) in undo.iter().rev() {
                match previous {
                    Some(document) => self.index.add_document(&writer, document)?,
                    None => self.index.delete_document(&writer, key),
                }
            }
            writer.commit()?;
            self.index.reload()?;
            return Err(e);
        }

        if !reloaded {
            self.index.reload()?;
        }
        Ok(value)
    }

    // -- Reads --

    pub fn search(&self, request: &SearchRequest) -> Result<SearchResults> {
        search::execute(&self.index, &self.store, request)
    }

    /// A request carrying the configured page size and scan budget.
    pub fn request(&self, query: &str, language: Language) -> SearchRequest {
        SearchRequest::new(query, language)
            .with_page_size(self.config.page_size)
            .with_budget(ScanBudget::from_config(&self.config))
    }

    pub fn snippets(&self, body: &str, query: &str) -> Vec<String> {
        snippet::extract(
            body,
            query,
            self.config.max_snippets,
            self.config.snippet_context_chars,
        )
    }

    pub fn paragraphs(&self, body: &str) -> Vec<String> {
        paragraph::format(body, self.config.paragraph_min_length)
    }

    /// Fetch a variant, falling back to the configured fallback language
    /// when the requested one does not exist.
    pub fn get(&self, id: &str, language: Language) -> Result<Option<Document>> {
        if let Some(document) = self.store.get(&DocumentKey::new(id, language))? {
            return Ok(Some(document));
        }
        match self.config.fallback_language {
            Some(fallback) if fallback != language => {
                debug!(id, %language, %fallback, "trying fallback language");
                self.store.get(&DocumentKey::new(id, fallback))
            }
            _ => Ok(None),
        }
    }

    /// Documents of one language ordered by title, one page at a time.
    pub fn list(
        &self,
        language: Language,
        page: usize,
        page_size: usize,
    ) -> Result<Listing> {
        let page = page.max(1);
        let page_size = page_size.max(1);

        let mut documents = self.store.documents(language)?;
        documents.sort_by_cached_key(|d| (d.title.to_lowercase(), d.id.clone()));

        let total_count = documents.len();
        let preview_sentences = self.config.preview_sentences;
        let entries = documents
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .map(|d| ListEntry {
                preview: paragraph::preview(&d.body, preview_sentences),
                id: d.id,
                language: d.language,
                title: d.title,
                categories: d.categories,
                inserted_at: d.inserted_at,
            })
            .collect();

        Ok(Listing {
            entries,
            total_count,
            page,
            page_size,
        })
    }

    /// Sorted distinct category labels used by one language.
    pub fn categories(&self, language: Language) -> Result<Vec<String>> {
        let mut labels = BTreeSet::new();
        self.store.scan(language, |document| {
            labels.extend(document.categories);
            Ok(())
        })?;
        Ok(labels.into_iter().collect())
    }

    pub fn stats(&self, language: Language) -> Result<CorpusStats> {
        Ok(stats::compute(language, &self.store.documents(language)?))
    }

    pub fn document_count(&self) -> Result<u64> {
        self.store.len()
    }

    // -- Settings --

    /// Validate and persist one setting, applying it immediately.
    pub fn set_setting(&mut self, key: &str, value: &str) -> Result<()> {
        SearchConfig::validate(key, value)?;
        self.store.set_setting(key, value.trim())?;
        self.config.apply(key, value)
    }

    /// Drop a persisted setting so its default applies again.
    pub fn clear_setting(&mut self, key: &str) -> Result<bool> {
        if !keys::ALL.contains(&key) {
            return Err(Error::Config(format!("unknown setting '{key}'")));
        }
        let removed = self.store.remove_setting(key)?;
        self.config = SearchConfig::load(&self.store)?;
        Ok(removed)
    }
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("store", &self.store)
            .field("index", &self.index)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
