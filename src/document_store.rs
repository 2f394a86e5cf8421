use std::{collections::HashSet, path::Path};

use redb::{
    Database,
    ReadableDatabase,
    ReadableTable,
    ReadableTableMetadata,
    TableDefinition,
    WriteTransaction,
};

use crate::{
    document::{Document, DocumentKey, Language},
    error::Result,
};

/// Documents keyed by `"<lang>:<id>"`, stored as JSON.
const DOCUMENTS: TableDefinition<&str, &[u8]> =
    TableDefinition::new("documents");
const SETTINGS: TableDefinition<&str, &str> = TableDefinition::new("settings");

/// The backing document table plus persisted settings.
pub struct DocumentStore {
    db: Database,
}

/// A staged write against the document table.
///
/// Nothing is visible to readers until [`commit`](StoreTxn::commit).
/// Dropping or [`abort`](StoreTxn::abort)ing discards the staged changes.
pub struct StoreTxn {
    txn: WriteTransaction,
}

fn language_range(language: Language) -> (String, String) {
    // ';' sorts right after ':' so this covers exactly one language.
    (format!("{}:", language.code()), format!("{};", language.code()))
}

impl DocumentStore {
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).map_err(redb::Error::from)?;

        // Ensure all tables exist by opening them in a write transaction.
        let txn = db.begin_write()?;
        txn.open_table(DOCUMENTS)?;
        txn.open_table(SETTINGS)?;
        txn.commit()?;

        Ok(Self { db })
    }

    // -- Documents --

    pub fn begin(&self) -> Result<StoreTxn> {
        Ok(StoreTxn {
            txn: self.db.begin_write()?,
        })
    }

    pub fn get(&self, key: &DocumentKey) -> Result<Option<Document>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DOCUMENTS)?;
        let key = key.to_string();
        let document = match table.get(key.as_str())? {
            Some(value) => Some(serde_json::from_slice(value.value())?),
            None => None,
        };
        Ok(document)
    }

    /// Which of the given keys are present, checked in one read transaction.
    pub fn existing_keys<'a, I>(&self, keys: I) -> Result<HashSet<String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DOCUMENTS)?;
        let mut found = HashSet::new();
        for key in keys {
            if table.get(key)?.is_some() {
                found.insert(key.to_string());
            }
        }
        Ok(found)
    }

    /// Visit every document of one language in key order.
    ///
    /// An error returned by `visit` stops the scan and is passed through.
    pub fn scan<F>(&self, language: Language, mut visit: F) -> Result<()>
    where
        F: FnMut(Document) -> Result<()>,
    {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DOCUMENTS)?;
        let (start, end) = language_range(language);
        for entry in table.range::<&str>(start.as_str()..end.as_str())? {
            let (_key, value) = entry?;
            visit(serde_json::from_slice(value.value())?)?;
        }
        Ok(())
    }

    pub fn documents(&self, language: Language) -> Result<Vec<Document>> {
        let mut docs = Vec::new();
        self.scan(language, |doc| {
            docs.push(doc);
            Ok(())
        })?;
        Ok(docs)
    }

    pub fn all_documents(&self) -> Result<Vec<Document>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DOCUMENTS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (_key, value) = entry?;
            result.push(serde_json::from_slice(value.value())?);
        }
        Ok(result)
    }

    pub fn len(&self) -> Result<u64> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(DOCUMENTS)?;
        Ok(table.len()?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    // -- Settings --

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(SETTINGS)?;
            table.insert(key, value)?;
        }
        txn.commit()?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        Ok(table.get(key)?.map(|v| v.value().to_string()))
    }

    pub fn remove_setting(&self, key: &str) -> Result<bool> {
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(SETTINGS)?;
            table.remove(key)?.is_some()
        };
        txn.commit()?;
        Ok(removed)
    }

    pub fn list_settings(&self) -> Result<Vec<(String, String)>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(SETTINGS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            result.push((k.value().to_string(), v.value().to_string()));
        }
        Ok(result)
    }
}

impl StoreTxn {
    pub fn get(&self, key: &DocumentKey) -> Result<Option<Document>> {
        let table = self.txn.open_table(DOCUMENTS)?;
        let key = key.to_string();
        let document = match table.get(key.as_str())? {
            Some(value) => Some(serde_json::from_slice(value.value())?),
            None => None,
        };
        Ok(document)
    }

    pub fn put(&self, document: &Document) -> Result<()> {
        let bytes = serde_json::to_vec(document)?;
        let key = document.key().to_string();
        let mut table = self.txn.open_table(DOCUMENTS)?;
        table.insert(key.as_str(), bytes.as_slice())?;
        Ok(())
    }

    /// Remove a document, returning what was stored under the key.
    pub fn remove(&self, key: &DocumentKey) -> Result<Option<Document>> {
        let mut table = self.txn.open_table(DOCUMENTS)?;
        let key = key.to_string();
        let removed = match table.remove(key.as_str())? {
            Some(value) => Some(serde_json::from_slice(value.value())?),
            None => None,
        };
        Ok(removed)
    }

    pub fn commit(self) -> Result<()> {
        self.txn.commit()?;
        Ok(())
    }

    pub fn abort(self) -> Result<()> {
        self.txn.abort()?;
        Ok(())
    }
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore").finish_non_exhaustive()
    }
}
