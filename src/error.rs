use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Redb(#[from] redb::Error),

    #[error("database storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("database transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("database table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("database commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("index error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("index directory error: {0}")]
    IndexDirectory(#[from] tantivy::directory::error::OpenDirectoryError),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("unknown language tag: {0}")]
    UnknownLanguage(String),

    #[error("search timed out, try a more specific query")]
    SearchTimedOut,

    #[error("search cancelled")]
    Cancelled,

    #[error("index writer lock poisoned")]
    WriterPoisoned,

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),
}
