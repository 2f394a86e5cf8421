//! lectern - full-text search over long-form transcripts.
//!
//! lectern keeps bilingual (English/Spanish) transcript documents in a
//! [redb](https://github.com/cberner/redb) store and indexes their titles
//! and bodies with [Tantivy](https://github.com/quickwit-oss/tantivy).
//! Queries run through a tiered strategy: a prefix, term or phrase query
//! first, an any-of-the-words query when that finds nothing, and finally a
//! bounded substring scan. Matching passages can be cut out as snippets and
//! bodies reflowed into readable paragraphs.
//!
//! # Quick start
//!
//! ```no_run
//! use lectern::{DataDir, Document, Language, Library};
//!
//! let data_dir = DataDir::resolve(None).unwrap();
//! let library = Library::open(&data_dir).unwrap();
//!
//! library
//!     .ingest(Document::new(
//!         "s1",
//!         Language::English,
//!         "The Grace of God",
//!         "Grace is unmerited favor. It cannot be earned.",
//!     ))
//!     .unwrap();
//!
//! let results = library
//!     .search(&library.request("grace", Language::English))
//!     .unwrap();
//! for hit in &results.hits {
//!     println!("{}. {} (score: {})", hit.rank, hit.title, hit.score);
//! }
//! ```

pub mod config;
pub mod data_dir;
pub mod document;
pub mod document_store;
pub mod error;
pub mod ingestion;
pub mod library;
pub mod paragraph;
pub mod query;
pub mod search;
pub mod snippet;
pub mod stats;
pub mod tantivy_index;
pub mod tokenizer;
pub mod walker;

pub use config::SearchConfig;
pub use data_dir::DataDir;
pub use document::{Document, DocumentKey, Language};
pub use document_store::DocumentStore;
pub use error::{Error, Result};
pub use library::Library;
pub use search::{
    MatchTier,
    ScanBudget,
    SearchHit,
    SearchRequest,
    SearchResults,
};
pub use tantivy_index::SearchIndex;
