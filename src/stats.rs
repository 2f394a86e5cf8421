//! Corpus statistics per language.

use std::collections::HashMap;

use rayon::prelude::*;
use serde::Serialize;

use crate::{
    document::{Document, Language},
    tokenizer,
};

/// Number of entries in [`CorpusStats::top_words`].
pub const TOP_WORDS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentSize {
    pub id: String,
    pub title: String,
    pub words: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusStats {
    pub language: Language,
    pub documents: usize,
    /// Mean whitespace-delimited words per body; zero for an empty corpus.
    pub average_words: f64,
    pub largest: Option<DocumentSize>,
    pub shortest: Option<DocumentSize>,
    /// Most frequent non-stop-words, most frequent first.
    pub top_words: Vec<(String, usize)>,
    pub most_common_category: Option<String>,
}

/// Compute statistics over `docs`, all of which belong to `language`.
///
/// Ties go to the first document in the given order for largest and
/// shortest, and to the alphabetically first label or word elsewhere.
pub fn compute(language: Language, docs: &[Document]) -> CorpusStats {
    let sizes: Vec<DocumentSize> = docs
        .par_iter()
        .map(|doc| DocumentSize {
            id: doc.id.clone(),
            title: doc.title.clone(),
            words: doc.word_count(),
        })
        .collect();

    let total_words: usize = sizes.iter().map(|s| s.words).sum();
    let average_words = if sizes.is_empty() {
        0.0
    } else {
        total_words as f64 / sizes.len() as f64
    };

    let mut largest: Option<&DocumentSize> = None;
    let mut shortest: Option<&DocumentSize> = None;
    for size in &sizes {
        if largest.is_none_or(|l| size.words > l.words) {
            largest = Some(size);
        }
        if shortest.is_none_or(|s| size.words < s.words) {
            shortest = Some(size);
        }
    }

    CorpusStats {
        language,
        documents: docs.len(),
        average_words,
        largest: largest.cloned(),
        shortest: shortest.cloned(),
        top_words: top_words(language, docs, TOP_WORDS),
        most_common_category: most_common_category(docs),
    }
}

/// The `limit` most frequent words across bodies, stop words removed.
pub fn top_words(
    language: Language,
    docs: &[Document],
    limit: usize,
) -> Vec<(String, usize)> {
    let counts = docs
        .par_iter()
        .map_init(
            || tokenizer::stop_word_analyzer(language),
            |analyzer, doc| {
                let mut counts: HashMap<String, usize> = HashMap::new();
                for token in tokenizer::tokens_with(analyzer, &doc.body) {
                    *counts.entry(token.text).or_default() += 1;
                }
                counts
            },
        )
        .reduce(HashMap::new, merge_counts);

    ranked(counts, limit)
}

fn most_common_category(docs: &[Document]) -> Option<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for label in docs.iter().flat_map(|d| &d.categories) {
        *counts.entry(label.clone()).or_default() += 1;
    }
    ranked(counts, 1).into_iter().next().map(|(label, _)| label)
}

fn merge_counts(
    mut a: HashMap<String, usize>,
    b: HashMap<String, usize>,
) -> HashMap<String, usize> {
    for (word, n) in b {
        *a.entry(word).or_default() += n;
    }
    a
}

fn ranked(counts: HashMap<String, usize>, limit: usize) -> Vec<(String, usize)> {
    let mut entries: Vec<(String, usize)> = counts.into_iter().collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(limit);
    entries
}

/// Format statistics for human-readable terminal output.
pub fn format_human(stats: &CorpusStats) {
    println!("Language:           {}", stats.language);
    println!("Documents:          {}", stats.documents);
    println!("Average words:      {:.1}", stats.average_words);
    if let Some(largest) = &stats.largest {
        println!(
            "Largest:            {} ({} words)",
            largest.title, largest.words
        );
    }
    if let Some(shortest) = &stats.shortest {
        println!(
            "Shortest:           {} ({} words)",
            shortest.title, shortest.words
        );
    }
    println!(
        "Top category:       {}",
        stats.most_common_category.as_deref().unwrap_or("N/A")
    );
    if !stats.top_words.is_empty() {
        let words: Vec<String> = stats
            .top_words
            .iter()
            .map(|(w, n)| format!("{w} ({n})"))
            .collect();
        println!("Top words:          {}", words.join(", "));
    }
}
