use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use serde::Serialize;
use tantivy::{DocAddress, Searcher};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::{
    config::SearchConfig,
    document::{Document, DocumentKey, Language, matches_any_category},
    document_store::DocumentStore,
    error::{Error, Result},
    query::{self, QueryPlan, StructuredQuery},
    snippet,
    tantivy_index::{FieldQuery, SearchIndex, TextField},
};

/// Weight of a title match.
pub const TITLE_WEIGHT: u32 = 2;
/// Weight of a body match.
pub const BODY_WEIGHT: u32 = 1;
/// Weight of a category label match.
pub const CATEGORY_WEIGHT: u32 = 1;

pub const DEFAULT_PAGE_SIZE: usize = 10;
/// Default wall-time bound of the substring tier.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_millis(2000);

/// Cost bound of the substring tier, the only tier whose cost grows with
/// the size of the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanBudget {
    pub max_wall_time: Duration,
    pub max_documents: Option<usize>,
}

impl Default for ScanBudget {
    fn default() -> Self {
        Self {
            max_wall_time: DEFAULT_SCAN_TIMEOUT,
            max_documents: None,
        }
    }
}

impl ScanBudget {
    pub fn new(max_wall_time: Duration) -> Self {
        Self {
            max_wall_time,
            max_documents: None,
        }
    }

    pub fn with_max_documents(mut self, max: usize) -> Self {
        self.max_documents = Some(max);
        self
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self {
            max_wall_time: config.scan_timeout,
            max_documents: config.scan_max_documents,
        }
    }
}

/// One search call: query text, hard language filter, optional category
/// post-filter and the page to return.
///
/// # Examples
///
/// ```
/// use lectern::{Language, SearchRequest};
///
/// let request = SearchRequest::new("grace", Language::English)
///     .with_categories(["Faith"])
///     .with_page(0);
/// assert_eq!(request.page, 1);
/// ```
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    pub language: Language,
    pub categories: Vec<String>,
    pub page: usize,
    pub page_size: usize,
    pub budget: ScanBudget,
    /// Checked between documents of the substring tier.
    pub cancel: Option<CancellationToken>,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, language: Language) -> Self {
        Self {
            query: query.into(),
            language,
            categories: Vec::new(),
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            budget: ScanBudget::default(),
            cancel: None,
        }
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.categories = crate::document::normalize_categories(categories);
        self
    }

    /// Pages are 1-based; zero is treated as the first page.
    pub fn with_page(mut self, page: usize) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_budget(mut self, budget: ScanBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// Which tier produced the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Prefix,
    Term,
    Phrase,
    AnyOf,
    Substring,
}

impl std::fmt::Display for MatchTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            MatchTier::Prefix => "prefix",
            MatchTier::Term => "term",
            MatchTier::Phrase => "phrase",
            MatchTier::AnyOf => "any-of",
            MatchTier::Substring => "substring",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FieldsMatched {
    pub title: bool,
    pub body: bool,
    pub categories: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// 1-based position in the full filtered ordering, not just this page.
    pub rank: usize,
    pub score: u32,
    pub id: String,
    pub language: Language,
    pub title: String,
    pub categories: Vec<String>,
    pub inserted_at: u64,
    pub fields: FieldsMatched,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    /// Size of the filtered result set across all pages.
    pub total_count: usize,
    pub page: usize,
    pub page_size: usize,
    /// `None` when nothing matched at any tier.
    pub tier: Option<MatchTier>,
}

impl SearchResults {
    fn empty(page: usize, page_size: usize) -> Self {
        Self {
            hits: Vec::new(),
            total_count: 0,
            page,
            page_size,
            tier: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_count == 0
    }
}

/// Distinct-token match counts per field for one document.
#[derive(Debug, Clone, Copy, Default)]
struct FieldCounts {
    title: u32,
    body: u32,
    categories: u32,
}

impl FieldCounts {
    fn score(self) -> u32 {
        TITLE_WEIGHT * self.title
            + BODY_WEIGHT * self.body
            + CATEGORY_WEIGHT * self.categories
    }

    fn matched(self) -> FieldsMatched {
        FieldsMatched {
            title: self.title > 0,
            body: self.body > 0,
            categories: self.categories > 0,
        }
    }
}

struct Candidate {
    key: String,
    id: String,
    language: Language,
    title: String,
    categories: Vec<String>,
    inserted_at: u64,
    counts: FieldCounts,
}

impl Candidate {
    fn from_body_match(doc: Document) -> Self {
        Self {
            key: doc.key().to_string(),
            id: doc.id,
            language: doc.language,
            title: doc.title,
            categories: doc.categories,
            inserted_at: doc.inserted_at,
            counts: FieldCounts {
                body: 1,
                ..FieldCounts::default()
            },
        }
    }

    fn into_hit(self, rank: usize) -> SearchHit {
        SearchHit {
            rank,
            score: self.counts.score(),
            id: self.id,
            language: self.language,
            title: self.title,
            categories: self.categories,
            inserted_at: self.inserted_at,
            fields: self.counts.matched(),
        }
    }
}

/// Run a search against one index snapshot.
///
/// Tiers run in order and the first one with results wins: prefix (or
/// exact term) for one token, adjacent phrase for several, then any-of,
/// then a case-insensitive substring scan of the raw query over bodies.
/// The category filter applies inside every tier, so a tier whose hits are
/// all filtered out falls through to the next. Pagination comes last.
pub fn execute(
    index: &SearchIndex,
    store: &DocumentStore,
    request: &SearchRequest,
) -> Result<SearchResults> {
    let page = request.page.max(1);
    let page_size = request.page_size.max(1);

    let plan = query::plan(&request.query);
    if plan.is_blank() {
        debug!(raw = %request.query, "query is empty after sanitizing");
        return Ok(SearchResults::empty(page, page_size));
    }
    debug!(?plan, language = %request.language, "planned query");

    let searcher = index.searcher();
    let (mut tier, mut candidates) =
        index_tiers(index, store, &searcher, request, &plan)?;

    if candidates.is_empty() {
        candidates = substring_scan(store, request, &plan.raw)
            .inspect_err(|e| {
                if matches!(e, Error::SearchTimedOut) {
                    warn!(
                        query = %plan.raw,
                        budget = ?request.budget,
                        "substring scan exceeded its budget"
                    );
                }
            })?;
        tier = (!candidates.is_empty()).then_some(MatchTier::Substring);
    }

    candidates.sort_by(|a, b| {
        b.counts
            .score()
            .cmp(&a.counts.score())
            .then(b.inserted_at.cmp(&a.inserted_at))
            .then_with(|| a.key.cmp(&b.key))
    });

    let total_count = candidates.len();
    let offset = (page - 1).saturating_mul(page_size);
    let hits: Vec<SearchHit> = candidates
        .into_iter()
        .enumerate()
        .skip(offset)
        .take(page_size)
        .map(|(i, c)| c.into_hit(i + 1))
        .collect();

    debug!(?tier, total_count, returned = hits.len(), "search finished");

    Ok(SearchResults {
        hits,
        total_count,
        page,
        page_size,
        tier: if total_count == 0 { None } else { tier },
    })
}

fn index_tiers(
    index: &SearchIndex,
    store: &DocumentStore,
    searcher: &Searcher,
    request: &SearchRequest,
    plan: &QueryPlan,
) -> Result<(Option<MatchTier>, Vec<Candidate>)> {
    let (tier, clause) = match &plan.query {
        StructuredQuery::Empty => return Ok((None, Vec::new())),
        StructuredQuery::Prefix(prefix) => {
            (MatchTier::Prefix, FieldQuery::Prefix(prefix))
        }
        StructuredQuery::Term(token) => {
            (MatchTier::Term, FieldQuery::Term(token))
        }
        StructuredQuery::Phrase(tokens) => {
            (MatchTier::Phrase, FieldQuery::Phrase(tokens))
        }
    };

    let matches = index_matches(index, searcher, request.language, &[clause]);
    let candidates = resolve(index, store, searcher, matches, request)?;
    if !candidates.is_empty() {
        return Ok((Some(tier), candidates));
    }

    if let StructuredQuery::Phrase(_) = plan.query {
        debug!("no phrase match, trying any-of");
        let clauses: Vec<FieldQuery<'_>> = plan
            .distinct_tokens()
            .into_iter()
            .map(FieldQuery::Term)
            .collect();
        let matches = index_matches(index, searcher, request.language, &clauses);
        let candidates = resolve(index, store, searcher, matches, request)?;
        if !candidates.is_empty() {
            return Ok((Some(MatchTier::AnyOf), candidates));
        }
    }

    Ok((None, Vec::new()))
}

/// Per-document match counts for `clauses` over every text field.
///
/// An index failure is logged and read as "no index hits" so the substring
/// tier still gets a chance.
fn index_matches(
    index: &SearchIndex,
    searcher: &Searcher,
    language: Language,
    clauses: &[FieldQuery<'_>],
) -> HashMap<DocAddress, FieldCounts> {
    let mut counts: HashMap<DocAddress, FieldCounts> = HashMap::new();
    for field in TextField::ALL {
        for clause in clauses {
            let matched =
                match index.matching(searcher, language, field, *clause) {
                    Ok(matched) => matched,
                    Err(e) => {
                        error!(
                            error = %e,
                            ?field,
                            ?clause,
                            "index query failed, treating as no hits"
                        );
                        return HashMap::new();
                    }
                };
            for address in matched {
                let entry = counts.entry(address).or_default();
                match field {
                    TextField::Title => entry.title += 1,
                    TextField::Body => entry.body += 1,
                    TextField::Categories => entry.categories += 1,
                }
            }
        }
    }
    counts
}

/// Load stored fields for index hits, keep those in the selected
/// categories and drop any the store no longer has.
fn resolve(
    index: &SearchIndex,
    store: &DocumentStore,
    searcher: &Searcher,
    matches: HashMap<DocAddress, FieldCounts>,
    request: &SearchRequest,
) -> Result<Vec<Candidate>> {
    let mut loaded = Vec::with_capacity(matches.len());
    for (address, counts) in matches {
        let stored = match index.stored(searcher, address) {
            Ok(stored) => stored,
            Err(e) => {
                error!(error = %e, ?address, "failed to load indexed document");
                continue;
            }
        };
        if !matches_any_category(&stored.categories, &request.categories) {
            continue;
        }
        let Some(key) = DocumentKey::parse(&stored.key) else {
            error!(key = %stored.key, "index entry has a malformed key");
            continue;
        };
        loaded.push(Candidate {
            key: stored.key,
            id: key.id,
            language: key.language,
            title: stored.title,
            categories: stored.categories,
            inserted_at: stored.inserted_at,
            counts,
        });
    }

    if loaded.is_empty() {
        return Ok(loaded);
    }
    let present = store.existing_keys(loaded.iter().map(|c| c.key.as_str()))?;
    if loaded.iter().all(|c| present.contains(&c.key)) {
        return Ok(loaded);
    }

    // A newer index snapshot means a removal landed while this search ran.
    let stale = index.is_stale(searcher);
    loaded.retain(|c| {
        let exists = present.contains(&c.key);
        if !exists && stale {
            debug!(key = %c.key, "hit removed since the search began");
        } else if !exists {
            error!(
                key = %c.key,
                "index references a document missing from the store, dropping hit"
            );
        }
        exists
    });
    Ok(loaded)
}

fn substring_scan(
    store: &DocumentStore,
    request: &SearchRequest,
    needle: &str,
) -> Result<Vec<Candidate>> {
    let started = Instant::now();
    let budget = request.budget;
    let mut visited = 0usize;
    let mut found = Vec::new();

    store.scan(request.language, |doc| {
        if request
            .cancel
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
        {
            return Err(Error::Cancelled);
        }
        if started.elapsed() >= budget.max_wall_time
            || budget.max_documents.is_some_and(|max| visited >= max)
        {
            return Err(Error::SearchTimedOut);
        }
        visited += 1;

        if matches_any_category(&doc.categories, &request.categories)
            && snippet::contains(&doc.body, needle)
        {
            found.push(Candidate::from_body_match(doc));
        }
        Ok(())
    })?;

    debug!(visited, found = found.len(), "substring scan finished");
    Ok(found)
}

/// Format results for human-readable terminal output.
pub fn format_human(results: &SearchResults) {
    if results.hits.is_empty() {
        if results.total_count > 0 {
            println!(
                "No results on page {} ({} result(s) in total).",
                results.page, results.total_count
            );
        } else {
            println!("No results found.");
        }
        return;
    }

    for hit in &results.hits {
        let fields = [
            (hit.fields.title, "title"),
            (hit.fields.body, "body"),
            (hit.fields.categories, "categories"),
        ]
        .into_iter()
        .filter_map(|(matched, name)| matched.then_some(name))
        .collect::<Vec<_>>()
        .join("+");
        println!(
            "{:>3}. [{}] {}:{} ({fields})",
            hit.rank, hit.score, hit.language, hit.id
        );
        println!("     {}", hit.title);
        if !hit.categories.is_empty() {
            println!("     categories: {}", hit.categories.join(", "));
        }
    }

    let pages = results.total_count.div_ceil(results.page_size);
    print!(
        "\n{} result(s), page {} of {}",
        results.total_count, results.page, pages
    );
    match results.tier {
        Some(tier) => println!(" ({tier} match)"),
        None => println!(),
    }
}

#[derive(Serialize)]
struct JsonReport<'a> {
    query: &'a str,
    #[serde(flatten)]
    results: &'a SearchResults,
}

/// Format results as JSON output.
pub fn format_json(results: &SearchResults, query: &str) -> Result<()> {
    let report = JsonReport { query, results };
    println!("{}", serde_json::to_string(&report)?);
    Ok(())
}
