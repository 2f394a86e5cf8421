use lectern::{
    Document,
    Error,
    Language,
    Library,
    MatchTier,
    ScanBudget,
    SearchResults,
};
use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use proptest::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    Layer,
    layer::{Context, SubscriberExt},
};

/// Counts `ERROR` events seen on the current thread.
struct ErrorCounter(Arc<AtomicUsize>);

impl<S: Subscriber> Layer<S> for ErrorCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::ERROR {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn library() -> (tempfile::TempDir, Library) {
    let tmp = tempfile::tempdir().unwrap();
    let lib = Library::open_in_memory(tmp.path()).unwrap();
    (tmp, lib)
}

fn search(lib: &Library, query: &str, language: Language) -> SearchResults {
    lib.search(&lib.request(query, language)).unwrap()
}

fn ids(results: &SearchResults) -> Vec<&str> {
    results.hits.iter().map(|h| h.id.as_str()).collect()
}

fn faith_and_works() -> Document {
    Document::new(
        "a1",
        Language::English,
        "Faith and Works",
        "For by grace you have been saved through faith, and that not of \
         yourselves.",
    )
}

#[test]
fn single_word_finds_the_document() {
    let (_tmp, lib) = library();
    lib.ingest(faith_and_works()).unwrap();

    let results = search(&lib, "faith", Language::English);
    assert_eq!(results.total_count, 1);
    assert_eq!(ids(&results), ["a1"]);
}

#[test]
fn non_adjacent_words_fall_back_to_any_of() {
    let (_tmp, lib) = library();
    lib.ingest(faith_and_works()).unwrap();

    let results = search(&lib, "grace faith", Language::English);
    assert_eq!(results.tier, Some(MatchTier::AnyOf));
    assert_eq!(ids(&results), ["a1"]);
    assert!(results.hits[0].fields.title);
    assert!(results.hits[0].fields.body);
}

#[test]
fn language_variants_are_independent() {
    let (_tmp, lib) = library();
    lib.ingest_batch([
        Document::new("s1", Language::English, "Hope", "hope endures"),
        Document::new("s1", Language::Spanish, "Esperanza", "hope perdura"),
    ])
    .unwrap();

    assert!(lib.remove("s1", Language::English).unwrap());

    assert!(search(&lib, "hope", Language::English).is_empty());
    let spanish = search(&lib, "hope", Language::Spanish);
    assert_eq!(ids(&spanish), ["s1"]);
    assert_eq!(spanish.hits[0].language, Language::Spanish);
    assert_eq!(search(&lib, "esperanza", Language::Spanish).total_count, 1);
    assert!(lib.get("s1", Language::Spanish).unwrap().is_some());
}

#[test]
fn category_filter_narrows_results() {
    let (_tmp, lib) = library();
    lib.ingest_batch([
        Document::new("1", Language::English, "Love", "love one another")
            .with_categories(["Family", "Love"]),
        Document::new("2", Language::English, "Patience", "love is patient")
            .with_categories(["Love"]),
        Document::new("3", Language::English, "Work", "labor of love")
            .with_categories(["Work"]),
    ])
    .unwrap();

    let request = lib
        .request("love", Language::English)
        .with_categories(["family", "WORK"]);
    let results = lib.search(&request).unwrap();
    assert_eq!(results.total_count, 2);
    assert_eq!(ids(&results), ["1", "3"]);
}

#[test]
fn pages_cover_the_whole_result_set() {
    let (_tmp, lib) = library();
    lib.ingest_batch((0..5u64).map(|i| {
        Document::new(format!("d{i}"), Language::English, "Psalm", "selah")
            .with_inserted_at(i + 1)
    }))
    .unwrap();

    let mut seen = Vec::new();
    for page in 1..=3 {
        let request = lib
            .request("selah", Language::English)
            .with_page(page)
            .with_page_size(2);
        let results = lib.search(&request).unwrap();
        assert_eq!(results.total_count, 5);
        seen.extend(results.hits.into_iter().map(|h| (h.rank, h.id)));
    }
    let expected: Vec<(usize, String)> = (1..=5)
        .map(|rank| (rank, format!("d{}", 5 - rank)))
        .collect();
    assert_eq!(seen, expected);
}

#[test]
fn substring_tier_catches_what_the_index_cannot() {
    let (_tmp, lib) = library();
    lib.ingest(Document::new(
        "j",
        Language::English,
        "Gospel",
        "Memorize John 3:16 this week.",
    ))
    .unwrap();

    let results = search(&lib, "3:16", Language::English);
    assert_eq!(results.tier, Some(MatchTier::Substring));
    assert_eq!(ids(&results), ["j"]);
}

#[test]
fn exhausted_scan_budget_is_reported() {
    let (_tmp, lib) = library();
    lib.ingest(Document::new("j", Language::English, "T", "John 3:16"))
        .unwrap();

    let request = lib
        .request("3:16", Language::English)
        .with_budget(ScanBudget::default().with_max_documents(0));
    let err = lib.search(&request).unwrap_err();
    assert!(matches!(err, Error::SearchTimedOut));
    assert!(err.to_string().contains("try a more specific query"));
}

#[test]
fn cancellation_only_affects_the_scan() {
    let (_tmp, lib) = library();
    lib.ingest(Document::new("j", Language::English, "John", "John 3:16"))
        .unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let scan = lib
        .request("3:16", Language::English)
        .with_cancellation(token.clone());
    assert!(matches!(lib.search(&scan), Err(Error::Cancelled)));

    let indexed = lib
        .request("john", Language::English)
        .with_cancellation(token);
    assert_eq!(lib.search(&indexed).unwrap().total_count, 1);
}

#[test]
fn snippets_and_paragraphs_for_a_found_document() {
    let (_tmp, lib) = library();
    lib.ingest(faith_and_works()).unwrap();

    let hit = &search(&lib, "grace", Language::English).hits[0];
    let document = lib.get(&hit.id, hit.language).unwrap().unwrap();

    let snippets = lib.snippets(&document.body, "grace");
    assert_eq!(snippets.len(), 1);
    assert!(snippets[0].contains("grace"));
    assert_eq!(
        lib.snippets(&document.body, "xyz123"),
        ["(No exact match found)"]
    );
    assert_eq!(lib.paragraphs(&document.body), [document.body.clone()]);
}

#[test]
fn readers_never_see_half_a_batch() {
    let (_tmp, lib) = library();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for round in 0..20 {
                lib.ingest_batch([
                    Document::new(
                        format!("{round}-a"),
                        Language::English,
                        "Pair",
                        "amen",
                    ),
                    Document::new(
                        format!("{round}-b"),
                        Language::English,
                        "Pair",
                        "amen",
                    ),
                ])
                .unwrap();
            }
        });

        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..50 {
                    let results = search(&lib, "amen", Language::English);
                    assert_eq!(results.total_count % 2, 0);
                }
            });
        }
    });

    assert_eq!(search(&lib, "amen", Language::English).total_count, 40);
}

#[test]
fn removals_during_searches_are_not_faults() {
    let (_tmp, lib) = library();
    lib.ingest_batch((0..30).map(|i| {
        Document::new(format!("r{i}"), Language::English, "Psalm", "selah")
    }))
    .unwrap();
    let lib = &lib;
    let errors = Arc::new(AtomicUsize::new(0));

    std::thread::scope(|scope| {
        scope.spawn(move || {
            for i in 0..30 {
                assert!(lib.remove(&format!("r{i}"), Language::English).unwrap());
            }
        });

        for _ in 0..4 {
            let errors = Arc::clone(&errors);
            scope.spawn(move || {
                let subscriber =
                    tracing_subscriber::registry().with(ErrorCounter(errors));
                tracing::subscriber::with_default(subscriber, || {
                    for _ in 0..50 {
                        let results = search(lib, "selah", Language::English);
                        assert!(results.total_count <= 30);
                    }
                });
            });
        }
    });

    assert_eq!(errors.load(Ordering::SeqCst), 0);
    assert!(search(lib, "selah", Language::English).is_empty());
}

#[test]
fn category_label_alone_finds_a_document() {
    let (_tmp, lib) = library();
    lib.ingest(
        Document::new("c1", Language::English, "Sunday talk", "we met today")
            .with_categories(["Advent"]),
    )
    .unwrap();

    let results = search(&lib, "advent", Language::English);
    assert_eq!(results.total_count, 1);
    assert!(results.hits[0].fields.categories);
}

#[test]
fn category_filter_does_not_stop_the_fallback() {
    let (_tmp, lib) = library();
    lib.ingest_batch([
        Document::new("x", Language::English, "T", "grace faith adjacent")
            .with_categories(["A"]),
        Document::new(
            "y",
            Language::English,
            "T",
            "grace is given through faith",
        )
        .with_categories(["B"]),
    ])
    .unwrap();

    let request = lib
        .request("grace faith", Language::English)
        .with_categories(["B"]);
    let results = lib.search(&request).unwrap();
    assert_eq!(results.tier, Some(MatchTier::AnyOf));
    assert_eq!(ids(&results), ["y"]);
}

#[test]
fn word_too_long_to_index_is_still_found() {
    let (_tmp, lib) = library();
    let word = "a".repeat(45);
    lib.ingest(Document::new(
        "long",
        Language::English,
        "T",
        format!("see {word} here"),
    ))
    .unwrap();

    let results = search(&lib, &word, Language::English);
    assert_eq!(results.total_count, 1);
    assert_eq!(results.tier, Some(MatchTier::Substring));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn deleted_documents_are_not_found(token in "[a-z]{4,10}") {
        let (_tmp, lib) = library();
        lib.ingest(Document::new("d", Language::English, "T", token.clone()))
            .unwrap();
        prop_assert_eq!(search(&lib, &token, Language::English).total_count, 1);

        lib.remove("d", Language::English).unwrap();
        prop_assert!(search(&lib, &token, Language::English).is_empty());
    }

    #[test]
    fn updates_replace_searchable_text(
        old in "[a-z]{4,10}",
        new in "[a-z]{4,10}",
    ) {
        prop_assume!(!old.contains(&new) && !new.contains(&old));
        let (_tmp, lib) = library();
        lib.ingest(Document::new("d", Language::English, "T", old.clone()))
            .unwrap();
        lib.ingest(Document::new("d", Language::English, "T", new.clone()))
            .unwrap();

        prop_assert!(search(&lib, &old, Language::English).is_empty());
        let results = search(&lib, &new, Language::English);
        prop_assert_eq!(ids(&results), vec!["d"]);
    }
}
