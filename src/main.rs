use clap::Parser;
use lectern::{
    DataDir,
    Error,
    Language,
    Library,
    Result,
    config::SearchConfig,
    ingestion,
    paragraph,
    search,
    snippet,
    stats,
    walker,
};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command, ConfigAction};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("LECTERN_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Completions(args) = &cli.command {
        args.generate();
        return Ok(());
    }

    init_tracing(cli.verbose, cli.quiet);

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;
    let mut library = Library::open(&data_dir)?;

    match cli.command {
        Command::Ingest(args) => cmd_ingest(&library, &args)?,
        Command::Remove(args) => {
            if !library.remove(&args.id, args.language)? {
                return Err(Error::NotFound {
                    kind: "document",
                    name: format!("{}:{}", args.language, args.id),
                });
            }
            println!("Removed {}:{}", args.language, args.id);
        }
        Command::Search(args) => cmd_search(&library, &args)?,
        Command::Get(args) => cmd_get(&library, &args)?,
        Command::Snippets(args) => cmd_snippets(&library, &args)?,
        Command::List(args) => cmd_list(&library, &args)?,
        Command::Categories(args) => {
            let labels = library.categories(args.language)?;
            if args.json {
                println!("{}", serde_json::to_string(&labels)?);
            } else if labels.is_empty() {
                println!("No categories for {}.", args.language);
            } else {
                for label in &labels {
                    println!("{label}");
                }
            }
        }
        Command::Stats(args) => {
            let corpus = library.stats(args.language)?;
            if args.json {
                println!("{}", serde_json::to_string(&corpus)?);
            } else {
                stats::format_human(&corpus);
            }
        }
        Command::Rebuild => {
            let count = library.rebuild()?;
            eprintln!("Rebuilt index with {count} documents.");
        }
        Command::Status(args) => cmd_status(&library, &data_dir, args.json)?,
        Command::Config { action } => cmd_config(&mut library, action)?,
        Command::Completions(_) => {}
    }

    Ok(())
}

fn cmd_ingest(library: &Library, args: &cli::IngestArgs) -> Result<()> {
    let mut files = Vec::new();
    for path in &args.paths {
        files.extend(walker::discover_files(path)?);
    }
    if files.is_empty() {
        eprintln!("No .json or .jsonl files found.");
        return Ok(());
    }
    eprintln!("Found {} file(s)", files.len());

    let documents = ingestion::load_documents(&files)?;
    let count = library.ingest_batch(documents)?;
    info!(files = files.len(), count, "ingest complete");
    eprintln!("Ingested {count} document(s).");
    Ok(())
}

fn cmd_search(library: &Library, args: &cli::SearchArgs) -> Result<()> {
    let mut request = library
        .request(&args.query, args.language)
        .with_categories(&args.categories)
        .with_page(args.page);
    if let Some(page_size) = args.page_size {
        request = request.with_page_size(page_size);
    }

    let results = library.search(&request)?;

    if args.json {
        return search::format_json(&results, &args.query);
    }
    search::format_human(&results);

    if args.snippets {
        for hit in &results.hits {
            let Some(document) = library.get(&hit.id, hit.language)? else {
                continue;
            };
            println!("\n--- {}:{} {} ---", hit.language, hit.id, hit.title);
            for text in library.snippets(&document.body, &args.query) {
                let marked = snippet::highlight(&text, &args.query, "[", "]");
                println!("  ...{marked}...");
            }
        }
    }
    Ok(())
}

fn cmd_get(library: &Library, args: &cli::GetArgs) -> Result<()> {
    let document = library.get(&args.id, args.language)?.ok_or_else(|| {
        Error::NotFound {
            kind: "document",
            name: format!("{}:{}", args.language, args.id),
        }
    })?;
    if document.language != args.language {
        eprintln!(
            "No {} variant of '{}', showing {}.",
            args.language, args.id, document.language
        );
    }

    if args.json {
        let mut value = serde_json::to_value(&document)?;
        if args.meta {
            if let Some(object) = value.as_object_mut() {
                object.remove("body");
            }
        } else {
            value["paragraphs"] = json!(library.paragraphs(&document.body));
        }
        println!("{value}");
        return Ok(());
    }

    println!("id: {}", document.id);
    println!("language: {}", document.language);
    println!("title: {}", document.title);
    if !document.categories.is_empty() {
        println!("categories: {}", document.categories.join(", "));
    }
    println!("words: {}", document.word_count());
    if args.meta {
        return Ok(());
    }

    println!();
    let paragraphs = library.paragraphs(&document.body);
    if paragraphs.is_empty() {
        println!("{}", paragraph::NO_TRANSCRIPTION);
    }
    for p in &paragraphs {
        println!("{p}\n");
    }
    Ok(())
}

fn cmd_snippets(library: &Library, args: &cli::SnippetsArgs) -> Result<()> {
    let document = library.get(&args.id, args.language)?.ok_or_else(|| {
        Error::NotFound {
            kind: "document",
            name: format!("{}:{}", args.language, args.id),
        }
    })?;
    let snippets = library.snippets(&document.body, &args.query);

    if args.json {
        println!(
            "{}",
            json!({
                "id": document.id,
                "language": document.language,
                "query": args.query,
                "snippets": snippets,
            })
        );
    } else {
        for text in &snippets {
            println!("{}\n", snippet::highlight(text, &args.query, "[", "]"));
        }
    }
    Ok(())
}

fn cmd_list(library: &Library, args: &cli::ListArgs) -> Result<()> {
    let page_size = args.page_size.unwrap_or(library.config().page_size);
    let listing = library.list(args.language, args.page, page_size)?;

    if args.json {
        println!("{}", serde_json::to_string(&listing)?);
    } else if listing.entries.is_empty() {
        println!("No documents.");
    } else {
        for entry in &listing.entries {
            println!("{}\t{}", entry.id, entry.title);
            println!("    {}", entry.preview);
        }
        println!(
            "\n{} document(s), page {} of {}",
            listing.total_count,
            listing.page,
            listing.total_count.div_ceil(listing.page_size)
        );
    }
    Ok(())
}

fn cmd_status(library: &Library, data_dir: &DataDir, json: bool) -> Result<()> {
    let documents = library.document_count()?;
    let indexed = library.index().num_docs();
    let mut per_language = Vec::new();
    for language in Language::ALL {
        per_language.push((language, library.store().documents(language)?.len()));
    }

    if json {
        let languages: serde_json::Map<String, serde_json::Value> = per_language
            .iter()
            .map(|(l, n)| (l.to_string(), json!(n)))
            .collect();
        println!(
            "{}",
            json!({
                "data_dir": data_dir.root().display().to_string(),
                "data_dir_source": data_dir.source().to_string(),
                "documents": documents,
                "indexed": indexed,
                "languages": languages,
            })
        );
    } else {
        println!(
            "Data directory: {} (from {})",
            data_dir.root().display(),
            data_dir.source()
        );
        println!("Documents: {documents}");
        for (language, count) in &per_language {
            println!("  {language}: {count}");
        }
        println!("Indexed: {indexed}");
    }
    Ok(())
}

fn cmd_config(library: &mut Library, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show { json } => {
            let entries = library.config().entries();
            if json {
                let map: serde_json::Map<String, serde_json::Value> = entries
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), json!(v)))
                    .collect();
                println!("{}", serde_json::Value::Object(map));
            } else {
                let persisted = library.store().list_settings()?;
                for (key, value) in entries {
                    let marker = if persisted.iter().any(|(k, _)| k == key) {
                        ""
                    } else {
                        " (default)"
                    };
                    println!("{key} = {value}{marker}");
                }
            }
        }
        ConfigAction::Set { key, value } => {
            library.set_setting(&key, &value)?;
            println!("Set {key} = {}", value.trim());
        }
        ConfigAction::Clear { key } => {
            if library.clear_setting(&key)? {
                let default = SearchConfig::default()
                    .entries()
                    .into_iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| v)
                    .unwrap_or_default();
                println!("Cleared {key} (default: {default})");
            } else {
                println!("{key} was not set");
            }
        }
    }
    Ok(())
}
