use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use lectern::Language;

#[derive(Debug, Parser)]
#[command(
    name = "lectern",
    about = "Full-text search over transcribed documents"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Load documents from .json/.jsonl files or directories
    Ingest(IngestArgs),
    /// Delete one language variant of a document
    Remove(RemoveArgs),
    /// Search documents of one language
    Search(SearchArgs),
    /// Show a document reflowed into paragraphs
    Get(GetArgs),
    /// Show the passages of a document that contain a phrase
    Snippets(SnippetsArgs),
    /// List documents by title
    List(ListArgs),
    /// List the category labels in use
    Categories(LanguageArgs),
    /// Show corpus statistics
    Stats(LanguageArgs),
    /// Rebuild the search index from the document store
    Rebuild,
    /// Show system status
    Status(StatusArgs),
    /// Inspect or change persisted settings
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

fn parse_language(s: &str) -> Result<Language, String> {
    s.parse().map_err(|_| format!("expected one of: en, es (got '{s}')"))
}

// -- Ingest / Remove --

#[derive(Debug, Parser)]
pub struct IngestArgs {
    /// Files or directories to load
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, Parser)]
pub struct RemoveArgs {
    /// External document id
    pub id: String,

    /// Language variant to remove
    #[arg(short, long, default_value = "en", value_parser = parse_language)]
    pub language: Language,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query
    pub query: String,

    /// Language to search in
    #[arg(short, long, default_value = "en", value_parser = parse_language)]
    pub language: Language,

    /// Only keep documents with this category (repeatable, any may match)
    #[arg(short, long = "category")]
    pub categories: Vec<String>,

    /// Page number, starting at 1
    #[arg(short, long, default_value = "1")]
    pub page: usize,

    /// Results per page (defaults to the search.page_size setting)
    #[arg(short = 'n', long)]
    pub page_size: Option<usize>,

    /// Print matching passages under each hit
    #[arg(long)]
    pub snippets: bool,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Get / Snippets --

#[derive(Debug, Parser)]
pub struct GetArgs {
    /// External document id
    pub id: String,

    /// Preferred language variant
    #[arg(short, long, default_value = "en", value_parser = parse_language)]
    pub language: Language,

    /// Output as JSON with paragraphs
    #[arg(long)]
    pub json: bool,

    /// Print only metadata
    #[arg(long)]
    pub meta: bool,
}

#[derive(Debug, Parser)]
pub struct SnippetsArgs {
    /// External document id
    pub id: String,

    /// Text to look for
    pub query: String,

    #[arg(short, long, default_value = "en", value_parser = parse_language)]
    pub language: Language,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- List / Categories / Stats --

#[derive(Debug, Parser)]
pub struct ListArgs {
    #[arg(short, long, default_value = "en", value_parser = parse_language)]
    pub language: Language,

    /// Page number, starting at 1
    #[arg(short, long, default_value = "1")]
    pub page: usize,

    /// Entries per page (defaults to the search.page_size setting)
    #[arg(short = 'n', long)]
    pub page_size: Option<usize>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Parser)]
pub struct LanguageArgs {
    #[arg(short, long, default_value = "en", value_parser = parse_language)]
    pub language: Language,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Config --

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Show every setting with its effective value
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Persist a setting
    Set { key: String, value: String },
    /// Remove a persisted setting (revert to default)
    Clear { key: String },
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "lectern",
            &mut std::io::stdout(),
        );
    }
}
