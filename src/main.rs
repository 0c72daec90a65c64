//! # Corpus CLI (`corpus`)
//!
//! ## Usage
//!
//! ```bash
//! corpus --config ./config/corpus.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `corpus init` | Create the SQLite database and run schema migrations |
//! | `corpus import [PATHS..]` | Clean and batch-import CSV exports |
//! | `corpus extract <PATH>` | Extract, chunk, and store one PDF |
//! | `corpus docs` | List extracted documents |
//! | `corpus show <id>` | Show one document |
//! | `corpus chunks <id>` | Print a document's chunks in order |
//! | `corpus search "<text>"` | Find chunks containing text |
//! | `corpus delete <id>` | Remove a document and its chunks |
//! | `corpus clean` | Normalize text from stdin |
//!
//! ## Examples
//!
//! ```bash
//! # Import the configured sources, keeping hashtags
//! corpus import --keep-hashtags
//!
//! # Import two explicit files, aborting on the first broken one
//! corpus import resource:tweets.csv ./extra.csv --fail-fast --json
//!
//! # Extract a large textbook
//! corpus extract ./books/calculus.pdf
//! ```

use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use corpus_ingest::clean::{clean, CleanOptions};
use corpus_ingest::import::{self, ImportRequest, ImportResult};
use corpus_ingest::{config, documents, logging, migrate};

/// Corpus ingestion CLI.
///
/// All commands except `clean` read a TOML configuration file given by
/// `--config`.
#[derive(Parser)]
#[command(
    name = "corpus",
    about = "Clean, chunk, and store text from CSV exports and PDF documents",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/corpus.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it again leaves existing data in place.
    Init,

    /// Import CSV sources into text records.
    ///
    /// Sources are `resource:<name>` (looked up in `import.resource_dirs`)
    /// or plain paths. Without arguments, `import.file_paths` is used.
    Import {
        /// Sources to import instead of the configured ones.
        paths: Vec<String>,

        /// Rows per flush.
        #[arg(long)]
        batch_size: Option<usize>,

        /// Do not strip #hashtags.
        #[arg(long)]
        keep_hashtags: bool,

        /// Do not strip @mentions.
        #[arg(long)]
        keep_mentions: bool,

        /// Do not strip emoji and other symbols.
        #[arg(long)]
        keep_emoji: bool,

        /// Abort the whole run on the first failing source.
        #[arg(long)]
        fail_fast: bool,

        /// Print the result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Extract one PDF into document chunks.
    Extract {
        path: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// List documents.
    Docs {
        /// Only documents in this status (pending, processing, completed, failed).
        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        json: bool,
    },

    /// Show one document.
    Show { id: String },

    /// Print the chunks of a document in index order.
    Chunks {
        id: String,

        #[arg(long)]
        json: bool,
    },

    /// Find chunks whose text contains TEXT.
    Search {
        text: String,

        #[arg(long)]
        json: bool,
    },

    /// Delete a document and its chunks.
    Delete { id: String },

    /// Normalize text read from stdin and print it.
    ///
    /// Prints nothing when the text cleans to empty.
    Clean {
        #[arg(long)]
        keep_hashtags: bool,

        #[arg(long)]
        keep_mentions: bool,

        #[arg(long)]
        keep_emoji: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging();
    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Clean {
        keep_hashtags,
        keep_mentions,
        keep_emoji,
    } = cli.command
    {
        let mut input = String::new();
        std::io::stdin()
            .read_to_string(&mut input)
            .context("Failed to read stdin")?;
        let options = CleanOptions {
            remove_hashtag: !keep_hashtags,
            remove_mention: !keep_mentions,
            remove_emoji: !keep_emoji,
        };
        if let Some(text) = clean(Some(&input), options) {
            println!("{}", text);
        }
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("initialized");
        }
        Commands::Import {
            paths,
            batch_size,
            keep_hashtags,
            keep_mentions,
            keep_emoji,
            fail_fast,
            json,
        } => {
            let request = ImportRequest {
                paths,
                batch_size,
                keep_hashtags,
                keep_mentions,
                keep_emoji,
                fail_fast,
            };
            let result = import::run_import(&cfg, &request).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_import(&result);
            }
        }
        Commands::Extract { path, json } => {
            documents::run_extract(&cfg, &path, json).await?;
        }
        Commands::Docs { status, json } => {
            documents::run_docs(&cfg, status.as_deref(), json).await?;
        }
        Commands::Show { id } => {
            documents::run_show(&cfg, &id).await?;
        }
        Commands::Chunks { id, json } => {
            documents::run_chunks(&cfg, &id, json).await?;
        }
        Commands::Search { text, json } => {
            documents::run_search(&cfg, &text, json).await?;
        }
        Commands::Delete { id } => {
            documents::run_delete(&cfg, &id).await?;
        }
        Commands::Clean { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}

fn print_import(result: &ImportResult) {
    println!("import");
    for file in &result.files_processed {
        println!(
            "  {}: read {}, saved {}, skipped {}, errors {}",
            file.path, file.rows_read, file.rows_saved, file.rows_skipped_empty, file.errors
        );
        if let Some(ref message) = file.error_message {
            println!("    error: {}", message);
        }
    }
    println!(
        "  total: read {}, saved {}, skipped {}, errors {}",
        result.rows_read, result.rows_saved, result.rows_skipped_empty, result.errors
    );
    println!("ok");
}
