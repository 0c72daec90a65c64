//! # Corpus Ingest
//!
//! Streaming ingestion of tabular social-media exports and paginated
//! documents into cleaned, chunked text records.
//!
//! Two pipelines share one text normalizer:
//!
//! ```text
//! ┌────────────┐   ┌───────────┐   ┌──────────┐   ┌──────────────┐
//! │ CSV rows   │──▶│  clean    │──▶│  batch   │──▶│ text_records │
//! └────────────┘   └───────────┘   └──────────┘   └──────────────┘
//!
//! ┌────────────┐   ┌───────────┐   ┌──────────┐   ┌──────────────┐
//! │ PDF pages  │──▶│  chunk    │──▶│ clean +  │──▶│  documents + │
//! │ (range)    │   │ sentences │   │ formula  │   │  chunks      │
//! └────────────┘   └───────────┘   └──────────┘   └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! corpus init
//! corpus import resource:tweets.csv
//! corpus extract ./books/analysis.pdf
//! corpus search "theorem"
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`clean`] | Staged text normalization |
//! | [`chunk`] | Sentence-boundary chunking |
//! | [`formula`] | Formula heuristic |
//! | [`import`] | Batched CSV import |
//! | [`extract`] | Paginated sources (PDF) |
//! | [`paged`] | Page-range extraction and chunk post-processing |
//! | [`documents`] | Document processing, lookup, and search |
//! | [`blob`] | Content-addressed blob storage |
//! | [`store`] | Persistence traits and backends |
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`logging`] | Tracing subscriber setup |

pub mod blob;
pub mod chunk;
pub mod clean;
pub mod config;
pub mod db;
pub mod documents;
pub mod extract;
pub mod formula;
pub mod import;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod paged;
pub mod store;
