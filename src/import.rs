//! Batched import of tabular text exports.
//!
//! Each source is a header-mapped CSV file. Rows are read one at a time,
//! the configured text column is cleaned with [`crate::clean`], and
//! surviving rows are buffered and flushed to a [`RecordSink`] in
//! fixed-size batches. `rows_saved` only grows at flush time, so it
//! reflects what the sink actually accepted.
//!
//! Failure isolation: row-level problems (missing column, empty after
//! cleaning) are absorbed into counters. Source-level problems (source
//! cannot be opened, malformed CSV, sink failure) become a failed
//! [`FileResult`] and the run moves on, unless `fail_fast` is set, in
//! which case the first one aborts the whole run.

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clean::{clean, CleanOptions};
use crate::config::{Config, ImportConfig};
use crate::db;
use crate::models::TextRecord;
use crate::store::RecordSink;

/// Prefix marking a location that should be looked up in the resource dirs.
pub const RESOURCE_PREFIX: &str = "resource:";

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("cannot open source '{location}': {reason}")]
    SourceOpen { location: String, reason: String },

    #[error("malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to persist batch: {0}")]
    Persistence(String),

    #[error("import aborted at '{location}': {source}")]
    RunAborted {
        location: String,
        source: Box<ImportError>,
    },
}

/// Options for one import run. Built once, never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportOptions {
    pub batch_size: usize,
    pub remove_hashtag: bool,
    pub remove_mention: bool,
    pub remove_emoji: bool,
    pub fail_fast: bool,
}

impl ImportOptions {
    pub fn from_config(config: &ImportConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            remove_hashtag: config.remove_hashtag,
            remove_mention: config.remove_mention,
            remove_emoji: config.remove_emoji,
            fail_fast: config.fail_fast,
        }
    }

    pub fn clean_options(&self) -> CleanOptions {
        CleanOptions {
            remove_hashtag: self.remove_hashtag,
            remove_mention: self.remove_mention,
            remove_emoji: self.remove_emoji,
        }
    }
}

/// Per-source counters. Updated by value, one new copy per row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportCounters {
    pub rows_read: u64,
    pub rows_saved: u64,
    pub rows_skipped_empty: u64,
    pub errors: u64,
}

/// Outcome of one source. `error_message` is set only when the source
/// failed as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileResult {
    pub path: String,
    pub rows_read: u64,
    pub rows_saved: u64,
    pub rows_skipped_empty: u64,
    pub errors: u64,
    pub error_message: Option<String>,
}

impl FileResult {
    pub fn completed(path: &str, counters: ImportCounters) -> Self {
        Self {
            path: path.to_string(),
            rows_read: counters.rows_read,
            rows_saved: counters.rows_saved,
            rows_skipped_empty: counters.rows_skipped_empty,
            errors: counters.errors,
            error_message: None,
        }
    }

    pub fn failed(path: &str, message: String) -> Self {
        Self {
            path: path.to_string(),
            rows_read: 0,
            rows_saved: 0,
            rows_skipped_empty: 0,
            errors: 1,
            error_message: Some(message),
        }
    }
}

/// Totals over every [`FileResult`] of a run, plus the options used.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportResult {
    pub rows_read: u64,
    pub rows_saved: u64,
    pub rows_skipped_empty: u64,
    pub errors: u64,
    pub options: ImportOptions,
    pub files_processed: Vec<FileResult>,
}

impl ImportResult {
    /// Totals are derived from `files`; no separate running sum is kept.
    pub fn from_files(options: ImportOptions, files: Vec<FileResult>) -> Self {
        Self {
            rows_read: files.iter().map(|f| f.rows_read).sum(),
            rows_saved: files.iter().map(|f| f.rows_saved).sum(),
            rows_skipped_empty: files.iter().map(|f| f.rows_skipped_empty).sum(),
            errors: files.iter().map(|f| f.errors).sum(),
            options,
            files_processed: files,
        }
    }
}

/// One way of turning a location string into an open file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStrategy {
    /// Look the location up relative to a resource directory. A leading
    /// `resource:` prefix is stripped first.
    ResourceDir(PathBuf),
    /// Open the location as given.
    PlainPath,
}

impl SourceStrategy {
    fn try_open(&self, location: &str) -> std::result::Result<File, String> {
        match self {
            SourceStrategy::ResourceDir(dir) => {
                let relative = location.strip_prefix(RESOURCE_PREFIX).unwrap_or(location);
                let candidate = dir.join(relative.trim_start_matches('/'));
                if !candidate.is_file() {
                    return Err(format!("not found under {}", dir.display()));
                }
                File::open(&candidate).map_err(|e| format!("{}: {}", candidate.display(), e))
            }
            SourceStrategy::PlainPath => {
                File::open(Path::new(location)).map_err(|e| format!("{}: {}", location, e))
            }
        }
    }
}

/// Ordered list of [`SourceStrategy`]s; the first that opens wins.
#[derive(Debug, Clone)]
pub struct SourceResolver {
    strategies: Vec<SourceStrategy>,
}

impl SourceResolver {
    /// Resource dirs in the given order, then the plain path.
    pub fn new(resource_dirs: &[PathBuf]) -> Self {
        let mut strategies: Vec<SourceStrategy> = resource_dirs
            .iter()
            .cloned()
            .map(SourceStrategy::ResourceDir)
            .collect();
        strategies.push(SourceStrategy::PlainPath);
        Self { strategies }
    }

    pub fn open(&self, location: &str) -> Result<File, ImportError> {
        let mut last_reason = String::from("no lookup strategy configured");
        for strategy in &self.strategies {
            match strategy.try_open(location) {
                Ok(file) => return Ok(file),
                Err(reason) => last_reason = reason,
            }
        }
        Err(ImportError::SourceOpen {
            location: location.to_string(),
            reason: last_reason,
        })
    }
}

/// Drives import runs against a [`RecordSink`].
pub struct BatchImporter<'a> {
    sink: &'a dyn RecordSink,
    resolver: SourceResolver,
    text_column: String,
}

impl<'a> BatchImporter<'a> {
    pub fn new(sink: &'a dyn RecordSink, resolver: SourceResolver, text_column: &str) -> Self {
        Self {
            sink,
            resolver,
            text_column: text_column.to_string(),
        }
    }

    /// Import every source in order.
    ///
    /// With `fail_fast`, the first source-level failure is returned as
    /// [`ImportError::RunAborted`] and no result is produced. Otherwise the
    /// failure is recorded as a [`FileResult`] with `errors == 1` and the
    /// run continues.
    pub async fn import_all(
        &self,
        sources: &[String],
        options: &ImportOptions,
    ) -> Result<ImportResult, ImportError> {
        let mut results = Vec::with_capacity(sources.len());

        for location in sources {
            match self.import_source(location, options).await {
                Ok(result) => results.push(result),
                Err(e) if options.fail_fast => {
                    return Err(ImportError::RunAborted {
                        location: location.clone(),
                        source: Box::new(e),
                    });
                }
                Err(e) => {
                    warn!(source = %location, error = %e, "source failed; continuing");
                    results.push(FileResult::failed(location, e.to_string()));
                }
            }
        }

        Ok(ImportResult::from_files(*options, results))
    }

    /// Import one source, flushing every `batch_size` buffered rows and
    /// once more at the end for any remainder.
    pub async fn import_source(
        &self,
        location: &str,
        options: &ImportOptions,
    ) -> Result<FileResult, ImportError> {
        info!(source = %location, "import started");

        let file = self.resolver.open(location)?;
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .quote(b'"')
            .flexible(true)
            .from_reader(file);

        let column = reader
            .byte_headers()?
            .iter()
            .position(|h| String::from_utf8_lossy(h) == self.text_column.as_str());
        if column.is_none() {
            warn!(source = %location, column = %self.text_column, "text column missing from header");
        }

        let batch_size = options.batch_size.max(1);
        let mut counters = ImportCounters::default();
        let mut buffer: Vec<TextRecord> = Vec::with_capacity(batch_size);

        // Fields are decoded lossily in `process_record`; invalid UTF-8
        // becomes U+FFFD.
        for row in reader.byte_records() {
            let row = row?;
            counters = process_record(&row, column, location, options, &mut buffer, counters);
            if buffer.len() >= batch_size {
                let saved = self.flush(&mut buffer).await?;
                counters = ImportCounters {
                    rows_saved: counters.rows_saved + saved,
                    ..counters
                };
            }
        }

        if !buffer.is_empty() {
            let saved = self.flush(&mut buffer).await?;
            counters = ImportCounters {
                rows_saved: counters.rows_saved + saved,
                ..counters
            };
        }

        info!(
            source = %location,
            rows_read = counters.rows_read,
            rows_saved = counters.rows_saved,
            rows_skipped_empty = counters.rows_skipped_empty,
            errors = counters.errors,
            "import finished"
        );
        Ok(FileResult::completed(location, counters))
    }

    async fn flush(&self, buffer: &mut Vec<TextRecord>) -> Result<u64, ImportError> {
        let saved = self
            .sink
            .save_all(buffer)
            .await
            .map_err(|e| ImportError::Persistence(format!("{:#}", e)))?;
        debug!(saved, "flushed batch");
        buffer.clear();
        Ok(saved as u64)
    }
}

/// Apply one row to the counters. A row without the text column is a
/// structural error and is never cleaned; a row that cleans to nothing is
/// skipped; anything else is buffered without touching `rows_saved`.
fn process_record(
    row: &csv::ByteRecord,
    column: Option<usize>,
    source: &str,
    options: &ImportOptions,
    buffer: &mut Vec<TextRecord>,
    counters: ImportCounters,
) -> ImportCounters {
    let counters = ImportCounters {
        rows_read: counters.rows_read + 1,
        ..counters
    };

    let Some(raw) = column.and_then(|idx| row.get(idx)).map(String::from_utf8_lossy) else {
        return ImportCounters {
            errors: counters.errors + 1,
            ..counters
        };
    };

    match clean(Some(raw.as_ref()), options.clean_options()) {
        None => ImportCounters {
            rows_skipped_empty: counters.rows_skipped_empty + 1,
            ..counters
        },
        Some(text) => {
            buffer.push(TextRecord::new(text, source));
            counters
        }
    }
}

/// Per-call overrides of the configured import options.
#[derive(Debug, Clone, Default)]
pub struct ImportRequest {
    pub paths: Vec<String>,
    pub batch_size: Option<usize>,
    pub keep_hashtags: bool,
    pub keep_mentions: bool,
    pub keep_emoji: bool,
    pub fail_fast: bool,
}

impl ImportRequest {
    /// Merge onto the configured defaults.
    pub fn options(&self, config: &ImportConfig) -> ImportOptions {
        let base = ImportOptions::from_config(config);
        ImportOptions {
            batch_size: self.batch_size.unwrap_or(base.batch_size),
            remove_hashtag: base.remove_hashtag && !self.keep_hashtags,
            remove_mention: base.remove_mention && !self.keep_mentions,
            remove_emoji: base.remove_emoji && !self.keep_emoji,
            fail_fast: base.fail_fast || self.fail_fast,
        }
    }

    pub fn sources(&self, config: &ImportConfig) -> Vec<String> {
        if self.paths.is_empty() {
            config.file_paths.clone()
        } else {
            self.paths.clone()
        }
    }
}

/// CLI entry point: import every configured source into the database.
pub async fn run_import(config: &Config, request: &ImportRequest) -> anyhow::Result<ImportResult> {
    let options = request.options(&config.import);
    if options.batch_size == 0 {
        anyhow::bail!("batch size must be > 0");
    }
    let sources = request.sources(&config.import);
    if sources.is_empty() {
        anyhow::bail!("No import sources: set import.file_paths or pass paths");
    }

    let store = db::open_store(config).await?;
    let importer = BatchImporter::new(
        &store,
        SourceResolver::new(&config.import.resource_dirs),
        &config.import.text_column,
    );

    let result = importer.import_all(&sources, &options).await;
    store.close().await;
    Ok(result?)
}
