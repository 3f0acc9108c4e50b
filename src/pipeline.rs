//! Pipeline orchestration: enumerate invoice files, drive extraction and
//! normalisation per file, archive processed files, and record one outcome
//! per file.
//!
//! ## Per-file state machine
//!
//! ```text
//!            ┌── extraction error ──▶ Error    (file stays in input dir)
//! file ──────┤
//!            ├── zero items ────────▶ Warning  (file archived)
//!            └── items > 0 ─────────▶ Success  (file archived)
//! ```
//!
//! A Warning is not a failure: the file was read and the oracle answered,
//! there was just nothing to extract (or nothing parseable — the two are
//! indistinguishable by design). Only extraction errors leave the file in
//! place for manual inspection or a retry on the next run.
//!
//! Execution is strictly sequential — one file, one table, one oracle call
//! at a time. The archive directory and the report are single-writer under
//! this model; do not run concurrent pipelines against the same paths.

use crate::client::LineItemExtractor;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, TableExtractError};
use crate::oracle::OracleTransport;
use crate::schema::{normalize, LineItem};
use crate::tables::{PdfTableSource, TableSource};
use chrono::Local;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Terminal state of one processed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FileStatus {
    /// At least one line item extracted; file archived.
    Success,
    /// No error, but zero items; file archived anyway.
    Warning,
    /// Extraction failed; file left in the input directory.
    Error,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Success => write!(f, "Success"),
            FileStatus::Warning => write!(f, "Warning: no items found"),
            FileStatus::Error => write!(f, "Error"),
        }
    }
}

/// One row of the processing ledger — created once per input file, never
/// mutated afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub filename: String,
    /// Local wall-clock timestamp, `%Y-%m-%d %H:%M:%S`.
    pub date: String,
    pub status: FileStatus,
    pub items_extracted: usize,
    /// Empty unless `status == Error`.
    pub error_details: String,
    /// Wall-clock seconds, rounded to 2 decimals.
    pub duration_sec: f64,
}

impl FileOutcome {
    fn new(
        filename: String,
        status: FileStatus,
        items_extracted: usize,
        error_details: String,
        started: Instant,
    ) -> Self {
        Self {
            filename,
            date: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            status,
            items_extracted,
            error_details,
            duration_sec: round2(started.elapsed().as_secs_f64()),
        }
    }
}

fn round2(secs: f64) -> f64 {
    (secs * 100.0).round() / 100.0
}

/// Result of one pipeline run.
#[derive(Debug, Default)]
pub struct RunOutput {
    /// All normalised line items, in file → table → oracle-array order.
    pub items: Vec<LineItem>,
    /// One outcome per processed file, in processing order.
    pub outcomes: Vec<FileOutcome>,
}

/// Orchestrates the extraction of every invoice in the input directory.
pub struct InvoicePipeline {
    config: PipelineConfig,
    tables: Box<dyn TableSource>,
    extractor: LineItemExtractor,
}

impl InvoicePipeline {
    /// Build a pipeline with the default `pdf-extract` table source.
    pub fn new(config: PipelineConfig, transport: Arc<dyn OracleTransport>) -> Self {
        let extractor = LineItemExtractor::new(transport, config.max_parse_attempts);
        Self {
            config,
            tables: Box::new(PdfTableSource::new()),
            extractor,
        }
    }

    /// Replace the table source (tests, OCR backends).
    pub fn with_table_source(mut self, tables: Box<dyn TableSource>) -> Self {
        self.tables = tables;
        self
    }

    /// Process every supported file in the input directory.
    ///
    /// # Errors
    /// Fatal only: [`PipelineError::InputDirMissing`] when the input
    /// directory does not exist, or an I/O error enumerating it. Per-file
    /// failures are absorbed into Error outcomes and the run continues.
    pub async fn process_all(&self) -> Result<RunOutput, PipelineError> {
        let input_dir = &self.config.input_dir;
        if !input_dir.is_dir() {
            return Err(PipelineError::InputDirMissing {
                path: input_dir.clone(),
            });
        }

        let files = self.enumerate_files(input_dir)?;
        info!("Found {} file(s) to process in {}", files.len(), input_dir.display());

        let mut run = RunOutput::default();

        for path in files {
            let outcome = self.process_file(&path, &mut run.items).await;
            info!(
                "{}: {} ({} item(s), {:.2}s)",
                outcome.filename, outcome.status, outcome.items_extracted, outcome.duration_sec
            );
            run.outcomes.push(outcome);
        }

        info!("Run complete: {} line item(s) total", run.items.len());
        Ok(run)
    }

    /// Candidate files: supported extension, outside the archive path,
    /// sorted by name for deterministic processing order.
    fn enumerate_files(&self, dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
        let archive_dir = self.config.archive_dir();
        let entries = std::fs::read_dir(dir).map_err(|e| PipelineError::Io {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .filter(|p| self.config.is_supported(p))
            .filter(|p| !p.starts_with(&archive_dir))
            .collect();

        files.sort_by_key(|p| p.file_name().map(|n| n.to_os_string()));
        Ok(files)
    }

    /// Run one file through extraction → oracle → normalisation, then
    /// archive or leave in place according to the outcome.
    async fn process_file(&self, path: &Path, items: &mut Vec<LineItem>) -> FileOutcome {
        let started = Instant::now();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let file_items = match self.extract_file_items(path, &filename).await {
            Ok(v) => v,
            Err(e) => {
                error!("Error processing {filename}: {e}");
                return FileOutcome::new(
                    filename,
                    FileStatus::Error,
                    0,
                    e.to_string(),
                    started,
                );
            }
        };

        let count = file_items.len();
        items.extend(file_items);

        let status = if count > 0 {
            FileStatus::Success
        } else {
            warn!("No line items found in {filename}");
            FileStatus::Warning
        };

        // Success and Warning both count as processed: archive the file.
        if let Err(e) = self.archive_file(path) {
            error!("Failed to archive {filename}: {e}");
            return FileOutcome::new(
                filename,
                FileStatus::Error,
                count,
                format!("archive move failed: {e}"),
                started,
            );
        }

        FileOutcome::new(filename, status, count, String::new(), started)
    }

    async fn extract_file_items(
        &self,
        path: &Path,
        filename: &str,
    ) -> Result<Vec<LineItem>, TableExtractError> {
        let tables = self.tables.extract_tables(path)?;
        let mut items = Vec::new();

        for table in &tables {
            let raw_records = self.extractor.extract_line_items(&table.text).await;
            items.extend(raw_records.iter().map(|r| normalize(r, filename)));
        }

        Ok(items)
    }

    /// Move a processed file into the archive directory.
    ///
    /// Name collisions get a timestamp suffix on the stem; if that name is
    /// taken too (two moves within one second), a counter disambiguates.
    /// Archived files are never overwritten.
    fn archive_file(&self, path: &Path) -> std::io::Result<PathBuf> {
        let archive_dir = self.config.archive_dir();
        std::fs::create_dir_all(&archive_dir)?;

        let file_name = path
            .file_name()
            .ok_or_else(|| std::io::Error::other("path has no file name"))?;
        let mut dest = archive_dir.join(file_name);

        if dest.exists() {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let ext = path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default();
            let stamp = Local::now().format("%Y%m%d%H%M%S");

            dest = archive_dir.join(format!("{stem}_{stamp}{ext}"));
            let mut n = 1u32;
            while dest.exists() {
                dest = archive_dir.join(format!("{stem}_{stamp}_{n}{ext}"));
                n += 1;
            }
        }

        move_file(path, &dest)?;
        info!("Archived {} -> {}", path.display(), dest.display());
        Ok(dest)
    }
}

/// Rename, falling back to copy-and-delete when the archive directory lives
/// on a different filesystem.
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            std::fs::copy(from, to)?;
            std::fs::remove_file(from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OracleError;

    struct SilentOracle;

    #[async_trait::async_trait]
    impl OracleTransport for SilentOracle {
        async fn invoke(&self, _s: &str, _u: &str) -> Result<String, OracleError> {
            Ok("[]".to_string())
        }
        async fn invoke_simple(&self, _p: &str) -> Result<String, OracleError> {
            Ok("[]".to_string())
        }
    }

    fn pipeline_for(dir: &Path) -> InvoicePipeline {
        let config = PipelineConfig::builder()
            .input_dir(dir.join("in"))
            .output_dir(dir.join("out"))
            .build()
            .unwrap();
        InvoicePipeline::new(config, Arc::new(SilentOracle))
    }

    #[test]
    fn round2_rounds_to_two_decimals() {
        assert_eq!(round2(1.2345), 1.23);
        assert_eq!(round2(2.678), 2.68);
        assert_eq!(round2(0.0), 0.0);
        assert_eq!(round2(2.499), 2.5);
    }

    #[test]
    fn warning_status_renders_no_items_found() {
        assert_eq!(FileStatus::Warning.to_string(), "Warning: no items found");
        assert_eq!(FileStatus::Success.to_string(), "Success");
    }

    #[test]
    fn archive_collisions_produce_distinct_names() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = pipeline_for(tmp.path());
        std::fs::create_dir_all(tmp.path().join("in")).unwrap();

        // Three files with the same name, moved one after another.
        let mut archived = Vec::new();
        for i in 0..3 {
            let src = tmp.path().join("in/inv.pdf");
            std::fs::write(&src, format!("content {i}")).unwrap();
            archived.push(pipeline.archive_file(&src).unwrap());
            assert!(!src.exists(), "source must be moved away");
        }

        let unique: std::collections::HashSet<_> = archived.iter().collect();
        assert_eq!(unique.len(), 3, "collisions must never overwrite: {archived:?}");
        for path in &archived {
            assert!(path.exists());
        }
    }

    #[tokio::test]
    async fn missing_input_dir_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let pipeline = pipeline_for(tmp.path()); // never creates `in/`
        let err = pipeline.process_all().await.unwrap_err();
        assert!(matches!(err, PipelineError::InputDirMissing { .. }));
    }

    #[tokio::test]
    async fn empty_input_dir_yields_empty_run() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("in")).unwrap();
        let pipeline = pipeline_for(tmp.path());
        let run = pipeline.process_all().await.unwrap();
        assert!(run.items.is_empty());
        assert!(run.outcomes.is_empty());
    }

    #[tokio::test]
    async fn unsupported_extensions_are_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("in");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::write(input.join("notes.txt"), "hello").unwrap();

        let pipeline = pipeline_for(tmp.path());
        let run = pipeline.process_all().await.unwrap();
        assert!(run.outcomes.is_empty());
        assert!(input.join("notes.txt").exists());
    }
}
