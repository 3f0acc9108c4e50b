//! # invoice2csv
//!
//! Extract invoice line items from PDF tables into a canonical CSV dataset,
//! using a language model as the parsing oracle.
//!
//! ## Why this crate?
//!
//! Invoice tables are wildly heterogeneous — column names, ordering, locale
//! conventions, and even what counts as a "line item" differ between every
//! supplier. Rule-based parsers break on each new layout. Instead this crate
//! hands the raw extracted table text to an LLM and asks for a strict JSON
//! array of line items, then normalises whatever comes back into a fixed
//! six-field schema. The oracle handles layout chaos; the pipeline guarantees
//! structural conformance.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Tables    extract tabular text blocks (pdf-extract)
//!  ├─ 2. Oracle    one chat-completion call per table
//!  ├─ 3. Parse     strip fences, strict JSON array, bounded corrective retries
//!  ├─ 4. Normalise map arbitrary keys onto the canonical six-field schema
//!  ├─ 5. Archive   move processed files aside (collision-safe)
//!  └─ 6. Persist   line-item CSV + append-merged processing report
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use invoice2csv::{InvoicePipeline, OpenRouterTransport, PipelineConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::builder()
//!         .input_dir("invoices")
//!         .output_dir("output")
//!         .api_key(std::env::var("OPENROUTER_API_KEY")?)
//!         .build()?;
//!
//!     let transport = Arc::new(OpenRouterTransport::new(&config)?);
//!     let pipeline = InvoicePipeline::new(config.clone(), transport);
//!     let run = pipeline.process_all().await?;
//!
//!     invoice2csv::report::write_dataset(&run.items, &config.dataset_path())?;
//!     invoice2csv::report::append_report(&run.outcomes, &config.report_path())?;
//!     Ok(())
//! }
//! ```
//!
//! ## Failure model
//!
//! Failures degrade by granularity: an unparseable oracle response costs the
//! items of one table, a table-extraction failure costs one file (recorded in
//! the report, file left in place), and only directory or persistence errors
//! abort the run. A file that yields zero items is a Warning, not an error —
//! it is still archived.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod error;
pub mod oracle;
pub mod parser;
pub mod pipeline;
pub mod prompts;
pub mod report;
pub mod schema;
pub mod tables;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::LineItemExtractor;
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use error::{OracleError, PipelineError, TableExtractError};
pub use oracle::{OpenRouterTransport, OracleTransport};
pub use pipeline::{FileOutcome, FileStatus, InvoicePipeline, RunOutput};
pub use schema::{normalize, LineItem, RawRecord, CANONICAL_COLUMNS};
pub use tables::{PdfTableSource, TableBlock, TableSource};
