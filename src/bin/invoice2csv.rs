//! CLI binary for invoice2csv.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PipelineConfig`, runs the pipeline, and persists the results.

use anyhow::{Context, Result};
use clap::Parser;
use invoice2csv::{
    report, InvoicePipeline, OpenRouterTransport, PipelineConfig, PipelineError,
};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const AFTER_HELP: &str = r#"EXAMPLES:
  # Process every PDF in ./invoices, writing CSVs to ./output
  invoice2csv invoices -o output

  # Use a specific model and a custom archive location
  invoice2csv invoices -o output --model google/gemini-2.0-flash-001 \
      --archive-dir /srv/archive

  # Allow three JSON decode attempts per oracle response
  invoice2csv invoices -o output --max-parse-attempts 3

OUTPUTS:
  <output>/invoice_line_items.csv   one row per extracted line item
  <output>/processing_report.csv    one row per input file, merged across runs
  <output>/processed/               archive of successfully processed files

  Files whose extraction failed stay in the input directory; re-running the
  command retries exactly those files.

EXIT CODES:
  0  run completed (individual files may still have Error outcomes — check
     the processing report)
  2  input directory missing
  1  any other fatal error

ENVIRONMENT VARIABLES:
  OPENROUTER_API_KEY      API credential (required)
  INVOICE2CSV_BASE_URL    Override the chat-completions endpoint
  INVOICE2CSV_MODEL       Override the model ID
"#;

/// Extract invoice line items from PDF tables into canonical CSV.
#[derive(Parser, Debug)]
#[command(
    name = "invoice2csv",
    version,
    about = "Extract invoice line items from PDF tables into canonical CSV using an LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Directory containing invoice files to process.
    input_dir: PathBuf,

    /// Output directory for the dataset, report, and archive.
    #[arg(short, long, env = "INVOICE2CSV_OUTPUT", default_value = "output")]
    output_dir: PathBuf,

    /// Archive directory for processed files (default: <output>/processed).
    #[arg(long, env = "INVOICE2CSV_ARCHIVE")]
    archive_dir: Option<PathBuf>,

    /// Processing report path (default: <output>/processing_report.csv).
    #[arg(long, env = "INVOICE2CSV_REPORT")]
    report: Option<PathBuf>,

    /// Line-item dataset path (default: <output>/invoice_line_items.csv).
    #[arg(long, env = "INVOICE2CSV_DATASET")]
    dataset: Option<PathBuf>,

    /// Chat-completions API base URL.
    #[arg(long, env = "INVOICE2CSV_BASE_URL",
          default_value = invoice2csv::config::DEFAULT_API_BASE_URL)]
    base_url: String,

    /// API credential sent as a bearer token.
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Model identifier.
    #[arg(long, env = "INVOICE2CSV_MODEL",
          default_value = invoice2csv::config::DEFAULT_MODEL)]
    model: String,

    /// Sampling temperature (0.0–2.0).
    #[arg(long, env = "INVOICE2CSV_TEMPERATURE", default_value_t = 0.0)]
    temperature: f32,

    /// Maximum JSON decode attempts per oracle response.
    #[arg(long, env = "INVOICE2CSV_MAX_PARSE_ATTEMPTS", default_value_t = 2)]
    max_parse_attempts: u32,

    /// Supported input extensions (comma-separated, no dots).
    #[arg(long, env = "INVOICE2CSV_EXTENSIONS", value_delimiter = ',',
          default_value = "pdf")]
    extensions: Vec<String>,

    /// Per-oracle-call timeout in seconds.
    #[arg(long, env = "INVOICE2CSV_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "INVOICE2CSV_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "INVOICE2CSV_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            // Distinguish "nothing to do because the input dir is wrong"
            // from every other fatal error.
            match e.downcast_ref::<PipelineError>() {
                Some(PipelineError::InputDirMissing { .. }) => ExitCode::from(2),
                _ => ExitCode::FAILURE,
            }
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config = build_config(cli)?;

    let transport =
        Arc::new(OpenRouterTransport::new(&config).context("Failed to build oracle transport")?);
    let pipeline = InvoicePipeline::new(config.clone(), transport);

    let run = pipeline.process_all().await?;

    if run.items.is_empty() {
        tracing::warn!("No line items extracted from any invoice");
    }
    report::write_dataset(&run.items, &config.dataset_path())?;
    report::append_report(&run.outcomes, &config.report_path())?;

    if !cli.quiet {
        print_summary(&run);
    }
    Ok(())
}

/// Map CLI args to `PipelineConfig`.
fn build_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .input_dir(&cli.input_dir)
        .output_dir(&cli.output_dir)
        .api_base_url(&cli.base_url)
        .api_key(&cli.api_key)
        .model(&cli.model)
        .temperature(cli.temperature)
        .max_parse_attempts(cli.max_parse_attempts)
        .supported_extensions(&cli.extensions)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref dir) = cli.archive_dir {
        builder = builder.archive_dir(dir);
    }
    if let Some(ref path) = cli.report {
        builder = builder.report_path(path);
    }
    if let Some(ref path) = cli.dataset {
        builder = builder.dataset_path(path);
    }

    builder.build().context("Invalid configuration")
}

fn print_summary(run: &invoice2csv::RunOutput) {
    use invoice2csv::FileStatus;

    let success = run
        .outcomes
        .iter()
        .filter(|o| o.status == FileStatus::Success)
        .count();
    let warning = run
        .outcomes
        .iter()
        .filter(|o| o.status == FileStatus::Warning)
        .count();
    let failed = run
        .outcomes
        .iter()
        .filter(|o| o.status == FileStatus::Error)
        .count();

    eprintln!(
        "Processed {} file(s): {} ok, {} empty, {} failed — {} line item(s)",
        run.outcomes.len(),
        success,
        warning,
        failed,
        run.items.len()
    );

    if failed > 0 {
        eprintln!("Failed files (left in input directory):");
        for outcome in run.outcomes.iter().filter(|o| o.status == FileStatus::Error) {
            eprintln!("  - {}: {}", outcome.filename, outcome.error_details);
        }
    }
}
