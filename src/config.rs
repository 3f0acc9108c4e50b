//! Configuration types for the invoice extraction pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs between the pipeline, transport, and report
//! writers, and to diff two runs to understand why their outputs differ.
//!
//! # Design choice: builder over constructor
//! The surface has a dozen fields and most callers only care about two or
//! three. The builder lets them set what matters and rely on documented
//! defaults for the rest.

use crate::error::PipelineError;
use std::path::{Path, PathBuf};

/// Default OpenRouter-compatible API base.
pub const DEFAULT_API_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default extraction model.
pub const DEFAULT_MODEL: &str = "google/gemini-2.0-flash-001";

/// Configuration for one pipeline run.
///
/// Built via [`PipelineConfig::builder()`].
///
/// # Example
/// ```rust
/// use invoice2csv::PipelineConfig;
///
/// let config = PipelineConfig::builder()
///     .input_dir("invoices")
///     .output_dir("output")
///     .api_key("sk-or-...")
///     .max_parse_attempts(3)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory scanned for invoice files.
    pub input_dir: PathBuf,

    /// Directory receiving the dataset, the report, and (by default) the
    /// processed-file archive.
    pub output_dir: PathBuf,

    /// Archive directory for processed files. Default: `<output_dir>/processed`.
    ///
    /// Files land here after a Success or Warning outcome; files with an
    /// Error outcome stay in the input directory for manual inspection or a
    /// retry on the next run.
    pub archive_dir: Option<PathBuf>,

    /// Processing report path. Default: `<output_dir>/processing_report.csv`.
    pub report_path: Option<PathBuf>,

    /// Line-item dataset path. Default: `<output_dir>/invoice_line_items.csv`.
    pub dataset_path: Option<PathBuf>,

    /// Chat-completions API base URL. Default: OpenRouter.
    pub api_base_url: String,

    /// API credential sent as a bearer token.
    pub api_key: String,

    /// Model identifier. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Sampling temperature. Default: 0.0.
    ///
    /// Extraction wants determinism: the model should transcribe what the
    /// table says, not improvise. Anything above ~0.3 measurably increases
    /// invented values.
    pub temperature: f32,

    /// Maximum JSON decode attempts per oracle response. Default: 2.
    ///
    /// Attempt 1 parses the original response; each further attempt sends a
    /// corrective prompt carrying a bounded prefix of the failing text. The
    /// corrective round-trip is cheap compared to re-extracting the table, so
    /// 2 recovers most fence/prose wrapping without letting a hopeless
    /// response stall the file.
    pub max_parse_attempts: u32,

    /// File extensions (lower-case, no dot) considered input. Default: `pdf`.
    pub supported_extensions: Vec<String>,

    /// Per-oracle-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("invoices"),
            output_dir: PathBuf::from("output"),
            archive_dir: None,
            report_path: None,
            dataset_path: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.0,
            max_parse_attempts: 2,
            supported_extensions: vec!["pdf".to_string()],
            api_timeout_secs: 60,
        }
    }
}

impl PipelineConfig {
    /// Create a new builder for `PipelineConfig`.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Effective archive directory.
    pub fn archive_dir(&self) -> PathBuf {
        self.archive_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.join("processed"))
    }

    /// Effective processing report path.
    pub fn report_path(&self) -> PathBuf {
        self.report_path
            .clone()
            .unwrap_or_else(|| self.output_dir.join("processing_report.csv"))
    }

    /// Effective line-item dataset path.
    pub fn dataset_path(&self) -> PathBuf {
        self.dataset_path
            .clone()
            .unwrap_or_else(|| self.output_dir.join("invoice_line_items.csv"))
    }

    /// Whether `path` has one of the supported extensions (case-insensitive).
    pub fn is_supported(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let e = e.to_lowercase();
                self.supported_extensions.iter().any(|s| s == &e)
            })
            .unwrap_or(false)
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn input_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.input_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.archive_dir = Some(dir.into());
        self
    }

    pub fn report_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.report_path = Some(path.into());
        self
    }

    pub fn dataset_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.dataset_path = Some(path.into());
        self
    }

    pub fn api_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_base_url = url.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_parse_attempts(mut self, n: u32) -> Self {
        self.config.max_parse_attempts = n.max(1);
        self
    }

    /// Replace the supported extension set. Extensions are stored lower-case
    /// without a leading dot.
    pub fn supported_extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.config.supported_extensions = exts
            .into_iter()
            .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PipelineError> {
        let c = &self.config;
        if c.max_parse_attempts == 0 {
            return Err(PipelineError::InvalidConfig(
                "max_parse_attempts must be ≥ 1".into(),
            ));
        }
        if c.supported_extensions.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "supported_extensions must not be empty".into(),
            ));
        }
        if c.api_base_url.trim().is_empty() {
            return Err(PipelineError::InvalidConfig(
                "api_base_url must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
