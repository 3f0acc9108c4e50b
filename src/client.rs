//! Line-item extraction client: one table in, raw records out.
//!
//! This is a capability boundary, not a library binding. Everything that can
//! go wrong between "here is a table" and "here are raw records" — transport
//! failures, exhausted parse retries — is caught here and degraded to an
//! empty result with a logged warning. The pipeline above never sees a
//! transport error; it only sees tables that produced zero items.

use crate::error::OracleError;
use crate::oracle::OracleTransport;
use crate::parser;
use crate::prompts::{user_prompt, SYSTEM_PROMPT};
use crate::schema::RawRecord;
use std::sync::Arc;
use tracing::{debug, warn};

/// Wraps a single table-text-to-JSON oracle call.
pub struct LineItemExtractor {
    transport: Arc<dyn OracleTransport>,
    max_parse_attempts: u32,
}

impl LineItemExtractor {
    pub fn new(transport: Arc<dyn OracleTransport>, max_parse_attempts: u32) -> Self {
        Self {
            transport,
            max_parse_attempts: max_parse_attempts.max(1),
        }
    }

    /// Extract raw line-item records from one table's text.
    ///
    /// Empty or whitespace-only input short-circuits to an empty vec without
    /// touching the oracle — empty tables are deterministic and free. Any
    /// transport failure degrades to an empty vec; this method never errors.
    pub async fn extract_line_items(&self, table_text: &str) -> Vec<RawRecord> {
        if table_text.trim().is_empty() {
            debug!("Skipping empty table, no oracle call");
            return Vec::new();
        }

        match self.call_oracle(table_text).await {
            Ok(records) => {
                debug!("Extracted {} raw record(s) from table", records.len());
                records
            }
            Err(e) => {
                warn!("Line-item extraction failed, degrading to zero items: {e}");
                Vec::new()
            }
        }
    }

    async fn call_oracle(&self, table_text: &str) -> Result<Vec<RawRecord>, OracleError> {
        let response = self
            .transport
            .invoke(SYSTEM_PROMPT, &user_prompt(table_text))
            .await?;
        parser::parse_line_items(&response, self.transport.as_ref(), self.max_parse_attempts)
            .await
    }
}
