//! Oracle response parsing: fenced-text cleanup, strict JSON-array decode,
//! and bounded corrective retries.
//!
//! ## Retry strategy
//!
//! Models wrap JSON in code fences or prose despite being told not to.
//! Cleanup handles the fence case for free; anything else gets one or more
//! corrective round-trips that echo a bounded prefix of the failing text and
//! demand strict JSON. The loop is an explicit bounded iteration over a
//! "current text" variable — attempt 1 parses the original response, and the
//! retry transport is invoked at most `max_attempts - 1` times.
//!
//! Exhausting every attempt is a *silent* degradation to an empty record
//! list, not an error: at this layer an unparseable response and a genuinely
//! empty table are indistinguishable by design. Callers that care route
//! empty tables around the parser entirely (see
//! [`crate::client::LineItemExtractor`]).

use crate::error::OracleError;
use crate::oracle::OracleTransport;
use crate::prompts::corrective_prompt;
use crate::schema::RawRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

static RE_JSON_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n?(.*?)\n?```\s*$").unwrap());

/// Parse an oracle response into raw records, retrying through the
/// transport on decode failure.
///
/// Returns an empty vec once `max_attempts` decode attempts are exhausted.
/// An empty response degrades to an empty vec at once, with no corrective
/// retry regardless of `max_attempts`. Transport failures during a
/// corrective retry propagate as [`OracleError`]; decode failures never do.
pub async fn parse_line_items(
    response_text: &str,
    transport: &dyn OracleTransport,
    max_attempts: u32,
) -> Result<Vec<RawRecord>, OracleError> {
    let mut text = response_text.to_string();

    for attempt in 1..=max_attempts {
        let cleaned = strip_json_fences(&text);
        // An empty response is a decode failure, but a corrective prompt has
        // nothing to correct: degrade immediately instead of retrying.
        if cleaned.is_empty() {
            warn!("Empty oracle response; degrading to zero items without retry");
            return Ok(Vec::new());
        }
        match serde_json::from_str::<Vec<RawRecord>>(cleaned) {
            Ok(records) => {
                debug!("Decoded {} raw record(s) on attempt {}", records.len(), attempt);
                return Ok(records);
            }
            Err(e) => {
                warn!("JSON decode attempt {attempt}/{max_attempts} failed: {e}");
                if attempt < max_attempts {
                    text = transport.invoke_simple(&corrective_prompt(&text)).await?;
                }
            }
        }
    }

    warn!("All {max_attempts} JSON decode attempt(s) failed; degrading to zero items");
    Ok(Vec::new())
}

/// Strip a wrapping ```` ```json … ``` ```` fence, if present.
///
/// Only an *outer* fence is removed; fences inside the payload (which would
/// make it invalid JSON anyway) are left to fail the decode.
fn strip_json_fences(text: &str) -> &str {
    let trimmed = text.trim();
    match RE_JSON_FENCES.captures(trimmed) {
        Some(caps) => caps.get(1).map_or(trimmed, |m| m.as_str()),
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Scripted transport: pops canned responses and counts calls.
    struct ScriptedOracle {
        responses: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedOracle {
        fn new<I: IntoIterator<Item = &'static str>>(responses: I) -> Self {
            let mut list: Vec<String> = responses.into_iter().map(String::from).collect();
            list.reverse(); // pop() yields in script order
            Self {
                responses: Mutex::new(list),
                calls: AtomicUsize::new(0),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl OracleTransport for ScriptedOracle {
        async fn invoke(&self, _system: &str, _user: &str) -> Result<String, OracleError> {
            self.invoke_simple("").await
        }

        async fn invoke_simple(&self, _prompt: &str) -> Result<String, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| "not json".to_string()))
        }
    }

    #[test]
    fn strips_json_fence() {
        assert_eq!(strip_json_fences("```json\n[{\"a\":1}]\n```"), "[{\"a\":1}]");
    }

    #[test]
    fn strips_bare_fence() {
        assert_eq!(strip_json_fences("```\n[]\n```"), "[]");
    }

    #[test]
    fn unfenced_text_passes_through_trimmed() {
        assert_eq!(strip_json_fences("  [1, 2]  "), "[1, 2]");
    }

    #[tokio::test]
    async fn valid_array_decodes_without_retry() {
        let oracle = ScriptedOracle::new([]);
        let records = parse_line_items(r#"[{"product":"Widget"}]"#, &oracle, 3)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(oracle.call_count(), 0);
    }

    #[tokio::test]
    async fn empty_input_never_triggers_a_retry() {
        // Regardless of the attempt limit, there is nothing to correct.
        for max_attempts in [1, 2, 3] {
            let oracle = ScriptedOracle::new(["[]", "[]"]);
            let records = parse_line_items("", &oracle, max_attempts).await.unwrap();
            assert!(records.is_empty());
            assert_eq!(oracle.call_count(), 0, "max_attempts = {max_attempts}");
        }
    }

    #[tokio::test]
    async fn whitespace_only_input_never_triggers_a_retry() {
        let oracle = ScriptedOracle::new(["[]"]);
        let records = parse_line_items("  \n\t ", &oracle, 3).await.unwrap();
        assert!(records.is_empty());
        assert_eq!(oracle.call_count(), 0);
    }

    #[tokio::test]
    async fn retry_invoked_at_most_max_attempts_minus_one() {
        let oracle = ScriptedOracle::new(["still not json", "nope"]);
        let records = parse_line_items("garbage", &oracle, 3).await.unwrap();
        assert!(records.is_empty());
        assert_eq!(oracle.call_count(), 2);
    }

    #[tokio::test]
    async fn corrective_retry_can_recover() {
        let oracle = ScriptedOracle::new([r#"[{"reference":"R1"}]"#]);
        let records = parse_line_items("garbage", &oracle, 2).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(oracle.call_count(), 1);
    }

    #[tokio::test]
    async fn fenced_retry_response_is_cleaned_too() {
        let oracle = ScriptedOracle::new(["```json\n[{\"reference\":\"R2\"}]\n```"]);
        let records = parse_line_items("garbage", &oracle, 2).await.unwrap();
        assert_eq!(records[0]["reference"], "R2");
    }

    #[tokio::test]
    async fn non_array_json_is_a_decode_failure() {
        // A bare object must not satisfy the strict-array contract.
        let oracle = ScriptedOracle::new([]);
        let records = parse_line_items(r#"{"product":"Widget"}"#, &oracle, 1)
            .await
            .unwrap();
        assert!(records.is_empty());
    }
}
