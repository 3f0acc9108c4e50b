//! Prompts for LLM-based line-item extraction.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — tightening the extraction rules or the
//!    strict-JSON contract requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without
//!    spinning up a real model, making prompt regressions easy to catch.

/// How much of a failing oracle response is echoed back in a corrective
/// prompt. Bounding the prefix keeps retry prompts from growing with each
/// attempt when the model keeps returning garbage.
pub const RETRY_PREFIX_CHARS: usize = 200;

/// System prompt for the table-to-JSON extraction call.
pub const SYSTEM_PROMPT: &str = r#"You are a data extraction engine.
Your task is to extract ONLY invoice line items from raw tables extracted from a PDF.

STRICT RULES:
- Output STRICT JSON only
- Output a JSON array of objects
- No markdown, no code fences, no explanations, no comments
- Do NOT invent values
- Ignore rows that are not product or service line items
- Ignore metadata tables
- Convert decimal commas to dots
- Ensure numeric fields are numbers, not strings
- Output an empty JSON array if no line items are found

Each object MUST contain EXACTLY these keys; set a key to null when its
value is missing:

reference
product
quantity
unit_price
total_price

The invoice language may be French."#;

/// Build the data message carrying one table's text.
pub fn user_prompt(table_text: &str) -> String {
    format!(
        "Extract invoice line items from the following table.\n\nTABLE DATA:\n{}",
        table_text
    )
}

/// Build the corrective prompt sent when a response failed to decode.
///
/// Embeds at most [`RETRY_PREFIX_CHARS`] characters of the failing text,
/// truncated on a char boundary.
pub fn corrective_prompt(failing_text: &str) -> String {
    format!(
        "Your previous output was not a valid JSON array. \
         Output STRICT JSON only — a JSON array of objects, nothing else: {}",
        truncate_chars(failing_text, RETRY_PREFIX_CHARS)
    )
}

/// Truncate to at most `max_chars` characters without splitting a char.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_embeds_table_text() {
        let p = user_prompt("| ref | qty |");
        assert!(p.contains("| ref | qty |"));
        assert!(p.contains("TABLE DATA"));
    }

    #[test]
    fn corrective_prompt_bounds_the_echo() {
        let long = "x".repeat(1000);
        let p = corrective_prompt(&long);
        let echoed = p.chars().filter(|&c| c == 'x').count();
        assert_eq!(echoed, RETRY_PREFIX_CHARS);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "é".repeat(300);
        let t = truncate_chars(&s, RETRY_PREFIX_CHARS);
        assert_eq!(t.chars().count(), RETRY_PREFIX_CHARS);
    }

    #[test]
    fn short_text_not_truncated() {
        assert_eq!(truncate_chars("abc", RETRY_PREFIX_CHARS), "abc");
    }
}
