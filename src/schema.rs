//! Canonical line-item schema and the normaliser that maps oracle output
//! onto it.
//!
//! The oracle is prompted for exactly the canonical keys, but real responses
//! drift: aliased key names (`description` instead of `product`), numbers as
//! strings, decimal commas, nulls, extra keys. [`normalize`] absorbs all of
//! that. It is a pure, infallible function — every malformed value degrades
//! to `None`, never to an error, so one bad cell can never cost a row and one
//! bad row can never cost a table.
//!
//! ## Precedence rule worth knowing
//!
//! Product naming runs in two passes: alias resolution first (`description`,
//! then `name`, then `product` — first non-empty string wins), then a direct
//! copy of any literal `product` key, which overrides the alias result even
//! when its value is null. Swapping these passes changes the output for any
//! record carrying both an alias key and a literal `product` key, so the
//! order is load-bearing.

use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;

/// Oracle output before normalisation: an open-ended key-value map.
pub type RawRecord = serde_json::Map<String, Value>;

/// The canonical dataset columns, in their fixed output order.
pub const CANONICAL_COLUMNS: [&str; 6] = [
    "reference",
    "product",
    "quantity",
    "unit_price",
    "total_price",
    "source_pdf",
];

/// One normalised invoice line item — the unit of pipeline output.
///
/// Exactly these six fields, in this order, for every row in the dataset.
/// Constructed once by [`normalize`] and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    /// Supplier reference / article code.
    pub reference: Option<String>,
    /// Product or service description.
    pub product: Option<String>,
    /// Quantity ordered. Integral only; fractional inputs degrade to `None`.
    pub quantity: Option<i64>,
    /// Price per unit.
    pub unit_price: Option<Decimal>,
    /// Line total.
    pub total_price: Option<Decimal>,
    /// Name of the originating PDF. Always set, never taken from the oracle.
    pub source_pdf: String,
}

impl LineItem {
    /// Render the item as one CSV record in canonical column order.
    pub fn to_record(&self) -> [String; 6] {
        [
            self.reference.clone().unwrap_or_default(),
            self.product.clone().unwrap_or_default(),
            self.quantity.map(|q| q.to_string()).unwrap_or_default(),
            self.unit_price.map(|p| p.to_string()).unwrap_or_default(),
            self.total_price.map(|p| p.to_string()).unwrap_or_default(),
            self.source_pdf.clone(),
        ]
    }
}

/// Normalise one raw oracle record into a [`LineItem`].
///
/// `source_pdf` is set unconditionally from the argument — any same-named
/// key in the raw record is ignored. Unrecognised keys are dropped; missing
/// canonical keys become `None`.
pub fn normalize(raw: &RawRecord, source_pdf: &str) -> LineItem {
    // Pass 1: alias resolution for the product name.
    let alias = coerce_string(raw.get("description"))
        .or_else(|| coerce_string(raw.get("name")))
        .or_else(|| coerce_string(raw.get("product")));

    // Pass 2: a literal `product` key overrides the alias, null included.
    let product = if raw.contains_key("product") {
        coerce_string(raw.get("product"))
    } else {
        alias
    };

    LineItem {
        reference: coerce_string(raw.get("reference")),
        product,
        quantity: coerce_int(raw.get("quantity")),
        unit_price: coerce_decimal(raw.get("unit_price")),
        total_price: coerce_decimal(raw.get("total_price")),
        source_pdf: source_pdf.to_string(),
    }
}

/// Extract a non-empty string from a raw value.
///
/// Numbers are rendered through their display form (a reference like
/// `40021` may arrive as a JSON number). Null, empty strings, and
/// non-scalar values yield `None`.
fn coerce_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Integer coercion with null-on-failure semantics.
///
/// Accepts JSON integers, whole-valued floats, and trimmed integer strings.
/// Fractional values — `3.5` or `"3.5"` — fail to `None` by design: the
/// target type is integral and silent rounding would invent data.
fn coerce_int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i)
            } else {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.is_finite())
                    .map(|f| f as i64)
            }
        }
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Decimal coercion with null-on-failure semantics.
///
/// String inputs have a decimal comma normalised to a dot before parsing —
/// French invoices write `2,50`. Numbers go through their exact display
/// form rather than `f64` to avoid binary-float artefacts in money fields.
fn coerce_decimal(value: Option<&Value>) -> Option<Decimal> {
    match value? {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => {
            let cleaned = s.trim().replace(',', ".");
            Decimal::from_str(&cleaned).ok()
        }
        _ => None,
    }
}
