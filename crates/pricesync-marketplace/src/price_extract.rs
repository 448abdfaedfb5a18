//! Best-effort price extraction from free text.
//!
//! Catalog attributes carry prices as prose ("List price: $1,299.00") mixed
//! with unrelated numbers (dimensions, model numbers, counts). Only tokens
//! with exactly two decimal places inside the configured range are accepted.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;

static PRICE_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:\$\s?)?\b(\d{1,3}(?:,\d{3})+|\d+)\.(\d{2})\b").expect("valid regex")
});

/// Accepts price-shaped tokens within `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceExtractor {
    min: Decimal,
    max: Decimal,
}

impl PriceExtractor {
    #[must_use]
    pub fn new(min: Decimal, max: Decimal) -> Self {
        Self { min, max }
    }

    #[must_use]
    pub fn in_range(&self, amount: Decimal) -> bool {
        amount >= self.min && amount <= self.max
    }

    /// Returns the first in-range price token in `text`.
    #[must_use]
    pub fn extract(&self, text: &str) -> Option<Decimal> {
        PRICE_TOKEN.captures_iter(text).find_map(|cap| {
            let whole = cap.get(1)?.as_str().replace(',', "");
            let cents = cap.get(2)?.as_str();
            let amount = Decimal::from_str(&format!("{whole}.{cents}")).ok()?;
            self.in_range(amount).then_some(amount)
        })
    }

    /// Walks every string in a JSON tree and returns the first in-range price
    /// token. Arrays are walked in order; object members in key order, since
    /// `serde_json::Map` is sorted.
    #[must_use]
    pub fn extract_from_json(&self, value: &serde_json::Value) -> Option<Decimal> {
        match value {
            serde_json::Value::String(s) => self.extract(s),
            serde_json::Value::Array(items) => {
                items.iter().find_map(|item| self.extract_from_json(item))
            }
            serde_json::Value::Object(map) => {
                map.values().find_map(|item| self.extract_from_json(item))
            }
            _ => None,
        }
    }
}
