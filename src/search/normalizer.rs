/// Normalization of raw provider items into `ProductRecord`s
///
/// Items are read field by field with explicit fallbacks. A malformed field
/// becomes absent; an item with neither a title nor a product id is dropped.
/// Provider order is preserved.

use crate::types::ProductRecord;
use crate::upstream::{json_type, RawShoppingPayload};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;
use tracing::debug;
use url::Url;

/// Accepted rating range
const RATING_RANGE: std::ops::RangeInclusive<f64> = 1.0..=5.0;

/// Shortest title word accepted as a brand guess
const MIN_BRAND_LEN: usize = 3;

fn price_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:[A-Za-z]{1,3}\s?)?[$€£¥₹]?(\d+(?:\.\d+)?)(?:[A-Za-z]{3})?$")
            .expect("price pattern is valid")
    })
}

fn weight_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b\d+(?:\.\d+)?\s*(?:oz|lb|lbs|kg|g|ml|l)\b").expect("weight pattern is valid")
    })
}

/// Stateless payload normalizer
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize every item of a payload, dropping the invalid ones
    pub fn normalize(&self, payload: &RawShoppingPayload) -> Vec<ProductRecord> {
        let records: Vec<ProductRecord> = payload
            .items
            .iter()
            .enumerate()
            .filter_map(|(index, item)| {
                let record = self.normalize_item(item);
                if record.is_none() {
                    debug!("Dropped provider item at index {}", index);
                }
                record
            })
            .collect();

        let dropped = payload.items.len() - records.len();
        if dropped > 0 {
            debug!("Normalized {} items, dropped {}", records.len(), dropped);
        }
        records
    }

    /// Normalize one raw item; `None` when it cannot produce a valid record
    pub fn normalize_item(&self, item: &Value) -> Option<ProductRecord> {
        let Value::Object(fields) = item else {
            debug!("Skipping provider item of type {}", json_type(item));
            return None;
        };

        let title = title_field(fields.get("title"));
        let price = text_field(fields.get("price"));
        let old_price = text_field(fields.get("old_price"));
        let extensions = string_list(fields.get("extensions"));

        let record = ProductRecord {
            product_id: text_field(fields.get("product_id")),
            source: text_field(fields.get("source")),
            source_icon: url_field(fields.get("source_icon")),
            multiple_sources: fields.get("multiple_sources").and_then(Value::as_bool).unwrap_or(false),
            brand: text_field(fields.get("brand")).or_else(|| brand_from_title(&title)),
            extracted_price: numeric_price(fields.get("extracted_price"), price.as_deref()),
            extracted_old_price: numeric_price(fields.get("extracted_old_price"), old_price.as_deref()),
            price,
            old_price,
            rating: rating_field(fields.get("rating")),
            reviews: count_field(fields.get("reviews")),
            snippet: text_field(fields.get("snippet")),
            thumbnail: url_field(fields.get("thumbnail")),
            product_link: url_field(fields.get("product_link")).or_else(|| url_field(fields.get("link"))),
            weight: text_field(fields.get("weight")).or_else(|| weight_from(&extensions, &title)),
            category: text_field(fields.get("category")),
            delivery: text_field(fields.get("delivery")),
            position: fields.get("position").and_then(Value::as_u64).and_then(|p| u32::try_from(p).ok()),
            badges: badges(fields),
            extensions,
            title,
        };

        record.is_valid().then_some(record)
    }
}

/// Title as-is; numbers are stringified, anything else is empty
fn title_field(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// Non-blank string or stringified number
fn text_field(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Absolute http(s) URL
fn url_field(value: Option<&Value>) -> Option<String> {
    let raw = value?.as_str()?.trim();
    let parsed = Url::parse(raw).ok()?;
    matches!(parsed.scheme(), "http" | "https").then(|| raw.to_string())
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// Number from a JSON number or a numeric string
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

/// Parse a display price such as "$1,299.99" into a number
pub fn parse_price(display: &str) -> Option<f64> {
    let compact: String = display
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',')
        .collect();

    let captures = price_pattern().captures(&compact)?;
    captures
        .get(1)?
        .as_str()
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
}

/// Provider's numeric price when usable, else parsed from the display string
fn numeric_price(extracted: Option<&Value>, display: Option<&str>) -> Option<f64> {
    extracted
        .and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            _ => None,
        })
        .filter(|n| n.is_finite() && *n >= 0.0)
        .or_else(|| display.and_then(parse_price))
}

/// Rating inside [1, 5]; anything outside is a provider anomaly
fn rating_field(value: Option<&Value>) -> Option<f64> {
    as_number(value?).filter(|r| RATING_RANGE.contains(r))
}

/// Non-negative whole count
fn count_field(value: Option<&Value>) -> Option<u64> {
    match value? {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && *f >= 0.0 && f.fract() == 0.0)
                .map(|f| f as u64)
        }),
        Value::String(s) => s.trim().replace(',', "").parse::<u64>().ok(),
        _ => None,
    }
}

/// First title word, when it looks like a name
fn brand_from_title(title: &str) -> Option<String> {
    let first = title.split_whitespace().next()?;
    let starts_with_letter = first.chars().next().is_some_and(char::is_alphabetic);
    (starts_with_letter && first.chars().count() >= MIN_BRAND_LEN).then(|| first.to_string())
}

/// Weight from extensions first, then the title
fn weight_from(extensions: &[String], title: &str) -> Option<String> {
    extensions
        .iter()
        .find(|ext| weight_pattern().is_match(ext))
        .cloned()
        .or_else(|| weight_pattern().find(title).map(|m| m.as_str().to_string()))
}

/// `badges` array, then the single `badge` when not already listed
fn badges(fields: &Map<String, Value>) -> Vec<String> {
    let mut badges = string_list(fields.get("badges"));
    if let Some(badge) = text_field(fields.get("badge")) {
        if !badges.contains(&badge) {
            badges.push(badge);
        }
    }
    badges
}
