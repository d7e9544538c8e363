use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Structured invoice fields produced by the translation service (or an operator).
///
/// Model output is loosely typed, so identifiers accept strings or numbers and
/// amounts accept numbers or numeric strings. Fields we don't model are kept
/// in `extra` and flow through to the report untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceData {
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub invoice_no: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub invoice_date: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub vendor_name: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "de_opt_amount", skip_serializing_if = "Option::is_none")]
    pub total_amount: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub po_number: Option<String>,
    #[serde(default, deserialize_with = "de_line_items")]
    pub line_items: Vec<LineItem>,
    #[serde(default, deserialize_with = "de_opt_amount", skip_serializing_if = "Option::is_none")]
    pub translation_confidence: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "de_opt_amount", skip_serializing_if = "Option::is_none")]
    pub qty: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_amount", skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_amount", skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub po_number: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string", skip_serializing_if = "Option::is_none")]
    pub item_code: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InvoiceData {
    /// The purchase-order number to validate: header first, then the first line
    /// item carrying a usable value.
    pub fn business_key(&self) -> Option<&str> {
        present(&self.po_number).or_else(|| {
            self.line_items
                .iter()
                .find_map(|item| present(&item.po_number))
        })
    }

    /// Invoice number if it is a real value.
    pub fn invoice_key(&self) -> Option<&str> {
        present(&self.invoice_no)
    }
}

/// Treats `""`, `"none"` and `"null"` (any case) as absent.
pub fn present(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !is_null_like(v))
}

pub fn is_null_like(value: &str) -> bool {
    let v = value.trim();
    v.is_empty() || v.eq_ignore_ascii_case("none") || v.eq_ignore_ascii_case("null")
}

fn de_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "expected a string or number, found {}",
                other
            )))
        }
    })
}

fn de_opt_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => parse_amount(&s),
        Some(other) => {
            return Err(serde::de::Error::custom(format!(
                "expected a number, found {}",
                other
            )))
        }
    })
}

fn de_line_items<'de, D>(deserializer: D) -> Result<Vec<LineItem>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<LineItem>>::deserialize(deserializer)?.unwrap_or_default())
}

static AMOUNT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?(\d{1,3}(,\d{3})+|\d+)(\.\d+)?$").expect("amount pattern is valid")
});

/// "1,200.50", "$500", "USD 42" and " 42 " parse. Ambiguous forms such as
/// "1.250,00" or "12-15" are treated as missing rather than guessed.
fn parse_amount(raw: &str) -> Option<f64> {
    let core = raw.trim_matches(|c: char| !(c.is_ascii_digit() || matches!(c, '-' | '.' | ',')));
    if !AMOUNT.is_match(core) {
        return None;
    }
    core.replace(',', "").parse::<f64>().ok()
}
