use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::InvoiceData;

/// Metadata describing one rendered report. Persisting it is up to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub id: String,
    /// Invoice number as the document stated it
    pub original_key: Option<String>,
    /// `PASS` or `FAIL`
    pub status: String,
    pub summary: String,
    pub artifact_name: String,
    pub timestamp: DateTime<Utc>,
    pub audit_trail: AuditTrail,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditTrail {
    pub invoice_data: InvoiceData,
    pub discrepancies: Vec<String>,
    pub generated_at: DateTime<Utc>,
    pub rerun: bool,
}

pub const STATUS_PASS: &str = "PASS";
pub const STATUS_FAIL: &str = "FAIL";

/// File-system safe report id derived from the invoice number.
pub fn report_id(invoice_no: Option<&str>) -> String {
    let safe: String = invoice_no
        .unwrap_or_default()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if safe.is_empty() {
        let short = Uuid::new_v4().simple().to_string();
        format!("Unknown_{}", &short[..8])
    } else {
        safe
    }
}

/// One-line human summary shown in report listings.
pub fn summarize(data: &InvoiceData, is_valid: bool, discrepancies: &[String]) -> String {
    if is_valid {
        let vendor = super::present(&data.vendor_name).unwrap_or("Unknown Vendor");
        let currency = super::present(&data.currency).unwrap_or("$");
        let total = data.total_amount.unwrap_or(0.0);
        format!("Approved: {} | {}{}", vendor, currency, total)
    } else {
        let issue = discrepancies
            .first()
            .map(String::as_str)
            .unwrap_or("Unknown Validation Error");
        format!("Rejected: {}", issue)
    }
}
