use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;

use crate::coerce::{amount_from_str, quantity_from_amount};
use crate::logging::log_rejected_row;
use crate::model::SalesRecord;

pub const REQUIRED_COLUMNS: [&str; 5] = ["date", "customer_name", "product_name", "total_amount", "sales_person"];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataQualityReport {
    pub rows: u64,
    pub bad_rows: u64,
    /// Rows whose total differs from quantity × unit price. Kept as given.
    pub amount_mismatches: u64,
    pub hash_sha256: String,
    pub warnings: Vec<String>,
}

/// `customerName`, `Customer Name`, `TOTAL_AMOUNT` and `customer_name` all
/// map to snake case. Only a lower-to-upper boundary starts a new word.
fn normalize_header(raw: &str) -> String {
    let mut out = String::new();
    let mut prev_lower = false;
    for ch in raw.trim().chars() {
        if ch == ' ' || ch == '-' {
            out.push('_');
        } else if ch.is_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
        prev_lower = ch.is_lowercase() || ch.is_ascii_digit();
    }
    out
}

/// Split one CSV line, honouring double-quoted fields and `""` escapes.
fn split_fields(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if quoted && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => quoted = !quoted,
            ',' if !quoted => fields.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    fields.push(current);
    fields.into_iter().map(|f| f.trim().to_string()).collect()
}

fn field<'a>(columns: &HashMap<String, usize>, fields: &'a [String], name: &str) -> &'a str {
    columns
        .get(name)
        .and_then(|&i| fields.get(i))
        .map(String::as_str)
        .unwrap_or("")
}

/// Stable across re-imports of the same file; distinct for identical rows.
fn line_id(file_hash: &str, line_no: usize) -> String {
    format!("csv-{}-{}", &file_hash[..file_hash.len().min(12)], line_no)
}

pub fn parse_sales_csv(text: &str) -> Result<(Vec<SalesRecord>, DataQualityReport)> {
    let mut report = DataQualityReport {
        hash_sha256: hex::encode(Sha256::digest(text.as_bytes())),
        ..DataQualityReport::default()
    };
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty() && !l.trim_start().starts_with('#'));

    let Some((_, header_line)) = lines.next() else {
        report.warnings.push("empty_input".to_string());
        return Ok((Vec::new(), report));
    };
    let columns: HashMap<String, usize> = split_fields(header_line)
        .iter()
        .enumerate()
        .map(|(i, name)| (normalize_header(name), i))
        .collect();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !columns.contains_key(*c))
        .collect();
    if !missing.is_empty() {
        bail!("missing required columns: {}", missing.join(", "));
    }

    let mut records = Vec::new();
    for (idx, line) in lines {
        let line_no = idx + 1;
        let fields = split_fields(line);
        let get = |name: &str| field(&columns, &fields, name).to_string();

        let reject = |report: &mut DataQualityReport, reason: String| {
            report.bad_rows += 1;
            log_rejected_row("csv", &line_no.to_string(), &reason);
            report.warnings.push(format!("bad_row: line {}: {}", line_no, reason));
        };

        let date = match NaiveDate::parse_from_str(&get("date"), "%Y-%m-%d") {
            Ok(d) => d,
            Err(_) => {
                reject(&mut report, format!("malformed date {:?}", get("date")));
                continue;
            }
        };
        if let Some(empty) = ["customer_name", "product_name", "sales_person"]
            .into_iter()
            .find(|&c| get(c).is_empty())
        {
            reject(&mut report, format!("empty {}", empty));
            continue;
        }

        let text_opt = |name: &str| Some(get(name)).filter(|v| !v.is_empty());
        let record = SalesRecord {
            id: text_opt("id").unwrap_or_else(|| line_id(&report.hash_sha256, line_no)),
            date,
            customer_name: get("customer_name"),
            product_name: get("product_name"),
            quantity: quantity_from_amount(amount_from_str(&get("quantity"))),
            unit_price: amount_from_str(&get("unit_price")),
            total_amount: amount_from_str(&get("total_amount")),
            sales_person: get("sales_person"),
            category: text_opt("category"),
            notes: text_opt("notes"),
            created_at: None,
            updated_at: None,
        };
        if !record.unit_price.is_zero() && record.computed_amount() != record.total_amount {
            report.amount_mismatches += 1;
        }
        report.rows += 1;
        records.push(record);
    }

    if report.amount_mismatches > 0 {
        report
            .warnings
            .push(format!("amount_mismatch: {} rows", report.amount_mismatches));
    }
    Ok((records, report))
}

pub fn read_sales_csv(path: &Path) -> Result<(Vec<SalesRecord>, DataQualityReport)> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_sales_csv(&text)
}
