//! Numeric coercion for persisted amounts and quantities.
//!
//! Backends hand amounts over as JSON numbers, numeric strings, SQLite
//! integers/reals/text, or null. Everything funnels through here before
//! any arithmetic. Anything that is not a number becomes zero; nothing
//! in this module fails.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;

/// Exact amount from an arbitrary JSON value.
pub fn amount_from_json(value: &Value) -> Decimal {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Decimal::from(i)
            } else if let Some(u) = n.as_u64() {
                Decimal::from(u)
            } else {
                // serde_json prints floats in shortest round-trip form
                amount_from_str(&n.to_string())
            }
        }
        Value::String(s) => amount_from_str(s),
        _ => Decimal::ZERO,
    }
}

/// Exact amount from a numeric string such as `"1500"`, `" 12.50 "`, `"1e3"`.
pub fn amount_from_str(raw: &str) -> Decimal {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Decimal::ZERO;
    }
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .unwrap_or(Decimal::ZERO)
}

pub fn amount_from_f64(value: f64) -> Decimal {
    if !value.is_finite() {
        return Decimal::ZERO;
    }
    amount_from_str(&value.to_string())
}

pub fn amount_from_i64(value: i64) -> Decimal {
    Decimal::from(value)
}

/// Whole, non-negative item count. Fractions truncate, negatives clamp to zero.
pub fn quantity_from_amount(amount: Decimal) -> u64 {
    if amount.is_sign_negative() {
        return 0;
    }
    amount.trunc().to_u64().unwrap_or(0)
}

pub fn quantity_from_json(value: &Value) -> u64 {
    quantity_from_amount(amount_from_json(value))
}

/// `deserialize_with` adapters for records arriving as JSON.
pub mod de {
    use super::*;
    use serde::{Deserialize, Deserializer};

    pub fn amount<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(amount_from_json(&value))
    }

    pub fn quantity<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(quantity_from_json(&value))
    }
}
