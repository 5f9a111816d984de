use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::coerce;

/// Label for records that arrive without a category.
pub const UNCATEGORIZED: &str = "Uncategorized";

/// One sales transaction as handed over by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesRecord {
    pub id: String,
    pub date: NaiveDate,
    pub customer_name: String,
    pub product_name: String,
    #[serde(default, deserialize_with = "coerce::de::quantity")]
    pub quantity: u64,
    #[serde(default, deserialize_with = "coerce::de::amount")]
    pub unit_price: Decimal,
    /// Trusted as given; never recomputed from quantity and unit price.
    #[serde(default, deserialize_with = "coerce::de::amount")]
    pub total_amount: Decimal,
    pub sales_person: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl SalesRecord {
    /// Category with the sentinel substituted for absent or empty values.
    pub fn category(&self) -> &str {
        match self.category.as_deref() {
            Some(c) if !c.is_empty() => c,
            _ => UNCATEGORIZED,
        }
    }

    /// Bucket key for the given granularity.
    pub fn date_key(&self, granularity: crate::bucket::Granularity) -> String {
        crate::bucket::bucket_key(self.date, granularity)
    }

    /// `quantity × unit_price`, for flagging records whose total disagrees.
    pub fn computed_amount(&self) -> Decimal {
        Decimal::from(self.quantity).saturating_mul(self.unit_price)
    }
}

/// Reference data for one salesperson, joined to records by `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesPerson {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, deserialize_with = "coerce::de::amount")]
    pub monthly_target: Decimal,
    #[serde(default, deserialize_with = "coerce::de::amount")]
    pub quarterly_target: Decimal,
    #[serde(default)]
    pub hire_date: Option<NaiveDate>,
}
