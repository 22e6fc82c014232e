use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub user_id: String,
    pub items: Vec<CartItem>,
    /// Bumped on every mutation.
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    /// Regenerated whenever the line changes, so a booking made from it
    /// never matches an edited line.
    pub line_id: String,
    pub product_id: String,
    /// Number of travelers.
    pub quantity: u32,
    pub travel_date: NaiveDate,
    /// Catalog price when the item was added. Display only.
    pub price_snapshot: Decimal,
    pub added_at: DateTime<Utc>,
}

impl Cart {
    pub fn empty(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            items: Vec::new(),
            version: 0,
            updated_at: Utc::now(),
        }
    }

    pub fn subtotal(&self) -> Decimal {
        self.items
            .iter()
            .map(|item| item.price_snapshot * Decimal::from(item.quantity))
            .sum()
    }

    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}
