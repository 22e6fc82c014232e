use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A bookable tour package as exposed by the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub title: String,
    pub price: Decimal,
    pub max_group_size: u32,
    pub is_active: bool,
    pub total_bookings: i64,
}
