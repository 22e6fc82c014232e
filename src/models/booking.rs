use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: String,
    pub booking_reference: String,
    pub owner_id: Option<String>,
    pub product_id: String,
    pub number_of_travelers: u32,
    pub travel_date: NaiveDate,
    /// Unit price times travelers, fixed when the booking is created.
    pub total_amount: Decimal,
    pub traveler_details: Vec<TravelerDetail>,
    pub special_requests: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_guest: bool,
    pub booking_status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub gateway_txn_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    /// Cart line this booking was converted from, if any.
    #[serde(skip)]
    pub cart_line_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TravelerDetail {
    #[validate(length(min = 1, message = "traveler name cannot be empty"))]
    pub name: String,
    #[validate(range(min = 1, message = "traveler age must be at least 1"))]
    pub age: u32,
    #[validate(length(min = 1, message = "traveler gender cannot be empty"))]
    pub gender: String,
    #[validate(length(min = 1, message = "traveler id proof cannot be empty"))]
    pub id_proof: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "completed" => Some(BookingStatus::Completed),
            _ => None,
        }
    }

    /// Cancelled and completed bookings accept no further lifecycle changes.
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Completed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PaymentStatus::Pending),
            "success" => Some(PaymentStatus::Success),
            "failed" => Some(PaymentStatus::Failed),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }
}
