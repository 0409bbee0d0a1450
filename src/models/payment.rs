use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A single payment attempt against a booking. A booking may accumulate
/// several attempts; at most one ends up `successful`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub booking_id: String,
    pub amount: f64,
    pub payment_method: String,
    pub external_order_id: Option<String>,
    pub external_payment_id: Option<String>,
    pub status: PaymentRecordStatus,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentRecordStatus {
    Pending,
    Successful,
    Failed,
    Refunded,
}

impl PaymentRecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentRecordStatus::Pending => "pending",
            PaymentRecordStatus::Successful => "successful",
            PaymentRecordStatus::Failed => "failed",
            PaymentRecordStatus::Refunded => "refunded",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "successful" => PaymentRecordStatus::Successful,
            "failed" => PaymentRecordStatus::Failed,
            "refunded" => PaymentRecordStatus::Refunded,
            _ => PaymentRecordStatus::Pending,
        }
    }
}
