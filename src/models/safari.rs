use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A scheduled guided activity with fixed time slots and per-participant
/// pricing. `time_slots` is stored as a JSON array column and deserialized
/// once at the db boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafariType {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub duration: String,
    pub max_guests: i64,
    pub time_slots: Vec<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafariBooking {
    pub id: String,
    pub booking_id: String,
    pub safari_type_id: String,
    pub participants: i64,
    pub date: NaiveDate,
    pub time_slot: String,
}

/// Safari booking joined with its type's name and unit price.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SafariBookingDetails {
    #[serde(flatten)]
    pub safari_booking: SafariBooking,
    pub safari_name: String,
    pub price: f64,
}
