use serde::{Deserialize, Serialize};

/// A bookable accommodation unit. The type slug is the external key used
/// by customer-facing lookups and never changes once issued.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cottage {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub cottage_type: String,
    pub description: Option<String>,
    pub base_price: f64,
    pub max_guests: i64,
    pub amenities: Vec<String>,
    pub is_active: bool,
}
