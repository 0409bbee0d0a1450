use serde::{Deserialize, Serialize};

/// A pricing multiplier bundle, optionally carrying a safari allowance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub price_multiplier: f64,
    pub includes_safari: bool,
    pub max_safaris: i64,
    pub is_active: bool,
}
