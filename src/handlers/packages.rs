use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Package;
use crate::services::availability;
use crate::services::pricing::{self, PriceBreakdown, SafariLine};
use crate::state::AppState;

// GET /api/packages
pub async fn list_packages(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Package>>, AppError> {
    let db = state.db.lock().unwrap();
    Ok(Json(queries::list_active_packages(&db)?))
}

// GET /api/packages/:id
pub async fn get_package(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Package>, AppError> {
    let db = state.db.lock().unwrap();
    queries::get_package(&db, &id)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("package '{id}'")))
}

// POST /api/packages/quote
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub cottage_type: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub adults: i64,
    #[serde(default)]
    pub children: i64,
    #[serde(default)]
    pub package_id: Option<String>,
    #[serde(default)]
    pub selected_safaris: Vec<QuoteSafari>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteSafari {
    pub safari_id: String,
    pub participants: i64,
}

/// Prices a prospective booking without touching the ledger. Runs through
/// the same calculator as booking creation, so a quote and the eventual
/// stored total always agree.
pub async fn quote(
    State(state): State<Arc<AppState>>,
    Json(body): Json<QuoteRequest>,
) -> Result<Json<PriceBreakdown>, AppError> {
    let nights = availability::validate_stay(body.check_in, body.check_out)?;
    if body.adults < 1 {
        return Err(AppError::InvalidInput(
            "at least one adult is required".to_string(),
        ));
    }

    let db = state.db.lock().unwrap();

    let cottage = queries::get_cottage_by_type(&db, &body.cottage_type)?
        .ok_or_else(|| AppError::NotFound(format!("cottage '{}'", body.cottage_type)))?;

    let guests = body.adults + body.children;
    if guests > cottage.max_guests {
        return Err(AppError::InvalidInput(format!(
            "{} sleeps at most {} guests",
            cottage.name, cottage.max_guests
        )));
    }

    let package = match &body.package_id {
        Some(package_id) => Some(
            queries::get_package(&db, package_id)?
                .ok_or_else(|| AppError::NotFound(format!("package '{package_id}'")))?,
        ),
        None => None,
    };

    let mut lines = Vec::with_capacity(body.selected_safaris.len());
    for selection in &body.selected_safaris {
        if selection.participants < 1 {
            return Err(AppError::InvalidInput(format!(
                "safari {} needs at least one participant",
                selection.safari_id
            )));
        }
        let safari = queries::get_safari_type(&db, &selection.safari_id)?
            .ok_or_else(|| AppError::NotFound(format!("safari '{}'", selection.safari_id)))?;
        lines.push(SafariLine {
            safari_type_id: safari.id,
            name: safari.name,
            unit_price: safari.price,
            participants: selection.participants,
        });
    }

    Ok(Json(pricing::compute_price(
        &cottage,
        nights,
        guests,
        package.as_ref(),
        &lines,
    )))
}
