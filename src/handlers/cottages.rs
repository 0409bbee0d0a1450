use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Cottage;
use crate::services::availability;
use crate::services::pricing::{self, PriceBreakdown};
use crate::state::AppState;

// GET /api/cottages
pub async fn list_cottages(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Cottage>>, AppError> {
    let db = state.db.lock().unwrap();
    Ok(Json(queries::list_active_cottages(&db)?))
}

// GET /api/cottages/:identifier — resolves the type slug first, then the id.
pub async fn get_cottage(
    State(state): State<Arc<AppState>>,
    Path(identifier): Path<String>,
) -> Result<Json<Cottage>, AppError> {
    let db = state.db.lock().unwrap();
    let cottage = match queries::get_cottage_by_type(&db, &identifier)? {
        Some(cottage) => Some(cottage),
        None => queries::get_cottage_by_id(&db, &identifier)?,
    };

    cottage
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("cottage '{identifier}'")))
}

// POST /api/cottages/:type/availability
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityRequest {
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    #[serde(default)]
    pub adults: Option<i64>,
    #[serde(default)]
    pub children: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictRange {
    pub check_in_date: NaiveDate,
    pub check_out_date: NaiveDate,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub available: bool,
    pub nights: i64,
    pub conflicts: Vec<ConflictRange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote: Option<PriceBreakdown>,
}

/// Advisory check: the orchestrator re-verifies under its own transaction,
/// so a positive answer here is not a hold. Includes a villa-only quote
/// when a guest count is supplied.
pub async fn check_availability(
    State(state): State<Arc<AppState>>,
    Path(cottage_type): Path<String>,
    Json(body): Json<AvailabilityRequest>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let db = state.db.lock().unwrap();

    let cottage = queries::get_cottage_by_type(&db, &cottage_type)?
        .ok_or_else(|| AppError::NotFound(format!("cottage '{cottage_type}'")))?;

    let nights = availability::validate_stay(body.check_in, body.check_out)?;

    if let Some(adults) = body.adults {
        let guests = adults + body.children.unwrap_or(0);
        if guests > cottage.max_guests {
            return Err(AppError::InvalidInput(format!(
                "{} sleeps at most {} guests",
                cottage.name, cottage.max_guests
            )));
        }
    }

    let result = availability::check_availability(&db, &cottage.id, body.check_in, body.check_out)?;

    let quote = body.adults.map(|adults| {
        let guests = adults + body.children.unwrap_or(0);
        pricing::compute_price(&cottage, nights, guests, None, &[])
    });

    Ok(Json(AvailabilityResponse {
        available: result.available,
        nights,
        conflicts: result
            .conflicts
            .into_iter()
            .map(|b| ConflictRange {
                check_in_date: b.check_in_date,
                check_out_date: b.check_out_date,
            })
            .collect(),
        quote,
    }))
}

// GET /api/cottages/:type/calendar?month=&year=
#[derive(Deserialize)]
pub struct CalendarQuery {
    pub month: u32,
    pub year: i32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub available: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarResponse {
    pub cottage_type: String,
    pub month: u32,
    pub year: i32,
    pub days: Vec<CalendarDay>,
}

pub async fn calendar(
    State(state): State<Arc<AppState>>,
    Path(cottage_type): Path<String>,
    Query(query): Query<CalendarQuery>,
) -> Result<Json<CalendarResponse>, AppError> {
    let first = NaiveDate::from_ymd_opt(query.year, query.month, 1)
        .ok_or_else(|| AppError::InvalidInput("invalid month/year".to_string()))?;
    let next_month = if query.month == 12 {
        NaiveDate::from_ymd_opt(query.year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(query.year, query.month + 1, 1)
    }
    .ok_or_else(|| AppError::InvalidInput("invalid month/year".to_string()))?;

    let db = state.db.lock().unwrap();
    let cottage = queries::get_cottage_by_type(&db, &cottage_type)?
        .ok_or_else(|| AppError::NotFound(format!("cottage '{cottage_type}'")))?;

    let bookings = queries::bookings_in_window(&db, &cottage.id, first, next_month)?;

    let mut days = vec![];
    let mut day = first;
    while day < next_month {
        let blocked = bookings
            .iter()
            .any(|b| b.check_in_date <= day && day < b.check_out_date);
        days.push(CalendarDay {
            date: day,
            available: !blocked,
        });
        day = day
            .succ_opt()
            .ok_or_else(|| AppError::InvalidInput("date out of range".to_string()))?;
    }

    Ok(Json(CalendarResponse {
        cottage_type: cottage.cottage_type,
        month: first.month(),
        year: first.year(),
        days,
    }))
}
