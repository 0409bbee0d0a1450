use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::SafariType;
use crate::services::booking::SafariSelection;
use crate::state::AppState;

// GET /api/safaris
pub async fn list_safaris(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SafariType>>, AppError> {
    let db = state.db.lock().unwrap();
    Ok(Json(queries::list_active_safari_types(&db)?))
}

// GET /api/safaris/:id
pub async fn get_safari(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SafariType>, AppError> {
    let db = state.db.lock().unwrap();
    queries::get_safari_type(&db, &id)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("safari '{id}'")))
}

// GET /api/safaris/:id/slots/:date
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotAvailability {
    pub time_slot: String,
    pub capacity: i64,
    pub booked: i64,
    pub remaining: i64,
}

pub async fn slot_availability(
    State(state): State<Arc<AppState>>,
    Path((id, date)): Path<(String, NaiveDate)>,
) -> Result<Json<Vec<SlotAvailability>>, AppError> {
    let db = state.db.lock().unwrap();
    let safari = queries::get_safari_type(&db, &id)?
        .ok_or_else(|| AppError::NotFound(format!("safari '{id}'")))?;

    let mut slots = vec![];
    for slot in &safari.time_slots {
        let booked = queries::sum_safari_participants(&db, &safari.id, date, slot)?;
        slots.push(SlotAvailability {
            time_slot: slot.clone(),
            capacity: safari.max_guests,
            booked,
            remaining: (safari.max_guests - booked).max(0),
        });
    }
    Ok(Json(slots))
}

// GET /api/safaris/:id/available-dates?month=&year=
#[derive(Deserialize)]
pub struct AvailableDatesQuery {
    pub month: u32,
    pub year: i32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DateAvailability {
    pub date: NaiveDate,
    pub slots: Vec<SlotAvailability>,
}

/// Month view of slot capacity for one safari, mirroring the cottage
/// calendar. Every day of the month appears, full slots included.
pub async fn available_dates(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<AvailableDatesQuery>,
) -> Result<Json<Vec<DateAvailability>>, AppError> {
    let first = NaiveDate::from_ymd_opt(query.year, query.month, 1)
        .ok_or_else(|| AppError::InvalidInput("invalid month/year".to_string()))?;
    let next_month = if query.month == 12 {
        NaiveDate::from_ymd_opt(query.year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(query.year, query.month + 1, 1)
    }
    .ok_or_else(|| AppError::InvalidInput("invalid month/year".to_string()))?;

    let db = state.db.lock().unwrap();
    let safari = queries::get_safari_type(&db, &id)?
        .ok_or_else(|| AppError::NotFound(format!("safari '{id}'")))?;

    let mut days = vec![];
    let mut day = first;
    while day < next_month {
        let mut slots = vec![];
        for slot in &safari.time_slots {
            let booked = queries::sum_safari_participants(&db, &safari.id, day, slot)?;
            slots.push(SlotAvailability {
                time_slot: slot.clone(),
                capacity: safari.max_guests,
                booked,
                remaining: (safari.max_guests - booked).max(0),
            });
        }
        days.push(DateAvailability { date: day, slots });
        day = day
            .succ_opt()
            .ok_or_else(|| AppError::InvalidInput("date out of range".to_string()))?;
    }
    Ok(Json(days))
}

// POST /api/safaris/validate
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRequest {
    pub selections: Vec<SafariSelection>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionResult {
    pub safari_id: String,
    pub date: NaiveDate,
    pub time_slot: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateResponse {
    pub valid: bool,
    pub results: Vec<SelectionResult>,
}

/// Advisory validation of a cart of safari selections. Reports every
/// problem instead of failing on the first one; booking creation repeats
/// the same checks transactionally.
pub async fn validate_selections(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ValidateRequest>,
) -> Result<Json<ValidateResponse>, AppError> {
    let db = state.db.lock().unwrap();

    let mut requested_in_bucket: HashMap<(String, NaiveDate, String), i64> = HashMap::new();
    let mut results = vec![];

    for selection in &body.selections {
        let mut reason = None;

        if selection.participants < 1 {
            reason = Some("participants must be at least 1".to_string());
        }

        let safari = if reason.is_none() {
            match queries::get_safari_type(&db, &selection.safari_id)? {
                Some(safari) => Some(safari),
                None => {
                    reason = Some("unknown safari".to_string());
                    None
                }
            }
        } else {
            None
        };

        if let Some(safari) = &safari {
            if !safari.time_slots.contains(&selection.time_slot) {
                reason = Some(format!("'{}' is not an offered time slot", selection.time_slot));
            } else {
                let bucket = (
                    selection.safari_id.clone(),
                    selection.date,
                    selection.time_slot.clone(),
                );
                let already = requested_in_bucket.get(&bucket).copied().unwrap_or(0);
                let booked = queries::sum_safari_participants(
                    &db,
                    &selection.safari_id,
                    selection.date,
                    &selection.time_slot,
                )?;
                if booked + already + selection.participants > safari.max_guests {
                    reason = Some(format!(
                        "only {} spot(s) left",
                        (safari.max_guests - booked - already).max(0)
                    ));
                }
                *requested_in_bucket.entry(bucket).or_insert(0) += selection.participants;
            }
        }

        results.push(SelectionResult {
            safari_id: selection.safari_id.clone(),
            date: selection.date,
            time_slot: selection.time_slot.clone(),
            valid: reason.is_none(),
            reason,
        });
    }

    let valid = results.iter().all(|r| r.valid);
    Ok(Json(ValidateResponse { valid, results }))
}
