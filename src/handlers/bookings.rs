use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::check_auth;
use crate::models::{
    BookingDetails, BookingStatus, DomainEvent, PaymentStatus, SafariBookingDetails,
};
use crate::services::booking::{self, CreateBookingRequest, CreatedBooking};
use crate::services::events;
use crate::services::transitions::{self, PaymentContext};
use crate::state::AppState;

// POST /api/bookings
pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<CreatedBooking>), AppError> {
    let created = {
        let mut db = state.db.lock().unwrap();
        booking::create_booking(&mut db, &body)?
    };

    events::emit(
        &state,
        DomainEvent::BookingCreated {
            booking: created.booking.clone(),
            safaris: created.safaris.clone(),
        },
    );

    Ok((StatusCode::CREATED, Json(created)))
}

// GET /api/bookings/reference/:reference
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingResponse {
    #[serde(flatten)]
    pub booking: BookingDetails,
    pub safaris: Vec<SafariBookingDetails>,
}

pub async fn get_by_reference(
    State(state): State<Arc<AppState>>,
    Path(reference): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let db = state.db.lock().unwrap();
    let details = queries::get_booking_details_by_reference(&db, &reference)?
        .ok_or_else(|| AppError::NotFound(format!("booking '{reference}'")))?;
    let safaris = queries::get_safari_bookings(&db, &details.booking.id)?;

    Ok(Json(BookingResponse {
        booking: details,
        safaris,
    }))
}

// PATCH /api/bookings/:id/status
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: String,
    #[serde(default)]
    pub admin_notes: Option<String>,
}

pub async fn update_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<BookingDetails>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let new_status = BookingStatus::try_parse(&body.status)
        .ok_or_else(|| AppError::InvalidInput(format!("unknown status '{}'", body.status)))?;

    let change = {
        let mut db = state.db.lock().unwrap();
        transitions::apply_booking_status(&mut db, &id, new_status, body.admin_notes.as_deref())?
    };

    events::emit(
        &state,
        DomainEvent::BookingStatusChanged {
            booking: change.booking.clone(),
            previous_status: change.previous_status.as_str().to_string(),
        },
    );

    Ok(Json(change.booking))
}

// PATCH /api/bookings/:id/payment
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaymentRequest {
    pub payment_status: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub external_order_id: Option<String>,
    #[serde(default)]
    pub external_payment_id: Option<String>,
}

pub async fn update_payment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdatePaymentRequest>,
) -> Result<Json<BookingDetails>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let new_status = PaymentStatus::try_parse(&body.payment_status).ok_or_else(|| {
        AppError::InvalidInput(format!("unknown payment status '{}'", body.payment_status))
    })?;

    let context = PaymentContext {
        payment_method: body.payment_method.clone(),
        external_order_id: body.external_order_id.clone(),
        external_payment_id: body.external_payment_id.clone(),
    };

    let details = {
        let mut db = state.db.lock().unwrap();
        transitions::apply_payment_status(&mut db, &id, new_status, &context)?
    };

    events::emit(
        &state,
        DomainEvent::PaymentStatusChanged {
            booking: details.clone(),
        },
    );

    Ok(Json(details))
}
