use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{BookingDetails, DomainEvent, Payment, PaymentStatus};
use crate::services::events;
use crate::services::transitions::{self, PaymentContext};
use crate::state::AppState;

// POST /api/payments/confirm
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmPaymentRequest {
    pub booking_reference: String,
    #[serde(default)]
    pub external_order_id: Option<String>,
    #[serde(default)]
    pub external_payment_id: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    /// Set by the gateway-facing edge after signature verification. The
    /// core never sees raw gateway credentials.
    #[serde(default)]
    pub verified_signature_ok: bool,
}

/// Settles a payment that the gateway edge has already verified. Marks the
/// booking paid, records the payment row and auto-confirms a pending
/// booking, then emits the change.
pub async fn confirm_payment(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ConfirmPaymentRequest>,
) -> Result<Json<BookingDetails>, AppError> {
    if !body.verified_signature_ok {
        return Err(AppError::InvalidInput(
            "payment signature was not verified".to_string(),
        ));
    }

    let context = PaymentContext {
        payment_method: body.payment_method.clone(),
        external_order_id: body.external_order_id.clone(),
        external_payment_id: body.external_payment_id.clone(),
    };

    let details = {
        let mut db = state.db.lock().unwrap();
        let booking = queries::get_booking_details_by_reference(&db, &body.booking_reference)?
            .ok_or_else(|| {
                AppError::NotFound(format!("booking '{}'", body.booking_reference))
            })?;
        transitions::apply_payment_status(&mut db, &booking.booking.id, PaymentStatus::Paid, &context)?
    };

    events::emit(
        &state,
        DomainEvent::PaymentStatusChanged {
            booking: details.clone(),
        },
    );

    Ok(Json(details))
}

// POST /api/payments/failed
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedPaymentRequest {
    pub booking_reference: String,
    #[serde(default)]
    pub external_order_id: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

pub async fn failed_payment(
    State(state): State<Arc<AppState>>,
    Json(body): Json<FailedPaymentRequest>,
) -> Result<Json<BookingDetails>, AppError> {
    let context = PaymentContext {
        payment_method: body.payment_method.clone(),
        external_order_id: body.external_order_id.clone(),
        external_payment_id: None,
    };

    let details = {
        let mut db = state.db.lock().unwrap();
        let booking = queries::get_booking_details_by_reference(&db, &body.booking_reference)?
            .ok_or_else(|| {
                AppError::NotFound(format!("booking '{}'", body.booking_reference))
            })?;
        transitions::apply_payment_status(
            &mut db,
            &booking.booking.id,
            PaymentStatus::Failed,
            &context,
        )?
    };

    events::emit(
        &state,
        DomainEvent::PaymentStatusChanged {
            booking: details.clone(),
        },
    );

    Ok(Json(details))
}

// POST /api/payments/offline
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfflinePaymentRequest {
    pub booking_reference: String,
}

/// Guest chose to pay at the property. Confirms the booking and records a
/// pending payment for staff to settle on arrival.
pub async fn offline_payment(
    State(state): State<Arc<AppState>>,
    Json(body): Json<OfflinePaymentRequest>,
) -> Result<Json<BookingDetails>, AppError> {
    let change = {
        let mut db = state.db.lock().unwrap();
        let booking = queries::get_booking_details_by_reference(&db, &body.booking_reference)?
            .ok_or_else(|| {
                AppError::NotFound(format!("booking '{}'", body.booking_reference))
            })?;
        transitions::apply_offline_payment(&mut db, &booking.booking.id)?
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

// GET /api/payments/booking/:reference
pub async fn payments_for_booking(
    State(state): State<Arc<AppState>>,
    Path(reference): Path<String>,
) -> Result<Json<Vec<Payment>>, AppError> {
    let db = state.db.lock().unwrap();
    let booking = queries::get_booking_details_by_reference(&db, &reference)?
        .ok_or_else(|| AppError::NotFound(format!("booking '{reference}'")))?;
    Ok(Json(queries::get_payments_for_booking(&db, &booking.booking.id)?))
}
