use anyhow::anyhow;
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    BookingDetails, BookingStatus, Payment, PaymentRecordStatus, PaymentStatus,
};

/// Legal booking lifecycle edges. Everything else is rejected, including
/// self-transitions; retries are expected to read first.
pub fn booking_transition_allowed(from: BookingStatus, to: BookingStatus) -> bool {
    use BookingStatus::*;
    matches!(
        (from, to),
        (Pending, Confirmed) | (Pending, Cancelled) | (Confirmed, Completed) | (Confirmed, Cancelled)
    )
}

/// Legal payment edges. Failed -> Pending allows another attempt after a
/// gateway failure.
pub fn payment_transition_allowed(from: PaymentStatus, to: PaymentStatus) -> bool {
    use PaymentStatus::*;
    matches!(
        (from, to),
        (Pending, Paid) | (Pending, Failed) | (Paid, Refunded) | (Failed, Pending)
    )
}

#[derive(Debug)]
pub struct StatusChange {
    pub booking: BookingDetails,
    pub previous_status: BookingStatus,
}

/// External payment identifiers attached when a gateway settles or rejects
/// a charge.
#[derive(Debug, Default, Clone)]
pub struct PaymentContext {
    pub payment_method: Option<String>,
    pub external_order_id: Option<String>,
    pub external_payment_id: Option<String>,
}

/// Moves a booking along its lifecycle. Checked and applied inside one
/// transaction so two racing updates cannot both pass the guard.
pub fn apply_booking_status(
    conn: &mut Connection,
    booking_id: &str,
    new_status: BookingStatus,
    admin_notes: Option<&str>,
) -> Result<StatusChange, AppError> {
    let tx = conn.transaction()?;

    let booking = queries::get_booking_by_id(&tx, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking '{booking_id}'")))?;

    let previous = booking.status;
    if !booking_transition_allowed(previous, new_status) {
        return Err(AppError::InvalidTransition {
            from: previous.as_str().to_string(),
            to: new_status.as_str().to_string(),
        });
    }

    queries::update_booking_status(&tx, booking_id, new_status, admin_notes)?;

    let details = queries::get_booking_details(&tx, booking_id)?
        .ok_or_else(|| AppError::Internal(anyhow!("booking row vanished mid-update")))?;

    tx.commit()?;

    tracing::info!(
        reference = %details.booking.booking_reference,
        from = previous.as_str(),
        to = new_status.as_str(),
        "booking status changed"
    );

    Ok(StatusChange {
        booking: details,
        previous_status: previous,
    })
}

/// Moves a booking's payment state and keeps the payments ledger in step:
/// Paid appends a successful payment row and auto-confirms a pending
/// booking, Failed appends a failed row, Refunded flips the successful
/// rows. All inside one transaction.
pub fn apply_payment_status(
    conn: &mut Connection,
    booking_id: &str,
    new_status: PaymentStatus,
    context: &PaymentContext,
) -> Result<BookingDetails, AppError> {
    let tx = conn.transaction()?;

    let booking = queries::get_booking_by_id(&tx, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking '{booking_id}'")))?;

    let previous = booking.payment_status;
    if !payment_transition_allowed(previous, new_status) {
        return Err(AppError::InvalidTransition {
            from: previous.as_str().to_string(),
            to: new_status.as_str().to_string(),
        });
    }

    let method = context
        .payment_method
        .clone()
        .or_else(|| booking.payment_method.clone())
        .unwrap_or_else(|| "online".to_string());

    queries::update_payment_status(&tx, booking_id, new_status, Some(&method))?;

    match new_status {
        PaymentStatus::Paid => {
            queries::insert_payment(
                &tx,
                &Payment {
                    id: Uuid::new_v4().to_string(),
                    booking_id: booking_id.to_string(),
                    amount: booking.total_amount,
                    payment_method: method,
                    external_order_id: context.external_order_id.clone(),
                    external_payment_id: context.external_payment_id.clone(),
                    status: PaymentRecordStatus::Successful,
                    created_at: chrono::Utc::now().naive_utc(),
                },
            )?;
            // A settled payment confirms a pending booking in the same
            // transaction.
            if booking.status == BookingStatus::Pending {
                queries::update_booking_status(&tx, booking_id, BookingStatus::Confirmed, None)?;
            }
        }
        PaymentStatus::Failed => {
            queries::insert_payment(
                &tx,
                &Payment {
                    id: Uuid::new_v4().to_string(),
                    booking_id: booking_id.to_string(),
                    amount: booking.total_amount,
                    payment_method: method,
                    external_order_id: context.external_order_id.clone(),
                    external_payment_id: context.external_payment_id.clone(),
                    status: PaymentRecordStatus::Failed,
                    created_at: chrono::Utc::now().naive_utc(),
                },
            )?;
        }
        PaymentStatus::Refunded => {
            queries::mark_successful_payments_refunded(&tx, booking_id)?;
        }
        PaymentStatus::Pending => {}
    }

    let details = queries::get_booking_details(&tx, booking_id)?
        .ok_or_else(|| AppError::Internal(anyhow!("booking row vanished mid-update")))?;

    tx.commit()?;

    tracing::info!(
        reference = %details.booking.booking_reference,
        from = previous.as_str(),
        to = new_status.as_str(),
        booking_status = details.booking.status.as_str(),
        "payment status changed"
    );

    Ok(details)
}

/// Records a pay-at-property arrangement: confirms a pending booking and
/// appends a pending payment row for the full amount, leaving the payment
/// state unsettled until staff collect on site. One transaction.
pub fn apply_offline_payment(
    conn: &mut Connection,
    booking_id: &str,
) -> Result<StatusChange, AppError> {
    let tx = conn.transaction()?;

    let booking = queries::get_booking_by_id(&tx, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking '{booking_id}'")))?;

    if booking.payment_status == PaymentStatus::Paid {
        return Err(AppError::InvalidInput(
            "booking is already paid".to_string(),
        ));
    }
    let previous = booking.status;
    if matches!(previous, BookingStatus::Cancelled | BookingStatus::Completed) {
        return Err(AppError::InvalidTransition {
            from: previous.as_str().to_string(),
            to: BookingStatus::Confirmed.as_str().to_string(),
        });
    }

    queries::update_payment_status(
        &tx,
        booking_id,
        PaymentStatus::Pending,
        Some("pay_at_property"),
    )?;
    if previous == BookingStatus::Pending {
        queries::update_booking_status(&tx, booking_id, BookingStatus::Confirmed, None)?;
    }

    queries::insert_payment(
        &tx,
        &Payment {
            id: Uuid::new_v4().to_string(),
            booking_id: booking_id.to_string(),
            amount: booking.total_amount,
            payment_method: "pay_at_property".to_string(),
            external_order_id: None,
            external_payment_id: None,
            status: PaymentRecordStatus::Pending,
            created_at: chrono::Utc::now().naive_utc(),
        },
    )?;

    let details = queries::get_booking_details(&tx, booking_id)?
        .ok_or_else(|| AppError::Internal(anyhow!("booking row vanished mid-update")))?;

    tx.commit()?;

    tracing::info!(
        reference = %details.booking.booking_reference,
        from = previous.as_str(),
        to = details.booking.status.as_str(),
        "offline payment recorded"
    );

    Ok(StatusChange {
        booking: details,
        previous_status: previous,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{Cottage, GuestDetails};
    use crate::services::booking::{create_booking, CreateBookingRequest};
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn setup_booking() -> (Connection, String) {
        let mut conn = db::init_db(":memory:").unwrap();
        queries::insert_cottage(
            &conn,
            &Cottage {
                id: "c-1".to_string(),
                name: "Glass Cottage".to_string(),
                cottage_type: "glass-cottage".to_string(),
                description: None,
                base_price: 15000.0,
                max_guests: 6,
                amenities: vec![],
                is_active: true,
            },
        )
        .unwrap();

        let created = create_booking(
            &mut conn,
            &CreateBookingRequest {
                cottage_type: "glass-cottage".to_string(),
                check_in: date("2024-04-01"),
                check_out: date("2024-04-03"),
                adults: 2,
                children: 0,
                package_id: None,
                selected_safaris: vec![],
                guest_details: GuestDetails {
                    name: "Alice".to_string(),
                    email: "alice@example.com".to_string(),
                    phone: None,
                },
                payment_method: None,
                special_requests: None,
                total_amount: None,
            },
        )
        .unwrap();
        let id = created.booking.booking.id.clone();
        (conn, id)
    }

    #[test]
    fn test_booking_edges() {
        use BookingStatus::*;
        assert!(booking_transition_allowed(Pending, Confirmed));
        assert!(booking_transition_allowed(Pending, Cancelled));
        assert!(booking_transition_allowed(Confirmed, Completed));
        assert!(booking_transition_allowed(Confirmed, Cancelled));

        assert!(!booking_transition_allowed(Pending, Completed));
        assert!(!booking_transition_allowed(Confirmed, Pending));
        assert!(!booking_transition_allowed(Cancelled, Confirmed));
        assert!(!booking_transition_allowed(Completed, Cancelled));
        assert!(!booking_transition_allowed(Pending, Pending));
    }

    #[test]
    fn test_payment_edges() {
        use PaymentStatus::*;
        assert!(payment_transition_allowed(Pending, Paid));
        assert!(payment_transition_allowed(Pending, Failed));
        assert!(payment_transition_allowed(Paid, Refunded));
        assert!(payment_transition_allowed(Failed, Pending));

        assert!(!payment_transition_allowed(Paid, Pending));
        assert!(!payment_transition_allowed(Refunded, Paid));
        assert!(!payment_transition_allowed(Failed, Paid));
        assert!(!payment_transition_allowed(Paid, Paid));
    }

    #[test]
    fn test_confirm_then_complete() {
        let (mut conn, id) = setup_booking();

        let change =
            apply_booking_status(&mut conn, &id, BookingStatus::Confirmed, None).unwrap();
        assert_eq!(change.previous_status, BookingStatus::Pending);
        assert_eq!(change.booking.booking.status, BookingStatus::Confirmed);

        let change =
            apply_booking_status(&mut conn, &id, BookingStatus::Completed, None).unwrap();
        assert_eq!(change.previous_status, BookingStatus::Confirmed);
    }

    #[test]
    fn test_illegal_booking_transition_leaves_row_untouched() {
        let (mut conn, id) = setup_booking();

        let result = apply_booking_status(&mut conn, &id, BookingStatus::Completed, None);
        assert!(matches!(result, Err(AppError::InvalidTransition { .. })));

        let booking = queries::get_booking_by_id(&conn, &id).unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Pending);
    }

    #[test]
    fn test_unknown_booking_is_not_found() {
        let (mut conn, _) = setup_booking();
        let result =
            apply_booking_status(&mut conn, "no-such-id", BookingStatus::Confirmed, None);
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_admin_notes_recorded_on_cancel() {
        let (mut conn, id) = setup_booking();

        apply_booking_status(&mut conn, &id, BookingStatus::Cancelled, Some("guest request"))
            .unwrap();
        let booking = queries::get_booking_by_id(&conn, &id).unwrap().unwrap();
        assert_eq!(booking.admin_notes.as_deref(), Some("guest request"));
    }

    #[test]
    fn test_paid_confirms_booking_and_records_payment() {
        let (mut conn, id) = setup_booking();

        let change = apply_payment_status(
            &mut conn,
            &id,
            PaymentStatus::Paid,
            &PaymentContext {
                payment_method: Some("card".to_string()),
                external_order_id: Some("order_123".to_string()),
                external_payment_id: Some("pay_456".to_string()),
            },
        )
        .unwrap();

        assert_eq!(change.booking.payment_status, PaymentStatus::Paid);
        assert_eq!(change.booking.status, BookingStatus::Confirmed);

        let payments = queries::get_payments_for_booking(&conn, &id).unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].status, PaymentRecordStatus::Successful);
        assert_eq!(payments[0].amount, 36900.0);
        assert_eq!(payments[0].external_payment_id.as_deref(), Some("pay_456"));
    }

    #[test]
    fn test_paid_on_already_confirmed_booking_keeps_status() {
        let (mut conn, id) = setup_booking();
        apply_booking_status(&mut conn, &id, BookingStatus::Confirmed, None).unwrap();

        let change =
            apply_payment_status(&mut conn, &id, PaymentStatus::Paid, &PaymentContext::default())
                .unwrap();
        assert_eq!(change.booking.status, BookingStatus::Confirmed);
    }

    #[test]
    fn test_failed_records_failed_payment_and_allows_retry() {
        let (mut conn, id) = setup_booking();

        apply_payment_status(&mut conn, &id, PaymentStatus::Failed, &PaymentContext::default())
            .unwrap();
        let booking = queries::get_booking_by_id(&conn, &id).unwrap().unwrap();
        assert_eq!(booking.payment_status, PaymentStatus::Failed);
        assert_eq!(booking.status, BookingStatus::Pending);

        let payments = queries::get_payments_for_booking(&conn, &id).unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].status, PaymentRecordStatus::Failed);

        // Failed -> Pending reopens the attempt, then Pending -> Paid works.
        apply_payment_status(&mut conn, &id, PaymentStatus::Pending, &PaymentContext::default())
            .unwrap();
        apply_payment_status(&mut conn, &id, PaymentStatus::Paid, &PaymentContext::default())
            .unwrap();
    }

    #[test]
    fn test_refund_flips_successful_rows() {
        let (mut conn, id) = setup_booking();
        apply_payment_status(&mut conn, &id, PaymentStatus::Paid, &PaymentContext::default())
            .unwrap();

        apply_payment_status(&mut conn, &id, PaymentStatus::Refunded, &PaymentContext::default())
            .unwrap();

        let booking = queries::get_booking_by_id(&conn, &id).unwrap().unwrap();
        assert_eq!(booking.payment_status, PaymentStatus::Refunded);

        let payments = queries::get_payments_for_booking(&conn, &id).unwrap();
        assert!(payments
            .iter()
            .all(|p| p.status == PaymentRecordStatus::Refunded));
    }

    #[test]
    fn test_offline_payment_confirms_and_stays_unsettled() {
        let (mut conn, id) = setup_booking();

        let change = apply_offline_payment(&mut conn, &id).unwrap();
        assert_eq!(change.previous_status, BookingStatus::Pending);
        assert_eq!(change.booking.booking.status, BookingStatus::Confirmed);
        assert_eq!(change.booking.booking.payment_status, PaymentStatus::Pending);
        assert_eq!(
            change.booking.booking.payment_method.as_deref(),
            Some("pay_at_property")
        );

        let payments = queries::get_payments_for_booking(&conn, &id).unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].status, PaymentRecordStatus::Pending);
        assert_eq!(payments[0].amount, 36900.0);
    }

    #[test]
    fn test_offline_payment_rejected_when_already_paid() {
        let (mut conn, id) = setup_booking();
        apply_payment_status(&mut conn, &id, PaymentStatus::Paid, &PaymentContext::default())
            .unwrap();

        let result = apply_offline_payment(&mut conn, &id);
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
        assert_eq!(queries::get_payments_for_booking(&conn, &id).unwrap().len(), 1);
    }

    #[test]
    fn test_offline_payment_rejected_on_cancelled_booking() {
        let (mut conn, id) = setup_booking();
        apply_booking_status(&mut conn, &id, BookingStatus::Cancelled, None).unwrap();

        let result = apply_offline_payment(&mut conn, &id);
        assert!(matches!(result, Err(AppError::InvalidTransition { .. })));
    }

    #[test]
    fn test_offline_payment_on_confirmed_booking_keeps_status() {
        let (mut conn, id) = setup_booking();
        apply_booking_status(&mut conn, &id, BookingStatus::Confirmed, None).unwrap();

        let change = apply_offline_payment(&mut conn, &id).unwrap();
        assert_eq!(change.previous_status, BookingStatus::Confirmed);
        assert_eq!(change.booking.booking.status, BookingStatus::Confirmed);
    }

    #[test]
    fn test_double_paid_rejected_and_no_duplicate_row() {
        let (mut conn, id) = setup_booking();
        apply_payment_status(&mut conn, &id, PaymentStatus::Paid, &PaymentContext::default())
            .unwrap();

        let result =
            apply_payment_status(&mut conn, &id, PaymentStatus::Paid, &PaymentContext::default());
        assert!(matches!(result, Err(AppError::InvalidTransition { .. })));

        assert_eq!(queries::count_successful_payments(&conn, &id).unwrap(), 1);
    }
}
