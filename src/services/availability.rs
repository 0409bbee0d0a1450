use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Booking;

#[derive(Debug, Serialize)]
pub struct AvailabilityResult {
    pub available: bool,
    pub conflicts: Vec<Booking>,
}

/// Validates a half-open stay range and returns the night count.
pub fn validate_stay(check_in: NaiveDate, check_out: NaiveDate) -> Result<i64, AppError> {
    let nights = (check_out - check_in).num_days();
    if nights <= 0 {
        return Err(AppError::InvalidInput(
            "check-out must be after check-in".to_string(),
        ));
    }
    Ok(nights)
}

/// Pure read: pending/confirmed bookings whose [check_in, check_out)
/// intersects the requested range. A checkout on another booking's
/// check-in day is not a conflict. The orchestrator re-runs this inside
/// its write transaction; on its own this is only advisory.
pub fn check_availability(
    conn: &Connection,
    cottage_id: &str,
    check_in: NaiveDate,
    check_out: NaiveDate,
) -> Result<AvailabilityResult, AppError> {
    validate_stay(check_in, check_out)?;

    let conflicts = queries::find_overlapping_bookings(conn, cottage_id, check_in, check_out)?;
    Ok(AvailabilityResult {
        available: conflicts.is_empty(),
        conflicts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{Booking, BookingStatus, Cottage, GuestDetails, PaymentStatus};

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn insert_cottage(conn: &Connection) -> Cottage {
        let cottage = Cottage {
            id: "c-1".to_string(),
            name: "Glass Cottage".to_string(),
            cottage_type: "glass-cottage".to_string(),
            description: None,
            base_price: 15000.0,
            max_guests: 6,
            amenities: vec![],
            is_active: true,
        };
        queries::insert_cottage(conn, &cottage).unwrap();
        cottage
    }

    fn insert_booking(conn: &Connection, id: &str, check_in: &str, check_out: &str, status: BookingStatus) {
        let now = chrono::Utc::now().naive_utc();
        let booking = Booking {
            id: id.to_string(),
            booking_reference: format!("VM00000{id}"),
            cottage_id: "c-1".to_string(),
            package_id: None,
            check_in_date: date(check_in),
            check_out_date: date(check_out),
            adults: 2,
            children: 0,
            total_amount: 36900.0,
            status,
            payment_status: PaymentStatus::Pending,
            payment_method: None,
            special_requests: None,
            guest_details: GuestDetails {
                name: "Alice".to_string(),
                email: "alice@example.com".to_string(),
                phone: None,
            },
            admin_notes: None,
            created_at: now,
            updated_at: now,
        };
        queries::insert_booking(conn, &booking).unwrap();
    }

    #[test]
    fn test_empty_ledger_is_available() {
        let conn = setup_db();
        insert_cottage(&conn);

        let result =
            check_availability(&conn, "c-1", date("2024-04-01"), date("2024-04-03")).unwrap();
        assert!(result.available);
        assert!(result.conflicts.is_empty());
    }

    #[test]
    fn test_overlapping_confirmed_booking_conflicts() {
        let conn = setup_db();
        insert_cottage(&conn);
        insert_booking(&conn, "b1", "2024-04-01", "2024-04-05", BookingStatus::Confirmed);

        let result =
            check_availability(&conn, "c-1", date("2024-04-03"), date("2024-04-07")).unwrap();
        assert!(!result.available);
        assert_eq!(result.conflicts.len(), 1);
        assert_eq!(result.conflicts[0].id, "b1");
    }

    #[test]
    fn test_back_to_back_is_not_a_conflict() {
        let conn = setup_db();
        insert_cottage(&conn);
        insert_booking(&conn, "b1", "2024-04-01", "2024-04-03", BookingStatus::Confirmed);

        // Check-in on the other booking's checkout day.
        let result =
            check_availability(&conn, "c-1", date("2024-04-03"), date("2024-04-05")).unwrap();
        assert!(result.available);
    }

    #[test]
    fn test_cancelled_and_completed_never_block() {
        let conn = setup_db();
        insert_cottage(&conn);
        insert_booking(&conn, "b1", "2024-04-01", "2024-04-05", BookingStatus::Cancelled);
        insert_booking(&conn, "b2", "2024-04-02", "2024-04-06", BookingStatus::Completed);

        let result =
            check_availability(&conn, "c-1", date("2024-04-01"), date("2024-04-06")).unwrap();
        assert!(result.available);
    }

    #[test]
    fn test_pending_blocks() {
        let conn = setup_db();
        insert_cottage(&conn);
        insert_booking(&conn, "b1", "2024-04-01", "2024-04-05", BookingStatus::Pending);

        let result =
            check_availability(&conn, "c-1", date("2024-04-04"), date("2024-04-08")).unwrap();
        assert!(!result.available);
    }

    #[test]
    fn test_contained_range_conflicts() {
        let conn = setup_db();
        insert_cottage(&conn);
        insert_booking(&conn, "b1", "2024-04-01", "2024-04-10", BookingStatus::Confirmed);

        let result =
            check_availability(&conn, "c-1", date("2024-04-03"), date("2024-04-05")).unwrap();
        assert!(!result.available);
    }

    #[test]
    fn test_invalid_range_rejected() {
        let conn = setup_db();
        insert_cottage(&conn);

        let result = check_availability(&conn, "c-1", date("2024-04-05"), date("2024-04-05"));
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_window_query_uses_half_open_rule() {
        let conn = setup_db();
        insert_cottage(&conn);
        // Checks out on the window's first day and checks in on its end.
        insert_booking(&conn, "b1", "2024-03-28", "2024-04-01", BookingStatus::Confirmed);
        insert_booking(&conn, "b2", "2024-05-01", "2024-05-03", BookingStatus::Confirmed);
        insert_booking(&conn, "b3", "2024-04-10", "2024-04-12", BookingStatus::Confirmed);

        let window =
            queries::bookings_in_window(&conn, "c-1", date("2024-04-01"), date("2024-05-01"))
                .unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].id, "b3");
    }

    #[test]
    fn test_idempotent_read() {
        let conn = setup_db();
        insert_cottage(&conn);
        insert_booking(&conn, "b1", "2024-04-01", "2024-04-05", BookingStatus::Confirmed);

        let first =
            check_availability(&conn, "c-1", date("2024-04-02"), date("2024-04-04")).unwrap();
        let second =
            check_availability(&conn, "c-1", date("2024-04-02"), date("2024-04-04")).unwrap();
        assert_eq!(first.available, second.available);
        assert_eq!(first.conflicts.len(), second.conflicts.len());
    }
}
