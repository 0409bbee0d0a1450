use std::collections::HashMap;

use anyhow::anyhow;
use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    Booking, BookingDetails, BookingStatus, GuestDetails, PaymentStatus, SafariBooking,
    SafariBookingDetails,
};
use crate::services::availability;
use crate::services::pricing::{self, PriceBreakdown, SafariLine};

const REFERENCE_PREFIX: &str = "VM";
const REFERENCE_ATTEMPTS: usize = 10;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub cottage_type: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub adults: i64,
    #[serde(default)]
    pub children: i64,
    #[serde(default)]
    pub package_id: Option<String>,
    #[serde(default)]
    pub selected_safaris: Vec<SafariSelection>,
    pub guest_details: GuestDetails,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub special_requests: Option<String>,
    /// Client-echoed quote total; the stored amount is always recomputed
    /// server-side.
    #[serde(default)]
    pub total_amount: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafariSelection {
    pub safari_id: String,
    pub date: NaiveDate,
    pub time_slot: String,
    pub participants: i64,
}

#[derive(Debug, Serialize)]
pub struct CreatedBooking {
    pub booking: BookingDetails,
    pub safaris: Vec<SafariBookingDetails>,
    pub price: PriceBreakdown,
}

/// Booking reference: prefix + 6 time-derived digits + 4 random
/// alphanumerics. Stable once issued; used as the external lookup key.
fn generate_reference() -> String {
    let millis = Utc::now().timestamp_millis().to_string();
    let digits = &millis[millis.len().saturating_sub(6)..];
    let random = Uuid::new_v4().simple().to_string()[..4].to_uppercase();
    format!("{REFERENCE_PREFIX}{digits}{random}")
}

fn validate_request(req: &CreateBookingRequest) -> Result<i64, AppError> {
    let nights = availability::validate_stay(req.check_in, req.check_out)?;
    if req.adults < 1 {
        return Err(AppError::InvalidInput(
            "at least one adult is required".to_string(),
        ));
    }
    if req.children < 0 {
        return Err(AppError::InvalidInput(
            "children count cannot be negative".to_string(),
        ));
    }
    if req.guest_details.name.trim().is_empty() || req.guest_details.email.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "guest name and email are required".to_string(),
        ));
    }
    for selection in &req.selected_safaris {
        if selection.participants < 1 {
            return Err(AppError::InvalidInput(format!(
                "safari {} needs at least one participant",
                selection.safari_id
            )));
        }
    }
    Ok(nights)
}

/// Creates a booking atomically: availability re-check, safari slot and
/// capacity validation, pricing, and all row inserts happen inside one
/// transaction. Either the booking and every safari row commit together
/// or nothing is persisted. The caller emits the BookingCreated event
/// after this returns, so a sink failure can never roll the booking back.
pub fn create_booking(
    conn: &mut Connection,
    req: &CreateBookingRequest,
) -> Result<CreatedBooking, AppError> {
    let nights = validate_request(req)?;

    let tx = conn.transaction()?;

    let cottage = queries::get_cottage_by_type(&tx, &req.cottage_type)?
        .ok_or_else(|| AppError::NotFound(format!("cottage '{}'", req.cottage_type)))?;

    let guests = req.adults + req.children;
    if guests > cottage.max_guests {
        return Err(AppError::InvalidInput(format!(
            "{} sleeps at most {} guests",
            cottage.name, cottage.max_guests
        )));
    }

    // Final authority on availability, even if an advisory check passed.
    let result =
        availability::check_availability(&tx, &cottage.id, req.check_in, req.check_out)?;
    if !result.available {
        return Err(AppError::Conflict(format!(
            "cottage is no longer available for the selected dates ({} conflicting booking(s))",
            result.conflicts.len()
        )));
    }

    let package = match &req.package_id {
        Some(package_id) => Some(
            queries::get_package(&tx, package_id)?
                .ok_or_else(|| AppError::NotFound(format!("package '{package_id}'")))?,
        ),
        None => None,
    };

    // Validate every safari selection against its slots and the remaining
    // capacity of its (type, date, slot) bucket, counting earlier
    // selections in this same request toward the bucket.
    let mut safari_lines = Vec::with_capacity(req.selected_safaris.len());
    let mut requested_in_bucket: HashMap<(String, NaiveDate, String), i64> = HashMap::new();
    let mut capacity_errors = vec![];

    for selection in &req.selected_safaris {
        let safari = queries::get_safari_type(&tx, &selection.safari_id)?
            .ok_or_else(|| AppError::NotFound(format!("safari '{}'", selection.safari_id)))?;

        if !safari.time_slots.contains(&selection.time_slot) {
            return Err(AppError::InvalidInput(format!(
                "'{}' is not a time slot of safari '{}'",
                selection.time_slot, safari.name
            )));
        }

        let bucket = (
            selection.safari_id.clone(),
            selection.date,
            selection.time_slot.clone(),
        );
        let already_requested = requested_in_bucket.get(&bucket).copied().unwrap_or(0);
        let booked = queries::sum_safari_participants(
            &tx,
            &selection.safari_id,
            selection.date,
            &selection.time_slot,
        )?;

        if booked + already_requested + selection.participants > safari.max_guests {
            capacity_errors.push(format!(
                "{} on {} at {}: {} spot(s) left",
                safari.name,
                selection.date,
                selection.time_slot,
                (safari.max_guests - booked - already_requested).max(0)
            ));
        }
        *requested_in_bucket.entry(bucket).or_insert(0) += selection.participants;

        safari_lines.push(SafariLine {
            safari_type_id: safari.id.clone(),
            name: safari.name.clone(),
            unit_price: safari.price,
            participants: selection.participants,
        });
    }

    if !capacity_errors.is_empty() {
        return Err(AppError::Conflict(format!(
            "safari capacity exceeded: {}",
            capacity_errors.join("; ")
        )));
    }

    let price = pricing::compute_price(&cottage, nights, guests, package.as_ref(), &safari_lines);

    if let Some(echoed) = req.total_amount {
        if (echoed - price.grand_total as f64).abs() > 1.0 {
            tracing::warn!(
                echoed,
                computed = price.grand_total,
                cottage = %cottage.cottage_type,
                "client quote disagrees with computed total; storing computed value"
            );
        }
    }

    let mut reference = generate_reference();
    let mut attempts = 1;
    while queries::booking_reference_exists(&tx, &reference)? {
        if attempts >= REFERENCE_ATTEMPTS {
            return Err(AppError::Internal(anyhow!(
                "could not generate a unique booking reference"
            )));
        }
        reference = generate_reference();
        attempts += 1;
    }

    let now = Utc::now().naive_utc();
    let booking_id = Uuid::new_v4().to_string();
    let booking = Booking {
        id: booking_id.clone(),
        booking_reference: reference,
        cottage_id: cottage.id.clone(),
        package_id: package.as_ref().map(|p| p.id.clone()),
        check_in_date: req.check_in,
        check_out_date: req.check_out,
        adults: req.adults,
        children: req.children,
        total_amount: price.grand_total as f64,
        status: BookingStatus::Pending,
        payment_status: PaymentStatus::Pending,
        payment_method: req.payment_method.clone(),
        special_requests: req.special_requests.clone(),
        guest_details: req.guest_details.clone(),
        admin_notes: None,
        created_at: now,
        updated_at: now,
    };
    queries::insert_booking(&tx, &booking)?;

    for selection in &req.selected_safaris {
        queries::insert_safari_booking(
            &tx,
            &SafariBooking {
                id: Uuid::new_v4().to_string(),
                booking_id: booking_id.clone(),
                safari_type_id: selection.safari_id.clone(),
                participants: selection.participants,
                date: selection.date,
                time_slot: selection.time_slot.clone(),
            },
        )?;
    }

    let details = queries::get_booking_details(&tx, &booking_id)?
        .ok_or_else(|| AppError::Internal(anyhow!("booking row vanished before commit")))?;
    let safaris = queries::get_safari_bookings(&tx, &booking_id)?;

    tx.commit()?;

    tracing::info!(
        reference = %details.booking.booking_reference,
        cottage = %details.cottage_type,
        nights,
        total = details.booking.total_amount,
        "booking created"
    );

    Ok(CreatedBooking {
        booking: details,
        safaris,
        price,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{Cottage, Package, SafariType};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn setup_db() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
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
        queries::insert_package(
            &conn,
            &Package {
                id: "p-1".to_string(),
                name: "Safari Adventure".to_string(),
                description: None,
                price_multiplier: 1.5,
                includes_safari: true,
                max_safaris: 1,
                is_active: true,
            },
        )
        .unwrap();
        queries::insert_safari_type(
            &conn,
            &SafariType {
                id: "s-1".to_string(),
                name: "Morning Safari".to_string(),
                description: None,
                price: 500.0,
                duration: "3 hours".to_string(),
                max_guests: 6,
                time_slots: vec!["06:00".to_string(), "07:00".to_string()],
                is_active: true,
            },
        )
        .unwrap();
        conn
    }

    fn request() -> CreateBookingRequest {
        CreateBookingRequest {
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
                phone: Some("+911234567890".to_string()),
            },
            payment_method: None,
            special_requests: None,
            total_amount: None,
        }
    }

    #[test]
    fn test_create_booking_computes_total() {
        let mut conn = setup_db();
        let created = create_booking(&mut conn, &request()).unwrap();

        assert_eq!(created.booking.booking.status, BookingStatus::Pending);
        assert_eq!(created.booking.booking.payment_status, PaymentStatus::Pending);
        assert_eq!(created.booking.booking.total_amount, 36900.0);
        assert!(created.booking.booking.booking_reference.starts_with("VM"));
        assert_eq!(created.booking.booking.booking_reference.len(), 12);
    }

    #[test]
    fn test_unknown_cottage_is_not_found() {
        let mut conn = setup_db();
        let mut req = request();
        req.cottage_type = "treehouse".to_string();

        let result = create_booking(&mut conn, &req);
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_overlap_conflicts_and_writes_nothing() {
        let mut conn = setup_db();
        create_booking(&mut conn, &request()).unwrap();

        let mut req = request();
        req.check_in = date("2024-04-02");
        req.check_out = date("2024-04-05");
        let result = create_booking(&mut conn, &req);
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM bookings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_back_to_back_booking_allowed() {
        let mut conn = setup_db();
        create_booking(&mut conn, &request()).unwrap();

        let mut req = request();
        req.check_in = date("2024-04-03");
        req.check_out = date("2024-04-05");
        assert!(create_booking(&mut conn, &req).is_ok());
    }

    #[test]
    fn test_safari_waived_by_package() {
        let mut conn = setup_db();
        let mut req = request();
        req.package_id = Some("p-1".to_string());
        req.selected_safaris = vec![SafariSelection {
            safari_id: "s-1".to_string(),
            date: date("2024-04-02"),
            time_slot: "06:00".to_string(),
            participants: 2,
        }];

        let created = create_booking(&mut conn, &req).unwrap();
        assert!(created.price.safaris[0].waived);
        assert_eq!(created.price.safari_total, 0);
        assert_eq!(created.safaris.len(), 1);
        // villa 30000 * 1.5 = 45000; +18% +5%
        assert_eq!(created.price.grand_total, 55350);
        assert_eq!(created.booking.booking.total_amount, 55350.0);
    }

    #[test]
    fn test_unknown_time_slot_rejected_before_write() {
        let mut conn = setup_db();
        let mut req = request();
        req.selected_safaris = vec![SafariSelection {
            safari_id: "s-1".to_string(),
            date: date("2024-04-02"),
            time_slot: "13:00".to_string(),
            participants: 2,
        }];

        let result = create_booking(&mut conn, &req);
        assert!(matches!(result, Err(AppError::InvalidInput(_))));

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM bookings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_safari_capacity_exhaustion_conflicts() {
        let mut conn = setup_db();

        // First booking takes 4 of 6 slots.
        let mut first = request();
        first.selected_safaris = vec![SafariSelection {
            safari_id: "s-1".to_string(),
            date: date("2024-04-10"),
            time_slot: "06:00".to_string(),
            participants: 4,
        }];
        create_booking(&mut conn, &first).unwrap();

        // Second wants 3 more on another stay; only 2 remain.
        let mut second = request();
        second.check_in = date("2024-04-10");
        second.check_out = date("2024-04-12");
        second.adults = 3;
        second.selected_safaris = vec![SafariSelection {
            safari_id: "s-1".to_string(),
            date: date("2024-04-10"),
            time_slot: "06:00".to_string(),
            participants: 3,
        }];
        let result = create_booking(&mut conn, &second);
        assert!(matches!(result, Err(AppError::Conflict(_))));

        // The failed request left no safari rows behind.
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM safari_bookings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_duplicate_bucket_within_request_counted() {
        let mut conn = setup_db();
        let mut req = request();
        req.adults = 4;
        req.selected_safaris = vec![
            SafariSelection {
                safari_id: "s-1".to_string(),
                date: date("2024-04-02"),
                time_slot: "06:00".to_string(),
                participants: 4,
            },
            SafariSelection {
                safari_id: "s-1".to_string(),
                date: date("2024-04-02"),
                time_slot: "06:00".to_string(),
                participants: 4,
            },
        ];

        // 4 + 4 > 6 even though the ledger is empty.
        let result = create_booking(&mut conn, &req);
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[test]
    fn test_party_over_cottage_capacity_rejected() {
        let mut conn = setup_db();
        let mut req = request();
        req.adults = 10;
        req.children = 4;

        let result = create_booking(&mut conn, &req);
        assert!(matches!(result, Err(AppError::InvalidInput(_))));

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM bookings", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_party_at_cottage_capacity_allowed() {
        let mut conn = setup_db();
        let mut req = request();
        req.adults = 4;
        req.children = 2; // exactly max_guests

        assert!(create_booking(&mut conn, &req).is_ok());
    }

    #[test]
    fn test_zero_adults_rejected() {
        let mut conn = setup_db();
        let mut req = request();
        req.adults = 0;
        assert!(matches!(
            create_booking(&mut conn, &req),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_references_are_unique() {
        let mut conn = setup_db();
        let first = create_booking(&mut conn, &request()).unwrap();

        let mut req = request();
        req.check_in = date("2024-05-01");
        req.check_out = date("2024-05-02");
        let second = create_booking(&mut conn, &req).unwrap();

        assert_ne!(
            first.booking.booking.booking_reference,
            second.booking.booking.booking_reference
        );
    }
}
