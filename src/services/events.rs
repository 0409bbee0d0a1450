use crate::models::DomainEvent;
use crate::state::AppState;

/// Publishes a domain event to every connected admin stream. Delivery is
/// best effort: events are emitted only after the underlying transaction
/// committed, and a missing or slow subscriber never fails the request.
pub fn emit(state: &AppState, event: DomainEvent) {
    let reference = event.booking_reference().to_string();
    match state.events_tx.send(event) {
        Ok(receivers) => {
            tracing::debug!(reference = %reference, receivers, "event delivered");
        }
        Err(_) => {
            // No subscribers right now. The state change already committed,
            // so this is not an error.
            tracing::debug!(reference = %reference, "event dropped, no subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::db;
    use crate::models::{
        Booking, BookingDetails, BookingStatus, DomainEvent, GuestDetails, PaymentStatus,
    };
    use chrono::NaiveDate;
    use std::sync::{Arc, Mutex};
    use tokio::sync::broadcast;

    fn state() -> AppState {
        AppState {
            db: Arc::new(Mutex::new(db::init_db(":memory:").unwrap())),
            config: AppConfig {
                port: 0,
                database_url: ":memory:".to_string(),
                admin_token: "test".to_string(),
            },
            events_tx: broadcast::channel(16).0,
        }
    }

    fn sample_booking() -> BookingDetails {
        let now = chrono::Utc::now().naive_utc();
        BookingDetails {
            booking: Booking {
                id: "b-1".to_string(),
                booking_reference: "VM123456ABCD".to_string(),
                cottage_id: "c-1".to_string(),
                package_id: None,
                check_in_date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
                check_out_date: NaiveDate::from_ymd_opt(2024, 4, 3).unwrap(),
                adults: 2,
                children: 0,
                total_amount: 36900.0,
                status: BookingStatus::Pending,
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
            },
            cottage_name: "Glass Cottage".to_string(),
            cottage_type: "glass-cottage".to_string(),
            package_name: None,
        }
    }

    #[test]
    fn test_emit_reaches_subscriber() {
        let state = state();
        let mut rx = state.events_tx.subscribe();

        emit(
            &state,
            DomainEvent::BookingCreated {
                booking: sample_booking(),
                safaris: vec![],
            },
        );

        let event = rx.try_recv().unwrap();
        assert_eq!(event.booking_reference(), "VM123456ABCD");
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let state = state();
        emit(
            &state,
            DomainEvent::PaymentStatusChanged {
                booking: sample_booking(),
            },
        );
    }
}
