use serde::Serialize;

use crate::models::{BookingDetails, SafariBookingDetails};

/// Domain events fanned out to notification/real-time consumers after the
/// owning transaction commits. Delivery is at-most-once and best-effort;
/// emission never affects the booking's recorded state.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    BookingCreated {
        booking: BookingDetails,
        safaris: Vec<SafariBookingDetails>,
    },
    BookingStatusChanged {
        booking: BookingDetails,
        #[serde(rename = "previousStatus")]
        previous_status: String,
    },
    PaymentStatusChanged {
        booking: BookingDetails,
    },
}

impl DomainEvent {
    pub fn booking_reference(&self) -> &str {
        match self {
            DomainEvent::BookingCreated { booking, .. }
            | DomainEvent::BookingStatusChanged { booking, .. }
            | DomainEvent::PaymentStatusChanged { booking } => {
                &booking.booking.booking_reference
            }
        }
    }
}
