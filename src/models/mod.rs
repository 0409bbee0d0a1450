pub mod booking;
pub mod cottage;
pub mod event;
pub mod package;
pub mod payment;
pub mod safari;

pub use booking::{Booking, BookingDetails, BookingStatus, GuestDetails, PaymentStatus};
pub use cottage::Cottage;
pub use event::DomainEvent;
pub use package::Package;
pub use payment::{Payment, PaymentRecordStatus};
pub use safari::{SafariBooking, SafariBookingDetails, SafariType};
