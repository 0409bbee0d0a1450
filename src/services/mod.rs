pub mod availability;
pub mod booking;
pub mod events;
pub mod pricing;
pub mod transitions;
