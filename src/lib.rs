use std::sync::Arc;

use axum::routing::{get, patch, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod services;
pub mod state;

use state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/cottages", get(handlers::cottages::list_cottages))
        .route(
            "/api/cottages/:cottage_type",
            get(handlers::cottages::get_cottage),
        )
        .route(
            "/api/cottages/:cottage_type/availability",
            post(handlers::cottages::check_availability),
        )
        .route(
            "/api/cottages/:cottage_type/calendar",
            get(handlers::cottages::calendar),
        )
        .route("/api/packages", get(handlers::packages::list_packages))
        .route("/api/packages/quote", post(handlers::packages::quote))
        .route("/api/packages/:id", get(handlers::packages::get_package))
        .route("/api/safaris", get(handlers::safaris::list_safaris))
        .route(
            "/api/safaris/validate",
            post(handlers::safaris::validate_selections),
        )
        .route("/api/safaris/:id", get(handlers::safaris::get_safari))
        .route(
            "/api/safaris/:id/slots/:date",
            get(handlers::safaris::slot_availability),
        )
        .route(
            "/api/safaris/:id/available-dates",
            get(handlers::safaris::available_dates),
        )
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route(
            "/api/bookings/reference/:reference",
            get(handlers::bookings::get_by_reference),
        )
        .route(
            "/api/bookings/:id/status",
            patch(handlers::bookings::update_status),
        )
        .route(
            "/api/bookings/:id/payment",
            patch(handlers::bookings::update_payment),
        )
        .route("/api/payments/confirm", post(handlers::payments::confirm_payment))
        .route("/api/payments/failed", post(handlers::payments::failed_payment))
        .route("/api/payments/offline", post(handlers::payments::offline_payment))
        .route(
            "/api/payments/booking/:reference",
            get(handlers::payments::payments_for_booking),
        )
        .route("/api/admin/bookings", get(handlers::admin::get_bookings))
        .route("/api/admin/stats", get(handlers::admin::get_stats))
        .route(
            "/api/admin/reports/revenue",
            get(handlers::admin::revenue_report),
        )
        .route(
            "/api/admin/reports/occupancy",
            get(handlers::admin::occupancy_report),
        )
        .route("/api/admin/events", get(handlers::admin::events_stream))
        .route("/api/admin/cottages", post(handlers::admin::create_cottage))
        .route(
            "/api/admin/cottages/:id",
            put(handlers::admin::update_cottage).delete(handlers::admin::delete_cottage),
        )
        .route(
            "/api/admin/cottages/:id/price",
            patch(handlers::admin::update_cottage_price),
        )
        .route("/api/admin/packages", post(handlers::admin::create_package))
        .route(
            "/api/admin/packages/:id",
            put(handlers::admin::update_package).delete(handlers::admin::delete_package),
        )
        .route("/api/admin/safaris", post(handlers::admin::create_safari))
        .route("/api/admin/safaris/:id", put(handlers::admin::update_safari))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
