use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use crate::db::queries::{self, BookingFilter, BookingStats};
use crate::errors::AppError;
use crate::handlers::check_auth;
use crate::models::{BookingDetails, BookingStatus, Cottage, Package, PaymentStatus, SafariType};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

// GET /api/admin/bookings
#[derive(Deserialize)]
pub struct AdminBookingsQuery {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub cottage_type: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminBookingsResponse {
    pub bookings: Vec<BookingDetails>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

pub async fn get_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AdminBookingsQuery>,
) -> Result<Json<AdminBookingsResponse>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    if let Some(status) = &query.status {
        if BookingStatus::try_parse(status).is_none() {
            return Err(AppError::InvalidInput(format!("unknown status '{status}'")));
        }
    }
    if let Some(payment_status) = &query.payment_status {
        if PaymentStatus::try_parse(payment_status).is_none() {
            return Err(AppError::InvalidInput(format!(
                "unknown payment status '{payment_status}'"
            )));
        }
    }

    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);

    let filter = BookingFilter {
        status: query.status,
        payment_status: query.payment_status,
        date_from: query.date_from,
        date_to: query.date_to,
        cottage_type: query.cottage_type,
        limit,
        offset,
    };

    let (bookings, total) = {
        let db = state.db.lock().unwrap();
        queries::list_bookings(&db, &filter)?
    };

    Ok(Json(AdminBookingsResponse {
        bookings,
        total,
        limit,
        offset,
    }))
}

// GET /api/admin/stats
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<BookingStats>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let db = state.db.lock().unwrap();
    Ok(Json(queries::booking_stats(&db)?))
}

// GET /api/admin/reports/revenue
#[derive(Deserialize)]
pub struct RevenueQuery {
    pub period: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

pub async fn revenue_report(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<RevenueQuery>,
) -> Result<Json<Vec<queries::RevenuePeriod>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let period = query.period.as_deref().unwrap_or("monthly");
    let bucket_fmt = match period {
        "daily" => "%Y-%m-%d",
        "monthly" => "%Y-%m",
        "yearly" => "%Y",
        other => {
            return Err(AppError::InvalidInput(format!(
                "unknown period '{other}', expected daily, monthly or yearly"
            )))
        }
    };

    let db = state.db.lock().unwrap();
    Ok(Json(queries::revenue_report(
        &db,
        bucket_fmt,
        query.date_from,
        query.date_to,
    )?))
}

// GET /api/admin/reports/occupancy
#[derive(Deserialize)]
pub struct OccupancyQuery {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

pub async fn occupancy_report(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<OccupancyQuery>,
) -> Result<Json<Vec<queries::CottageOccupancy>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let db = state.db.lock().unwrap();
    Ok(Json(queries::occupancy_report(
        &db,
        query.date_from,
        query.date_to,
    )?))
}

// GET /api/admin/events — SSE stream of domain events
#[derive(Deserialize)]
pub struct SseQuery {
    pub token: Option<String>,
}

pub async fn events_stream(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SseQuery>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    // Auth via query param (EventSource can't set headers)
    let token = query.token.as_deref().unwrap_or("");
    if token != state.config.admin_token {
        return Err(AppError::Unauthorized);
    }

    let rx = state.events_tx.subscribe();

    let live_stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(event) => {
            let data = serde_json::to_string(&event).unwrap_or_default();
            Some(Ok(Event::default().data(data).event("domain_event")))
        }
        Err(tokio_stream::wrappers::errors::BroadcastStreamRecvError::Lagged(_)) => None,
    });

    let keepalive_stream = tokio_stream::StreamExt::map(
        tokio_stream::wrappers::IntervalStream::new(tokio::time::interval(Duration::from_secs(30))),
        |_| Ok(Event::default().comment("keepalive")),
    );

    Ok(Sse::new(StreamExt::merge(live_stream, keepalive_stream)))
}

// ── Catalog management ──

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CottagePayload {
    pub name: String,
    #[serde(rename = "type")]
    pub cottage_type: String,
    #[serde(default)]
    pub description: Option<String>,
    pub base_price: f64,
    pub max_guests: i64,
    #[serde(default)]
    pub amenities: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

fn validate_cottage(payload: &CottagePayload) -> Result<(), AppError> {
    if payload.name.trim().is_empty() || payload.cottage_type.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "name and type are required".to_string(),
        ));
    }
    if payload.base_price <= 0.0 {
        return Err(AppError::InvalidInput(
            "base price must be positive".to_string(),
        ));
    }
    if payload.max_guests < 1 {
        return Err(AppError::InvalidInput(
            "max guests must be at least 1".to_string(),
        ));
    }
    Ok(())
}

// POST /api/admin/cottages
pub async fn create_cottage(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CottagePayload>,
) -> Result<(StatusCode, Json<Cottage>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    validate_cottage(&body)?;

    let cottage = Cottage {
        id: Uuid::new_v4().to_string(),
        name: body.name,
        cottage_type: body.cottage_type,
        description: body.description,
        base_price: body.base_price,
        max_guests: body.max_guests,
        amenities: body.amenities,
        is_active: body.is_active,
    };

    {
        let db = state.db.lock().unwrap();
        if queries::get_cottage_by_type(&db, &cottage.cottage_type)?.is_some() {
            return Err(AppError::Conflict(format!(
                "cottage type '{}' already exists",
                cottage.cottage_type
            )));
        }
        queries::insert_cottage(&db, &cottage)?;
    }

    Ok((StatusCode::CREATED, Json(cottage)))
}

// PUT /api/admin/cottages/:id
pub async fn update_cottage(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<CottagePayload>,
) -> Result<Json<Cottage>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    validate_cottage(&body)?;

    let cottage = Cottage {
        id: id.clone(),
        name: body.name,
        cottage_type: body.cottage_type,
        description: body.description,
        base_price: body.base_price,
        max_guests: body.max_guests,
        amenities: body.amenities,
        is_active: body.is_active,
    };

    let db = state.db.lock().unwrap();
    if !queries::update_cottage(&db, &cottage)? {
        return Err(AppError::NotFound(format!("cottage '{id}'")));
    }
    Ok(Json(cottage))
}

// PATCH /api/admin/cottages/:id/price
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePayload {
    pub base_price: f64,
}

pub async fn update_cottage_price(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<PricePayload>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    if body.base_price <= 0.0 {
        return Err(AppError::InvalidInput(
            "base price must be positive".to_string(),
        ));
    }

    let db = state.db.lock().unwrap();
    if !queries::update_cottage_price(&db, &id, body.base_price)? {
        return Err(AppError::NotFound(format!("cottage '{id}'")));
    }
    Ok(Json(serde_json::json!({"ok": true})))
}

// DELETE /api/admin/cottages/:id — soft delete; booking history keeps the row.
pub async fn delete_cottage(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let db = state.db.lock().unwrap();
    if !queries::deactivate_cottage(&db, &id)? {
        return Err(AppError::NotFound(format!("cottage '{id}'")));
    }
    Ok(Json(serde_json::json!({"ok": true})))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackagePayload {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price_multiplier: f64,
    #[serde(default)]
    pub includes_safari: bool,
    #[serde(default)]
    pub max_safaris: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn validate_package(payload: &PackagePayload) -> Result<(), AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::InvalidInput("name is required".to_string()));
    }
    if payload.price_multiplier <= 0.0 {
        return Err(AppError::InvalidInput(
            "price multiplier must be positive".to_string(),
        ));
    }
    if payload.max_safaris < 0 {
        return Err(AppError::InvalidInput(
            "max safaris cannot be negative".to_string(),
        ));
    }
    Ok(())
}

// POST /api/admin/packages
pub async fn create_package(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<PackagePayload>,
) -> Result<(StatusCode, Json<Package>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    validate_package(&body)?;

    let package = Package {
        id: Uuid::new_v4().to_string(),
        name: body.name,
        description: body.description,
        price_multiplier: body.price_multiplier,
        includes_safari: body.includes_safari,
        max_safaris: body.max_safaris,
        is_active: body.is_active,
    };

    {
        let db = state.db.lock().unwrap();
        queries::insert_package(&db, &package)?;
    }

    Ok((StatusCode::CREATED, Json(package)))
}

// PUT /api/admin/packages/:id
pub async fn update_package(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<PackagePayload>,
) -> Result<Json<Package>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    validate_package(&body)?;

    let package = Package {
        id: id.clone(),
        name: body.name,
        description: body.description,
        price_multiplier: body.price_multiplier,
        includes_safari: body.includes_safari,
        max_safaris: body.max_safaris,
        is_active: body.is_active,
    };

    let db = state.db.lock().unwrap();
    if !queries::update_package(&db, &package)? {
        return Err(AppError::NotFound(format!("package '{id}'")));
    }
    Ok(Json(package))
}

// DELETE /api/admin/packages/:id
pub async fn delete_package(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let db = state.db.lock().unwrap();
    if queries::count_bookings_for_package(&db, &id)? > 0 {
        return Err(AppError::Conflict(
            "package is referenced by bookings".to_string(),
        ));
    }
    if !queries::delete_package(&db, &id)? {
        return Err(AppError::NotFound(format!("package '{id}'")));
    }
    Ok(Json(serde_json::json!({"ok": true})))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafariPayload {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    pub duration: String,
    pub max_guests: i64,
    pub time_slots: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn validate_safari(payload: &SafariPayload) -> Result<(), AppError> {
    if payload.name.trim().is_empty() {
        return Err(AppError::InvalidInput("name is required".to_string()));
    }
    if payload.price < 0.0 {
        return Err(AppError::InvalidInput(
            "price cannot be negative".to_string(),
        ));
    }
    if payload.max_guests < 1 {
        return Err(AppError::InvalidInput(
            "max guests must be at least 1".to_string(),
        ));
    }
    if payload.time_slots.is_empty() {
        return Err(AppError::InvalidInput(
            "at least one time slot is required".to_string(),
        ));
    }
    Ok(())
}

// POST /api/admin/safaris
pub async fn create_safari(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<SafariPayload>,
) -> Result<(StatusCode, Json<SafariType>), AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    validate_safari(&body)?;

    let safari = SafariType {
        id: Uuid::new_v4().to_string(),
        name: body.name,
        description: body.description,
        price: body.price,
        duration: body.duration,
        max_guests: body.max_guests,
        time_slots: body.time_slots,
        is_active: body.is_active,
    };

    {
        let db = state.db.lock().unwrap();
        queries::insert_safari_type(&db, &safari)?;
    }

    Ok((StatusCode::CREATED, Json(safari)))
}

// PUT /api/admin/safaris/:id
pub async fn update_safari(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<SafariPayload>,
) -> Result<Json<SafariType>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    validate_safari(&body)?;

    let safari = SafariType {
        id: id.clone(),
        name: body.name,
        description: body.description,
        price: body.price,
        duration: body.duration,
        max_guests: body.max_guests,
        time_slots: body.time_slots,
        is_active: body.is_active,
    };

    let db = state.db.lock().unwrap();
    if !queries::update_safari_type(&db, &safari)? {
        return Err(AppError::NotFound(format!("safari '{id}'")));
    }
    Ok(Json(safari))
}
