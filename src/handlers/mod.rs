use axum::http::HeaderMap;

use crate::errors::AppError;

pub mod admin;
pub mod bookings;
pub mod cottages;
pub mod health;
pub mod packages;
pub mod payments;
pub mod safaris;

pub(crate) fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}
