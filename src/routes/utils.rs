use axum::http::{HeaderMap, StatusCode};
use uuid::Uuid;

use super::auth::{AuthError, AuthService};

#[inline]
pub fn validate_auth_token(headers: &HeaderMap, service: &AuthService) -> Result<Uuid, StatusCode> {
    let jwt_header_token = match headers.get("Authorization").map(|token| token.to_str()) {
        Some(Ok(token)) => token.trim_start_matches("Bearer ").trim(),
        _ => {
            return Err(StatusCode::UNAUTHORIZED);
        }
    };
    match service.verify_token(jwt_header_token) {
        Ok(user) => Ok(user),
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}

/// Guard for internal endpoints (payout trigger, payout-rail callback): a
/// static bearer token shared with the caller, not a user JWT.
#[inline]
pub fn require_service_token(headers: &HeaderMap, expected: &str) -> Result<(), StatusCode> {
    let presented = match headers.get("Authorization").map(|token| token.to_str()) {
        Some(Ok(token)) => token.trim_start_matches("Bearer ").trim(),
        _ => return Err(StatusCode::UNAUTHORIZED),
    };
    if presented != expected {
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(())
}

#[inline]
pub fn check_password(password: &str) -> Result<(), AuthError> {
    if password.len() < 8 {
        return Err(AuthError::WeakPassword(
            "Password must be at least 8 characters",
        ));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(AuthError::WeakPassword(
            "Password must contain at least one uppercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Err(AuthError::WeakPassword(
            "Password must contain at least one lowercase letter",
        ));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(AuthError::WeakPassword(
            "Password must contain at least one digit",
        ));
    }
    if !password.chars().any(|c| !c.is_alphanumeric()) {
        return Err(AuthError::WeakPassword(
            "Password must contain at least one special character",
        ));
    }
    Ok(())
}
