use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::state::AppState;

/// Proof that a request came from the configured gateway relay.
pub struct RelayAuth;

impl FromRequestParts<AppState> for RelayAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // No token configured: open ingress (local relay).
        let Some(expected) = state.config.relay.token.as_deref() else {
            return Ok(RelayAuth);
        };

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?;

        if token != expected {
            tracing::warn!("Rejected event with invalid relay token");
            return Err(AppError::Auth("Invalid relay token".to_string()));
        }
        Ok(RelayAuth)
    }
}
