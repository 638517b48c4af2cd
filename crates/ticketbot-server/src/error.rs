use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(Debug)]
pub enum AppError {
    Auth(String),
    BadRequest(String),
    Unavailable(String),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::BadRequest(msg) => {
                tracing::debug!("Rejected event payload: {msg}");
                (StatusCode::BAD_REQUEST, msg)
            }
            AppError::Unavailable(msg) => {
                tracing::error!("{msg}");
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
        };

        let body = ErrorBody {
            success: false,
            error: message,
        };

        (status, axum::Json(body)).into_response()
    }
}
