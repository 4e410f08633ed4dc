use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use transita_booking::manifest::ManifestError;
use transita_booking::orchestrator::BookingError;
use transita_catalog::schedule::SeatLedgerError;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Anyhow(err.into())
    }
}

/// Booking failures keep their taxonomy on the wire: validation 400,
/// seat conflicts 409, missing aggregates 404, storage 500.
pub fn map_booking_error(err: BookingError) -> AppError {
    match err {
        BookingError::ScheduleNotFound(_) | BookingError::BookingNotFound(_) => {
            AppError::NotFoundError(err.to_string())
        }
        BookingError::ScheduleUnavailable(_)
        | BookingError::SeatCountMismatch { .. }
        | BookingError::PassengerCountMismatch { .. }
        | BookingError::AlreadyCancelled(_) => AppError::ValidationError(err.to_string()),
        BookingError::Seats(ref ledger) => match ledger {
            SeatLedgerError::Conflict(_) | SeatLedgerError::CapacityExceeded { .. } => {
                AppError::ConflictError(err.to_string())
            }
            _ => AppError::ValidationError(err.to_string()),
        },
        BookingError::Payment(_) => AppError::ValidationError(err.to_string()),
        BookingError::Storage(msg) => AppError::InternalServerError(msg),
    }
}

pub fn map_manifest_error(err: ManifestError) -> AppError {
    match err {
        ManifestError::PassengerNotFound(_) => AppError::NotFoundError(err.to_string()),
        ManifestError::InvalidTransition { .. } | ManifestError::JourneyDeparted => {
            AppError::ValidationError(err.to_string())
        }
    }
}
