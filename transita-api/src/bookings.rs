use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{map_booking_error, AppError};
use crate::middleware::auth::CustomerClaims;
use crate::realtime;
use crate::state::AppState;
use transita_booking::models::{Booking, BookingStatus, Passenger, PaymentMethod, PaymentStatus};
use transita_booking::orchestrator::CreateBookingRequest;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking).get(list_my_bookings))
        .route("/v1/bookings/{id}", get(get_booking))
        .route("/v1/bookings/{id}/cancel", post(cancel_booking))
        .route("/v1/schedules/{id}/stream", get(realtime::schedule_stream))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Seat selections arrive either as a JSON array or as the seat-map
/// widget's comma-separated string; unparseable fragments are dropped.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SeatNumbers {
    List(Vec<i32>),
    Csv(String),
}

impl SeatNumbers {
    fn into_vec(self) -> Vec<i32> {
        match self {
            SeatNumbers::List(seats) => seats,
            SeatNumbers::Csv(raw) => {
                raw.split(',').filter_map(|s| s.trim().parse().ok()).collect()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateBookingPayload {
    schedule_id: Uuid,
    /// Defaults to the number of selected seats.
    seats: Option<i32>,
    seat_numbers: SeatNumbers,
    passengers: Option<Vec<Passenger>>,
    contact_phone: Option<String>,
    payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Serialize)]
struct BookingResponse {
    booking_id: Uuid,
    booking_reference: String,
    status: BookingStatus,
    schedule_id: Uuid,
    seats: i32,
    seat_numbers: Vec<i32>,
    total_price_minor: Option<i32>,
    payment_status: PaymentStatus,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            booking_id: booking.id,
            booking_reference: booking.booking_reference,
            status: booking.status,
            schedule_id: booking.schedule_id,
            seats: booking.seats,
            seat_numbers: booking.seat_numbers,
            total_price_minor: booking.total_price_minor,
            payment_status: booking.payment_status,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/bookings
async fn create_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Json(payload): Json<CreateBookingPayload>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let user_id = claims_user_id(&claims)?;

    let seat_numbers = payload.seat_numbers.into_vec();
    let seats = payload.seats.unwrap_or(seat_numbers.len() as i32);

    if seats > state.rules.max_seats_per_booking as i32 {
        return Err(AppError::ValidationError(format!(
            "At most {} seats per booking",
            state.rules.max_seats_per_booking
        )));
    }

    let request = CreateBookingRequest {
        user_id,
        schedule_id: payload.schedule_id,
        seats,
        seat_numbers,
        passengers: payload.passengers.unwrap_or_default(),
        contact_name: claims.name.clone(),
        contact_email: claims.email.clone(),
        contact_phone: payload.contact_phone,
        payment_method: payload.payment_method,
    };

    let booking = state
        .orchestrator
        .create_booking(request)
        .await
        .map_err(map_booking_error)?;

    tracing::info!("Booking created: {}", booking.booking_reference);

    Ok((StatusCode::CREATED, Json(booking.into())))
}

/// GET /v1/bookings
async fn list_my_bookings(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    let user_id = claims_user_id(&claims)?;
    let bookings = state
        .bookings
        .list_user_bookings(user_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(Json(bookings.into_iter().map(BookingResponse::from).collect()))
}

/// GET /v1/bookings/{id}
async fn get_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let user_id = claims_user_id(&claims)?;
    let booking = state
        .bookings
        .get_booking(booking_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError("Booking not found".to_string()))?;

    if booking.user_id != user_id {
        return Err(AppError::AuthorizationError(
            "Booking does not belong to you".to_string(),
        ));
    }

    Ok(Json(booking.into()))
}

/// POST /v1/bookings/{id}/cancel
async fn cancel_booking(
    State(state): State<AppState>,
    Extension(claims): Extension<CustomerClaims>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let user_id = claims_user_id(&claims)?;

    // Ownership check happens here; the orchestrator only owns the state
    // transition itself
    let booking = state
        .bookings
        .get_booking(booking_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError("Booking not found".to_string()))?;
    if booking.user_id != user_id {
        return Err(AppError::AuthorizationError(
            "Booking does not belong to you".to_string(),
        ));
    }

    let cancelled = state
        .orchestrator
        .cancel_booking(booking_id)
        .await
        .map_err(map_booking_error)?;

    tracing::info!("Booking cancelled: {}", cancelled.booking_reference);

    Ok(Json(cancelled.into()))
}

fn claims_user_id(claims: &CustomerClaims) -> Result<Uuid, AppError> {
    Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::AuthenticationError("Invalid subject claim".to_string()))
}
