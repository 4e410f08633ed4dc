use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{map_booking_error, AppError};
use crate::state::AppState;
use transita_booking::orchestrator::SeatAvailability;
use transita_catalog::route::Route;
use transita_catalog::schedule::Schedule;

pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/schedules", get(list_schedules))
        .route("/v1/schedules/{id}", get(get_schedule))
        .route("/v1/schedules/{id}/seats", get(seat_availability))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/routes", post(create_route).get(list_routes))
        .route("/v1/admin/schedules", post(create_schedule).get(list_all_schedules))
        .route("/v1/admin/schedules/{id}/active", patch(set_schedule_active))
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct CreateRoutePayload {
    route_number: String,
    origin: String,
    destination: String,
    distance_km: Option<f64>,
    fare_minor: i32,
}

#[derive(Debug, Deserialize)]
struct CreateSchedulePayload {
    route_id: Uuid,
    journey_date: NaiveDate,
    departure_time: String,
    arrival_time: String,
    bus_number: String,
    driver_name: Option<String>,
    capacity: i32,
}

#[derive(Debug, Deserialize)]
struct SetActivePayload {
    is_active: bool,
}

#[derive(Debug, Serialize)]
struct ScheduleResponse {
    id: Uuid,
    route_id: Uuid,
    schedule_ref: String,
    journey_date: NaiveDate,
    departure_time: String,
    arrival_time: String,
    bus_number: String,
    driver_name: Option<String>,
    capacity: i32,
    available_seats: i32,
    booked_seats: Vec<i32>,
    is_active: bool,
}

impl From<Schedule> for ScheduleResponse {
    fn from(schedule: Schedule) -> Self {
        Self {
            id: schedule.id,
            route_id: schedule.route_id,
            schedule_ref: schedule.schedule_ref.clone(),
            journey_date: schedule.journey_date,
            departure_time: schedule.departure_time.clone(),
            arrival_time: schedule.arrival_time.clone(),
            bus_number: schedule.bus_number.clone(),
            driver_name: schedule.driver_name.clone(),
            capacity: schedule.capacity,
            available_seats: schedule.available_seats(),
            booked_seats: schedule.booked_seats,
            is_active: schedule.is_active,
        }
    }
}

// ============================================================================
// Public Handlers
// ============================================================================

/// GET /v1/schedules
async fn list_schedules(
    State(state): State<AppState>,
) -> Result<Json<Vec<ScheduleResponse>>, AppError> {
    let schedules = state
        .schedules
        .list_schedules(true)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(Json(schedules.into_iter().map(ScheduleResponse::from).collect()))
}

/// GET /v1/schedules/{id}
async fn get_schedule(
    State(state): State<AppState>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<ScheduleResponse>, AppError> {
    let schedule = state
        .schedules
        .get_schedule(schedule_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError("Schedule not found".to_string()))?;
    Ok(Json(schedule.into()))
}

/// GET /v1/schedules/{id}/seats
/// Seat map cross-checked against confirmed bookings.
async fn seat_availability(
    State(state): State<AppState>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<SeatAvailability>, AppError> {
    let availability = state
        .orchestrator
        .seat_availability(schedule_id)
        .await
        .map_err(map_booking_error)?;
    Ok(Json(availability))
}

// ============================================================================
// Admin Handlers
// ============================================================================

/// POST /v1/admin/routes
async fn create_route(
    State(state): State<AppState>,
    Json(payload): Json<CreateRoutePayload>,
) -> Result<(StatusCode, Json<Route>), AppError> {
    if payload.fare_minor < 0 {
        return Err(AppError::ValidationError("Fare cannot be negative".to_string()));
    }

    let mut route = Route::new(
        payload.route_number,
        payload.origin,
        payload.destination,
        payload.fare_minor,
    );
    route.distance_km = payload.distance_km;

    state
        .routes
        .create_route(&route)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok((StatusCode::CREATED, Json(route)))
}

/// GET /v1/admin/routes
async fn list_routes(State(state): State<AppState>) -> Result<Json<Vec<Route>>, AppError> {
    let routes = state
        .routes
        .list_routes()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(Json(routes))
}

/// POST /v1/admin/schedules
async fn create_schedule(
    State(state): State<AppState>,
    Json(payload): Json<CreateSchedulePayload>,
) -> Result<(StatusCode, Json<ScheduleResponse>), AppError> {
    if payload.capacity < 1 {
        return Err(AppError::ValidationError("Capacity must be at least 1".to_string()));
    }

    state
        .routes
        .get_route(payload.route_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError("Route not found".to_string()))?;

    let schedule = Schedule::new(
        payload.route_id,
        payload.journey_date,
        payload.departure_time,
        payload.arrival_time,
        payload.bus_number,
        payload.driver_name,
        payload.capacity,
    );

    state
        .schedules
        .create_schedule(&schedule)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    tracing::info!("Schedule created: {}", schedule.schedule_ref);

    Ok((StatusCode::CREATED, Json(schedule.into())))
}

/// GET /v1/admin/schedules
async fn list_all_schedules(
    State(state): State<AppState>,
) -> Result<Json<Vec<ScheduleResponse>>, AppError> {
    let schedules = state
        .schedules
        .list_schedules(false)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(Json(schedules.into_iter().map(ScheduleResponse::from).collect()))
}

/// PATCH /v1/admin/schedules/{id}/active
async fn set_schedule_active(
    State(state): State<AppState>,
    Path(schedule_id): Path<Uuid>,
    Json(payload): Json<SetActivePayload>,
) -> Result<StatusCode, AppError> {
    let updated = state
        .schedules
        .set_schedule_active(schedule_id, payload.is_active)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    if updated {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFoundError("Schedule not found".to_string()))
    }
}
