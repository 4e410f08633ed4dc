use async_trait::async_trait;
use uuid::Uuid;

use crate::route::Route;
use crate::schedule::Schedule;

/// Result of an atomic seat reservation attempt. `Reserved` carries the
/// post-update schedule so callers can broadcast fresh seat state without a
/// second read.
#[derive(Debug, Clone)]
pub enum ReserveOutcome {
    Reserved(Schedule),
    Conflict(Vec<i32>),
    CapacityExceeded { requested: i32, available: i32 },
    Inactive,
    NotFound,
}

/// Data access for routes. Fare lookup tolerates missing routes: pricing is
/// optional on a booking.
#[async_trait]
pub trait RouteRepository: Send + Sync {
    async fn create_route(
        &self,
        route: &Route,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn get_route(
        &self,
        id: Uuid,
    ) -> Result<Option<Route>, Box<dyn std::error::Error + Send + Sync>>;

    async fn list_routes(
        &self,
    ) -> Result<Vec<Route>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Data access for schedules, including the seat-reservation serialization
/// point.
#[async_trait]
pub trait ScheduleRepository: Send + Sync {
    async fn create_schedule(
        &self,
        schedule: &Schedule,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn get_schedule(
        &self,
        id: Uuid,
    ) -> Result<Option<Schedule>, Box<dyn std::error::Error + Send + Sync>>;

    async fn list_schedules(
        &self,
        active_only: bool,
    ) -> Result<Vec<Schedule>, Box<dyn std::error::Error + Send + Sync>>;

    async fn set_schedule_active(
        &self,
        id: Uuid,
        is_active: bool,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;

    /// Atomically take the given seats if, and only if, none of them are
    /// held and capacity allows. Two concurrent requests for overlapping
    /// seats must never both observe `Reserved`. Callers validate the shape
    /// of the request (range, duplicates) beforehand via
    /// [`Schedule::validate_seat_request`].
    async fn reserve_seats(
        &self,
        schedule_id: Uuid,
        seats: &[i32],
    ) -> Result<ReserveOutcome, Box<dyn std::error::Error + Send + Sync>>;

    /// Return seats to the pool. Idempotent: releasing a seat that is not
    /// held is a no-op. Returns the post-update schedule when it exists.
    async fn release_seats(
        &self,
        schedule_id: Uuid,
        seats: &[i32],
    ) -> Result<Option<Schedule>, Box<dyn std::error::Error + Send + Sync>>;
}
