use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named origin/destination pair operated by the company. Schedules are
/// concrete runs of a route on a date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: Uuid,
    pub route_number: String,
    pub origin: String,
    pub destination: String,
    pub distance_km: Option<f64>,
    /// Per-seat fare in minor currency units.
    pub fare_minor: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Route {
    pub fn new(route_number: String, origin: String, destination: String, fare_minor: i32) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            route_number,
            origin,
            destination,
            distance_km: None,
            fare_minor,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}
