use uuid::Uuid;

/// Seat state of a schedule after a booking or cancellation committed.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct SeatsUpdatedEvent {
    pub schedule_id: Uuid,
    pub booked_seats: Vec<i32>,
    pub available_seats: i32,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingCreatedEvent {
    pub booking_id: Uuid,
    pub booking_reference: String,
    pub schedule_id: Uuid,
    pub user_id: Uuid,
    pub seat_numbers: Vec<i32>,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingCancelledEvent {
    pub booking_id: Uuid,
    pub booking_reference: String,
    pub schedule_id: Uuid,
    pub user_id: Uuid,
    pub released_seats: Vec<i32>,
    pub timestamp: i64,
}

/// Envelope fanned out to realtime subscribers. Subscribers filter on
/// `topic` ("schedule:{id}", "user:{id}" or "admins").
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BroadcastEnvelope {
    pub topic: String,
    pub event: String,
    pub payload: serde_json::Value,
}
