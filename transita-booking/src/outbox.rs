use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event kinds the side-effect worker knows how to dispatch.
pub mod kind {
    pub const EMAIL_BOOKING_CONFIRMATION: &str = "email.booking_confirmation";
    pub const EMAIL_BOOKING_CANCELLATION: &str = "email.booking_cancellation";
    pub const EMAIL_OPERATOR_BOOKING: &str = "email.operator_booking";
    pub const EMAIL_OPERATOR_CANCELLATION: &str = "email.operator_cancellation";
    pub const BROADCAST_SEATS_UPDATED: &str = "broadcast.seats_updated";
    pub const BROADCAST_BOOKING_CREATED: &str = "broadcast.booking_created";
    pub const BROADCAST_BOOKING_CANCELLED: &str = "broadcast.booking_cancelled";
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboxStatus {
    Pending,
    Dispatched,
    Failed,
}

/// A committed side effect waiting for delivery. The orchestrator enqueues
/// these after the strict booking transaction; the worker drains them with
/// retry, so a flaky SMTP server or an empty SSE channel never rolls back a
/// booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: Uuid,
    pub kind: String,
    pub payload: serde_json::Value,
    pub status: OutboxStatus,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
}

impl OutboxEvent {
    pub fn new(kind: &str, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: kind.to_string(),
            payload,
            status: OutboxStatus::Pending,
            attempts: 0,
            created_at: Utc::now(),
        }
    }
}
