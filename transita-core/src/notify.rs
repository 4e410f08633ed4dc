use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use transita_shared::pii::Contact;

/// Which operator mailbox notice to send alongside the customer email.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperatorNotice {
    NewBooking,
    Cancellation,
}

/// Flat, self-contained view of a booking for notification rendering.
/// Carried as the outbox payload so the delivery worker never has to
/// re-join bookings, schedules and routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingEmail {
    pub booking_reference: String,
    pub recipient_name: String,
    pub recipient_email: Option<Contact>,
    pub route_number: String,
    pub origin: String,
    pub destination: String,
    pub journey_date: NaiveDate,
    pub departure_time: String,
    pub bus_number: String,
    pub seat_numbers: Vec<i32>,
    pub total_price_minor: Option<i32>,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("invalid recipient address: {0}")]
    Address(String),

    #[error("no recipient address on booking {0}")]
    MissingRecipient(String),
}

/// Email delivery seam. Implementations must be safe to retry: the outbox
/// worker re-dispatches failed events.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_booking_confirmation(&self, email: &BookingEmail) -> Result<(), NotifyError>;

    async fn send_booking_cancellation(&self, email: &BookingEmail) -> Result<(), NotifyError>;

    async fn send_operator_notification(
        &self,
        email: &BookingEmail,
        notice: OperatorNotice,
    ) -> Result<(), NotifyError>;
}
