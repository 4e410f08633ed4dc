use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use transita_shared::pii::Contact;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Card,
    Upi,
    NetBanking,
    Wallet,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

/// Per-traveller details captured at booking time. Older bookings carry no
/// passenger list at all, only a seat count.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Passenger {
    pub name: String,
    pub age: i32,
    pub gender: Gender,
}

/// A user's reservation of specific seats on a schedule. Never hard-deleted:
/// cancellation flips the status and releases the seats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub schedule_id: Uuid,
    /// Number of seats reserved. Equals `seat_numbers.len()` for
    /// well-formed bookings; legacy records may disagree.
    pub seats: i32,
    /// Sorted seat numbers, each within the schedule's capacity.
    pub seat_numbers: Vec<i32>,
    pub status: BookingStatus,
    pub booking_reference: String,
    /// Empty for legacy bookings.
    pub passengers: Vec<Passenger>,
    /// Booker's name from the authenticated session; the fallback passenger
    /// name for legacy manifest entries.
    pub contact_name: String,
    pub contact_email: Option<Contact>,
    pub contact_phone: Option<Contact>,
    pub total_price_minor: Option<i32>,
    pub payment_method: Option<PaymentMethod>,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(
        user_id: Uuid,
        schedule_id: Uuid,
        mut seat_numbers: Vec<i32>,
        passengers: Vec<Passenger>,
        contact_name: String,
    ) -> Self {
        seat_numbers.sort_unstable();
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            schedule_id,
            seats: seat_numbers.len() as i32,
            seat_numbers,
            status: BookingStatus::Confirmed,
            booking_reference: generate_booking_reference(),
            passengers,
            contact_name,
            contact_email: None,
            contact_phone: None,
            total_price_minor: None,
            payment_method: None,
            payment_status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Legacy bookings predate the per-passenger detail capture.
    pub fn is_legacy(&self) -> bool {
        self.passengers.is_empty()
    }

    pub fn cancel(&mut self) {
        self.status = BookingStatus::Cancelled;
        self.updated_at = Utc::now();
    }
}

/// Human-facing reference printed on tickets and emails.
fn generate_booking_reference() -> String {
    let timestamp = Utc::now().timestamp();
    let suffix = Uuid::new_v4().simple().to_string()[..6].to_uppercase();
    format!("TRN-{}-{}", timestamp, suffix)
}
