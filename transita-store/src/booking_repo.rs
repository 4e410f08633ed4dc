use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use transita_booking::models::{Booking, BookingStatus, PaymentMethod, PaymentStatus};
use transita_booking::repository::BookingRepository;
use transita_shared::pii::Contact;

pub struct PostgresBookingRepository {
    pool: PgPool,
}

impl PostgresBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    user_id: Uuid,
    schedule_id: Uuid,
    seats: i32,
    seat_numbers: Vec<i32>,
    status: String,
    booking_reference: String,
    passengers: serde_json::Value,
    contact_name: String,
    contact_email: Option<String>,
    contact_phone: Option<String>,
    total_price_minor: Option<i32>,
    payment_method: Option<String>,
    payment_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Booking {
            id: row.id,
            user_id: row.user_id,
            schedule_id: row.schedule_id,
            seats: row.seats,
            seat_numbers: row.seat_numbers,
            status: parse_status(&row.status),
            booking_reference: row.booking_reference,
            // Tolerate malformed legacy rows: an unreadable passenger list
            // degrades to a legacy-format booking
            passengers: serde_json::from_value(row.passengers).unwrap_or_default(),
            contact_name: row.contact_name,
            contact_email: row.contact_email.map(Contact::from),
            contact_phone: row.contact_phone.map(Contact::from),
            total_price_minor: row.total_price_minor,
            payment_method: row.payment_method.as_deref().and_then(parse_payment_method),
            payment_status: parse_payment_status(&row.payment_status),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn parse_status(s: &str) -> BookingStatus {
    match s {
        "CANCELLED" => BookingStatus::Cancelled,
        _ => BookingStatus::Confirmed,
    }
}

fn status_to_str(status: &BookingStatus) -> &'static str {
    match status {
        BookingStatus::Confirmed => "CONFIRMED",
        BookingStatus::Cancelled => "CANCELLED",
    }
}

fn parse_payment_method(s: &str) -> Option<PaymentMethod> {
    match s {
        "CARD" => Some(PaymentMethod::Card),
        "UPI" => Some(PaymentMethod::Upi),
        "NET_BANKING" => Some(PaymentMethod::NetBanking),
        "WALLET" => Some(PaymentMethod::Wallet),
        _ => None,
    }
}

fn payment_method_to_str(method: PaymentMethod) -> &'static str {
    match method {
        PaymentMethod::Card => "CARD",
        PaymentMethod::Upi => "UPI",
        PaymentMethod::NetBanking => "NET_BANKING",
        PaymentMethod::Wallet => "WALLET",
    }
}

fn parse_payment_status(s: &str) -> PaymentStatus {
    match s {
        "COMPLETED" => PaymentStatus::Completed,
        "FAILED" => PaymentStatus::Failed,
        _ => PaymentStatus::Pending,
    }
}

fn payment_status_to_str(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Pending => "PENDING",
        PaymentStatus::Completed => "COMPLETED",
        PaymentStatus::Failed => "FAILED",
    }
}

const BOOKING_COLUMNS: &str = "id, user_id, schedule_id, seats, seat_numbers, status, booking_reference, passengers, contact_name, contact_email, contact_phone, total_price_minor, payment_method, payment_status, created_at, updated_at";

#[async_trait]
impl BookingRepository for PostgresBookingRepository {
    async fn insert_booking(
        &self,
        booking: &Booking,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let passengers = serde_json::to_value(&booking.passengers)?;

        sqlx::query(
            r#"
            INSERT INTO bookings (id, user_id, schedule_id, seats, seat_numbers, status, booking_reference, passengers, contact_name, contact_email, contact_phone, total_price_minor, payment_method, payment_status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(booking.id)
        .bind(booking.user_id)
        .bind(booking.schedule_id)
        .bind(booking.seats)
        .bind(&booking.seat_numbers)
        .bind(status_to_str(&booking.status))
        .bind(&booking.booking_reference)
        .bind(passengers)
        .bind(&booking.contact_name)
        .bind(booking.contact_email.as_ref().map(|c| c.as_str().to_string()))
        .bind(booking.contact_phone.as_ref().map(|c| c.as_str().to_string()))
        .bind(booking.total_price_minor)
        .bind(booking.payment_method.map(payment_method_to_str))
        .bind(payment_status_to_str(booking.payment_status))
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_booking(
        &self,
        id: Uuid,
    ) -> Result<Option<Booking>, Box<dyn std::error::Error + Send + Sync>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Booking::from))
    }

    async fn list_user_bookings(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Booking>, Box<dyn std::error::Error + Send + Sync>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE user_id = $1 ORDER BY created_at DESC",
            BOOKING_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Booking::from).collect())
    }

    async fn list_confirmed_for_schedule(
        &self,
        schedule_id: Uuid,
    ) -> Result<Vec<Booking>, Box<dyn std::error::Error + Send + Sync>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE schedule_id = $1 AND status = 'CONFIRMED' ORDER BY created_at",
            BOOKING_COLUMNS
        ))
        .bind(schedule_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Booking::from).collect())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Option<Booking>, Box<dyn std::error::Error + Send + Sync>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "UPDATE bookings SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .bind(status_to_str(&status))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Booking::from))
    }
}
