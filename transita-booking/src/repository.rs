use async_trait::async_trait;
use uuid::Uuid;

use crate::manifest::{BoardingStatus, PassengerManifest};
use crate::models::{Booking, BookingStatus};
use crate::outbox::OutboxEvent;

/// Data access for bookings. Bookings are append-then-update records;
/// nothing here deletes.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn insert_booking(
        &self,
        booking: &Booking,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    async fn get_booking(
        &self,
        id: Uuid,
    ) -> Result<Option<Booking>, Box<dyn std::error::Error + Send + Sync>>;

    async fn list_user_bookings(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<Booking>, Box<dyn std::error::Error + Send + Sync>>;

    /// Confirmed bookings only; the manifest generator's scan.
    async fn list_confirmed_for_schedule(
        &self,
        schedule_id: Uuid,
    ) -> Result<Vec<Booking>, Box<dyn std::error::Error + Send + Sync>>;

    async fn update_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Option<Booking>, Box<dyn std::error::Error + Send + Sync>>;
}

/// Data access for passenger manifests, one per schedule.
#[async_trait]
pub trait ManifestRepository: Send + Sync {
    async fn get_manifest(
        &self,
        id: Uuid,
    ) -> Result<Option<PassengerManifest>, Box<dyn std::error::Error + Send + Sync>>;

    async fn get_manifest_for_schedule(
        &self,
        schedule_id: Uuid,
    ) -> Result<Option<PassengerManifest>, Box<dyn std::error::Error + Send + Sync>>;

    async fn list_manifests(
        &self,
    ) -> Result<Vec<PassengerManifest>, Box<dyn std::error::Error + Send + Sync>>;

    /// Insert or fully replace the manifest for its schedule.
    async fn save_manifest(
        &self,
        manifest: &PassengerManifest,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Targeted write of one entry's boarding status, leaving the rest of
    /// the roster untouched. Returns false when the manifest or entry is
    /// gone.
    async fn set_boarding_status(
        &self,
        manifest_id: Uuid,
        entry_id: Uuid,
        status: BoardingStatus,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;
}

/// Persistence for committed side effects awaiting delivery.
#[async_trait]
pub trait OutboxRepository: Send + Sync {
    async fn enqueue(
        &self,
        event: &OutboxEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Oldest pending events first.
    async fn fetch_pending(
        &self,
        limit: i64,
    ) -> Result<Vec<OutboxEvent>, Box<dyn std::error::Error + Send + Sync>>;

    async fn mark_dispatched(
        &self,
        id: Uuid,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Bump the attempt counter; `terminal` parks the event as failed so
    /// the worker stops retrying it.
    async fn record_failure(
        &self,
        id: Uuid,
        terminal: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
