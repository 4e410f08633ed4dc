use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use transita_booking::manifest::{BoardingStatus, PassengerManifest};
use transita_booking::models::{Booking, BookingStatus};
use transita_booking::outbox::{OutboxEvent, OutboxStatus};
use transita_booking::repository::{BookingRepository, ManifestRepository, OutboxRepository};
use transita_catalog::repository::{ReserveOutcome, RouteRepository, ScheduleRepository};
use transita_catalog::route::Route;
use transita_catalog::schedule::{Schedule, SeatLedgerError};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Mutex-backed store implementing every repository trait. Backs local runs
/// without a database and the API integration tests; the per-collection
/// mutex gives it the same reservation serialization the Postgres store
/// gets from its conditional update.
#[derive(Default)]
pub struct InMemoryStore {
    routes: Mutex<HashMap<Uuid, Route>>,
    schedules: Mutex<HashMap<Uuid, Schedule>>,
    bookings: Mutex<HashMap<Uuid, Booking>>,
    manifests: Mutex<HashMap<Uuid, PassengerManifest>>,
    outbox: Mutex<Vec<OutboxEvent>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test/seed hook: number of events currently on the outbox.
    pub fn outbox_len(&self) -> usize {
        self.outbox.lock().unwrap().len()
    }

    pub fn outbox_kinds(&self) -> Vec<String> {
        self.outbox.lock().unwrap().iter().map(|e| e.kind.clone()).collect()
    }
}

#[async_trait]
impl RouteRepository for InMemoryStore {
    async fn create_route(&self, route: &Route) -> Result<(), BoxError> {
        self.routes.lock().unwrap().insert(route.id, route.clone());
        Ok(())
    }

    async fn get_route(&self, id: Uuid) -> Result<Option<Route>, BoxError> {
        Ok(self.routes.lock().unwrap().get(&id).cloned())
    }

    async fn list_routes(&self) -> Result<Vec<Route>, BoxError> {
        let mut routes: Vec<Route> = self.routes.lock().unwrap().values().cloned().collect();
        routes.sort_by(|a, b| a.route_number.cmp(&b.route_number));
        Ok(routes)
    }
}

#[async_trait]
impl ScheduleRepository for InMemoryStore {
    async fn create_schedule(&self, schedule: &Schedule) -> Result<(), BoxError> {
        self.schedules.lock().unwrap().insert(schedule.id, schedule.clone());
        Ok(())
    }

    async fn get_schedule(&self, id: Uuid) -> Result<Option<Schedule>, BoxError> {
        Ok(self.schedules.lock().unwrap().get(&id).cloned())
    }

    async fn list_schedules(&self, active_only: bool) -> Result<Vec<Schedule>, BoxError> {
        let mut schedules: Vec<Schedule> = self
            .schedules
            .lock()
            .unwrap()
            .values()
            .filter(|s| !active_only || s.is_active)
            .cloned()
            .collect();
        schedules.sort_by(|a, b| {
            (a.journey_date, &a.departure_time).cmp(&(b.journey_date, &b.departure_time))
        });
        Ok(schedules)
    }

    async fn set_schedule_active(&self, id: Uuid, is_active: bool) -> Result<bool, BoxError> {
        let mut schedules = self.schedules.lock().unwrap();
        match schedules.get_mut(&id) {
            Some(schedule) => {
                schedule.is_active = is_active;
                schedule.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn reserve_seats(
        &self,
        schedule_id: Uuid,
        seats: &[i32],
    ) -> Result<ReserveOutcome, BoxError> {
        // The lock is held across check and mutation; two reservations
        // cannot interleave
        let mut schedules = self.schedules.lock().unwrap();
        let schedule = match schedules.get_mut(&schedule_id) {
            Some(schedule) => schedule,
            None => return Ok(ReserveOutcome::NotFound),
        };
        if !schedule.is_active {
            return Ok(ReserveOutcome::Inactive);
        }

        match schedule.reserve(seats) {
            Ok(()) => Ok(ReserveOutcome::Reserved(schedule.clone())),
            Err(SeatLedgerError::Conflict(overlap)) => Ok(ReserveOutcome::Conflict(overlap)),
            Err(SeatLedgerError::CapacityExceeded { requested, available }) => {
                Ok(ReserveOutcome::CapacityExceeded { requested, available })
            }
            Err(other) => Err(Box::new(other)),
        }
    }

    async fn release_seats(
        &self,
        schedule_id: Uuid,
        seats: &[i32],
    ) -> Result<Option<Schedule>, BoxError> {
        let mut schedules = self.schedules.lock().unwrap();
        Ok(schedules.get_mut(&schedule_id).map(|schedule| {
            schedule.release(seats);
            schedule.clone()
        }))
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn insert_booking(&self, booking: &Booking) -> Result<(), BoxError> {
        self.bookings.lock().unwrap().insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, BoxError> {
        Ok(self.bookings.lock().unwrap().get(&id).cloned())
    }

    async fn list_user_bookings(&self, user_id: Uuid) -> Result<Vec<Booking>, BoxError> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .lock()
            .unwrap()
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn list_confirmed_for_schedule(
        &self,
        schedule_id: Uuid,
    ) -> Result<Vec<Booking>, BoxError> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .lock()
            .unwrap()
            .values()
            .filter(|b| b.schedule_id == schedule_id && b.status == BookingStatus::Confirmed)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| (b.created_at, b.id));
        Ok(bookings)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Option<Booking>, BoxError> {
        let mut bookings = self.bookings.lock().unwrap();
        Ok(bookings.get_mut(&id).map(|booking| {
            booking.status = status;
            booking.updated_at = Utc::now();
            booking.clone()
        }))
    }
}

#[async_trait]
impl ManifestRepository for InMemoryStore {
    async fn get_manifest(&self, id: Uuid) -> Result<Option<PassengerManifest>, BoxError> {
        Ok(self.manifests.lock().unwrap().values().find(|m| m.id == id).cloned())
    }

    async fn get_manifest_for_schedule(
        &self,
        schedule_id: Uuid,
    ) -> Result<Option<PassengerManifest>, BoxError> {
        Ok(self.manifests.lock().unwrap().get(&schedule_id).cloned())
    }

    async fn list_manifests(&self) -> Result<Vec<PassengerManifest>, BoxError> {
        let mut manifests: Vec<PassengerManifest> =
            self.manifests.lock().unwrap().values().cloned().collect();
        manifests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(manifests)
    }

    async fn save_manifest(&self, manifest: &PassengerManifest) -> Result<(), BoxError> {
        self.manifests.lock().unwrap().insert(manifest.schedule_id, manifest.clone());
        Ok(())
    }

    async fn set_boarding_status(
        &self,
        manifest_id: Uuid,
        entry_id: Uuid,
        status: BoardingStatus,
    ) -> Result<bool, BoxError> {
        let mut manifests = self.manifests.lock().unwrap();
        for manifest in manifests.values_mut() {
            if manifest.id == manifest_id {
                if let Some(entry) = manifest.passengers.iter_mut().find(|p| p.entry_id == entry_id) {
                    entry.boarding_status = status;
                    manifest.updated_at = Utc::now();
                    return Ok(true);
                }
                return Ok(false);
            }
        }
        Ok(false)
    }
}

#[async_trait]
impl OutboxRepository for InMemoryStore {
    async fn enqueue(&self, event: &OutboxEvent) -> Result<(), BoxError> {
        self.outbox.lock().unwrap().push(event.clone());
        Ok(())
    }

    async fn fetch_pending(&self, limit: i64) -> Result<Vec<OutboxEvent>, BoxError> {
        Ok(self
            .outbox
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.status == OutboxStatus::Pending)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_dispatched(&self, id: Uuid) -> Result<(), BoxError> {
        let mut outbox = self.outbox.lock().unwrap();
        if let Some(event) = outbox.iter_mut().find(|e| e.id == id) {
            event.status = OutboxStatus::Dispatched;
        }
        Ok(())
    }

    async fn record_failure(&self, id: Uuid, terminal: bool) -> Result<(), BoxError> {
        let mut outbox = self.outbox.lock().unwrap();
        if let Some(event) = outbox.iter_mut().find(|e| e.id == id) {
            event.attempts += 1;
            if terminal {
                event.status = OutboxStatus::Failed;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn seeded() -> (InMemoryStore, Uuid) {
        let store = InMemoryStore::new();
        let schedule = Schedule::new(
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2030, 6, 15).unwrap(),
            "08:30".to_string(),
            "12:00".to_string(),
            "KA-01-F-7777".to_string(),
            None,
            4,
        );
        let id = schedule.id;
        store.schedules.lock().unwrap().insert(id, schedule);
        (store, id)
    }

    #[tokio::test]
    async fn test_reserve_conflict_leaves_state_untouched() {
        let (store, schedule_id) = seeded();

        let outcome = store.reserve_seats(schedule_id, &[1, 2]).await.unwrap();
        assert!(matches!(outcome, ReserveOutcome::Reserved(_)));

        let outcome = store.reserve_seats(schedule_id, &[2, 3]).await.unwrap();
        assert!(matches!(outcome, ReserveOutcome::Conflict(ref seats) if seats == &vec![2]));

        let schedule = store.get_schedule(schedule_id).await.unwrap().unwrap();
        assert_eq!(schedule.booked_seats, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let (store, schedule_id) = seeded();
        store.reserve_seats(schedule_id, &[1]).await.unwrap();

        store.release_seats(schedule_id, &[1]).await.unwrap();
        let schedule = store.release_seats(schedule_id, &[1]).await.unwrap().unwrap();
        assert!(schedule.booked_seats.is_empty());
        assert_eq!(schedule.available_seats(), 4);
    }

    #[tokio::test]
    async fn test_reserve_on_inactive_schedule() {
        let (store, schedule_id) = seeded();
        store.set_schedule_active(schedule_id, false).await.unwrap();

        let outcome = store.reserve_seats(schedule_id, &[1]).await.unwrap();
        assert!(matches!(outcome, ReserveOutcome::Inactive));
    }

    #[tokio::test]
    async fn test_outbox_retry_bookkeeping() {
        let store = InMemoryStore::new();
        let event = OutboxEvent::new("email.booking_confirmation", serde_json::json!({}));
        store.enqueue(&event).await.unwrap();

        store.record_failure(event.id, false).await.unwrap();
        assert_eq!(store.fetch_pending(10).await.unwrap().len(), 1);

        store.record_failure(event.id, true).await.unwrap();
        assert!(store.fetch_pending(10).await.unwrap().is_empty());
    }
}
