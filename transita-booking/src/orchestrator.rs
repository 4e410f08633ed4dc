use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

use transita_catalog::repository::{ReserveOutcome, RouteRepository, ScheduleRepository};
use transita_catalog::route::Route;
use transita_catalog::schedule::{Schedule, SeatLedgerError};
use transita_core::notify::BookingEmail;
use transita_core::payment::{PaymentAdapter, PaymentError};
use transita_shared::models::events::{
    BookingCancelledEvent, BookingCreatedEvent, BroadcastEnvelope, SeatsUpdatedEvent,
};
use transita_shared::pii::Contact;

use crate::manifest::PassengerManifest;
use crate::models::{Booking, BookingStatus, Passenger, PaymentMethod, PaymentStatus};
use crate::outbox::{kind, OutboxEvent};
use crate::repository::{BookingRepository, ManifestRepository, OutboxRepository};

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Schedule not found: {0}")]
    ScheduleNotFound(Uuid),

    #[error("Schedule {0} is not open for booking")]
    ScheduleUnavailable(Uuid),

    #[error("Please select exactly {expected} seat(s); {got} selected")]
    SeatCountMismatch { expected: i32, got: i32 },

    #[error("Passenger details do not match the seat count: {passengers} passengers for {seats} seats")]
    PassengerCountMismatch { passengers: i32, seats: i32 },

    #[error(transparent)]
    Seats(#[from] SeatLedgerError),

    #[error("Booking not found: {0}")]
    BookingNotFound(Uuid),

    #[error("Booking {0} is already cancelled")]
    AlreadyCancelled(Uuid),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<Box<dyn std::error::Error + Send + Sync>> for BookingError {
    fn from(err: Box<dyn std::error::Error + Send + Sync>) -> Self {
        BookingError::Storage(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateBookingRequest {
    pub user_id: Uuid,
    pub schedule_id: Uuid,
    /// Requested seat count; must match `seat_numbers.len()`.
    pub seats: i32,
    pub seat_numbers: Vec<i32>,
    /// Optional detailed passenger list; empty means a legacy-style booking.
    pub passengers: Vec<Passenger>,
    pub contact_name: String,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub payment_method: Option<PaymentMethod>,
}

/// Seat view built from the ledger's booked set unioned with the seats on
/// confirmed bookings. Drift in either representation shows up here instead
/// of overselling a seat map.
#[derive(Debug, Clone, Serialize)]
pub struct SeatAvailability {
    pub schedule_id: Uuid,
    pub capacity: i32,
    pub available_seats: i32,
    pub booked_seats: Vec<i32>,
}

/// The booking use-case layer. Steps 1-4 of each flow (validation, seat
/// reservation, booking write) are the strict-consistency boundary; the
/// manifest rebuild and the outbox enqueue after it are best-effort and
/// never fail the call.
pub struct BookingOrchestrator {
    schedules: Arc<dyn ScheduleRepository>,
    routes: Arc<dyn RouteRepository>,
    bookings: Arc<dyn BookingRepository>,
    manifests: Arc<dyn ManifestRepository>,
    outbox: Arc<dyn OutboxRepository>,
    payments: Arc<dyn PaymentAdapter>,
}

impl BookingOrchestrator {
    pub fn new(
        schedules: Arc<dyn ScheduleRepository>,
        routes: Arc<dyn RouteRepository>,
        bookings: Arc<dyn BookingRepository>,
        manifests: Arc<dyn ManifestRepository>,
        outbox: Arc<dyn OutboxRepository>,
        payments: Arc<dyn PaymentAdapter>,
    ) -> Self {
        Self { schedules, routes, bookings, manifests, outbox, payments }
    }

    pub async fn create_booking(
        &self,
        request: CreateBookingRequest,
    ) -> Result<Booking, BookingError> {
        // 1. Load and gate the schedule
        let schedule = self
            .schedules
            .get_schedule(request.schedule_id)
            .await?
            .ok_or(BookingError::ScheduleNotFound(request.schedule_id))?;
        if !schedule.is_active {
            return Err(BookingError::ScheduleUnavailable(schedule.id));
        }

        // 2. Validate the selection shape before touching any state
        if request.seat_numbers.len() as i32 != request.seats {
            return Err(BookingError::SeatCountMismatch {
                expected: request.seats,
                got: request.seat_numbers.len() as i32,
            });
        }
        if !request.passengers.is_empty() && request.passengers.len() as i32 != request.seats {
            return Err(BookingError::PassengerCountMismatch {
                passengers: request.passengers.len() as i32,
                seats: request.seats,
            });
        }
        schedule.validate_seat_request(&request.seat_numbers)?;

        // 3. Atomic reservation; the serialization point for concurrent
        // requests on the same schedule
        let reserved = match self
            .schedules
            .reserve_seats(schedule.id, &request.seat_numbers)
            .await?
        {
            ReserveOutcome::Reserved(updated) => updated,
            ReserveOutcome::Conflict(seats) => {
                return Err(SeatLedgerError::Conflict(seats).into());
            }
            ReserveOutcome::CapacityExceeded { requested, available } => {
                return Err(SeatLedgerError::CapacityExceeded { requested, available }.into());
            }
            ReserveOutcome::Inactive => return Err(BookingError::ScheduleUnavailable(schedule.id)),
            ReserveOutcome::NotFound => {
                return Err(BookingError::ScheduleNotFound(request.schedule_id));
            }
        };

        // 4. Price, charge (simulated), persist
        let route = self.routes.get_route(schedule.route_id).await?;
        let mut booking = Booking::new(
            request.user_id,
            request.schedule_id,
            request.seat_numbers.clone(),
            request.passengers.clone(),
            request.contact_name.clone(),
        );
        booking.contact_email = request.contact_email.clone().map(Contact::from);
        booking.contact_phone = request.contact_phone.clone().map(Contact::from);
        booking.total_price_minor = route.as_ref().map(|r| r.fare_minor * request.seats);

        if let Some(method) = request.payment_method {
            let amount = booking.total_price_minor.unwrap_or(0);
            match self.payments.charge(&booking.booking_reference, amount).await {
                Ok(_receipt) => {
                    booking.payment_method = Some(method);
                    booking.payment_status = PaymentStatus::Completed;
                }
                Err(err) => {
                    self.release_reserved(schedule.id, &request.seat_numbers).await;
                    return Err(err.into());
                }
            }
        }

        if let Err(err) = self.bookings.insert_booking(&booking).await {
            // The seats were taken above; give them back before failing
            self.release_reserved(schedule.id, &request.seat_numbers).await;
            return Err(BookingError::Storage(err.to_string()));
        }

        // 5. Rebuild the manifest; a failure here never unwinds the booking
        self.refresh_manifest(schedule.id).await;

        // 6. Commit side effects to the outbox for the delivery worker
        self.enqueue_booking_created(&booking, &reserved, route.as_ref()).await;

        Ok(booking)
    }

    pub async fn cancel_booking(&self, booking_id: Uuid) -> Result<Booking, BookingError> {
        // 1. Load and gate
        let booking = self
            .bookings
            .get_booking(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound(booking_id))?;
        if booking.status == BookingStatus::Cancelled {
            return Err(BookingError::AlreadyCancelled(booking_id));
        }

        // 2. Flip the status
        let cancelled = self
            .bookings
            .update_status(booking_id, BookingStatus::Cancelled)
            .await?
            .ok_or(BookingError::BookingNotFound(booking_id))?;

        // 3. Return the seats to the ledger
        let released = self
            .schedules
            .release_seats(booking.schedule_id, &booking.seat_numbers)
            .await?;

        // 4. Rebuild the manifest, best-effort
        self.refresh_manifest(booking.schedule_id).await;

        // 5. Side effects
        if let Some(schedule) = released.as_ref() {
            let route = match self.routes.get_route(schedule.route_id).await {
                Ok(route) => route,
                Err(err) => {
                    warn!("Route lookup failed while queueing cancellation notices: {}", err);
                    None
                }
            };
            self.enqueue_booking_cancelled(&cancelled, schedule, route.as_ref()).await;
        }

        Ok(cancelled)
    }

    /// Rebuild and persist the manifest for a schedule from its confirmed
    /// bookings. The admin manifest endpoints call this directly; the
    /// booking flows call it through [`Self::refresh_manifest`].
    pub async fn regenerate_manifest(
        &self,
        schedule_id: Uuid,
    ) -> Result<PassengerManifest, BookingError> {
        let bookings = self.bookings.list_confirmed_for_schedule(schedule_id).await?;
        let previous = self.manifests.get_manifest_for_schedule(schedule_id).await?;
        let manifest = PassengerManifest::regenerate(schedule_id, &bookings, previous.as_ref());
        self.manifests.save_manifest(&manifest).await?;
        Ok(manifest)
    }

    /// Seat map for a schedule, cross-checked against confirmed bookings.
    pub async fn seat_availability(
        &self,
        schedule_id: Uuid,
    ) -> Result<SeatAvailability, BookingError> {
        let schedule = self
            .schedules
            .get_schedule(schedule_id)
            .await?
            .ok_or(BookingError::ScheduleNotFound(schedule_id))?;
        let confirmed = self.bookings.list_confirmed_for_schedule(schedule_id).await?;

        let mut booked: BTreeSet<i32> = schedule.booked_seats.iter().copied().collect();
        for booking in &confirmed {
            booked.extend(booking.seat_numbers.iter().copied());
        }

        Ok(SeatAvailability {
            schedule_id,
            capacity: schedule.capacity,
            available_seats: schedule.capacity - booked.len() as i32,
            booked_seats: booked.into_iter().collect(),
        })
    }

    async fn refresh_manifest(&self, schedule_id: Uuid) {
        if let Err(err) = self.regenerate_manifest(schedule_id).await {
            error!("Error updating passenger manifest for schedule {}: {}", schedule_id, err);
        }
    }

    async fn release_reserved(&self, schedule_id: Uuid, seats: &[i32]) {
        if let Err(err) = self.schedules.release_seats(schedule_id, seats).await {
            error!(
                "Failed to release seats {:?} on schedule {} after aborted booking: {}",
                seats, schedule_id, err
            );
        }
    }

    async fn enqueue_booking_created(&self, booking: &Booking, schedule: &Schedule, route: Option<&Route>) {
        let now = Utc::now().timestamp();

        self.enqueue_broadcast(
            kind::BROADCAST_SEATS_UPDATED,
            format!("schedule:{}", schedule.id),
            "seatsUpdated",
            &SeatsUpdatedEvent {
                schedule_id: schedule.id,
                booked_seats: schedule.booked_seats.clone(),
                available_seats: schedule.available_seats(),
                timestamp: now,
            },
        )
        .await;

        let created = BookingCreatedEvent {
            booking_id: booking.id,
            booking_reference: booking.booking_reference.clone(),
            schedule_id: schedule.id,
            user_id: booking.user_id,
            seat_numbers: booking.seat_numbers.clone(),
            timestamp: now,
        };
        self.enqueue_broadcast(kind::BROADCAST_BOOKING_CREATED, "admins".to_string(), "bookingCreated", &created)
            .await;
        self.enqueue_broadcast(
            kind::BROADCAST_BOOKING_CREATED,
            format!("user:{}", booking.user_id),
            "bookingCreated",
            &created,
        )
        .await;

        if let Some(route) = route {
            let email = Self::email_view(booking, schedule, route);
            if booking.contact_email.is_some() {
                self.enqueue_email(kind::EMAIL_BOOKING_CONFIRMATION, &email).await;
            }
            self.enqueue_email(kind::EMAIL_OPERATOR_BOOKING, &email).await;
        }
    }

    async fn enqueue_booking_cancelled(&self, booking: &Booking, schedule: &Schedule, route: Option<&Route>) {
        let now = Utc::now().timestamp();

        self.enqueue_broadcast(
            kind::BROADCAST_SEATS_UPDATED,
            format!("schedule:{}", schedule.id),
            "seatsUpdated",
            &SeatsUpdatedEvent {
                schedule_id: schedule.id,
                booked_seats: schedule.booked_seats.clone(),
                available_seats: schedule.available_seats(),
                timestamp: now,
            },
        )
        .await;

        let cancelled = BookingCancelledEvent {
            booking_id: booking.id,
            booking_reference: booking.booking_reference.clone(),
            schedule_id: schedule.id,
            user_id: booking.user_id,
            released_seats: booking.seat_numbers.clone(),
            timestamp: now,
        };
        self.enqueue_broadcast(kind::BROADCAST_BOOKING_CANCELLED, "admins".to_string(), "bookingCancelled", &cancelled)
            .await;
        self.enqueue_broadcast(
            kind::BROADCAST_BOOKING_CANCELLED,
            format!("user:{}", booking.user_id),
            "bookingCancelled",
            &cancelled,
        )
        .await;

        if let Some(route) = route {
            let email = Self::email_view(booking, schedule, route);
            if booking.contact_email.is_some() {
                self.enqueue_email(kind::EMAIL_BOOKING_CANCELLATION, &email).await;
            }
            self.enqueue_email(kind::EMAIL_OPERATOR_CANCELLATION, &email).await;
        }
    }

    fn email_view(booking: &Booking, schedule: &Schedule, route: &Route) -> BookingEmail {
        BookingEmail {
            booking_reference: booking.booking_reference.clone(),
            recipient_name: booking.contact_name.clone(),
            recipient_email: booking.contact_email.clone(),
            route_number: route.route_number.clone(),
            origin: route.origin.clone(),
            destination: route.destination.clone(),
            journey_date: schedule.journey_date,
            departure_time: schedule.departure_time.clone(),
            bus_number: schedule.bus_number.clone(),
            seat_numbers: booking.seat_numbers.clone(),
            total_price_minor: booking.total_price_minor,
        }
    }

    async fn enqueue_broadcast<T: Serialize>(&self, event_kind: &str, topic: String, event: &str, payload: &T) {
        let payload = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(err) => {
                warn!("Skipping {} broadcast, payload failed to serialize: {}", event, err);
                return;
            }
        };
        let envelope = BroadcastEnvelope { topic, event: event.to_string(), payload };
        match serde_json::to_value(&envelope) {
            Ok(value) => self.enqueue_event(OutboxEvent::new(event_kind, value)).await,
            Err(err) => warn!("Skipping {} broadcast, envelope failed to serialize: {}", event, err),
        }
    }

    async fn enqueue_email(&self, event_kind: &str, email: &BookingEmail) {
        match serde_json::to_value(email) {
            Ok(value) => self.enqueue_event(OutboxEvent::new(event_kind, value)).await,
            Err(err) => warn!("Skipping {} email, payload failed to serialize: {}", event_kind, err),
        }
    }

    async fn enqueue_event(&self, event: OutboxEvent) {
        // Runs after the strict transaction committed: a failure here
        // degrades to a missing notification, never a missing booking.
        if let Err(err) = self.outbox.enqueue(&event).await {
            warn!("Failed to enqueue outbox event {}: {}", event.kind, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::BoardingStatus;
    use crate::outbox::OutboxStatus;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use transita_core::payment::SimulatedGateway;

    type BoxError = Box<dyn std::error::Error + Send + Sync>;

    /// Hand-rolled in-memory store shared by every repository trait; a
    /// single mutex-per-collection stand-in for the Postgres store.
    #[derive(Default)]
    struct InMem {
        schedules: Mutex<HashMap<Uuid, Schedule>>,
        routes: Mutex<HashMap<Uuid, Route>>,
        bookings: Mutex<HashMap<Uuid, Booking>>,
        manifests: Mutex<HashMap<Uuid, PassengerManifest>>,
        outbox: Mutex<Vec<OutboxEvent>>,
        fail_manifest_saves: AtomicBool,
    }

    #[async_trait]
    impl ScheduleRepository for InMem {
        async fn create_schedule(&self, schedule: &Schedule) -> Result<(), BoxError> {
            self.schedules.lock().unwrap().insert(schedule.id, schedule.clone());
            Ok(())
        }

        async fn get_schedule(&self, id: Uuid) -> Result<Option<Schedule>, BoxError> {
            Ok(self.schedules.lock().unwrap().get(&id).cloned())
        }

        async fn list_schedules(&self, active_only: bool) -> Result<Vec<Schedule>, BoxError> {
            Ok(self
                .schedules
                .lock()
                .unwrap()
                .values()
                .filter(|s| !active_only || s.is_active)
                .cloned()
                .collect())
        }

        async fn set_schedule_active(&self, id: Uuid, is_active: bool) -> Result<bool, BoxError> {
            let mut schedules = self.schedules.lock().unwrap();
            match schedules.get_mut(&id) {
                Some(s) => {
                    s.is_active = is_active;
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
            let mut schedules = self.schedules.lock().unwrap();
            let schedule = match schedules.get_mut(&schedule_id) {
                Some(s) => s,
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
            Ok(schedules.get_mut(&schedule_id).map(|s| {
                s.release(seats);
                s.clone()
            }))
        }
    }

    #[async_trait]
    impl RouteRepository for InMem {
        async fn create_route(&self, route: &Route) -> Result<(), BoxError> {
            self.routes.lock().unwrap().insert(route.id, route.clone());
            Ok(())
        }

        async fn get_route(&self, id: Uuid) -> Result<Option<Route>, BoxError> {
            Ok(self.routes.lock().unwrap().get(&id).cloned())
        }

        async fn list_routes(&self) -> Result<Vec<Route>, BoxError> {
            Ok(self.routes.lock().unwrap().values().cloned().collect())
        }
    }

    #[async_trait]
    impl BookingRepository for InMem {
        async fn insert_booking(&self, booking: &Booking) -> Result<(), BoxError> {
            self.bookings.lock().unwrap().insert(booking.id, booking.clone());
            Ok(())
        }

        async fn get_booking(&self, id: Uuid) -> Result<Option<Booking>, BoxError> {
            Ok(self.bookings.lock().unwrap().get(&id).cloned())
        }

        async fn list_user_bookings(&self, user_id: Uuid) -> Result<Vec<Booking>, BoxError> {
            Ok(self
                .bookings
                .lock()
                .unwrap()
                .values()
                .filter(|b| b.user_id == user_id)
                .cloned()
                .collect())
        }

        async fn list_confirmed_for_schedule(
            &self,
            schedule_id: Uuid,
        ) -> Result<Vec<Booking>, BoxError> {
            Ok(self
                .bookings
                .lock()
                .unwrap()
                .values()
                .filter(|b| b.schedule_id == schedule_id && b.status == BookingStatus::Confirmed)
                .cloned()
                .collect())
        }

        async fn update_status(
            &self,
            id: Uuid,
            status: BookingStatus,
        ) -> Result<Option<Booking>, BoxError> {
            let mut bookings = self.bookings.lock().unwrap();
            Ok(bookings.get_mut(&id).map(|b| {
                b.status = status.clone();
                b.updated_at = Utc::now();
                b.clone()
            }))
        }
    }

    #[async_trait]
    impl crate::repository::ManifestRepository for InMem {
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
            Ok(self.manifests.lock().unwrap().values().cloned().collect())
        }

        async fn save_manifest(&self, manifest: &PassengerManifest) -> Result<(), BoxError> {
            if self.fail_manifest_saves.load(Ordering::SeqCst) {
                return Err("manifest store unavailable".into());
            }
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
                    if let Some(entry) =
                        manifest.passengers.iter_mut().find(|p| p.entry_id == entry_id)
                    {
                        entry.boarding_status = status;
                        return Ok(true);
                    }
                    return Ok(false);
                }
            }
            Ok(false)
        }
    }

    #[async_trait]
    impl OutboxRepository for InMem {
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

    struct Fixture {
        store: Arc<InMem>,
        orchestrator: BookingOrchestrator,
        schedule_id: Uuid,
    }

    fn fixture(capacity: i32) -> Fixture {
        fixture_with_gateway(capacity, SimulatedGateway::new())
    }

    fn fixture_with_gateway(capacity: i32, gateway: SimulatedGateway) -> Fixture {
        let store = Arc::new(InMem::default());

        let route = Route::new("R42".to_string(), "Mysuru".to_string(), "Bengaluru".to_string(), 45000);
        let schedule = Schedule::new(
            route.id,
            NaiveDate::from_ymd_opt(2030, 6, 15).unwrap(),
            "08:30".to_string(),
            "12:00".to_string(),
            "KA-01-F-7777".to_string(),
            None,
            capacity,
        );
        let schedule_id = schedule.id;
        store.routes.lock().unwrap().insert(route.id, route);
        store.schedules.lock().unwrap().insert(schedule.id, schedule);

        let orchestrator = BookingOrchestrator::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(gateway),
        );

        Fixture { store, orchestrator, schedule_id }
    }

    fn request(fx: &Fixture, user_id: Uuid, seats: Vec<i32>) -> CreateBookingRequest {
        CreateBookingRequest {
            user_id,
            schedule_id: fx.schedule_id,
            seats: seats.len() as i32,
            seat_numbers: seats,
            passengers: vec![],
            contact_name: "Asha Rao".to_string(),
            contact_email: Some("asha@example.com".to_string()),
            contact_phone: None,
            payment_method: None,
        }
    }

    #[tokio::test]
    async fn test_booking_scenario_end_to_end() {
        let fx = fixture(2);
        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();

        // Book seat 1 for user A
        let booking_a = fx.orchestrator.create_booking(request(&fx, user_a, vec![1])).await.unwrap();
        let avail = fx.orchestrator.seat_availability(fx.schedule_id).await.unwrap();
        assert_eq!(avail.available_seats, 1);
        assert_eq!(avail.booked_seats, vec![1]);

        // Seat 1 again for user B must conflict without changing state
        let err = fx.orchestrator.create_booking(request(&fx, user_b, vec![1])).await.unwrap_err();
        assert!(matches!(err, BookingError::Seats(SeatLedgerError::Conflict(ref s)) if s == &vec![1]));
        let avail = fx.orchestrator.seat_availability(fx.schedule_id).await.unwrap();
        assert_eq!(avail.available_seats, 1);

        // Seat 2 for user B fills the bus
        fx.orchestrator.create_booking(request(&fx, user_b, vec![2])).await.unwrap();
        let avail = fx.orchestrator.seat_availability(fx.schedule_id).await.unwrap();
        assert_eq!(avail.available_seats, 0);
        assert_eq!(avail.booked_seats, vec![1, 2]);

        // Cancel A's booking; its seat comes back
        fx.orchestrator.cancel_booking(booking_a.id).await.unwrap();
        let avail = fx.orchestrator.seat_availability(fx.schedule_id).await.unwrap();
        assert_eq!(avail.available_seats, 1);
        assert_eq!(avail.booked_seats, vec![2]);

        // Manifest reflects only B's booking
        let manifest = fx.orchestrator.regenerate_manifest(fx.schedule_id).await.unwrap();
        assert_eq!(manifest.total_passengers, 1);
        assert_eq!(manifest.total_seats_booked, 1);
    }

    #[tokio::test]
    async fn test_confirmed_seat_sets_stay_disjoint() {
        let fx = fixture(40);
        for i in 0..5 {
            let seats: Vec<i32> = vec![i * 2 + 1, i * 2 + 2];
            fx.orchestrator.create_booking(request(&fx, Uuid::new_v4(), seats)).await.unwrap();
        }

        let bookings = fx.store.bookings.lock().unwrap();
        let mut seen = std::collections::HashSet::new();
        for booking in bookings.values().filter(|b| b.status == BookingStatus::Confirmed) {
            for seat in &booking.seat_numbers {
                assert!(seen.insert(*seat), "seat {} booked twice", seat);
            }
        }
        assert_eq!(seen.len(), 10);
    }

    #[tokio::test]
    async fn test_cancel_then_rebook_same_seats() {
        let fx = fixture(4);
        let booking = fx.orchestrator.create_booking(request(&fx, Uuid::new_v4(), vec![3, 4])).await.unwrap();
        fx.orchestrator.cancel_booking(booking.id).await.unwrap();

        // Seats are released, not burned
        let rebooked = fx.orchestrator.create_booking(request(&fx, Uuid::new_v4(), vec![3, 4])).await.unwrap();
        assert_eq!(rebooked.seat_numbers, vec![3, 4]);
    }

    #[tokio::test]
    async fn test_cancel_twice_reports_already_cancelled() {
        let fx = fixture(4);
        let booking = fx.orchestrator.create_booking(request(&fx, Uuid::new_v4(), vec![1])).await.unwrap();
        fx.orchestrator.cancel_booking(booking.id).await.unwrap();

        let err = fx.orchestrator.cancel_booking(booking.id).await.unwrap_err();
        assert!(matches!(err, BookingError::AlreadyCancelled(id) if id == booking.id));
    }

    #[tokio::test]
    async fn test_validation_errors_precede_any_mutation() {
        let fx = fixture(4);

        let mut bad_count = request(&fx, Uuid::new_v4(), vec![1, 2]);
        bad_count.seats = 3;
        let err = fx.orchestrator.create_booking(bad_count).await.unwrap_err();
        assert!(matches!(err, BookingError::SeatCountMismatch { expected: 3, got: 2 }));

        let mut bad_passengers = request(&fx, Uuid::new_v4(), vec![1, 2]);
        bad_passengers.passengers = vec![Passenger {
            name: "Asha".to_string(),
            age: 30,
            gender: crate::models::Gender::Female,
        }];
        let err = fx.orchestrator.create_booking(bad_passengers).await.unwrap_err();
        assert!(matches!(err, BookingError::PassengerCountMismatch { passengers: 1, seats: 2 }));

        let err = fx.orchestrator.create_booking(request(&fx, Uuid::new_v4(), vec![99])).await.unwrap_err();
        assert!(matches!(err, BookingError::Seats(SeatLedgerError::InvalidSeat { .. })));

        // Nothing was written anywhere
        assert!(fx.store.bookings.lock().unwrap().is_empty());
        let avail = fx.orchestrator.seat_availability(fx.schedule_id).await.unwrap();
        assert_eq!(avail.available_seats, 4);
    }

    #[tokio::test]
    async fn test_manifest_failure_does_not_unwind_booking() {
        let fx = fixture(4);
        fx.store.fail_manifest_saves.store(true, Ordering::SeqCst);

        let booking = fx.orchestrator.create_booking(request(&fx, Uuid::new_v4(), vec![1])).await.unwrap();

        assert!(fx.store.bookings.lock().unwrap().contains_key(&booking.id));
        assert!(fx.store.manifests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_outbox_receives_side_effects() {
        let fx = fixture(4);
        let booking = fx.orchestrator.create_booking(request(&fx, Uuid::new_v4(), vec![1])).await.unwrap();

        {
            let outbox = fx.store.outbox.lock().unwrap();
            let kinds: Vec<&str> = outbox.iter().map(|e| e.kind.as_str()).collect();
            assert!(kinds.contains(&kind::BROADCAST_SEATS_UPDATED));
            assert!(kinds.contains(&kind::BROADCAST_BOOKING_CREATED));
            assert!(kinds.contains(&kind::EMAIL_BOOKING_CONFIRMATION));
            assert!(kinds.contains(&kind::EMAIL_OPERATOR_BOOKING));
            assert!(outbox.iter().all(|e| e.status == OutboxStatus::Pending));
        }

        fx.orchestrator.cancel_booking(booking.id).await.unwrap();
        let outbox = fx.store.outbox.lock().unwrap();
        let kinds: Vec<&str> = outbox.iter().map(|e| e.kind.as_str()).collect();
        assert!(kinds.contains(&kind::BROADCAST_BOOKING_CANCELLED));
        assert!(kinds.contains(&kind::EMAIL_BOOKING_CANCELLATION));
        assert!(kinds.contains(&kind::EMAIL_OPERATOR_CANCELLATION));
    }

    #[tokio::test]
    async fn test_booking_is_priced_from_the_route_fare() {
        let fx = fixture(4);
        let booking = fx.orchestrator.create_booking(request(&fx, Uuid::new_v4(), vec![1, 2])).await.unwrap();
        assert_eq!(booking.total_price_minor, Some(90000));
    }

    #[tokio::test]
    async fn test_payment_decline_releases_the_seats() {
        let fx = fixture_with_gateway(4, SimulatedGateway::failing());

        let mut req = request(&fx, Uuid::new_v4(), vec![1, 2]);
        req.payment_method = Some(PaymentMethod::Card);
        let err = fx.orchestrator.create_booking(req).await.unwrap_err();

        assert!(matches!(err, BookingError::Payment(PaymentError::Rejected(_))));
        assert!(fx.store.bookings.lock().unwrap().is_empty());
        let avail = fx.orchestrator.seat_availability(fx.schedule_id).await.unwrap();
        assert_eq!(avail.available_seats, 4);
    }

    #[tokio::test]
    async fn test_inactive_schedule_rejects_bookings() {
        let fx = fixture(4);
        fx.store.set_schedule_active(fx.schedule_id, false).await.unwrap();

        let err = fx.orchestrator.create_booking(request(&fx, Uuid::new_v4(), vec![1])).await.unwrap_err();
        assert!(matches!(err, BookingError::ScheduleUnavailable(_)));
    }

    #[tokio::test]
    async fn test_availability_unions_ledger_and_bookings() {
        let fx = fixture(10);
        fx.orchestrator.create_booking(request(&fx, Uuid::new_v4(), vec![1, 2])).await.unwrap();

        // Simulate ledger drift: a confirmed booking whose seats never made
        // it into the booked set
        let mut stray = Booking::new(Uuid::new_v4(), fx.schedule_id, vec![7], vec![], "Ghost".to_string());
        stray.status = BookingStatus::Confirmed;
        fx.store.bookings.lock().unwrap().insert(stray.id, stray);

        let avail = fx.orchestrator.seat_availability(fx.schedule_id).await.unwrap();
        assert_eq!(avail.booked_seats, vec![1, 2, 7]);
        assert_eq!(avail.available_seats, 7);
    }
}
