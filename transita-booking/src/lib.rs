pub mod manifest;
pub mod models;
pub mod orchestrator;
pub mod outbox;
pub mod repository;

pub use manifest::{BoardingStatus, ManifestError, ManifestPassenger, ManifestStatus, PassengerManifest};
pub use models::{Booking, BookingStatus, Gender, Passenger, PaymentMethod, PaymentStatus};
pub use orchestrator::{BookingError, BookingOrchestrator, CreateBookingRequest};
pub use outbox::{OutboxEvent, OutboxStatus};
