pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod email;
pub mod manifest_repo;
pub mod memory;
pub mod outbox_repo;
pub mod route_repo;
pub mod schedule_repo;

pub use booking_repo::PostgresBookingRepository;
pub use database::DbClient;
pub use email::{NoopNotifier, SmtpNotifier};
pub use manifest_repo::PostgresManifestRepository;
pub use memory::InMemoryStore;
pub use outbox_repo::PostgresOutboxRepository;
pub use route_repo::PostgresRouteRepository;
pub use schedule_repo::PostgresScheduleRepository;
