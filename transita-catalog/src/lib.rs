pub mod repository;
pub mod route;
pub mod schedule;

pub use repository::{ReserveOutcome, RouteRepository, ScheduleRepository};
pub use route::Route;
pub use schedule::{Schedule, SeatLedgerError};
