use std::sync::Arc;
use tokio::sync::broadcast;

use transita_booking::orchestrator::BookingOrchestrator;
use transita_booking::repository::{BookingRepository, ManifestRepository};
use transita_catalog::repository::{RouteRepository, ScheduleRepository};
use transita_shared::models::events::BroadcastEnvelope;
use transita_store::app_config::BookingRules;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub schedules: Arc<dyn ScheduleRepository>,
    pub routes: Arc<dyn RouteRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub manifests: Arc<dyn ManifestRepository>,
    pub orchestrator: Arc<BookingOrchestrator>,
    pub realtime: broadcast::Sender<BroadcastEnvelope>,
    pub auth: AuthConfig,
    pub rules: BookingRules,
}
