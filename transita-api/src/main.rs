use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transita_api::{app, state::{AppState, AuthConfig}, worker};
use transita_booking::orchestrator::BookingOrchestrator;
use transita_core::notify::Notifier;
use transita_core::payment::SimulatedGateway;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "transita_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = transita_store::app_config::Config::load().expect("Failed to load config");
    tracing::info!("Starting Transita API on port {}", config.server.port);

    // Postgres Connection
    let db = transita_store::DbClient::new(&config.database.url)
        .await
        .expect("Failed to connect to Postgres");

    let schedules = Arc::new(transita_store::PostgresScheduleRepository::new(db.pool.clone()));
    let routes = Arc::new(transita_store::PostgresRouteRepository::new(db.pool.clone()));
    let bookings = Arc::new(transita_store::PostgresBookingRepository::new(db.pool.clone()));
    let manifests = Arc::new(transita_store::PostgresManifestRepository::new(db.pool.clone()));
    let outbox = Arc::new(transita_store::PostgresOutboxRepository::new(db.pool.clone()));

    // Email delivery is optional; without SMTP config the outbox drains
    // through the logging notifier
    let notifier: Arc<dyn Notifier> = match &config.smtp {
        Some(smtp) => Arc::new(
            transita_store::SmtpNotifier::new(smtp, config.booking_rules.operator_email.clone())
                .expect("Failed to build SMTP transport"),
        ),
        None => {
            tracing::warn!("No SMTP configuration found; booking emails disabled");
            Arc::new(transita_store::NoopNotifier)
        }
    };

    // Realtime fan-out channel
    let (realtime_tx, _) = tokio::sync::broadcast::channel(100);
    let hub = Arc::new(transita_api::realtime::SseHub::new(realtime_tx.clone()));

    let orchestrator = Arc::new(BookingOrchestrator::new(
        schedules.clone(),
        routes.clone(),
        bookings.clone(),
        manifests.clone(),
        outbox.clone(),
        Arc::new(SimulatedGateway::new()),
    ));

    // Side-effect delivery worker
    tokio::spawn(worker::start_outbox_worker(
        outbox.clone(),
        notifier,
        hub,
        config.outbox.clone(),
    ));

    let app_state = AppState {
        schedules,
        routes,
        bookings,
        manifests,
        orchestrator,
        realtime: realtime_tx,
        auth: AuthConfig {
            secret: config.auth.jwt_secret.clone(),
            expiration: config.auth.jwt_expiration_seconds,
        },
        rules: config.booking_rules.clone(),
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.expect("Failed to bind");
    axum::serve(listener, app).await.expect("Server error");
}
