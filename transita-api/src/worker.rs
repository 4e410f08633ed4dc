use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use transita_booking::outbox::{kind, OutboxEvent};
use transita_booking::repository::OutboxRepository;
use transita_core::broadcast::Broadcast;
use transita_core::notify::{BookingEmail, Notifier, OperatorNotice};
use transita_shared::models::events::BroadcastEnvelope;
use transita_store::app_config::OutboxConfig;

/// Drains the side-effect outbox: emails to the notifier, envelopes to the
/// realtime hub. Each event fails independently and is retried until the
/// attempt cap parks it as failed.
pub async fn start_outbox_worker(
    outbox: Arc<dyn OutboxRepository>,
    notifier: Arc<dyn Notifier>,
    realtime: Arc<dyn Broadcast>,
    config: OutboxConfig,
) {
    info!(
        "Outbox worker started (poll every {}s, {} attempts max)",
        config.poll_interval_seconds, config.max_attempts
    );

    loop {
        drain_pending(&outbox, &notifier, &realtime, &config).await;
        sleep(Duration::from_secs(config.poll_interval_seconds)).await;
    }
}

/// One polling pass. Returns the number of events dispatched; extracted
/// from the loop so tests can drive it directly.
pub async fn drain_pending(
    outbox: &Arc<dyn OutboxRepository>,
    notifier: &Arc<dyn Notifier>,
    realtime: &Arc<dyn Broadcast>,
    config: &OutboxConfig,
) -> usize {
    let events = match outbox.fetch_pending(config.batch_size).await {
        Ok(events) => events,
        Err(err) => {
            error!("Failed to fetch pending outbox events: {}", err);
            return 0;
        }
    };

    let mut dispatched = 0;
    for event in events {
        match dispatch_event(&event, notifier, realtime).await {
            Ok(()) => {
                if let Err(err) = outbox.mark_dispatched(event.id).await {
                    warn!("Dispatched {} but failed to mark it: {}", event.id, err);
                } else {
                    dispatched += 1;
                }
            }
            Err(err) => {
                let terminal = event.attempts + 1 >= config.max_attempts;
                warn!(
                    "Dispatch of {} ({}) failed on attempt {}: {}{}",
                    event.id,
                    event.kind,
                    event.attempts + 1,
                    err,
                    if terminal { "; giving up" } else { "" }
                );
                if let Err(err) = outbox.record_failure(event.id, terminal).await {
                    warn!("Failed to record outbox failure for {}: {}", event.id, err);
                }
            }
        }
    }
    dispatched
}

async fn dispatch_event(
    event: &OutboxEvent,
    notifier: &Arc<dyn Notifier>,
    realtime: &Arc<dyn Broadcast>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    match event.kind.as_str() {
        kind::EMAIL_BOOKING_CONFIRMATION => {
            let email: BookingEmail = serde_json::from_value(event.payload.clone())?;
            notifier.send_booking_confirmation(&email).await?;
        }
        kind::EMAIL_BOOKING_CANCELLATION => {
            let email: BookingEmail = serde_json::from_value(event.payload.clone())?;
            notifier.send_booking_cancellation(&email).await?;
        }
        kind::EMAIL_OPERATOR_BOOKING => {
            let email: BookingEmail = serde_json::from_value(event.payload.clone())?;
            notifier.send_operator_notification(&email, OperatorNotice::NewBooking).await?;
        }
        kind::EMAIL_OPERATOR_CANCELLATION => {
            let email: BookingEmail = serde_json::from_value(event.payload.clone())?;
            notifier.send_operator_notification(&email, OperatorNotice::Cancellation).await?;
        }
        kind::BROADCAST_SEATS_UPDATED
        | kind::BROADCAST_BOOKING_CREATED
        | kind::BROADCAST_BOOKING_CANCELLED => {
            let envelope: BroadcastEnvelope = serde_json::from_value(event.payload.clone())?;
            realtime.publish(envelope);
        }
        other => {
            // Unknown kinds are dispatched as no-ops rather than poisoning
            // the queue forever
            warn!("Unknown outbox event kind: {}", other);
        }
    }
    Ok(())
}
