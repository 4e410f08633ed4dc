use transita_shared::models::events::BroadcastEnvelope;

/// Realtime fan-out seam. Best-effort by contract: implementations drop
/// events when nobody is subscribed and never report failure back to the
/// caller.
pub trait Broadcast: Send + Sync {
    fn publish(&self, envelope: BroadcastEnvelope);
}

/// Discards everything. Used where realtime push is not wired up.
pub struct NoopBroadcast;

impl Broadcast for NoopBroadcast {
    fn publish(&self, envelope: BroadcastEnvelope) {
        tracing::debug!("Dropping broadcast for topic {} (no realtime hub)", envelope.topic);
    }
}
