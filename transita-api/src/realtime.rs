use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::{Stream, StreamExt};
use std::convert::Infallible;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::state::AppState;
use transita_core::broadcast::Broadcast;
use transita_shared::models::events::BroadcastEnvelope;

/// Fan-out hub for realtime updates. The outbox worker publishes through
/// the [`Broadcast`] trait; SSE subscribers receive the envelopes filtered
/// by topic. Send errors just mean nobody is listening.
pub struct SseHub {
    tx: broadcast::Sender<BroadcastEnvelope>,
}

impl SseHub {
    pub fn new(tx: broadcast::Sender<BroadcastEnvelope>) -> Self {
        Self { tx }
    }
}

impl Broadcast for SseHub {
    fn publish(&self, envelope: BroadcastEnvelope) {
        let _ = self.tx.send(envelope);
    }
}

/// GET /v1/schedules/{id}/stream
/// Live seat updates for one schedule as server-sent events.
pub async fn schedule_stream(
    State(state): State<AppState>,
    Path(schedule_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.realtime.subscribe();
    let topic = format!("schedule:{}", schedule_id);

    let stream = tokio_stream::wrappers::BroadcastStream::new(rx).filter_map(move |result| {
        let topic = topic.clone();
        async move {
            match result {
                Ok(envelope) if envelope.topic == topic => {
                    match serde_json::to_string(&envelope.payload) {
                        Ok(data) => {
                            Some(Ok(Event::default().event(envelope.event).data(data)))
                        }
                        Err(_) => None,
                    }
                }
                // Lagged receivers and foreign topics are both skipped
                _ => None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
