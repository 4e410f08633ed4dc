use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use transita_booking::outbox::{OutboxEvent, OutboxStatus};
use transita_booking::repository::OutboxRepository;

pub struct PostgresOutboxRepository {
    pool: PgPool,
}

impl PostgresOutboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct OutboxRow {
    id: Uuid,
    kind: String,
    payload: serde_json::Value,
    status: String,
    attempts: i32,
    created_at: DateTime<Utc>,
}

impl From<OutboxRow> for OutboxEvent {
    fn from(row: OutboxRow) -> Self {
        OutboxEvent {
            id: row.id,
            kind: row.kind,
            payload: row.payload,
            status: match row.status.as_str() {
                "DISPATCHED" => OutboxStatus::Dispatched,
                "FAILED" => OutboxStatus::Failed,
                _ => OutboxStatus::Pending,
            },
            attempts: row.attempts,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl OutboxRepository for PostgresOutboxRepository {
    async fn enqueue(
        &self,
        event: &OutboxEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query(
            "INSERT INTO outbox_events (id, kind, payload, status, attempts, created_at) VALUES ($1, $2, $3, 'PENDING', 0, $4)",
        )
        .bind(event.id)
        .bind(&event.kind)
        .bind(&event.payload)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch_pending(
        &self,
        limit: i64,
    ) -> Result<Vec<OutboxEvent>, Box<dyn std::error::Error + Send + Sync>> {
        let rows = sqlx::query_as::<_, OutboxRow>(
            "SELECT id, kind, payload, status, attempts, created_at FROM outbox_events WHERE status = 'PENDING' ORDER BY created_at LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(OutboxEvent::from).collect())
    }

    async fn mark_dispatched(
        &self,
        id: Uuid,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query("UPDATE outbox_events SET status = 'DISPATCHED' WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn record_failure(
        &self,
        id: Uuid,
        terminal: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query(
            "UPDATE outbox_events SET attempts = attempts + 1, status = CASE WHEN $2 THEN 'FAILED' ELSE status END WHERE id = $1",
        )
        .bind(id)
        .bind(terminal)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
