use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use transita_booking::manifest::{BoardingStatus, ManifestStatus, PassengerManifest};
use transita_booking::repository::ManifestRepository;

pub struct PostgresManifestRepository {
    pool: PgPool,
}

impl PostgresManifestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ManifestRow {
    id: Uuid,
    schedule_id: Uuid,
    passengers: serde_json::Value,
    total_passengers: i32,
    total_seats_booked: i32,
    manifest_status: String,
    finalized_at: Option<DateTime<Utc>>,
    departed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ManifestRow> for PassengerManifest {
    fn from(row: ManifestRow) -> Self {
        PassengerManifest {
            id: row.id,
            schedule_id: row.schedule_id,
            passengers: serde_json::from_value(row.passengers).unwrap_or_default(),
            total_passengers: row.total_passengers,
            total_seats_booked: row.total_seats_booked,
            manifest_status: parse_status(&row.manifest_status),
            finalized_at: row.finalized_at,
            departed_at: row.departed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn parse_status(s: &str) -> ManifestStatus {
    match s {
        "FINALIZED" => ManifestStatus::Finalized,
        "DEPARTED" => ManifestStatus::Departed,
        "COMPLETED" => ManifestStatus::Completed,
        _ => ManifestStatus::Draft,
    }
}

fn status_to_str(status: ManifestStatus) -> &'static str {
    match status {
        ManifestStatus::Draft => "DRAFT",
        ManifestStatus::Finalized => "FINALIZED",
        ManifestStatus::Departed => "DEPARTED",
        ManifestStatus::Completed => "COMPLETED",
    }
}

fn boarding_to_str(status: BoardingStatus) -> &'static str {
    match status {
        BoardingStatus::NotBoarded => "not-boarded",
        BoardingStatus::Boarded => "boarded",
        BoardingStatus::NoShow => "no-show",
    }
}

const MANIFEST_COLUMNS: &str = "id, schedule_id, passengers, total_passengers, total_seats_booked, manifest_status, finalized_at, departed_at, created_at, updated_at";

#[async_trait]
impl ManifestRepository for PostgresManifestRepository {
    async fn get_manifest(
        &self,
        id: Uuid,
    ) -> Result<Option<PassengerManifest>, Box<dyn std::error::Error + Send + Sync>> {
        let row = sqlx::query_as::<_, ManifestRow>(&format!(
            "SELECT {} FROM passenger_manifests WHERE id = $1",
            MANIFEST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(PassengerManifest::from))
    }

    async fn get_manifest_for_schedule(
        &self,
        schedule_id: Uuid,
    ) -> Result<Option<PassengerManifest>, Box<dyn std::error::Error + Send + Sync>> {
        let row = sqlx::query_as::<_, ManifestRow>(&format!(
            "SELECT {} FROM passenger_manifests WHERE schedule_id = $1",
            MANIFEST_COLUMNS
        ))
        .bind(schedule_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(PassengerManifest::from))
    }

    async fn list_manifests(
        &self,
    ) -> Result<Vec<PassengerManifest>, Box<dyn std::error::Error + Send + Sync>> {
        let rows = sqlx::query_as::<_, ManifestRow>(&format!(
            "SELECT {} FROM passenger_manifests ORDER BY created_at DESC",
            MANIFEST_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(PassengerManifest::from).collect())
    }

    async fn save_manifest(
        &self,
        manifest: &PassengerManifest,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let passengers = serde_json::to_value(&manifest.passengers)?;

        sqlx::query(
            r#"
            INSERT INTO passenger_manifests (id, schedule_id, passengers, total_passengers, total_seats_booked, manifest_status, finalized_at, departed_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (schedule_id) DO UPDATE SET
                passengers = EXCLUDED.passengers,
                total_passengers = EXCLUDED.total_passengers,
                total_seats_booked = EXCLUDED.total_seats_booked,
                manifest_status = EXCLUDED.manifest_status,
                finalized_at = EXCLUDED.finalized_at,
                departed_at = EXCLUDED.departed_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(manifest.id)
        .bind(manifest.schedule_id)
        .bind(passengers)
        .bind(manifest.total_passengers)
        .bind(manifest.total_seats_booked)
        .bind(status_to_str(manifest.manifest_status))
        .bind(manifest.finalized_at)
        .bind(manifest.departed_at)
        .bind(manifest.created_at)
        .bind(manifest.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_boarding_status(
        &self,
        manifest_id: Uuid,
        entry_id: Uuid,
        status: BoardingStatus,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        // Rewrite only the matching entry server-side so a concurrent
        // regeneration cannot clobber this edit with a stale roster read.
        let result = sqlx::query(
            r#"
            UPDATE passenger_manifests
               SET passengers = (
                       SELECT COALESCE(jsonb_agg(
                           CASE WHEN elem->>'entry_id' = $2
                                THEN jsonb_set(elem, '{boarding_status}', to_jsonb($3::text))
                                ELSE elem
                           END), '[]'::jsonb)
                         FROM jsonb_array_elements(passengers) AS elem
                   ),
                   updated_at = NOW()
             WHERE id = $1
               AND EXISTS (
                       SELECT 1 FROM jsonb_array_elements(passengers) AS e
                        WHERE e->>'entry_id' = $2
                   )
            "#,
        )
        .bind(manifest_id)
        .bind(entry_id.to_string())
        .bind(boarding_to_str(status))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
