use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use transita_catalog::repository::{ReserveOutcome, ScheduleRepository};
use transita_catalog::schedule::Schedule;

pub struct PostgresScheduleRepository {
    pool: PgPool,
}

impl PostgresScheduleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ScheduleRow {
    id: Uuid,
    route_id: Uuid,
    schedule_ref: String,
    journey_date: NaiveDate,
    departure_time: String,
    arrival_time: String,
    bus_number: String,
    driver_name: Option<String>,
    capacity: i32,
    booked_seats: Vec<i32>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ScheduleRow> for Schedule {
    fn from(row: ScheduleRow) -> Self {
        Schedule {
            id: row.id,
            route_id: row.route_id,
            schedule_ref: row.schedule_ref,
            journey_date: row.journey_date,
            departure_time: row.departure_time,
            arrival_time: row.arrival_time,
            bus_number: row.bus_number,
            driver_name: row.driver_name,
            capacity: row.capacity,
            booked_seats: row.booked_seats,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SCHEDULE_COLUMNS: &str = "id, route_id, schedule_ref, journey_date, departure_time, arrival_time, bus_number, driver_name, capacity, booked_seats, is_active, created_at, updated_at";

#[async_trait]
impl ScheduleRepository for PostgresScheduleRepository {
    async fn create_schedule(
        &self,
        schedule: &Schedule,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query(
            r#"
            INSERT INTO schedules (id, route_id, schedule_ref, journey_date, departure_time, arrival_time, bus_number, driver_name, capacity, booked_seats, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(schedule.id)
        .bind(schedule.route_id)
        .bind(&schedule.schedule_ref)
        .bind(schedule.journey_date)
        .bind(&schedule.departure_time)
        .bind(&schedule.arrival_time)
        .bind(&schedule.bus_number)
        .bind(&schedule.driver_name)
        .bind(schedule.capacity)
        .bind(&schedule.booked_seats)
        .bind(schedule.is_active)
        .bind(schedule.created_at)
        .bind(schedule.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_schedule(
        &self,
        id: Uuid,
    ) -> Result<Option<Schedule>, Box<dyn std::error::Error + Send + Sync>> {
        let row = sqlx::query_as::<_, ScheduleRow>(&format!(
            "SELECT {} FROM schedules WHERE id = $1",
            SCHEDULE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Schedule::from))
    }

    async fn list_schedules(
        &self,
        active_only: bool,
    ) -> Result<Vec<Schedule>, Box<dyn std::error::Error + Send + Sync>> {
        let sql = if active_only {
            format!(
                "SELECT {} FROM schedules WHERE is_active ORDER BY journey_date, departure_time",
                SCHEDULE_COLUMNS
            )
        } else {
            format!(
                "SELECT {} FROM schedules ORDER BY journey_date, departure_time",
                SCHEDULE_COLUMNS
            )
        };

        let rows = sqlx::query_as::<_, ScheduleRow>(&sql).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Schedule::from).collect())
    }

    async fn set_schedule_active(
        &self,
        id: Uuid,
        is_active: bool,
    ) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let result = sqlx::query("UPDATE schedules SET is_active = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(is_active)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn reserve_seats(
        &self,
        schedule_id: Uuid,
        seats: &[i32],
    ) -> Result<ReserveOutcome, Box<dyn std::error::Error + Send + Sync>> {
        let requested: Vec<i32> = seats.to_vec();

        // Single conditional update: succeeds only when no requested seat is
        // already in the booked set and the result still fits capacity. This
        // is the serialization point that closes the check-then-act window.
        let row = sqlx::query_as::<_, ScheduleRow>(&format!(
            r#"
            UPDATE schedules
               SET booked_seats = (SELECT ARRAY(SELECT unnest(booked_seats || $2::int4[]) ORDER BY 1)),
                   updated_at = NOW()
             WHERE id = $1
               AND is_active
               AND NOT (booked_seats && $2::int4[])
               AND cardinality(booked_seats) + cardinality($2::int4[]) <= capacity
            RETURNING {}
            "#,
            SCHEDULE_COLUMNS
        ))
        .bind(schedule_id)
        .bind(&requested)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(ReserveOutcome::Reserved(row.into()));
        }

        // The condition failed; re-read to say why
        let current = self.get_schedule(schedule_id).await?;
        match current {
            None => Ok(ReserveOutcome::NotFound),
            Some(schedule) if !schedule.is_active => Ok(ReserveOutcome::Inactive),
            Some(schedule) => {
                let overlap: Vec<i32> = requested
                    .iter()
                    .copied()
                    .filter(|s| schedule.booked_seats.contains(s))
                    .collect();
                if !overlap.is_empty() {
                    Ok(ReserveOutcome::Conflict(overlap))
                } else if schedule.available_seats() < requested.len() as i32 {
                    Ok(ReserveOutcome::CapacityExceeded {
                        requested: requested.len() as i32,
                        available: schedule.available_seats(),
                    })
                } else {
                    // A release slipped in between the update and the
                    // re-read; the caller can simply retry.
                    Err("seat reservation raced with a concurrent update".into())
                }
            }
        }
    }

    async fn release_seats(
        &self,
        schedule_id: Uuid,
        seats: &[i32],
    ) -> Result<Option<Schedule>, Box<dyn std::error::Error + Send + Sync>> {
        let released: Vec<i32> = seats.to_vec();

        let row = sqlx::query_as::<_, ScheduleRow>(&format!(
            r#"
            UPDATE schedules
               SET booked_seats = (SELECT ARRAY(SELECT unnest(booked_seats) EXCEPT SELECT unnest($2::int4[]) ORDER BY 1)),
                   updated_at = NOW()
             WHERE id = $1
            RETURNING {}
            "#,
            SCHEDULE_COLUMNS
        ))
        .bind(schedule_id)
        .bind(&released)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Schedule::from))
    }
}
