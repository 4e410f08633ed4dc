use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use transita_catalog::repository::RouteRepository;
use transita_catalog::route::Route;

pub struct PostgresRouteRepository {
    pool: PgPool,
}

impl PostgresRouteRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RouteRow {
    id: Uuid,
    route_number: String,
    origin: String,
    destination: String,
    distance_km: Option<f64>,
    fare_minor: i32,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RouteRow> for Route {
    fn from(row: RouteRow) -> Self {
        Route {
            id: row.id,
            route_number: row.route_number,
            origin: row.origin,
            destination: row.destination,
            distance_km: row.distance_km,
            fare_minor: row.fare_minor,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl RouteRepository for PostgresRouteRepository {
    async fn create_route(
        &self,
        route: &Route,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        sqlx::query(
            r#"
            INSERT INTO routes (id, route_number, origin, destination, distance_km, fare_minor, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(route.id)
        .bind(&route.route_number)
        .bind(&route.origin)
        .bind(&route.destination)
        .bind(route.distance_km)
        .bind(route.fare_minor)
        .bind(route.is_active)
        .bind(route.created_at)
        .bind(route.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_route(
        &self,
        id: Uuid,
    ) -> Result<Option<Route>, Box<dyn std::error::Error + Send + Sync>> {
        let row = sqlx::query_as::<_, RouteRow>(
            "SELECT id, route_number, origin, destination, distance_km, fare_minor, is_active, created_at, updated_at FROM routes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Route::from))
    }

    async fn list_routes(
        &self,
    ) -> Result<Vec<Route>, Box<dyn std::error::Error + Send + Sync>> {
        let rows = sqlx::query_as::<_, RouteRow>(
            "SELECT id, route_number, origin, destination, distance_km, fare_minor, is_active, created_at, updated_at FROM routes ORDER BY route_number",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Route::from).collect())
    }
}
