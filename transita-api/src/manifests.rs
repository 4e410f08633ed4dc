use axum::{
    extract::{Path, State},
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::{map_booking_error, map_manifest_error, AppError};
use crate::state::AppState;
use transita_booking::manifest::{BoardingStatus, PassengerManifest};
use transita_catalog::schedule::Schedule;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/schedules/{id}/manifest", get(get_schedule_manifest))
        .route("/v1/admin/manifests", get(list_manifests))
        .route("/v1/admin/manifests/sync", post(sync_manifests))
        .route("/v1/admin/manifests/{id}", get(get_manifest))
        .route("/v1/admin/manifests/{id}/finalize", post(finalize_manifest))
        .route("/v1/admin/manifests/{id}/depart", post(mark_departed))
        .route("/v1/admin/manifests/{id}/complete", post(mark_completed))
        .route(
            "/v1/admin/manifests/{id}/passengers/{entry_id}/boarding",
            patch(update_boarding_status),
        )
}

#[derive(Debug, Deserialize)]
struct BoardingPayload {
    boarding_status: BoardingStatus,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/admin/schedules/{id}/manifest
/// Generate-or-refresh: the manifest is a projection, so serving it always
/// rebuilds from current confirmed bookings.
async fn get_schedule_manifest(
    State(state): State<AppState>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<PassengerManifest>, AppError> {
    state
        .schedules
        .get_schedule(schedule_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError("Schedule not found".to_string()))?;

    let manifest = state
        .orchestrator
        .regenerate_manifest(schedule_id)
        .await
        .map_err(map_booking_error)?;

    tracing::info!(
        "Manifest for schedule {} generated with {} passengers",
        schedule_id,
        manifest.total_passengers
    );

    Ok(Json(manifest))
}

/// GET /v1/admin/manifests
async fn list_manifests(
    State(state): State<AppState>,
) -> Result<Json<Vec<PassengerManifest>>, AppError> {
    let manifests = state
        .manifests
        .list_manifests()
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    Ok(Json(manifests))
}

/// GET /v1/admin/manifests/{id}
async fn get_manifest(
    State(state): State<AppState>,
    Path(manifest_id): Path<Uuid>,
) -> Result<Json<PassengerManifest>, AppError> {
    let manifest = load_manifest(&state, manifest_id).await?;
    Ok(Json(manifest))
}

/// POST /v1/admin/manifests/{id}/finalize
async fn finalize_manifest(
    State(state): State<AppState>,
    Path(manifest_id): Path<Uuid>,
) -> Result<Json<PassengerManifest>, AppError> {
    let (mut manifest, schedule) = load_manifest_with_schedule(&state, manifest_id).await?;

    manifest
        .finalize(schedule.departure_instant(), Utc::now())
        .map_err(map_manifest_error)?;
    state
        .manifests
        .save_manifest(&manifest)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    tracing::info!("Manifest {} finalized", manifest_id);

    Ok(Json(manifest))
}

/// POST /v1/admin/manifests/{id}/depart
async fn mark_departed(
    State(state): State<AppState>,
    Path(manifest_id): Path<Uuid>,
) -> Result<Json<PassengerManifest>, AppError> {
    let (mut manifest, schedule) = load_manifest_with_schedule(&state, manifest_id).await?;

    manifest
        .mark_departed(schedule.departure_instant(), Utc::now())
        .map_err(map_manifest_error)?;
    state
        .manifests
        .save_manifest(&manifest)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    tracing::info!("Manifest {} marked as departed", manifest_id);

    Ok(Json(manifest))
}

/// POST /v1/admin/manifests/{id}/complete
/// Administrative terminal transition; nothing triggers it automatically.
async fn mark_completed(
    State(state): State<AppState>,
    Path(manifest_id): Path<Uuid>,
) -> Result<Json<PassengerManifest>, AppError> {
    let mut manifest = load_manifest(&state, manifest_id).await?;

    manifest.mark_completed().map_err(map_manifest_error)?;
    state
        .manifests
        .save_manifest(&manifest)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;

    Ok(Json(manifest))
}

/// PATCH /v1/admin/manifests/{id}/passengers/{entry_id}/boarding
async fn update_boarding_status(
    State(state): State<AppState>,
    Path((manifest_id, entry_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<BoardingPayload>,
) -> Result<Json<serde_json::Value>, AppError> {
    let (mut manifest, schedule) = load_manifest_with_schedule(&state, manifest_id).await?;

    // Run the domain guards (departure cutoff, entry existence) against the
    // loaded copy, then write just the one entry through the store
    manifest
        .set_boarding_status(entry_id, payload.boarding_status, schedule.departure_instant(), Utc::now())
        .map_err(map_manifest_error)?;

    let updated = state
        .manifests
        .set_boarding_status(manifest_id, entry_id, payload.boarding_status)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    if !updated {
        return Err(AppError::NotFoundError("Passenger not found in manifest".to_string()));
    }

    tracing::info!("Passenger {} boarding status updated", entry_id);

    Ok(Json(json!({
        "manifest_id": manifest_id,
        "entry_id": entry_id,
        "boarding_status": payload.boarding_status,
    })))
}

/// POST /v1/admin/manifests/sync
/// Rebuild every schedule's manifest in the background, same as the
/// maintenance script the operations team used to run by hand.
async fn sync_manifests(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let schedules = state
        .schedules
        .list_schedules(false)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?;
    let total = schedules.len();

    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        let mut synced = 0usize;
        for schedule in schedules {
            match orchestrator.regenerate_manifest(schedule.id).await {
                Ok(_) => synced += 1,
                Err(err) => {
                    tracing::error!("Manifest sync failed for schedule {}: {}", schedule.id, err)
                }
            }
        }
        tracing::info!("Manifest sync finished: {}/{} schedules", synced, total);
    });

    Ok(Json(json!({
        "message": format!("Sync started for {} schedule(s)", total),
        "total_schedules": total,
    })))
}

// ============================================================================
// Helpers
// ============================================================================

async fn load_manifest(state: &AppState, manifest_id: Uuid) -> Result<PassengerManifest, AppError> {
    state
        .manifests
        .get_manifest(manifest_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError("Manifest not found".to_string()))
}

async fn load_manifest_with_schedule(
    state: &AppState,
    manifest_id: Uuid,
) -> Result<(PassengerManifest, Schedule), AppError> {
    let manifest = load_manifest(state, manifest_id).await?;
    let schedule = state
        .schedules
        .get_schedule(manifest.schedule_id)
        .await
        .map_err(|e| AppError::InternalServerError(e.to_string()))?
        .ok_or_else(|| AppError::NotFoundError("Schedule not found".to_string()))?;
    Ok((manifest, schedule))
}
