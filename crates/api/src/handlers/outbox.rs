//! Operator view of the notification outbox.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use rollcall_core::error::CoreError;
use rollcall_core::outbox::OutboxStatus;
use rollcall_core::types::DbId;
use rollcall_db::repositories::OutboxRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::rbac::RequireAdmin;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /api/v1/admin/outbox/stats
pub async fn outbox_stats(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let stats = OutboxRepo::stats(&state.pool, admin.tenant_id).await?;
    Ok(Json(DataResponse { data: stats }))
}

/// GET /api/v1/admin/outbox/failed
///
/// Events that exhausted their retry budget, newest first.
pub async fn list_failed_events(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    let events = OutboxRepo::list_by_status(
        &state.pool,
        admin.tenant_id,
        OutboxStatus::Failed,
        params.limit(),
        params.offset(),
    )
    .await?;
    Ok(Json(DataResponse { data: events }))
}

/// POST /api/v1/admin/outbox/{id}/requeue
///
/// Put a failed event back in the queue with a fresh retry budget.
pub async fn requeue_event(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(event_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let event = OutboxRepo::requeue(&state.pool, admin.tenant_id, event_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Failed outbox event",
            id: event_id,
        }))?;

    tracing::info!(
        outbox_event_id = event_id,
        user_id = admin.user_id,
        "Outbox event requeued",
    );

    Ok(Json(DataResponse { data: event }))
}
