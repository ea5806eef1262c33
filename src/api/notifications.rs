//! Notification API endpoints.

use axum::{
    extract::{Path, State},
    Extension,
};
use chrono::Utc;
use serde::Serialize;

use super::{success, ApiResult};
use crate::auth::{ensure, Action, Actor, Resource};
use crate::errors::AppError;
use crate::models::Notification;
use crate::AppState;

/// Page size for the notification list.
const NOTIFICATION_LIMIT: i64 = 50;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

/// GET /api/notifications - The caller's newest notifications.
pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Vec<Notification>> {
    success(
        state
            .repo
            .list_notifications(&actor.user_id, NOTIFICATION_LIMIT)
            .await?,
    )
}

/// PATCH /api/notifications/{id}/read - Mark one notification read.
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> ApiResult<Notification> {
    let notification = load_notification(&state, &id).await?;
    ensure(
        &actor,
        Action::ReadNotification,
        Resource::Notification {
            recipient: &notification.user_id,
        },
        "Not authorized to access this notification",
    )?;

    success(state.repo.mark_notification_read(&id, Utc::now()).await?)
}

/// PATCH /api/notifications/read-all - Mark all of the caller's notifications read.
pub async fn mark_all_notifications_read(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<MarkAllReadResponse> {
    let updated = state
        .repo
        .mark_all_notifications_read(&actor.user_id, Utc::now())
        .await?;
    success(MarkAllReadResponse { updated })
}

/// DELETE /api/notifications/{id} - Delete one notification.
pub async fn delete_notification(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> ApiResult<()> {
    let notification = load_notification(&state, &id).await?;
    ensure(
        &actor,
        Action::ModifyNotification,
        Resource::Notification {
            recipient: &notification.user_id,
        },
        "Not authorized to delete this notification",
    )?;

    state.repo.delete_notification(&id).await?;
    success(())
}

async fn load_notification(state: &AppState, id: &str) -> Result<Notification, AppError> {
    state
        .repo
        .get_notification(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))
}
