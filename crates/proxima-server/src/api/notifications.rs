//! Notification API endpoints.
//!
//! The notifier producer reports connection and disconnection events here.
//! Timeout disconnections synthesized during eviction land in the same log.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use proxima_core::{Notification, RawNotification};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::api::error::{ApiResult, ErrorResponse};
use crate::api::extract::{ApiJson, ApiQuery};
use crate::state::SharedState;

/// Creates the notifications router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new().route(
        "/notifications",
        get(get_notifications)
            .post(create_notification)
            .delete(clear_notifications),
    )
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Response after storing a reported notification.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "success": true,
    "id": "01945f3a-7b2c-7def-8a11-3f2e4c5d6e7f"
}))]
pub struct CreateNotificationResponse {
    /// Always true on a 200 response.
    #[schema(example = true)]
    pub success: bool,

    /// Identifier of the stored notification.
    pub id: Uuid,
}

/// Query parameters for listing notifications.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct NotificationsQuery {
    /// Maximum entries to return. Defaults to the configured limit (50).
    #[param(example = 20, minimum = 0)]
    pub limit: Option<usize>,
}

/// Recent notifications, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "notifications": [],
    "count": 0,
    "total": 0
}))]
pub struct NotificationsResponse {
    /// Up to `limit` notifications, newest first.
    pub notifications: Vec<Notification>,

    /// Entries returned.
    #[schema(example = 0)]
    pub count: usize,

    /// Entries in the whole log.
    #[schema(example = 0)]
    pub total: usize,
}

/// Response after clearing the log.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "success": true,
    "cleared": 12
}))]
pub struct ClearNotificationsResponse {
    /// Always true on a 200 response.
    #[schema(example = true)]
    pub success: bool,

    /// Entries discarded.
    #[schema(example = 12)]
    pub cleared: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// Report a notification.
#[utoipa::path(
    post,
    path = "/notifications",
    tag = "notifications",
    operation_id = "createNotification",
    summary = "Report a device event",
    description = "Stores an event reported by the notifier producer at the head of the \
        log and pushes it to every connected viewer. The log keeps the most recent 100 \
        entries. When `timestamp` is absent the receipt time is used.",
    request_body = RawNotification,
    responses(
        (status = 200, description = "Notification stored", body = CreateNotificationResponse),
        (status = 400, description = "Malformed notification", body = ErrorResponse)
    )
)]
pub async fn create_notification(
    State(state): State<SharedState>,
    ApiJson(request): ApiJson<RawNotification>,
) -> ApiResult<Json<CreateNotificationResponse>> {
    let notification = state.write().await.report_notification(request)?;

    Ok(Json(CreateNotificationResponse {
        success: true,
        id: notification.id,
    }))
}

/// List recent notifications.
#[utoipa::path(
    get,
    path = "/notifications",
    tag = "notifications",
    operation_id = "getNotifications",
    summary = "List recent notifications",
    description = "Returns up to `limit` notifications, newest first.",
    params(NotificationsQuery),
    responses(
        (status = 200, description = "Recent notifications", body = NotificationsResponse),
        (status = 400, description = "Malformed query", body = ErrorResponse)
    )
)]
pub async fn get_notifications(
    State(state): State<SharedState>,
    ApiQuery(query): ApiQuery<NotificationsQuery>,
) -> ApiResult<Json<NotificationsResponse>> {
    let hub = state.read().await;
    let limit = query
        .limit
        .unwrap_or(hub.config().notifications.default_limit);
    let notifications = hub.recent_notifications(limit);

    Ok(Json(NotificationsResponse {
        count: notifications.len(),
        total: hub.notification_count(),
        notifications,
    }))
}

/// Clear the notification log.
#[utoipa::path(
    delete,
    path = "/notifications",
    tag = "notifications",
    operation_id = "clearNotifications",
    summary = "Clear all notifications",
    description = "Discards the whole notification log and tells every connected viewer.",
    responses(
        (status = 200, description = "Log cleared", body = ClearNotificationsResponse)
    )
)]
pub async fn clear_notifications(
    State(state): State<SharedState>,
) -> ApiResult<Json<ClearNotificationsResponse>> {
    let cleared = state.write().await.clear_notifications()?;

    Ok(Json(ClearNotificationsResponse {
        success: true,
        cleared,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notifications_query_limit_is_optional() {
        let query: NotificationsQuery = serde_json::from_str("{}").unwrap();
        assert!(query.limit.is_none());
    }

    #[test]
    fn test_clear_response_serialization() {
        let response = ClearNotificationsResponse {
            success: true,
            cleared: 3,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"cleared\":3"));
    }
}
