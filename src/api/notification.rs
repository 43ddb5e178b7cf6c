use crate::db::queries::notification::{
    get_notification_count, get_notifications, mark_notification_read,
};
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;

/// Register per-user notification routes
pub fn notification_routes() -> Router<PgPool> {
    Router::new()
        .route("/notifications", get(get_notifications))
        .route("/notifications/count", get(get_notification_count))
        .route(
            "/notifications/{notification_id}/read",
            post(mark_notification_read),
        )
}
