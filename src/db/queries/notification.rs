use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
};
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::api::auth::Claims;
use crate::db::models::notification::{Notification, NotificationCountResponse};
use crate::db::models::{total_pages, PaginationParams};
use crate::utils::api_response::ApiResponse;

fn db_error(e: sqlx::Error) -> ApiResponse<()> {
    ApiResponse::error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Database error",
        Some(json!({ "error": e.to_string() })),
    )
}

/// The current user's notifications, newest first
#[utoipa::path(
    get,
    path = "/notifications",
    params(
        PaginationParams
    ),
    responses(
        (status = 200, description = "Notifications retrieved successfully"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Notifications",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_notifications(
    State(db_pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<PaginationParams>,
) -> Result<ApiResponse<Value>, ApiResponse<()>> {
    let user_id = claims.user_id()?;
    let (page, limit, offset) = params.resolve(10);

    let total_count: i64 =
        sqlx::query_scalar("SELECT COUNT(id) FROM notifications WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&db_pool)
            .await
            .map_err(db_error)?;

    let notifications: Vec<Notification> = sqlx::query_as(
        "SELECT id, user_id, title, message, type, read_at, created_at
         FROM notifications
         WHERE user_id = $1
         ORDER BY created_at DESC, id DESC
         LIMIT $2 OFFSET $3",
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&db_pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve notifications",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Notifications retrieved successfully",
        json!({
            "page": page,
            "limit": limit,
            "total_notifications": total_count,
            "total_pages": total_pages(total_count, limit),
            "notifications": notifications
        }),
    ))
}

/// Total and unread counts for the current user's notification badge
#[utoipa::path(
    get,
    path = "/notifications/count",
    responses(
        (status = 200, description = "Counts retrieved successfully", body = NotificationCountResponse),
        (status = 500, description = "Internal server error")
    ),
    tag = "Notifications",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_notification_count(
    State(db_pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
) -> Result<ApiResponse<NotificationCountResponse>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let counts: NotificationCountResponse = sqlx::query_as(
        "SELECT COUNT(id) AS total,
                COUNT(id) FILTER (WHERE read_at IS NULL) AS unread
         FROM notifications
         WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(&db_pool)
    .await
    .map_err(db_error)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Counts retrieved successfully",
        counts,
    ))
}

/// Mark one of the current user's notifications as read
#[utoipa::path(
    post,
    path = "/notifications/{notification_id}/read",
    params(
        ("notification_id" = i32, Path, description = "Notification ID")
    ),
    responses(
        (status = 200, description = "Notification marked as read"),
        (status = 404, description = "Notification not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Notifications",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn mark_notification_read(
    State(db_pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(notification_id): Path<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    let user_id = claims.user_id()?;

    let result = sqlx::query(
        "UPDATE notifications SET read_at = NOW() WHERE id = $1 AND user_id = $2",
    )
    .bind(notification_id)
    .bind(user_id)
    .execute(&db_pool)
    .await
    .map_err(db_error)?;

    if result.rows_affected() == 0 {
        return Err(ApiResponse::error(
            StatusCode::NOT_FOUND,
            "Notification not found",
            None,
        ));
    }
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Notification marked as read",
        (),
    ))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(get_notifications, get_notification_count, mark_notification_read),
    components(schemas(Notification, NotificationCountResponse)),
    tags(
        (name = "Notifications", description = "Per-user Notification Endpoints")
    )
)]
pub struct NotificationDoc;
