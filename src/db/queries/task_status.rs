use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::json;
use sqlx::PgPool;

use crate::db::models::task_status::{NewTaskStatus, TaskStatus, UpdateTaskStatus};
use crate::middleware::auth::UserPermissions;
use crate::utils::api_response::ApiResponse;
use crate::utils::ordering::next_order;
use crate::utils::validation::{is_hex_color, FieldErrors};

const STATUS_COLUMNS: &str =
    "id, project_id, name, color, \"order\", created_at, updated_at";

fn db_error(e: sqlx::Error) -> ApiResponse<()> {
    ApiResponse::error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Database error",
        Some(json!({ "error": e.to_string() })),
    )
}

async fn fetch_status(pool: &PgPool, status_id: i32) -> Result<Option<TaskStatus>, sqlx::Error> {
    sqlx::query_as(&format!(
        "SELECT {STATUS_COLUMNS} FROM task_statuses WHERE id = $1"
    ))
    .bind(status_id)
    .fetch_optional(pool)
    .await
}

/// Create a lane at the end of the project's board
#[utoipa::path(
    post,
    path = "/projects/{project_id}/task-statuses",
    params(
        ("project_id" = i32, Path, description = "Project ID")
    ),
    request_body = NewTaskStatus,
    responses(
        (status = 201, description = "Task status created successfully", body = TaskStatus),
        (status = 403, description = "User lacks permission to create task statuses"),
        (status = 404, description = "Project not found"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Task Statuses",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn create_task_status(
    State(db_pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Path(project_id): Path<i32>,
    Json(payload): Json<NewTaskStatus>,
) -> Result<ApiResponse<TaskStatus>, ApiResponse<()>> {
    if !user_permissions.can("create project") {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to create task statuses",
            None,
        ));
    }

    let project_exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM projects WHERE id = $1)")
            .bind(project_id)
            .fetch_one(&db_pool)
            .await
            .map_err(db_error)?;
    if !project_exists {
        return Err(ApiResponse::error(
            StatusCode::NOT_FOUND,
            "Project not found",
            None,
        ));
    }

    let mut errors = FieldErrors::new();
    if payload.name.trim().is_empty() {
        errors.add("name", "The name field is required.");
    } else if payload.name.len() > 255 {
        errors.add("name", "The name may not be greater than 255 characters.");
    }
    if !is_hex_color(&payload.color) {
        errors.add("color", "The color must be a hex color string.");
    }
    if !errors.is_empty() {
        return Err(errors.into_error());
    }

    // New lanes land at the end of the board.
    let max_order: Option<i32> =
        sqlx::query_scalar("SELECT MAX(\"order\") FROM task_statuses WHERE project_id = $1")
            .bind(project_id)
            .fetch_one(&db_pool)
            .await
            .map_err(db_error)?;

    let status: TaskStatus = sqlx::query_as(&format!(
        "INSERT INTO task_statuses (project_id, name, color, \"order\")
         VALUES ($1, $2, $3, $4)
         RETURNING {STATUS_COLUMNS}"
    ))
    .bind(project_id)
    .bind(&payload.name)
    .bind(&payload.color)
    .bind(next_order(max_order))
    .fetch_one(&db_pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to create task status",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Task status created successfully.",
        status,
    ))
}

/// Rename, recolor, or reorder a lane
#[utoipa::path(
    put,
    path = "/projects/{project_id}/task-statuses/{status_id}",
    params(
        ("project_id" = i32, Path, description = "Project ID"),
        ("status_id" = i32, Path, description = "Task status ID")
    ),
    request_body = UpdateTaskStatus,
    responses(
        (status = 200, description = "Task status updated successfully", body = TaskStatus),
        (status = 403, description = "Lane belongs to another project, or missing permission"),
        (status = 404, description = "Task status not found"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Task Statuses",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn update_task_status(
    State(db_pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Path((project_id, status_id)): Path<(i32, i32)>,
    Json(payload): Json<UpdateTaskStatus>,
) -> Result<ApiResponse<TaskStatus>, ApiResponse<()>> {
    if !user_permissions.can("update project") {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to update task statuses",
            None,
        ));
    }

    let status = fetch_status(&db_pool, status_id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| {
            ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Task status not found", None)
        })?;
    if status.project_id != project_id {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "Task status does not belong to this project",
            None,
        ));
    }

    let mut errors = FieldErrors::new();
    if let Some(name) = &payload.name {
        if name.trim().is_empty() || name.len() > 255 {
            errors.add("name", "The name must be between 1 and 255 characters.");
        }
    }
    if let Some(color) = &payload.color {
        if !is_hex_color(color) {
            errors.add("color", "The color must be a hex color string.");
        }
    }
    if let Some(order) = payload.order {
        if order < 0 {
            errors.add("order", "The order must be at least 0.");
        }
    }
    if !errors.is_empty() {
        return Err(errors.into_error());
    }

    let updated: TaskStatus = sqlx::query_as(&format!(
        "UPDATE task_statuses
         SET name = COALESCE($1, name),
             color = COALESCE($2, color),
             \"order\" = COALESCE($3, \"order\"),
             updated_at = NOW()
         WHERE id = $4
         RETURNING {STATUS_COLUMNS}"
    ))
    .bind(&payload.name)
    .bind(&payload.color)
    .bind(payload.order)
    .bind(status_id)
    .fetch_one(&db_pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to update task status",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Task status updated successfully.",
        updated,
    ))
}

/// Delete an empty lane. A lane that still has tasks is kept.
#[utoipa::path(
    delete,
    path = "/projects/{project_id}/task-statuses/{status_id}",
    params(
        ("project_id" = i32, Path, description = "Project ID"),
        ("status_id" = i32, Path, description = "Task status ID")
    ),
    responses(
        (status = 200, description = "Task status deleted successfully"),
        (status = 403, description = "Lane is non-empty, belongs to another project, or missing permission"),
        (status = 404, description = "Task status not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Task Statuses",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn delete_task_status(
    State(db_pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Path((project_id, status_id)): Path<(i32, i32)>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    if !user_permissions.can("delete project") {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to delete task statuses",
            None,
        ));
    }

    let status = fetch_status(&db_pool, status_id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| {
            ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Task status not found", None)
        })?;
    if status.project_id != project_id {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "Task status does not belong to this project",
            None,
        ));
    }

    let task_count: i64 = sqlx::query_scalar("SELECT COUNT(id) FROM tasks WHERE task_status_id = $1")
        .bind(status_id)
        .fetch_one(&db_pool)
        .await
        .map_err(db_error)?;
    if task_count > 0 {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "Cannot delete a status that has tasks. Please move or delete the tasks first.",
            Some(json!({ "status": ["Cannot delete a status that has tasks."] })),
        ));
    }

    sqlx::query("DELETE FROM task_statuses WHERE id = $1")
        .bind(status_id)
        .execute(&db_pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to delete task status",
                Some(json!({ "error": e.to_string() })),
            )
        })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Task status deleted successfully.",
        (),
    ))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(create_task_status, update_task_status, delete_task_status),
    components(schemas(TaskStatus, NewTaskStatus, UpdateTaskStatus)),
    tags(
        (name = "Task Statuses", description = "Kanban Lane Endpoints")
    )
)]
pub struct TaskStatusDoc;
