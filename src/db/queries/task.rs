use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::db::models::project::Project;
use crate::db::models::task::{MoveTask, NewTask, Task, TaskPriority, UpdateTask};
use crate::db::models::task_status::{StatusColumn, TaskStatus};
use crate::middleware::auth::UserPermissions;
use crate::utils::api_response::ApiResponse;
use crate::utils::ordering::next_order;
use crate::utils::validation::FieldErrors;

const TASK_COLUMNS: &str = "id, project_id, task_status_id, assigned_to, title, description, \
                            priority, \"order\", due_date, completed_at, created_at, updated_at";

async fn fetch_task(pool: &PgPool, task_id: i32) -> Result<Option<Task>, sqlx::Error> {
    sqlx::query_as(&format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"))
        .bind(task_id)
        .fetch_optional(pool)
        .await
}

async fn fetch_status(pool: &PgPool, status_id: i32) -> Result<Option<TaskStatus>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, project_id, name, color, \"order\", created_at, updated_at
         FROM task_statuses WHERE id = $1",
    )
    .bind(status_id)
    .fetch_optional(pool)
    .await
}

fn db_error(e: sqlx::Error) -> ApiResponse<()> {
    ApiResponse::error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Database error",
        Some(json!({ "error": e.to_string() })),
    )
}

/// The kanban board for a project: lanes in display order, each carrying its
/// tasks ordered by position with a stable id tie-break.
#[utoipa::path(
    get,
    path = "/projects/{project_id}/tasks",
    params(
        ("project_id" = i32, Path, description = "Project ID")
    ),
    responses(
        (status = 200, description = "Board retrieved successfully"),
        (status = 404, description = "Project not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Tasks",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_project_tasks(
    State(db_pool): State<PgPool>,
    Path(project_id): Path<i32>,
) -> Result<ApiResponse<Value>, ApiResponse<()>> {
    let project: Option<Project> = sqlx::query_as(
        "SELECT id, team_id, owner_id, name, description, status, start_date, due_date,
                created_at, updated_at
         FROM projects WHERE id = $1",
    )
    .bind(project_id)
    .fetch_optional(&db_pool)
    .await
    .map_err(db_error)?;
    let Some(project) = project else {
        return Err(ApiResponse::error(
            StatusCode::NOT_FOUND,
            "Project not found",
            None,
        ));
    };

    let statuses: Vec<TaskStatus> = sqlx::query_as(
        "SELECT id, project_id, name, color, \"order\", created_at, updated_at
         FROM task_statuses WHERE project_id = $1
         ORDER BY \"order\", id",
    )
    .bind(project_id)
    .fetch_all(&db_pool)
    .await
    .map_err(db_error)?;

    let tasks: Vec<Task> = sqlx::query_as(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE project_id = $1 ORDER BY \"order\", id"
    ))
    .bind(project_id)
    .fetch_all(&db_pool)
    .await
    .map_err(db_error)?;

    let mut columns: Vec<StatusColumn> = statuses.into_iter().map(StatusColumn::from_status).collect();
    for task in tasks {
        if let Some(column) = columns.iter_mut().find(|c| c.id == task.task_status_id) {
            column.tasks.push(task);
        }
    }

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Board retrieved successfully",
        json!({ "project": project, "statuses": columns }),
    ))
}

/// Create a task at the end of its target lane
#[utoipa::path(
    post,
    path = "/projects/{project_id}/tasks",
    params(
        ("project_id" = i32, Path, description = "Project ID")
    ),
    request_body = NewTask,
    responses(
        (status = 201, description = "Task created successfully", body = Task),
        (status = 403, description = "Lane belongs to another project, or missing permission"),
        (status = 404, description = "Project or lane not found"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Tasks",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn create_task(
    State(db_pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Path(project_id): Path<i32>,
    Json(payload): Json<NewTask>,
) -> Result<ApiResponse<Task>, ApiResponse<()>> {
    if !user_permissions.can("create project") {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to create tasks",
            None,
        ));
    }

    let mut errors = FieldErrors::new();
    if payload.title.trim().is_empty() {
        errors.add("title", "The title field is required.");
    } else if payload.title.len() > 255 {
        errors.add("title", "The title may not be greater than 255 characters.");
    }
    if let Some(assignee) = payload.assigned_to {
        let user_exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
                .bind(assignee)
                .fetch_one(&db_pool)
                .await
                .map_err(db_error)?;
        if !user_exists {
            errors.add("assigned_to", "The selected assignee is invalid.");
        }
    }
    if !errors.is_empty() {
        return Err(errors.into_error());
    }

    let status = fetch_status(&db_pool, payload.task_status_id)
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

    // Append to the lane; no uniqueness is enforced on the position.
    let max_order: Option<i32> =
        sqlx::query_scalar("SELECT MAX(\"order\") FROM tasks WHERE task_status_id = $1")
            .bind(payload.task_status_id)
            .fetch_one(&db_pool)
            .await
            .map_err(db_error)?;

    let task: Task = sqlx::query_as(&format!(
        "INSERT INTO tasks (project_id, task_status_id, assigned_to, title, description,
                            priority, \"order\", due_date)
         VALUES ($1, $2, $3, $4, $5, COALESCE($6, 'medium'::task_priority), $7, $8)
         RETURNING {TASK_COLUMNS}"
    ))
    .bind(project_id)
    .bind(payload.task_status_id)
    .bind(payload.assigned_to)
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(payload.priority)
    .bind(next_order(max_order))
    .bind(payload.due_date)
    .fetch_one(&db_pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to create task",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Task created successfully.",
        task,
    ))
}

/// Partially update a task
#[utoipa::path(
    put,
    path = "/projects/{project_id}/tasks/{task_id}",
    params(
        ("project_id" = i32, Path, description = "Project ID"),
        ("task_id" = i32, Path, description = "Task ID")
    ),
    request_body = UpdateTask,
    responses(
        (status = 200, description = "Task updated successfully", body = Task),
        (status = 403, description = "Task belongs to another project, or missing permission"),
        (status = 404, description = "Task not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Tasks",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn update_task(
    State(db_pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Path((project_id, task_id)): Path<(i32, i32)>,
    Json(payload): Json<UpdateTask>,
) -> Result<ApiResponse<Task>, ApiResponse<()>> {
    if !user_permissions.can("update project") {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to update tasks",
            None,
        ));
    }

    let task = fetch_task(&db_pool, task_id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Task not found", None))?;
    if task.project_id != project_id {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "Task does not belong to this project",
            None,
        ));
    }

    if let Some(title) = &payload.title {
        if title.trim().is_empty() || title.len() > 255 {
            let mut errors = FieldErrors::new();
            errors.add("title", "The title must be between 1 and 255 characters.");
            return Err(errors.into_error());
        }
    }

    let updated: Task = sqlx::query_as(&format!(
        "UPDATE tasks
         SET title = COALESCE($1, title),
             description = COALESCE($2, description),
             priority = COALESCE($3, priority),
             assigned_to = COALESCE($4, assigned_to),
             due_date = COALESCE($5, due_date),
             completed_at = COALESCE($6, completed_at),
             updated_at = NOW()
         WHERE id = $7
         RETURNING {TASK_COLUMNS}"
    ))
    .bind(&payload.title)
    .bind(&payload.description)
    .bind(payload.priority)
    .bind(payload.assigned_to)
    .bind(payload.due_date)
    .bind(payload.completed_at)
    .bind(task_id)
    .fetch_one(&db_pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to update task",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Task updated successfully.",
        updated,
    ))
}

/// Move a task to a lane and position in one update. Sibling positions are
/// untouched; the client computes the target position.
#[utoipa::path(
    put,
    path = "/projects/{project_id}/tasks/{task_id}/status",
    params(
        ("project_id" = i32, Path, description = "Project ID"),
        ("task_id" = i32, Path, description = "Task ID")
    ),
    request_body = MoveTask,
    responses(
        (status = 200, description = "Task moved successfully", body = Task),
        (status = 403, description = "Task or lane belongs to another project"),
        (status = 404, description = "Task or lane not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Tasks",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn move_task(
    State(db_pool): State<PgPool>,
    Path((project_id, task_id)): Path<(i32, i32)>,
    Json(payload): Json<MoveTask>,
) -> Result<ApiResponse<Task>, ApiResponse<()>> {
    let task = fetch_task(&db_pool, task_id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Task not found", None))?;
    if task.project_id != project_id {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "Task does not belong to this project",
            None,
        ));
    }

    let status = fetch_status(&db_pool, payload.task_status_id)
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

    let moved: Task = sqlx::query_as(&format!(
        "UPDATE tasks SET task_status_id = $1, \"order\" = $2, updated_at = NOW()
         WHERE id = $3
         RETURNING {TASK_COLUMNS}"
    ))
    .bind(payload.task_status_id)
    .bind(payload.order)
    .bind(task_id)
    .fetch_one(&db_pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to move task",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Task moved successfully.",
        moved,
    ))
}

/// Delete a task
#[utoipa::path(
    delete,
    path = "/projects/{project_id}/tasks/{task_id}",
    params(
        ("project_id" = i32, Path, description = "Project ID"),
        ("task_id" = i32, Path, description = "Task ID")
    ),
    responses(
        (status = 200, description = "Task deleted successfully"),
        (status = 403, description = "Task belongs to another project, or missing permission"),
        (status = 404, description = "Task not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Tasks",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn delete_task(
    State(db_pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Path((project_id, task_id)): Path<(i32, i32)>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    if !user_permissions.can("delete project") {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to delete tasks",
            None,
        ));
    }

    let task = fetch_task(&db_pool, task_id)
        .await
        .map_err(db_error)?
        .ok_or_else(|| ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Task not found", None))?;
    if task.project_id != project_id {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "Task does not belong to this project",
            None,
        ));
    }

    sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(task_id)
        .execute(&db_pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to delete task",
                Some(json!({ "error": e.to_string() })),
            )
        })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Task deleted successfully.",
        (),
    ))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(get_project_tasks, create_task, update_task, move_task, delete_task),
    components(schemas(Task, NewTask, UpdateTask, MoveTask, TaskPriority, StatusColumn)),
    tags(
        (name = "Tasks", description = "Task Management Endpoints")
    )
)]
pub struct TaskDoc;
