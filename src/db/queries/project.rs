use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use sqlx::{FromRow, PgPool};

use crate::api::auth::Claims;
use crate::db::models::notification::NotificationType;
use crate::db::models::project::{
    dates_in_order, NewProject, Project, ProjectListItem, ProjectStatus, UpdateProject,
};
use crate::db::models::{total_pages, PaginationParams};
use crate::middleware::auth::UserPermissions;
use crate::realtime::UserChannels;
use crate::utils::api_response::ApiResponse;
use crate::utils::notification::{notification_titles, notify_team_members};
use crate::utils::validation::FieldErrors;

const PROJECT_COLUMNS: &str = "id, team_id, owner_id, name, description, status, start_date, \
                               due_date, created_at, updated_at";

#[derive(Debug, serde::Serialize, FromRow)]
struct TeamOption {
    id: i32,
    name: String,
}

async fn team_exists(pool: &PgPool, team_id: i32) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM teams WHERE id = $1)")
        .bind(team_id)
        .fetch_one(pool)
        .await
}

fn validate_project_fields(
    name: &str,
    start_date: Option<chrono::NaiveDate>,
    due_date: Option<chrono::NaiveDate>,
) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if name.trim().is_empty() {
        errors.add("name", "The name field is required.");
    } else if name.len() > 255 {
        errors.add("name", "The name may not be greater than 255 characters.");
    }
    if !dates_in_order(start_date, due_date) {
        errors.add(
            "due_date",
            "The due date must be a date after or equal to start date.",
        );
    }
    errors
}

/// Get all projects with pagination, newest start date first
#[utoipa::path(
    get,
    path = "/projects",
    params(
        PaginationParams
    ),
    responses(
        (status = 200, description = "List of projects retrieved successfully"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Projects",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_all_projects(
    State(db_pool): State<PgPool>,
    Query(params): Query<PaginationParams>,
) -> Result<ApiResponse<Value>, ApiResponse<()>> {
    let (page, limit, offset) = params.resolve(10);

    let total_count: i64 = sqlx::query_scalar("SELECT COUNT(id) FROM projects")
        .fetch_one(&db_pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to retrieve project count",
                Some(json!({ "error": e.to_string() })),
            )
        })?;

    let projects: Vec<ProjectListItem> = sqlx::query_as(
        "SELECT p.id, p.team_id, p.owner_id, p.name, p.description, p.status,
                p.start_date, p.due_date, p.updated_at,
                o.name AS owner_name, t.name AS team_name
         FROM projects p
         JOIN users o ON p.owner_id = o.id
         JOIN teams t ON p.team_id = t.id
         ORDER BY p.start_date DESC NULLS LAST, p.id DESC
         LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&db_pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve projects",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    // Teams are included for the assignment dropdown on the list screen.
    let teams: Vec<TeamOption> = sqlx::query_as("SELECT id, name FROM teams ORDER BY name")
        .fetch_all(&db_pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to retrieve teams",
                Some(json!({ "error": e.to_string() })),
            )
        })?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Projects retrieved successfully",
        json!({
            "page": page,
            "limit": limit,
            "total_projects": total_count,
            "total_pages": total_pages(total_count, limit),
            "projects": projects,
            "teams": teams
        }),
    ))
}

/// Create a new project and notify every member of the owning team
#[utoipa::path(
    post,
    path = "/projects",
    request_body = NewProject,
    responses(
        (status = 201, description = "Project created successfully", body = Project),
        (status = 403, description = "User lacks permission to create a project"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Projects",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn create_project(
    State(db_pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Extension(user_permissions): Extension<UserPermissions>,
    Extension(channels): Extension<UserChannels>,
    Json(payload): Json<NewProject>,
) -> Result<ApiResponse<Project>, ApiResponse<()>> {
    if !user_permissions.can("create project") {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to create a project",
            None,
        ));
    }
    let owner_id = claims.user_id()?;

    let mut errors = validate_project_fields(&payload.name, payload.start_date, payload.due_date);
    let exists = team_exists(&db_pool, payload.team_id).await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database error",
            Some(json!({ "error": e.to_string() })),
        )
    })?;
    if !exists {
        errors.add("team_id", "The selected team is invalid.");
    }
    if !errors.is_empty() {
        return Err(errors.into_error());
    }

    let project: Project = sqlx::query_as(&format!(
        "INSERT INTO projects (team_id, owner_id, name, description, status, start_date, due_date)
         VALUES ($1, $2, $3, $4, COALESCE($5, 'planning'::project_status), $6, $7)
         RETURNING {PROJECT_COLUMNS}"
    ))
    .bind(payload.team_id)
    .bind(owner_id)
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(payload.status)
    .bind(payload.start_date)
    .bind(payload.due_date)
    .fetch_one(&db_pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to create project",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let message = format!("You have been assigned to a new project: {}", project.name);
    if let Err(e) = notify_team_members(
        &db_pool,
        &channels,
        project.team_id,
        notification_titles::PROJECT_ASSIGNED,
        &message,
        NotificationType::Success,
    )
    .await
    {
        // The project row exists; a broken fan-out is logged, not surfaced.
        tracing::error!("project creation fan-out failed: {e}");
    }

    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Project created successfully!",
        project,
    ))
}

/// Update a project. A team change notifies the old team of removal and the
/// new team of assignment; otherwise the current team is notified of the
/// update.
#[utoipa::path(
    put,
    path = "/projects/{project_id}",
    params(
        ("project_id" = i32, Path, description = "Project ID to update")
    ),
    request_body = UpdateProject,
    responses(
        (status = 200, description = "Project updated successfully", body = Project),
        (status = 403, description = "User lacks permission to update the project"),
        (status = 404, description = "Project not found"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Projects",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn update_project(
    State(db_pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Extension(channels): Extension<UserChannels>,
    Path(project_id): Path<i32>,
    Json(payload): Json<UpdateProject>,
) -> Result<ApiResponse<Project>, ApiResponse<()>> {
    if !user_permissions.can("update project") {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to update this project",
            None,
        ));
    }

    let existing: Option<Project> = sqlx::query_as(&format!(
        "SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1"
    ))
    .bind(project_id)
    .fetch_optional(&db_pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database error",
            Some(json!({ "error": e.to_string() })),
        )
    })?;
    let Some(existing) = existing else {
        return Err(ApiResponse::error(
            StatusCode::NOT_FOUND,
            "Project not found",
            None,
        ));
    };

    let mut errors = validate_project_fields(&payload.name, payload.start_date, payload.due_date);
    let exists = team_exists(&db_pool, payload.team_id).await.map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database error",
            Some(json!({ "error": e.to_string() })),
        )
    })?;
    if !exists {
        errors.add("team_id", "The selected team is invalid.");
    }
    if !errors.is_empty() {
        return Err(errors.into_error());
    }

    let old_team_id = existing.team_id;
    let team_changed = old_team_id != payload.team_id;

    let updated: Project = sqlx::query_as(&format!(
        "UPDATE projects
         SET team_id = $1, name = $2, description = $3,
             status = COALESCE($4, status),
             start_date = COALESCE($5, start_date),
             due_date = COALESCE($6, due_date),
             updated_at = NOW()
         WHERE id = $7
         RETURNING {PROJECT_COLUMNS}"
    ))
    .bind(payload.team_id)
    .bind(&payload.name)
    .bind(&payload.description)
    .bind(payload.status)
    .bind(payload.start_date)
    .bind(payload.due_date)
    .bind(project_id)
    .fetch_one(&db_pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to update project",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let fan_out = if team_changed {
        let removed = notify_team_members(
            &db_pool,
            &channels,
            old_team_id,
            notification_titles::PROJECT_REMOVED,
            &format!("Your team has been removed from project: {}", updated.name),
            NotificationType::Warning,
        )
        .await;

        let assigned = notify_team_members(
            &db_pool,
            &channels,
            updated.team_id,
            notification_titles::PROJECT_ASSIGNED,
            &format!("Your team has been assigned to project: {}", updated.name),
            NotificationType::Success,
        )
        .await;

        removed.and(assigned)
    } else {
        notify_team_members(
            &db_pool,
            &channels,
            updated.team_id,
            notification_titles::PROJECT_UPDATED,
            &format!("Project \"{}\" has been updated.", updated.name),
            NotificationType::Info,
        )
        .await
    };
    if let Err(e) = fan_out {
        tracing::error!("project update fan-out failed: {e}");
    }

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Project updated successfully!",
        updated,
    ))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(get_all_projects, create_project, update_project),
    components(schemas(Project, ProjectListItem, NewProject, UpdateProject, ProjectStatus)),
    tags(
        (name = "Projects", description = "Project Management Endpoints")
    )
)]
pub struct ProjectDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn project_validation_accumulates_field_errors() {
        let start = NaiveDate::from_ymd_opt(2026, 4, 2);
        let due = NaiveDate::from_ymd_opt(2026, 4, 1);
        let errors = validate_project_fields("", start, due);
        assert!(!errors.is_empty());

        let value = serde_json::to_value(&errors.into_error()).unwrap();
        assert!(value["errors"]["name"][0]
            .as_str()
            .unwrap()
            .contains("required"));
        assert!(value["errors"]["due_date"][0]
            .as_str()
            .unwrap()
            .contains("after or equal"));
    }

    #[test]
    fn valid_project_fields_pass() {
        let errors = validate_project_fields("Apollo", None, None);
        assert!(errors.is_empty());
    }

    #[test]
    fn overlong_name_is_rejected() {
        let errors = validate_project_fields(&"x".repeat(256), None, None);
        assert!(!errors.is_empty());
    }
}
