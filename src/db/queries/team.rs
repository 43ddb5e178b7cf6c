use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::api::auth::Claims;
use crate::config::Config;
use crate::db::models::team::{AssignTeamUsers, NewTeam, Team, TeamResponse, UpdateTeam};
use crate::db::models::user::UserInfo;
use crate::db::models::{total_pages, PaginationParams};
use crate::middleware::auth::UserPermissions;
use crate::utils::api_response::ApiResponse;
use crate::utils::validation::FieldErrors;

/// A user can be offered for assignment when they have no team at all, or
/// when this team is the only team they belong to.
const AVAILABLE_USERS_WHERE: &str = "NOT EXISTS (SELECT 1 FROM team_users tu WHERE tu.user_id = u.id)
    OR (
        EXISTS (SELECT 1 FROM team_users tu WHERE tu.user_id = u.id AND tu.team_id = $1)
        AND NOT EXISTS (SELECT 1 FROM team_users tu WHERE tu.user_id = u.id AND tu.team_id <> $1)
    )";

fn db_error(e: sqlx::Error) -> ApiResponse<()> {
    ApiResponse::error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Database error",
        Some(json!({ "error": e.to_string() })),
    )
}

/// Get all teams with pagination, newest first
#[utoipa::path(
    get,
    path = "/teams",
    params(
        PaginationParams
    ),
    responses(
        (status = 200, description = "List of teams retrieved successfully"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Teams",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_all_teams(
    State(db_pool): State<PgPool>,
    Query(params): Query<PaginationParams>,
) -> Result<ApiResponse<Value>, ApiResponse<()>> {
    let (page, limit, offset) = params.resolve(10);

    let total_count: i64 = sqlx::query_scalar("SELECT COUNT(id) FROM teams")
        .fetch_one(&db_pool)
        .await
        .map_err(|e| {
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to retrieve team count",
                Some(json!({ "error": e.to_string() })),
            )
        })?;

    let teams: Vec<TeamResponse> = sqlx::query_as(
        "SELECT t.id, t.name, t.created_by, u.name AS created_by_name, t.updated_at,
                COALESCE(ARRAY_AGG(tu.user_id) FILTER (WHERE tu.user_id IS NOT NULL), '{}') AS member_ids
         FROM teams t
         JOIN users u ON t.created_by = u.id
         LEFT JOIN team_users tu ON tu.team_id = t.id
         GROUP BY t.id, u.name
         ORDER BY t.created_at DESC, t.id DESC
         LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
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
        "Teams retrieved successfully",
        json!({
            "page": page,
            "limit": limit,
            "total_teams": total_count,
            "total_pages": total_pages(total_count, limit),
            "teams": teams
        }),
    ))
}

/// Assignable-user lookup for a team: the currently assigned ids plus the
/// paginated set of users available under the one-team exclusivity rule.
#[utoipa::path(
    get,
    path = "/teams/{team_id}/users",
    params(
        ("team_id" = i32, Path, description = "Team ID"),
        PaginationParams
    ),
    responses(
        (status = 200, description = "Assignable users retrieved successfully"),
        (status = 404, description = "Team not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Teams",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_team_users(
    State(db_pool): State<PgPool>,
    Path(team_id): Path<i32>,
    Query(params): Query<PaginationParams>,
) -> Result<ApiResponse<Value>, ApiResponse<()>> {
    let team_exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM teams WHERE id = $1)")
        .bind(team_id)
        .fetch_one(&db_pool)
        .await
        .map_err(db_error)?;
    if !team_exists {
        return Err(ApiResponse::error(StatusCode::NOT_FOUND, "Team not found", None));
    }

    let assigned_user_ids: Vec<i32> = sqlx::query_scalar(
        "SELECT user_id FROM team_users WHERE team_id = $1 ORDER BY user_id",
    )
    .bind(team_id)
    .fetch_all(&db_pool)
    .await
    .map_err(db_error)?;

    let (page, limit, offset) = params.resolve(20);

    let total_count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM users u WHERE {AVAILABLE_USERS_WHERE}"
    ))
    .bind(team_id)
    .fetch_one(&db_pool)
    .await
    .map_err(db_error)?;

    let users: Vec<UserInfo> = sqlx::query_as(&format!(
        "SELECT u.id, u.name, u.email FROM users u
         WHERE {AVAILABLE_USERS_WHERE}
         ORDER BY u.name
         LIMIT $2 OFFSET $3"
    ))
    .bind(team_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&db_pool)
    .await
    .map_err(db_error)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Assignable users retrieved successfully",
        json!({
            "assigned_user_ids": assigned_user_ids,
            "page": page,
            "limit": limit,
            "total_users": total_count,
            "total_pages": total_pages(total_count, limit),
            "users": users
        }),
    ))
}

/// Create a new team
#[utoipa::path(
    post,
    path = "/teams",
    request_body = NewTeam,
    responses(
        (status = 201, description = "Team created successfully", body = Team),
        (status = 403, description = "User lacks permission to create a team"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Teams",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn create_team(
    State(db_pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Extension(user_permissions): Extension<UserPermissions>,
    Json(payload): Json<NewTeam>,
) -> Result<ApiResponse<Team>, ApiResponse<()>> {
    if !user_permissions.can("create team") {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to create a team",
            None,
        ));
    }
    let actor_id = claims.user_id()?;

    let mut errors = FieldErrors::new();
    if payload.name.trim().is_empty() {
        errors.add("name", "The name field is required.");
    } else if payload.name.len() > 255 {
        errors.add("name", "The name may not be greater than 255 characters.");
    }
    if !errors.is_empty() {
        return Err(errors.into_error());
    }

    let team: Team = sqlx::query_as(
        "INSERT INTO teams (name, created_by, updated_by) VALUES ($1, $2, $2)
         RETURNING id, name, created_by, updated_by, created_at, updated_at",
    )
    .bind(&payload.name)
    .bind(actor_id)
    .fetch_one(&db_pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to create team",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    Ok(ApiResponse::success(
        StatusCode::CREATED,
        "Team created successfully!",
        team,
    ))
}

/// Update a team (both audit stamps track the acting user)
#[utoipa::path(
    put,
    path = "/teams/{team_id}",
    params(
        ("team_id" = i32, Path, description = "Team ID to update")
    ),
    request_body = UpdateTeam,
    responses(
        (status = 200, description = "Team updated successfully"),
        (status = 403, description = "User lacks permission to update the team"),
        (status = 404, description = "Team not found"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Teams",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn update_team(
    State(db_pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Extension(user_permissions): Extension<UserPermissions>,
    Path(team_id): Path<i32>,
    Json(payload): Json<UpdateTeam>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    if !user_permissions.can("update team") {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to update this team",
            None,
        ));
    }
    let actor_id = claims.user_id()?;

    let mut errors = FieldErrors::new();
    if payload.name.trim().is_empty() {
        errors.add("name", "The name field is required.");
    } else if payload.name.len() > 255 {
        errors.add("name", "The name may not be greater than 255 characters.");
    }
    if !errors.is_empty() {
        return Err(errors.into_error());
    }

    let result = sqlx::query(
        "UPDATE teams SET name = $1, created_by = $2, updated_by = $2, updated_at = NOW()
         WHERE id = $3",
    )
    .bind(&payload.name)
    .bind(actor_id)
    .bind(team_id)
    .execute(&db_pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to update team",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    if result.rows_affected() == 0 {
        return Err(ApiResponse::error(StatusCode::NOT_FOUND, "Team not found", None));
    }
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Team updated successfully!",
        (),
    ))
}

/// Replace a team's membership set
#[utoipa::path(
    post,
    path = "/teams/assign-users",
    request_body = AssignTeamUsers,
    responses(
        (status = 200, description = "Team members updated"),
        (status = 403, description = "User lacks permission to assign users"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Teams",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn assign_team_users(
    State(db_pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Json(payload): Json<AssignTeamUsers>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    if !user_permissions.can("assign users") {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to assign users",
            None,
        ));
    }

    let mut errors = FieldErrors::new();

    let team_exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM teams WHERE id = $1)")
        .bind(payload.team_id)
        .fetch_one(&db_pool)
        .await
        .map_err(db_error)?;
    if !team_exists {
        errors.add("team_id", "The selected team is invalid.");
    }

    let known_users: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE id = ANY($1)")
            .bind(&payload.selected_users)
            .fetch_one(&db_pool)
            .await
            .map_err(db_error)?;
    if known_users != payload.selected_users.len() as i64 {
        errors.add("selected_users", "One or more selected users are invalid.");
    }

    // The one-team-per-user rule is only a read-side filter unless the
    // deployment promotes it to a write-time check.
    if Config::enforce_single_team() {
        let conflicting: Vec<i32> = sqlx::query_scalar(
            "SELECT DISTINCT user_id FROM team_users
             WHERE user_id = ANY($1) AND team_id <> $2
             ORDER BY user_id",
        )
        .bind(&payload.selected_users)
        .bind(payload.team_id)
        .fetch_all(&db_pool)
        .await
        .map_err(db_error)?;
        for user_id in conflicting {
            errors.add(
                "selected_users",
                format!("User {user_id} already belongs to another team."),
            );
        }
    }

    if !errors.is_empty() {
        return Err(errors.into_error());
    }

    let mut tx = db_pool.begin().await.map_err(db_error)?;

    sqlx::query("DELETE FROM team_users WHERE team_id = $1 AND NOT (user_id = ANY($2))")
        .bind(payload.team_id)
        .bind(&payload.selected_users)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

    sqlx::query(
        "INSERT INTO team_users (team_id, user_id)
         SELECT $1, member FROM UNNEST($2::int4[]) AS member
         ON CONFLICT DO NOTHING",
    )
    .bind(payload.team_id)
    .bind(&payload.selected_users)
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;

    tx.commit().await.map_err(db_error)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Team members have been updated!",
        (),
    ))
}

/// Delete a team: members are detached, projects (and their tasks and lanes)
/// cascade away.
#[utoipa::path(
    delete,
    path = "/teams/{team_id}",
    params(
        ("team_id" = i32, Path, description = "Team ID to delete")
    ),
    responses(
        (status = 200, description = "Team deleted successfully"),
        (status = 403, description = "User lacks permission to delete the team"),
        (status = 404, description = "Team not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Teams",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn delete_team(
    State(db_pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Path(team_id): Path<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    if !user_permissions.can("delete team") {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to delete this team",
            None,
        ));
    }

    let mut tx = db_pool.begin().await.map_err(db_error)?;

    sqlx::query("DELETE FROM team_users WHERE team_id = $1")
        .bind(team_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

    let result = sqlx::query("DELETE FROM teams WHERE id = $1")
        .bind(team_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

    if result.rows_affected() == 0 {
        return Err(ApiResponse::error(StatusCode::NOT_FOUND, "Team not found", None));
    }

    tx.commit().await.map_err(db_error)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Team deleted successfully.",
        (),
    ))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        get_all_teams,
        get_team_users,
        create_team,
        update_team,
        assign_team_users,
        delete_team,
    ),
    components(schemas(Team, TeamResponse, NewTeam, UpdateTeam, AssignTeamUsers)),
    tags(
        (name = "Teams", description = "Team Management Endpoints")
    )
)]
pub struct TeamDoc;
