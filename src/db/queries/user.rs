use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use bcrypt::{hash, DEFAULT_COST};
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::db::models::user::{
    AssignPermissions, AssignRoles, ChangePassword, NewUser, UpdateUser, UserResponse,
};
use crate::db::models::{total_pages, PaginationParams};
use crate::middleware::auth::{PermissionCache, UserPermissions};
use crate::utils::api_response::ApiResponse;
use crate::utils::validation::FieldErrors;

fn db_error(e: sqlx::Error) -> ApiResponse<()> {
    ApiResponse::error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Database error",
        Some(json!({ "error": e.to_string() })),
    )
}

async fn user_exists(pool: &PgPool, user_id: i32) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
        .bind(user_id)
        .fetch_one(pool)
        .await
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    }
}

/// Get all users with their roles and direct permissions, plus the full
/// role/permission vocabulary for the assignment dialogs.
#[utoipa::path(
    get,
    path = "/users",
    params(
        PaginationParams
    ),
    responses(
        (status = 200, description = "List of users retrieved successfully"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Users",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_all_users(
    State(db_pool): State<PgPool>,
    Query(params): Query<PaginationParams>,
) -> Result<ApiResponse<Value>, ApiResponse<()>> {
    let (page, limit, offset) = params.resolve(10);

    let total_count: i64 = sqlx::query_scalar("SELECT COUNT(id) FROM users")
        .fetch_one(&db_pool)
        .await
        .map_err(db_error)?;

    let users: Vec<UserResponse> = sqlx::query_as(
        "SELECT u.id, u.name, u.email, u.is_active,
                COALESCE(ARRAY_AGG(DISTINCT r.name) FILTER (WHERE r.name IS NOT NULL), '{}') AS roles,
                COALESCE(ARRAY_AGG(DISTINCT p.name) FILTER (WHERE p.name IS NOT NULL), '{}') AS permissions
         FROM users u
         LEFT JOIN user_roles ur ON ur.user_id = u.id
         LEFT JOIN roles r ON r.id = ur.role_id
         LEFT JOIN user_permissions up ON up.user_id = u.id
         LEFT JOIN permissions p ON p.id = up.permission_id
         GROUP BY u.id
         ORDER BY u.name
         LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(&db_pool)
    .await
    .map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to retrieve users",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let all_roles: Vec<String> = sqlx::query_scalar("SELECT name FROM roles ORDER BY name")
        .fetch_all(&db_pool)
        .await
        .map_err(db_error)?;
    let all_permissions: Vec<String> =
        sqlx::query_scalar("SELECT name FROM permissions ORDER BY name")
            .fetch_all(&db_pool)
            .await
            .map_err(db_error)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Users retrieved successfully",
        json!({
            "page": page,
            "limit": limit,
            "total_users": total_count,
            "total_pages": total_pages(total_count, limit),
            "users": users,
            "all_roles": all_roles,
            "all_permissions": all_permissions
        }),
    ))
}

/// Create a new user
#[utoipa::path(
    post,
    path = "/users",
    request_body = NewUser,
    responses(
        (status = 201, description = "User created successfully", body = i32),
        (status = 403, description = "User lacks permission to create users"),
        (status = 409, description = "Email already taken"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Users",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn create_user(
    State(db_pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Json(payload): Json<NewUser>,
) -> Result<ApiResponse<i32>, ApiResponse<()>> {
    if !user_permissions.can("create user") {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to create users",
            None,
        ));
    }

    let mut errors = FieldErrors::new();
    if payload.name.trim().is_empty() {
        errors.add("name", "The name field is required.");
    } else if payload.name.len() > 255 {
        errors.add("name", "The name may not be greater than 255 characters.");
    }
    if !looks_like_email(&payload.email) {
        errors.add("email", "The email must be a valid email address.");
    } else {
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
                .bind(&payload.email)
                .fetch_one(&db_pool)
                .await
                .map_err(db_error)?;
        if taken {
            errors.add("email", "The email has already been taken.");
        }
    }
    if payload.password.len() < 8 {
        errors.add("password", "The password must be at least 8 characters.");
    }
    if !errors.is_empty() {
        return Err(errors.into_error());
    }

    let password_hash = hash(&payload.password, DEFAULT_COST).map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Password hashing failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let result = sqlx::query_scalar::<_, i32>(
        "INSERT INTO users (name, email, password_hash, is_active) VALUES ($1, $2, $3, TRUE)
         RETURNING id",
    )
    .bind(&payload.name)
    .bind(&payload.email)
    .bind(&password_hash)
    .fetch_one(&db_pool)
    .await;

    match result {
        Ok(id) => Ok(ApiResponse::success(
            StatusCode::CREATED,
            "User created successfully!",
            id,
        )),
        Err(e) => {
            if let sqlx::Error::Database(ref db_err) = e {
                // Unique-email race between the pre-check and the insert.
                if db_err.code().map(|code| code == "23505").unwrap_or(false) {
                    return Err(ApiResponse::error(
                        StatusCode::CONFLICT,
                        "The email has already been taken.",
                        None,
                    ));
                }
            }
            Err(ApiResponse::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create user",
                Some(json!({ "error": e.to_string() })),
            ))
        }
    }
}

/// Update a user's profile
#[utoipa::path(
    put,
    path = "/users/{user_id}",
    params(
        ("user_id" = i32, Path, description = "User ID to update")
    ),
    request_body = UpdateUser,
    responses(
        (status = 200, description = "User updated successfully"),
        (status = 403, description = "User lacks permission to update users"),
        (status = 404, description = "User not found"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Users",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn update_user(
    State(db_pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Path(user_id): Path<i32>,
    Json(payload): Json<UpdateUser>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    if !user_permissions.can("update user") {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to update users",
            None,
        ));
    }

    let mut errors = FieldErrors::new();
    if payload.name.trim().is_empty() {
        errors.add("name", "The name field is required.");
    } else if payload.name.len() > 255 {
        errors.add("name", "The name may not be greater than 255 characters.");
    }
    if !looks_like_email(&payload.email) {
        errors.add("email", "The email must be a valid email address.");
    } else {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE email = $1 AND id <> $2)",
        )
        .bind(&payload.email)
        .bind(user_id)
        .fetch_one(&db_pool)
        .await
        .map_err(db_error)?;
        if taken {
            errors.add("email", "The email has already been taken.");
        }
    }
    if !errors.is_empty() {
        return Err(errors.into_error());
    }

    let result = sqlx::query(
        "UPDATE users SET name = $1, email = $2, is_active = $3, updated_at = NOW() WHERE id = $4",
    )
    .bind(&payload.name)
    .bind(&payload.email)
    .bind(payload.is_active)
    .bind(user_id)
    .execute(&db_pool)
    .await
    .map_err(db_error)?;

    if result.rows_affected() == 0 {
        return Err(ApiResponse::error(StatusCode::NOT_FOUND, "User not found", None));
    }
    Ok(ApiResponse::success(
        StatusCode::OK,
        "User updated successfully!",
        (),
    ))
}

/// Change a user's password (confirmed, minimum 8 characters)
#[utoipa::path(
    put,
    path = "/users/{user_id}/change-password",
    params(
        ("user_id" = i32, Path, description = "User ID")
    ),
    request_body = ChangePassword,
    responses(
        (status = 200, description = "Password updated successfully"),
        (status = 403, description = "User lacks permission to change passwords"),
        (status = 404, description = "User not found"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Users",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn change_password(
    State(db_pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Path(user_id): Path<i32>,
    Json(payload): Json<ChangePassword>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    if !user_permissions.can("change password") {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to change passwords",
            None,
        ));
    }

    let mut errors = FieldErrors::new();
    if payload.password.len() < 8 {
        errors.add("password", "The password must be at least 8 characters.");
    }
    if payload.password != payload.password_confirmation {
        errors.add("password", "The password confirmation does not match.");
    }
    if !errors.is_empty() {
        return Err(errors.into_error());
    }

    let password_hash = hash(&payload.password, DEFAULT_COST).map_err(|e| {
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Password hashing failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let result = sqlx::query("UPDATE users SET password_hash = $1, updated_at = NOW() WHERE id = $2")
        .bind(&password_hash)
        .bind(user_id)
        .execute(&db_pool)
        .await
        .map_err(db_error)?;

    if result.rows_affected() == 0 {
        return Err(ApiResponse::error(StatusCode::NOT_FOUND, "User not found", None));
    }
    Ok(ApiResponse::success(
        StatusCode::OK,
        "Password updated successfully!",
        (),
    ))
}

/// Delete a user: team memberships are detached first
#[utoipa::path(
    delete,
    path = "/users/{user_id}",
    params(
        ("user_id" = i32, Path, description = "User ID to delete")
    ),
    responses(
        (status = 200, description = "User deleted successfully"),
        (status = 403, description = "User lacks permission to delete users"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Users",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn delete_user(
    State(db_pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Extension(permission_cache): Extension<PermissionCache>,
    Path(user_id): Path<i32>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    if !user_permissions.can("delete user") {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to delete users",
            None,
        ));
    }

    let mut tx = db_pool.begin().await.map_err(db_error)?;

    sqlx::query("DELETE FROM team_users WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

    if result.rows_affected() == 0 {
        return Err(ApiResponse::error(StatusCode::NOT_FOUND, "User not found", None));
    }

    tx.commit().await.map_err(db_error)?;
    permission_cache.invalidate(&user_id);

    Ok(ApiResponse::success(
        StatusCode::OK,
        "User deleted successfully.",
        (),
    ))
}

/// Role names and direct permission names for one user
#[utoipa::path(
    get,
    path = "/users/{user_id}/permissions",
    params(
        ("user_id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Permissions retrieved successfully"),
        (status = 404, description = "User not found"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Users",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn get_user_permissions(
    State(db_pool): State<PgPool>,
    Path(user_id): Path<i32>,
) -> Result<ApiResponse<Value>, ApiResponse<()>> {
    if !user_exists(&db_pool, user_id).await.map_err(db_error)? {
        return Err(ApiResponse::error(StatusCode::NOT_FOUND, "User not found", None));
    }

    let roles: Vec<String> = sqlx::query_scalar(
        "SELECT r.name FROM roles r JOIN user_roles ur ON r.id = ur.role_id
         WHERE ur.user_id = $1 ORDER BY r.name",
    )
    .bind(user_id)
    .fetch_all(&db_pool)
    .await
    .map_err(db_error)?;

    let permissions: Vec<String> = sqlx::query_scalar(
        "SELECT p.name FROM permissions p JOIN user_permissions up ON p.id = up.permission_id
         WHERE up.user_id = $1 ORDER BY p.name",
    )
    .bind(user_id)
    .fetch_all(&db_pool)
    .await
    .map_err(db_error)?;

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Permissions retrieved successfully",
        json!({ "roles": roles, "permissions": permissions }),
    ))
}

/// Replace a user's direct permission set
#[utoipa::path(
    post,
    path = "/users/{user_id}/assign-permissions",
    params(
        ("user_id" = i32, Path, description = "User ID")
    ),
    request_body = AssignPermissions,
    responses(
        (status = 200, description = "Permissions updated successfully"),
        (status = 403, description = "User lacks permission to assign permissions"),
        (status = 404, description = "User not found"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Users",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn assign_permissions(
    State(db_pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Extension(permission_cache): Extension<PermissionCache>,
    Path(user_id): Path<i32>,
    Json(payload): Json<AssignPermissions>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    if !user_permissions.can("assign permissions") {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to assign permissions",
            None,
        ));
    }
    if !user_exists(&db_pool, user_id).await.map_err(db_error)? {
        return Err(ApiResponse::error(StatusCode::NOT_FOUND, "User not found", None));
    }

    let known: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM permissions WHERE name = ANY($1)")
        .bind(&payload.permissions)
        .fetch_one(&db_pool)
        .await
        .map_err(db_error)?;
    if known != payload.permissions.len() as i64 {
        let mut errors = FieldErrors::new();
        errors.add("permissions", "One or more selected permissions are invalid.");
        return Err(errors.into_error());
    }

    let mut tx = db_pool.begin().await.map_err(db_error)?;
    sqlx::query("DELETE FROM user_permissions WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
    sqlx::query(
        "INSERT INTO user_permissions (user_id, permission_id)
         SELECT $1, id FROM permissions WHERE name = ANY($2)",
    )
    .bind(user_id)
    .bind(&payload.permissions)
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;
    tx.commit().await.map_err(db_error)?;

    // The grant takes effect on the user's next request.
    permission_cache.invalidate(&user_id);

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Permissions updated successfully!",
        (),
    ))
}

/// Replace a user's role set
#[utoipa::path(
    post,
    path = "/users/{user_id}/assign-roles",
    params(
        ("user_id" = i32, Path, description = "User ID")
    ),
    request_body = AssignRoles,
    responses(
        (status = 200, description = "Roles updated successfully"),
        (status = 403, description = "User lacks permission to assign roles"),
        (status = 404, description = "User not found"),
        (status = 422, description = "Validation failed"),
        (status = 500, description = "Internal server error")
    ),
    tag = "Users",
    security(
        ("bearerAuth" = [])
    )
)]
pub async fn assign_roles(
    State(db_pool): State<PgPool>,
    Extension(user_permissions): Extension<UserPermissions>,
    Extension(permission_cache): Extension<PermissionCache>,
    Path(user_id): Path<i32>,
    Json(payload): Json<AssignRoles>,
) -> Result<ApiResponse<()>, ApiResponse<()>> {
    if !user_permissions.can("assign permissions") {
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "You don't have permission to assign roles",
            None,
        ));
    }
    if !user_exists(&db_pool, user_id).await.map_err(db_error)? {
        return Err(ApiResponse::error(StatusCode::NOT_FOUND, "User not found", None));
    }

    let known: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM roles WHERE name = ANY($1)")
        .bind(&payload.roles)
        .fetch_one(&db_pool)
        .await
        .map_err(db_error)?;
    if known != payload.roles.len() as i64 {
        let mut errors = FieldErrors::new();
        errors.add("roles", "One or more selected roles are invalid.");
        return Err(errors.into_error());
    }

    let mut tx = db_pool.begin().await.map_err(db_error)?;
    sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;
    sqlx::query(
        "INSERT INTO user_roles (user_id, role_id)
         SELECT $1, id FROM roles WHERE name = ANY($2)",
    )
    .bind(user_id)
    .bind(&payload.roles)
    .execute(&mut *tx)
    .await
    .map_err(db_error)?;
    tx.commit().await.map_err(db_error)?;

    permission_cache.invalidate(&user_id);

    Ok(ApiResponse::success(
        StatusCode::OK,
        "Roles updated successfully!",
        (),
    ))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        get_all_users,
        create_user,
        update_user,
        change_password,
        delete_user,
        get_user_permissions,
        assign_permissions,
        assign_roles,
    ),
    components(schemas(UserResponse, NewUser, UpdateUser, ChangePassword, AssignPermissions, AssignRoles)),
    tags(
        (name = "Users", description = "User Management Endpoints")
    )
)]
pub struct UserDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shape_check() {
        assert!(looks_like_email("diane@test.com"));
        assert!(looks_like_email("a@b.co"));
        assert!(!looks_like_email("diane"));
        assert!(!looks_like_email("@test.com"));
        assert!(!looks_like_email("diane@localhost"));
    }
}
