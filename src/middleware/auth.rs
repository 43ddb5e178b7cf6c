use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{Extension, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use tracing::error;

use crate::api::auth::Claims;
use crate::config::Config;
use crate::utils::api_response::ApiResponse;

/// Per-user effective permission cache
pub type PermissionCache = Arc<Cache<i32, UserPermissions>>;

/// Initialize the permission cache (entries expire after 10 minutes; role or
/// permission mutations invalidate eagerly)
pub fn create_permission_cache() -> PermissionCache {
    Arc::new(
        Cache::builder()
            .time_to_live(Duration::from_secs(600))
            .build(),
    )
}

/// **JWT Middleware** (Handles Token Authentication)
pub async fn jwt_middleware(mut req: Request<Body>, next: Next) -> Result<Response, Response> {
    let auth_header = req.headers().get("Authorization").ok_or_else(|| {
        ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "Missing Authorization header", None)
            .into_response()
    })?;

    let token_str = auth_header.to_str().map_err(|_| {
        ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Invalid Authorization header format",
            None,
        )
        .into_response()
    })?;

    let token = token_str.strip_prefix("Bearer ").ok_or_else(|| {
        ApiResponse::<()>::error(
            StatusCode::BAD_REQUEST,
            "Invalid token format (missing 'Bearer ' prefix)",
            None,
        )
        .into_response()
    })?;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(Config::get().jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| {
        tracing::warn!("JWT decoding failed: {:?}", e);
        ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Invalid token",
            Some(json!({ "error": e.to_string() })),
        )
        .into_response()
    })?;

    req.extensions_mut().insert(token_data.claims);
    Ok(next.run(req).await)
}

/// Effective authorization state for one user: role names plus the flattened
/// permission set (direct grants and grants inherited through roles).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserPermissions {
    pub user_id: i32,
    pub roles: Vec<String>,
    pub permissions: HashSet<String>,
}

impl UserPermissions {
    /// Check a route-level permission name, e.g. `can("create project")`.
    pub fn can(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// **Permission Middleware**: loads the caller's effective permissions into
/// a request extension, consulting the cache first.
pub async fn permission_middleware(
    State(db_pool): State<PgPool>,
    Extension(permission_cache): Extension<PermissionCache>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    let claims = req.extensions().get::<Claims>().cloned().ok_or_else(|| {
        error!("Missing JWT claims in request");
        ApiResponse::<()>::error(StatusCode::UNAUTHORIZED, "Missing JWT claims in request", None)
            .into_response()
    })?;

    let user_id: i32 = claims.sub.parse().map_err(|_| {
        error!("Invalid user ID format in JWT claims");
        ApiResponse::<()>::error(
            StatusCode::UNAUTHORIZED,
            "Invalid user ID format in JWT claims",
            None,
        )
        .into_response()
    })?;

    if let Some(cached_permissions) = permission_cache.get(&user_id) {
        req.extensions_mut().insert(cached_permissions);
        return Ok(next.run(req).await);
    }

    let user_permissions = match fetch_permissions_from_db(user_id, &db_pool).await {
        Ok(permissions) => permissions,
        Err(err) => {
            error!("Failed to load user permissions: {:?}", err);
            return Err(ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load user permissions",
                Some(json!({ "error": err.to_string() })),
            )
            .into_response());
        }
    };

    permission_cache.insert(user_id, user_permissions.clone());
    req.extensions_mut().insert(user_permissions);
    Ok(next.run(req).await)
}

/// Query the role names and the flattened permission set for a user.
pub async fn fetch_permissions_from_db(
    user_id: i32,
    pool: &PgPool,
) -> Result<UserPermissions, sqlx::Error> {
    let roles: Vec<String> = sqlx::query_scalar(
        "SELECT r.name FROM roles r
         JOIN user_roles ur ON r.id = ur.role_id
         WHERE ur.user_id = $1
         ORDER BY r.name",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let permissions: Vec<String> = sqlx::query_scalar(
        "SELECT p.name FROM permissions p
         JOIN user_permissions up ON p.id = up.permission_id
         WHERE up.user_id = $1
         UNION
         SELECT p.name FROM permissions p
         JOIN role_permissions rp ON p.id = rp.permission_id
         JOIN user_roles ur ON rp.role_id = ur.role_id
         WHERE ur.user_id = $1",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(UserPermissions {
        user_id,
        roles,
        permissions: permissions.into_iter().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn permissions(names: &[&str]) -> UserPermissions {
        UserPermissions {
            user_id: 1,
            roles: vec!["Member".to_string()],
            permissions: names.iter().map(|n| n.to_string()).collect(),
        }
    }

    #[test]
    fn can_checks_exact_permission_names() {
        let perms = permissions(&["create project", "view project"]);
        assert!(perms.can("create project"));
        assert!(perms.can("view project"));
        assert!(!perms.can("delete project"));
        assert!(!perms.can("create"));
    }

    #[test]
    fn has_role_matches_exactly() {
        let perms = permissions(&[]);
        assert!(perms.has_role("Member"));
        assert!(!perms.has_role("Project Manager"));
    }

    #[test]
    fn cache_returns_inserted_permissions_until_invalidated() {
        let cache = create_permission_cache();
        cache.insert(7, permissions(&["assign users"]));

        assert!(cache.get(&7).unwrap().can("assign users"));

        cache.invalidate(&7);
        assert!(cache.get(&7).is_none());
    }
}
