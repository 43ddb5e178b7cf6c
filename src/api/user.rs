use crate::db::queries::user::{
    assign_permissions, assign_roles, change_password, create_user, delete_user, get_all_users,
    get_user_permissions, update_user,
};
use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;

/// Register user management routes
pub fn user_routes() -> Router<PgPool> {
    Router::new()
        .route("/users", get(get_all_users).post(create_user))
        .route("/users/{user_id}", put(update_user).delete(delete_user))
        .route("/users/{user_id}/change-password", put(change_password))
        .route("/users/{user_id}/permissions", get(get_user_permissions))
        .route("/users/{user_id}/assign-permissions", post(assign_permissions))
        .route("/users/{user_id}/assign-roles", post(assign_roles))
}
