use crate::db::queries::project::{create_project, get_all_projects, update_project};
use axum::{
    routing::{get, put},
    Router,
};
use sqlx::PgPool;

/// Register project management routes
pub fn project_routes() -> Router<PgPool> {
    Router::new()
        .route("/projects", get(get_all_projects).post(create_project))
        .route("/projects/{project_id}", put(update_project))
}
