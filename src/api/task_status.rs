use crate::db::queries::task_status::{
    create_task_status, delete_task_status, update_task_status,
};
use axum::{
    routing::{post, put},
    Router,
};
use sqlx::PgPool;

/// Register kanban lane routes
pub fn task_status_routes() -> Router<PgPool> {
    Router::new()
        .route(
            "/projects/{project_id}/task-statuses",
            post(create_task_status),
        )
        .route(
            "/projects/{project_id}/task-statuses/{status_id}",
            put(update_task_status).delete(delete_task_status),
        )
}
