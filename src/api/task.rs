use crate::db::queries::task::{
    create_task, delete_task, get_project_tasks, move_task, update_task,
};
use axum::{
    routing::{get, put},
    Router,
};
use sqlx::PgPool;

/// Register task routes (board, CRUD, drag-and-drop moves)
pub fn task_routes() -> Router<PgPool> {
    Router::new()
        .route(
            "/projects/{project_id}/tasks",
            get(get_project_tasks).post(create_task),
        )
        .route(
            "/projects/{project_id}/tasks/{task_id}",
            put(update_task).delete(delete_task),
        )
        .route(
            "/projects/{project_id}/tasks/{task_id}/status",
            put(move_task),
        )
}
