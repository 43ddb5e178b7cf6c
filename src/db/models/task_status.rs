use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::db::models::task::Task;

/// One kanban lane within a project.
#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TaskStatus {
    pub id: i32,
    pub project_id: i32,
    pub name: String,
    pub color: String,
    pub order: i32,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewTaskStatus {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateTaskStatus {
    pub name: Option<String>,
    pub color: Option<String>,
    pub order: Option<i32>,
}

/// Lane plus its tasks, as rendered on the board.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusColumn {
    pub id: i32,
    pub project_id: i32,
    pub name: String,
    pub color: String,
    pub order: i32,
    pub tasks: Vec<Task>,
}

impl StatusColumn {
    pub fn from_status(status: TaskStatus) -> Self {
        Self {
            id: status.id,
            project_id: status.project_id,
            name: status.name,
            color: status.color,
            order: status.order,
            tasks: Vec::new(),
        }
    }
}
