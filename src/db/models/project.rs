use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "project_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Planning,
    Ongoing,
    OnHold,
    Completed,
    Cancelled,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Project {
    pub id: i32,
    pub team_id: i32,
    pub owner_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

/// Project row joined with its owner and team names for the list screen.
#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ProjectListItem {
    pub id: i32,
    pub team_id: i32,
    pub owner_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub owner_name: String,
    pub team_name: String,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewProject {
    pub team_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

/// Same shape as `NewProject`: team and name stay required on update, the
/// rest falls back to the stored value when absent (description excepted,
/// which is overwritten as submitted).
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProject {
    pub team_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub status: Option<ProjectStatus>,
    pub start_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
}

/// Due date must not precede the start date when both are present.
pub fn dates_in_order(start_date: Option<NaiveDate>, due_date: Option<NaiveDate>) -> bool {
    match (start_date, due_date) {
        (Some(start), Some(due)) => due >= start,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ProjectStatus::OnHold).unwrap(),
            "\"on_hold\""
        );
        assert_eq!(
            serde_json::from_str::<ProjectStatus>("\"planning\"").unwrap(),
            ProjectStatus::Planning
        );
    }

    #[test]
    fn due_date_must_not_precede_start_date() {
        assert!(dates_in_order(
            Some(date(2026, 3, 1)),
            Some(date(2026, 3, 31))
        ));
        assert!(dates_in_order(Some(date(2026, 3, 1)), Some(date(2026, 3, 1))));
        assert!(!dates_in_order(
            Some(date(2026, 3, 31)),
            Some(date(2026, 3, 1))
        ));
    }

    #[test]
    fn missing_dates_pass() {
        assert!(dates_in_order(None, None));
        assert!(dates_in_order(Some(date(2026, 3, 1)), None));
        assert!(dates_in_order(None, Some(date(2026, 3, 1))));
    }
}
