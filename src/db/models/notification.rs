use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Severity of a notification as rendered by the client.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Info,
    Success,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Notification {
    pub id: i32,
    pub user_id: i32,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub type_field: NotificationType,
    pub read_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct NotificationCountResponse {
    pub total: i64,
    pub unread: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&NotificationType::Success).unwrap(),
            "\"success\""
        );
        assert_eq!(
            serde_json::from_str::<NotificationType>("\"warning\"").unwrap(),
            NotificationType::Warning
        );
    }

    #[test]
    fn type_field_round_trips_as_type() {
        let notification = Notification {
            id: 1,
            user_id: 2,
            title: "New Project Assigned".into(),
            message: "You have been assigned to a new project: Apollo".into(),
            type_field: NotificationType::Success,
            read_at: None,
            created_at: chrono::NaiveDateTime::parse_from_str(
                "2026-03-01 12:00:00",
                "%Y-%m-%d %H:%M:%S",
            )
            .unwrap(),
        };
        let value = serde_json::to_value(&notification).unwrap();
        assert_eq!(value["type"], "success");
        assert!(value.get("type_field").is_none());
    }
}
