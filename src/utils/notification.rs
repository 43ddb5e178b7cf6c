use sqlx::{FromRow, PgPool};

use crate::db::models::notification::NotificationType;
use crate::realtime::{UserChannels, UserEvent};

/// Result type for notification operations
pub type NotificationResult<T> = Result<T, NotificationError>;

/// Errors that can occur in notification operations
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Team {0} not found")]
    TeamNotFound(i32),
}

/// Titles used by the project fan-out sites.
pub mod notification_titles {
    pub const PROJECT_ASSIGNED: &str = "New Project Assigned";
    pub const PROJECT_REMOVED: &str = "Project Removed";
    pub const PROJECT_UPDATED: &str = "Project Updated";
}

#[derive(Debug, FromRow)]
struct Member {
    user_id: i32,
    name: String,
}

/// Fan a notification out to every member of a team.
///
/// Runs in two phases: persist one notification row per member, then publish
/// one realtime event per persisted row onto that member's private channel.
/// Row writes are independent statements; the first failure stops the
/// remaining writes and propagates without rolling back earlier rows. Event
/// delivery is fire-and-forget relative to the rows.
///
/// Returns the number of members notified.
pub async fn notify_team_members(
    pool: &PgPool,
    channels: &UserChannels,
    team_id: i32,
    title: &str,
    message: &str,
    severity: NotificationType,
) -> NotificationResult<usize> {
    let team_exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM teams WHERE id = $1)")
            .bind(team_id)
            .fetch_one(pool)
            .await?;
    if !team_exists {
        return Err(NotificationError::TeamNotFound(team_id));
    }

    let members: Vec<Member> = sqlx::query_as(
        "SELECT tu.user_id, u.name
         FROM team_users tu
         JOIN users u ON tu.user_id = u.id
         WHERE tu.team_id = $1
         ORDER BY tu.user_id",
    )
    .bind(team_id)
    .fetch_all(pool)
    .await?;

    for member in &members {
        sqlx::query(
            "INSERT INTO notifications (user_id, title, message, type) VALUES ($1, $2, $3, $4)",
        )
        .bind(member.user_id)
        .bind(title)
        .bind(message)
        .bind(severity)
        .execute(pool)
        .await?;
    }

    for member in &members {
        let receivers =
            channels.publish(UserEvent::new(member.user_id, member.name.clone(), message));
        if receivers == 0 {
            tracing::debug!(user_id = member.user_id, "no live subscriber for notification event");
        }
    }

    tracing::info!(team_id, title, count = members.len(), "team notification fan-out");
    Ok(members.len())
}
