use crate::db::queries::team::{
    assign_team_users, create_team, delete_team, get_all_teams, get_team_users, update_team,
};
use axum::{
    routing::{get, post, put},
    Router,
};
use sqlx::PgPool;

/// Register team management routes
pub fn team_routes() -> Router<PgPool> {
    Router::new()
        .route("/teams", get(get_all_teams).post(create_team))
        .route("/teams/assign-users", post(assign_team_users))
        .route("/teams/{team_id}", put(update_team).delete(delete_team))
        .route("/teams/{team_id}/users", get(get_team_users))
}
