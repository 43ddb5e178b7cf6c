use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Team {
    pub id: i32,
    pub name: String,
    pub created_by: i32,
    pub updated_by: i32,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NewTeam {
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateTeam {
    pub name: String,
}

/// Team as listed in the management screen: creator name plus the ids of the
/// currently assigned members.
#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct TeamResponse {
    pub id: i32,
    pub name: String,
    pub created_by: i32,
    pub created_by_name: String,
    pub updated_at: Option<NaiveDateTime>,
    pub member_ids: Vec<i32>,
}

/// Replace a team's membership set with `selected_users`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignTeamUsers {
    pub team_id: i32,
    #[serde(default)]
    pub selected_users: Vec<i32>,
}
