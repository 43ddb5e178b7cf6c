use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Deserialize, ToSchema)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String, // Raw password, will be hashed
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateUser {
    pub name: String,
    pub email: String,
    pub is_active: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePassword {
    pub password: String,
    pub password_confirmation: String,
}

/// User as shown in the management screen: profile plus role and direct
/// permission names.
#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub is_active: bool,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserInfo {
    pub id: i32,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignPermissions {
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignRoles {
    #[serde(default)]
    pub roles: Vec<String>,
}
