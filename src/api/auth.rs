use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use bcrypt::{hash, verify, DEFAULT_COST};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{FromRow, PgPool};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::config::Config;
use crate::utils::api_response::ApiResponse;

/// Represents a request to register a new account.
#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct RegisterResponse {
    pub message: String,
}

/// JWT Claims used for authentication.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject - User ID as String
    pub sub: String,
    /// Display name of the authenticated user.
    pub name: String,
    /// Expiration timestamp (UNIX TIME)
    pub exp: usize,
}

impl Claims {
    /// Converts `sub` (user ID) to `i32`, or returns a descriptive error.
    pub fn user_id(&self) -> Result<i32, ApiResponse<()>> {
        self.sub.parse::<i32>().map_err(|_| {
            ApiResponse::error(
                StatusCode::BAD_REQUEST,
                "Invalid user ID format in token",
                None,
            )
        })
    }
}

#[derive(Serialize, Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub id: i32,
    pub name: String,
}

#[derive(Debug, FromRow)]
struct AuthUser {
    id: i32,
    name: String,
    password_hash: String,
    is_active: bool,
}

/// Handles user login.
///
/// # Returns
/// * `200 OK` - Returns a JWT token if authentication is successful.
/// * `401 Unauthorized` - If credentials are incorrect.
/// * `403 Forbidden` - If the account has been deactivated.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Authentication",
    request_body(
        content = LoginRequest,
        description = "User login details",
    ),
    responses(
        (status = 200, description = "Successful login", body = LoginResponse),
        (status = 401, description = "Invalid email or password"),
        (status = 403, description = "Account deactivated"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn login(
    State(pool): State<PgPool>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiResponse<()>> {
    let config = Config::get();

    let user: Option<AuthUser> = sqlx::query_as(
        "SELECT id, name, password_hash, is_active FROM users WHERE email = $1",
    )
    .bind(&payload.email)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        ApiResponse::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Database error",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let Some(user) = user else {
        warn!("Login attempt for unknown email: {}", payload.email);
        return Err(ApiResponse::error(
            StatusCode::UNAUTHORIZED,
            "Invalid email or password.",
            None,
        ));
    };

    if !user.is_active {
        warn!("Login attempt for deactivated account: {}", payload.email);
        return Err(ApiResponse::error(
            StatusCode::FORBIDDEN,
            "Account is deactivated. Contact your administrator.",
            None,
        ));
    }

    match verify(&payload.password, &user.password_hash) {
        Ok(true) => {
            let claims = Claims {
                sub: user.id.to_string(),
                name: user.name.clone(),
                exp: chrono::Utc::now().timestamp() as usize + 36000, // 10 hour expiration
            };
            let token = encode(
                &Header::default(),
                &claims,
                &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            )
            .map_err(|e| {
                ApiResponse::error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Token generation failed",
                    Some(json!({ "error": e.to_string() })),
                )
            })?;

            info!("Login successful for user: {}", payload.email);
            Ok(Json(LoginResponse {
                token,
                id: user.id,
                name: user.name,
            }))
        }
        Ok(false) => {
            warn!("Invalid password attempt for user: {}", payload.email);
            Err(ApiResponse::error(
                StatusCode::UNAUTHORIZED,
                "Invalid email or password.",
                None,
            ))
        }
        Err(e) => Err(ApiResponse::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Password verification error",
            Some(json!({ "error": e.to_string() })),
        )),
    }
}

/// Handles account registration. New accounts start without roles or
/// permissions; an administrator grants them afterwards.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    tag = "Authentication",
    responses(
        (status = 201, description = "Account registered", body = RegisterResponse),
        (status = 409, description = "Email already taken"),
        (status = 500, description = "Internal Server Error")
    )
)]
pub async fn register(
    State(pool): State<PgPool>,
    Json(payload): Json<RegisterRequest>,
) -> Result<ApiResponse<RegisterResponse>, ApiResponse<()>> {
    let password_hash = hash(&payload.password, DEFAULT_COST).map_err(|e| {
        ApiResponse::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Password hashing failed",
            Some(json!({ "error": e.to_string() })),
        )
    })?;

    let result = sqlx::query("INSERT INTO users (name, email, password_hash) VALUES ($1, $2, $3)")
        .bind(&payload.name)
        .bind(&payload.email)
        .bind(&password_hash)
        .execute(&pool)
        .await;

    match result {
        Ok(_) => Ok(ApiResponse::success(
            StatusCode::CREATED,
            "Account registered",
            RegisterResponse {
                message: "User registered".into(),
            },
        )),
        Err(e) => {
            if let Some(db_err) = e.as_database_error() {
                if db_err.code().map(|code| code == "23505").unwrap_or(false) {
                    return Err(ApiResponse::error(
                        StatusCode::CONFLICT,
                        "Email already taken",
                        None,
                    ));
                }
            }
            Err(ApiResponse::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to register account",
                Some(json!({ "error": e.to_string() })),
            ))
        }
    }
}

/// Register authentication routes
pub fn auth_routes() -> Router<PgPool> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
}

use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(login, register),
    components(schemas(LoginRequest, LoginResponse, RegisterRequest, RegisterResponse)),
    tags(
        (name = "Authentication", description = "Login and registration")
    )
)]
pub struct AuthDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_user_id_parses_subject() {
        let claims = Claims {
            sub: "42".to_string(),
            name: "Diane".to_string(),
            exp: 0,
        };
        assert_eq!(claims.user_id().unwrap(), 42);
    }

    #[test]
    fn claims_user_id_rejects_garbage_subject() {
        let claims = Claims {
            sub: "not-a-number".to_string(),
            name: "Diane".to_string(),
            exp: 0,
        };
        assert!(claims.user_id().is_err());
    }
}
