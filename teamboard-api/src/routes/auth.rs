/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /auth/register` - Create an account and start a session
/// - `POST /auth/login` - Start a session
/// - `POST /auth/refresh` - Exchange a refresh token for an access token
/// - `POST /auth/logout` - Clear the session cookie
/// - `GET /auth/me` - Current user
///
/// Register and login return the token pair in the body and also set the
/// access token as an `HttpOnly` `token` cookie, so browsers need not store
/// it themselves.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use teamboard_shared::{
    auth::{
        jwt::{self, TokenPair, TokenType},
        middleware::{AuthContext, TOKEN_COOKIE},
        password,
    },
    models::user::{CreateUser, User},
};
use validator::Validate;

/// Register request
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1 to 100 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Checked by [`password::validate_password`]
    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

/// Session response for register and login
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: User,

    #[serde(flatten)]
    pub tokens: TokenPair,
}

/// Refresh token request
#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Refresh token response
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

/// `Set-Cookie` value carrying `token`, or clearing it when `token` is empty
pub fn session_cookie(token: &str, secure: bool) -> String {
    let max_age = if token.is_empty() {
        0
    } else {
        TokenType::Access.default_expiration().num_seconds()
    };

    let mut cookie = format!("{TOKEN_COOKIE}={token}; HttpOnly; Path=/; SameSite=Lax; Max-Age={max_age}");
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

fn start_session(state: &AppState, user: User) -> ApiResult<impl IntoResponse> {
    let tokens = jwt::issue_token_pair(user.id, &user.email, state.jwt_secret())?;
    let cookie = session_cookie(&tokens.access_token, state.config.api.cookie_secure);

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(SessionResponse { user, tokens }),
    ))
}

/// Register a new user
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Validation failed
/// - `409 Conflict`: Email already exists
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;
    if req.name.trim().is_empty() {
        return Err(ApiError::ValidationError(vec![
            crate::error::ValidationErrorDetail::new("name", "Name is required"),
        ]));
    }
    password::validate_password(&req.password)?;

    let password_hash = password::hash_password(&req.password)?;

    let user = User::create(
        &state.db,
        CreateUser {
            email: req.email,
            password_hash,
            name: req.name,
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, "User registered");

    start_session(&state, user)
}

/// Login endpoint
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Validation failed
/// - `401 Unauthorized`: Invalid credentials
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    req.validate()?;

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Invalid email or password".to_string()))?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        return Err(ApiError::Unauthorized("Invalid email or password".to_string()));
    }

    User::update_last_login(&state.db, user.id).await?;

    tracing::info!(user_id = %user.id, "User logged in");

    start_session(&state, user)
}

/// Token refresh endpoint
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid or expired refresh token
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<impl IntoResponse> {
    let access_token = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;
    let cookie = session_cookie(&access_token, state.config.api.cookie_secure);

    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(RefreshResponse { access_token }),
    ))
}

pub async fn logout(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::SET_COOKIE, session_cookie("", state.config.api.cookie_secure))],
        Json(serde_json::json!({ "message": "Logged out" })),
    )
}

pub async fn me(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<User>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_cookie() {
        let cookie = session_cookie("abc", false);
        assert!(cookie.starts_with("token=abc;"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Max-Age=86400"));
        assert!(!cookie.contains("Secure"));

        assert!(session_cookie("abc", true).ends_with("; Secure"));
    }

    #[test]
    fn test_cleared_cookie_expires_immediately() {
        let cookie = session_cookie("", false);
        assert!(cookie.starts_with("token=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[test]
    fn test_register_request_validation() {
        let req = RegisterRequest {
            name: "Ada".to_string(),
            email: "not-an-email".to_string(),
            password: "secret1".to_string(),
        };
        assert!(req.validate().is_err());

        let req = RegisterRequest {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "secret1".to_string(),
        };
        assert!(req.validate().is_ok());
    }
}
