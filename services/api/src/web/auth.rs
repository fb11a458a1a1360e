//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for registration, login, logout, and the current caller.

use crate::error::{bad_request, port_failure, HandlerError};
use crate::web::middleware::session_token;
use crate::web::state::AppState;
use agent_metrics_core::domain::{Agent, NewAgent, Role};
use agent_metrics_core::ports::PortError;
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_NAME_LEN: usize = 2;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// The authenticated caller, as resolved by `require_auth`.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[schema(value_type = String, example = "agent")]
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Whether the caller may read or change data owned by `agent_id`.
    pub fn can_access(&self, agent_id: Uuid) -> bool {
        self.is_admin() || self.id == agent_id
    }
}

impl From<Agent> for AuthUser {
    fn from(agent: Agent) -> Self {
        Self {
            id: agent.id,
            email: agent.email,
            name: agent.name,
            role: agent.role,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user: AuthUser,
}

//=========================================================================================
// Helpers
//=========================================================================================

/// Hashes a password with Argon2 and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    Ok(Argon2::default()
        .hash_password(password.as_bytes(), &salt)?
        .to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<bool, argon2::password_hash::Error> {
    let parsed_hash = PasswordHash::new(hash)?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Checks the registration fields, returning the first problem found.
pub fn validate_registration(req: &RegisterRequest) -> Result<(), String> {
    let email = req.email.trim();
    let valid_email = match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !email.contains(' '),
        None => false,
    };
    if !valid_email {
        return Err("A valid email address is required".to_string());
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        ));
    }
    if req.name.trim().chars().count() < MIN_NAME_LEN {
        return Err(format!("Name must be at least {} characters long", MIN_NAME_LEN));
    }
    Ok(())
}

fn session_cookie(token: &str, max_age_secs: i64) -> String {
    format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        token, max_age_secs
    )
}

/// Creates an auth session for `agent` and builds the response with its cookie.
async fn start_session(
    state: &AppState,
    agent: Agent,
    status: StatusCode,
) -> Result<impl IntoResponse, HandlerError> {
    let token = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + state.config.session_ttl;

    state
        .db
        .create_auth_session(&token, agent.id, expires_at)
        .await
        .map_err(|e| port_failure("Failed to create session", e))?;

    let cookie = session_cookie(&token, state.config.session_ttl.num_seconds());
    let response = AuthResponse {
        token,
        user: AuthUser::from(agent),
    };
    Ok((status, [(header::SET_COOKIE, cookie)], Json(response)))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/register - Create a new agent account
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created and logged in", body = AuthResponse),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    // 1. Validate the submitted fields
    validate_registration(&req).map_err(bad_request)?;

    // 2. Hash the password
    let password_hash = hash_password(&req.password).map_err(|e| {
        error!("Failed to hash password: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Failed to hash password".to_string())
    })?;

    // 3. Create the agent
    let agent = state
        .db
        .create_agent(NewAgent {
            email: req.email.trim().to_lowercase(),
            name: req.name.trim().to_string(),
            role: Role::Agent,
            password_hash,
        })
        .await
        .map_err(|e| port_failure("Failed to create account", e))?;
    info!("Registered agent {}", agent.id);

    // 4. Log the new account in
    start_session(&state, agent, StatusCode::CREATED).await
}

/// POST /auth/login - Login with existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, HandlerError> {
    let invalid = || (StatusCode::UNAUTHORIZED, "Invalid email or password".to_string());

    // 1. Get credentials by email
    let creds = state
        .db
        .get_credentials_by_email(&req.email)
        .await
        .map_err(|e| match e {
            PortError::NotFound(_) => invalid(),
            other => port_failure("Failed to load account", other),
        })?;

    // 2. Verify password
    let valid = verify_password(&req.password, &creds.password_hash).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, "Authentication error".to_string())
    })?;
    if !valid {
        return Err(invalid());
    }

    // 3. Issue the session
    start_session(&state, creds.agent, StatusCode::OK).await
}

/// POST /auth/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HandlerError> {
    let token = session_token(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    state
        .db
        .delete_auth_session(&token)
        .await
        .map_err(|e| port_failure("Failed to logout", e))?;

    Ok((StatusCode::OK, [(header::SET_COOKIE, session_cookie("", 0))]))
}

/// GET /auth/me - The authenticated caller
#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Current user", body = AuthUser),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me_handler(Extension(user): Extension<AuthUser>) -> Json<AuthUser> {
    Json(user)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(email: &str, password: &str, name: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn registration_rules() {
        assert!(validate_registration(&request("ana@example.com", "secret", "Ana")).is_ok());
        assert!(validate_registration(&request("ana.example.com", "secret", "Ana")).is_err());
        assert!(validate_registration(&request("ana@example.com", "12345", "Ana")).is_err());
        assert!(validate_registration(&request("ana@example.com", "secret", " A ")).is_err());
    }

    #[test]
    fn hashes_verify_only_the_original_password() {
        let hash = hash_password("secret").unwrap();
        assert!(verify_password("secret", &hash).unwrap());
        assert!(!verify_password("Secret", &hash).unwrap());
        assert!(verify_password("secret", "not-a-hash").is_err());
    }

    #[test]
    fn owners_and_admins_have_access() {
        let owner = Uuid::new_v4();
        let agent = AuthUser {
            id: owner,
            email: "a@example.com".to_string(),
            name: "Ana".to_string(),
            role: Role::Agent,
        };
        assert!(agent.can_access(owner));
        assert!(!agent.can_access(Uuid::new_v4()));

        let admin = AuthUser { role: Role::Admin, ..agent };
        assert!(admin.can_access(Uuid::new_v4()));
    }
}
