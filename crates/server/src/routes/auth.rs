use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{extract::State, routing::{get, post}, Json, Router};
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::{
    db::models::Admin,
    error::{AppError, Result},
    middleware::auth::AuthAdmin,
    routes::JsonBody,
    AppState,
};

/// Routes reachable without a token.
pub fn public_router() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/me", get(me))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub token: String,
    pub admin: AdminSummary,
}

#[derive(Debug, Serialize)]
pub struct AdminSummary {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // admin id
    pub email: String,
    pub name: String,
    pub role: String,
    pub exp: usize,
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|_| AppError::Internal("Failed to hash password".to_string()))
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn create_token(admin: &AdminSummary, secret: &str, ttl_hours: i64) -> Result<String> {
    let expiration = Utc::now()
        .checked_add_signed(
            chrono::Duration::try_hours(ttl_hours)
                .ok_or_else(|| AppError::Internal("Token lifetime out of range".to_string()))?,
        )
        .ok_or_else(|| AppError::Internal("Token expiry out of range".to_string()))?
        .timestamp() as usize;

    let claims = Claims {
        sub: admin.id.clone(),
        email: admin.email.clone(),
        name: admin.name.clone(),
        role: admin.role.clone(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AppError::Internal("Failed to create token".to_string()))
}

async fn login(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    if body.email.trim().is_empty() || body.password.is_empty() {
        return Err(AppError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    let admin = sqlx::query_as::<_, Admin>(
        "SELECT id, email, name, password_hash, role, created_at, updated_at FROM admins WHERE email = ?",
    )
    .bind(body.email.trim())
    .fetch_optional(&state.db.pool)
    .await?
    .ok_or(AppError::Unauthorized)?;

    // Admins created without a password cannot log in until one is set
    let password_hash = admin.password_hash.as_deref().ok_or(AppError::Unauthorized)?;

    if !verify_password(&body.password, password_hash)? {
        tracing::info!(email = %admin.email, "Rejected login");
        return Err(AppError::Unauthorized);
    }

    let summary = AdminSummary {
        id: admin.id,
        email: admin.email,
        name: admin.name,
        role: admin.role,
    };
    let token = create_token(&summary, &state.config.jwt_secret, state.config.token_ttl_hours)?;

    tracing::info!(admin_id = %summary.id, "Admin logged in");

    Ok(Json(AuthResponse {
        token,
        admin: summary,
    }))
}

async fn me(admin: AuthAdmin) -> Json<AdminSummary> {
    Json(AdminSummary {
        id: admin.id,
        email: admin.email,
        name: admin.name,
        role: admin.role,
    })
}
