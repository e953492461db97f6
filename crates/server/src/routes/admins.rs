use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::models::Admin,
    error::{AppError, Result},
    middleware::auth::AuthAdmin,
    routes::{auth::hash_password, is_valid_email, JsonBody},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_admins).post(create_admin))
        .route("/:id", delete(delete_admin))
}

#[derive(Debug, Deserialize)]
pub struct CreateAdminRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub name: String,
    pub password: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AdminResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub has_password: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Admin> for AdminResponse {
    fn from(admin: Admin) -> Self {
        Self {
            id: admin.id,
            email: admin.email,
            name: admin.name,
            role: admin.role,
            has_password: admin.password_hash.is_some(),
            created_at: admin.created_at,
            updated_at: admin.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AdminListResponse {
    pub admins: Vec<AdminResponse>,
    pub count: usize,
}

async fn list_admins(State(state): State<AppState>) -> Result<Json<AdminListResponse>> {
    let admins = sqlx::query_as::<_, Admin>(
        "SELECT id, email, name, password_hash, role, created_at, updated_at FROM admins ORDER BY created_at DESC",
    )
    .fetch_all(&state.db.pool)
    .await?;

    let admins: Vec<AdminResponse> = admins.into_iter().map(AdminResponse::from).collect();
    let count = admins.len();

    Ok(Json(AdminListResponse { admins, count }))
}

async fn create_admin(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CreateAdminRequest>,
) -> Result<(StatusCode, Json<AdminResponse>)> {
    let email = body.email.trim().to_string();
    let name = body.name.trim().to_string();

    if email.is_empty() || name.is_empty() {
        return Err(AppError::Validation(
            "Email and name are required".to_string(),
        ));
    }
    if !is_valid_email(&email) {
        return Err(AppError::Validation("Invalid email format".to_string()));
    }

    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM admins WHERE email = ?")
        .bind(&email)
        .fetch_one(&state.db.pool)
        .await?;

    if existing > 0 {
        return Err(AppError::Conflict(
            "An admin with this email already exists".to_string(),
        ));
    }

    let password_hash = match body.password.as_deref().filter(|p| !p.is_empty()) {
        Some(password) if password.len() < 8 => {
            return Err(AppError::Validation(
                "Password must be at least 8 characters long".to_string(),
            ))
        }
        Some(password) => Some(hash_password(password)?),
        None => None,
    };

    let role = body
        .role
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| "admin".to_string());

    let admin = Admin {
        id: Uuid::new_v4().to_string(),
        email,
        name,
        password_hash,
        role,
        created_at: Utc::now().to_rfc3339(),
        updated_at: Utc::now().to_rfc3339(),
    };

    sqlx::query(
        "INSERT INTO admins (id, email, name, password_hash, role, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&admin.id)
    .bind(&admin.email)
    .bind(&admin.name)
    .bind(&admin.password_hash)
    .bind(&admin.role)
    .bind(&admin.created_at)
    .bind(&admin.updated_at)
    .execute(&state.db.pool)
    .await?;

    tracing::info!(admin_id = %admin.id, email = %admin.email, "Admin created");

    Ok((StatusCode::CREATED, Json(AdminResponse::from(admin))))
}

async fn delete_admin(
    State(state): State<AppState>,
    caller: AuthAdmin,
    Path(id): Path<String>,
) -> Result<Json<()>> {
    if caller.id == id {
        return Err(AppError::Validation(
            "You cannot delete your own account".to_string(),
        ));
    }

    let result = sqlx::query("DELETE FROM admins WHERE id = ?")
        .bind(&id)
        .execute(&state.db.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Admin not found".to_string()));
    }

    tracing::info!(admin_id = %id, deleted_by = %caller.id, "Admin deleted");

    Ok(Json(()))
}
