use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    db::models::{string_list, KitType, QuizSubmission},
    error::{AppError, Result},
    routes::{is_valid_email, JsonBody},
    AppState,
};

/// Lead capture is posted by the public site without a token.
pub fn public_router() -> Router<AppState> {
    Router::new().route("/", post(create_submission))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_submissions))
        .route("/:id", delete(delete_submission))
}

#[derive(Debug, Deserialize)]
pub struct CreateSubmissionRequest {
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub email: String,
    pub phone_number: Option<String>,
    pub brand_name: Option<String>,
    pub logo_status: Option<String>,
    #[serde(default)]
    pub brand_goals: Vec<String>,
    pub online_presence: Option<String>,
    #[serde(default)]
    pub audience: Vec<String>,
    pub brand_style: Option<String>,
    pub timeline: Option<String>,
    pub preferred_kit: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub brand_name: Option<String>,
    pub logo_status: Option<String>,
    pub brand_goals: Vec<String>,
    pub online_presence: Option<String>,
    pub audience: Vec<String>,
    pub brand_style: Option<String>,
    pub timeline: Option<String>,
    pub preferred_kit: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<QuizSubmission> for SubmissionResponse {
    fn from(row: QuizSubmission) -> Self {
        Self {
            brand_goals: string_list(&row.brand_goals),
            audience: string_list(&row.audience),
            id: row.id,
            full_name: row.full_name,
            email: row.email,
            phone_number: row.phone_number,
            brand_name: row.brand_name,
            logo_status: row.logo_status,
            online_presence: row.online_presence,
            brand_style: row.brand_style,
            timeline: row.timeline,
            preferred_kit: row.preferred_kit,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmissionListResponse {
    pub submissions: Vec<SubmissionResponse>,
    pub count: usize,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn list_submissions(State(state): State<AppState>) -> Result<Json<SubmissionListResponse>> {
    let rows = sqlx::query_as::<_, QuizSubmission>(
        r#"
        SELECT id, full_name, email, phone_number, brand_name, logo_status, brand_goals,
               online_presence, audience, brand_style, timeline, preferred_kit, created_at, updated_at
        FROM quiz_submissions
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(&state.db.pool)
    .await?;

    let submissions: Vec<SubmissionResponse> =
        rows.into_iter().map(SubmissionResponse::from).collect();
    let count = submissions.len();

    Ok(Json(SubmissionListResponse { submissions, count }))
}

async fn create_submission(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CreateSubmissionRequest>,
) -> Result<(StatusCode, Json<SubmissionResponse>)> {
    let full_name = body.full_name.trim().to_string();
    let email = body.email.trim().to_string();

    if full_name.is_empty() || email.is_empty() {
        return Err(AppError::Validation(
            "full_name and email are required".to_string(),
        ));
    }
    if !is_valid_email(&email) {
        return Err(AppError::Validation("Invalid email format".to_string()));
    }

    let preferred_kit = match non_empty(body.preferred_kit) {
        Some(kit) => Some(kit.parse::<KitType>()?.as_str().to_string()),
        None => None,
    };

    let brand_goals: Vec<String> = body
        .brand_goals
        .into_iter()
        .map(|g| g.trim().to_string())
        .filter(|g| !g.is_empty())
        .collect();
    let audience: Vec<String> = body
        .audience
        .into_iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect();

    let now = Utc::now().to_rfc3339();
    let submission = QuizSubmission {
        id: Uuid::new_v4().to_string(),
        full_name,
        email,
        phone_number: non_empty(body.phone_number),
        brand_name: non_empty(body.brand_name),
        logo_status: non_empty(body.logo_status),
        brand_goals: serde_json::to_string(&brand_goals)
            .map_err(|e| AppError::Internal(e.to_string()))?,
        online_presence: non_empty(body.online_presence),
        audience: serde_json::to_string(&audience)
            .map_err(|e| AppError::Internal(e.to_string()))?,
        brand_style: non_empty(body.brand_style),
        timeline: non_empty(body.timeline),
        preferred_kit,
        created_at: now.clone(),
        updated_at: now,
    };

    sqlx::query(
        r#"
        INSERT INTO quiz_submissions (id, full_name, email, phone_number, brand_name, logo_status, brand_goals,
            online_presence, audience, brand_style, timeline, preferred_kit, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&submission.id)
    .bind(&submission.full_name)
    .bind(&submission.email)
    .bind(&submission.phone_number)
    .bind(&submission.brand_name)
    .bind(&submission.logo_status)
    .bind(&submission.brand_goals)
    .bind(&submission.online_presence)
    .bind(&submission.audience)
    .bind(&submission.brand_style)
    .bind(&submission.timeline)
    .bind(&submission.preferred_kit)
    .bind(&submission.created_at)
    .bind(&submission.updated_at)
    .execute(&state.db.pool)
    .await?;

    tracing::info!(submission_id = %submission.id, "Quiz submission received");

    Ok((StatusCode::CREATED, Json(SubmissionResponse::from(submission))))
}

async fn delete_submission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<()>> {
    let result = sqlx::query("DELETE FROM quiz_submissions WHERE id = ?")
        .bind(&id)
        .execute(&state.db.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Quiz submission not found".to_string()));
    }

    tracing::info!(submission_id = %id, "Quiz submission deleted");

    Ok(Json(()))
}
