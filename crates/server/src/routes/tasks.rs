use std::cmp::Reverse;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    db::models::{Task, TaskStatus, TaskType, TaskWithClient},
    error::{AppError, Result},
    middleware::auth::AuthAdmin,
    routes::{nullable, projects::fetch_client, JsonBody},
    services::{
        statistics::{self, TaskStatistics},
        task_metadata::{
            append_response, parse_responses, parse_timestamp, Attachment,
            TaskResponse as ThreadResponse,
        },
    },
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route("/statistics", get(task_statistics))
        .route("/responses/all", get(all_responses))
        .route("/:id", get(get_task).patch(update_task).delete(delete_task))
        .route("/:id/responses", get(list_responses).post(add_response))
}

const DEFAULT_RESPONSE_PAGE: i64 = 50;
const MAX_RESPONSE_PAGE: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct TaskListQuery {
    pub client_id: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub task_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub task_type: Option<String>,
    pub status: Option<String>,
    pub due_date: Option<String>,
    pub attachments: Option<Value>,
    pub metadata: Option<Value>,
    pub created_by: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(rename = "type")]
    pub task_type: Option<String>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub due_date: Option<Option<String>>,
    pub attachments: Option<Value>,
    pub metadata: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct AddResponseRequest {
    #[serde(default)]
    pub text: String,
    pub created_by: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Deserialize)]
pub struct StatisticsQuery {
    pub client_id: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AllResponsesQuery {
    pub client_id: Option<String>,
    pub client_email: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ClientSummary {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    pub plan: String,
}

#[derive(Debug, Serialize)]
pub struct TaskResponse {
    pub id: String,
    pub client_id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub task_type: String,
    pub status: String,
    pub due_date: Option<String>,
    pub completed_at: Option<String>,
    pub attachments: Value,
    pub metadata: Value,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub client: ClientSummary,
}

impl From<TaskWithClient> for TaskResponse {
    fn from(row: TaskWithClient) -> Self {
        let attachments = row.task.attachments_json();
        let metadata = match row.task.metadata_json() {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        let task = row.task;
        Self {
            client: ClientSummary {
                id: task.client_id.clone(),
                name: row.client_name,
                email: row.client_email,
                plan: row.client_plan,
            },
            id: task.id,
            client_id: task.client_id,
            title: task.title,
            description: task.description,
            task_type: task.task_type,
            status: task.status,
            due_date: task.due_date,
            completed_at: task.completed_at,
            attachments,
            metadata,
            created_by: task.created_by,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskResponse>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ThreadTask {
    pub id: String,
    pub client_id: String,
    pub client_name: Option<String>,
    pub client_email: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub task_type: String,
    pub status: String,
    pub due_date: Option<String>,
    pub completed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize)]
pub struct TaskThreadResponse {
    pub task: ThreadTask,
    pub responses: Vec<ThreadResponse>,
    pub total_responses: usize,
}

#[derive(Debug, Serialize)]
pub struct AddResponseResponse {
    pub response: ThreadResponse,
    pub total_responses: usize,
}

#[derive(Debug, Serialize)]
pub struct FlatResponse {
    pub id: String,
    pub task_id: String,
    pub task_title: String,
    pub client_id: String,
    pub client_name: Option<String>,
    pub client_email: String,
    pub text: String,
    pub created_at: String,
    pub created_by: String,
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub total: usize,
    pub limit: i64,
    pub offset: i64,
    pub has_more: bool,
}

#[derive(Debug, Serialize)]
pub struct AllResponsesResponse {
    pub responses: Vec<FlatResponse>,
    pub pagination: Pagination,
}

const TASK_WITH_CLIENT_SELECT: &str = r#"
    SELECT t.id, t.client_id, t.title, t.description, t.type, t.status, t.due_date,
           t.completed_at, t.attachments, t.metadata, t.created_by, t.created_at, t.updated_at,
           c.name AS client_name, c.email AS client_email, c.plan AS client_plan
    FROM tasks t
    JOIN clients c ON c.id = t.client_id
"#;

async fn fetch_task(pool: &SqlitePool, id: &str) -> Result<TaskWithClient> {
    sqlx::query_as::<_, TaskWithClient>(&format!("{TASK_WITH_CLIENT_SELECT} WHERE t.id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".to_string()))
}

fn parse_filter<T: std::str::FromStr<Err = AppError>>(value: Option<&str>) -> Result<Option<T>> {
    value.filter(|s| !s.is_empty()).map(str::parse).transpose()
}

fn parse_date_param(name: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    match value.filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(raw) => parse_timestamp(raw)
            .map(Some)
            .ok_or_else(|| AppError::Validation(format!("{name} must be a date or RFC 3339 timestamp"))),
    }
}

fn normalize_due_date(raw: Option<String>) -> Result<Option<String>> {
    match raw.filter(|s| !s.trim().is_empty()) {
        None => Ok(None),
        Some(raw) => parse_timestamp(&raw)
            .map(|ts| Some(ts.to_rfc3339()))
            .ok_or_else(|| AppError::Validation("due_date must be a date or RFC 3339 timestamp".to_string())),
    }
}

fn encode_attachments(value: Value) -> Result<String> {
    match value {
        Value::Array(_) => Ok(value.to_string()),
        Value::Null => Ok("[]".to_string()),
        _ => Err(AppError::Validation("attachments must be an array".to_string())),
    }
}

fn encode_metadata(value: Value) -> Result<String> {
    match value {
        Value::Object(_) => Ok(value.to_string()),
        Value::Null => Ok("{}".to_string()),
        _ => Err(AppError::Validation("metadata must be an object".to_string())),
    }
}

/// `completed_at` after a status change: stamped on entering `COMPLETED`,
/// kept while completed, cleared for any other status.
fn completion_timestamp(
    previous: Option<&str>,
    status: TaskStatus,
    now: &str,
) -> Option<String> {
    match status {
        TaskStatus::Completed => Some(previous.unwrap_or(now).to_string()),
        _ => None,
    }
}

fn within(ts: Option<DateTime<Utc>>, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> bool {
    match ts {
        Some(ts) => from.map_or(true, |from| ts >= from) && to.map_or(true, |to| ts <= to),
        None => true,
    }
}

/// Writes `metadata` only if the stored blob still equals what `task` was read with.
async fn replace_metadata(pool: &SqlitePool, task: &Task, metadata: &Value, now: &str) -> Result<()> {
    let result = sqlx::query(
        "UPDATE tasks SET metadata = ?, updated_at = ? WHERE id = ? AND metadata = ?",
    )
    .bind(metadata.to_string())
    .bind(now)
    .bind(&task.id)
    .bind(&task.metadata)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::Conflict(
            "Task was modified concurrently, please retry".to_string(),
        ));
    }
    Ok(())
}

async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskListQuery>,
) -> Result<Json<TaskListResponse>> {
    let status: Option<TaskStatus> = parse_filter(query.status.as_deref())?;
    let task_type: Option<TaskType> = parse_filter(query.task_type.as_deref())?;
    let client_id = query.client_id.filter(|s| !s.is_empty());

    let rows = sqlx::query_as::<_, TaskWithClient>(&format!(
        r#"{TASK_WITH_CLIENT_SELECT}
        WHERE (?1 IS NULL OR t.client_id = ?1)
          AND (?2 IS NULL OR t.status = ?2)
          AND (?3 IS NULL OR t.type = ?3)
        ORDER BY t.created_at DESC
        "#
    ))
    .bind(&client_id)
    .bind(status.map(TaskStatus::as_str))
    .bind(task_type.map(TaskType::as_str))
    .fetch_all(&state.db.pool)
    .await?;

    let tasks: Vec<TaskResponse> = rows.into_iter().map(TaskResponse::from).collect();
    let count = tasks.len();

    Ok(Json(TaskListResponse { tasks, count }))
}

async fn create_task(
    State(state): State<AppState>,
    admin: AuthAdmin,
    JsonBody(body): JsonBody<CreateTaskRequest>,
) -> Result<(StatusCode, Json<TaskResponse>)> {
    if body.client_id.trim().is_empty() || body.title.trim().is_empty() {
        return Err(AppError::Validation(
            "client_id and title are required".to_string(),
        ));
    }

    let task_type: TaskType = parse_filter(body.task_type.as_deref())?.unwrap_or(TaskType::Other);
    let status: TaskStatus = parse_filter(body.status.as_deref())?.unwrap_or(TaskStatus::Pending);
    let due_date = normalize_due_date(body.due_date)?;
    let attachments = encode_attachments(body.attachments.unwrap_or(Value::Null))?;
    let metadata = encode_metadata(body.metadata.unwrap_or(Value::Null))?;

    let client = fetch_client(&state.db.pool, &body.client_id)
        .await
        .map_err(|err| match err {
            AppError::NotFound(_) => AppError::NotFound("Client not found".to_string()),
            other => other,
        })?;

    let now = Utc::now().to_rfc3339();
    let task = Task {
        id: Uuid::new_v4().to_string(),
        client_id: client.id,
        title: body.title.trim().to_string(),
        description: body.description,
        task_type: task_type.as_str().to_string(),
        status: status.as_str().to_string(),
        due_date,
        completed_at: completion_timestamp(None, status, &now),
        attachments,
        metadata,
        created_by: body.created_by.or(Some(admin.email)),
        created_at: now.clone(),
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO tasks (id, client_id, title, description, type, status, due_date, completed_at, attachments, metadata, created_by, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&task.id)
    .bind(&task.client_id)
    .bind(&task.title)
    .bind(&task.description)
    .bind(&task.task_type)
    .bind(&task.status)
    .bind(&task.due_date)
    .bind(&task.completed_at)
    .bind(&task.attachments)
    .bind(&task.metadata)
    .bind(&task.created_by)
    .bind(&task.created_at)
    .bind(&task.updated_at)
    .execute(&state.db.pool)
    .await?;

    tracing::info!(task_id = %task.id, client_id = %task.client_id, "Task created");

    Ok((
        StatusCode::CREATED,
        Json(TaskResponse::from(TaskWithClient {
            task,
            client_name: client.name,
            client_email: client.email,
            client_plan: client.plan,
        })),
    ))
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TaskResponse>> {
    let row = fetch_task(&state.db.pool, &id).await?;
    Ok(Json(TaskResponse::from(row)))
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<UpdateTaskRequest>,
) -> Result<Json<TaskResponse>> {
    let mut row = fetch_task(&state.db.pool, &id).await?;
    let task = &mut row.task;
    let now = Utc::now().to_rfc3339();

    if let Some(title) = body.title {
        if title.trim().is_empty() {
            return Err(AppError::Validation("title cannot be empty".to_string()));
        }
        task.title = title.trim().to_string();
    }
    if let Some(description) = body.description {
        task.description = description;
    }
    if let Some(task_type) = body.task_type {
        task.task_type = task_type.parse::<TaskType>()?.as_str().to_string();
    }
    if let Some(due_date) = body.due_date {
        task.due_date = normalize_due_date(due_date)?;
    }
    if let Some(attachments) = body.attachments {
        task.attachments = encode_attachments(attachments)?;
    }
    if let Some(metadata) = body.metadata {
        task.metadata = encode_metadata(metadata)?;
    }
    if let Some(status) = body.status {
        let status: TaskStatus = status.parse()?;
        task.completed_at = completion_timestamp(task.completed_at.as_deref(), status, &now);
        task.status = status.as_str().to_string();
    }
    task.updated_at = now;

    sqlx::query(
        "UPDATE tasks SET title = ?, description = ?, type = ?, status = ?, due_date = ?, completed_at = ?, attachments = ?, metadata = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&task.title)
    .bind(&task.description)
    .bind(&task.task_type)
    .bind(&task.status)
    .bind(&task.due_date)
    .bind(&task.completed_at)
    .bind(&task.attachments)
    .bind(&task.metadata)
    .bind(&task.updated_at)
    .bind(&task.id)
    .execute(&state.db.pool)
    .await?;

    tracing::info!(task_id = %task.id, status = %task.status, "Task updated");

    Ok(Json(TaskResponse::from(row)))
}

async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<()>> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(&id)
        .execute(&state.db.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Task not found".to_string()));
    }

    tracing::info!(task_id = %id, "Task deleted");

    Ok(Json(()))
}

async fn list_responses(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TaskThreadResponse>> {
    let row = fetch_task(&state.db.pool, &id).await?;
    let responses = parse_responses(&row.task.metadata_json(), &row.task.created_at);
    let task = row.task;

    Ok(Json(TaskThreadResponse {
        total_responses: responses.len(),
        responses,
        task: ThreadTask {
            id: task.id,
            client_id: task.client_id,
            client_name: row.client_name,
            client_email: row.client_email,
            title: task.title,
            description: task.description,
            task_type: task.task_type,
            status: task.status,
            due_date: task.due_date,
            completed_at: task.completed_at,
            created_at: task.created_at,
            updated_at: task.updated_at,
        },
    }))
}

async fn add_response(
    State(state): State<AppState>,
    admin: AuthAdmin,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<AddResponseRequest>,
) -> Result<(StatusCode, Json<AddResponseResponse>)> {
    if body.text.trim().is_empty() && body.attachments.is_empty() {
        return Err(AppError::Validation(
            "A response needs text or at least one attachment".to_string(),
        ));
    }

    let row = fetch_task(&state.db.pool, &id).await?;
    let now = Utc::now().to_rfc3339();

    let response = ThreadResponse {
        id: Uuid::new_v4().to_string(),
        text: body.text.trim().to_string(),
        created_at: now.clone(),
        created_by: body
            .created_by
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(admin.email),
        attachments: body.attachments,
    };

    let metadata = append_response(row.task.metadata_json(), &response);
    let total_responses = parse_responses(&metadata, &row.task.created_at).len();

    replace_metadata(&state.db.pool, &row.task, &metadata, &now).await?;

    tracing::info!(task_id = %row.task.id, response_id = %response.id, "Task response added");

    Ok((
        StatusCode::CREATED,
        Json(AddResponseResponse {
            response,
            total_responses,
        }),
    ))
}

async fn task_statistics(
    State(state): State<AppState>,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<TaskStatistics>> {
    let from = parse_date_param("date_from", query.date_from.as_deref())?;
    let to = parse_date_param("date_to", query.date_to.as_deref())?;
    let client_id = query.client_id.filter(|s| !s.is_empty());

    let tasks = sqlx::query_as::<_, Task>(
        "SELECT id, client_id, title, description, type, status, due_date, completed_at, attachments, metadata, created_by, created_at, updated_at FROM tasks WHERE (?1 IS NULL OR client_id = ?1)",
    )
    .bind(&client_id)
    .fetch_all(&state.db.pool)
    .await?;

    let tasks: Vec<Task> = tasks
        .into_iter()
        .filter(|task| within(parse_timestamp(&task.created_at), from, to))
        .collect();

    Ok(Json(statistics::compute(&tasks)?))
}

async fn all_responses(
    State(state): State<AppState>,
    Query(query): Query<AllResponsesQuery>,
) -> Result<Json<AllResponsesResponse>> {
    let from = parse_date_param("date_from", query.date_from.as_deref())?;
    let to = parse_date_param("date_to", query.date_to.as_deref())?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_RESPONSE_PAGE)
        .clamp(1, MAX_RESPONSE_PAGE);
    let offset = query.offset.unwrap_or(0).max(0);
    let client_id = query.client_id.filter(|s| !s.is_empty());
    let client_email = query.client_email.filter(|s| !s.is_empty());

    let rows = sqlx::query_as::<_, TaskWithClient>(&format!(
        r#"{TASK_WITH_CLIENT_SELECT}
        WHERE (?1 IS NULL OR t.client_id = ?1)
          AND (?2 IS NULL OR c.email = ?2)
        ORDER BY t.created_at DESC
        "#
    ))
    .bind(&client_id)
    .bind(&client_email)
    .fetch_all(&state.db.pool)
    .await?;

    let mut flattened: Vec<(Option<DateTime<Utc>>, FlatResponse)> = Vec::new();
    for row in rows {
        for response in parse_responses(&row.task.metadata_json(), &row.task.created_at) {
            let created = parse_timestamp(&response.created_at);
            if !within(created, from, to) {
                continue;
            }
            flattened.push((
                created,
                FlatResponse {
                    id: response.id,
                    task_id: row.task.id.clone(),
                    task_title: row.task.title.clone(),
                    client_id: row.task.client_id.clone(),
                    client_name: row.client_name.clone(),
                    client_email: row.client_email.clone(),
                    text: response.text,
                    created_at: response.created_at,
                    created_by: response.created_by,
                    attachments: response.attachments,
                },
            ));
        }
    }

    // Newest first; responses with unreadable timestamps sort last.
    flattened.sort_by_key(|(created, _)| Reverse(*created));

    let total = flattened.len();
    let responses = flattened
        .into_iter()
        .skip(usize::try_from(offset).unwrap_or(usize::MAX))
        .take(usize::try_from(limit).unwrap_or(usize::MAX))
        .map(|(_, response)| response)
        .collect();

    Ok(Json(AllResponsesResponse {
        responses,
        pagination: Pagination {
            total,
            limit,
            offset,
            has_more: offset.saturating_add(limit) < total as i64,
        },
    }))
}
