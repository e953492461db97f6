use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    db::models::{Client, ClientPhaseState, KitType, PhaseId, PhaseStatus},
    error::{AppError, Result},
    routes::{is_valid_email, nullable, JsonBody},
    services::phases::{
        self, parse_checklist, template_for, Checklist, ChecklistSource, MergedPhase, StoredPhase,
    },
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_client))
        .route("/clients", get(list_clients))
        .route("/phases", get(list_projects_with_phases))
        .route("/:id", get(get_project).patch(update_project))
        .route("/:id/phases", get(get_project_phases))
        .route("/:id/initialize-phases", post(initialize_phases))
        .route("/:id/phases/:phase_id", patch(update_phase_status))
        .route("/:id/phases/:phase_id/checklist", patch(update_checklist_item))
}

#[derive(Debug, Deserialize)]
pub struct CreateClientRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub plan: String,
    pub name: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    pub current_day_of_14: Option<i64>,
    #[serde(default, deserialize_with = "nullable")]
    pub next_from_us: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub next_from_you: Option<Option<String>>,
    pub onboarding_percent: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectPhasesQuery {
    pub kit_type: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePhaseStatusRequest {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateChecklistItemRequest {
    #[serde(default)]
    pub label: String,
    pub is_done: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PhasePathParams {
    pub id: String,
    pub phase_id: String,
}

#[derive(Debug, Serialize)]
pub struct ClientResponse {
    pub id: String,
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub email: String,
    pub plan: String,
    pub current_day_of_14: i64,
    pub next_from_us: Option<String>,
    pub next_from_you: Option<String>,
    pub onboarding_percent: i64,
    pub onboarding_finished: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Client> for ClientResponse {
    fn from(client: Client) -> Self {
        Self {
            onboarding_finished: client.onboarding_percent >= 100,
            id: client.id,
            user_id: client.user_id,
            name: client.name,
            email: client.email,
            plan: client.plan,
            current_day_of_14: client.current_day_of_14,
            next_from_us: client.next_from_us,
            next_from_you: client.next_from_you,
            onboarding_percent: client.onboarding_percent,
            created_at: client.created_at,
            updated_at: client.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ClientListResponse {
    pub clients: Vec<ClientResponse>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ChecklistItemResponse {
    pub id: String,
    pub label: String,
    pub is_done: bool,
    pub sort_order: usize,
}

#[derive(Debug, Serialize)]
pub struct PhaseResponse {
    pub id: String,
    pub project_id: String,
    pub phase_number: u8,
    pub phase_id: PhaseId,
    pub title: &'static str,
    pub subtitle: &'static str,
    pub day_range: &'static str,
    pub status: PhaseStatus,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub source: ChecklistSource,
    pub checklist_items: Vec<ChecklistItemResponse>,
}

impl PhaseResponse {
    fn new(client_id: &str, phase: MergedPhase) -> Self {
        let checklist_items = phase
            .checklist_items
            .into_iter()
            .enumerate()
            .map(|(index, item)| ChecklistItemResponse {
                id: format!("{client_id}-{}-{index}", phase.phase_id),
                label: item.label,
                is_done: item.is_done,
                sort_order: item.sort_order,
            })
            .collect();

        Self {
            id: format!("{client_id}-{}", phase.phase_id),
            project_id: client_id.to_string(),
            phase_number: phase.phase_number,
            phase_id: phase.phase_id,
            title: phase.title,
            subtitle: phase.subtitle,
            day_range: phase.day_range,
            status: phase.status,
            started_at: phase.started_at,
            completed_at: phase.completed_at,
            source: phase.source,
            checklist_items,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProjectPhasesResponse {
    #[serde(flatten)]
    pub client: ClientResponse,
    pub kit_type: KitType,
    pub phases: Vec<PhaseResponse>,
}

#[derive(Debug, Serialize)]
pub struct ProjectPhasesListResponse {
    pub projects: Vec<ProjectPhasesResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct InitializePhasesResponse {
    pub created: u64,
    pub phases: Vec<PhaseResponse>,
}

const CLIENT_COLUMNS: &str = "id, user_id, name, email, plan, current_day_of_14, next_from_us, next_from_you, onboarding_percent, created_at, updated_at";

const PHASE_STATE_COLUMNS: &str =
    "client_id, phase_id, status, started_at, completed_at, checklist, created_at, updated_at";

pub(crate) async fn fetch_client(pool: &SqlitePool, id: &str) -> Result<Client> {
    sqlx::query_as::<_, Client>(&format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))
}

fn stored_phase(row: &ClientPhaseState) -> Result<(PhaseId, StoredPhase)> {
    Ok((
        PhaseId::from_stored(&row.phase_id)?,
        StoredPhase {
            status: PhaseStatus::from_stored(&row.status)?,
            started_at: row.started_at.clone(),
            completed_at: row.completed_at.clone(),
            checklist: parse_checklist(Some(&row.checklist)),
        },
    ))
}

async fn load_phase_states(
    pool: &SqlitePool,
    client_id: &str,
) -> Result<HashMap<PhaseId, StoredPhase>> {
    let rows = sqlx::query_as::<_, ClientPhaseState>(&format!(
        "SELECT {PHASE_STATE_COLUMNS} FROM client_phase_state WHERE client_id = ?"
    ))
    .bind(client_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(stored_phase).collect()
}

async fn load_phase_state(
    pool: &SqlitePool,
    client_id: &str,
    phase_id: PhaseId,
) -> Result<Option<StoredPhase>> {
    let row = sqlx::query_as::<_, ClientPhaseState>(&format!(
        "SELECT {PHASE_STATE_COLUMNS} FROM client_phase_state WHERE client_id = ? AND phase_id = ?"
    ))
    .bind(client_id)
    .bind(phase_id.as_str())
    .fetch_optional(pool)
    .await?;

    row.as_ref()
        .map(|row| stored_phase(row).map(|(_, state)| state))
        .transpose()
}

async fn save_phase_state(
    pool: &SqlitePool,
    client_id: &str,
    phase_id: PhaseId,
    state: &StoredPhase,
) -> Result<()> {
    let checklist = serde_json::to_string(&state.checklist)
        .map_err(|e| AppError::Internal(format!("Failed to encode checklist: {e}")))?;
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO client_phase_state
            (client_id, phase_id, status, started_at, completed_at, checklist, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (client_id, phase_id) DO UPDATE SET
            status = excluded.status,
            started_at = excluded.started_at,
            completed_at = excluded.completed_at,
            checklist = excluded.checklist,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(client_id)
    .bind(phase_id.as_str())
    .bind(state.status.as_str())
    .bind(&state.started_at)
    .bind(&state.completed_at)
    .bind(checklist)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(())
}

fn phase_responses(client_id: &str, kit: KitType, stored: &HashMap<PhaseId, StoredPhase>) -> Vec<PhaseResponse> {
    phases::merge(kit, stored)
        .into_iter()
        .map(|phase| PhaseResponse::new(client_id, phase))
        .collect()
}

fn parse_phase_path(params: &PhasePathParams) -> Result<PhaseId> {
    params.phase_id.parse()
}

async fn create_client(
    State(state): State<AppState>,
    JsonBody(body): JsonBody<CreateClientRequest>,
) -> Result<(StatusCode, Json<ClientResponse>)> {
    let email = body.email.trim().to_string();
    if !is_valid_email(&email) {
        return Err(AppError::Validation("Invalid email format".to_string()));
    }
    let plan: KitType = body.plan.parse()?;

    let now = Utc::now().to_rfc3339();
    let client = Client {
        id: Uuid::new_v4().to_string(),
        user_id: body.user_id.filter(|s| !s.trim().is_empty()),
        name: body.name.filter(|s| !s.trim().is_empty()),
        email,
        plan: plan.as_str().to_string(),
        current_day_of_14: 1,
        next_from_us: None,
        next_from_you: None,
        onboarding_percent: 0,
        created_at: now.clone(),
        updated_at: now,
    };

    sqlx::query(&format!(
        "INSERT INTO clients ({CLIENT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
    ))
    .bind(&client.id)
    .bind(&client.user_id)
    .bind(&client.name)
    .bind(&client.email)
    .bind(&client.plan)
    .bind(client.current_day_of_14)
    .bind(&client.next_from_us)
    .bind(&client.next_from_you)
    .bind(client.onboarding_percent)
    .bind(&client.created_at)
    .bind(&client.updated_at)
    .execute(&state.db.pool)
    .await?;

    tracing::info!(client_id = %client.id, plan = %plan, "Client created");

    Ok((StatusCode::CREATED, Json(ClientResponse::from(client))))
}

async fn list_clients(State(state): State<AppState>) -> Result<Json<ClientListResponse>> {
    let clients = sqlx::query_as::<_, Client>(&format!(
        "SELECT {CLIENT_COLUMNS} FROM clients ORDER BY created_at DESC"
    ))
    .fetch_all(&state.db.pool)
    .await?;

    let clients: Vec<ClientResponse> = clients.into_iter().map(ClientResponse::from).collect();
    let count = clients.len();

    Ok(Json(ClientListResponse { clients, count }))
}

async fn list_projects_with_phases(
    State(state): State<AppState>,
    Query(query): Query<ProjectPhasesQuery>,
) -> Result<Json<ProjectPhasesListResponse>> {
    let kit_filter = query
        .kit_type
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<KitType>)
        .transpose()?;
    let status_filter = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<PhaseStatus>)
        .transpose()?;

    let clients = match kit_filter {
        Some(kit) => {
            sqlx::query_as::<_, Client>(&format!(
                "SELECT {CLIENT_COLUMNS} FROM clients WHERE plan = ? ORDER BY created_at DESC"
            ))
            .bind(kit.as_str())
            .fetch_all(&state.db.pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, Client>(&format!(
                "SELECT {CLIENT_COLUMNS} FROM clients ORDER BY created_at DESC"
            ))
            .fetch_all(&state.db.pool)
            .await?
        }
    };

    let rows = sqlx::query_as::<_, ClientPhaseState>(&format!(
        "SELECT {PHASE_STATE_COLUMNS} FROM client_phase_state"
    ))
    .fetch_all(&state.db.pool)
    .await?;

    let mut states: HashMap<String, HashMap<PhaseId, StoredPhase>> = HashMap::new();
    for row in &rows {
        let (phase_id, stored) = stored_phase(row)?;
        states
            .entry(row.client_id.clone())
            .or_default()
            .insert(phase_id, stored);
    }

    let no_state = HashMap::new();
    let mut projects = Vec::with_capacity(clients.len());
    for client in clients {
        let kit = KitType::from_stored(&client.plan)?;
        let stored = states.get(&client.id).unwrap_or(&no_state);
        let phases = phase_responses(&client.id, kit, stored);

        if let Some(status) = status_filter {
            if !phases.iter().any(|phase| phase.status == status) {
                continue;
            }
        }

        projects.push(ProjectPhasesResponse {
            client: ClientResponse::from(client),
            kit_type: kit,
            phases,
        });
    }

    let total = projects.len();
    Ok(Json(ProjectPhasesListResponse { projects, total }))
}

async fn get_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ClientResponse>> {
    let client = fetch_client(&state.db.pool, &id).await?;
    Ok(Json(ClientResponse::from(client)))
}

async fn update_project(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody<UpdateProjectRequest>,
) -> Result<Json<ClientResponse>> {
    let mut client = fetch_client(&state.db.pool, &id).await?;

    if let Some(day) = body.current_day_of_14 {
        if !(1..=14).contains(&day) {
            return Err(AppError::Validation(
                "current_day_of_14 must be between 1 and 14".to_string(),
            ));
        }
        client.current_day_of_14 = day;
    }
    if let Some(percent) = body.onboarding_percent {
        if !(0..=100).contains(&percent) {
            return Err(AppError::Validation(
                "onboarding_percent must be between 0 and 100".to_string(),
            ));
        }
        client.onboarding_percent = percent;
    }
    if let Some(next_from_us) = body.next_from_us {
        client.next_from_us = next_from_us;
    }
    if let Some(next_from_you) = body.next_from_you {
        client.next_from_you = next_from_you;
    }
    client.updated_at = Utc::now().to_rfc3339();

    sqlx::query(
        "UPDATE clients SET current_day_of_14 = ?, next_from_us = ?, next_from_you = ?, onboarding_percent = ?, updated_at = ? WHERE id = ?",
    )
    .bind(client.current_day_of_14)
    .bind(&client.next_from_us)
    .bind(&client.next_from_you)
    .bind(client.onboarding_percent)
    .bind(&client.updated_at)
    .bind(&client.id)
    .execute(&state.db.pool)
    .await?;

    tracing::info!(client_id = %client.id, "Project progress updated");

    Ok(Json(ClientResponse::from(client)))
}

async fn get_project_phases(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProjectPhasesResponse>> {
    let client = fetch_client(&state.db.pool, &id).await?;
    let kit = KitType::from_stored(&client.plan)?;
    let stored = load_phase_states(&state.db.pool, &client.id).await?;
    let phases = phase_responses(&client.id, kit, &stored);

    Ok(Json(ProjectPhasesResponse {
        client: ClientResponse::from(client),
        kit_type: kit,
        phases,
    }))
}

async fn initialize_phases(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<InitializePhasesResponse>> {
    let client = fetch_client(&state.db.pool, &id).await?;
    let kit = KitType::from_stored(&client.plan)?;
    let now = Utc::now().to_rfc3339();

    let mut created = 0;
    for phase_id in PhaseId::ALL {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO client_phase_state (client_id, phase_id, status, checklist, created_at, updated_at) VALUES (?, ?, 'NOT_STARTED', '{}', ?, ?)",
        )
        .bind(&client.id)
        .bind(phase_id.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&state.db.pool)
        .await?;
        created += result.rows_affected();
    }

    tracing::info!(client_id = %client.id, created, "Phases initialized");

    let stored = load_phase_states(&state.db.pool, &client.id).await?;
    Ok(Json(InitializePhasesResponse {
        created,
        phases: phase_responses(&client.id, kit, &stored),
    }))
}

async fn update_phase_status(
    State(state): State<AppState>,
    Path(params): Path<PhasePathParams>,
    JsonBody(body): JsonBody<UpdatePhaseStatusRequest>,
) -> Result<Json<PhaseResponse>> {
    let phase_id = parse_phase_path(&params)?;
    let status: PhaseStatus = body.status.parse()?;

    let client = fetch_client(&state.db.pool, &params.id).await?;
    let kit = KitType::from_stored(&client.plan)?;
    let previous = load_phase_state(&state.db.pool, &client.id, phase_id).await?;

    let now = Utc::now().to_rfc3339();
    let stamps = phases::transition(previous.as_ref(), status, &now);
    let next = StoredPhase {
        status,
        started_at: stamps.started_at,
        completed_at: stamps.completed_at,
        checklist: previous.map(|p| p.checklist).unwrap_or_default(),
    };

    save_phase_state(&state.db.pool, &client.id, phase_id, &next).await?;

    tracing::info!(client_id = %client.id, phase_id = %phase_id, status = %status, "Phase status updated");

    let merged = phases::merge_one(template_for(kit, phase_id), Some(&next));
    Ok(Json(PhaseResponse::new(&client.id, merged)))
}

async fn update_checklist_item(
    State(state): State<AppState>,
    Path(params): Path<PhasePathParams>,
    JsonBody(body): JsonBody<UpdateChecklistItemRequest>,
) -> Result<Json<PhaseResponse>> {
    let phase_id = parse_phase_path(&params)?;
    let is_done = body
        .is_done
        .ok_or_else(|| AppError::Validation("label and is_done are required".to_string()))?;

    let client = fetch_client(&state.db.pool, &params.id).await?;
    let kit = KitType::from_stored(&client.plan)?;
    let mut next = load_phase_state(&state.db.pool, &client.id, phase_id)
        .await?
        .unwrap_or_default();

    let checklist: Checklist = std::mem::take(&mut next.checklist);
    next.checklist = phases::toggle_checklist(kit, phase_id, checklist, &body.label, is_done)?;

    save_phase_state(&state.db.pool, &client.id, phase_id, &next).await?;

    tracing::info!(
        client_id = %client.id,
        phase_id = %phase_id,
        label = %body.label,
        is_done,
        "Checklist item updated"
    );

    let merged = phases::merge_one(template_for(kit, phase_id), Some(&next));
    Ok(Json(PhaseResponse::new(&client.id, merged)))
}
