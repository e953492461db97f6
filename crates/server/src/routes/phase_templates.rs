use axum::{
    extract::Query,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    db::models::{KitType, PhaseId},
    error::{AppError, Result},
    services::phases::{templates_for, PhaseTemplate},
    AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(get_phase_templates))
}

#[derive(Debug, Deserialize)]
pub struct PhaseTemplateQuery {
    pub kit_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChecklistItemTemplate {
    pub label: &'static str,
    pub sort_order: usize,
}

#[derive(Debug, Serialize)]
pub struct PhaseTemplateResponse {
    pub phase_number: u8,
    pub phase_id: PhaseId,
    pub title: &'static str,
    pub subtitle: &'static str,
    pub day_range: &'static str,
    pub checklist_items: Vec<ChecklistItemTemplate>,
}

impl From<&PhaseTemplate> for PhaseTemplateResponse {
    fn from(template: &PhaseTemplate) -> Self {
        Self {
            phase_number: template.phase_number,
            phase_id: template.phase_id,
            title: template.title,
            subtitle: template.subtitle,
            day_range: template.day_range,
            checklist_items: template
                .checklist
                .iter()
                .enumerate()
                .map(|(index, label)| ChecklistItemTemplate {
                    label: *label,
                    sort_order: index + 1,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PhaseTemplatesResponse {
    pub kit_type: KitType,
    pub phase_templates: Vec<PhaseTemplateResponse>,
}

async fn get_phase_templates(
    Query(query): Query<PhaseTemplateQuery>,
) -> Result<Json<PhaseTemplatesResponse>> {
    let kit_type: KitType = query
        .kit_type
        .as_deref()
        .ok_or_else(|| {
            AppError::Validation("kit_type is required and must be LAUNCH or GROWTH".to_string())
        })?
        .parse()?;

    Ok(Json(PhaseTemplatesResponse {
        kit_type,
        phase_templates: templates_for(kit_type)
            .iter()
            .map(PhaseTemplateResponse::from)
            .collect(),
    }))
}
