//! Static delivery-phase templates and the merge of a template with a client's
//! stored phase state.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::Value;

use crate::{
    db::models::{KitType, PhaseId, PhaseStatus},
    error::{AppError, Result},
};

/// Checklist completion keyed by item label.
pub type Checklist = BTreeMap<String, bool>;

#[derive(Debug, Clone, Copy)]
pub struct PhaseTemplate {
    pub phase_number: u8,
    pub phase_id: PhaseId,
    pub title: &'static str,
    pub subtitle: &'static str,
    pub day_range: &'static str,
    pub checklist: &'static [&'static str],
}

impl PhaseTemplate {
    pub fn has_item(&self, label: &str) -> bool {
        self.checklist.iter().any(|item| *item == label)
    }
}

pub const LAUNCH_KIT_PHASES: [PhaseTemplate; 4] = [
    PhaseTemplate {
        phase_number: 1,
        phase_id: PhaseId::Phase1,
        title: "Inputs & clarity",
        subtitle: "Lock the message and plan.",
        day_range: "Days 0-2",
        checklist: &[
            "Onboarding steps completed",
            "Brand / strategy call completed",
            "Simple 14 day plan agreed",
        ],
    },
    PhaseTemplate {
        phase_number: 2,
        phase_id: PhaseId::Phase2,
        title: "Words that sell",
        subtitle: "We write your 3 pages.",
        day_range: "Days 3-5",
        checklist: &[
            "Draft homepage copy ready",
            "Draft offer / services page ready",
            "Draft contact / about copy ready",
            "You reviewed and approved copy",
        ],
    },
    PhaseTemplate {
        phase_number: 3,
        phase_id: PhaseId::Phase3,
        title: "Design & build",
        subtitle: "We turn copy into a 3 page site.",
        day_range: "Days 6-10",
        checklist: &[
            "Site layout built for all 3 pages",
            "Mobile checks done",
            "Testimonials and proof added",
            "Staging link shared with you",
        ],
    },
    PhaseTemplate {
        phase_number: 4,
        phase_id: PhaseId::Phase4,
        title: "Test & launch",
        subtitle: "We connect domain, test and go live.",
        day_range: "Days 11-14",
        checklist: &[
            "Forms tested",
            "Domain connected",
            "Final checks completed",
            "Site is live",
        ],
    },
];

pub const GROWTH_KIT_PHASES: [PhaseTemplate; 4] = [
    PhaseTemplate {
        phase_number: 1,
        phase_id: PhaseId::Phase1,
        title: "Strategy locked in",
        subtitle: "Offer, goal and funnel map agreed.",
        day_range: "Days 0-2",
        checklist: &[
            "Onboarding steps completed",
            "Strategy call completed",
            "Funnel map agreed",
        ],
    },
    PhaseTemplate {
        phase_number: 2,
        phase_id: PhaseId::Phase2,
        title: "Copy & email engine",
        subtitle: "We write your site copy and 5 emails.",
        day_range: "Days 3-5",
        checklist: &[
            "Homepage copy ready",
            "Offer page copy ready",
            "5 email sequences written",
            "Copy reviewed and approved",
        ],
    },
    PhaseTemplate {
        phase_number: 3,
        phase_id: PhaseId::Phase3,
        title: "Build the funnel",
        subtitle: "Pages, lead magnet and blog hub built.",
        day_range: "Days 6-10",
        checklist: &[
            "All pages built",
            "Lead magnet created",
            "Blog hub set up",
            "Email sequences integrated",
            "Staging link shared",
        ],
    },
    PhaseTemplate {
        phase_number: 4,
        phase_id: PhaseId::Phase4,
        title: "Test, launch & handover",
        subtitle: "We test the full journey and go live.",
        day_range: "Days 11-14",
        checklist: &[
            "Full funnel tested",
            "Email sequences tested",
            "Domain connected",
            "Analytics set up",
            "Site is live",
        ],
    },
];

pub fn templates_for(kit: KitType) -> &'static [PhaseTemplate] {
    match kit {
        KitType::Launch => &LAUNCH_KIT_PHASES,
        KitType::Growth => &GROWTH_KIT_PHASES,
    }
}

pub fn template_for(kit: KitType, phase_id: PhaseId) -> &'static PhaseTemplate {
    // Both kits define every phase id exactly once.
    templates_for(kit)
        .iter()
        .find(|t| t.phase_id == phase_id)
        .unwrap_or(&templates_for(kit)[0])
}

/// Phase state as persisted for one client.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredPhase {
    pub status: PhaseStatus,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub checklist: Checklist,
}

impl Default for StoredPhase {
    fn default() -> Self {
        Self {
            status: PhaseStatus::NotStarted,
            started_at: None,
            completed_at: None,
            checklist: Checklist::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecklistSource {
    Database,
    Template,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedChecklistItem {
    pub label: String,
    pub is_done: bool,
    pub sort_order: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedPhase {
    pub phase_number: u8,
    pub phase_id: PhaseId,
    pub title: &'static str,
    pub subtitle: &'static str,
    pub day_range: &'static str,
    pub status: PhaseStatus,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub checklist_items: Vec<MergedChecklistItem>,
    pub source: ChecklistSource,
}

/// Reads a stored checklist blob. Values count as done when they are `true`,
/// `"true"` or `1`; anything that is not a JSON object yields an empty checklist.
pub fn parse_checklist(raw: Option<&str>) -> Checklist {
    let Some(raw) = raw else {
        return Checklist::new();
    };

    let value = match serde_json::from_str::<Value>(raw) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(error = %err, "Discarding unreadable checklist");
            return Checklist::new();
        }
    };

    // Double-encoded blobs arrive as a JSON string holding the object.
    let value = match value {
        Value::String(inner) => serde_json::from_str(&inner).unwrap_or(Value::Null),
        other => other,
    };

    match value {
        Value::Object(entries) => entries
            .into_iter()
            .map(|(label, done)| {
                let done = matches!(done, Value::Bool(true))
                    || done.as_str() == Some("true")
                    || done.as_i64() == Some(1);
                (label, done)
            })
            .collect(),
        _ => Checklist::new(),
    }
}

/// Combines the kit's template with stored state, in template order.
pub fn merge(kit: KitType, stored: &HashMap<PhaseId, StoredPhase>) -> Vec<MergedPhase> {
    templates_for(kit)
        .iter()
        .map(|template| merge_one(template, stored.get(&template.phase_id)))
        .collect()
}

pub fn merge_one(template: &PhaseTemplate, stored: Option<&StoredPhase>) -> MergedPhase {
    let default_state = StoredPhase::default();
    let state = stored.unwrap_or(&default_state);

    let checklist_items = template
        .checklist
        .iter()
        .enumerate()
        .map(|(index, label)| MergedChecklistItem {
            label: (*label).to_string(),
            is_done: state.checklist.get(*label).copied().unwrap_or(false),
            sort_order: index + 1,
        })
        .collect();

    let source = if state.checklist.is_empty() {
        ChecklistSource::Template
    } else {
        ChecklistSource::Database
    };

    MergedPhase {
        phase_number: template.phase_number,
        phase_id: template.phase_id,
        title: template.title,
        subtitle: template.subtitle,
        day_range: template.day_range,
        status: state.status,
        started_at: state.started_at.clone(),
        completed_at: state.completed_at.clone(),
        checklist_items,
        source,
    }
}

/// Timestamps after moving a phase to `status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseTimestamps {
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
}

/// `started_at` is stamped the first time a phase leaves `NOT_STARTED` and kept
/// from then on. `completed_at` tracks `DONE`: stamped on entry, kept while the
/// phase stays done, cleared otherwise.
pub fn transition(previous: Option<&StoredPhase>, status: PhaseStatus, now: &str) -> PhaseTimestamps {
    let prev_started = previous.and_then(|p| p.started_at.clone());
    let prev_completed = previous
        .filter(|p| p.status == PhaseStatus::Done)
        .and_then(|p| p.completed_at.clone());

    let started_at = match (prev_started, status) {
        (Some(started), _) => Some(started),
        (None, PhaseStatus::NotStarted) => None,
        (None, _) => Some(now.to_string()),
    };

    let completed_at = match status {
        PhaseStatus::Done => Some(prev_completed.unwrap_or_else(|| now.to_string())),
        _ => None,
    };

    PhaseTimestamps {
        started_at,
        completed_at,
    }
}

/// Sets one checklist item, rejecting labels the phase template does not define.
pub fn toggle_checklist(
    kit: KitType,
    phase_id: PhaseId,
    mut checklist: Checklist,
    label: &str,
    is_done: bool,
) -> Result<Checklist> {
    let template = template_for(kit, phase_id);
    if !template.has_item(label) {
        return Err(AppError::Validation(format!(
            "'{label}' is not a checklist item of {phase_id} for the {kit} kit"
        )));
    }
    checklist.insert(label.to_string(), is_done);
    Ok(checklist)
}
