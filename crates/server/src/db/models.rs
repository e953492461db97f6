use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AppError;

/// Defines an enum stored as upper-case text in the database and sent as the
/// same text over JSON.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident, $field:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant,)+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }

            /// Parses a value read back from the database. Stored values are
            /// constrained by CHECK clauses, so a mismatch is a server fault.
            pub fn from_stored(value: &str) -> Result<Self, AppError> {
                value.parse().map_err(|_| {
                    AppError::Internal(format!("Unexpected stored {}: {value}", $field))
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = AppError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    _ => Err(AppError::Validation(format!(
                        "{} must be one of: {}",
                        $field,
                        [$($text),+].join(", ")
                    ))),
                }
            }
        }
    };
}

text_enum!(
    /// Product tier; selects which phase template applies to a client.
    KitType, "kit_type" {
        Launch => "LAUNCH",
        Growth => "GROWTH",
    }
);

text_enum!(
    PhaseId, "phase_id" {
        Phase1 => "PHASE_1",
        Phase2 => "PHASE_2",
        Phase3 => "PHASE_3",
        Phase4 => "PHASE_4",
    }
);

text_enum!(
    PhaseStatus, "status" {
        NotStarted => "NOT_STARTED",
        InProgress => "IN_PROGRESS",
        WaitingOnClient => "WAITING_ON_CLIENT",
        Done => "DONE",
    }
);

text_enum!(
    TaskType, "type" {
        UploadFile => "UPLOAD_FILE",
        SendInfo => "SEND_INFO",
        ProvideDetails => "PROVIDE_DETAILS",
        Review => "REVIEW",
        Other => "OTHER",
    }
);

text_enum!(
    TaskStatus, "status" {
        Pending => "PENDING",
        InProgress => "IN_PROGRESS",
        Completed => "COMPLETED",
        Cancelled => "CANCELLED",
    }
);

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Admin {
    pub id: String,
    pub email: String,
    pub name: String,
    pub password_hash: Option<String>,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Client {
    pub id: String,
    pub user_id: Option<String>,
    pub name: Option<String>,
    pub email: String,
    pub plan: String,
    pub current_day_of_14: i64,
    pub next_from_us: Option<String>,
    pub next_from_you: Option<String>,
    pub onboarding_percent: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ClientPhaseState {
    pub client_id: String,
    pub phase_id: String,
    pub status: String,
    pub started_at: Option<String>,
    pub completed_at: Option<String>,
    pub checklist: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Task {
    pub id: String,
    pub client_id: String,
    pub title: String,
    pub description: Option<String>,
    #[sqlx(rename = "type")]
    pub task_type: String,
    pub status: String,
    pub due_date: Option<String>,
    pub completed_at: Option<String>,
    pub attachments: String,
    pub metadata: String,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Task {
    /// Stored metadata as JSON; unreadable text becomes `null`.
    pub fn metadata_json(&self) -> Value {
        serde_json::from_str(&self.metadata).unwrap_or(Value::Null)
    }

    /// Stored attachment list; anything other than a JSON array becomes empty.
    pub fn attachments_json(&self) -> Value {
        match serde_json::from_str(&self.attachments) {
            Ok(Value::Array(items)) => Value::Array(items),
            _ => Value::Array(Vec::new()),
        }
    }
}

/// A task joined with the owning client's summary columns.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskWithClient {
    #[sqlx(flatten)]
    pub task: Task,
    pub client_name: Option<String>,
    pub client_email: String,
    pub client_plan: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QuizSubmission {
    pub id: String,
    pub full_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub brand_name: Option<String>,
    pub logo_status: Option<String>,
    pub brand_goals: String,
    pub online_presence: Option<String>,
    pub audience: String,
    pub brand_style: Option<String>,
    pub timeline: Option<String>,
    pub preferred_kit: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Decodes a stored JSON array of strings, skipping anything that is not a string.
pub fn string_list(raw: &str) -> Vec<String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
