use chrono::{DateTime, Utc};
use common::text_enum;
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

text_enum!(
    /// Lifecycle of one reminder workflow run.
    RunStatus {
        Pending => "pending",
        Running => "running",
        Sleeping => "sleeping",
        Retrying => "retrying",
        Completed => "completed",
        Failed => "failed",
    }
);

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

text_enum!(StepKind {
    Run => "run",
    Sleep => "sleep",
});

text_enum!(
    /// `Failed` steps are re-executed on replay; `Exhausted` ones never are.
    StepStatus {
        Completed => "completed",
        Sleeping => "sleeping",
        Failed => "failed",
        Exhausted => "exhausted",
    }
);

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub status: RunStatus,
    pub next_wake_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub lease_until: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    #[serde(skip)]
    pub run_id: Uuid,
    pub kind: StepKind,
    pub label: String,
    pub status: StepStatus,
    pub output: Option<JsonValue>,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub wake_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// New state written when a run is settled. Always releases the lease.
#[derive(Debug, Clone, PartialEq)]
pub struct RunUpdate {
    pub status: RunStatus,
    pub next_wake_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}
