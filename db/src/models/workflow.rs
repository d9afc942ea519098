use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::types::JsonValue;
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct WorkflowRun {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub status: String,
    pub next_wake_at: Option<DateTime<Utc>>,
    pub lease_until: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct WorkflowStep {
    pub run_id: Uuid,
    pub kind: String,
    pub label: String,
    pub status: String,
    pub output: Option<JsonValue>,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub wake_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}
