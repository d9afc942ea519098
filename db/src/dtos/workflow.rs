use chrono::{DateTime, Utc};
use sqlx::types::JsonValue;
use uuid::Uuid;

pub struct RunUpdate {
    pub status: String,
    pub next_wake_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

pub struct StepUpsert {
    pub run_id: Uuid,
    pub kind: String,
    pub label: String,
    pub status: String,
    pub output: Option<JsonValue>,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub wake_at: Option<DateTime<Utc>>,
}
