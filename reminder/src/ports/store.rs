use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::Res;
use uuid::Uuid;

use crate::domain::{RunRecord, RunUpdate, StepRecord};

/// Durable record of workflow runs and their step log.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Creates a pending run for the subscription, or returns the existing one.
    async fn create_run(&self, subscription_id: Uuid, now: DateTime<Utc>) -> Res<RunRecord>;

    async fn get_run(&self, run_id: Uuid) -> Res<Option<RunRecord>>;

    /// Leases up to `limit` runs that are due at `now`, marking them running
    /// until `lease_until`. Runs whose lease expired are claimable again.
    async fn claim_due_runs(
        &self,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
        limit: i64,
    ) -> Res<Vec<RunRecord>>;

    async fn update_run(&self, run_id: Uuid, update: RunUpdate, now: DateTime<Utc>) -> Res<()>;

    async fn load_steps(&self, run_id: Uuid) -> Res<Vec<StepRecord>>;

    /// Inserts or replaces the step identified by `(run_id, kind, label)`.
    async fn save_step(&self, step: StepRecord) -> Res<()>;
}
