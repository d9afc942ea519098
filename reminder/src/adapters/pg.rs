use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use db::{
    dtos::workflow::{RunUpdate as RunRow, StepUpsert},
    models::{
        subscription::SubscriptionWithOwner,
        workflow::{WorkflowRun, WorkflowStep},
    },
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    domain::{Owner, Plan, RunRecord, RunUpdate, StepRecord, SubscriptionSnapshot},
    ports::{SubscriptionLookup, WorkflowStore},
};

fn corrupt(what: &str, err: String) -> AppError {
    AppError::Internal(format!("Invalid {} in database: {}", what, err))
}

impl TryFrom<WorkflowRun> for RunRecord {
    type Error = AppError;

    fn try_from(run: WorkflowRun) -> Res<Self> {
        Ok(RunRecord {
            id: run.id,
            subscription_id: run.subscription_id,
            status: run.status.parse().map_err(|e| corrupt("run status", e))?,
            next_wake_at: run.next_wake_at,
            lease_until: run.lease_until,
            last_error: run.last_error,
            created_at: run.created_at,
            updated_at: run.updated_at,
        })
    }
}

impl TryFrom<WorkflowStep> for StepRecord {
    type Error = AppError;

    fn try_from(step: WorkflowStep) -> Res<Self> {
        Ok(StepRecord {
            run_id: step.run_id,
            kind: step.kind.parse().map_err(|e| corrupt("step kind", e))?,
            label: step.label,
            status: step.status.parse().map_err(|e| corrupt("step status", e))?,
            output: step.output,
            attempts: step.attempts,
            last_error: step.last_error,
            wake_at: step.wake_at,
            updated_at: step.updated_at,
        })
    }
}

impl TryFrom<SubscriptionWithOwner> for SubscriptionSnapshot {
    type Error = AppError;

    fn try_from(row: SubscriptionWithOwner) -> Res<Self> {
        let sub = row.subscription;
        Ok(SubscriptionSnapshot {
            id: sub.id,
            status: sub
                .status
                .parse()
                .map_err(|e| corrupt("subscription status", e))?,
            renewal_date: sub.renewal_date,
            owner: Owner {
                name: row.owner_name,
                email: row.owner_email,
            },
            plan: Plan {
                name: sub.name,
                price: sub.price,
                currency: sub.currency,
                frequency: sub.frequency,
                payment_method: sub.payment_method,
            },
        })
    }
}

/// `WorkflowStore` backed by the `workflow_runs` and `workflow_steps` tables.
pub struct PgWorkflowStore {
    pool: Arc<PgPool>,
}

impl PgWorkflowStore {
    pub fn new(pool: Arc<PgPool>) -> Self {
        PgWorkflowStore { pool }
    }
}

#[async_trait]
impl WorkflowStore for PgWorkflowStore {
    async fn create_run(&self, subscription_id: Uuid, now: DateTime<Utc>) -> Res<RunRecord> {
        db::workflow::insert_run_if_absent(&self.pool, subscription_id, now)
            .await?
            .try_into()
    }

    async fn get_run(&self, run_id: Uuid) -> Res<Option<RunRecord>> {
        db::workflow::get_run(self.pool.as_ref(), run_id)
            .await?
            .map(RunRecord::try_from)
            .transpose()
    }

    async fn claim_due_runs(
        &self,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
        limit: i64,
    ) -> Res<Vec<RunRecord>> {
        db::workflow::claim_due_runs(self.pool.as_ref(), now, lease_until, limit)
            .await?
            .into_iter()
            .map(RunRecord::try_from)
            .collect()
    }

    async fn update_run(&self, run_id: Uuid, update: RunUpdate, now: DateTime<Utc>) -> Res<()> {
        let row = RunRow {
            status: update.status.to_string(),
            next_wake_at: update.next_wake_at,
            last_error: update.last_error,
        };
        db::workflow::update_run(self.pool.as_ref(), run_id, row, now).await
    }

    async fn load_steps(&self, run_id: Uuid) -> Res<Vec<StepRecord>> {
        db::workflow::get_steps(self.pool.as_ref(), run_id)
            .await?
            .into_iter()
            .map(StepRecord::try_from)
            .collect()
    }

    async fn save_step(&self, step: StepRecord) -> Res<()> {
        let updated_at = step.updated_at;
        let row = StepUpsert {
            run_id: step.run_id,
            kind: step.kind.to_string(),
            label: step.label,
            status: step.status.to_string(),
            output: step.output,
            attempts: step.attempts,
            last_error: step.last_error,
            wake_at: step.wake_at,
        };
        db::workflow::upsert_step(self.pool.as_ref(), row, updated_at).await
    }
}

pub struct PgSubscriptionLookup {
    pool: Arc<PgPool>,
}

impl PgSubscriptionLookup {
    pub fn new(pool: Arc<PgPool>) -> Self {
        PgSubscriptionLookup { pool }
    }
}

#[async_trait]
impl SubscriptionLookup for PgSubscriptionLookup {
    async fn get_with_owner(&self, id: Uuid) -> Res<Option<SubscriptionSnapshot>> {
        db::subscription::get_subscription_with_owner(self.pool.as_ref(), id)
            .await?
            .map(SubscriptionSnapshot::try_from)
            .transpose()
    }
}
