use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    domain::{RunRecord, RunStatus, RunUpdate, StepKind, StepRecord},
    ports::WorkflowStore,
};

#[derive(Default)]
struct State {
    runs: HashMap<Uuid, RunRecord>,
    /// subscription id -> run id
    by_subscription: HashMap<Uuid, Uuid>,
    steps: HashMap<(Uuid, StepKind, String), StepRecord>,
}

/// Process-local `WorkflowStore`. Used in tests and when no database is wired.
#[derive(Default)]
pub struct MemoryWorkflowStore {
    state: Mutex<State>,
}

impl MemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_due(run: &RunRecord, now: DateTime<Utc>) -> bool {
    match run.status {
        RunStatus::Pending | RunStatus::Sleeping | RunStatus::Retrying => {
            run.next_wake_at.is_none_or(|at| at <= now)
        }
        RunStatus::Running => run.lease_until.is_some_and(|until| until <= now),
        RunStatus::Completed | RunStatus::Failed => false,
    }
}

#[async_trait]
impl WorkflowStore for MemoryWorkflowStore {
    async fn create_run(&self, subscription_id: Uuid, now: DateTime<Utc>) -> Res<RunRecord> {
        let mut state = self.state.lock().await;
        if let Some(run_id) = state.by_subscription.get(&subscription_id) {
            if let Some(run) = state.runs.get(run_id) {
                return Ok(run.clone());
            }
        }

        let run = RunRecord {
            id: Uuid::new_v4(),
            subscription_id,
            status: RunStatus::Pending,
            next_wake_at: Some(now),
            lease_until: None,
            last_error: None,
            created_at: now,
            updated_at: now,
        };
        state.by_subscription.insert(subscription_id, run.id);
        state.runs.insert(run.id, run.clone());
        Ok(run)
    }

    async fn get_run(&self, run_id: Uuid) -> Res<Option<RunRecord>> {
        Ok(self.state.lock().await.runs.get(&run_id).cloned())
    }

    async fn claim_due_runs(
        &self,
        now: DateTime<Utc>,
        lease_until: DateTime<Utc>,
        limit: i64,
    ) -> Res<Vec<RunRecord>> {
        let mut state = self.state.lock().await;
        let mut due: Vec<&mut RunRecord> = state
            .runs
            .values_mut()
            .filter(|run| is_due(run, now))
            .collect();
        due.sort_by_key(|run| (run.next_wake_at, run.created_at));

        let limit = usize::try_from(limit.max(0)).unwrap_or(usize::MAX);
        Ok(due
            .into_iter()
            .take(limit)
            .map(|run| {
                run.status = RunStatus::Running;
                run.lease_until = Some(lease_until);
                run.updated_at = now;
                run.clone()
            })
            .collect())
    }

    async fn update_run(&self, run_id: Uuid, update: RunUpdate, now: DateTime<Utc>) -> Res<()> {
        let mut state = self.state.lock().await;
        let run = state
            .runs
            .get_mut(&run_id)
            .ok_or_else(|| AppError::NotFound(format!("Workflow run {}", run_id)))?;
        run.status = update.status;
        run.next_wake_at = update.next_wake_at;
        run.last_error = update.last_error;
        run.lease_until = None;
        run.updated_at = now;
        Ok(())
    }

    async fn load_steps(&self, run_id: Uuid) -> Res<Vec<StepRecord>> {
        let state = self.state.lock().await;
        let mut steps: Vec<StepRecord> = state
            .steps
            .values()
            .filter(|step| step.run_id == run_id)
            .cloned()
            .collect();
        steps.sort_by_key(|step| step.updated_at);
        Ok(steps)
    }

    async fn save_step(&self, step: StepRecord) -> Res<()> {
        let mut state = self.state.lock().await;
        state
            .steps
            .insert((step.run_id, step.kind, step.label.clone()), step);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn one_run_per_subscription() {
        let store = MemoryWorkflowStore::new();
        let sub = Uuid::new_v4();

        let first = store.create_run(sub, t0()).await.unwrap();
        let second = store
            .create_run(sub, t0() + Duration::hours(1))
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.created_at, t0());
    }

    #[tokio::test]
    async fn claimed_run_is_leased_until_expiry() {
        let store = MemoryWorkflowStore::new();
        let run = store.create_run(Uuid::new_v4(), t0()).await.unwrap();
        let lease_until = t0() + Duration::minutes(5);

        let claimed = store.claim_due_runs(t0(), lease_until, 10).await.unwrap();
        assert_eq!(claimed.len(), 1);
        assert_eq!(claimed[0].status, RunStatus::Running);

        let again = store.claim_due_runs(t0(), lease_until, 10).await.unwrap();
        assert!(again.is_empty());

        let after_expiry = store
            .claim_due_runs(lease_until, lease_until + Duration::minutes(5), 10)
            .await
            .unwrap();
        assert_eq!(after_expiry.len(), 1);
        assert_eq!(after_expiry[0].id, run.id);
    }

    #[tokio::test]
    async fn sleeping_run_is_not_due_before_wake_time() {
        let store = MemoryWorkflowStore::new();
        let run = store.create_run(Uuid::new_v4(), t0()).await.unwrap();
        let wake_at = t0() + Duration::days(3);
        store
            .update_run(
                run.id,
                RunUpdate {
                    status: RunStatus::Sleeping,
                    next_wake_at: Some(wake_at),
                    last_error: None,
                },
                t0(),
            )
            .await
            .unwrap();

        let lease = Duration::minutes(5);
        assert!(store.claim_due_runs(t0(), t0() + lease, 10).await.unwrap().is_empty());
        assert_eq!(
            store.claim_due_runs(wake_at, wake_at + lease, 10).await.unwrap().len(),
            1
        );
    }
}
