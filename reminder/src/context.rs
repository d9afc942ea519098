use std::{collections::HashMap, future::Future};

use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use log::{debug, warn};
use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    domain::{RunRecord, StepKind, StepRecord, StepStatus},
    ports::WorkflowStore,
};

/// A step body that failed, as recorded in the step log.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("step '{label}' failed after {attempts} attempt(s): {message}")]
pub struct StepError {
    pub label: String,
    pub attempts: i32,
    /// No further attempts will be made for this label.
    pub exhausted: bool,
    pub message: String,
    pub failed_at: DateTime<Utc>,
}

/// Reasons a workflow body stops before reaching its end.
#[derive(Debug, Error)]
pub enum Interrupt {
    /// The run is waiting for `wake_at`; nothing after this point ran.
    #[error("suspended on '{label}' until {wake_at}")]
    Suspended { label: String, wake_at: DateTime<Utc> },
    /// A step the workflow cannot continue without has failed.
    #[error(transparent)]
    Step(StepError),
    /// The step log itself could not be read or written.
    #[error("workflow store error: {0}")]
    Store(#[from] AppError),
}

/// Replay context for one execution of a run.
///
/// The workflow body is re-executed from the top every time the run is
/// claimed. Each side effect goes through `run_step` or `sleep_until`, which
/// consult the step log first so completed work is returned from the log
/// instead of being repeated.
pub struct WorkflowContext<'a> {
    store: &'a dyn WorkflowStore,
    run_id: Uuid,
    started_at: DateTime<Utc>,
    now: DateTime<Utc>,
    max_attempts: i32,
    steps: HashMap<(StepKind, String), StepRecord>,
    failures: Vec<StepError>,
}

impl<'a> WorkflowContext<'a> {
    pub async fn load(
        store: &'a dyn WorkflowStore,
        run: &RunRecord,
        now: DateTime<Utc>,
        max_attempts: i32,
    ) -> Res<Self> {
        let steps = store
            .load_steps(run.id)
            .await?
            .into_iter()
            .map(|step| ((step.kind, step.label.clone()), step))
            .collect();

        Ok(WorkflowContext {
            store,
            run_id: run.id,
            started_at: run.created_at,
            now,
            max_attempts: max_attempts.max(1),
            steps,
            failures: Vec::new(),
        })
    }

    /// Creation time of the run. Stable across replays.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Time of the current execution.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Step failures seen during this execution, replayed exhausted ones included.
    pub fn failures(&self) -> &[StepError] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<StepError> {
        self.failures
    }

    /// Status recorded for the run-step `label`, if it has been attempted.
    pub fn step_status(&self, label: &str) -> Option<StepStatus> {
        self.steps
            .get(&(StepKind::Run, label.to_string()))
            .map(|step| step.status)
    }

    /// Runs `body` once per label. A completed label returns its recorded
    /// output, a failed label is attempted again and an exhausted label
    /// fails without running.
    pub async fn run_step<T, F, Fut>(&mut self, label: &str, body: F) -> Result<T, Interrupt>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Res<T>>,
    {
        let key = (StepKind::Run, label.to_string());
        let previous_attempts = match self.steps.get(&key) {
            Some(step) if step.status == StepStatus::Completed => {
                debug!("Run {}: step '{}' replayed from log", self.run_id, label);
                let output = step.output.clone().unwrap_or(serde_json::Value::Null);
                return serde_json::from_value(output)
                    .map_err(|e| Interrupt::Store(AppError::from(e)));
            }
            Some(step) if step.status == StepStatus::Exhausted => {
                let err = StepError {
                    label: label.to_string(),
                    attempts: step.attempts,
                    exhausted: true,
                    message: step
                        .last_error
                        .clone()
                        .unwrap_or_else(|| "no attempts left".to_string()),
                    failed_at: step.updated_at,
                };
                self.failures.push(err.clone());
                return Err(Interrupt::Step(err));
            }
            Some(step) => step.attempts,
            None => 0,
        };

        let attempts = previous_attempts + 1;
        match body().await {
            Ok(value) => {
                let output = serde_json::to_value(&value).map_err(AppError::from)?;
                self.record(key, StepStatus::Completed, Some(output), attempts, None, None)
                    .await?;
                Ok(value)
            }
            Err(e) => {
                let exhausted = attempts >= self.max_attempts;
                let status = if exhausted {
                    StepStatus::Exhausted
                } else {
                    StepStatus::Failed
                };
                let message = e.to_string();
                warn!(
                    "Run {}: step '{}' attempt {} failed: {}",
                    self.run_id, label, attempts, message
                );
                self.record(key, status, None, attempts, Some(message.clone()), None)
                    .await?;

                let err = StepError {
                    label: label.to_string(),
                    attempts,
                    exhausted,
                    message,
                    failed_at: self.now,
                };
                self.failures.push(err.clone());
                Err(Interrupt::Step(err))
            }
        }
    }

    /// Completes once the current time reaches `wake_at` and returns the time
    /// the run actually resumed. Until then the wake time is recorded and the
    /// body is suspended.
    pub async fn sleep_until(
        &mut self,
        label: &str,
        wake_at: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, Interrupt> {
        let key = (StepKind::Sleep, label.to_string());
        let already_sleeping = match self.steps.get(&key) {
            Some(step) if step.status == StepStatus::Completed => {
                let output = step.output.clone().unwrap_or(serde_json::Value::Null);
                return serde_json::from_value(output)
                    .map_err(|e| Interrupt::Store(AppError::from(e)));
            }
            Some(step) => step.wake_at == Some(wake_at),
            None => false,
        };

        if self.now >= wake_at {
            let resumed_at = self.now;
            let output = serde_json::to_value(resumed_at).map_err(AppError::from)?;
            self.record(key, StepStatus::Completed, Some(output), 1, None, Some(wake_at))
                .await?;
            return Ok(resumed_at);
        }

        if !already_sleeping {
            self.record(key, StepStatus::Sleeping, None, 0, None, Some(wake_at))
                .await?;
        }
        Err(Interrupt::Suspended {
            label: label.to_string(),
            wake_at,
        })
    }

    async fn record(
        &mut self,
        key: (StepKind, String),
        status: StepStatus,
        output: Option<serde_json::Value>,
        attempts: i32,
        last_error: Option<String>,
        wake_at: Option<DateTime<Utc>>,
    ) -> Res<()> {
        let step = StepRecord {
            run_id: self.run_id,
            kind: key.0,
            label: key.1.clone(),
            status,
            output,
            attempts,
            last_error,
            wake_at,
            updated_at: self.now,
        };
        self.store.save_step(step.clone()).await?;
        self.steps.insert(key, step);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryWorkflowStore;
    use chrono::{Duration, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 8, 0, 0).unwrap()
    }

    async fn new_run(store: &MemoryWorkflowStore) -> RunRecord {
        store.create_run(Uuid::new_v4(), t0()).await.unwrap()
    }

    #[tokio::test]
    async fn completed_step_is_not_run_again() {
        let store = MemoryWorkflowStore::new();
        let run = new_run(&store).await;
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let mut ctx = WorkflowContext::load(&store, &run, t0(), 3).await.unwrap();
            let value: u32 = ctx
                .run_step("count", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .await
                .unwrap();
            assert_eq!(value, 42);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_step_runs_again_until_exhausted() {
        let store = MemoryWorkflowStore::new();
        let run = new_run(&store).await;
        let calls = AtomicUsize::new(0);

        let mut outcomes = Vec::new();
        for _ in 0..4 {
            let mut ctx = WorkflowContext::load(&store, &run, t0(), 2).await.unwrap();
            let res: Result<(), Interrupt> = ctx
                .run_step("flaky", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(AppError::Internal("down".to_string()))
                })
                .await;
            match res {
                Err(Interrupt::Step(err)) => outcomes.push((err.attempts, err.exhausted)),
                other => panic!("unexpected {:?}", other),
            }
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(outcomes, vec![(1, false), (2, true), (2, true), (2, true)]);
    }

    #[tokio::test]
    async fn sleep_suspends_then_records_resume_time() {
        let store = MemoryWorkflowStore::new();
        let run = new_run(&store).await;
        let wake_at = t0() + Duration::days(2);

        let mut ctx = WorkflowContext::load(&store, &run, t0(), 3).await.unwrap();
        match ctx.sleep_until("nap", wake_at).await {
            Err(Interrupt::Suspended { wake_at: w, .. }) => assert_eq!(w, wake_at),
            other => panic!("unexpected {:?}", other),
        }

        let resumed = wake_at + Duration::minutes(3);
        let mut ctx = WorkflowContext::load(&store, &run, resumed, 3).await.unwrap();
        assert_eq!(ctx.sleep_until("nap", wake_at).await.unwrap(), resumed);

        // A later replay sees the first resume time.
        let later = resumed + Duration::days(1);
        let mut ctx = WorkflowContext::load(&store, &run, later, 3).await.unwrap();
        assert_eq!(ctx.sleep_until("nap", wake_at).await.unwrap(), resumed);
    }
}
