use std::{sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Duration, Utc};
use common::{env_config::WorkflowConfig, error::Res};
use futures::future::join_all;
use log::{debug, error, info, warn};

use crate::{
    context::{Interrupt, StepError, WorkflowContext},
    domain::{RunRecord, RunStatus, RunUpdate},
    ports::{Clock, WorkflowStore},
    scheduler::{ReminderScheduler, RunOutcome},
};

/// Exponential backoff for failed steps.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub base_delay: StdDuration,
    pub multiplier: f64,
}

impl RetryPolicy {
    /// `base_delay * multiplier^(attempts - 1)`; `attempts` counts from 1.
    pub fn next_delay(&self, attempts: u32) -> StdDuration {
        let exponent = i32::try_from(attempts.saturating_sub(1)).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        StdDuration::try_from_secs_f64(secs).unwrap_or(StdDuration::MAX)
    }

    fn retry_at(&self, failure: &StepError) -> DateTime<Utc> {
        let attempts = u32::try_from(failure.attempts).unwrap_or(1);
        let delay = Duration::from_std(self.next_delay(attempts)).unwrap_or(Duration::MAX);
        failure
            .failed_at
            .checked_add_signed(delay)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// Polls the store for due runs and executes them.
pub struct Runner {
    store: Arc<dyn WorkflowStore>,
    scheduler: Arc<ReminderScheduler>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    lease: Duration,
    batch_size: i64,
    max_attempts: i32,
    poll_interval: StdDuration,
}

impl Runner {
    pub fn new(
        store: Arc<dyn WorkflowStore>,
        scheduler: Arc<ReminderScheduler>,
        clock: Arc<dyn Clock>,
        config: &WorkflowConfig,
    ) -> Self {
        Runner {
            store,
            scheduler,
            clock,
            retry: RetryPolicy {
                base_delay: StdDuration::from_secs(config.retry_base_delay_secs),
                multiplier: config.retry_multiplier,
            },
            lease: Duration::seconds(config.lease_secs),
            batch_size: config.batch_size,
            max_attempts: config.max_step_attempts,
            poll_interval: StdDuration::from_secs(config.poll_interval_secs.max(1)),
        }
    }

    /// Runs forever, one tick per poll interval.
    pub async fn run(self: Arc<Self>) {
        info!(
            "Workflow runner started, polling every {:?}",
            self.poll_interval
        );
        let mut interval = tokio::time::interval(self.poll_interval);
        loop {
            interval.tick().await;
            if let Err(e) = self.tick().await {
                error!("Workflow runner tick failed: {}", e);
            }
        }
    }

    /// Claims due runs and executes them concurrently. Returns how many were claimed.
    pub async fn tick(&self) -> Res<usize> {
        let now = self.clock.now();
        let claimed = self
            .store
            .claim_due_runs(now, now + self.lease, self.batch_size)
            .await?;
        if claimed.is_empty() {
            return Ok(0);
        }

        debug!("Claimed {} workflow run(s)", claimed.len());
        let results = join_all(claimed.iter().map(|run| self.execute_run(run))).await;
        for (run, result) in claimed.iter().zip(results) {
            if let Err(e) = result {
                // Lease expiry makes the run claimable again.
                error!("Could not settle workflow run {}: {}", run.id, e);
            }
        }
        Ok(claimed.len())
    }

    /// Replays one claimed run and writes its new state.
    pub async fn execute_run(&self, run: &RunRecord) -> Res<RunStatus> {
        let now = self.clock.now();
        let update = match WorkflowContext::load(self.store.as_ref(), run, now, self.max_attempts)
            .await
        {
            Ok(mut ctx) => {
                let result = self.scheduler.execute(&mut ctx, run.subscription_id).await;
                self.settle(run, result, ctx.into_failures(), now)
            }
            Err(e) => self.settle(run, Err(Interrupt::Store(e)), Vec::new(), now),
        };

        let status = update.status;
        self.store.update_run(run.id, update, now).await?;
        Ok(status)
    }

    fn settle(
        &self,
        run: &RunRecord,
        result: Result<RunOutcome, Interrupt>,
        failures: Vec<StepError>,
        now: DateTime<Utc>,
    ) -> RunUpdate {
        let next_retry = failures
            .iter()
            .filter(|f| !f.exhausted)
            .map(|f| self.retry.retry_at(f))
            .min();
        let last_error = summarize(&failures);

        match result {
            Ok(outcome) => match next_retry {
                Some(at) => {
                    info!(
                        "Workflow run {} finished with failed steps, retrying at {}",
                        run.id, at
                    );
                    RunUpdate {
                        status: RunStatus::Retrying,
                        next_wake_at: Some(at),
                        last_error,
                    }
                }
                None => {
                    info!("Workflow run {} completed: {:?}", run.id, outcome);
                    RunUpdate {
                        status: RunStatus::Completed,
                        next_wake_at: None,
                        last_error,
                    }
                }
            },
            Err(Interrupt::Suspended { label, wake_at }) => {
                let next_wake_at = next_retry.map_or(wake_at, |at| at.min(wake_at));
                debug!(
                    "Workflow run {} sleeping on '{}' until {}",
                    run.id, label, next_wake_at
                );
                RunUpdate {
                    status: RunStatus::Sleeping,
                    next_wake_at: Some(next_wake_at),
                    last_error,
                }
            }
            Err(Interrupt::Step(failure)) if failure.exhausted => {
                error!("Workflow run {} failed: {}", run.id, failure);
                RunUpdate {
                    status: RunStatus::Failed,
                    next_wake_at: None,
                    last_error: Some(failure.to_string()),
                }
            }
            Err(Interrupt::Step(failure)) => RunUpdate {
                status: RunStatus::Retrying,
                next_wake_at: Some(self.retry.retry_at(&failure)),
                last_error: Some(failure.to_string()),
            },
            Err(Interrupt::Store(e)) => {
                warn!("Workflow run {} hit a store error: {}", run.id, e);
                let delay = Duration::from_std(self.retry.base_delay).unwrap_or(Duration::MAX);
                RunUpdate {
                    status: RunStatus::Retrying,
                    next_wake_at: now.checked_add_signed(delay),
                    last_error: Some(e.to_string()),
                }
            }
        }
    }
}

fn summarize(failures: &[StepError]) -> Option<String> {
    if failures.is_empty() {
        return None;
    }
    Some(
        failures
            .iter()
            .map(StepError::to_string)
            .collect::<Vec<_>>()
            .join("; "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ports::{FixedClock, NotificationSender, SubscriptionLookup},
        scheduler::SchedulerConfig,
        store::MemoryWorkflowStore,
        testing::{FlakySender, RecordingSender, StubLookup, UnavailableLookup, snapshot, t0},
    };
    use common::misc::SubscriptionStatus;
    use rstest::rstest;
    use std::sync::atomic::Ordering;

    struct Harness {
        store: Arc<MemoryWorkflowStore>,
        clock: Arc<FixedClock>,
        runner: Runner,
    }

    fn harness(lookup: Arc<dyn SubscriptionLookup>, sender: Arc<dyn NotificationSender>) -> Harness {
        let store = Arc::new(MemoryWorkflowStore::new());
        let clock = Arc::new(FixedClock::new(t0()));
        let scheduler = Arc::new(ReminderScheduler::new(
            lookup,
            sender,
            SchedulerConfig::default(),
        ));
        let runner = Runner::new(
            store.clone(),
            scheduler,
            clock.clone(),
            &WorkflowConfig::default(),
        );
        Harness {
            store,
            clock,
            runner,
        }
    }

    impl Harness {
        async fn run_state(&self, run: &RunRecord) -> RunRecord {
            self.store.get_run(run.id).await.unwrap().unwrap()
        }

        /// Ticks at each wake time until the run is terminal.
        async fn run_to_end(&self, run: &RunRecord) -> RunRecord {
            for _ in 0..32 {
                self.runner.tick().await.unwrap();
                let state = self.run_state(run).await;
                match state.next_wake_at {
                    Some(at) if !state.status.is_terminal() => self.clock.set(at),
                    _ => return state,
                }
            }
            panic!("run did not finish");
        }
    }

    #[rstest]
    #[case(1, 1)]
    #[case(2, 2)]
    #[case(3, 4)]
    fn backoff_doubles_per_attempt(#[case] attempts: u32, #[case] minutes: u64) {
        let policy = RetryPolicy {
            base_delay: StdDuration::from_secs(60),
            multiplier: 2.0,
        };
        assert_eq!(policy.next_delay(attempts), StdDuration::from_secs(minutes * 60));
    }

    #[tokio::test]
    async fn sleeping_run_wakes_at_each_checkpoint() {
        let sub = snapshot(Duration::days(10), SubscriptionStatus::Active, "ada@example.com");
        let sender = Arc::new(RecordingSender::default());
        let h = harness(Arc::new(StubLookup(Some(sub.clone()))), sender.clone());
        let run = h.store.create_run(sub.id, t0()).await.unwrap();

        assert_eq!(h.runner.tick().await.unwrap(), 1);
        let state = h.run_state(&run).await;
        assert_eq!(state.status, RunStatus::Sleeping);
        assert_eq!(state.next_wake_at, Some(sub.renewal_date - Duration::days(7)));

        // Not due yet.
        h.clock.advance(Duration::days(1));
        assert_eq!(h.runner.tick().await.unwrap(), 0);

        let done = h.run_to_end(&run).await;
        assert_eq!(done.status, RunStatus::Completed);
        assert_eq!(done.last_error, None);
        assert_eq!(sender.labels().len(), 4);
    }

    #[tokio::test]
    async fn failed_send_is_retried_with_backoff() {
        let sub = snapshot(Duration::days(3), SubscriptionStatus::Active, "ada@example.com");
        let sender = Arc::new(FlakySender::new(1));
        let h = harness(Arc::new(StubLookup(Some(sub.clone()))), sender.clone());
        let run = h.store.create_run(sub.id, t0()).await.unwrap();

        h.runner.tick().await.unwrap();
        let two_days = sub.renewal_date - Duration::days(2);
        h.clock.set(two_days);
        h.runner.tick().await.unwrap();

        let state = h.run_state(&run).await;
        assert_eq!(state.status, RunStatus::Sleeping);
        assert_eq!(state.next_wake_at, Some(two_days + Duration::minutes(1)));
        assert!(state.last_error.unwrap().contains("mail API unavailable"));

        let done = h.run_to_end(&run).await;
        assert_eq!(done.status, RunStatus::Completed);
        // One failure, then the 2-day and 1-day reminders.
        assert_eq!(sender.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unavailable_lookup_fails_run_after_max_attempts() {
        let lookup = Arc::new(UnavailableLookup::default());
        let h = harness(lookup.clone(), Arc::new(RecordingSender::default()));
        let run = h.store.create_run(uuid::Uuid::new_v4(), t0()).await.unwrap();

        let done = h.run_to_end(&run).await;

        assert_eq!(done.status, RunStatus::Failed);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 3);
        assert!(done.last_error.unwrap().contains("get subscription"));
    }

    #[tokio::test]
    async fn missing_email_completes_with_exhausted_dispatches() {
        let sub = snapshot(Duration::days(3), SubscriptionStatus::Active, "");
        let sender = Arc::new(RecordingSender::default());
        let h = harness(Arc::new(StubLookup(Some(sub.clone()))), sender.clone());
        let run = h.store.create_run(sub.id, t0()).await.unwrap();

        let done = h.run_to_end(&run).await;

        assert_eq!(done.status, RunStatus::Completed);
        assert!(sender.labels().is_empty());
        let error = done.last_error.unwrap();
        assert!(error.contains(&format!("Reminder-{}-2", sub.id)));
        assert!(error.contains(&format!("Reminder-{}-1", sub.id)));
    }

    #[tokio::test]
    async fn expired_lease_is_recovered_without_resending() {
        let sub = snapshot(Duration::days(10), SubscriptionStatus::Active, "ada@example.com");
        let sender = Arc::new(RecordingSender::default());
        let h = harness(Arc::new(StubLookup(Some(sub.clone()))), sender.clone());
        let run = h.store.create_run(sub.id, t0()).await.unwrap();
        h.runner.tick().await.unwrap();

        // A worker claims the run at the 7-day checkpoint, sends, and dies
        // before settling it.
        let seven = sub.renewal_date - Duration::days(7);
        h.clock.set(seven);
        let claimed = h
            .store
            .claim_due_runs(seven, seven + Duration::minutes(5), 10)
            .await
            .unwrap();
        let mut ctx = WorkflowContext::load(h.store.as_ref(), &claimed[0], seven, 3)
            .await
            .unwrap();
        let _ = h.runner.scheduler.execute(&mut ctx, sub.id).await;
        assert_eq!(sender.labels().len(), 1);

        // Still leased.
        assert_eq!(h.runner.tick().await.unwrap(), 0);

        h.clock.advance(Duration::minutes(5));
        assert_eq!(h.runner.tick().await.unwrap(), 1);
        assert_eq!(sender.labels().len(), 1);

        let done = h.run_to_end(&run).await;
        assert_eq!(done.status, RunStatus::Completed);
        assert_eq!(sender.labels().len(), 4);
    }
}
