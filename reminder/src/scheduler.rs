use std::sync::Arc;

use chrono::{FixedOffset, Offset, Utc};
use common::{
    env_config::ReminderConfig,
    error::AppError,
    misc::SubscriptionStatus,
};
use log::{info, warn};
use uuid::Uuid;

use crate::{
    context::{Interrupt, WorkflowContext},
    domain::{ReminderCheckpoint, ReminderPayload, StepStatus, checkpoints, same_calendar_day},
    ports::{NotificationSender, SubscriptionLookup},
};

pub const FETCH_STEP: &str = "get subscription";

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Days before renewal, largest first.
    pub offsets: Vec<u32>,
    /// Zone in which "same calendar day" is judged.
    pub time_zone: FixedOffset,
}

impl SchedulerConfig {
    pub fn from_config(config: &ReminderConfig) -> Self {
        SchedulerConfig {
            offsets: config.offsets.clone(),
            time_zone: FixedOffset::east_opt(config.utc_offset_minutes * 60)
                .unwrap_or_else(|| {
                    warn!(
                        "Invalid reminder UTC offset {} minutes, using UTC",
                        config.utc_offset_minutes
                    );
                    Utc.fix()
                }),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig::from_config(&ReminderConfig::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotApplicable {
    NotFound,
    Inactive,
    AlreadyRenewed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointStatus {
    Sent,
    /// Checkpoint was already in the past when the run started.
    SkippedPast,
    /// Run resumed on a different calendar day than the checkpoint.
    SkippedStale,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointResult {
    pub offset_days: u32,
    pub status: CheckpointStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    NotApplicable(NotApplicable),
    Finished(Vec<CheckpointResult>),
}

/// Position in the checkpoint walk, after the subscription has been fetched.
enum Phase {
    Evaluating(usize),
    Sleeping(usize),
    Dispatching(usize),
    Done,
}

/// Walks the reminder checkpoints of one subscription.
pub struct ReminderScheduler {
    lookup: Arc<dyn SubscriptionLookup>,
    sender: Arc<dyn NotificationSender>,
    config: SchedulerConfig,
}

impl ReminderScheduler {
    pub fn new(
        lookup: Arc<dyn SubscriptionLookup>,
        sender: Arc<dyn NotificationSender>,
        config: SchedulerConfig,
    ) -> Self {
        ReminderScheduler {
            lookup,
            sender,
            config,
        }
    }

    /// Workflow body. Safe to call repeatedly for the same run: every side
    /// effect is keyed by a label in the step log of `ctx`.
    pub async fn execute(
        &self,
        ctx: &mut WorkflowContext<'_>,
        subscription_id: Uuid,
    ) -> Result<RunOutcome, Interrupt> {
        let lookup = &self.lookup;
        let subscription = ctx
            .run_step(FETCH_STEP, || lookup.get_with_owner(subscription_id))
            .await?;

        let Some(subscription) = subscription else {
            info!("Subscription {} not found, no reminders", subscription_id);
            return Ok(RunOutcome::NotApplicable(NotApplicable::NotFound));
        };
        if subscription.status != SubscriptionStatus::Active {
            info!(
                "Subscription {} is {}, no reminders",
                subscription_id, subscription.status
            );
            return Ok(RunOutcome::NotApplicable(NotApplicable::Inactive));
        }
        if subscription.renewal_date < ctx.started_at() {
            info!(
                "Renewal date has passed for subscription {}, stopping workflow",
                subscription_id
            );
            return Ok(RunOutcome::NotApplicable(NotApplicable::AlreadyRenewed));
        }

        let checkpoints = checkpoints(
            subscription.id,
            subscription.renewal_date,
            &self.config.offsets,
        );
        let mut results = Vec::with_capacity(checkpoints.len());
        let mut phase = Phase::Evaluating(0);

        loop {
            phase = match phase {
                Phase::Evaluating(i) => match checkpoints.get(i) {
                    None => Phase::Done,
                    Some(cp) if cp.at < ctx.started_at() => {
                        results.push(CheckpointResult {
                            offset_days: cp.offset_days,
                            status: CheckpointStatus::SkippedPast,
                        });
                        Phase::Evaluating(i + 1)
                    }
                    Some(_) => Phase::Sleeping(i),
                },
                Phase::Sleeping(i) => {
                    let cp = &checkpoints[i];
                    let resumed_at = ctx.sleep_until(&cp.label(), cp.at).await?;
                    if same_calendar_day(resumed_at, cp.at, self.config.time_zone) {
                        Phase::Dispatching(i)
                    } else {
                        warn!(
                            "Resumed {} on {} instead of {}, skipping",
                            cp.label(),
                            resumed_at,
                            cp.at
                        );
                        results.push(CheckpointResult {
                            offset_days: cp.offset_days,
                            status: CheckpointStatus::SkippedStale,
                        });
                        Phase::Evaluating(i + 1)
                    }
                }
                Phase::Dispatching(i) => {
                    let cp = &checkpoints[i];
                    // A retried send must still go out on the checkpoint's day.
                    let will_run = !matches!(
                        ctx.step_status(&cp.label()),
                        Some(StepStatus::Completed | StepStatus::Exhausted)
                    );
                    let status = if will_run
                        && !same_calendar_day(ctx.now(), cp.at, self.config.time_zone)
                    {
                        warn!(
                            "Retry of {} at {} is past its day ({}), skipping",
                            cp.label(),
                            ctx.now(),
                            cp.at
                        );
                        CheckpointStatus::SkippedStale
                    } else {
                        let payload =
                            ReminderPayload::new(&subscription, cp, self.config.time_zone);
                        match self.dispatch(ctx, cp, payload).await {
                            Ok(()) => CheckpointStatus::Sent,
                            // Reported on the context; the remaining offsets still run.
                            Err(Interrupt::Step(err)) => CheckpointStatus::Failed(err.message),
                            Err(other) => return Err(other),
                        }
                    };
                    results.push(CheckpointResult {
                        offset_days: cp.offset_days,
                        status,
                    });
                    Phase::Evaluating(i + 1)
                }
                Phase::Done => break,
            };
        }

        Ok(RunOutcome::Finished(results))
    }

    async fn dispatch(
        &self,
        ctx: &mut WorkflowContext<'_>,
        checkpoint: &ReminderCheckpoint,
        payload: ReminderPayload,
    ) -> Result<(), Interrupt> {
        let sender = &self.sender;
        ctx.run_step(&checkpoint.label(), || async move {
            if payload.to.is_empty() {
                return Err(AppError::BadRequest(format!(
                    "Subscription {} has no owner e-mail",
                    checkpoint.subscription_id
                )));
            }
            sender.send(&payload).await
        })
        .await
    }
}
