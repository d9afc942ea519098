pub mod checkpoint;
pub mod payload;
pub mod run;
pub mod subscription;

pub use checkpoint::{ReminderCheckpoint, checkpoints, same_calendar_day};
pub use payload::ReminderPayload;
pub use run::{RunRecord, RunStatus, RunUpdate, StepKind, StepRecord, StepStatus};
pub use subscription::{Owner, Plan, SubscriptionSnapshot};
