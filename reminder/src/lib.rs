//! Durable reminder workflow: one run per subscription, replayed against a
//! step log so that every reminder is sent at most once per checkpoint.

use actix_web::web;
use chrono::{DateTime, Utc};
use common::error::Res;
use log::info;
use uuid::Uuid;

pub mod adapters;
pub mod context;
pub mod domain;
pub mod middleware;
pub mod ports;
pub mod routes;
pub mod runner;
pub mod scheduler;
pub mod store;

#[cfg(test)]
mod testing;

pub use context::{Interrupt, StepError, WorkflowContext};
pub use runner::{RetryPolicy, Runner};
pub use scheduler::{ReminderScheduler, RunOutcome, SchedulerConfig};

use domain::RunRecord;
use middleware::ApiKeyMiddleware;
use ports::WorkflowStore;

/// Entry point for the subscription flow. Creating the run is all that
/// happens here; the runner picks it up on its next tick.
pub async fn trigger(
    store: &dyn WorkflowStore,
    subscription_id: Uuid,
    now: DateTime<Utc>,
) -> Res<RunRecord> {
    let run = store.create_run(subscription_id, now).await?;
    info!(
        "Reminder workflow {} for subscription {} is {}",
        run.id, subscription_id, run.status
    );
    Ok(run)
}

pub fn mount_workflows(api_keys: Vec<String>) -> actix_web::Scope<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse<actix_web::body::BoxBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    web::scope("/workflows")
        .wrap(ApiKeyMiddleware::new(api_keys))
        .service(routes::workflow::post_trigger_reminder)
        .service(routes::workflow::get_run)
}
