use std::sync::Arc;

use actix_web::{Responder, get, post, web};
use common::{
    error::{AppError, Res},
    http::{Envelope, Success},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    domain::{RunRecord, StepRecord},
    ports::{Clock, WorkflowStore},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRequest {
    pub subscription_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct RunWithSteps {
    #[serde(flatten)]
    pub run: RunRecord,
    pub steps: Vec<StepRecord>,
}

/// Starts the reminder workflow for a subscription.
///
/// # Input
/// - `X-API-Key` header with one of the configured workflow keys
/// - JSON body `{ "subscriptionId": "<uuid>" }`
///
/// # Output
/// - 202 Accepted with the run. Triggering twice returns the same run.
/// - 401 Unauthorized without a valid API key
#[post("/subscription/reminder")]
pub async fn post_trigger_reminder(
    body: web::Json<TriggerRequest>,
    store: web::Data<Arc<dyn WorkflowStore>>,
    clock: web::Data<Arc<dyn Clock>>,
) -> Res<impl Responder> {
    let run = crate::trigger(store.get_ref().as_ref(), body.subscription_id, clock.now()).await?;
    Success::accepted(Envelope::data(run).with_message("Reminder workflow scheduled"))
}

#[get("/runs/{id}")]
pub async fn get_run(
    path: web::Path<String>,
    store: web::Data<Arc<dyn WorkflowStore>>,
) -> Res<impl Responder> {
    let run_id = Uuid::parse_str(&path)
        .map_err(|_| AppError::BadRequest(format!("Invalid run id '{}'", path)))?;
    let run = store
        .get_run(run_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Workflow run {}", run_id)))?;
    let steps = store.load_steps(run_id).await?;
    Success::ok(Envelope::data(RunWithSteps { run, steps }))
}
