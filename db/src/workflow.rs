use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    dtos::workflow::{RunUpdate, StepUpsert},
    models::workflow::{WorkflowRun, WorkflowStep},
};

/// Creates the run for a subscription, or returns the one that already exists.
pub async fn insert_run_if_absent(
    pool: &PgPool,
    subscription_id: Uuid,
    now: DateTime<Utc>,
) -> Res<WorkflowRun> {
    let inserted = sqlx::query_as::<_, WorkflowRun>(
        r#"
        INSERT INTO workflow_runs (subscription_id, status, next_wake_at, created_at, updated_at)
        VALUES ($1, 'pending', $2, $2, $2)
        ON CONFLICT (subscription_id) DO NOTHING
        RETURNING *
        "#,
    )
    .bind(subscription_id)
    .bind(now)
    .fetch_optional(pool)
    .await?;

    match inserted {
        Some(run) => Ok(run),
        None => sqlx::query_as::<_, WorkflowRun>(
            "SELECT * FROM workflow_runs WHERE subscription_id = $1",
        )
        .bind(subscription_id)
        .fetch_one(pool)
        .await
        .map_err(AppError::from),
    }
}

pub async fn get_run<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    run_id: Uuid,
) -> Res<Option<WorkflowRun>> {
    sqlx::query_as::<_, WorkflowRun>("SELECT * FROM workflow_runs WHERE id = $1")
        .bind(run_id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

/// Leases due runs, including running ones whose lease expired.
pub async fn claim_due_runs<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    now: DateTime<Utc>,
    lease_until: DateTime<Utc>,
    limit: i64,
) -> Res<Vec<WorkflowRun>> {
    sqlx::query_as::<_, WorkflowRun>(
        r#"
        UPDATE workflow_runs
        SET status = 'running', lease_until = $2, updated_at = $1
        WHERE id IN (
            SELECT id FROM workflow_runs
            WHERE (status IN ('pending', 'sleeping', 'retrying') AND next_wake_at <= $1)
               OR (status = 'running' AND lease_until <= $1)
            ORDER BY next_wake_at
            LIMIT $3
            FOR UPDATE SKIP LOCKED
        )
        RETURNING *
        "#,
    )
    .bind(now)
    .bind(lease_until)
    .bind(limit)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn update_run<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    run_id: Uuid,
    update: RunUpdate,
    now: DateTime<Utc>,
) -> Res<()> {
    sqlx::query(
        r#"
        UPDATE workflow_runs
        SET status = $2, next_wake_at = $3, last_error = $4, lease_until = NULL, updated_at = $5
        WHERE id = $1
        "#,
    )
    .bind(run_id)
    .bind(update.status)
    .bind(update.next_wake_at)
    .bind(update.last_error)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}

pub async fn get_steps<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    run_id: Uuid,
) -> Res<Vec<WorkflowStep>> {
    sqlx::query_as::<_, WorkflowStep>(
        "SELECT * FROM workflow_steps WHERE run_id = $1 ORDER BY updated_at",
    )
    .bind(run_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn upsert_step<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    step: StepUpsert,
    now: DateTime<Utc>,
) -> Res<()> {
    sqlx::query(
        r#"
        INSERT INTO workflow_steps (run_id, kind, label, status, output, attempts, last_error, wake_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (run_id, kind, label) DO UPDATE
        SET status = EXCLUDED.status,
            output = EXCLUDED.output,
            attempts = EXCLUDED.attempts,
            last_error = EXCLUDED.last_error,
            wake_at = EXCLUDED.wake_at,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(step.run_id)
    .bind(step.kind)
    .bind(step.label)
    .bind(step.status)
    .bind(step.output)
    .bind(step.attempts)
    .bind(step.last_error)
    .bind(step.wake_at)
    .bind(now)
    .execute(executor)
    .await?;
    Ok(())
}
