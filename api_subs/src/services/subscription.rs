use chrono::{DateTime, Duration, Utc};
use common::{
    error::{AppError, Res},
    misc::SubscriptionStatus,
};
use db::models::subscription::Subscription;
use log::{error, info};
use reminder::ports::WorkflowStore;
use sqlx::PgPool;
use uuid::Uuid;

use crate::dtos::subscription::{CreateSubscriptionRequest, UpdateSubscriptionRequest};

/// Window covered by the upcoming-renewals listing.
const UPCOMING_WINDOW_DAYS: i64 = 7;

fn not_found() -> AppError {
    AppError::NotFound("Subscription not found or unauthorized".to_string())
}

/// Stores the subscription, then starts its reminder workflow. A workflow
/// that fails to start is logged and the subscription is still returned.
pub async fn create_subscription(
    pool: &PgPool,
    store: &dyn WorkflowStore,
    user_id: Uuid,
    req: CreateSubscriptionRequest,
    now: DateTime<Utc>,
) -> Res<Subscription> {
    let insert = req.into_insert(user_id, now)?;
    let subscription = db::subscription::insert_subscription(pool, insert).await?;
    info!(
        "User {} created subscription {} ({})",
        user_id, subscription.id, subscription.name
    );

    if let Err(e) = reminder::trigger(store, subscription.id, now).await {
        error!(
            "Failed to start reminder workflow for subscription {}: {}",
            subscription.id, e
        );
    }

    Ok(subscription)
}

pub async fn get_subscriptions(pool: &PgPool, user_id: Uuid) -> Res<Vec<Subscription>> {
    db::subscription::get_subscriptions_by_user(pool, user_id).await
}

pub async fn get_upcoming_renewals(
    pool: &PgPool,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> Res<Vec<Subscription>> {
    let until = now + Duration::days(UPCOMING_WINDOW_DAYS);
    db::subscription::get_upcoming_renewals(pool, user_id, now, until).await
}

/// Distinguishes a missing subscription (404) from someone else's (403).
pub async fn get_subscription(pool: &PgPool, id: Uuid, user_id: Uuid) -> Res<Subscription> {
    let subscription = db::subscription::get_subscription_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Subscription not found".to_string()))?;
    if subscription.user_id != user_id {
        return Err(AppError::Forbidden(
            "You are not the owner of this subscription".to_string(),
        ));
    }
    Ok(subscription)
}

pub async fn update_subscription(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
    req: UpdateSubscriptionRequest,
) -> Res<Subscription> {
    let existing = db::subscription::get_owned_subscription(pool, id, user_id)
        .await?
        .ok_or_else(not_found)?;
    let changes = req.merge(&existing)?;
    db::subscription::update_subscription(pool, id, user_id, changes)
        .await?
        .ok_or_else(not_found)
}

pub async fn get_user_subscriptions(
    pool: &PgPool,
    caller_id: Uuid,
    user_id: Uuid,
) -> Res<Vec<Subscription>> {
    if caller_id != user_id {
        return Err(AppError::Forbidden(
            "You can only view your own subscriptions".to_string(),
        ));
    }
    db::subscription::get_subscriptions_by_user(pool, user_id).await
}

pub async fn cancel_subscription(pool: &PgPool, id: Uuid, user_id: Uuid) -> Res<Subscription> {
    let existing = db::subscription::get_owned_subscription(pool, id, user_id)
        .await?
        .ok_or_else(not_found)?;
    if existing.status == SubscriptionStatus::Cancelled.as_str() {
        return Err(AppError::BadRequest(
            "Subscription is already cancelled".to_string(),
        ));
    }
    let cancelled = db::subscription::update_subscription_status(
        pool,
        id,
        SubscriptionStatus::Cancelled.as_str(),
    )
    .await?;
    info!("User {} cancelled subscription {}", user_id, id);
    Ok(cancelled)
}

pub async fn delete_subscription(pool: &PgPool, id: Uuid, user_id: Uuid) -> Res<()> {
    if !db::subscription::delete_subscription(pool, id, user_id).await? {
        return Err(not_found());
    }
    info!("User {} deleted subscription {}", user_id, id);
    Ok(())
}
