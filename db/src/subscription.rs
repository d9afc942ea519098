use chrono::{DateTime, Utc};
use common::error::{AppError, Res};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::{
    dtos::subscription::{SubscriptionChanges, SubscriptionInsert},
    models::subscription::{Subscription, SubscriptionWithOwner},
};

pub async fn insert_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    data: SubscriptionInsert,
) -> Res<Subscription> {
    sqlx::query_as::<_, Subscription>(
        r#"
        INSERT INTO subscriptions
            (user_id, name, price, currency, frequency, category, payment_method, status, start_date, renewal_date)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING *
        "#,
    )
    .bind(data.user_id)
    .bind(data.name)
    .bind(data.price)
    .bind(data.currency)
    .bind(data.frequency)
    .bind(data.category)
    .bind(data.payment_method)
    .bind(data.status)
    .bind(data.start_date)
    .bind(data.renewal_date)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

pub async fn get_subscription_by_id<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    id: Uuid,
) -> Res<Option<Subscription>> {
    sqlx::query_as::<_, Subscription>("SELECT * FROM subscriptions WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(AppError::from)
}

pub async fn get_owned_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    id: Uuid,
    user_id: Uuid,
) -> Res<Option<Subscription>> {
    sqlx::query_as::<_, Subscription>(
        "SELECT * FROM subscriptions WHERE id = $1 AND user_id = $2",
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

/// Newest first.
pub async fn get_subscriptions_by_user<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
) -> Res<Vec<Subscription>> {
    sqlx::query_as::<_, Subscription>(
        "SELECT * FROM subscriptions WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

/// Active subscriptions renewing inside `[from, to]`, soonest first.
pub async fn get_upcoming_renewals<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    user_id: Uuid,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
) -> Res<Vec<Subscription>> {
    sqlx::query_as::<_, Subscription>(
        r#"
        SELECT * FROM subscriptions
        WHERE user_id = $1 AND status = 'active' AND renewal_date >= $2 AND renewal_date <= $3
        ORDER BY renewal_date ASC
        "#,
    )
    .bind(user_id)
    .bind(from)
    .bind(to)
    .fetch_all(executor)
    .await
    .map_err(AppError::from)
}

pub async fn update_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    id: Uuid,
    user_id: Uuid,
    changes: SubscriptionChanges,
) -> Res<Option<Subscription>> {
    sqlx::query_as::<_, Subscription>(
        r#"
        UPDATE subscriptions
        SET name = $3, price = $4, frequency = $5, category = $6, payment_method = $7, updated_at = NOW()
        WHERE id = $1 AND user_id = $2
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(changes.name)
    .bind(changes.price)
    .bind(changes.frequency)
    .bind(changes.category)
    .bind(changes.payment_method)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}

pub async fn update_subscription_status<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    id: Uuid,
    status: &str,
) -> Res<Subscription> {
    sqlx::query_as::<_, Subscription>(
        "UPDATE subscriptions SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(status)
    .bind(id)
    .fetch_one(executor)
    .await
    .map_err(AppError::from)
}

/// Returns false when nothing matched.
pub async fn delete_subscription<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    id: Uuid,
    user_id: Uuid,
) -> Res<bool> {
    let result = sqlx::query("DELETE FROM subscriptions WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(executor)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn get_subscription_with_owner<'e, E: Executor<'e, Database = Postgres>>(
    executor: E,
    id: Uuid,
) -> Res<Option<SubscriptionWithOwner>> {
    sqlx::query_as::<_, SubscriptionWithOwner>(
        r#"
        SELECT s.*, u.name AS owner_name, u.email AS owner_email
        FROM subscriptions s
        JOIN users u ON u.id = s.user_id
        WHERE s.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await
    .map_err(AppError::from)
}
