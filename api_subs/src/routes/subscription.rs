use std::sync::Arc;

use actix_web::{Responder, delete, get, post, put, web};
use common::{
    error::{AppError, Res},
    http::{Envelope, Success},
    jwt::JwtClaims,
};
use reminder::ports::{Clock, WorkflowStore};
use sqlx::PgPool;
use uuid::Uuid;

use crate::dtos::subscription::{CreateSubscriptionRequest, UpdateSubscriptionRequest};
use crate::services;

fn parse_id(raw: &str) -> Res<Uuid> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest(format!("Invalid id '{}'", raw)))
}

/// Creates a subscription for the caller and schedules its renewal reminders.
///
/// # Input
/// - `Authorization: Bearer <token>`
/// - JSON body with `name`, `price`, `currency` (optional, USD), `frequency`,
///   `category`, `payment_method`, `status` (optional, active), `start_date`
///   and an optional `renewal_date`
///
/// # Output
/// - Success: 201 Created with the stored subscription
/// - Error: 400 for invalid fields
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/v1/subscriptions', {
///   method: 'POST',
///   headers: {
///     'Content-Type': 'application/json',
///     'Authorization': `Bearer ${token}`
///   },
///   body: JSON.stringify({
///     name: 'Netflix Premium',
///     price: 15.99,
///     currency: 'USD',
///     frequency: 'monthly',
///     category: 'entertainment',
///     payment_method: 'Credit Card',
///     start_date: '2026-03-01T00:00:00Z'
///   })
/// });
/// ```
#[post("")]
pub async fn post_subscription(
    claims: web::ReqData<JwtClaims>,
    req: web::Json<CreateSubscriptionRequest>,
    pool: web::Data<Arc<PgPool>>,
    store: web::Data<Arc<dyn WorkflowStore>>,
    clock: web::Data<Arc<dyn Clock>>,
) -> Res<impl Responder> {
    let pg_pool: &PgPool = &pool;
    let subscription = services::subscription::create_subscription(
        pg_pool,
        store.get_ref().as_ref(),
        claims.user_id,
        req.into_inner(),
        clock.now(),
    )
    .await?;
    Success::created(Envelope::data(subscription).with_message("Subscription created successfully"))
}

/// The caller's subscriptions, newest first.
#[get("")]
pub async fn get_subscriptions(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let pg_pool: &PgPool = &pool;
    let subscriptions = services::subscription::get_subscriptions(pg_pool, claims.user_id).await?;
    Success::ok(Envelope::list(subscriptions))
}

/// Active subscriptions renewing in the next seven days, soonest first.
#[get("/upcoming-renewals")]
pub async fn get_upcoming_renewals(
    claims: web::ReqData<JwtClaims>,
    pool: web::Data<Arc<PgPool>>,
    clock: web::Data<Arc<dyn Clock>>,
) -> Res<impl Responder> {
    let pg_pool: &PgPool = &pool;
    let subscriptions =
        services::subscription::get_upcoming_renewals(pg_pool, claims.user_id, clock.now()).await?;
    Success::ok(Envelope::list(subscriptions))
}

/// # Output
/// - Success: the subscription
/// - Error: 400 malformed id, 404 not found, 403 owned by another user
#[get("/{id}")]
pub async fn get_subscription(
    claims: web::ReqData<JwtClaims>,
    path: web::Path<String>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let id = parse_id(&path)?;
    let pg_pool: &PgPool = &pool;
    let subscription =
        services::subscription::get_subscription(pg_pool, id, claims.user_id).await?;
    Success::ok(Envelope::data(subscription))
}

/// Partial update of name, price, frequency, category and payment method.
///
/// # Output
/// - Success: the updated subscription
/// - Error: 400 for invalid fields, 404 when missing or not owned by the caller
#[put("/{id}")]
pub async fn put_subscription(
    claims: web::ReqData<JwtClaims>,
    path: web::Path<String>,
    req: web::Json<UpdateSubscriptionRequest>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let id = parse_id(&path)?;
    let pg_pool: &PgPool = &pool;
    let subscription =
        services::subscription::update_subscription(pg_pool, id, claims.user_id, req.into_inner())
            .await?;
    Success::ok(Envelope::data(subscription).with_message("Subscription updated successfully"))
}

/// Only the caller's own id is accepted.
#[get("/user/{id}")]
pub async fn get_user_subscriptions(
    claims: web::ReqData<JwtClaims>,
    path: web::Path<String>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let user_id = parse_id(&path)?;
    let pg_pool: &PgPool = &pool;
    let subscriptions =
        services::subscription::get_user_subscriptions(pg_pool, claims.user_id, user_id).await?;
    Success::ok(Envelope::list(subscriptions))
}

/// # Output
/// - Success: the cancelled subscription
/// - Error: 400 if already cancelled, 404 when missing or not owned
#[put("/{id}/cancel")]
pub async fn put_cancel_subscription(
    claims: web::ReqData<JwtClaims>,
    path: web::Path<String>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let id = parse_id(&path)?;
    let pg_pool: &PgPool = &pool;
    let subscription =
        services::subscription::cancel_subscription(pg_pool, id, claims.user_id).await?;
    Success::ok(Envelope::data(subscription).with_message("Subscription cancelled successfully"))
}

#[delete("/{id}")]
pub async fn delete_subscription(
    claims: web::ReqData<JwtClaims>,
    path: web::Path<String>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let id = parse_id(&path)?;
    let pg_pool: &PgPool = &pool;
    services::subscription::delete_subscription(pg_pool, id, claims.user_id).await?;
    Success::ok(Envelope::message("Subscription deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_ids_are_bad_requests() {
        assert!(matches!(parse_id("not-a-uuid"), Err(AppError::BadRequest(_))));
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);
    }
}
