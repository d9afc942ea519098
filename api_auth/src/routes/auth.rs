use actix_web::{Responder, post, web};
use common::env_config::Config;
use common::error::Res;
use common::http::{Envelope, Success};
use common::jwt;
use sqlx::PgPool;
use std::sync::Arc;

use crate::dtos::auth::{AuthResponse, SignInRequest, SignUpRequest};
use crate::services;

/// Registers a new user with name, e-mail and password.
///
/// # Input
/// - `req`: JSON payload `{ name, email, password }`
///
/// # Output
/// - Success: 201 Created with `{ token, user }`
/// - Error: 400 for invalid fields, 409 Conflict if the e-mail is taken
///
/// # Frontend Example
/// ```javascript
/// const response = await fetch('/api/v1/auth/sign-up', {
///   method: 'POST',
///   headers: { 'Content-Type': 'application/json' },
///   body: JSON.stringify({ name: 'Ada', email: 'ada@example.com', password: 'secret1' })
/// });
/// const { data } = await response.json();
/// localStorage.setItem('authToken', data.token);
/// ```
#[post("/sign-up")]
pub async fn post_sign_up(
    req: web::Json<SignUpRequest>,
    pool: web::Data<Arc<PgPool>>,
    config: web::Data<Arc<Config>>,
) -> Res<impl Responder> {
    let pg_pool: &PgPool = &pool;
    let auth = services::auth::sign_up(pg_pool, req.into_inner(), &config.jwt_config).await?;
    Success::created(Envelope::data(auth).with_message("User created successfully"))
}

/// Authenticates a user with e-mail and password.
///
/// # Output
/// - Success: `{ token, user }`
/// - Error: 401 Unauthorized for unknown e-mail or wrong password
#[post("/sign-in")]
pub async fn post_sign_in(
    login_data: web::Json<SignInRequest>,
    config: web::Data<Arc<Config>>,
    pool: web::Data<Arc<PgPool>>,
) -> Res<impl Responder> {
    let pg_pool: &PgPool = &pool;
    let user = services::auth::authenticate_user(pg_pool, &login_data).await?;
    let token = jwt::generate_jwt(user.id, &config.jwt_config)?;
    Success::ok(Envelope::data(AuthResponse { token, user }).with_message("User signed in successfully"))
}

/// Tokens are stateless; the client discards its copy.
#[post("/sign-out")]
pub async fn post_sign_out() -> Res<impl Responder> {
    Success::ok(Envelope::message("User signed out successfully"))
}
