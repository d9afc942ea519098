use std::sync::Arc;

use actix_web::web;
use middleware::auth::AuthMiddleware;
use sqlx::PgPool;

pub mod middleware {
    pub mod auth;
}

pub mod routes {
    pub mod auth;
    pub mod user;
}

mod services {
    pub(crate) mod auth;
    pub(crate) mod user;
}

mod dtos {
    pub(crate) mod auth;
}

/// Requires valid JWT claims (see the `extractor` crate) for an existing user.
pub fn auth_middleware(pool: Arc<PgPool>) -> AuthMiddleware {
    AuthMiddleware::new(pool)
}

pub fn mount_auth() -> actix_web::Scope {
    web::scope("/auth")
        .service(routes::auth::post_sign_up)
        .service(routes::auth::post_sign_in)
        .service(routes::auth::post_sign_out)
}

pub fn mount_users() -> actix_web::Scope {
    web::scope("/users")
        .service(routes::user::get_users)
        .service(routes::user::get_user)
}
