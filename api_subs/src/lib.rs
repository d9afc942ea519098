use actix_web::web;

pub mod routes {
    pub mod subscription;
}

mod services {
    pub(crate) mod subscription;
}

mod dtos {
    pub(crate) mod subscription;
}

/// Subscription CRUD for the authenticated caller. Wrap the scope with the
/// `api_auth` middleware so `JwtClaims` are available as request data.
pub fn mount_subscriptions() -> actix_web::Scope {
    // literal segments before `/{id}`
    web::scope("/subscriptions")
        .service(routes::subscription::get_upcoming_renewals)
        .service(routes::subscription::get_user_subscriptions)
        .service(routes::subscription::get_subscriptions)
        .service(routes::subscription::post_subscription)
        .service(routes::subscription::put_cancel_subscription)
        .service(routes::subscription::get_subscription)
        .service(routes::subscription::put_subscription)
        .service(routes::subscription::delete_subscription)
}
