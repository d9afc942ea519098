use std::{future::Future, pin::Pin, rc::Rc, sync::Arc};

use actix_web::{
    Error, HttpMessage,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use common::{error::AppError, jwt::get_jwt_claims_or_error};
use futures::future::{Ready, ok};
use log::warn;
use sqlx::PgPool;

/// Turns the claims stored by the extraction middleware into `JwtClaims`
/// request data, or answers 401. The user must still exist.
pub struct AuthMiddleware {
    pool: Arc<PgPool>,
}

impl AuthMiddleware {
    pub fn new(pool: Arc<PgPool>) -> Self {
        AuthMiddleware { pool }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Transform = AuthMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddlewareService {
            service: Rc::new(service),
            pool: self.pool.clone(),
        })
    }
}

pub struct AuthMiddlewareService<S> {
    service: Rc<S>,
    pool: Arc<PgPool>,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let claims = match get_jwt_claims_or_error(&req) {
            Ok(claims) => claims,
            Err(response) => {
                return Box::pin(async move { Ok(req.into_response(response)) });
            }
        };

        let srv = Rc::clone(&self.service);
        let pool = self.pool.clone();

        Box::pin(async move {
            match db::user::get_user_by_id(pool.as_ref(), claims.user_id).await {
                Ok(Some(_)) => {
                    req.extensions_mut().insert(claims);
                    srv.call(req).await.map(|res| res.map_into_boxed_body())
                }
                Ok(None) => {
                    warn!("Token for unknown user {} on {}", claims.user_id, req.path());
                    let response = AppError::Unauthorized("Unauthorized".to_string())
                        .to_http_response();
                    Ok(req.into_response(response))
                }
                Err(e) => Ok(req.into_response(e.to_http_response())),
            }
        })
    }
}
