use std::{future::Future, pin::Pin, rc::Rc, sync::Arc};

use actix_web::{
    Error,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use common::error::AppError;
use futures::future::{Ready, ok};
use log::{debug, warn};

/// Rejects requests whose `X-API-Key` header is not one of the configured keys.
pub struct ApiKeyMiddleware {
    api_keys: Rc<Vec<String>>,
}

impl ApiKeyMiddleware {
    pub fn new(keys: Vec<String>) -> Self {
        ApiKeyMiddleware {
            api_keys: Rc::new(keys),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for ApiKeyMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Transform = ApiKeyMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(ApiKeyMiddlewareService {
            service: Arc::new(service),
            api_keys: self.api_keys.clone(),
        })
    }
}

pub struct ApiKeyMiddlewareService<S> {
    service: Arc<S>,
    api_keys: Rc<Vec<String>>,
}

impl<S, B> Service<ServiceRequest> for ApiKeyMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let header_key = req.headers().get("X-API-Key").and_then(|v| v.to_str().ok());

        if let Some(key) = header_key {
            if self.api_keys.iter().any(|k| k == key) {
                debug!("Valid API key for path {}", req.path());
                let fut = self.service.call(req);
                return Box::pin(async move { fut.await.map(|res| res.map_into_boxed_body()) });
            }
        }

        let error_message = if header_key.is_some() {
            "Invalid API key"
        } else {
            "No API key provided"
        };
        warn!("{} for path {}", error_message, req.path());

        let response = AppError::Unauthorized(error_message.to_string())
            .to_http_response()
            .map_into_boxed_body();
        let (request, _payload) = req.into_parts();
        Box::pin(async move { Ok(ServiceResponse::new(request, response)) })
    }
}
