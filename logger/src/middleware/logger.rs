use actix_web::body::{self, BoxBody, MessageBody};
use actix_web::dev::Payload;
use actix_web::web::{self, Bytes};
use actix_web::{
    Error,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use actix_web::{HttpMessage, HttpResponse, ResponseError};
use chrono::Utc;
use colored::Colorize;
use common::jwt::get_jwt_claims_or_error;
use db::models::log::Log;
use futures::StreamExt;
use futures::future::{LocalBoxFuture, Ready, ready};
use log::{debug, error, info};
use serde_json::{Map, Value, json};
use sqlx::PgPool;
use sqlx::types::ipnetwork::IpNetwork;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

/// Body fields never written to the log table or the console.
const REDACTED_FIELDS: &[&str] = &["password", "token"];

/// Records every request and its response in the `logs` table, and prints a
/// colored summary line when console logging is enabled.
pub struct LoggerMiddleware {
    pool: Arc<PgPool>,
    console_logging_enabled: bool,
}

impl LoggerMiddleware {
    pub fn new(pool: Arc<PgPool>, console_logging_enabled: bool) -> Self {
        Self {
            pool,
            console_logging_enabled,
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for LoggerMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
    <B as MessageBody>::Error: ResponseError,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = LoggerMiddlewareService<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(LoggerMiddlewareService {
            service: Arc::new(service),
            pool: self.pool.clone(),
            console_logging_enabled: self.console_logging_enabled,
        }))
    }
}

pub struct LoggerMiddlewareService<S> {
    service: Arc<S>,
    pool: Arc<PgPool>,
    console_logging_enabled: bool,
}

impl<S, B> Service<ServiceRequest> for LoggerMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: actix_web::body::MessageBody + 'static,
    <B as MessageBody>::Error: ResponseError,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let started = Instant::now();
        let method = req.method().to_string();
        let path = req.path().to_string();
        let params_json = query_params(req.query_string());

        let ip_address = peer_ip(req.peer_addr());

        let user_agent = req
            .headers()
            .get("User-Agent")
            .map(|ua| ua.to_str().unwrap_or_default().to_string())
            .unwrap_or_default();

        let console_logging_enabled = self.console_logging_enabled;
        let pool = self.pool.clone();
        let srv = Arc::clone(&self.service);

        Box::pin(async move {
            let user_id = get_jwt_claims_or_error(&req).ok().map(|c| c.user_id);

            // Copy request body from payload and reconstruct it
            let mut payload = req.take_payload();
            let body_bytes = extract_body(&mut payload).await?;
            let request_body = if !body_bytes.is_empty() {
                redact(serde_json::from_slice::<Value>(&body_bytes).unwrap_or(Value::Null))
            } else {
                Value::Null
            };
            let new_stream: Pin<
                Box<dyn futures::Stream<Item = Result<Bytes, actix_web::error::PayloadError>>>,
            > = futures::stream::once(async move {
                Ok::<Bytes, actix_web::error::PayloadError>(body_bytes)
            })
            .boxed();
            req.set_payload(Payload::from(new_stream));

            let res = srv.call(req).await?;

            let status = res.status();
            let status_code = i32::from(status.as_u16());
            let timestamp = Utc::now();

            // Copy response body and reconstruct response
            let (req, res) = res.into_parts();
            let headers = res.headers().clone();
            let response_body_bytes = body::to_bytes(res.into_body()).await?;
            let response_body =
                redact(serde_json::from_slice::<Value>(&response_body_bytes).unwrap_or(Value::Null));
            let mut new_res = HttpResponse::build(status);
            for (key, value) in headers.iter() {
                new_res.insert_header((key.clone(), value.clone()));
            }
            let res = ServiceResponse::new(req, new_res.body(response_body_bytes));

            if console_logging_enabled {
                let colored_status = match status_code {
                    200..=299 => status_code.to_string().green(),
                    300..=399 => status_code.to_string().yellow(),
                    400..=499 => status_code.to_string().bright_red(),
                    _ => status_code.to_string().red(),
                };

                let colored_method = match method.as_str() {
                    "GET" => method.blue(),
                    "POST" => method.yellow(),
                    "PUT" => method.purple(),
                    "DELETE" => method.red(),
                    _ => method.normal(),
                };

                info!(
                    "[{}] {} {} {} user_id={} params={}",
                    colored_status,
                    colored_method,
                    path.bright_white(),
                    format!("({}ms)", started.elapsed().as_millis()).bright_black(),
                    user_id
                        .map_or("None".to_string(), |id| id.to_string())
                        .bright_blue(),
                    params_json.to_string().bright_cyan(),
                );

                if request_body.as_object().is_some_and(|body| !body.is_empty()) {
                    debug!("  Request: {}", request_body.to_string().bright_green());
                }
                if status_code >= 400 {
                    debug!("  Response: {}", response_body.to_string().bright_yellow());
                }
            }

            let log = Log {
                id: Uuid::nil(), // auto-generated
                timestamp: timestamp.naive_utc(),
                method,
                path,
                status_code,
                user_id,
                params: Some(params_json),
                request_body: Some(request_body),
                response_body: Some(response_body),
                ip_address,
                user_agent,
            };
            if let Err(e) = db::log::insert_log(pool.as_ref(), log).await {
                error!("Failed to store request log: {}", e);
            }

            Ok(res)
        })
    }
}

/// Socket peer only; `Forwarded` and `X-Forwarded-For` are client controlled.
fn peer_ip(peer: Option<SocketAddr>) -> IpNetwork {
    IpNetwork::from(peer.map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |addr| addr.ip()))
}

/// `a=1&flag` becomes `{"a": "1", "flag": true}`.
fn query_params(query_string: &str) -> Value {
    let mut params = Map::new();
    for pair in query_string.split('&').filter(|pair| !pair.is_empty()) {
        match pair.split_once('=') {
            Some((key, value)) => params.insert(key.to_string(), json!(value)),
            None => params.insert(pair.to_string(), json!(true)),
        };
    }
    Value::Object(params)
}

/// Replaces sensitive fields at any depth with `"[redacted]"`.
fn redact(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, value)| {
                    if REDACTED_FIELDS.contains(&key.to_lowercase().as_str()) {
                        (key, json!("[redacted]"))
                    } else {
                        (key, redact(value))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(redact).collect()),
        other => other,
    }
}

async fn extract_body(payload: &mut Payload) -> Result<Bytes, Error> {
    let mut body = web::BytesMut::new();
    while let Some(chunk) = payload.next().await {
        let chunk = chunk?;
        body.extend_from_slice(&chunk);
    }
    Ok(body.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", json!({}))]
    #[case("a=1&flag", json!({ "a": "1", "flag": true }))]
    #[case("x=&y=2", json!({ "x": "", "y": "2" }))]
    fn query_string_to_json(#[case] query: &str, #[case] expected: Value) {
        assert_eq!(query_params(query), expected);
    }

    #[test]
    fn credentials_are_redacted() {
        let body = json!({
            "email": "ada@example.com",
            "password": "hunter22",
            "data": { "token": "eyJ...", "user": { "name": "Ada" } }
        });
        assert_eq!(
            redact(body),
            json!({
                "email": "ada@example.com",
                "password": "[redacted]",
                "data": { "token": "[redacted]", "user": { "name": "Ada" } }
            })
        );
    }

    #[rstest]
    #[case(Some("203.0.113.9:51234"), "203.0.113.9/32")]
    #[case(Some("[::1]:8080"), "::1/128")]
    #[case(None, "0.0.0.0/32")]
    fn peer_address_is_logged(#[case] peer: Option<&str>, #[case] expected: &str) {
        let peer = peer.map(|p| p.parse::<SocketAddr>().unwrap());
        assert_eq!(peer_ip(peer).to_string(), expected);
    }
}
