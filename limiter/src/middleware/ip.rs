use actix_web::{
    Error,
    dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready},
};
use common::error::AppError;
use governor::{Quota, RateLimiter, clock::QuantaClock, state::keyed::DashMapStateStore};
use std::{
    future::Future, net::IpAddr, num::NonZeroU32, pin::Pin, rc::Rc, sync::Arc, time::Duration,
};

type IpStateStore = DashMapStateStore<IpAddr>;
type KeyedLimiter = RateLimiter<IpAddr, IpStateStore, QuantaClock>;

/// Stale buckets are dropped once this many client addresses are tracked.
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// Token bucket per client IP: `capacity` tokens, refilled by
/// `refill_amount` tokens every `interval`.
#[derive(Clone)]
pub struct IpRateLimiter {
    limiter: Arc<KeyedLimiter>,
}

/// Governor refills one cell at a time, so the refill amount becomes a period.
fn bucket_quota(capacity: u32, refill_amount: u32, interval: Duration) -> Quota {
    let capacity = NonZeroU32::new(capacity).unwrap_or(NonZeroU32::MIN);
    let refill_amount = refill_amount.max(1);
    let period = (interval / refill_amount).max(Duration::from_millis(1));
    Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
        .allow_burst(capacity)
}

impl IpRateLimiter {
    pub fn new(capacity: u32, refill_amount: u32, interval: Duration) -> Self {
        let quota = bucket_quota(capacity, refill_amount, interval);
        Self {
            limiter: Arc::new(RateLimiter::keyed(quota)),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for IpRateLimiter
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Transform = IpRateLimiterService<S>;
    type InitError = ();
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(IpRateLimiterService {
            service: Rc::new(service),
            limiter: self.limiter.clone(),
        }))
    }
}

pub struct IpRateLimiterService<S> {
    service: Rc<S>,
    limiter: Arc<KeyedLimiter>,
}

/// Keyed on the socket peer. `Forwarded` and `X-Forwarded-For` are set by the
/// client and are ignored.
fn client_ip(req: &ServiceRequest) -> Option<IpAddr> {
    req.peer_addr().map(|addr| addr.ip())
}

impl<S, B> Service<ServiceRequest> for IpRateLimiterService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: actix_web::body::MessageBody + 'static,
{
    type Response = ServiceResponse<actix_web::body::BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = Rc::clone(&self.service);
        let limiter = self.limiter.clone();

        Box::pin(async move {
            if let Some(ip) = client_ip(&req) {
                if limiter.len() > MAX_TRACKED_CLIENTS {
                    limiter.retain_recent();
                }
                if limiter.check_key(&ip).is_err() {
                    log::warn!("Rate limit exceeded for {} on {}", ip, req.path());
                    return Ok(req.error_response(AppError::TooManyRequests(
                        "Rate limit exceeded".to_string(),
                    )));
                }
            } else {
                log::debug!("No client address for {}, skipping IP limit", req.path());
            }

            srv.call(req).await.map(|res| res.map_into_boxed_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, HttpResponse, http::StatusCode, test as actix_test, web};

    fn request_from(ip: &str) -> actix_test::TestRequest {
        actix_test::TestRequest::get()
            .uri("/")
            .peer_addr(format!("{}:40000", ip).parse().unwrap())
    }

    #[actix_web::test]
    async fn each_client_gets_its_own_bucket() {
        let app = actix_test::init_service(
            App::new()
                .wrap(IpRateLimiter::new(2, 1, Duration::from_secs(60)))
                .route("/", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        for _ in 0..2 {
            let res = actix_test::call_service(&app, request_from("10.0.0.1").to_request()).await;
            assert_eq!(res.status(), StatusCode::OK);
        }
        let res = actix_test::call_service(&app, request_from("10.0.0.1").to_request()).await;
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);

        let res = actix_test::call_service(&app, request_from("10.0.0.2").to_request()).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn forwarded_headers_do_not_change_the_bucket() {
        let app = actix_test::init_service(
            App::new()
                .wrap(IpRateLimiter::new(2, 1, Duration::from_secs(60)))
                .route("/", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        let mut allowed = 0;
        for i in 0..10 {
            let req = request_from("10.0.0.1")
                .insert_header(("X-Forwarded-For", format!("1.2.3.{}", i)))
                .insert_header(("Forwarded", format!("for=5.6.7.{}", i)))
                .to_request();
            if actix_test::call_service(&app, req).await.status() == StatusCode::OK {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 2);
    }

    #[test]
    fn refill_amount_sets_replenish_period() {
        let quota = bucket_quota(10, 5, Duration::from_secs(10));
        assert_eq!(quota.burst_size().get(), 10);
        assert_eq!(quota.replenish_interval(), Duration::from_secs(2));
    }
}
