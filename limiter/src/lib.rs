use common::env_config::RateLimitConfig;
use middleware::{global::GlobalLimiter, ip::IpRateLimiter};

pub mod middleware {
    pub mod global;
    pub mod ip;
}

pub fn global_middleware(config: &RateLimitConfig) -> GlobalLimiter {
    GlobalLimiter::new(config.global_per_second)
}

pub fn ip_middleware(config: &RateLimitConfig) -> IpRateLimiter {
    IpRateLimiter::new(
        config.ip_capacity,
        config.ip_refill_amount,
        std::time::Duration::from_secs(config.ip_refill_interval_secs),
    )
}
