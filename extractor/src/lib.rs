use std::sync::Arc;

use common::env_config::Config;
use middleware::extractor::ExtractionMiddleware;

pub mod middleware {
    pub mod extractor;
}

pub fn middleware(config: Arc<Config>) -> ExtractionMiddleware {
    ExtractionMiddleware::new(config.jwt_config.secret.clone())
}
