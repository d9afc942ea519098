use std::{env, sync::Arc};

#[derive(Clone, Debug)]
/// Configuration struct for the server.
///
/// This struct holds all the necessary configuration parameters
/// required to initialize and run the server.
/// It includes database connection details, JWT configuration,
/// server host and port, number of worker threads, CORS settings,
/// logging preferences, rate limits, the reminder workflow settings
/// and the e-mail delivery settings.
pub struct Config {
    // environment
    pub environment: String, // development or production
    /// The URL of the database to connect to.
    pub database_url: String,
    /// Configuration for JWT (JSON Web Token) authentication.
    pub jwt_config: JwtConfig,
    /// The hostname or IP address the server will bind to.
    pub server_host: String,
    /// The port number the server will listen on.
    pub server_port: u16,
    /// The number of worker threads to spawn for handling requests.
    pub num_workers: usize,
    /// The allowed origin for CORS (Cross-Origin Resource Sharing).
    pub cors_allowed_origin: String,
    /// A boolean indicating whether console logging is enabled.
    pub console_logging_enabled: bool,
    // server to server api keys, callers of the workflow endpoints
    // MUST send one of these in the X-API-Key header
    pub workflow_api_keys: Vec<String>,
    /// Request rate limits.
    pub rate_limit: RateLimitConfig,
    /// Which reminders are sent and in which time zone days are compared.
    pub reminder: ReminderConfig,
    /// Durable workflow runner settings.
    pub workflow: WorkflowConfig,
    /// Transactional e-mail API settings.
    pub mail: MailConfig,
}

#[derive(Clone, Debug)]
/// Configuration for JSON Web Token (JWT) authentication.
///
/// This struct contains the secret key used to sign JWTs and
/// the expiration time in hours for issued tokens.
pub struct JwtConfig {
    /// The secret key used to sign and verify JWTs.
    pub secret: String,
    /// The expiration time for JWTs in hours.
    pub expiration_hours: i64,
}

#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    /// Requests per second accepted by the whole server.
    pub global_per_second: u32,
    /// Token bucket capacity per client IP.
    pub ip_capacity: u32,
    /// Tokens refilled per client IP every `ip_refill_interval_secs`.
    pub ip_refill_amount: u32,
    pub ip_refill_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ReminderConfig {
    /// Days before renewal at which a reminder is sent, largest first.
    pub offsets: Vec<u32>,
    /// Fixed UTC offset used to decide whether a reminder is still on its calendar day.
    pub utc_offset_minutes: i32,
}

#[derive(Clone, Debug)]
pub struct WorkflowConfig {
    /// How often the runner looks for due workflow runs.
    pub poll_interval_secs: u64,
    /// How long a claimed run stays leased before another runner may take it over.
    pub lease_secs: i64,
    /// Maximum number of runs claimed per poll.
    pub batch_size: i64,
    /// Attempts per step before the step is marked exhausted.
    pub max_step_attempts: i32,
    /// First retry delay, multiplied by `retry_multiplier` on every further attempt.
    pub retry_base_delay_secs: u64,
    pub retry_multiplier: f64,
}

#[derive(Clone, Debug)]
pub struct MailConfig {
    /// Endpoint accepting `{from, to, subject, html}` JSON.
    pub api_url: String,
    /// Bearer token for the e-mail API.
    pub api_key: String,
    /// Sender address.
    pub from: String,
    pub account_settings_url: String,
    pub support_url: String,
}

impl JwtConfig {
    /// Creates a new `JwtConfig` instance from environment variables.
    ///
    /// Reads the JWT configuration from environment variables:
    /// - `JWT_SECRET`: Required. The secret key for JWT signing.
    /// - `JWT_EXPIRATION_HOURS`: Optional. Defaults to 24 hours if not provided.
    ///
    /// # Panics
    ///
    /// This function will panic if:
    /// - `JWT_SECRET` environment variable is not set
    /// - `JWT_EXPIRATION_HOURS` is set but cannot be parsed as a valid number
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        JwtConfig {
            secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            expiration_hours: env::var("JWT_EXPIRATION_HOURS")
                .unwrap_or_else(|_| "24".to_string())
                .parse()
                .expect("JWT_EXPIRATION_HOURS must be a valid number"),
        }
    }
}

impl ReminderConfig {
    pub fn from_env() -> Self {
        ReminderConfig {
            offsets: parse_offsets(
                &env::var("REMINDER_OFFSETS").unwrap_or_else(|_| "7,5,2,1".to_string()),
            )
            .expect("REMINDER_OFFSETS must be a comma separated list of days"),
            utc_offset_minutes: env_or("REMINDER_UTC_OFFSET_MINUTES", 0),
        }
    }
}

impl Default for ReminderConfig {
    fn default() -> Self {
        ReminderConfig {
            offsets: vec![7, 5, 2, 1],
            utc_offset_minutes: 0,
        }
    }
}

impl WorkflowConfig {
    pub fn from_env() -> Self {
        WorkflowConfig {
            poll_interval_secs: env_or("WORKFLOW_POLL_SECONDS", 30),
            lease_secs: env_or("WORKFLOW_LEASE_SECONDS", 300),
            batch_size: env_or("WORKFLOW_BATCH_SIZE", 50),
            max_step_attempts: env_or("WORKFLOW_MAX_STEP_ATTEMPTS", 3),
            retry_base_delay_secs: env_or("WORKFLOW_RETRY_BASE_SECONDS", 60),
            retry_multiplier: env_or("WORKFLOW_RETRY_MULTIPLIER", 2.0),
        }
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        WorkflowConfig {
            poll_interval_secs: 30,
            lease_secs: 300,
            batch_size: 50,
            max_step_attempts: 3,
            retry_base_delay_secs: 60,
            retry_multiplier: 2.0,
        }
    }
}

impl Config {
    /// Creates a new `Config` instance from environment variables.
    ///
    /// Loads all configuration values from environment variables with sensible defaults
    /// for most optional settings.
    ///
    /// # Environment Variables
    ///
    /// Required:
    /// - `ENVIRONMENT`: `development` or `production`
    /// - `DATABASE_URL`: Connection string for the database
    /// - `JWT_SECRET`: Secret key for JWT signing (via `JwtConfig::from_env()`)
    ///
    /// Optional (with defaults):
    /// - `IP`: Server host (default: "127.0.0.1")
    /// - `PORT`: Server port (default: 5500)
    /// - `WORKERS`: Number of worker threads (default: 4)
    /// - `CORS_ALLOWED_ORIGIN`: Allowed CORS origin (default: "http://localhost:3000")
    /// - `ENABLE_CONSOLE_LOGGING`: Whether to enable console logging (default: true)
    /// - `WORKFLOW_API_KEYS`: Comma separated keys for the workflow trigger endpoint
    /// - `RATE_LIMIT_*`, `REMINDER_*`, `WORKFLOW_*`, `MAIL_*`: see the sub-configs
    ///
    /// # Panics
    ///
    /// This function will panic if required environment variables are missing or if
    /// numeric values cannot be parsed correctly.
    pub fn from_env() -> Arc<Self> {
        dotenvy::dotenv().ok();

        Arc::new(Config {
            environment: env::var("ENVIRONMENT").expect("ENVIRONMENT must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            jwt_config: JwtConfig::from_env(),
            server_host: env::var("IP").unwrap_or_else(|_| "127.0.0.1".to_string()),
            server_port: env_or("PORT", 5500),
            num_workers: env_or("WORKERS", 4),
            cors_allowed_origin: env::var("CORS_ALLOWED_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            console_logging_enabled: env::var("ENABLE_CONSOLE_LOGGING")
                .unwrap_or_else(|_| "true".to_string())
                .to_lowercase()
                == "true",
            workflow_api_keys: split_list(&env::var("WORKFLOW_API_KEYS").unwrap_or_default()),
            rate_limit: RateLimitConfig {
                global_per_second: env_or("RATE_LIMIT_GLOBAL_PER_SECOND", 50),
                ip_capacity: env_or("RATE_LIMIT_IP_CAPACITY", 10),
                ip_refill_amount: env_or("RATE_LIMIT_IP_REFILL", 5),
                ip_refill_interval_secs: env_or("RATE_LIMIT_IP_INTERVAL_SECONDS", 10),
            },
            reminder: ReminderConfig::from_env(),
            workflow: WorkflowConfig::from_env(),
            mail: MailConfig {
                api_url: env::var("MAIL_API_URL")
                    .unwrap_or_else(|_| "https://api.resend.com/emails".to_string()),
                api_key: env::var("MAIL_API_KEY").unwrap_or_default(),
                from: env::var("MAIL_FROM")
                    .unwrap_or_else(|_| "SubTrack <reminders@subtrack.local>".to_string()),
                account_settings_url: env::var("MAIL_ACCOUNT_SETTINGS_URL")
                    .unwrap_or_else(|_| "http://localhost:3000/settings".to_string()),
                support_url: env::var("MAIL_SUPPORT_URL")
                    .unwrap_or_else(|_| "http://localhost:3000/support".to_string()),
            },
        })
    }
}

/// Parses a reminder offset list such as `"7, 5, 2, 1"`.
/// The result is deduplicated and ordered largest first.
pub fn parse_offsets(raw: &str) -> Result<Vec<u32>, String> {
    let mut offsets = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>()
                .map_err(|e| format!("invalid reminder offset '{}': {}", s, e))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if offsets.is_empty() {
        return Err("at least one reminder offset is required".to_string());
    }

    offsets.sort_unstable_by(|a, b| b.cmp(a));
    offsets.dedup();
    Ok(offsets)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
