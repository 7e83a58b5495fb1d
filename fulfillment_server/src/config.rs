//! Server configuration, read from `OFG_*` environment variables.
//!
//! Missing or unparseable values fall back to a default, with a log message saying so. The two secrets,
//! `OFG_WEBHOOK_SECRET` and `OFG_OPERATOR_TOKEN`, have no defaults.
use std::{env, fmt::Display, str::FromStr, time::Duration};

use fulfillment_engine::{
    events::DeliveryPolicy,
    fe_api::{inventory_api::DEFAULT_LOW_STOCK_THRESHOLD, webhook_ledger_api::DEFAULT_MAX_STORED_PAYLOAD},
    helpers::DeploymentMode,
    LowStockPolicy,
};
use log::*;
use ofg_common::{helpers::parse_boolean_flag, Secret};

const DEFAULT_OFG_HOST: &str = "127.0.0.1";
const DEFAULT_OFG_PORT: u16 = 8460;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/fulfillment.db";
const DEFAULT_ALERT_WINDOW_HOURS: i64 = 24;
const DEFAULT_DELIVERY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MAX_CONCURRENT_DELIVERIES: usize = 16;
const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub environment: DeploymentMode,
    /// Shared with the payment provider. Every notification signature is checked against it.
    pub webhook_secret: Secret<String>,
    /// Operators present this token in the `ofg_operator_token` header.
    pub operator_token: Secret<String>,
    /// If true, an order cannot be marked as shipped without a tracking number.
    pub require_tracking_number: bool,
    pub low_stock: LowStockPolicy,
    /// Raw payloads longer than this are truncated in the webhook audit log.
    pub max_stored_payload: usize,
    pub delivery: DeliveryPolicy,
    pub event_buffer_size: usize,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address.
    pub use_forwarded: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_OFG_HOST.to_string(),
            port: DEFAULT_OFG_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            environment: DeploymentMode::Production,
            webhook_secret: Secret::default(),
            operator_token: Secret::default(),
            require_tracking_number: true,
            low_stock: LowStockPolicy::default(),
            max_stored_payload: DEFAULT_MAX_STORED_PAYLOAD,
            delivery: DeliveryPolicy::default(),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            use_x_forwarded_for: false,
            use_forwarded: false,
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        let host = env::var("OFG_HOST").ok().unwrap_or_else(|| DEFAULT_OFG_HOST.into());
        let port = parse_env("OFG_PORT", DEFAULT_OFG_PORT);
        let database_url = env::var("OFG_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ OFG_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}");
            DEFAULT_DATABASE_URL.to_string()
        });
        let environment = parse_env("OFG_ENVIRONMENT", DeploymentMode::Production);
        let webhook_secret = Secret::new(env::var("OFG_WEBHOOK_SECRET").ok().unwrap_or_else(|| {
            error!("🪛️ OFG_WEBHOOK_SECRET is not set. Please set it to the secret shared with the payment provider.");
            String::default()
        }));
        let operator_token = Secret::new(env::var("OFG_OPERATOR_TOKEN").ok().unwrap_or_else(|| {
            warn!("🪛️ OFG_OPERATOR_TOKEN is not set. The operator API will refuse every request.");
            String::default()
        }));
        let require_tracking_number = parse_boolean_flag(env::var("OFG_REQUIRE_TRACKING_NUMBER").ok(), true);
        let low_stock = LowStockPolicy {
            default_threshold: parse_env("OFG_LOW_STOCK_THRESHOLD", DEFAULT_LOW_STOCK_THRESHOLD),
            alert_window: chrono::Duration::hours(parse_env(
                "OFG_LOW_STOCK_ALERT_WINDOW_HOURS",
                DEFAULT_ALERT_WINDOW_HOURS,
            )),
        };
        let max_stored_payload = parse_env("OFG_MAX_STORED_PAYLOAD", DEFAULT_MAX_STORED_PAYLOAD);
        let delivery = DeliveryPolicy {
            timeout: Duration::from_millis(parse_env("OFG_DELIVERY_TIMEOUT_MS", DEFAULT_DELIVERY_TIMEOUT_MS)),
            max_in_flight: parse_env("OFG_MAX_CONCURRENT_DELIVERIES", DEFAULT_MAX_CONCURRENT_DELIVERIES),
            operator_email: env::var("OFG_OPERATOR_EMAIL").ok().filter(|s| !s.trim().is_empty()),
        };
        if delivery.operator_email.is_none() {
            info!("🪛️ OFG_OPERATOR_EMAIL is not set. Operator alerts will be in-app only.");
        }
        let event_buffer_size = parse_env("OFG_EVENT_BUFFER_SIZE", DEFAULT_EVENT_BUFFER_SIZE);
        let use_x_forwarded_for = parse_boolean_flag(env::var("OFG_USE_X_FORWARDED_FOR").ok(), false);
        let use_forwarded = parse_boolean_flag(env::var("OFG_USE_FORWARDED").ok(), false);
        Self {
            host,
            port,
            database_url,
            environment,
            webhook_secret,
            operator_token,
            require_tracking_number,
            low_stock,
            max_stored_payload,
            delivery,
            event_buffer_size,
            use_x_forwarded_for,
            use_forwarded,
        }
    }

    pub fn route_config(&self) -> RouteConfig {
        RouteConfig {
            use_x_forwarded_for: self.use_x_forwarded_for,
            use_forwarded: self.use_forwarded,
            require_tracking_number: self.require_tracking_number,
        }
    }
}

/// Reads `name` from the environment, falling back to `default` if it is missing or invalid.
fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}

/// The slice of configuration that route handlers need.
#[derive(Clone, Copy, Debug)]
pub struct RouteConfig {
    pub use_x_forwarded_for: bool,
    pub use_forwarded: bool,
    pub require_tracking_number: bool,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self { use_x_forwarded_for: false, use_forwarded: false, require_tracking_number: true }
    }
}
