use std::{env, time::Duration as StdDuration};

use chrono::Duration;
use log::*;
use rand::{distributions::Alphanumeric, Rng};
use shop_common::{helpers::parse_boolean_flag, Money, Secret};

const DEFAULT_SFS_HOST: &str = "127.0.0.1";
const DEFAULT_SFS_PORT: u16 = 8360;
const DEFAULT_ORDER_EXPIRY_MINUTES: i64 = 30;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 1800;
const DEFAULT_SHIPPING_FEE: i64 = 40;
const DEFAULT_INTENT_RATE_LIMIT: u32 = 10;
const DEFAULT_INTENT_RATE_WINDOW_SECS: u64 = 60;
const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;
const DEFAULT_PAYMENT_API_URL: &str = "https://api.stripe.com";

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    pub payment: PaymentGatewayConfig,
    /// How long a pending order may await payment before the sweeper marks it expired.
    pub order_expiry: Duration,
    /// How often the expiry sweeper runs.
    pub sweep_interval: StdDuration,
    /// The fixed shipping fee added to every order total.
    pub shipping_fee: Money,
    /// Maximum payment-intent creations per account per rate window.
    pub intent_rate_limit: u32,
    pub intent_rate_window: StdDuration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SFS_HOST.to_string(),
            port: DEFAULT_SFS_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            payment: PaymentGatewayConfig::default(),
            order_expiry: Duration::minutes(DEFAULT_ORDER_EXPIRY_MINUTES),
            sweep_interval: StdDuration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            shipping_fee: Money::from(DEFAULT_SHIPPING_FEE),
            intent_rate_limit: DEFAULT_INTENT_RATE_LIMIT,
            intent_rate_window: StdDuration::from_secs(DEFAULT_INTENT_RATE_WINDOW_SECS),
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("SFS_HOST").ok().unwrap_or_else(|| DEFAULT_SFS_HOST.into());
        let port = env::var("SFS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SFS_PORT. {e} Using the default, {DEFAULT_SFS_PORT}, instead."
                    );
                    DEFAULT_SFS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SFS_PORT);
        let database_url = env::var("SFS_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ SFS_DATABASE_URL is not set. Please set it to the URL for the storefront database.");
            String::default()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            warn!("🪛️ Could not load the authentication configuration from environment variables. {e}");
            AuthConfig::default()
        });
        let payment = PaymentGatewayConfig::from_env_or_default();
        let order_expiry =
            env_duration_minutes("SFS_ORDER_EXPIRY_MINUTES", Duration::minutes(DEFAULT_ORDER_EXPIRY_MINUTES));
        let sweep_interval = StdDuration::from_secs(env_u64("SFS_EXPIRY_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL_SECS));
        let shipping_fee = Money::from(env_i64("SFS_SHIPPING_FEE", DEFAULT_SHIPPING_FEE));
        let intent_rate_limit = env_u64("SFS_INTENT_RATE_LIMIT", u64::from(DEFAULT_INTENT_RATE_LIMIT)) as u32;
        let intent_rate_window =
            StdDuration::from_secs(env_u64("SFS_INTENT_RATE_WINDOW_SECS", DEFAULT_INTENT_RATE_WINDOW_SECS));
        Self {
            host,
            port,
            database_url,
            auth,
            payment,
            order_expiry,
            sweep_interval,
            shipping_fee,
            intent_rate_limit,
            intent_rate_window,
        }
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|s| {
            s.parse::<u64>().map_err(|e| warn!("🪛️ Invalid configuration value for {name}: {s}. {e}")).ok()
        })
        .unwrap_or(default)
}

fn env_i64(name: &str, default: i64) -> i64 {
    env::var(name)
        .ok()
        .and_then(|s| {
            s.parse::<i64>().map_err(|e| warn!("🪛️ Invalid configuration value for {name}: {s}. {e}")).ok()
        })
        .unwrap_or(default)
}

fn env_duration_minutes(name: &str, default: Duration) -> Duration {
    env::var(name)
        .map_err(|_| {
            info!("🪛️ {name} is not set. Using the default value of {} minutes.", default.num_minutes());
        })
        .and_then(|s| {
            s.parse::<i64>()
                .map(Duration::minutes)
                .map_err(|e| warn!("🪛️ Invalid configuration value for {name}. {e}"))
        })
        .unwrap_or(default)
}

//-------------------------------------------------  AuthConfig  ------------------------------------------------------
/// The shared secret used to verify the HS256 bearer tokens minted by the identity provider.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: Secret<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        warn!(
            "🚨️🚨️🚨️ The JWT verification secret has not been set. I'm using a random value for this session, so NO \
             externally issued token will verify. Set SFS_JWT_SECRET to the identity provider's signing secret. 🚨️🚨️🚨️"
        );
        let secret: String = rand::thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect();
        Self { jwt_secret: Secret::new(secret) }
    }
}

impl AuthConfig {
    pub fn try_from_env() -> Result<Self, String> {
        let secret = env::var("SFS_JWT_SECRET").map_err(|e| format!("{e} [SFS_JWT_SECRET]"))?;
        if secret.is_empty() {
            return Err("SFS_JWT_SECRET is empty".to_string());
        }
        Ok(Self { jwt_secret: Secret::new(secret) })
    }
}

//--------------------------------------------  PaymentGatewayConfig  -------------------------------------------------
#[derive(Clone, Debug)]
pub struct PaymentGatewayConfig {
    /// Base URL of the payment gateway REST API.
    pub api_url: String,
    /// The secret API key used for outbound gateway calls (intent creation, refunds).
    pub api_key: Secret<String>,
    /// The shared secret the gateway signs webhook payloads with. When this is `None`, webhook requests are
    /// rejected with a server error — a misconfigured deployment must never silently accept unverified events.
    pub webhook_secret: Option<Secret<String>>,
    /// Maximum age of a webhook signature timestamp before it is treated as a replay.
    pub webhook_tolerance: Duration,
    /// Skip signature verification entirely. For local development only. **DANGER**
    pub disable_signature_checks: bool,
}

impl Default for PaymentGatewayConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_PAYMENT_API_URL.to_string(),
            api_key: Secret::default(),
            webhook_secret: None,
            webhook_tolerance: Duration::seconds(DEFAULT_WEBHOOK_TOLERANCE_SECS),
            disable_signature_checks: false,
        }
    }
}

impl PaymentGatewayConfig {
    pub fn from_env_or_default() -> Self {
        let api_url = env::var("SFS_PAYMENT_API_URL").ok().unwrap_or_else(|| {
            info!("🪛️ SFS_PAYMENT_API_URL is not set. Using the default, {DEFAULT_PAYMENT_API_URL}.");
            DEFAULT_PAYMENT_API_URL.to_string()
        });
        let api_key = env::var("SFS_PAYMENT_API_KEY").ok().unwrap_or_else(|| {
            error!("🪛️ SFS_PAYMENT_API_KEY is not set. Outbound payment gateway calls will fail.");
            String::default()
        });
        let webhook_secret = match env::var("SFS_PAYMENT_WEBHOOK_SECRET") {
            Ok(s) if !s.is_empty() => Some(Secret::new(s)),
            _ => {
                error!(
                    "🪛️ SFS_PAYMENT_WEBHOOK_SECRET is not set. Incoming payment webhooks will be REJECTED until it \
                     is configured."
                );
                None
            },
        };
        let tolerance = Duration::seconds(env_i64("SFS_WEBHOOK_TOLERANCE_SECS", DEFAULT_WEBHOOK_TOLERANCE_SECS));
        let disable_signature_checks =
            parse_boolean_flag(env::var("SFS_DISABLE_WEBHOOK_SIGNATURE_CHECKS").ok(), false);
        if disable_signature_checks {
            warn!("🚨️ Webhook signature checks are DISABLED. Do not run production like this.");
        }
        Self {
            api_url,
            api_key: Secret::new(api_key),
            webhook_secret,
            webhook_tolerance: tolerance,
            disable_signature_checks,
        }
    }
}

//-------------------------------------------------  OrderPolicy  -----------------------------------------------------
/// The subset of the configuration that order-creation handlers need. Kept small, `Copy`, and free of secrets so it
/// can be dropped into application data without passing the whole configuration around.
#[derive(Clone, Copy, Debug)]
pub struct OrderPolicy {
    pub shipping_fee: Money,
    pub order_expiry: Duration,
}

impl OrderPolicy {
    pub fn from_config(config: &ServerConfig) -> Self {
        Self { shipping_fee: config.shipping_fee, order_expiry: config.order_expiry }
    }
}
