//! Configuration module for subscription-service.

use portal_core::config as core_config;
use portal_core::error::AppError;
use secrecy::Secret;
use std::env;

#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub partner_api: PartnerApiConfig,
    /// Decimal digits of the active currency's minor unit.
    pub currency_minor_units: u32,
    /// Locale used when none is supplied on the request.
    pub default_locale: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Clone)]
pub struct PartnerApiConfig {
    pub base_url: String,
    pub token_url: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for PartnerApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartnerApiConfig")
            .field("base_url", &self.base_url)
            .field("token_url", &self.token_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl SubscriptionConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "subscription-service".to_string()),
            service_version: env::var("SERVICE_VERSION")
                .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            },
            partner_api: PartnerApiConfig {
                base_url: env::var("PARTNER_API_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("PARTNER_API_URL is required"))
                })?,
                token_url: env::var("PARTNER_TOKEN_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("PARTNER_TOKEN_URL is required"))
                })?,
                client_id: env::var("PARTNER_CLIENT_ID").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("PARTNER_CLIENT_ID is required"))
                })?,
                client_secret: Secret::new(env::var("PARTNER_CLIENT_SECRET").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("PARTNER_CLIENT_SECRET is required"))
                })?),
                request_timeout_secs: env::var("PARTNER_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            },
            currency_minor_units: env::var("CURRENCY_MINOR_UNITS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            default_locale: env::var("DEFAULT_LOCALE").unwrap_or_else(|_| "en-US".to_string()),
        })
    }
}
