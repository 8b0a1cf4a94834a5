//! Partner API client.
//!
//! Talks to the upstream partner-management service over HTTPS: the
//! authoritative subscription list and the per-subscription usage records.
//! Authentication is delegated to a [`CredentialProvider`], which hides the
//! token cache and refresh-on-expiry behind a single `get_valid` call.

use crate::config::PartnerApiConfig;
use crate::models::{RawUsageEntry, RemoteSubscription};
use crate::services::metrics::record_partner_api_request;
use crate::services::sources::{RemoteSubscriptionSource, SourceError};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::RwLock;

/// Refresh this long before the advertised expiry to absorb clock skew.
const EXPIRY_SKEW_SECS: i64 = 60;

/// A bearer token valid until `expires_at`.
#[derive(Clone, Debug)]
pub struct Credential {
    pub access_token: Secret<String>,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    fn is_usable(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_SKEW_SECS) < self.expires_at
    }
}

/// Capability interface for acquiring valid upstream credentials.
/// Refresh-on-demand lives inside the provider, never at call sites.
#[async_trait]
pub trait CredentialProvider: Send + Sync {
    async fn get_valid(&self) -> Result<Credential, SourceError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Client-credentials token provider with an in-process cache.
pub struct PartnerCredentialProvider {
    http: Client,
    token_url: String,
    client_id: String,
    client_secret: Secret<String>,
    cached: RwLock<Option<Credential>>,
}

impl PartnerCredentialProvider {
    pub fn new(http: Client, config: &PartnerApiConfig) -> Self {
        Self {
            http,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            cached: RwLock::new(None),
        }
    }

    async fn fetch_token(&self) -> Result<Credential, SourceError> {
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.expose_secret().as_str()),
        ];

        let response = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| request_error(e, StdDuration::from_secs(30)))?;

        if !response.status().is_success() {
            return Err(SourceError::Unavailable(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Malformed(format!("token response: {}", e)))?;

        Ok(Credential {
            access_token: Secret::new(token.access_token),
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        })
    }
}

#[async_trait]
impl CredentialProvider for PartnerCredentialProvider {
    async fn get_valid(&self) -> Result<Credential, SourceError> {
        let now = Utc::now();
        if let Some(credential) = self.cached.read().await.as_ref() {
            if credential.is_usable(now) {
                return Ok(credential.clone());
            }
        }

        let mut cached = self.cached.write().await;
        // Another request may have refreshed while we waited for the lock.
        if let Some(credential) = cached.as_ref() {
            if credential.is_usable(now) {
                return Ok(credential.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        tracing::debug!(expires_at = %fresh.expires_at, "partner API token refreshed");
        *cached = Some(fresh.clone());
        Ok(fresh)
    }
}

/// Collection envelope used by the partner API.
#[derive(Debug, Deserialize)]
struct ResourceCollection<T> {
    items: Vec<T>,
}

/// Error envelope used by the partner API on 4xx responses.
#[derive(Debug, Deserialize)]
struct PartnerApiError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

/// reqwest-backed implementation of [`RemoteSubscriptionSource`].
pub struct PartnerApiClient {
    http: Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
    request_timeout: StdDuration,
}

impl PartnerApiClient {
    pub fn new(
        http: Client,
        base_url: String,
        credentials: Arc<dyn CredentialProvider>,
        request_timeout: StdDuration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            request_timeout,
        }
    }

    async fn get_collection<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &'static str,
        url: String,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, SourceError> {
        let credential = self.credentials.get_valid().await?;

        let response = self
            .http
            .get(&url)
            .query(query)
            .bearer_auth(credential.access_token.expose_secret())
            .send()
            .await
            .map_err(|e| {
                record_partner_api_request(endpoint, "transport_error");
                request_error(e, self.request_timeout)
            })?;

        let status = response.status();
        record_partner_api_request(endpoint, status.as_str());

        if status == StatusCode::BAD_REQUEST {
            let error: PartnerApiError = response.json().await.unwrap_or(PartnerApiError {
                code: String::new(),
                description: String::new(),
            });
            tracing::warn!(endpoint, code = %error.code, "partner API rejected request");
            return Err(SourceError::InvalidLocale(error.description));
        }

        if !status.is_success() {
            return Err(SourceError::Unavailable(format!(
                "partner API returned {} for {}",
                status, endpoint
            )));
        }

        let collection: ResourceCollection<T> = response
            .json()
            .await
            .map_err(|e| SourceError::Malformed(format!("{}: {}", endpoint, e)))?;

        Ok(collection.items)
    }
}

#[async_trait]
impl RemoteSubscriptionSource for PartnerApiClient {
    async fn list_subscriptions(
        &self,
        customer_id: &str,
        locale: &str,
    ) -> Result<Vec<RemoteSubscription>, SourceError> {
        let url = format!("{}/v1/customers/{}/subscriptions", self.base_url, customer_id);
        self.get_collection("list_subscriptions", url, &[("locale", locale)])
            .await
    }

    async fn list_usage(
        &self,
        customer_id: &str,
        subscription_id: &str,
    ) -> Result<Vec<RawUsageEntry>, SourceError> {
        let url = format!(
            "{}/v1/customers/{}/subscriptions/{}/usagerecords",
            self.base_url, customer_id, subscription_id
        );
        self.get_collection("list_usage", url, &[]).await
    }
}

fn request_error(err: reqwest::Error, timeout: StdDuration) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout(timeout)
    } else {
        SourceError::Unavailable(err.to_string())
    }
}
