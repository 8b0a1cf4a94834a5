//! Collaborator interfaces consumed by the reconciliation engine.
//!
//! Every dependency of the engine sits behind one of these traits so a test
//! double can stand in for the network or the database.

use crate::models::{
    LocalSubscription, PartnerOffer, RawUsageEntry, RemoteSubscription, UpstreamOfferRef,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single collaborator call.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("upstream request failed: {0}")]
    Unavailable(String),

    #[error("upstream request timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid country or locale: {0}")]
    InvalidLocale(String),

    #[error("malformed upstream payload: {0}")]
    Malformed(String),
}

impl SourceError {
    /// Short stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::Timeout(_) => "timeout",
            Self::InvalidLocale(_) => "invalid_locale",
            Self::Malformed(_) => "malformed",
        }
    }
}

/// Authoritative upstream view of a customer's subscriptions and usage.
#[async_trait]
pub trait RemoteSubscriptionSource: Send + Sync {
    /// Lists all subscriptions the upstream service holds for the customer,
    /// with offer names localized to `locale`.
    async fn list_subscriptions(
        &self,
        customer_id: &str,
        locale: &str,
    ) -> Result<Vec<RemoteSubscription>, SourceError>;

    /// Pulls the raw per-meter usage entries for one subscription. One
    /// upstream round trip per call.
    async fn list_usage(
        &self,
        customer_id: &str,
        subscription_id: &str,
    ) -> Result<Vec<RawUsageEntry>, SourceError>;
}

/// Locally persisted subscription records.
#[async_trait]
pub trait LocalSubscriptionStore: Send + Sync {
    async fn list_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Vec<LocalSubscription>, SourceError>;
}

/// Read-only query surface over the resold offer catalog.
#[async_trait]
pub trait OfferCatalog: Send + Sync {
    /// All offers, inactive ones included. Retired-but-not-deleted offers
    /// must stay resolvable so existing subscriptions remain readable.
    async fn offers(&self) -> Result<Vec<PartnerOffer>, SourceError>;

    /// Offers currently purchasable.
    async fn active_offers(&self) -> Result<Vec<PartnerOffer>, SourceError> {
        Ok(self
            .offers()
            .await?
            .into_iter()
            .filter(|offer| !offer.is_inactive)
            .collect())
    }

    /// The upstream catalog entries the resold offers map onto.
    async fn upstream_offers(&self) -> Result<Vec<UpstreamOfferRef>, SourceError>;

    /// Whether the offer exists and is not marked for deletion.
    async fn is_active(&self, offer_id: &str) -> Result<bool, SourceError> {
        Ok(self
            .offers()
            .await?
            .iter()
            .any(|offer| offer.id == offer_id && !offer.is_inactive))
    }
}

/// Fire-and-forget event sink. Implementations must swallow their own
/// failures; emission can never affect a reconciliation result.
pub trait TelemetrySink: Send + Sync {
    fn track_event(
        &self,
        name: &str,
        properties: HashMap<String, String>,
        measurements: HashMap<String, f64>,
    );
}

/// Injectable time source for deterministic entitlement tests.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation used in production.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
