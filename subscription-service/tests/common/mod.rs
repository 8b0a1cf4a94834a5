//! Common test utilities for subscription-service integration tests.
//!
//! The reconciliation engine runs entirely against in-memory collaborators
//! here; no database or network is involved.

// Not every test binary uses every helper.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use subscription_service::models::{
    LocalSubscription, PartnerOffer, RawUsageEntry, RemoteSubscription, SubscriptionStatus,
    UpstreamOfferRef,
};
use subscription_service::services::{
    Clock, LocalSubscriptionStore, OfferCatalog, ReconciliationEngine, RemoteSubscriptionSource,
    SourceError, TelemetrySink,
};

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,subscription_service=debug")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn dec(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

pub fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
}

/// The fixed "today" all engine tests run against.
pub fn test_now() -> DateTime<Utc> {
    at(2026, 6, 1)
}

pub fn remote_subscription(id: &str, creation: DateTime<Utc>) -> RemoteSubscription {
    RemoteSubscription {
        id: id.to_string(),
        offer_name: format!("Upstream offer for {}", id),
        quantity: 5,
        status: SubscriptionStatus::Active,
        creation_date: creation,
        commitment_end_date: creation + chrono::Duration::days(365),
    }
}

pub fn local_subscription(id: &str, offer_id: &str, expiry: DateTime<Utc>) -> LocalSubscription {
    LocalSubscription {
        subscription_id: id.to_string(),
        customer_id: "cust-1".to_string(),
        offer_id: offer_id.to_string(),
        expiry_date: expiry,
    }
}

pub fn offer(id: &str, price: &str, upstream: Option<&str>, is_inactive: bool) -> PartnerOffer {
    PartnerOffer {
        id: id.to_string(),
        title: format!("Offer {}", id),
        price: dec(price),
        upstream_offer_id: upstream.map(str::to_string),
        is_inactive,
    }
}

pub fn usage_entry(resource_id: &str, usd_cost: &str) -> RawUsageEntry {
    RawUsageEntry {
        resource_id: resource_id.to_string(),
        meter_id: "meter-1".to_string(),
        meter_name: "Compute Hours".to_string(),
        category: "Compute".to_string(),
        resource_name: "vm-0".to_string(),
        total_cost: dec(usd_cost),
        usd_total_cost: dec(usd_cost),
        last_modified: test_now(),
    }
}

// ============================================================================
// Fake collaborators
// ============================================================================

#[derive(Default)]
pub struct FakeRemote {
    pub subscriptions: Vec<RemoteSubscription>,
    pub usage: HashMap<String, Vec<RawUsageEntry>>,
    /// Subscription ids whose usage fetch should fail.
    pub failing_usage: Vec<String>,
    /// When set, `list_subscriptions` fails with this error kind.
    pub list_failure: Option<&'static str>,
}

fn make_error(kind: &'static str) -> SourceError {
    match kind {
        "timeout" => SourceError::Timeout(Duration::from_secs(5)),
        "invalid_locale" => SourceError::InvalidLocale("xx-XX".to_string()),
        "malformed" => SourceError::Malformed("truncated payload".to_string()),
        _ => SourceError::Unavailable("injected failure".to_string()),
    }
}

#[async_trait]
impl RemoteSubscriptionSource for FakeRemote {
    async fn list_subscriptions(
        &self,
        _customer_id: &str,
        _locale: &str,
    ) -> Result<Vec<RemoteSubscription>, SourceError> {
        match self.list_failure {
            Some(kind) => Err(make_error(kind)),
            None => Ok(self.subscriptions.clone()),
        }
    }

    async fn list_usage(
        &self,
        _customer_id: &str,
        subscription_id: &str,
    ) -> Result<Vec<RawUsageEntry>, SourceError> {
        if self.failing_usage.iter().any(|id| id == subscription_id) {
            return Err(SourceError::Unavailable("usage endpoint down".to_string()));
        }
        Ok(self.usage.get(subscription_id).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct FakeStore {
    pub subscriptions: Vec<LocalSubscription>,
    pub fail: bool,
}

#[async_trait]
impl LocalSubscriptionStore for FakeStore {
    async fn list_by_customer(
        &self,
        _customer_id: &str,
    ) -> Result<Vec<LocalSubscription>, SourceError> {
        if self.fail {
            return Err(SourceError::Unavailable("store down".to_string()));
        }
        Ok(self.subscriptions.clone())
    }
}

#[derive(Default)]
pub struct FakeCatalog {
    pub offers: Vec<PartnerOffer>,
    pub upstream: Vec<UpstreamOfferRef>,
}

#[async_trait]
impl OfferCatalog for FakeCatalog {
    async fn offers(&self) -> Result<Vec<PartnerOffer>, SourceError> {
        Ok(self.offers.clone())
    }

    async fn upstream_offers(&self) -> Result<Vec<UpstreamOfferRef>, SourceError> {
        Ok(self.upstream.clone())
    }
}

/// Records every tracked event for later assertions.
#[derive(Default)]
pub struct RecordingTelemetry {
    pub events: Mutex<Vec<(String, HashMap<String, String>, HashMap<String, f64>)>>,
}

impl TelemetrySink for RecordingTelemetry {
    fn track_event(
        &self,
        name: &str,
        properties: HashMap<String, String>,
        measurements: HashMap<String, f64>,
    ) {
        self.events
            .lock()
            .unwrap()
            .push((name.to_string(), properties, measurements));
    }
}

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Builds a [`ReconciliationEngine`] wired to the fakes above.
pub struct EngineFixture {
    pub engine: ReconciliationEngine,
    pub telemetry: Arc<RecordingTelemetry>,
}

pub fn engine(remote: FakeRemote, store: FakeStore, catalog: FakeCatalog) -> EngineFixture {
    init_tracing();
    let telemetry = Arc::new(RecordingTelemetry::default());
    let engine = ReconciliationEngine::new(
        Arc::new(remote),
        Arc::new(store),
        Arc::new(catalog),
        telemetry.clone(),
        Arc::new(FixedClock(test_now())),
        Duration::from_secs(5),
        2,
    );
    EngineFixture { engine, telemetry }
}

/// Upstream catalog containing the single live offer id "U1".
pub fn upstream_u1() -> Vec<UpstreamOfferRef> {
    vec![UpstreamOfferRef {
        id: "U1".to_string(),
        name: "Upstream Offer One".to_string(),
    }]
}
