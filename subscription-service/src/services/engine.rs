//! Reconciliation engine.
//!
//! Merges the upstream subscription list with local entitlement records and
//! the offer catalog, partitions the result into customer-managed and
//! partner-managed sets, and aggregates per-subscription usage.

use crate::models::{
    CustomerManagedSubscription, PartnerManagedSubscription, PartnerOffer, ReconciledView,
};
use crate::services::entitlement::{compute_entitlement, EntitlementError};
use crate::services::metrics::{record_reconciliation, record_usage_fetch_failure};
use crate::services::sources::{
    Clock, LocalSubscriptionStore, OfferCatalog, RemoteSubscriptionSource, SourceError,
    TelemetrySink,
};
use crate::services::usage::UsageAggregator;
use futures::future;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::instrument;

/// Telemetry event emitted once per reconciliation.
const RECONCILE_EVENT: &str = "managed_subscriptions_reconciled";

/// Failure surfaced to the request layer. Everything else (missing offers,
/// per-subscription usage failures) is recovered internally.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("upstream source unavailable: {0}")]
    UpstreamUnavailable(#[source] SourceError),

    #[error("invalid country or locale: {0}")]
    InvalidCountryOrLocale(String),
}

impl ReconcileError {
    /// Classifies a failed load-bearing fetch.
    fn load_bearing(err: SourceError) -> Self {
        match err {
            SourceError::InvalidLocale(locale) => Self::InvalidCountryOrLocale(locale),
            other => Self::UpstreamUnavailable(other),
        }
    }
}

/// Per-request reconciliation orchestrator.
///
/// Holds no mutable state across calls; every collaborator sits behind a
/// trait so the engine can run against test doubles. Cancelling the inbound
/// request drops the `reconcile` future, which aborts any in-flight upstream
/// call; callers only ever observe a complete view or an error.
pub struct ReconciliationEngine {
    remote: Arc<dyn RemoteSubscriptionSource>,
    store: Arc<dyn LocalSubscriptionStore>,
    catalog: Arc<dyn OfferCatalog>,
    telemetry: Arc<dyn TelemetrySink>,
    clock: Arc<dyn Clock>,
    usage: UsageAggregator,
    upstream_timeout: Duration,
    currency_minor_units: u32,
}

impl ReconciliationEngine {
    pub fn new(
        remote: Arc<dyn RemoteSubscriptionSource>,
        store: Arc<dyn LocalSubscriptionStore>,
        catalog: Arc<dyn OfferCatalog>,
        telemetry: Arc<dyn TelemetrySink>,
        clock: Arc<dyn Clock>,
        upstream_timeout: Duration,
        currency_minor_units: u32,
    ) -> Self {
        let usage = UsageAggregator::new(remote.clone());
        Self {
            remote,
            store,
            catalog,
            telemetry,
            clock,
            usage,
            upstream_timeout,
            currency_minor_units,
        }
    }

    /// Produces the consolidated subscription view for one customer.
    #[instrument(skip(self), fields(customer_id = %customer_id, locale = %locale))]
    pub async fn reconcile(
        &self,
        customer_id: &str,
        locale: &str,
    ) -> Result<ReconciledView, ReconcileError> {
        let started = Instant::now();
        let result = self.reconcile_inner(customer_id, locale, started).await;

        let status = if result.is_ok() { "ok" } else { "error" };
        record_reconciliation(status, started.elapsed().as_secs_f64());

        result
    }

    async fn reconcile_inner(
        &self,
        customer_id: &str,
        locale: &str,
        started: Instant,
    ) -> Result<ReconciledView, ReconcileError> {
        // Remote list, local records, and catalog state have no data
        // dependency on each other; fetch them concurrently. All four are
        // load-bearing: any failure aborts the whole reconciliation.
        let (remote_subs, local_subs, offers, upstream_refs) = tokio::join!(
            self.bounded(self.remote.list_subscriptions(customer_id, locale)),
            self.bounded(self.store.list_by_customer(customer_id)),
            self.bounded(self.catalog.offers()),
            self.bounded(self.catalog.upstream_offers()),
        );

        let remote_subs = remote_subs.map_err(ReconcileError::load_bearing)?;
        let local_subs = local_subs.map_err(ReconcileError::load_bearing)?;
        let offers = offers.map_err(ReconcileError::load_bearing)?;
        let upstream_refs = upstream_refs.map_err(ReconcileError::load_bearing)?;

        let offers_by_id: HashMap<&str, &PartnerOffer> =
            offers.iter().map(|offer| (offer.id.as_str(), offer)).collect();
        let upstream_ids: HashSet<String> =
            upstream_refs.into_iter().map(|r| r.id).collect();
        let today = self.clock.now_utc().date_naive();

        // Derive entitlements for every local record, indexed by
        // subscription id. A record whose offer has been deleted outright is
        // skipped; its remote counterpart falls through to partner-managed.
        let mut entitlements = HashMap::with_capacity(local_subs.len());
        for subscription in &local_subs {
            let offer = offers_by_id.get(subscription.offer_id.as_str()).copied();
            match compute_entitlement(
                subscription,
                offer,
                &upstream_ids,
                today,
                self.currency_minor_units,
            ) {
                Ok(entitlement) => {
                    entitlements.insert(subscription.subscription_id.clone(), entitlement);
                }
                Err(EntitlementError::OfferNotFound { offer_id }) => {
                    tracing::warn!(
                        subscription_id = %subscription.subscription_id,
                        offer_id = %offer_id,
                        "local subscription references a deleted offer; excluding from customer-managed set"
                    );
                }
            }
        }

        // Partition: a remote subscription with a derived entitlement is
        // customer-managed; anything else is partner-managed.
        let mut customer_managed = Vec::new();
        let mut partner_managed = Vec::new();
        for remote in &remote_subs {
            match entitlements.remove(remote.id.as_str()) {
                Some(entitlement) => customer_managed
                    .push(CustomerManagedSubscription::from_parts(remote, entitlement)),
                None => partner_managed.push(PartnerManagedSubscription::from(remote)),
            }
        }

        if !entitlements.is_empty() {
            // Stale local-only records are not actionable; drop them quietly.
            tracing::debug!(
                count = entitlements.len(),
                "local subscriptions with no remote counterpart dropped"
            );
        }

        // Most recent first; sort_by is stable, so equal creation dates keep
        // their upstream order.
        customer_managed.sort_by(|a, b| b.creation_date.cmp(&a.creation_date));
        partner_managed.sort_by(|a, b| b.creation_date.cmp(&a.creation_date));

        // Usage is fetched per subscription, concurrently and in isolation:
        // one failure trims that subscription's line items, nothing else.
        let fetches = remote_subs.iter().map(|remote| {
            let subscription_id = remote.id.clone();
            async move {
                let result = self
                    .bounded(self.usage.flatten_usage(customer_id, &subscription_id))
                    .await;
                (subscription_id, result)
            }
        });

        let mut usage = Vec::new();
        for (subscription_id, result) in future::join_all(fetches).await {
            match result {
                Ok(mut records) => usage.append(&mut records),
                Err(err) => {
                    record_usage_fetch_failure(err.kind());
                    tracing::warn!(
                        subscription_id = %subscription_id,
                        error = %err,
                        "usage fetch failed; continuing without this subscription's usage"
                    );
                }
            }
        }

        self.telemetry.track_event(
            RECONCILE_EVENT,
            HashMap::from([("customer_id".to_string(), customer_id.to_string())]),
            HashMap::from([
                (
                    "elapsed_ms".to_string(),
                    started.elapsed().as_secs_f64() * 1000.0,
                ),
                (
                    "customer_managed_count".to_string(),
                    customer_managed.len() as f64,
                ),
                (
                    "partner_managed_count".to_string(),
                    partner_managed.len() as f64,
                ),
            ]),
        );

        Ok(ReconciledView {
            customer_managed,
            partner_managed,
            usage,
        })
    }

    /// Applies the engine-wide upstream timeout to one collaborator call.
    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, SourceError>>,
    ) -> Result<T, SourceError> {
        match tokio::time::timeout(self.upstream_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout(self.upstream_timeout)),
        }
    }
}
