//! Usage aggregation.
//!
//! Flattens the upstream per-meter usage entries for one subscription into
//! the uniform billing-record shape the storefront serves.

use crate::models::UsageRecord;
use crate::services::sources::{RemoteSubscriptionSource, SourceError};
use std::sync::Arc;

pub struct UsageAggregator {
    source: Arc<dyn RemoteSubscriptionSource>,
}

impl UsageAggregator {
    pub fn new(source: Arc<dyn RemoteSubscriptionSource>) -> Self {
        Self { source }
    }

    /// One upstream round trip; returns every billed line item for the
    /// subscription in upstream order.
    pub async fn flatten_usage(
        &self,
        customer_id: &str,
        subscription_id: &str,
    ) -> Result<Vec<UsageRecord>, SourceError> {
        let entries = self
            .source
            .list_usage(customer_id, subscription_id)
            .await?;

        Ok(entries
            .into_iter()
            .map(|entry| UsageRecord {
                subscription_id: subscription_id.to_string(),
                // The usage API exposes a single resource identifier; it
                // backs both the URI and the type column downstream.
                resource_uri: entry.resource_id.clone(),
                resource_type: entry.resource_id,
                meter_id: entry.meter_id,
                meter_name: entry.meter_name,
                category: entry.category,
                resource_name: entry.resource_name,
                total_cost: entry.total_cost,
                normalized_cost: entry.usd_total_cost,
                last_modified: entry.last_modified,
            })
            .collect())
    }
}
