//! Domain models for subscription-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Local Store Models
// ============================================================================

/// Locally persisted record of a sold entitlement.
///
/// Created by the purchase workflow, read-only here. The referenced offer is
/// guaranteed to exist at creation time but may be retired later, so lookups
/// must tolerate inactive offers.
#[derive(Debug, Clone, FromRow)]
pub struct LocalSubscription {
    pub subscription_id: String,
    pub customer_id: String,
    pub offer_id: String,
    pub expiry_date: DateTime<Utc>,
}

/// A resold catalog entry.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PartnerOffer {
    pub id: String,
    pub title: String,
    pub price: Decimal,
    pub upstream_offer_id: Option<String>,
    pub is_inactive: bool,
}

/// Reference to an offer in the upstream catalog.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UpstreamOfferRef {
    pub id: String,
    pub name: String,
}

// ============================================================================
// Remote Source Models
// ============================================================================

/// Subscription status as reported by the upstream partner service.
///
/// Unrecognized values deserialize to `Unknown`, which renders as an empty
/// display label rather than failing the whole fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    None,
    Active,
    Suspended,
    Deleted,
    #[serde(other)]
    Unknown,
}

impl SubscriptionStatus {
    /// User-facing status label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Active => "Active",
            Self::Suspended => "Suspended",
            Self::Deleted => "Deleted",
            Self::Unknown => "",
        }
    }
}

/// Subscription snapshot from the authoritative upstream source.
///
/// Immutable per fetch; never persisted by this service.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSubscription {
    pub id: String,
    pub offer_name: String,
    pub quantity: u32,
    pub status: SubscriptionStatus,
    pub creation_date: DateTime<Utc>,
    pub commitment_end_date: DateTime<Utc>,
}

/// One raw per-meter usage entry as returned by the upstream usage API.
#[derive(Debug, Clone, Deserialize)]
pub struct RawUsageEntry {
    pub resource_id: String,
    pub meter_id: String,
    pub meter_name: String,
    pub category: String,
    pub resource_name: String,
    pub total_cost: Decimal,
    pub usd_total_cost: Decimal,
    pub last_modified: DateTime<Utc>,
}

// ============================================================================
// Derived Models
// ============================================================================

/// Output of the entitlement calculator for one local subscription.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entitlement {
    pub offer_id: String,
    pub title: String,
    pub offer_price: Decimal,
    pub is_renewable: bool,
    pub is_editable: bool,
    pub prorated_price: Decimal,
    pub expiry_date: DateTime<Utc>,
}

/// Remote subscription joined with its locally derived entitlement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerManagedSubscription {
    pub id: String,
    pub friendly_name: String,
    pub quantity: u32,
    pub status: &'static str,
    pub creation_date: DateTime<Utc>,
    pub commitment_end_date: DateTime<Utc>,
    pub offer_id: String,
    pub offer_price: Decimal,
    pub is_renewable: bool,
    pub is_editable: bool,
    pub prorated_price: Decimal,
}

impl CustomerManagedSubscription {
    pub fn from_parts(remote: &RemoteSubscription, entitlement: Entitlement) -> Self {
        Self {
            id: remote.id.clone(),
            friendly_name: entitlement.title,
            quantity: remote.quantity,
            status: remote.status.label(),
            creation_date: remote.creation_date,
            commitment_end_date: remote.commitment_end_date,
            offer_id: entitlement.offer_id,
            offer_price: entitlement.offer_price,
            is_renewable: entitlement.is_renewable,
            is_editable: entitlement.is_editable,
            prorated_price: entitlement.prorated_price,
        }
    }
}

/// Remote subscription with no matching local record; only upstream fields
/// are available.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartnerManagedSubscription {
    pub id: String,
    pub offer_name: String,
    pub quantity: u32,
    pub status: &'static str,
    pub creation_date: DateTime<Utc>,
    pub commitment_end_date: DateTime<Utc>,
}

impl From<&RemoteSubscription> for PartnerManagedSubscription {
    fn from(remote: &RemoteSubscription) -> Self {
        Self {
            id: remote.id.clone(),
            offer_name: remote.offer_name.clone(),
            quantity: remote.quantity,
            status: remote.status.label(),
            creation_date: remote.creation_date,
            commitment_end_date: remote.commitment_end_date,
        }
    }
}

/// One billed-resource line item tied to a subscription.
///
/// `resource_uri` and `resource_type` both carry the upstream resource
/// identifier; the usage API exposes a single field for both.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageRecord {
    pub subscription_id: String,
    pub resource_uri: String,
    pub resource_type: String,
    pub meter_id: String,
    pub meter_name: String,
    pub category: String,
    pub resource_name: String,
    pub total_cost: Decimal,
    pub normalized_cost: Decimal,
    pub last_modified: DateTime<Utc>,
}

/// Consolidated reconciliation result for one customer.
///
/// Owned by the caller for the duration of one request; the engine never
/// caches it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconciledView {
    pub customer_managed: Vec<CustomerManagedSubscription>,
    pub partner_managed: Vec<PartnerManagedSubscription>,
    pub usage: Vec<UsageRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels_cover_known_values() {
        assert_eq!(SubscriptionStatus::Active.label(), "Active");
        assert_eq!(SubscriptionStatus::Suspended.label(), "Suspended");
        assert_eq!(SubscriptionStatus::Deleted.label(), "Deleted");
        assert_eq!(SubscriptionStatus::None.label(), "None");
        assert_eq!(SubscriptionStatus::Unknown.label(), "");
    }

    #[test]
    fn unrecognized_status_deserializes_to_unknown() {
        let status: SubscriptionStatus = serde_json::from_str("\"expired\"").unwrap();
        assert_eq!(status, SubscriptionStatus::Unknown);
    }
}
