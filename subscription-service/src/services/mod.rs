//! Services module for subscription-service.

pub mod engine;
pub mod entitlement;
pub mod metrics;
pub mod partner;
pub mod repository;
pub mod sources;
pub mod telemetry;
pub mod usage;

pub use engine::{ReconcileError, ReconciliationEngine};
pub use entitlement::{compute_entitlement, prorated_seat_charge, EntitlementError};
pub use metrics::{
    get_metrics, init_metrics, record_error, record_partner_api_request, record_reconciliation,
    record_usage_fetch_failure,
};
pub use partner::{Credential, CredentialProvider, PartnerApiClient, PartnerCredentialProvider};
pub use repository::Database;
pub use sources::{
    Clock, LocalSubscriptionStore, OfferCatalog, RemoteSubscriptionSource, SourceError,
    SystemClock, TelemetrySink,
};
pub use telemetry::{LoggingTelemetry, NullTelemetry};
pub use usage::UsageAggregator;
