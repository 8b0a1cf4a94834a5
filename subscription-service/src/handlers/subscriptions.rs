//! Managed-subscriptions handler.
//!
//! Thin request layer over the reconciliation engine: validates input, runs
//! one reconciliation, serializes the view as JSON.

use crate::services::{record_error, ReconcileError};
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use portal_core::error::AppError;
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct SubscriptionsQuery {
    /// BCP 47 locale for offer names, e.g. "en-US".
    #[validate(length(min = 2, max = 35))]
    pub locale: Option<String>,
}

/// GET /api/customers/:customer_id/subscriptions
pub async fn list_managed_subscriptions(
    State(state): State<AppState>,
    Path(customer_id): Path<String>,
    Query(query): Query<SubscriptionsQuery>,
) -> Result<Json<crate::models::ReconciledView>, AppError> {
    query.validate()?;

    if customer_id.trim().is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "customer id must not be empty"
        )));
    }

    let locale = query
        .locale
        .as_deref()
        .unwrap_or(&state.config.default_locale);

    let view = state
        .engine
        .reconcile(&customer_id, locale)
        .await
        .map_err(|err| match err {
            ReconcileError::InvalidCountryOrLocale(detail) => {
                record_error("invalid_locale");
                AppError::BadRequest(anyhow::anyhow!("invalid country or locale: {}", detail))
            }
            ReconcileError::UpstreamUnavailable(source) => {
                record_error("upstream_unavailable");
                tracing::error!(error = %source, "reconciliation failed");
                AppError::BadGateway(source.to_string())
            }
        })?;

    Ok(Json(view))
}
