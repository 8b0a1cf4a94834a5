//! Postgres-backed local subscription store and offer catalog.
//!
//! The resold-offer catalog and the customer subscription entities live in
//! the service's own database; an external sync job keeps the
//! `upstream_offers` mirror current. Everything here is read-only from the
//! engine's perspective.

use crate::models::{LocalSubscription, PartnerOffer, UpstreamOfferRef};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::sources::{LocalSubscriptionStore, OfferCatalog, SourceError};
use async_trait::async_trait;
use portal_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "subscription-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["health_check"])
            .start_timer();

        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;

        timer.observe_duration();
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }
}

fn query_error(operation: &str, err: sqlx::Error) -> SourceError {
    SourceError::Unavailable(format!("{} query failed: {}", operation, err))
}

#[async_trait]
impl LocalSubscriptionStore for Database {
    #[instrument(skip(self), fields(customer_id = %customer_id))]
    async fn list_by_customer(
        &self,
        customer_id: &str,
    ) -> Result<Vec<LocalSubscription>, SourceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_by_customer"])
            .start_timer();

        let rows = sqlx::query_as::<_, LocalSubscription>(
            r#"
            SELECT subscription_id, customer_id, offer_id, expiry_date
            FROM customer_subscriptions
            WHERE customer_id = $1
            ORDER BY subscription_id
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error("list_by_customer", e))?;

        timer.observe_duration();
        Ok(rows)
    }
}

#[async_trait]
impl OfferCatalog for Database {
    #[instrument(skip(self))]
    async fn offers(&self) -> Result<Vec<PartnerOffer>, SourceError> {
        let timer = DB_QUERY_DURATION.with_label_values(&["offers"]).start_timer();

        let rows = sqlx::query_as::<_, PartnerOffer>(
            r#"
            SELECT id, title, price, upstream_offer_id, is_inactive
            FROM partner_offers
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error("offers", e))?;

        timer.observe_duration();
        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn upstream_offers(&self) -> Result<Vec<UpstreamOfferRef>, SourceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["upstream_offers"])
            .start_timer();

        let rows = sqlx::query_as::<_, UpstreamOfferRef>(
            r#"
            SELECT id, name
            FROM upstream_offers
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| query_error("upstream_offers", e))?;

        timer.observe_duration();
        Ok(rows)
    }

    #[instrument(skip(self), fields(offer_id = %offer_id))]
    async fn is_active(&self, offer_id: &str) -> Result<bool, SourceError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["is_active"])
            .start_timer();

        let active: Option<(bool,)> = sqlx::query_as(
            r#"
            SELECT NOT is_inactive
            FROM partner_offers
            WHERE id = $1
            "#,
        )
        .bind(offer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| query_error("is_active", e))?;

        timer.observe_duration();
        Ok(active.map(|(a,)| a).unwrap_or(false))
    }
}
