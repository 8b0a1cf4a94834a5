//! Entitlement calculator.
//!
//! Pure derivation of renewability, editability, and prorated pricing for one
//! local subscription record. No collaborators are touched here; the engine
//! feeds in the catalog state it already fetched.

use crate::models::{Entitlement, LocalSubscription, PartnerOffer};
use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::HashSet;
use thiserror::Error;

/// A subscription renews through the storefront only inside this window
/// before expiry.
const RENEWAL_WINDOW_DAYS: i64 = 30;

/// Length of the billing cycle the seat price covers.
const BILLING_CYCLE_DAYS: i64 = 365;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntitlementError {
    /// The referenced offer has been deleted from the catalog (not merely
    /// marked inactive), so no local-offer linkage can be shown.
    #[error("offer '{offer_id}' not found in catalog")]
    OfferNotFound { offer_id: String },
}

/// Derives the entitlement state for one local subscription.
///
/// `upstream_offer_ids` is the set of offer ids still present in the upstream
/// catalog. When an offer's upstream counterpart has been retired, renewals
/// and edits are refused even if the local `is_inactive` flag lags behind.
pub fn compute_entitlement(
    subscription: &LocalSubscription,
    offer: Option<&PartnerOffer>,
    upstream_offer_ids: &HashSet<String>,
    today: NaiveDate,
    minor_units: u32,
) -> Result<Entitlement, EntitlementError> {
    let offer = offer.ok_or_else(|| EntitlementError::OfferNotFound {
        offer_id: subscription.offer_id.clone(),
    })?;

    let expiry = subscription.expiry_date.date_naive();
    let remaining_days = (expiry - today).num_days();

    let mut is_renewable = remaining_days <= RENEWAL_WINDOW_DAYS;
    let mut is_editable = today <= expiry;

    let upstream_live = offer
        .upstream_offer_id
        .as_deref()
        .is_some_and(|id| upstream_offer_ids.contains(id));

    // Cascading deactivation: an offer whose upstream counterpart is gone, or
    // one already marked inactive, locks the subscription down regardless of
    // the dates above.
    if offer.is_inactive || !upstream_live {
        is_renewable = false;
        is_editable = false;
    }

    Ok(Entitlement {
        offer_id: offer.id.clone(),
        title: offer.title.clone(),
        offer_price: offer.price,
        is_renewable,
        is_editable,
        prorated_price: prorated_seat_charge(expiry, today, offer.price, minor_units),
        expiry_date: subscription.expiry_date,
    })
}

/// Charge for one seat covering only the days left in the current billing
/// cycle. Rounds to the currency's minor unit, half away from zero.
pub fn prorated_seat_charge(
    expiry: NaiveDate,
    today: NaiveDate,
    unit_price: Decimal,
    minor_units: u32,
) -> Decimal {
    let remaining_days = (expiry - today).num_days().clamp(0, BILLING_CYCLE_DAYS);
    let charge = unit_price * Decimal::from(remaining_days) / Decimal::from(BILLING_CYCLE_DAYS);
    charge.round_dp_with_strategy(minor_units, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use std::str::FromStr;

    fn dec(value: &str) -> Decimal {
        Decimal::from_str(value).unwrap()
    }

    fn subscription(expiry_days_from_today: i64) -> LocalSubscription {
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();
        LocalSubscription {
            subscription_id: "S1".to_string(),
            customer_id: "C1".to_string(),
            offer_id: "O1".to_string(),
            expiry_date: now + Duration::days(expiry_days_from_today),
        }
    }

    fn offer(upstream: Option<&str>, is_inactive: bool) -> PartnerOffer {
        PartnerOffer {
            id: "O1".to_string(),
            title: "Mail Hosting".to_string(),
            price: dec("100.00"),
            upstream_offer_id: upstream.map(str::to_string),
            is_inactive,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()
    }

    fn upstream_set() -> HashSet<String> {
        HashSet::from(["U1".to_string()])
    }

    #[test]
    fn renewable_inside_thirty_day_window() {
        let sub = subscription(30);
        let offer = offer(Some("U1"), false);
        let result = compute_entitlement(&sub, Some(&offer), &upstream_set(), today(), 2).unwrap();
        assert!(result.is_renewable);
        assert!(result.is_editable);
    }

    #[test]
    fn not_renewable_outside_window() {
        let sub = subscription(31);
        let offer = offer(Some("U1"), false);
        let result = compute_entitlement(&sub, Some(&offer), &upstream_set(), today(), 2).unwrap();
        assert!(!result.is_renewable);
        assert!(result.is_editable);
    }

    #[test]
    fn editable_on_expiry_day_but_not_after() {
        let offer = offer(Some("U1"), false);
        let on_expiry =
            compute_entitlement(&subscription(0), Some(&offer), &upstream_set(), today(), 2)
                .unwrap();
        assert!(on_expiry.is_editable);

        let expired =
            compute_entitlement(&subscription(-1), Some(&offer), &upstream_set(), today(), 2)
                .unwrap();
        assert!(!expired.is_editable);
        // An expired subscription is still inside the renewal window.
        assert!(expired.is_renewable);
    }

    #[test]
    fn retired_upstream_offer_locks_subscription() {
        let sub = subscription(10);
        let offer = offer(Some("U-gone"), false);
        let result = compute_entitlement(&sub, Some(&offer), &upstream_set(), today(), 2).unwrap();
        assert!(!result.is_renewable);
        assert!(!result.is_editable);
    }

    #[test]
    fn offer_without_upstream_reference_locks_subscription() {
        let sub = subscription(10);
        let offer = offer(None, false);
        let result = compute_entitlement(&sub, Some(&offer), &upstream_set(), today(), 2).unwrap();
        assert!(!result.is_renewable);
        assert!(!result.is_editable);
    }

    #[test]
    fn inactive_offer_locks_subscription_despite_live_upstream() {
        let sub = subscription(10);
        let offer = offer(Some("U1"), true);
        let result = compute_entitlement(&sub, Some(&offer), &upstream_set(), today(), 2).unwrap();
        assert!(!result.is_renewable);
        assert!(!result.is_editable);
    }

    #[test]
    fn deleted_offer_is_reported_not_found() {
        let sub = subscription(10);
        let err = compute_entitlement(&sub, None, &upstream_set(), today(), 2).unwrap_err();
        assert_eq!(
            err,
            EntitlementError::OfferNotFound {
                offer_id: "O1".to_string()
            }
        );
    }

    #[test]
    fn prorated_charge_is_fraction_of_cycle() {
        let expiry = today() + Duration::days(73);
        // 100 * 73 / 365 = 20.00
        assert_eq!(
            prorated_seat_charge(expiry, today(), dec("100.00"), 2),
            dec("20.00")
        );
    }

    #[test]
    fn prorated_charge_rounds_half_away_from_zero() {
        let expiry = today() + Duration::days(1);
        // 9.125 / 365 = 0.025 exactly; banker's rounding would give 0.02.
        assert_eq!(
            prorated_seat_charge(expiry, today(), dec("9.125"), 2),
            dec("0.03")
        );
    }

    #[test]
    fn prorated_charge_clamps_expired_and_long_subscriptions() {
        assert_eq!(
            prorated_seat_charge(today() - Duration::days(5), today(), dec("100.00"), 2),
            dec("0.00")
        );
        assert_eq!(
            prorated_seat_charge(today() + Duration::days(900), today(), dec("100.00"), 2),
            dec("100.00")
        );
    }
}
