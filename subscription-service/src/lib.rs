//! Subscription Service - storefront subscription reconciliation and
//! entitlement computation.

pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;
