//! Telemetry sink implementations.

use crate::services::sources::TelemetrySink;
use std::collections::HashMap;

/// Production sink: events become structured log lines. Emission never
/// fails from the caller's point of view.
pub struct LoggingTelemetry;

impl TelemetrySink for LoggingTelemetry {
    fn track_event(
        &self,
        name: &str,
        properties: HashMap<String, String>,
        measurements: HashMap<String, f64>,
    ) {
        tracing::info!(
            event = name,
            properties = ?properties,
            measurements = ?measurements,
            "telemetry event"
        );
    }
}

/// Sink that drops everything; handy when telemetry is not configured.
pub struct NullTelemetry;

impl TelemetrySink for NullTelemetry {
    fn track_event(&self, _: &str, _: HashMap<String, String>, _: HashMap<String, f64>) {}
}
