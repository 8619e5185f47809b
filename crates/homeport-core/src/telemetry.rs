//! Diagnostic attribute collection
//!
//! The transport is someone else's concern; the install engine only records
//! key/value pairs while it works.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Sink for diagnostic key/value pairs
pub trait TelemetrySink: Send + Sync {
    /// Record an attribute, replacing any previous value for `key`
    fn attr(&self, key: &str, value: &str);
}

/// Discards every attribute
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn attr(&self, _key: &str, _value: &str) {}
}

/// Emits attributes as debug-level tracing events
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl TelemetrySink for TracingTelemetry {
    fn attr(&self, key: &str, value: &str) {
        tracing::debug!(target: "homeport::telemetry", key, value, "attribute");
    }
}

/// Keeps attributes in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryTelemetry {
    attrs: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value recorded for `key`
    pub fn get(&self, key: &str) -> Option<String> {
        self.attrs
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    /// Snapshot of every attribute
    pub fn all(&self) -> BTreeMap<String, String> {
        self.attrs.read().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl TelemetrySink for MemoryTelemetry {
    fn attr(&self, key: &str, value: &str) {
        self.attrs
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_telemetry_overwrites() {
        let sink = MemoryTelemetry::new();
        sink.attr("engine_version", "26.1");
        sink.attr("engine_version", "27.0");
        sink.attr("engine_arch", "arm64");

        assert_eq!(sink.get("engine_version").as_deref(), Some("27.0"));
        assert_eq!(sink.all().len(), 2);
        assert!(sink.get("missing").is_none());
    }
}
