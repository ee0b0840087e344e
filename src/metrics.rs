use std::sync::Arc;

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

// ---------------------------------------------------------------------------
// Label types
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct CommandLabels {
    pub command: &'static str,
    pub outcome: Outcome,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Outcome {
    Ok,
    Error,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct LatencyLabels {
    pub command: &'static str,
}

// ---------------------------------------------------------------------------
// Metrics struct
// ---------------------------------------------------------------------------

/// Store command metrics recorded by [`crate::store::InstrumentedStore`].
pub struct StoreMetrics {
    pub commands_total: Family<CommandLabels, Counter>,
    pub command_duration_seconds: Family<LatencyLabels, Histogram>,
}

impl StoreMetrics {
    /// Create a new [`StoreMetrics`] instance and register every metric with
    /// the supplied `registry`.
    pub fn new(registry: &mut Registry) -> Self {
        let commands_total = Family::<CommandLabels, Counter>::default();
        registry.register(
            "keyed_store_commands",
            "Store commands issued by command and outcome",
            commands_total.clone(),
        );

        let command_duration_seconds =
            Family::<LatencyLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.0001, 2.0, 16))
            });
        registry.register(
            "keyed_store_command_duration_seconds",
            "Store command round-trip latency in seconds",
            command_duration_seconds.clone(),
        );

        Self {
            commands_total,
            command_duration_seconds,
        }
    }

    pub fn record(&self, command: &'static str, outcome: Outcome, seconds: f64) {
        self.commands_total
            .get_or_create(&CommandLabels { command, outcome })
            .inc();
        self.command_duration_seconds
            .get_or_create(&LatencyLabels { command })
            .observe(seconds);
    }
}

// ---------------------------------------------------------------------------
// Shared handle
// ---------------------------------------------------------------------------

/// Registry plus the metrics registered in it.
#[derive(Clone)]
pub struct MetricsRegistry {
    pub registry: Arc<Registry>,
    pub metrics: Arc<StoreMetrics>,
}

impl MetricsRegistry {
    /// Build a fresh registry and pre-register all store metrics.
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let metrics = StoreMetrics::new(&mut registry);
        Self {
            registry: Arc::new(registry),
            metrics: Arc::new(metrics),
        }
    }

    /// Render the registry in the OpenMetrics text format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut out = String::new();
        encode(&mut out, &self.registry)?;
        Ok(out)
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
