//! Prometheus counters for cache activity.
//!
//! `loads{outcome}` is where corrupted caches become visible: the public API
//! returns `None` for both "corrupt" and "empty", the counter does not.

use prometheus_client::metrics::{counter::Counter, family::Family};
use prometheus_client::registry::Registry;

type Labels = Vec<(String, String)>;

#[derive(Clone, Default)]
pub struct SessionMetrics {
    loads: Family<Labels, Counter>,
    saves: Family<Labels, Counter>,
    clears: Counter,
}

impl SessionMetrics {
    pub fn new(registry: &mut Registry) -> Self {
        let metrics = Self::default();

        registry.register(
            "psc_session_loads",
            "Session cache loads by outcome (hit, empty, corrupt)",
            metrics.loads.clone(),
        );
        registry.register(
            "psc_session_saves",
            "Session cache saves by retention policy (none = cleared by a null save)",
            metrics.saves.clone(),
        );
        registry.register(
            "psc_session_clears",
            "Explicit session cache clears",
            metrics.clears.clone(),
        );

        metrics
    }

    pub fn record_load(&self, outcome: &str) {
        self.loads.get_or_create(&labels("outcome", outcome)).inc();
    }

    pub fn record_save(&self, policy: &str) {
        self.saves.get_or_create(&labels("policy", policy)).inc();
    }

    pub fn record_clear(&self) {
        self.clears.inc();
    }

    pub fn loads(&self, outcome: &str) -> u64 {
        self.loads.get_or_create(&labels("outcome", outcome)).get()
    }

    pub fn saves(&self, policy: &str) -> u64 {
        self.saves.get_or_create(&labels("policy", policy)).get()
    }

    pub fn clears(&self) -> u64 {
        self.clears.get()
    }
}

fn labels(key: &str, value: &str) -> Labels {
    vec![(key.to_string(), value.to_string())]
}
