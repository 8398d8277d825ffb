use prometheus::{
    Encoder, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub matches_total: IntCounterVec,
    pub match_latency_seconds: HistogramVec,
    pub active_matches: IntGauge,
    pub status_transitions_total: IntCounterVec,
    pub route_cache_lookups_total: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let matches_total = IntCounterVec::new(
            Opts::new("matches_total", "Courier matching runs by outcome"),
            &["outcome"],
        )
        .expect("valid matches_total metric");

        let match_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "match_latency_seconds",
                "Duration of courier matching runs in seconds",
            )
            .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 45.0, 60.0, 90.0]),
            &["outcome"],
        )
        .expect("valid match_latency_seconds metric");

        let active_matches = IntGauge::new("active_matches", "Matching runs currently in flight")
            .expect("valid active_matches metric");

        let status_transitions_total = IntCounterVec::new(
            Opts::new("status_transitions_total", "Persisted trip status transitions"),
            &["status"],
        )
        .expect("valid status_transitions_total metric");

        let route_cache_lookups_total = IntCounterVec::new(
            Opts::new("route_cache_lookups_total", "Route cache lookups by result"),
            &["result"],
        )
        .expect("valid route_cache_lookups_total metric");

        registry
            .register(Box::new(matches_total.clone()))
            .expect("register matches_total");
        registry
            .register(Box::new(match_latency_seconds.clone()))
            .expect("register match_latency_seconds");
        registry
            .register(Box::new(active_matches.clone()))
            .expect("register active_matches");
        registry
            .register(Box::new(status_transitions_total.clone()))
            .expect("register status_transitions_total");
        registry
            .register(Box::new(route_cache_lookups_total.clone()))
            .expect("register route_cache_lookups_total");

        Self {
            registry,
            matches_total,
            match_latency_seconds,
            active_matches,
            status_transitions_total,
            route_cache_lookups_total,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
