use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub status_updates_total: IntCounterVec,
    pub proof_uploads_total: IntCounterVec,
    pub proof_upload_latency_seconds: HistogramVec,
    pub location_reports_total: IntCounterVec,
    pub active_subscriptions: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let status_updates_total = IntCounterVec::new(
            Opts::new("status_updates_total", "Shipment status updates by outcome"),
            &["outcome"],
        )
        .expect("valid status_updates_total metric");

        let proof_uploads_total = IntCounterVec::new(
            Opts::new("proof_uploads_total", "Delivery proof uploads by outcome"),
            &["outcome"],
        )
        .expect("valid proof_uploads_total metric");

        let proof_upload_latency_seconds = HistogramVec::new(
            HistogramOpts::new(
                "proof_upload_latency_seconds",
                "Latency of upload plus record append in seconds",
            ),
            &["outcome"],
        )
        .expect("valid proof_upload_latency_seconds metric");

        let location_reports_total = IntCounterVec::new(
            Opts::new("location_reports_total", "Driver location writes by outcome"),
            &["outcome"],
        )
        .expect("valid location_reports_total metric");

        let active_subscriptions =
            IntGauge::new("active_subscriptions", "Live platform subscriptions")
                .expect("valid active_subscriptions metric");

        registry
            .register(Box::new(status_updates_total.clone()))
            .expect("register status_updates_total");
        registry
            .register(Box::new(proof_uploads_total.clone()))
            .expect("register proof_uploads_total");
        registry
            .register(Box::new(proof_upload_latency_seconds.clone()))
            .expect("register proof_upload_latency_seconds");
        registry
            .register(Box::new(location_reports_total.clone()))
            .expect("register location_reports_total");
        registry
            .register(Box::new(active_subscriptions.clone()))
            .expect("register active_subscriptions");

        Self {
            registry,
            status_updates_total,
            proof_uploads_total,
            proof_upload_latency_seconds,
            location_reports_total,
            active_subscriptions,
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

pub fn outcome<T, E>(result: &Result<T, E>) -> &'static str {
    if result.is_ok() { "success" } else { "error" }
}
