use std::sync::Arc;

use keyhole_core::ShortCode;
use keyhole_resolver::Resolver;
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    resolver: Arc<dyn Resolver>,
    base_url: String,
    metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(resolver: Arc<dyn Resolver>, public_base_url: impl Into<String>) -> Self {
        Self {
            resolver,
            base_url: public_base_url.into(),
            metrics: None,
        }
    }

    /// Serves the given recorder on the metrics route.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn resolver(&self) -> &dyn Resolver {
        self.resolver.as_ref()
    }

    pub fn metrics(&self) -> Option<&PrometheusHandle> {
        self.metrics.as_ref()
    }

    pub fn short_url(&self, code: &ShortCode) -> String {
        code.to_url(&self.base_url)
    }
}
