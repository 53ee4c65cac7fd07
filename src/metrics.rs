use prometheus::{IntCounterVec, Opts, Registry};

/// Process metrics, registered on a caller-owned [`Registry`] and handed
/// to the components that report them.
#[derive(Clone)]
pub struct Metrics {
    pub fetches: IntCounterVec,
    pub report_updates: IntCounterVec,
    pub cache_requests: IntCounterVec,
}

impl Metrics {
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        let fetches = IntCounterVec::new(
            Opts::new("covid_stats_fetches_total", "upstream fetch cycles"),
            &["source", "result"],
        )?;
        let report_updates = IntCounterVec::new(
            Opts::new("covid_stats_report_updates_total", "report regenerations"),
            &["report", "result"],
        )?;
        let cache_requests = IntCounterVec::new(
            Opts::new("covid_stats_cache_requests_total", "report cache lookups"),
            &["result"],
        )?;
        registry.register(Box::new(fetches.clone()))?;
        registry.register(Box::new(report_updates.clone()))?;
        registry.register(Box::new(cache_requests.clone()))?;
        Ok(Self {
            fetches,
            report_updates,
            cache_requests,
        })
    }

    /// Metrics attached to a fresh private registry. Handy for tests and
    /// for components that are not exported.
    pub fn unregistered() -> Self {
        // names and labels above are constant and valid, so registering on
        // an empty registry cannot fail
        Self::new(&Registry::new()).expect("metrics registration on empty registry")
    }

    pub(crate) fn fetch(&self, source: &str, result: &str) {
        self.fetches.with_label_values(&[source, result]).inc();
    }

    pub(crate) fn report_update(&self, report: &str, result: &str) {
        self.report_updates.with_label_values(&[report, result]).inc();
    }

    pub(crate) fn cache_request(&self, result: &str) {
        self.cache_requests.with_label_values(&[result]).inc();
    }
}
