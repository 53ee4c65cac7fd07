use crate::{metrics::Metrics, tabulator::Tabulator};
use std::{
    collections::HashMap,
    fmt::Display,
    future::Future,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use thiserror::Error;
use tokio::time::Instant;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("failed to generate report {key}: {message}")]
    GenerationFailed { key: String, message: String },
}

struct CachedReport {
    report: Arc<Tabulator>,
    /// Version of the data the report was generated from.
    version: u64,
    expires_at: Instant,
}

impl CachedReport {
    fn is_fresh(&self, version: u64) -> bool {
        self.version == version && self.expires_at > Instant::now()
    }
}

#[derive(Default)]
struct Slot {
    cached: Option<CachedReport>,
    /// Outcome of the last generation and the version it ran for, if it
    /// failed.
    failure: Option<(u64, CacheError)>,
}

#[derive(Default)]
struct Entry {
    /// Bumped every time a generation finishes, successful or not.
    generations: AtomicU64,
    slot: tokio::sync::Mutex<Slot>,
}

/// Reports generated on demand and kept for `ttl`.
///
/// Every key has its own lock, held while the report is generated, so
/// concurrent requests for one key run the generator once and share its
/// outcome, while requests for other keys go on undisturbed. The map of
/// locks has its own mutex which is only held to look up an entry.
pub struct ReportCache {
    ttl: Duration,
    entries: parking_lot::Mutex<HashMap<String, Arc<Entry>>>,
    metrics: Metrics,
}

impl ReportCache {
    pub fn new(ttl: Duration, metrics: Metrics) -> Self {
        Self {
            ttl,
            entries: Default::default(),
            metrics,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn entry(&self, key: &str) -> Arc<Entry> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) => Arc::clone(entry),
            None => {
                let entry = Arc::<Entry>::default();
                entries.insert(key.to_string(), Arc::clone(&entry));
                entry
            }
        }
    }

    /// Returns the cached report if it has not expired yet.
    pub async fn get(&self, key: &str) -> Option<Arc<Tabulator>> {
        let entry = {
            let entries = self.entries.lock();
            entries.get(key).cloned()
        }?;
        let slot = entry.slot.lock().await;
        slot.cached
            .as_ref()
            .filter(|cached| cached.expires_at > Instant::now())
            .map(|cached| Arc::clone(&cached.report))
    }

    /// Returns the cached report for `key`, running `generate` if there is
    /// no fresh one.
    ///
    /// Callers that waited for somebody else's generation get its outcome
    /// instead of running `generate` again. A failed generation keeps the
    /// previous report: it is returned, even if expired, and only when there
    /// is none the failure is.
    pub async fn maybe_generate<F, Fut, E>(
        &self,
        key: &str,
        generate: F,
    ) -> Result<Arc<Tabulator>, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Tabulator, E>>,
        E: Display,
    {
        self.maybe_generate_versioned(key, 0, generate).await
    }

    /// Like [`ReportCache::maybe_generate`], for reports derived from data
    /// that gets replaced. A report generated from another `version` of the
    /// data is not fresh, whatever its age.
    pub async fn maybe_generate_versioned<F, Fut, E>(
        &self,
        key: &str,
        version: u64,
        generate: F,
    ) -> Result<Arc<Tabulator>, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Tabulator, E>>,
        E: Display,
    {
        let entry = self.entry(key);
        let seen = entry.generations.load(Ordering::Acquire);
        let mut slot = entry.slot.lock().await;

        if let Some(cached) = slot.cached.as_ref().filter(|cached| cached.is_fresh(version)) {
            self.metrics.cache_request("hit");
            return Ok(Arc::clone(&cached.report));
        }
        if entry.generations.load(Ordering::Acquire) != seen {
            if let Some((_, failure)) = slot.failure.as_ref().filter(|(v, _)| *v == version) {
                let failure = failure.clone();
                self.metrics.cache_request("hit");
                return Self::previous_or(&slot, failure);
            }
        }

        self.metrics.cache_request("miss");
        tracing::debug!(report = key, "generating report");
        let result = generate().await;
        entry.generations.fetch_add(1, Ordering::AcqRel);
        match result {
            Ok(report) => {
                let report = Arc::new(report);
                slot.cached = Some(CachedReport {
                    report: Arc::clone(&report),
                    version,
                    expires_at: Instant::now() + self.ttl,
                });
                slot.failure = None;
                Ok(report)
            }
            Err(err) => {
                let failure = CacheError::GenerationFailed {
                    key: key.to_string(),
                    message: err.to_string(),
                };
                tracing::warn!(report = key, error = %failure, "report generation failed");
                slot.failure = Some((version, failure.clone()));
                Self::previous_or(&slot, failure)
            }
        }
    }

    fn previous_or(slot: &Slot, failure: CacheError) -> Result<Arc<Tabulator>, CacheError> {
        match &slot.cached {
            Some(cached) => Ok(Arc::clone(&cached.report)),
            None => Err(failure),
        }
    }
}
