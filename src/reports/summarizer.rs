use super::store::ReportStore;
use crate::{
    metrics::Metrics,
    source::Subscription,
    summary::{Summarize, SummaryColumn, SummaryError},
};
use std::{marker::PhantomData, sync::Arc};
use tokio_util::sync::CancellationToken;

/// Keeps the `<record type>-<column>` report up to date with the snapshots
/// of one data source.
pub struct Summarizer<T> {
    column: SummaryColumn,
    store: Arc<ReportStore>,
    metrics: Metrics,
    _snapshot: PhantomData<fn(T)>,
}

impl<T: Summarize> Summarizer<T> {
    pub fn new(column: SummaryColumn, store: Arc<ReportStore>, metrics: Metrics) -> Self {
        Self {
            column,
            store,
            metrics,
            _snapshot: PhantomData,
        }
    }

    pub fn key(&self) -> String {
        format!("{}-{}", T::NAME, self.column)
    }

    /// Summarizes `snapshot` and replaces the stored report. On error the
    /// stored report is left as it was.
    pub fn update(&self, snapshot: &T) -> Result<(), SummaryError> {
        let key = self.key();
        match snapshot.summarize(self.column) {
            Ok(report) => {
                tracing::debug!(report = %key, rows = report.len(), "report updated");
                self.store.put(key.as_str(), report);
                self.metrics.report_update(&key, "success");
                Ok(())
            }
            Err(err) => {
                self.metrics.report_update(&key, "failed");
                Err(err)
            }
        }
    }

    /// Processes snapshots until `shutdown` is cancelled or the source goes
    /// away. The subscription is dropped, and so unregistered, on exit.
    pub async fn run(self, mut subscription: Subscription<T>, shutdown: CancellationToken) {
        let key = self.key();
        tracing::info!(report = %key, "summarizer started");
        loop {
            let snapshot = tokio::select! {
                _ = shutdown.cancelled() => break,
                snapshot = subscription.recv() => match snapshot {
                    Some(snapshot) => snapshot,
                    None => break,
                },
            };
            if let Err(err) = self.update(&snapshot) {
                tracing::error!(report = %key, error = %err, "failed to summarize snapshot");
            }
        }
        tracing::info!(report = %key, "summarizer stopped");
    }
}
