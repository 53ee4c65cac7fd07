use super::{
    fetcher::{FetchError, Fetcher},
    publisher::{Publisher, Subscription},
};
use crate::metrics::Metrics;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rand::Rng;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;

/// Nominal polling interval with a random spread of `± jitter * interval`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollSchedule {
    interval: Duration,
    jitter: f64,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60 * 60),
            jitter: 0.04,
        }
    }
}

impl PollSchedule {
    /// `jitter` is clamped to `[0, 1]`, a non-finite one disables jitter.
    pub fn new(interval: Duration, jitter: f64) -> Self {
        let jitter = if jitter.is_finite() {
            jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self { interval, jitter }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    pub fn next_delay<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.jitter <= 0.0 {
            return self.interval;
        }
        let spread = rng.gen_range(-self.jitter..=self.jitter);
        self.interval.mul_f64(1.0 + spread)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PollState {
    Polling,
    Waiting(Duration),
    Stopped,
}

struct Snapshot<T> {
    value: Arc<T>,
    age: DateTime<Utc>,
}

/// Keeps the latest snapshot of one upstream endpoint and publishes every
/// newer one to its subscribers.
pub struct DataSource<F: Fetcher> {
    name: String,
    fetcher: F,
    schedule: PollSchedule,
    publisher: Arc<Publisher<F::Output>>,
    current: RwLock<Option<Snapshot<F::Output>>>,
    metrics: Metrics,
}

impl<F: Fetcher> DataSource<F> {
    pub fn new(
        name: impl Into<String>,
        fetcher: F,
        schedule: PollSchedule,
        metrics: Metrics,
    ) -> Self {
        Self {
            name: name.into(),
            fetcher,
            schedule,
            publisher: Arc::new(Publisher::new()),
            current: RwLock::new(None),
            metrics,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Upstream age of the held snapshot, `None` before the first fetch.
    pub fn current_age(&self) -> Option<DateTime<Utc>> {
        self.current.read().as_ref().map(|snapshot| snapshot.age)
    }

    pub fn current(&self) -> Option<Arc<F::Output>> {
        self.current
            .read()
            .as_ref()
            .map(|snapshot| Arc::clone(&snapshot.value))
    }

    pub fn publisher(&self) -> &Arc<Publisher<F::Output>> {
        &self.publisher
    }

    pub fn subscribe(&self, buffer: usize) -> Subscription<F::Output> {
        self.publisher.subscribe(buffer)
    }

    /// Polls until `shutdown` is cancelled. The first cycle starts right away.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(
            source = %self.name,
            interval = ?self.schedule.interval(),
            "data source started"
        );
        let mut state = PollState::Polling;
        loop {
            state = match state {
                PollState::Polling => {
                    tokio::select! {
                        _ = shutdown.cancelled() => PollState::Stopped,
                        result = self.poll_once() => {
                            if let Err(err) = result {
                                tracing::warn!(
                                    source = %self.name,
                                    error = %err,
                                    "poll cycle failed"
                                );
                            }
                            PollState::Waiting(self.next_delay())
                        }
                    }
                }
                PollState::Waiting(delay) => {
                    tracing::debug!(source = %self.name, "next poll in {:?}", delay);
                    tokio::select! {
                        _ = shutdown.cancelled() => PollState::Stopped,
                        _ = tokio::time::sleep(delay) => PollState::Polling,
                    }
                }
                PollState::Stopped => break,
            }
        }
        tracing::info!(source = %self.name, "data source stopped");
    }

    fn next_delay(&self) -> Duration {
        self.schedule.next_delay(&mut rand::thread_rng())
    }

    /// Runs a single poll cycle: checks the upstream age, fetches if it is
    /// newer than the held snapshot and publishes it.
    ///
    /// When nothing changed, subscribers that joined after the last update
    /// still receive the held snapshot; everyone else gets nothing.
    pub async fn poll_once(&self) -> Result<PollOutcome, FetchError> {
        let result = self.try_poll().await;
        let label = match &result {
            Ok(PollOutcome::Updated) => "updated",
            Ok(PollOutcome::Unchanged) => "unchanged",
            Err(_) => "failed",
        };
        self.metrics.fetch(&self.name, label);
        result
    }

    async fn try_poll(&self) -> Result<PollOutcome, FetchError> {
        let age = self.fetcher.last_modified().await?;
        let held = self
            .current
            .read()
            .as_ref()
            .map(|snapshot| (Arc::clone(&snapshot.value), snapshot.age));

        if let Some((value, held_age)) = held {
            if held_age >= age {
                tracing::debug!(source = %self.name, age = %held_age, "no new data");
                self.publisher.publish(value, held_age).await;
                return Ok(PollOutcome::Unchanged);
            }
        }

        let value = Arc::new(self.fetcher.fetch().await?);
        *self.current.write() = Some(Snapshot {
            value: Arc::clone(&value),
            age,
        });
        let delivered = self.publisher.publish(value, age).await;
        tracing::info!(
            source = %self.name,
            age = %age,
            subscribers = delivered,
            "published new data"
        );
        Ok(PollOutcome::Updated)
    }
}
