use crate::{
    http_server::{configure_router, AppRouter},
    metrics::Metrics,
    population::{Population, PopulationProvider},
    records::{
        CaseRecord, DoseType, HospitalisationRecord, MortalityRecord, TestRecord,
        VaccinationRecord,
    },
    reports::{ProRater, ReportCache, ReportStore, Summarizer},
    settings::Settings,
    source::{DataSource, HttpFetcher, PollSchedule},
    summary::{Record, SummaryColumn},
};
use actix_web::{App, HttpServer};
use anyhow::Context;
use prometheus::Registry;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const CASES_ENDPOINT: &str = "COVID19BE_CASES_AGESEX.json";
const HOSPITALISATIONS_ENDPOINT: &str = "COVID19BE_HOSP.json";
const MORTALITY_ENDPOINT: &str = "COVID19BE_MORT.json";
const TESTS_ENDPOINT: &str = "COVID19BE_tests.json";
const VACCINATIONS_ENDPOINT: &str = "COVID19BE_VACC.json";

const PRORATED_DOSES: [DoseType; 3] = [DoseType::Partial, DoseType::Full, DoseType::Booster];
const PRORATED_COLUMNS: [SummaryColumn; 2] =
    [SummaryColumn::ByRegion, SummaryColumn::ByAgeGroup];

// Snapshots are only handed over to the report tasks, a single slot is enough.
const SUBSCRIPTION_BUFFER: usize = 1;

struct Spawner<'a> {
    settings: &'a Settings,
    store: Arc<ReportStore>,
    metrics: &'a Metrics,
    shutdown: &'a CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl<'a> Spawner<'a> {
    /// Starts a data source for `endpoint` and a summarizer for every column
    /// `R` supports.
    fn source<R>(&mut self, endpoint: &str) -> anyhow::Result<Arc<DataSource<HttpFetcher<R>>>>
    where
        R: Record + DeserializeOwned,
    {
        let sources = &self.settings.sources;
        let url = sources
            .base_url
            .join(endpoint)
            .with_context(|| format!("invalid endpoint url for {}", R::NAME))?;
        let fetcher = HttpFetcher::new(url, sources.request_timeout())
            .with_context(|| format!("failed to build http client for {}", R::NAME))?;
        let source = Arc::new(DataSource::new(
            R::NAME,
            fetcher,
            PollSchedule::new(sources.interval(), sources.jitter),
            self.metrics.clone(),
        ));

        for column in R::SUPPORTED_COLUMNS {
            let summarizer =
                Summarizer::<Vec<R>>::new(*column, self.store.clone(), self.metrics.clone());
            let subscription = source.subscribe(SUBSCRIPTION_BUFFER);
            self.tasks
                .push(tokio::spawn(summarizer.run(subscription, self.shutdown.clone())));
        }

        let task = {
            let source = source.clone();
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move { source.run(shutdown).await })
        };
        self.tasks.push(task);
        Ok(source)
    }
}

/// Starts polling every upstream dataset and keeping its reports in `store`.
/// All tasks stop once `shutdown` is cancelled.
pub fn spawn_pipeline(
    settings: &Settings,
    store: Arc<ReportStore>,
    population: Arc<dyn PopulationProvider>,
    metrics: &Metrics,
    shutdown: &CancellationToken,
) -> anyhow::Result<Vec<JoinHandle<()>>> {
    let mut spawner = Spawner {
        settings,
        store: store.clone(),
        metrics,
        shutdown,
        tasks: vec![],
    };
    spawner.source::<CaseRecord>(CASES_ENDPOINT)?;
    spawner.source::<HospitalisationRecord>(HOSPITALISATIONS_ENDPOINT)?;
    spawner.source::<MortalityRecord>(MORTALITY_ENDPOINT)?;
    spawner.source::<TestRecord>(TESTS_ENDPOINT)?;
    let vaccinations = spawner.source::<VaccinationRecord>(VACCINATIONS_ENDPOINT)?;

    let mut tasks = spawner.tasks;
    for dose in PRORATED_DOSES {
        for column in PRORATED_COLUMNS {
            let prorater = ProRater::new(
                dose,
                column,
                store.clone(),
                population.clone(),
                metrics.clone(),
            )
            .with_ready_timeout(settings.population.ready_timeout());
            let subscription = vaccinations.subscribe(SUBSCRIPTION_BUFFER);
            tasks.push(tokio::spawn(prorater.run(subscription, shutdown.clone())));
        }
    }
    tracing::info!(tasks = tasks.len(), "pipeline started");
    Ok(tasks)
}

fn load_population(settings: &Settings, population: Arc<Population>) {
    match settings.population.path.clone() {
        Some(path) => {
            tokio::spawn(async move {
                if let Err(err) = population.load_file(&path).await {
                    tracing::error!(error = %err, "failed to load population figures");
                }
            });
        }
        None => {
            tracing::warn!("no population file configured, rate reports will not be produced")
        }
    }
}

pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let registry = Registry::new();
    let metrics = Metrics::new(&registry).context("failed to register metrics")?;
    let store = Arc::new(ReportStore::new());
    let cache = Arc::new(ReportCache::new(settings.cache.ttl(), metrics.clone()));
    let population = Arc::new(Population::new());
    let shutdown = CancellationToken::new();

    load_population(&settings, population.clone());
    let tasks = spawn_pipeline(&settings, store.clone(), population, &metrics, &shutdown)?;

    let addr = settings.server.addr;
    tracing::info!(addr = %addr, "http server is starting");
    let app_router = Arc::new(AppRouter::new(store, cache, registry));
    let server = HttpServer::new(move || App::new().configure(configure_router(&*app_router)))
        .bind(addr)
        .with_context(|| format!("failed to bind {addr}"))?
        .run();
    let result = server.await.context("http server failed");

    tracing::info!("shutting down");
    shutdown.cancel();
    futures::future::join_all(tasks).await;
    result
}
