mod cli;
mod http_server;
mod logging;
mod metrics;
mod population;
mod records;
mod reports;
mod server;
mod settings;
mod source;
mod summary;
mod tabulator;

#[cfg(test)]
mod tests;

pub use self::{
    cli::Args,
    http_server::{configure_router, AppRouter, Router},
    logging::init_logs,
    metrics::Metrics,
    population::{AgeBracket, Figures, Population, PopulationError, PopulationProvider},
    records::{
        CaseRecord, DoseType, HospitalisationRecord, MortalityRecord, TestRecord,
        VaccinationRecord,
    },
    reports::{
        CacheError, ProRateError, ProRater, ReportCache, ReportStore, StoreError, Summarizer,
    },
    server::{run, spawn_pipeline},
    settings::{
        CacheSettings, PopulationSettings, ServerSettings, Settings, SourcesSettings,
        TracingFormat, TracingSettings,
    },
    source::{
        DataSource, FetchError, Fetcher, HttpFetcher, PollOutcome, PollSchedule, Publisher,
        SubscriberId, Subscription,
    },
    summary::{summarize, Record, Summarize, SummaryColumn, SummaryError, UNKNOWN},
    tabulator::Tabulator,
};
