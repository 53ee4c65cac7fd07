use super::store::ReportStore;
use crate::{
    metrics::Metrics,
    population::{AgeBracket, PopulationError, PopulationProvider},
    records::{DoseType, VaccinationRecord},
    source::Subscription,
    summary::{summarize, Record, SummaryColumn, SummaryError, UNKNOWN},
    tabulator::Tabulator,
};
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(10 * 60);

#[derive(Error, Debug)]
pub enum ProRateError {
    #[error(transparent)]
    Summary(#[from] SummaryError),
    #[error("population figures not ready after {0:?}")]
    NotReady(Duration),
    #[error(transparent)]
    Population(#[from] PopulationError),
}

/// Turns vaccination counts of one dose type into a fraction of the
/// population, per region or per age group.
pub struct ProRater {
    dose: DoseType,
    column: SummaryColumn,
    store: Arc<ReportStore>,
    population: Arc<dyn PopulationProvider>,
    ready_timeout: Duration,
    metrics: Metrics,
}

impl ProRater {
    pub fn new(
        dose: DoseType,
        column: SummaryColumn,
        store: Arc<ReportStore>,
        population: Arc<dyn PopulationProvider>,
        metrics: Metrics,
    ) -> Self {
        Self {
            dose,
            column,
            store,
            population,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            metrics,
        }
    }

    pub fn with_ready_timeout(mut self, ready_timeout: Duration) -> Self {
        self.ready_timeout = ready_timeout;
        self
    }

    pub fn key(&self) -> String {
        format!("{}-rate-{}-{}", VaccinationRecord::NAME, self.dose, self.column)
    }

    /// Builds the rate table for `records`, waiting for population figures
    /// if they are not loaded yet.
    pub async fn generate(&self, records: &[VaccinationRecord]) -> Result<Tabulator, ProRateError> {
        if !matches!(self.column, SummaryColumn::ByRegion | SummaryColumn::ByAgeGroup) {
            return Err(SummaryError::UnsupportedColumn {
                record: VaccinationRecord::NAME,
                column: self.column,
            }
            .into());
        }
        let mut report = summarize(
            records.iter().filter(|record| self.dose.includes(record.dose)),
            self.column,
        )?;

        tokio::time::timeout(self.ready_timeout, self.population.wait_till_ready())
            .await
            .map_err(|_| ProRateError::NotReady(self.ready_timeout))??;

        for column in report.columns() {
            let figure = self.figure(&column)?.filter(|figure| *figure > 0);
            report.map_column(&column, |count| match figure {
                Some(figure) => count / figure as f64,
                None => 0.0,
            });
        }
        Ok(report)
    }

    fn figure(&self, column: &str) -> Result<Option<u64>, PopulationError> {
        if column == UNKNOWN {
            return Ok(None);
        }
        match self.column {
            SummaryColumn::ByAgeGroup => {
                let bracket: AgeBracket = column.parse()?;
                Ok(self.population.for_age_bracket(&bracket))
            }
            _ => Ok(self.population.for_region(column)),
        }
    }

    pub async fn update(&self, records: &[VaccinationRecord]) -> Result<(), ProRateError> {
        let key = self.key();
        match self.generate(records).await {
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

    /// Processes vaccination snapshots until `shutdown` is cancelled. A
    /// pending wait for population figures is abandoned on cancellation.
    pub async fn run(
        self,
        mut subscription: Subscription<Vec<VaccinationRecord>>,
        shutdown: CancellationToken,
    ) {
        let key = self.key();
        tracing::info!(report = %key, "prorater started");
        loop {
            let snapshot = tokio::select! {
                _ = shutdown.cancelled() => break,
                snapshot = subscription.recv() => match snapshot {
                    Some(snapshot) => snapshot,
                    None => break,
                },
            };
            tokio::select! {
                _ = shutdown.cancelled() => break,
                result = self.update(&snapshot) => {
                    if let Err(err) = result {
                        tracing::error!(report = %key, error = %err, "failed to prorate snapshot");
                    }
                }
            }
        }
        tracing::info!(report = %key, "prorater stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        population::{Figures, Population},
        source::Publisher,
        tests::date,
    };
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tokio::time::timeout;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn vaccination(
        day: &str,
        region: &str,
        age_group: &str,
        dose: DoseType,
        count: u32,
    ) -> VaccinationRecord {
        VaccinationRecord {
            timestamp: date(day),
            region: region.to_string(),
            age_group: age_group.to_string(),
            dose,
            count,
            ..Default::default()
        }
    }

    fn population() -> Arc<Population> {
        Arc::new(Population::with_figures(Figures {
            regions: HashMap::from([("Flanders".to_string(), 100), ("Brussels".to_string(), 0)]),
            ages: (0..=99).map(|age| (age, 10)).collect(),
        }))
    }

    fn prorater(dose: DoseType, column: SummaryColumn, population: Arc<Population>) -> ProRater {
        ProRater::new(
            dose,
            column,
            Arc::new(ReportStore::new()),
            population,
            Metrics::unregistered(),
        )
    }

    #[tokio::test]
    async fn rates_by_region() {
        let records = vec![
            vaccination("2022-01-01", "Flanders", "18-24", DoseType::Full, 10),
            vaccination("2022-01-02", "Flanders", "18-24", DoseType::Full, 5),
            vaccination("2022-01-02", "Flanders", "18-24", DoseType::Partial, 50),
        ];
        let report = prorater(DoseType::Full, SummaryColumn::ByRegion, population())
            .generate(&records)
            .await
            .unwrap();

        assert_eq!(report.columns(), vec!["Flanders"]);
        assert_eq!(report.column_values("Flanders"), Some(vec![0.10, 0.05]));
    }

    #[tokio::test]
    async fn single_dose_counts_as_full() {
        let records = vec![
            vaccination("2022-01-01", "Flanders", "18-24", DoseType::Full, 10),
            vaccination("2022-01-01", "Flanders", "18-24", DoseType::SingleDose, 10),
        ];
        let full = prorater(DoseType::Full, SummaryColumn::ByRegion, population())
            .generate(&records)
            .await
            .unwrap();
        assert_eq!(full.column_values("Flanders"), Some(vec![0.2]));

        let single = prorater(DoseType::SingleDose, SummaryColumn::ByRegion, population())
            .generate(&records)
            .await
            .unwrap();
        assert_eq!(single.column_values("Flanders"), Some(vec![0.1]));
    }

    #[tokio::test]
    async fn unresolved_figures_give_zero() {
        let records = vec![
            vaccination("2022-01-01", "Brussels", "", DoseType::Booster, 10),
            vaccination("2022-01-01", "Wallonia", "", DoseType::Booster, 10),
            vaccination("2022-01-01", "", "", DoseType::Booster, 10),
        ];
        let report = prorater(DoseType::Booster, SummaryColumn::ByRegion, population())
            .generate(&records)
            .await
            .unwrap();
        for column in report.columns() {
            assert_eq!(report.column_values(&column), Some(vec![0.0]), "{column}");
        }

        let report = prorater(DoseType::Booster, SummaryColumn::ByAgeGroup, population())
            .generate(&records)
            .await
            .unwrap();
        assert_eq!(report.columns(), vec![UNKNOWN]);
        assert_eq!(report.column_values(UNKNOWN), Some(vec![0.0]));
    }

    #[tokio::test]
    async fn rates_by_age_group() {
        let records = vec![
            vaccination("2022-01-01", "Flanders", "0-9", DoseType::Partial, 25),
            vaccination("2022-01-01", "Flanders", "95+", DoseType::Partial, 10),
        ];
        let report = prorater(DoseType::Partial, SummaryColumn::ByAgeGroup, population())
            .generate(&records)
            .await
            .unwrap();
        assert_eq!(report.columns(), vec!["0-9", "95+"]);
        assert_eq!(report.rows().next().unwrap().1, vec![0.25, 0.2]);
    }

    #[tokio::test]
    async fn invalid_bracket_keeps_stored_report() {
        let prorater = prorater(DoseType::Full, SummaryColumn::ByAgeGroup, population());
        prorater
            .update(&[vaccination("2022-01-01", "Flanders", "0-9", DoseType::Full, 10)])
            .await
            .unwrap();

        let err = prorater
            .update(&[vaccination("2022-01-01", "Flanders", "adults", DoseType::Full, 10)])
            .await
            .unwrap_err();
        assert!(
            matches!(err, ProRateError::Population(PopulationError::InvalidAgeBracket(_))),
            "{err}"
        );
        let stored = prorater.store.get("vaccination-rate-Full-ByAgeGroup").unwrap();
        assert_eq!(stored.columns(), vec!["0-9"]);
    }

    #[tokio::test]
    async fn unsupported_column() {
        let err = prorater(DoseType::Full, SummaryColumn::ByManufacturer, population())
            .generate(&[])
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                ProRateError::Summary(SummaryError::UnsupportedColumn {
                    column: SummaryColumn::ByManufacturer,
                    ..
                })
            ),
            "{err}"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_waiting_for_population() {
        let population = Arc::new(Population::new());
        let prorater = prorater(DoseType::Full, SummaryColumn::ByRegion, population)
            .with_ready_timeout(Duration::from_secs(60));
        let err = prorater
            .generate(&[vaccination("2022-01-01", "Flanders", "", DoseType::Full, 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, ProRateError::NotReady(_)), "{err}");
    }

    #[tokio::test]
    async fn waits_for_population() {
        let population = Arc::new(Population::new());
        let publisher = Arc::new(Publisher::new());
        let store = Arc::new(ReportStore::new());
        let prorater = ProRater::new(
            DoseType::Full,
            SummaryColumn::ByRegion,
            store.clone(),
            population.clone(),
            Metrics::unregistered(),
        );
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(prorater.run(publisher.subscribe(1), shutdown.clone()));

        publisher
            .publish(
                Arc::new(vec![vaccination("2022-01-01", "Flanders", "", DoseType::Full, 10)]),
                date("2022-01-01"),
            )
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(store.get("vaccination-rate-Full-ByRegion").is_err());

        population.load(population_figures());
        let report = timeout(TIMEOUT, async {
            loop {
                if let Ok(report) = store.get("vaccination-rate-Full-ByRegion") {
                    break report;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("report should appear once figures are loaded");
        assert_eq!(report.column_values("Flanders"), Some(vec![0.1]));

        shutdown.cancel();
        timeout(TIMEOUT, handle).await.unwrap().unwrap();
        assert!(publisher.is_empty());
    }

    fn population_figures() -> Figures {
        Figures {
            regions: HashMap::from([("Flanders".to_string(), 100)]),
            ..Default::default()
        }
    }
}
