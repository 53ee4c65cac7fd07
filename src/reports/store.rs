use crate::tabulator::Tabulator;
use parking_lot::RwLock;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("report {0} not found")]
    NotFound(String),
}

/// Latest version of every materialized report.
///
/// Reports are shared, so readers that want to accumulate or filter one
/// have to clone it first. Every `put` tags the report with a new version,
/// which views derived from it can use to notice the replacement.
#[derive(Default)]
pub struct ReportStore {
    reports: RwLock<HashMap<String, (u64, Arc<Tabulator>)>>,
    last_version: AtomicU64,
}

impl ReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the report stored under `key`.
    pub fn put(&self, key: impl Into<String>, report: Tabulator) {
        let mut reports = self.reports.write();
        let version = self.last_version.fetch_add(1, Ordering::Relaxed) + 1;
        reports.insert(key.into(), (version, Arc::new(report)));
    }

    pub fn get(&self, key: &str) -> Result<Arc<Tabulator>, StoreError> {
        self.get_versioned(key).map(|(_, report)| report)
    }

    /// The report stored under `key` together with its version. Versions
    /// only grow, a replaced report always gets a higher one.
    pub fn get_versioned(&self, key: &str) -> Result<(u64, Arc<Tabulator>), StoreError> {
        self.reports
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    /// Keys of all populated reports, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.reports.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::date;
    use pretty_assertions::assert_eq;

    fn report(value: f64) -> Tabulator {
        let mut report = Tabulator::with_columns(["total"]);
        report.set(date("2022-01-01"), "total", value);
        report
    }

    #[test]
    fn put_get_keys() {
        let store = ReportStore::new();
        assert_eq!(
            store.get("cases-Total").unwrap_err(),
            StoreError::NotFound("cases-Total".into())
        );
        assert!(store.keys().is_empty());

        store.put("tests-Total", report(1.0));
        store.put("cases-Total", report(2.0));
        assert_eq!(store.keys(), vec!["cases-Total", "tests-Total"]);
        assert_eq!(
            store.get("cases-Total").unwrap().value(date("2022-01-01"), "total"),
            Some(2.0)
        );
    }

    #[test]
    fn put_replaces_whole_report() {
        let store = ReportStore::new();
        store.put("cases-Total", report(1.0));
        let old = store.get("cases-Total").unwrap();

        store.put("cases-Total", Tabulator::with_columns(["other"]));
        let new = store.get("cases-Total").unwrap();
        assert_eq!(new.columns(), vec!["other"]);
        assert!(new.is_empty());
        // readers holding the previous version are not affected
        assert_eq!(old.value(date("2022-01-01"), "total"), Some(1.0));
    }

    #[test]
    fn put_bumps_version() {
        let store = ReportStore::new();
        store.put("cases-Total", report(1.0));
        let (first, _) = store.get_versioned("cases-Total").unwrap();
        store.put("tests-Total", report(1.0));
        assert_eq!(store.get_versioned("cases-Total").unwrap().0, first);

        store.put("cases-Total", report(2.0));
        let (second, report) = store.get_versioned("cases-Total").unwrap();
        assert!(second > first);
        assert_eq!(report.value(date("2022-01-01"), "total"), Some(2.0));
    }

    #[test]
    fn readers_mutate_copies() {
        let store = ReportStore::new();
        store.put("cases-Total", report(1.0));

        let mut copy = (*store.get("cases-Total").unwrap()).clone();
        copy.accumulate();
        copy.set(date("2022-01-02"), "total", 5.0);
        assert_eq!(store.get("cases-Total").unwrap().len(), 1);
    }
}
