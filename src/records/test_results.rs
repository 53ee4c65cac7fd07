use super::date_format;
use crate::summary::{Record, SummaryColumn};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TestRecord {
    #[serde(rename = "DATE", with = "date_format")]
    pub timestamp: DateTime<Utc>,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(rename = "PROVINCE", default)]
    pub province: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(rename = "REGION", default)]
    pub region: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(rename = "TESTS_ALL", default)]
    pub total: u32,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(rename = "TESTS_ALL_POS", default)]
    pub positive: u32,
}

impl Record for TestRecord {
    const NAME: &'static str = "tests";
    const SUPPORTED_COLUMNS: &'static [SummaryColumn] = &[
        SummaryColumn::Total,
        SummaryColumn::ByRegion,
        SummaryColumn::ByProvince,
        SummaryColumn::ByCategory,
    ];
    const CATEGORIES: &'static [&'static str] = &["total", "positive"];

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn dimension(&self, column: SummaryColumn) -> Option<&str> {
        match column {
            SummaryColumn::ByRegion => Some(&self.region),
            SummaryColumn::ByProvince => Some(&self.province),
            _ => None,
        }
    }

    fn total(&self) -> f64 {
        self.total as f64
    }

    fn category_values(&self) -> Vec<f64> {
        vec![self.total as f64, self.positive as f64]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{summary::Summarize, tests::date};
    use pretty_assertions::assert_eq;

    #[test]
    fn summarize_tests() {
        let records: Vec<TestRecord> = serde_json::from_str(
            r#"[
                {"DATE":"2021-01-01","PROVINCE":"Namur","REGION":"Wallonia","TESTS_ALL":100,"TESTS_ALL_POS":7},
                {"DATE":"2021-01-01","PROVINCE":"Limburg","REGION":"Flanders","TESTS_ALL":50,"TESTS_ALL_POS":3}
            ]"#,
        )
        .unwrap();

        let by_category = records.summarize(SummaryColumn::ByCategory).unwrap();
        assert_eq!(by_category.columns(), vec!["positive", "total"]);
        assert_eq!(
            by_category.rows().collect::<Vec<_>>(),
            vec![(date("2021-01-01"), vec![10.0, 150.0])]
        );

        let by_province = records.summarize(SummaryColumn::ByProvince).unwrap();
        assert_eq!(by_province.columns(), vec!["Limburg", "Namur"]);
        assert_eq!(
            by_province.rows().collect::<Vec<_>>(),
            vec![(date("2021-01-01"), vec![50.0, 100.0])]
        );
    }
}
