use super::date_format;
use crate::summary::{Record, SummaryColumn};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct HospitalisationRecord {
    #[serde(rename = "DATE", with = "date_format")]
    pub timestamp: DateTime<Utc>,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(rename = "PROVINCE", default)]
    pub province: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(rename = "REGION", default)]
    pub region: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(rename = "TOTAL_IN", default)]
    pub total_in: u32,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(rename = "TOTAL_IN_ICU", default)]
    pub total_in_icu: u32,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(rename = "TOTAL_IN_RESP", default)]
    pub total_in_resp: u32,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(rename = "TOTAL_IN_ECMO", default)]
    pub total_in_ecmo: u32,
}

impl Record for HospitalisationRecord {
    const NAME: &'static str = "hospitalisations";
    const SUPPORTED_COLUMNS: &'static [SummaryColumn] = &[
        SummaryColumn::Total,
        SummaryColumn::ByRegion,
        SummaryColumn::ByProvince,
        SummaryColumn::ByCategory,
    ];
    const CATEGORIES: &'static [&'static str] = &["in", "in ICU", "in resp", "in ECMO"];

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
        self.total_in as f64
    }

    fn category_values(&self) -> Vec<f64> {
        vec![
            self.total_in as f64,
            self.total_in_icu as f64,
            self.total_in_resp as f64,
            self.total_in_ecmo as f64,
        ]
    }
}
