use super::date_format;
use crate::summary::{Record, SummaryColumn};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct CaseRecord {
    #[serde(rename = "DATE", with = "date_format")]
    pub timestamp: DateTime<Utc>,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(rename = "PROVINCE", default)]
    pub province: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(rename = "REGION", default)]
    pub region: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(rename = "AGEGROUP", default)]
    pub age_group: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(rename = "CASES", default)]
    pub cases: u32,
}

impl Record for CaseRecord {
    const NAME: &'static str = "cases";
    const SUPPORTED_COLUMNS: &'static [SummaryColumn] = &[
        SummaryColumn::Total,
        SummaryColumn::ByRegion,
        SummaryColumn::ByProvince,
        SummaryColumn::ByAgeGroup,
    ];

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn dimension(&self, column: SummaryColumn) -> Option<&str> {
        match column {
            SummaryColumn::ByRegion => Some(&self.region),
            SummaryColumn::ByProvince => Some(&self.province),
            SummaryColumn::ByAgeGroup => Some(&self.age_group),
            _ => None,
        }
    }

    fn total(&self) -> f64 {
        self.cases as f64
    }
}
