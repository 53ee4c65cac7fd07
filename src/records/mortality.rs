use super::date_format;
use crate::summary::{Record, SummaryColumn};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MortalityRecord {
    #[serde(rename = "DATE", with = "date_format")]
    pub timestamp: DateTime<Utc>,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(rename = "REGION", default)]
    pub region: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(rename = "AGEGROUP", default)]
    pub age_group: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(rename = "DEATHS", default)]
    pub deaths: u32,
}

impl Record for MortalityRecord {
    const NAME: &'static str = "mortality";
    const SUPPORTED_COLUMNS: &'static [SummaryColumn] = &[
        SummaryColumn::Total,
        SummaryColumn::ByRegion,
        SummaryColumn::ByAgeGroup,
    ];

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn dimension(&self, column: SummaryColumn) -> Option<&str> {
        match column {
            SummaryColumn::ByRegion => Some(&self.region),
            SummaryColumn::ByAgeGroup => Some(&self.age_group),
            _ => None,
        }
    }

    fn total(&self) -> f64 {
        self.deaths as f64
    }
}
