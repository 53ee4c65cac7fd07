use super::date_format;
use crate::summary::{Record, SummaryColumn};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnNull};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum DoseType {
    #[serde(rename = "A")]
    Partial,
    #[serde(rename = "B")]
    Full,
    #[serde(rename = "C")]
    SingleDose,
    #[serde(rename = "E")]
    Booster,
    #[serde(rename = "E2")]
    Booster2,
    #[serde(rename = "E3")]
    Booster3,
    #[default]
    #[serde(other)]
    Unknown,
}

impl DoseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoseType::Partial => "Partial",
            DoseType::Full => "Full",
            DoseType::SingleDose => "SingleDose",
            DoseType::Booster => "Booster",
            DoseType::Booster2 => "Booster2",
            DoseType::Booster3 => "Booster3",
            DoseType::Unknown => "Unknown",
        }
    }

    /// Whether a dose of type `dose` counts towards this dose type.
    ///
    /// Single-dose vaccines complete the vaccination scheme, so they count
    /// as full vaccinations too.
    pub fn includes(&self, dose: DoseType) -> bool {
        *self == dose || (*self == DoseType::Full && dose == DoseType::SingleDose)
    }
}

impl fmt::Display for DoseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct VaccinationRecord {
    #[serde(rename = "DATE", with = "date_format")]
    pub timestamp: DateTime<Utc>,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(rename = "REGION", default)]
    pub region: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(rename = "AGEGROUP", default)]
    pub age_group: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(rename = "BRAND", default)]
    pub manufacturer: String,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(rename = "DOSE", default)]
    pub dose: DoseType,
    #[serde_as(as = "DefaultOnNull")]
    #[serde(rename = "COUNT", default)]
    pub count: u32,
}

impl Record for VaccinationRecord {
    const NAME: &'static str = "vaccination";
    const SUPPORTED_COLUMNS: &'static [SummaryColumn] = &[
        SummaryColumn::Total,
        SummaryColumn::ByRegion,
        SummaryColumn::ByAgeGroup,
        SummaryColumn::ByManufacturer,
        SummaryColumn::ByDoseType,
    ];

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn dimension(&self, column: SummaryColumn) -> Option<&str> {
        match column {
            SummaryColumn::ByRegion => Some(&self.region),
            SummaryColumn::ByAgeGroup => Some(&self.age_group),
            SummaryColumn::ByManufacturer => Some(&self.manufacturer),
            SummaryColumn::ByDoseType => Some(self.dose.as_str()),
            _ => None,
        }
    }

    fn total(&self) -> f64 {
        self.count as f64
    }
}
