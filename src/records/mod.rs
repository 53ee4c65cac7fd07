mod cases;
mod hospitalisations;
mod mortality;
mod test_results;
mod vaccinations;

pub use cases::CaseRecord;
pub use hospitalisations::HospitalisationRecord;
pub use mortality::MortalityRecord;
pub use test_results::TestRecord;
pub use vaccinations::{DoseType, VaccinationRecord};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use thiserror::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Error, Debug)]
pub enum DateError {
    #[error("invalid date '{0}': {1}")]
    Parse(String, chrono::ParseError),
    #[error("date '{0}' is out of range")]
    OutOfRange(String),
}

/// Parses `YYYY-MM-DD` into UTC midnight of that day.
pub fn parse_date(s: &str) -> Result<DateTime<Utc>, DateError> {
    let date = NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map_err(|err| DateError::Parse(s.to_string(), err))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| DateError::OutOfRange(s.to_string()))?;
    Ok(Utc.from_utc_datetime(&midnight))
}

pub fn format_date(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(DATE_FORMAT).to_string()
}

/// `#[serde(with = "...")]` adapter for calendar dates.
pub(crate) mod date_format {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_date(&s).map_err(de::Error::custom)
    }

    pub fn serialize<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_date(timestamp))
    }
}
