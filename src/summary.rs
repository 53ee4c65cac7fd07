use crate::tabulator::Tabulator;
use chrono::{DateTime, Utc};
use std::{fmt, str::FromStr};
use thiserror::Error;

/// Column used for records with an empty dimension value.
pub const UNKNOWN: &str = "(unknown)";
/// Single column produced by [`SummaryColumn::Total`].
pub const TOTAL: &str = "total";

/// Dimension used to split records into [`Tabulator`] columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SummaryColumn {
    Total,
    ByRegion,
    ByProvince,
    ByAgeGroup,
    ByManufacturer,
    ByDoseType,
    ByCategory,
}

impl SummaryColumn {
    pub const ALL: [SummaryColumn; 7] = [
        SummaryColumn::Total,
        SummaryColumn::ByRegion,
        SummaryColumn::ByProvince,
        SummaryColumn::ByAgeGroup,
        SummaryColumn::ByManufacturer,
        SummaryColumn::ByDoseType,
        SummaryColumn::ByCategory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryColumn::Total => "Total",
            SummaryColumn::ByRegion => "ByRegion",
            SummaryColumn::ByProvince => "ByProvince",
            SummaryColumn::ByAgeGroup => "ByAgeGroup",
            SummaryColumn::ByManufacturer => "ByManufacturer",
            SummaryColumn::ByDoseType => "ByDoseType",
            SummaryColumn::ByCategory => "ByCategory",
        }
    }
}

impl fmt::Display for SummaryColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SummaryColumn {
    type Err = SummaryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SummaryColumn::ALL
            .into_iter()
            .find(|column| column.as_str() == s)
            .ok_or_else(|| SummaryError::UnknownColumn(s.to_string()))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SummaryError {
    #[error("{record} records cannot be summarized {column}")]
    UnsupportedColumn {
        record: &'static str,
        column: SummaryColumn,
    },
    #[error("unknown summary column: {0}")]
    UnknownColumn(String),
}

/// A single upstream entry that can be folded into a [`Tabulator`].
pub trait Record: Send + Sync + 'static {
    /// Prefix of every report built from this record type.
    const NAME: &'static str;
    const SUPPORTED_COLUMNS: &'static [SummaryColumn];
    /// Column names for [`SummaryColumn::ByCategory`], one per measure.
    const CATEGORIES: &'static [&'static str] = &[];

    fn timestamp(&self) -> DateTime<Utc>;

    /// Value of the dimension selected by `column`, or `None` if the
    /// record has no such dimension.
    fn dimension(&self, column: SummaryColumn) -> Option<&str>;

    fn total(&self) -> f64;

    /// Measures in the order of [`Record::CATEGORIES`].
    fn category_values(&self) -> Vec<f64> {
        Vec::new()
    }
}

/// Folds `records` into a table with one column per distinct value of the
/// selected dimension.
pub fn summarize<'a, R, I>(records: I, column: SummaryColumn) -> Result<Tabulator, SummaryError>
where
    R: Record,
    I: IntoIterator<Item = &'a R>,
{
    let unsupported = || SummaryError::UnsupportedColumn {
        record: R::NAME,
        column,
    };
    if !R::SUPPORTED_COLUMNS.contains(&column) {
        return Err(unsupported());
    }

    let mut tabulator = Tabulator::new();
    match column {
        SummaryColumn::Total => {
            tabulator.register_column(TOTAL);
            for record in records {
                tabulator.add(record.timestamp(), TOTAL, record.total());
            }
        }
        SummaryColumn::ByCategory => {
            tabulator.register_columns(R::CATEGORIES.iter().copied());
            for record in records {
                let timestamp = record.timestamp();
                for (category, value) in R::CATEGORIES.iter().zip(record.category_values()) {
                    tabulator.add(timestamp, category, value);
                }
            }
        }
        _ => {
            for record in records {
                let name = match record.dimension(column) {
                    Some("") => UNKNOWN,
                    Some(name) => name,
                    None => return Err(unsupported()),
                };
                if !tabulator.has_column(name) {
                    tabulator.register_column(name);
                }
                tabulator.add(record.timestamp(), name, record.total());
            }
        }
    }
    Ok(tabulator)
}

/// A snapshot the pipeline knows how to turn into reports.
pub trait Summarize: Send + Sync + 'static {
    const NAME: &'static str;
    const SUPPORTED_COLUMNS: &'static [SummaryColumn];

    fn summarize(&self, column: SummaryColumn) -> Result<Tabulator, SummaryError>;
}

impl<R: Record> Summarize for Vec<R> {
    const NAME: &'static str = R::NAME;
    const SUPPORTED_COLUMNS: &'static [SummaryColumn] = R::SUPPORTED_COLUMNS;

    fn summarize(&self, column: SummaryColumn) -> Result<Tabulator, SummaryError> {
        summarize(self, column)
    }
}
