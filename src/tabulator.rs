use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Time-indexed, column-indexed table of real values.
///
/// Rows are keyed by timestamp, columns by name. Columns have to be
/// registered before anything can be written to them; writes to unknown
/// columns are ignored and reported through the returned `bool`.
/// Cells that were never written read as zero.
///
/// Both rows and columns are kept in ordered maps, so [`Tabulator::timestamps`]
/// is always ascending and [`Tabulator::columns`] is always sorted by name.
///
/// A deep, independent copy is made with [`Clone`].
#[derive(Debug, Clone, Default)]
pub struct Tabulator {
    /// column name -> position of its cell inside every row
    columns: BTreeMap<String, usize>,
    rows: BTreeMap<DateTime<Utc>, Vec<f64>>,
}

impl Tabulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tabulator = Self::new();
        tabulator.register_columns(columns);
        tabulator
    }

    /// Registers a column. Registering an existing column is a no-op.
    pub fn register_column(&mut self, name: impl Into<String>) {
        let slot = self.columns.len();
        self.columns.entry(name.into()).or_insert(slot);
    }

    pub fn register_columns<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.register_column(name);
        }
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Adds `value` to the cell. Returns `false` if the column is not registered.
    pub fn add(&mut self, timestamp: DateTime<Utc>, column: &str, value: f64) -> bool {
        self.update(timestamp, column, |cell| *cell += value)
    }

    /// Overwrites the cell. Returns `false` if the column is not registered.
    pub fn set(&mut self, timestamp: DateTime<Utc>, column: &str, value: f64) -> bool {
        self.update(timestamp, column, |cell| *cell = value)
    }

    fn update<F>(&mut self, timestamp: DateTime<Utc>, column: &str, f: F) -> bool
    where
        F: FnOnce(&mut f64),
    {
        let slot = match self.columns.get(column) {
            Some(slot) => *slot,
            None => return false,
        };
        let row = self.rows.entry(timestamp).or_default();
        if row.len() <= slot {
            row.resize(slot + 1, 0.0);
        }
        f(&mut row[slot]);
        true
    }

    /// Returns `None` if either the row or the column does not exist.
    pub fn value(&self, timestamp: DateTime<Utc>, column: &str) -> Option<f64> {
        let slot = *self.columns.get(column)?;
        let row = self.rows.get(&timestamp)?;
        Some(row.get(slot).copied().unwrap_or_default())
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.rows.keys().copied().collect()
    }

    pub fn columns(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    /// Values of a single column, in timestamp order.
    pub fn column_values(&self, column: &str) -> Option<Vec<f64>> {
        let slot = *self.columns.get(column)?;
        let values = self
            .rows
            .values()
            .map(|row| row.get(slot).copied().unwrap_or_default())
            .collect();
        Some(values)
    }

    /// Iterates over rows in timestamp order. Values of each row follow
    /// the order of [`Tabulator::columns`].
    pub fn rows(&self) -> impl Iterator<Item = (DateTime<Utc>, Vec<f64>)> + '_ {
        let slots: Vec<usize> = self.columns.values().copied().collect();
        self.rows.iter().map(move |(timestamp, row)| {
            let values = slots
                .iter()
                .map(|slot| row.get(*slot).copied().unwrap_or_default())
                .collect();
            (*timestamp, values)
        })
    }

    /// Applies `f` to every cell of the column. Returns `false` if the
    /// column is not registered.
    pub fn map_column<F>(&mut self, column: &str, mut f: F) -> bool
    where
        F: FnMut(f64) -> f64,
    {
        let slot = match self.columns.get(column) {
            Some(slot) => *slot,
            None => return false,
        };
        for row in self.rows.values_mut() {
            if row.len() <= slot {
                row.resize(slot + 1, 0.0);
            }
            row[slot] = f(row[slot]);
        }
        true
    }

    /// Replaces every column with its running total over time.
    pub fn accumulate(&mut self) {
        let width = self.columns.len();
        let mut totals = vec![0.0; width];
        for row in self.rows.values_mut() {
            row.resize(width, 0.0);
            for (cell, total) in row.iter_mut().zip(totals.iter_mut()) {
                *total += *cell;
                *cell = *total;
            }
        }
    }

    /// Keeps only rows with `from <= timestamp <= to`. A missing bound
    /// leaves that side open.
    pub fn filter(&mut self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) {
        self.rows.retain(|timestamp, _| {
            from.map_or(true, |from| *timestamp >= from) && to.map_or(true, |to| *timestamp <= to)
        });
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
