use std::error::Error as StdError;

/// Named outputs of one scenario cell, in the order the probe produced them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    values: Vec<(String, f64)>,
}

impl Record {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record with `name = value` appended.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: f64) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: f64) {
        self.values.push((name.into(), value));
    }

    /// Returns the first value recorded under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, value)| *value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for Record {
    fn from_iter<T: IntoIterator<Item = (K, f64)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        }
    }
}

/// What happened in one scenario cell.
#[derive(Debug)]
pub enum Outcome {
    Record(Record),
    /// The probe returned an error; other cells are unaffected.
    Failed(Box<dyn StdError + Send + Sync>),
    /// The scenario was aborted before this cell started.
    Skipped,
}

/// One scenario cell: the swept values and what the probe produced.
#[derive(Debug)]
pub struct Row {
    /// Swept `(parameter, value)` pairs in sweep order.
    pub inputs: Vec<(String, f64)>,
    pub outcome: Outcome,
}

impl Row {
    /// Returns the record, if the probe succeeded.
    #[must_use]
    pub fn record(&self) -> Option<&Record> {
        match &self.outcome {
            Outcome::Record(record) => Some(record),
            Outcome::Failed(_) | Outcome::Skipped => None,
        }
    }

    /// Returns the swept value of `parameter`.
    #[must_use]
    pub fn input(&self, parameter: &str) -> Option<f64> {
        self.inputs
            .iter()
            .find(|(name, _)| name == parameter)
            .map(|(_, value)| *value)
    }
}

/// The result of a scenario run, one row per cell in sweep order.
#[derive(Debug)]
pub struct Table {
    pub(super) columns: Vec<String>,
    pub(super) rows: Vec<Row>,
}

impl Table {
    /// Returns the swept parameter names.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Returns the recorded `name` of every row, `NaN` where a row has no
    /// such value.
    #[must_use]
    pub fn column(&self, name: &str) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| row.record().and_then(|r| r.get(name)).unwrap_or(f64::NAN))
            .collect()
    }

    /// Returns the number of rows whose probe failed.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| matches!(row.outcome, Outcome::Failed(_)))
            .count()
    }

    /// Returns the number of rows skipped after an abort.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| matches!(row.outcome, Outcome::Skipped))
            .count()
    }
}
