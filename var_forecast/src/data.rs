//! Multivariate time series data handling for forecasting

use crate::error::{ForecastError, Result, Stage};
use crate::utils::date_parser;
use chrono::{DateTime, TimeZone, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const MILLIS_PER_DAY: i64 = 86_400_000;

/// Multivariate time series with a fixed variable schema and no missing cells.
///
/// Timestamps are strictly increasing and every row holds exactly one finite
/// value per variable, in the order given by [`MultivariateSeries::variables`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultivariateSeries {
    variables: Vec<String>,
    timestamps: Vec<DateTime<Utc>>,
    rows: Vec<Vec<f64>>,
}

/// Multivariate time series whose cells may be missing.
///
/// Shares the schema rules of [`MultivariateSeries`]; a missing cell is `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawSeries {
    variables: Vec<String>,
    timestamps: Vec<DateTime<Utc>>,
    rows: Vec<Vec<Option<f64>>>,
}

/// A single observation of one indicator, as stored by data collaborators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorObservation {
    /// Indicator (variable) name
    pub indicator: String,
    /// Observation time
    pub timestamp: DateTime<Utc>,
    /// Observed value
    pub value: f64,
}

impl IndicatorObservation {
    /// Create a new observation
    pub fn new(indicator: impl Into<String>, timestamp: DateTime<Utc>, value: f64) -> Self {
        Self {
            indicator: indicator.into(),
            timestamp,
            value,
        }
    }
}

fn validate_schema(
    variables: &[String],
    timestamps: &[DateTime<Utc>],
    n_rows: usize,
) -> Result<()> {
    if variables.is_empty() {
        return Err(ForecastError::InvalidSeries(
            "Series must have at least one variable".to_string(),
        ));
    }

    let mut seen = HashSet::with_capacity(variables.len());
    for name in variables {
        if name.trim().is_empty() {
            return Err(ForecastError::InvalidSeries(
                "Variable names cannot be empty".to_string(),
            ));
        }
        if !seen.insert(name.as_str()) {
            return Err(ForecastError::InvalidSeries(format!(
                "Duplicate variable name '{}'",
                name
            )));
        }
    }

    if timestamps.len() != n_rows {
        return Err(ForecastError::InvalidSeries(format!(
            "Timestamps length ({}) doesn't match rows length ({})",
            timestamps.len(),
            n_rows
        )));
    }

    if let Some(pos) = timestamps.windows(2).position(|w| w[1] <= w[0]) {
        return Err(ForecastError::InvalidSeries(format!(
            "Timestamps must be strictly increasing: {} is followed by {}",
            timestamps[pos],
            timestamps[pos + 1]
        )));
    }

    Ok(())
}

fn check_row_width(row_index: usize, width: usize, expected: usize) -> Result<()> {
    if width != expected {
        return Err(ForecastError::InvalidSeries(format!(
            "Row {} has {} values, expected {}",
            row_index, width, expected
        )));
    }
    Ok(())
}

impl MultivariateSeries {
    /// Create a new series from row-major values
    pub fn new(
        variables: Vec<String>,
        timestamps: Vec<DateTime<Utc>>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self> {
        validate_schema(&variables, &timestamps, rows.len())?;

        for (i, row) in rows.iter().enumerate() {
            check_row_width(i, row.len(), variables.len())?;
            if let Some(j) = row.iter().position(|v| !v.is_finite()) {
                return Err(ForecastError::InvalidSeries(format!(
                    "Non-finite value for '{}' in row {}",
                    variables[j], i
                )));
            }
        }

        Ok(Self {
            variables,
            timestamps,
            rows,
        })
    }

    /// Create a new series from named columns
    pub fn from_columns(
        timestamps: Vec<DateTime<Utc>>,
        columns: Vec<(String, Vec<f64>)>,
    ) -> Result<Self> {
        let n_rows = timestamps.len();
        if let Some((name, values)) = columns.iter().find(|(_, v)| v.len() != n_rows) {
            return Err(ForecastError::InvalidSeries(format!(
                "Column '{}' has {} values, expected {}",
                name,
                values.len(),
                n_rows
            )));
        }

        let rows: Vec<Vec<f64>> = (0..n_rows)
            .map(|i| columns.iter().map(|(_, values)| values[i]).collect())
            .collect();
        let variables: Vec<String> = columns.into_iter().map(|(name, _)| name).collect();

        Self::new(variables, timestamps, rows)
    }

    /// Get the variable names
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Get the number of variables
    pub fn n_variables(&self) -> usize {
        self.variables.len()
    }

    /// Get the timestamps
    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Get all rows
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Get a single row
    pub fn row(&self, index: usize) -> Option<&[f64]> {
        self.rows.get(index).map(|r| r.as_slice())
    }

    /// Position of a variable in the schema
    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v == name)
    }

    /// Values of the variable at `index`, in time order
    pub fn column_at(&self, index: usize) -> Vec<f64> {
        self.rows.iter().map(|row| row[index]).collect()
    }

    /// Values of a named variable, in time order
    pub fn column(&self, name: &str) -> Result<Vec<f64>> {
        let index = self
            .variable_index(name)
            .ok_or_else(|| ForecastError::UnknownVariable {
                stage: Stage::Ingestion,
                name: name.to_string(),
            })?;
        Ok(self.column_at(index))
    }

    /// The last `n` rows (fewer if the series is shorter)
    pub fn last_rows(&self, n: usize) -> &[Vec<f64>] {
        &self.rows[self.rows.len().saturating_sub(n)..]
    }

    /// Get a slice of the data from start to end index
    pub fn slice(&self, start: usize, end: Option<usize>) -> Result<Self> {
        let end = end.unwrap_or(self.rows.len());
        if start > end || end > self.rows.len() {
            return Err(ForecastError::InvalidSeries(format!(
                "Invalid slice {}..{} of a series with {} rows",
                start,
                end,
                self.rows.len()
            )));
        }

        Ok(Self {
            variables: self.variables.clone(),
            timestamps: self.timestamps[start..end].to_vec(),
            rows: self.rows[start..end].to_vec(),
        })
    }

    /// Check if the time series is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get the length of the time series
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Convert to a [`RawSeries`] with every cell present
    pub fn to_raw(&self) -> RawSeries {
        RawSeries {
            variables: self.variables.clone(),
            timestamps: self.timestamps.clone(),
            rows: self
                .rows
                .iter()
                .map(|row| row.iter().copied().map(Some).collect())
                .collect(),
        }
    }
}

impl From<MultivariateSeries> for RawSeries {
    fn from(series: MultivariateSeries) -> Self {
        RawSeries {
            variables: series.variables,
            timestamps: series.timestamps,
            rows: series
                .rows
                .into_iter()
                .map(|row| row.into_iter().map(Some).collect())
                .collect(),
        }
    }
}

impl RawSeries {
    /// Create a new series that may contain missing cells
    pub fn new(
        variables: Vec<String>,
        timestamps: Vec<DateTime<Utc>>,
        rows: Vec<Vec<Option<f64>>>,
    ) -> Result<Self> {
        validate_schema(&variables, &timestamps, rows.len())?;

        for (i, row) in rows.iter().enumerate() {
            check_row_width(i, row.len(), variables.len())?;
            if let Some(j) = row.iter().position(|v| matches!(v, Some(x) if !x.is_finite())) {
                return Err(ForecastError::InvalidSeries(format!(
                    "Non-finite value for '{}' in row {}; use None for missing cells",
                    variables[j], i
                )));
            }
        }

        Ok(Self {
            variables,
            timestamps,
            rows,
        })
    }

    /// Pivot per-indicator observations into a wide series.
    ///
    /// Timestamps are the sorted union over all indicators; an indicator
    /// without an observation at a timestamp gets a missing cell. Variables
    /// keep the order in which they first appear.
    pub fn from_observations<I>(observations: I) -> Result<Self>
    where
        I: IntoIterator<Item = IndicatorObservation>,
    {
        let mut variables: Vec<String> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        let mut cells: BTreeMap<DateTime<Utc>, HashMap<usize, f64>> = BTreeMap::new();

        for obs in observations {
            let index = match positions.get(&obs.indicator) {
                Some(&index) => index,
                None => {
                    variables.push(obs.indicator.clone());
                    positions.insert(obs.indicator.clone(), variables.len() - 1);
                    variables.len() - 1
                }
            };

            let slot = cells.entry(obs.timestamp).or_default();
            if slot.insert(index, obs.value).is_some() {
                return Err(ForecastError::InvalidSeries(format!(
                    "Duplicate observation for '{}' at {}",
                    obs.indicator, obs.timestamp
                )));
            }
        }

        let k = variables.len();
        let (timestamps, rows): (Vec<_>, Vec<_>) = cells
            .into_iter()
            .map(|(ts, slot)| {
                let row: Vec<Option<f64>> = (0..k).map(|j| slot.get(&j).copied()).collect();
                (ts, row)
            })
            .unzip();

        Self::new(variables, timestamps, rows)
    }

    /// Get the variable names
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Get the number of variables
    pub fn n_variables(&self) -> usize {
        self.variables.len()
    }

    /// Get the timestamps
    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Get all rows
    pub fn rows(&self) -> &[Vec<Option<f64>>] {
        &self.rows
    }

    /// Observed (non-missing) values of the variable at `index`
    pub fn observed_values(&self, index: usize) -> Vec<f64> {
        self.rows.iter().filter_map(|row| row[index]).collect()
    }

    /// Number of missing cells
    pub fn missing_count(&self) -> usize {
        self.rows
            .iter()
            .map(|row| row.iter().filter(|v| v.is_none()).count())
            .sum()
    }

    /// Check if the time series is empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Get the length of the time series
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Keep only the rows whose mask entry is `true`
    pub(crate) fn retain_rows(&self, keep: &[bool]) -> Self {
        let (timestamps, rows): (Vec<_>, Vec<_>) = self
            .timestamps
            .iter()
            .zip(self.rows.iter())
            .zip(keep.iter())
            .filter(|(_, keep)| **keep)
            .map(|((ts, row), _)| (*ts, row.clone()))
            .unzip();

        Self {
            variables: self.variables.clone(),
            timestamps,
            rows,
        }
    }

    /// Convert to a complete series, failing on the first missing cell
    pub fn into_complete(self) -> Result<MultivariateSeries> {
        let mut rows = Vec::with_capacity(self.rows.len());
        for (i, row) in self.rows.into_iter().enumerate() {
            let complete: Option<Vec<f64>> = row.iter().copied().collect();
            match complete {
                Some(values) => rows.push(values),
                None => {
                    let j = row.iter().position(|v| v.is_none()).unwrap_or(0);
                    return Err(ForecastError::InvalidSeries(format!(
                        "Missing value for '{}' in row {}",
                        self.variables[j], i
                    )));
                }
            }
        }

        MultivariateSeries::new(self.variables, self.timestamps, rows)
    }

    /// Convert to a polars DataFrame with a millisecond `timestamp` column
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns = Vec::with_capacity(self.variables.len() + 1);
        columns.push(Series::new(
            "timestamp",
            self.timestamps
                .iter()
                .map(|t| t.timestamp_millis())
                .collect::<Vec<i64>>(),
        ));

        for (j, name) in self.variables.iter().enumerate() {
            let values: Vec<Option<f64>> = self.rows.iter().map(|row| row[j]).collect();
            columns.push(Series::new(name.as_str(), values));
        }

        Ok(DataFrame::new(columns)?)
    }
}

/// Data loader for multivariate time series
#[derive(Debug)]
pub struct DataLoader;

impl DataLoader {
    /// Load a wide CSV file: a timestamp column first, then one column per variable.
    ///
    /// Empty cells and `NA`/`NaN` tokens are treated as missing.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<RawSeries> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Load a wide CSV document from any reader
    pub fn from_reader<R: Read>(reader: R) -> Result<RawSeries> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = rdr.headers()?.clone();
        if headers.len() < 2 {
            return Err(ForecastError::InvalidSeries(
                "CSV needs a timestamp column and at least one variable column".to_string(),
            ));
        }
        let variables: Vec<String> = headers.iter().skip(1).map(|h| h.to_string()).collect();

        let mut records = Vec::new();
        for (line, record) in rdr.records().enumerate() {
            let record = record?;
            let ts_text = record.get(0).unwrap_or_default();
            let timestamp = date_parser::parse_date(ts_text)?;

            let mut row = Vec::with_capacity(variables.len());
            for (j, name) in variables.iter().enumerate() {
                let cell = record.get(j + 1).unwrap_or_default();
                row.push(Self::parse_cell(cell).map_err(|_| {
                    ForecastError::InvalidSeries(format!(
                        "Cannot parse '{}' for '{}' on data line {}",
                        cell,
                        name,
                        line + 1
                    ))
                })?);
            }
            records.push((timestamp, row));
        }

        records.sort_by_key(|(ts, _)| *ts);
        let (timestamps, rows): (Vec<_>, Vec<_>) = records.into_iter().unzip();

        RawSeries::new(variables, timestamps, rows)
    }

    fn parse_cell(cell: &str) -> std::result::Result<Option<f64>, std::num::ParseFloatError> {
        if cell.is_empty() || cell.eq_ignore_ascii_case("na") || cell.eq_ignore_ascii_case("nan")
        {
            return Ok(None);
        }
        cell.parse::<f64>().map(Some)
    }

    /// Create a series from an existing DataFrame.
    ///
    /// The time column is detected by name; every other numeric column
    /// becomes a variable.
    pub fn from_dataframe(df: &DataFrame) -> Result<RawSeries> {
        let time_column = Self::detect_time_column(df)?;
        let timestamps = Self::timestamps_from_column(df.column(&time_column)?)?;

        let mut variables = Vec::new();
        let mut columns = Vec::new();
        for series in df.get_columns() {
            if series.name() == time_column || !series.dtype().is_numeric() {
                continue;
            }
            let values: Vec<Option<f64>> = series
                .cast(&DataType::Float64)?
                .f64()?
                .into_iter()
                .map(|v| v.filter(|x| x.is_finite()))
                .collect();
            variables.push(series.name().to_string());
            columns.push(values);
        }

        let mut records: Vec<(DateTime<Utc>, Vec<Option<f64>>)> = timestamps
            .into_iter()
            .enumerate()
            .map(|(i, ts)| (ts, columns.iter().map(|c| c[i]).collect()))
            .collect();
        records.sort_by_key(|(ts, _)| *ts);
        let (timestamps, rows): (Vec<_>, Vec<_>) = records.into_iter().unzip();

        RawSeries::new(variables, timestamps, rows)
    }

    /// Detect the time column in a DataFrame
    fn detect_time_column(df: &DataFrame) -> Result<String> {
        for name in df.get_column_names() {
            let lower_name = name.to_lowercase();
            if lower_name.contains("time") || lower_name.contains("date") {
                return Ok(name.to_string());
            }
        }

        // If not found, use the first temporal column
        if let Some(col) = df.get_columns().iter().find(|c| c.dtype().is_temporal()) {
            return Ok(col.name().to_string());
        }

        Err(ForecastError::InvalidSeries(
            "No time column found in data".to_string(),
        ))
    }

    fn timestamps_from_column(col: &Series) -> Result<Vec<DateTime<Utc>>> {
        let millis: Vec<Option<i64>> = match col.dtype() {
            DataType::Datetime(unit, _) => {
                let divisor = match unit {
                    TimeUnit::Nanoseconds => 1_000_000,
                    TimeUnit::Microseconds => 1_000,
                    TimeUnit::Milliseconds => 1,
                };
                col.cast(&DataType::Int64)?
                    .i64()?
                    .into_iter()
                    .map(|v| v.map(|x| x / divisor))
                    .collect()
            }
            DataType::Date => col
                .cast(&DataType::Int32)?
                .i32()?
                .into_iter()
                .map(|v| v.map(|days| days as i64 * MILLIS_PER_DAY))
                .collect(),
            DataType::Utf8 => {
                return col
                    .utf8()?
                    .into_iter()
                    .map(|v| match v {
                        Some(text) => date_parser::parse_date(text),
                        None => Err(ForecastError::TimestampParse(
                            "Missing timestamp".to_string(),
                        )),
                    })
                    .collect();
            }
            DataType::Int64 | DataType::Int32 | DataType::UInt64 | DataType::UInt32 => {
                col.cast(&DataType::Int64)?.i64()?.into_iter().collect()
            }
            other => {
                return Err(ForecastError::InvalidSeries(format!(
                    "Unsupported time column type: {:?}",
                    other
                )))
            }
        };

        millis
            .into_iter()
            .map(|v| {
                v.and_then(|ms| Utc.timestamp_millis_opt(ms).single())
                    .ok_or_else(|| {
                        ForecastError::TimestampParse(
                            "Missing or out-of-range timestamp".to_string(),
                        )
                    })
            })
            .collect()
    }
}
