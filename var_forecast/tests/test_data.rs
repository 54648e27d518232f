use chrono::{Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;
use std::io::Write;
use tempfile::NamedTempFile;
use var_forecast::{DataLoader, ForecastError, IndicatorObservation, RawSeries};

fn write_csv(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file
}

#[test]
fn test_load_csv_sorts_rows_and_reads_missing_cells() {
    let file = write_csv(&[
        "timestamp,GDP,Inflation",
        "2023-03-31,2.2,NA",
        "2023-01-31,2.0,3.1",
        "2023-02-28T00:00:00Z,2.1,",
    ]);

    let raw = DataLoader::from_csv(file.path()).unwrap();
    assert_eq!(raw.variables(), &["GDP".to_string(), "Inflation".to_string()]);
    assert_eq!(
        raw.timestamps()[0],
        Utc.with_ymd_and_hms(2023, 1, 31, 0, 0, 0).unwrap()
    );
    assert_eq!(
        raw.rows().to_vec(),
        vec![
            vec![Some(2.0), Some(3.1)],
            vec![Some(2.1), None],
            vec![Some(2.2), None],
        ]
    );
    assert_eq!(raw.missing_count(), 2);
}

#[test]
fn test_load_csv_rejects_bad_values() {
    let file = write_csv(&["timestamp,GDP", "2023-01-31,abc"]);
    let err = DataLoader::from_csv(file.path()).unwrap_err();
    assert!(matches!(err, ForecastError::InvalidSeries(_)));

    let file = write_csv(&["timestamp,GDP", "31/01/2023,1.0"]);
    let err = DataLoader::from_csv(file.path()).unwrap_err();
    assert!(matches!(err, ForecastError::TimestampParse(_)));
}

#[test]
fn test_load_csv_rejects_duplicate_timestamps() {
    let file = write_csv(&["timestamp,GDP", "2023-01-31,1.0", "2023-01-31,1.1"]);
    assert!(DataLoader::from_csv(file.path()).is_err());
}

#[test]
fn test_missing_file() {
    let err = DataLoader::from_csv("/nonexistent/indicators.csv").unwrap_err();
    assert!(matches!(err, ForecastError::IoError(_)));
}

#[test]
fn test_dataframe_round_trip() {
    let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    let raw = RawSeries::new(
        vec!["GDP".to_string(), "Unemployment".to_string()],
        (0..3).map(|i| start + Duration::days(i)).collect(),
        vec![
            vec![Some(1.0), Some(5.0)],
            vec![None, Some(5.1)],
            vec![Some(1.2), None],
        ],
    )
    .unwrap();

    let df = raw.to_dataframe().unwrap();
    assert_eq!(df.shape(), (3, 3));

    let restored = DataLoader::from_dataframe(&df).unwrap();
    assert_eq!(restored, raw);
}

#[test]
fn test_observations_pivot_into_complete_series() {
    let start = Utc.with_ymd_and_hms(2023, 1, 31, 0, 0, 0).unwrap();
    let observations = (0..3).flat_map(|i| {
        let ts = start + Duration::days(30 * i);
        vec![
            IndicatorObservation::new("GDP", ts, 2.0 + i as f64),
            IndicatorObservation::new("Inflation", ts, 3.0),
        ]
    });

    let series = RawSeries::from_observations(observations)
        .unwrap()
        .into_complete()
        .unwrap();
    assert_eq!(series.column("GDP").unwrap(), vec![2.0, 3.0, 4.0]);
    assert_eq!(series.n_variables(), 2);
}
