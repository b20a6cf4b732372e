//! Integration tests for the NPL aggregation over extract directories.

use ba900_core::aggregate::{aggregate_totals, aggregate_totals_to_csv, AggregateError};
use ba900_core::{AggregateConfig, ExtractError};
use chrono::NaiveDate;
use std::fs;
use std::path::{Path, PathBuf};

const IMP: &str = "Less: credit impairments in respect of loans and advances";
const LOANS: &str =
    "Overdrafts, loans and advances: private sector (total of items 181, 187 and 188)";

fn config() -> AggregateConfig {
    AggregateConfig::default()
}

/// A BA900-shaped TOTAL.csv with the two targets under one header.
fn total_csv(impairments: &str, loans: &str) -> String {
    format!(
        "BA900 return,TOTAL\n\
         Description,Item number,Col 1,Col 3,TOTAL ASSETS (Col 1 plus col 3)\n\
         Cash and gold coin,101,1,2,3\n\
         \"{LOANS}\",180,0,0,{loans}\n\
         \"{IMP}\",194,0,0,{impairments}\n"
    )
}

fn write_extract(root: &Path, dir: &str, contents: &str) -> PathBuf {
    let d = root.join(dir);
    fs::create_dir_all(&d).unwrap();
    let file = d.join("TOTAL.csv");
    fs::write(&file, contents).unwrap();
    file
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn single_extract_round_trip() {
    let data = tempfile::tempdir().unwrap();
    write_extract(data.path(), "BA900_2021-03-31_zipcsv", &total_csv("100", "50"));
    let out = data.path().join("aggregated_totals.csv");

    let table = aggregate_totals_to_csv(data.path(), &config(), &out).unwrap();

    assert_eq!(table.len(), 1);
    assert_eq!(table.rows[0].date, date(2021, 3, 31));
    assert_eq!(table.rows[0].impairments, 100.0);
    assert_eq!(table.rows[0].loans, 50.0);
    assert_eq!(table.rows[0].npl, 2.0);

    let text = fs::read_to_string(&out).unwrap();
    let mut rdr = csv::Reader::from_reader(text.as_bytes());
    let header: Vec<String> = rdr.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(header, vec!["date", IMP, LOANS, "NPL"]);
    let rows: Vec<csv::StringRecord> = rdr.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][0], "2021-03-31");
    assert_eq!(rows[0][3].parse::<f64>().unwrap(), 2.0);
}

#[test]
fn dates_are_sorted_and_unrelated_entries_ignored() {
    let data = tempfile::tempdir().unwrap();
    write_extract(data.path(), "BA900_2021-02-28_zipcsv", &total_csv("30", "600"));
    write_extract(data.path(), "BA900_2021-01-31_zipcsv", &total_csv("20", "400"));
    write_extract(data.path(), "BA920_2021-01-31_zipcsv", "garbage");
    write_extract(data.path(), "notes", "garbage");
    fs::write(data.path().join("BA900_2021-04-30_zipcsv"), "a file, not a dir").unwrap();

    let table = aggregate_totals(data.path(), &config()).unwrap();

    let dates: Vec<NaiveDate> = table.rows.iter().map(|r| r.date).collect();
    assert_eq!(dates, vec![date(2021, 1, 31), date(2021, 2, 28)]);
    assert_eq!(table.rows[0].npl, 0.05);
    assert_eq!(table.rows[1].npl, 0.05);
}

#[test]
fn matched_directory_without_total_csv_is_skipped() {
    let data = tempfile::tempdir().unwrap();
    write_extract(data.path(), "BA900_2021-01-31_zipcsv", &total_csv("1", "4"));
    fs::create_dir_all(data.path().join("BA900_2021-02-28_zipcsv")).unwrap();

    let table = aggregate_totals(data.path(), &config()).unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table.rows[0].npl, 0.25);
}

#[test]
fn empty_input_writes_header_only() {
    let data = tempfile::tempdir().unwrap();
    fs::create_dir_all(data.path().join("unrelated")).unwrap();
    let out = data.path().join("out/aggregated.csv");

    let table = aggregate_totals_to_csv(data.path(), &config(), &out).unwrap();
    assert!(table.is_empty());

    let text = fs::read_to_string(&out).unwrap();
    let mut rdr = csv::Reader::from_reader(text.as_bytes());
    let header: Vec<String> = rdr.headers().unwrap().iter().map(String::from).collect();
    assert_eq!(header, vec!["date", IMP, LOANS, "NPL"]);
    assert_eq!(rdr.records().count(), 0);
}

#[test]
fn missing_header_fails_and_writes_nothing() {
    let data = tempfile::tempdir().unwrap();
    write_extract(
        data.path(),
        "BA900_2021-01-31_zipcsv",
        &format!("\"{LOANS}\",180,500\n\"{IMP}\",194,25\nDescription,Item,Value\n"),
    );
    let out = data.path().join("aggregated.csv");

    let err = aggregate_totals_to_csv(data.path(), &config(), &out).unwrap_err();

    assert!(
        matches!(err, AggregateError::Extract(ExtractError::HeaderNotFound { .. })),
        "got {err:?}"
    );
    assert!(err.to_string().contains("BA900_2021-01-31_zipcsv"));
    assert!(!out.exists());
}

#[test]
fn file_without_any_target_fails() {
    let data = tempfile::tempdir().unwrap();
    write_extract(
        data.path(),
        "BA900_2021-01-31_zipcsv",
        "Description,TOTAL ASSETS (Col 1 plus col 3)\nCash,5\n",
    );

    let err = aggregate_totals(data.path(), &config()).unwrap_err();
    assert!(matches!(
        err,
        AggregateError::Extract(ExtractError::TargetsNotFound { .. })
    ));
}

#[test]
fn file_with_one_target_names_the_missing_label() {
    let data = tempfile::tempdir().unwrap();
    write_extract(
        data.path(),
        "BA900_2021-01-31_zipcsv",
        &format!("Description,TOTAL ASSETS (Col 1 plus col 3)\n\"{LOANS}\",500\n"),
    );

    let err = aggregate_totals(data.path(), &config()).unwrap_err();
    match err {
        AggregateError::MissingTarget { label, .. } => assert_eq!(label, IMP),
        other => panic!("expected MissingTarget, got {other:?}"),
    }
}

#[test]
fn non_numeric_value_is_hard_error() {
    let data = tempfile::tempdir().unwrap();
    write_extract(data.path(), "BA900_2021-01-31_zipcsv", &total_csv("n/a", "50"));

    let err = aggregate_totals(data.path(), &config()).unwrap_err();
    match err {
        AggregateError::NotNumeric { label, value, .. } => {
            assert_eq!(label, IMP);
            assert_eq!(value, "n/a");
        }
        other => panic!("expected NotNumeric, got {other:?}"),
    }
}

#[test]
fn blank_value_becomes_nan_and_zero_loans_divide_per_ieee() {
    let data = tempfile::tempdir().unwrap();
    write_extract(data.path(), "BA900_2021-01-31_zipcsv", &total_csv("", "50"));
    write_extract(data.path(), "BA900_2021-02-28_zipcsv", &total_csv("5", "0"));

    let table = aggregate_totals(data.path(), &config()).unwrap();
    assert!(table.rows[0].impairments.is_nan());
    assert!(table.rows[0].npl.is_nan());
    assert!(table.rows[1].npl.is_infinite());
}

#[test]
fn repeated_target_in_one_file_is_rejected() {
    let data = tempfile::tempdir().unwrap();
    let mut contents = total_csv("10", "50");
    contents.push_str(&format!("\"{IMP}\",194,0,0,11\n"));
    write_extract(data.path(), "BA900_2021-01-31_zipcsv", &contents);

    let err = aggregate_totals(data.path(), &config()).unwrap_err();
    assert!(matches!(err, AggregateError::DuplicateObservation { .. }));
}

#[test]
fn missing_value_column_is_error() {
    let data = tempfile::tempdir().unwrap();
    write_extract(
        data.path(),
        "BA900_2021-01-31_zipcsv",
        &format!("Description,Col 1\n\"{LOANS}\",500\n\"{IMP}\",25\n"),
    );

    let err = aggregate_totals(data.path(), &config()).unwrap_err();
    assert!(matches!(err, AggregateError::MissingValueColumn { .. }));
}

#[test]
fn invalid_directory_date_is_error() {
    let data = tempfile::tempdir().unwrap();
    write_extract(data.path(), "BA900_2021-13-01_zipcsv", &total_csv("1", "2"));

    let err = aggregate_totals(data.path(), &config()).unwrap_err();
    assert!(matches!(err, AggregateError::InvalidDate { .. }));
}

#[test]
fn missing_data_dir_is_error() {
    let err = aggregate_totals(Path::new("/nonexistent/ba900"), &config()).unwrap_err();
    assert!(matches!(err, AggregateError::ReadDir { .. }));
}

#[test]
fn custom_labels_from_config() {
    let data = tempfile::tempdir().unwrap();
    write_extract(
        data.path(),
        "BA900_2021-01-31_zipcsv",
        "Description,Amount\nBad,3\nGood,12\n",
    );
    let cfg = AggregateConfig {
        impairments_label: "Bad".into(),
        loans_label: "Good".into(),
        value_column: "Amount".into(),
        ..AggregateConfig::default()
    };

    let table = aggregate_totals(data.path(), &cfg).unwrap();
    assert_eq!(table.rows[0].npl, 0.25);
    assert_eq!(table.columns(), ["date", "Bad", "Good", "NPL"]);
}
