#![doc = include_str!("../README.md")]
use anyhow::Result;
use log::info;

use std::path::Path;

pub mod cells;
pub mod config;
pub mod dataset;
pub mod findings;
pub mod groups;
pub mod money;
pub mod report;
pub mod workbook;

pub use config::Config;
pub use dataset::{Cell, Dataset, Error};
pub use groups::{Groups, ProductGroup};
pub use money::Money;
pub use report::Report;
pub use workbook::ReportWriter;

/// Reads the sales data at `input`, computes the report, and writes the
/// workbook to `output`.
///
/// `sheet` selects a worksheet when `input` is a spreadsheet; by default the
/// first one is read.
///
/// # Errors
///
/// Returns errors if the input cannot be read or lacks a required column, or
/// if the workbook cannot be written.
pub fn build_report(
    input: impl AsRef<Path>,
    sheet: Option<&str>,
    output: impl AsRef<Path>,
    config: &Config,
) -> Result<Report> {
    let mut dataset = Dataset::from_path(input, sheet)?;
    let prep = dataset.prepare(&config.product_groups())?;
    info!(
        "prepared {} rows ({} bad dates, {} bad sales)",
        dataset.len(),
        prep.bad_dates,
        prep.bad_sales
    );
    let report = Report::new(&dataset, config)?;
    ReportWriter::new(&dataset, &report, config)?.save(output)?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_report_fn_writes_workbook_and_returns_report() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("toy.xlsx");
        let report = build_report("testdata/toy.csv", None, &out, &Config::default()).unwrap();
        assert!(out.exists());
        assert_eq!(report.total_sales, Money::from_cents(30_000));
    }

    #[test]
    fn build_report_fn_writes_nothing_when_a_column_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("bad.xlsx");
        let err = build_report("testdata/missing_manager.csv", None, &out, &Config::default())
            .unwrap_err();
        assert!(
            matches!(err.downcast_ref::<Error>(), Some(Error::MissingColumns(cols)) if cols == &["Manager"]),
            "{err:#}"
        );
        assert!(!out.exists());
    }

    #[test]
    fn build_report_fn_reports_missing_input() {
        let err = build_report("testdata/bogus.csv", None, "unused.xlsx", &Config::default())
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InputNotFound(_))));
    }
}
