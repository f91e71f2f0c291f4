//! Loading, validating and preparing the sales table.
//!
//! A [`Dataset`] keeps every column of the input, in input order, so that the
//! raw data sheet of the report is a faithful copy that live formulas can
//! point at. [`Transaction`] is the typed view over the required columns
//! that the aggregates are computed from.

use calamine::{open_workbook_auto, Data, Range, Reader};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use log::{debug, info, warn};
use thiserror::Error;

use std::{
    fmt::{self, Display},
    io,
    path::{Path, PathBuf},
    str::FromStr,
};

use crate::{groups::Groups, money::Money};

pub const ORDER_DATE: &str = "Order Date";
pub const CATEGORY: &str = "Category";
pub const SUB_CATEGORY: &str = "Sub-Category";
pub const PRODUCT_NAME: &str = "Product Name";
pub const MANAGER: &str = "Manager";
pub const SALES: &str = "Sales";
pub const ORDER_ID: &str = "Order ID";
pub const CUSTOMER_ID: &str = "Customer ID";
pub const YEAR: &str = "Year";
pub const MONTH: &str = "Month";
pub const PRODUCT_GROUP: &str = "Product Group";

/// Columns every input must have, by exact header text.
pub const REQUIRED_COLUMNS: [&str; 8] = [
    ORDER_DATE,
    CATEGORY,
    SUB_CATEGORY,
    PRODUCT_NAME,
    MANAGER,
    SALES,
    ORDER_ID,
    CUSTOMER_ID,
];

/// Errors from loading or validating a dataset.
#[derive(Debug, Error)]
pub enum Error {
    #[error("input file '{}' not found", .0.display())]
    InputNotFound(PathBuf),

    #[error("required column(s) missing from input: {}", quoted(.0))]
    MissingColumns(Vec<String>),

    #[error("unsupported input format '.{0}' (expected .csv, .xlsx, .xlsm, .xls or .ods)")]
    UnsupportedFormat(String),

    #[error("sheet '{0}' not found in workbook")]
    Sheet(String),

    #[error("workbook contains no sheets")]
    EmptyWorkbook,

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Workbook(#[from] calamine::Error),
}

fn quoted(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("'{n}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A single value in the table.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Cell {
    #[default]
    Empty,
    Number(f64),
    Text(String),
    Date(NaiveDateTime),
}

impl Cell {
    /// Infers a cell from CSV text: empty, a number, or else text.
    #[must_use]
    pub fn infer(raw: &str) -> Self {
        if raw.trim().is_empty() {
            Cell::Empty
        } else if let Ok(n) = raw.trim().parse::<f64>() {
            if n.is_finite() {
                Cell::Number(n)
            } else {
                Cell::Text(raw.to_string())
            }
        } else {
            Cell::Text(raw.to_string())
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    /// Returns the value as a grouping key, or `None` for a blank cell.
    #[must_use]
    pub fn key(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Text(s) if s.is_empty() => None,
            other => Some(other.to_string()),
        }
    }

    /// Interprets the cell as a calendar date, if it holds one.
    #[must_use]
    pub fn to_date(&self) -> Option<NaiveDateTime> {
        match self {
            Cell::Date(d) => Some(*d),
            Cell::Number(n) => from_excel_serial(*n),
            Cell::Text(s) => parse_date(s),
            Cell::Empty => None,
        }
    }

    /// Interprets the cell as an amount of money, if it holds one.
    #[must_use]
    pub fn to_money(&self) -> Option<Money> {
        match self {
            Cell::Number(n) => Some(Money::from_f64(*n)),
            Cell::Text(s) => Money::from_str(s).ok(),
            Cell::Empty | Cell::Date(_) => None,
        }
    }
}

impl Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => f.write_str(s),
            #[allow(clippy::cast_possible_truncation)]
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Date(d) if d.time() == chrono::NaiveTime::MIN => {
                write!(f, "{}", d.format("%Y-%m-%d"))
            }
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

impl From<Data> for Cell {
    fn from(data: Data) -> Self {
        match data {
            Data::Empty | Data::Error(_) => Cell::Empty,
            Data::String(s) if s.is_empty() => Cell::Empty,
            Data::String(s) | Data::DurationIso(s) => Cell::Text(s),
            #[allow(clippy::cast_precision_loss)]
            Data::Int(i) => Cell::Number(i as f64),
            Data::Float(f) => Cell::Number(f),
            Data::Bool(b) => Cell::Text(if b { "TRUE" } else { "FALSE" }.to_string()),
            Data::DateTime(dt) => dt
                .as_datetime()
                .map_or(Cell::Number(dt.as_f64()), Cell::Date),
            Data::DateTimeIso(s) => parse_date(&s).map_or(Cell::Text(s), Cell::Date),
        }
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m/%d/%y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
];

/// Parses a date in one of the common textual formats. Ambiguous day/month
/// orders are read month first.
///
/// chrono's `%Y` also accepts one or two digits, so a four-digit year is
/// required before a `%Y` format counts as a match; `1/5/14` is then read by
/// `%m/%d/%y` as 2014-01-05 rather than as year 1.
#[must_use]
pub fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .filter_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok().map(|d| (fmt, d)))
        .chain(DATE_FORMATS.iter().filter_map(|fmt| {
            NaiveDate::parse_from_str(text, fmt)
                .ok()
                .map(|d| (fmt, d.and_time(chrono::NaiveTime::MIN)))
        }))
        .find(|(fmt, d)| !fmt.contains("%Y") || d.year() >= 1000)
        .map(|(_, d)| d)
}

/// Largest serial number Excel accepts (9999-12-31).
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

fn from_excel_serial(serial: f64) -> Option<NaiveDateTime> {
    if !(1.0..=MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_time(chrono::NaiveTime::MIN);
    #[allow(clippy::cast_possible_truncation)]
    let seconds = (serial * 86_400.0).round() as i64;
    epoch.checked_add_signed(chrono::TimeDelta::try_seconds(seconds)?)
}

/// One row of sales data, typed over the required columns.
#[derive(Clone, Debug, PartialEq)]
pub struct Transaction {
    pub order_date: Option<NaiveDateTime>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub category: Option<String>,
    pub sub_category: Option<String>,
    pub product: Option<String>,
    pub product_group: Option<String>,
    /// Blank when the row has no manager.
    pub manager: String,
    pub sales: Money,
    pub order_id: Option<String>,
    pub customer_id: Option<String>,
}

/// What [`Dataset::prepare`] had to coerce.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Preparation {
    pub bad_dates: usize,
    pub bad_sales: usize,
}

/// The input table: header names and rows of cells.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Dataset {
    /// Creates a dataset from headers and rows. Short rows are padded with
    /// empty cells and long rows truncated to the header width.
    #[must_use]
    pub fn new(headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let headers: Vec<String> = headers.into_iter().map(|h| h.trim().to_string()).collect();
        let width = headers.len();
        let rows = rows
            .into_iter()
            .filter(|row| row.iter().any(|c| !c.is_empty()))
            .map(|mut row| {
                row.resize(width, Cell::Empty);
                row
            })
            .collect();
        Self { headers, rows }
    }

    /// Reads a dataset from a CSV or spreadsheet file, chosen by extension.
    ///
    /// For spreadsheets, `sheet` selects the worksheet by name; the first
    /// sheet is used by default.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InputNotFound`] before any parsing if `path` does not
    /// exist, [`Error::UnsupportedFormat`] for unknown extensions, and any
    /// errors from reading the file.
    pub fn from_path(path: impl AsRef<Path>, sheet: Option<&str>) -> Result<Self, Error> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::InputNotFound(path.to_path_buf()));
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let dataset = match ext.as_str() {
            "csv" | "txt" => Self::from_csv_reader(csv::Reader::from_path(path)?)?,
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Self::from_workbook(path, sheet)?,
            other => return Err(Error::UnsupportedFormat(other.to_string())),
        };
        info!(
            "loaded {} rows x {} columns from {}",
            dataset.len(),
            dataset.headers.len(),
            path.display()
        );
        Ok(dataset)
    }

    /// Reads a dataset from CSV with a header row.
    ///
    /// # Errors
    ///
    /// Returns any errors from the CSV reader.
    pub fn from_csv_reader<R: io::Read>(mut rdr: csv::Reader<R>) -> Result<Self, Error> {
        let headers = rdr.headers()?.iter().map(str::to_string).collect();
        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result?;
            rows.push(record.iter().map(Cell::infer).collect());
        }
        Ok(Self::new(headers, rows))
    }

    fn from_workbook(path: &Path, sheet: Option<&str>) -> Result<Self, Error> {
        let mut workbook = open_workbook_auto(path)?;
        let names = workbook.sheet_names();
        let name = match sheet {
            Some(wanted) => names
                .iter()
                .find(|n| n.as_str() == wanted)
                .cloned()
                .ok_or_else(|| Error::Sheet(wanted.to_string()))?,
            None => names.first().cloned().ok_or(Error::EmptyWorkbook)?,
        };
        debug!("reading sheet '{name}' of {}", path.display());
        let range = workbook.worksheet_range(&name)?;
        Ok(Self::from_range(range))
    }

    /// Builds a dataset from a worksheet range whose first row is the header.
    #[must_use]
    pub fn from_range(range: Range<Data>) -> Self {
        let mut rows = range.rows();
        let headers = rows
            .next()
            .map(|row| row.iter().map(|c| Cell::from(c.clone()).to_string()).collect())
            .unwrap_or_default();
        let rows = rows
            .map(|row| row.iter().cloned().map(Cell::from).collect())
            .collect();
        Self::new(headers, rows)
    }

    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    #[must_use]
    pub fn rows(&self) -> &[Vec<Cell>] {
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

    /// Returns the index of the first column named `name`.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Checks that every required column is present.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingColumns`] naming each absent column, in
    /// [`REQUIRED_COLUMNS`] order.
    pub fn validate(&self) -> Result<(), Error> {
        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|name| self.column(name).is_none())
            .map(|name| (*name).to_string())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingColumns(missing))
        }
    }

    /// Sets the column `name` to `values`, replacing an existing column of
    /// that name or appending a new one. Returns the column index.
    pub fn derive_column(&mut self, name: &str, values: Vec<Cell>) -> usize {
        let col = self.column(name).unwrap_or_else(|| {
            self.headers.push(name.to_string());
            for row in &mut self.rows {
                row.push(Cell::Empty);
            }
            self.headers.len() - 1
        });
        for (row, value) in self.rows.iter_mut().zip(values) {
            row[col] = value;
        }
        col
    }

    fn map_column(&mut self, col: usize, f: impl Fn(&Cell) -> Cell) -> usize {
        let mut coerced = 0;
        for row in &mut self.rows {
            let new = f(&row[col]);
            if new.is_empty() && !row[col].is_empty() {
                coerced += 1;
            }
            row[col] = new;
        }
        coerced
    }

    /// Converts the order-date column to dates and derives `Year` and
    /// `Month` from it. Values that are not dates become empty. Returns how
    /// many values were coerced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingColumns`] if there is no order-date column.
    pub fn derive_calendar(&mut self) -> Result<usize, Error> {
        let col = self
            .column(ORDER_DATE)
            .ok_or_else(|| Error::MissingColumns(vec![ORDER_DATE.to_string()]))?;
        let coerced = self.map_column(col, |c| c.to_date().map_or(Cell::Empty, Cell::Date));
        let (years, months): (Vec<Cell>, Vec<Cell>) = self
            .rows
            .iter()
            .map(|row| match &row[col] {
                Cell::Date(d) => (
                    Cell::Number(f64::from(d.year())),
                    Cell::Number(f64::from(d.month())),
                ),
                _ => (Cell::Empty, Cell::Empty),
            })
            .unzip();
        self.derive_column(YEAR, years);
        self.derive_column(MONTH, months);
        Ok(coerced)
    }

    /// Converts the sales column to numbers. Values that are not amounts
    /// become empty. Returns how many values were coerced.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingColumns`] if there is no sales column.
    pub fn normalize_sales(&mut self) -> Result<usize, Error> {
        let col = self
            .column(SALES)
            .ok_or_else(|| Error::MissingColumns(vec![SALES.to_string()]))?;
        Ok(self.map_column(col, |c| {
            c.to_money().map_or(Cell::Empty, |m| match c {
                Cell::Number(n) => Cell::Number(*n),
                _ => Cell::Number(m.to_f64()),
            })
        }))
    }

    /// Adds a `Product Group` column naming each row's product group, or its
    /// product name when no group matches.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingColumns`] if there is no product-name column.
    pub fn derive_product_groups(&mut self, groups: &Groups) -> Result<(), Error> {
        let col = self
            .column(PRODUCT_NAME)
            .ok_or_else(|| Error::MissingColumns(vec![PRODUCT_NAME.to_string()]))?;
        let values = self
            .rows
            .iter()
            .map(|row| match row[col].key() {
                Some(name) => Cell::Text(
                    groups
                        .product_group(&name)
                        .map_or(name.clone(), str::to_string),
                ),
                None => Cell::Empty,
            })
            .collect();
        self.derive_column(PRODUCT_GROUP, values);
        Ok(())
    }

    /// Validates the dataset and derives everything the report needs:
    /// calendar columns, numeric sales and, when `groups` is not empty,
    /// product groups.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingColumns`] if a required column is absent.
    pub fn prepare(&mut self, groups: &Groups) -> Result<Preparation, Error> {
        self.validate()?;
        let prep = Preparation {
            bad_dates: self.derive_calendar()?,
            bad_sales: self.normalize_sales()?,
        };
        if prep.bad_dates > 0 {
            warn!("{} order dates could not be parsed and were left blank", prep.bad_dates);
        }
        if prep.bad_sales > 0 {
            warn!("{} sales values could not be parsed and were left blank", prep.bad_sales);
        }
        if !groups.is_empty() {
            self.derive_product_groups(groups)?;
            debug!("applied {} product groups", groups.len());
        }
        Ok(prep)
    }

    /// Returns the typed view of every row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingColumns`] if a required column is absent.
    pub fn transactions(&self) -> Result<Vec<Transaction>, Error> {
        self.validate()?;
        let col = |name| self.column(name).unwrap_or_default();
        let (date, category, sub_category, product, manager, sales, order_id, customer_id) = (
            col(ORDER_DATE),
            col(CATEGORY),
            col(SUB_CATEGORY),
            col(PRODUCT_NAME),
            col(MANAGER),
            col(SALES),
            col(ORDER_ID),
            col(CUSTOMER_ID),
        );
        let group = self.column(PRODUCT_GROUP);
        Ok(self
            .rows
            .iter()
            .map(|row| {
                let order_date = row[date].to_date();
                Transaction {
                    order_date,
                    year: order_date.map(|d| d.year()),
                    month: order_date.map(|d| d.month()),
                    category: row[category].key(),
                    sub_category: row[sub_category].key(),
                    product: row[product].key(),
                    product_group: group.and_then(|g| row[g].key()),
                    manager: row[manager].key().unwrap_or_default(),
                    sales: row[sales].to_money().unwrap_or_default(),
                    order_id: row[order_id].key(),
                    customer_id: row[customer_id].key(),
                }
            })
            .collect())
    }
}
