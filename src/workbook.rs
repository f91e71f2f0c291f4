//! Renders a [`Report`] and its [`Dataset`] as an Excel workbook.
//!
//! Every aggregate is written as a live formula over the raw data sheet,
//! with the computed value stored as the formula's cached result, so the
//! workbook reads correctly before Excel recalculates and keeps tracking
//! the data after it is edited.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rust_xlsxwriter::{
    Chart, ChartDataLabel, ChartType, ConditionalFormatTop, ConditionalFormatTopRule, Format,
    FormatAlign, Formula, Workbook, Worksheet,
};

use std::path::Path;

use crate::{
    cells::{self, DataColumn},
    config::Config,
    dataset::{Cell, Dataset, CATEGORY, MANAGER, ORDER_ID, SALES, YEAR},
    findings,
    report::Report,
};

pub const DATA_SHEET: &str = "Data";
pub const MANAGER_SHEET: &str = "Manager Performance";
pub const CATEGORY_SHEET: &str = "Category Trends";
pub const PRODUCTS_SHEET: &str = "Top Products";
pub const DASHBOARD_SHEET: &str = "Dashboard";
pub const FINDINGS_SHEET: &str = "Findings & Recommendations";

/// Sheet names, in workbook order.
pub const SHEET_NAMES: [&str; 6] = [
    DATA_SHEET,
    MANAGER_SHEET,
    CATEGORY_SHEET,
    PRODUCTS_SHEET,
    DASHBOARD_SHEET,
    FINDINGS_SHEET,
];

/// First row of the sales-by-year table on the dashboard, below the charts.
const YEAR_TABLE_ROW: u32 = 22;

/// Number of managers (and products) coloured by the top/bottom rules.
const TOP_BOTTOM: u16 = 3;

struct Formats {
    header: Format,
    money: Format,
    percent: Format,
    date: Format,
    highlight: Format,
    highlight_money: Format,
    top: Format,
    bottom: Format,
    kpi_title: Format,
    kpi_value: Format,
    kpi_money: Format,
    section: Format,
}

impl Formats {
    fn new(currency: &str) -> Self {
        let money = format!("\"{}\"#,##0.00", currency.replace('"', ""));
        Self {
            header: Format::new().set_bold(),
            money: Format::new().set_num_format(&money),
            percent: Format::new().set_num_format("0.00%"),
            date: Format::new().set_num_format("yyyy-mm-dd"),
            highlight: Format::new().set_bold().set_background_color(0xFFF2CC),
            highlight_money: Format::new()
                .set_bold()
                .set_background_color(0xFFF2CC)
                .set_num_format(&money),
            top: Format::new()
                .set_background_color(0xC6EFCE)
                .set_font_color(0x006100),
            bottom: Format::new()
                .set_background_color(0xFFC7CE)
                .set_font_color(0x9C0006),
            kpi_title: Format::new().set_bold().set_font_size(11),
            kpi_value: Format::new()
                .set_bold()
                .set_font_size(14)
                .set_align(FormatAlign::Center),
            kpi_money: Format::new()
                .set_bold()
                .set_font_size(14)
                .set_align(FormatAlign::Center)
                .set_num_format(&money),
            section: Format::new().set_bold().set_font_size(12),
        }
    }
}

/// The raw-data columns the generated formulas refer to.
struct Columns {
    sales: DataColumn,
    manager: DataColumn,
    category: DataColumn,
    year: DataColumn,
    product: DataColumn,
    order_id: DataColumn,
}

impl Columns {
    fn new(dataset: &Dataset, product_column: &str) -> Result<Self> {
        let last_row = u32::try_from(dataset.len()).context("too many rows for a worksheet")?;
        let column = |name: &str| -> Result<DataColumn> {
            let col = dataset
                .column(name)
                .with_context(|| format!("column '{name}' missing from prepared data"))?;
            Ok(DataColumn::new(DATA_SHEET, col, last_row))
        };
        Ok(Self {
            sales: column(SALES)?,
            manager: column(MANAGER)?,
            category: column(CATEGORY)?,
            year: column(YEAR)?,
            product: column(product_column)?,
            order_id: column(ORDER_ID)?,
        })
    }
}

/// Writes the report workbook.
///
/// The dataset must have been [prepared](Dataset::prepare) and the report
/// computed from it with the same config.
pub struct ReportWriter<'a> {
    dataset: &'a Dataset,
    report: &'a Report,
    config: &'a Config,
    formats: Formats,
    columns: Columns,
}

impl<'a> ReportWriter<'a> {
    /// Creates a writer for `report`, computed from `dataset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the dataset lacks a column the formulas need.
    pub fn new(dataset: &'a Dataset, report: &'a Report, config: &'a Config) -> Result<Self> {
        Ok(Self {
            dataset,
            report,
            config,
            formats: Formats::new(&config.currency),
            columns: Columns::new(dataset, report.product_column)?,
        })
    }

    /// Builds the complete workbook in memory.
    ///
    /// # Errors
    ///
    /// Returns any errors from the worksheet writer.
    pub fn workbook(&self) -> Result<Workbook> {
        let mut workbook = Workbook::new();
        workbook.push_worksheet(self.data_sheet()?);
        workbook.push_worksheet(self.manager_sheet()?);
        workbook.push_worksheet(self.category_sheet()?);
        workbook.push_worksheet(self.products_sheet()?);
        workbook.push_worksheet(self.dashboard_sheet()?);
        workbook.push_worksheet(self.findings_sheet()?);
        Ok(workbook)
    }

    /// Builds the workbook and writes it to `path`.
    ///
    /// # Errors
    ///
    /// Returns any errors from building or saving the workbook.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut workbook = self.workbook()?;
        workbook
            .save(path)
            .with_context(|| format!("writing {}", path.display()))?;
        info!("wrote {}", path.display());
        Ok(())
    }

    fn data_sheet(&self) -> Result<Worksheet> {
        let mut sheet = Worksheet::new();
        sheet.set_name(DATA_SHEET)?;
        for (c, header) in self.dataset.headers().iter().enumerate() {
            let col = col(c)?;
            sheet.write_string_with_format(0, col, header, &self.formats.header)?;
            #[allow(clippy::cast_precision_loss)]
            sheet.set_column_width(col, (header.chars().count().max(10) + 2) as f64)?;
        }
        for (r, values) in self.dataset.rows().iter().enumerate() {
            let row = row(r + 1)?;
            for (c, value) in values.iter().enumerate() {
                let col = col(c)?;
                match value {
                    Cell::Empty => {}
                    Cell::Number(n) => {
                        sheet.write_number(row, col, *n)?;
                    }
                    Cell::Text(s) => {
                        sheet.write_string(row, col, s)?;
                    }
                    Cell::Date(d) => {
                        sheet.write_datetime_with_format(row, col, d, &self.formats.date)?;
                    }
                }
            }
        }
        sheet.set_freeze_panes(1, 0)?;
        debug!(
            "{DATA_SHEET}: {} rows x {} columns",
            self.dataset.len(),
            self.dataset.headers().len()
        );
        Ok(sheet)
    }

    fn manager_sheet(&self) -> Result<Worksheet> {
        let mut sheet = Worksheet::new();
        sheet.set_name(MANAGER_SHEET)?;
        self.write_headers(&mut sheet, 0, &["Manager", "Sales (calc)", "Excel Formula", "Rank"])?;
        sheet.set_column_width(0, 30)?;
        sheet.set_column_width(1, 18)?;
        sheet.set_column_width(2, 60)?;
        sheet.set_column_width(3, 8)?;

        let managers = &self.report.managers;
        let last = row(managers.len())?;
        let highlight = self.config.highlight_manager.as_deref();
        for (i, manager) in managers.iter().enumerate() {
            let r = row(i + 1)?;
            let highlighted = !manager.name.is_empty()
                && highlight.is_some_and(|name| same_name(name, &manager.name));
            let money_format = if highlighted {
                sheet.write_string_with_format(r, 0, manager.label(), &self.formats.highlight)?;
                &self.formats.highlight_money
            } else {
                sheet.write_string(r, 0, manager.label())?;
                &self.formats.money
            };
            let sumif = cells::sumif(&self.columns.manager, &manager.name, &self.columns.sales);
            sheet.write_formula_with_format(
                r,
                1,
                cached(&sumif, manager.sales.to_f64()),
                money_format,
            )?;
            sheet.write_string(r, 2, &sumif)?;
            #[allow(clippy::cast_precision_loss)]
            sheet.write_formula(r, 3, cached(&cells::rank(r, 1, 1, last), manager.rank as f64))?;
        }
        if let Some(name) = highlight {
            if !managers.iter().any(|m| same_name(name, &m.name)) {
                warn!("manager '{name}' not found; nothing highlighted");
            }
        }

        if !managers.is_empty() {
            let top = ConditionalFormatTop::new()
                .set_rule(ConditionalFormatTopRule::Top(TOP_BOTTOM))
                .set_format(&self.formats.top);
            let bottom = ConditionalFormatTop::new()
                .set_rule(ConditionalFormatTopRule::Bottom(TOP_BOTTOM))
                .set_format(&self.formats.bottom);
            sheet.add_conditional_format(1, 1, last, 1, &top)?;
            sheet.add_conditional_format(1, 1, last, 1, &bottom)?;

            let mut chart = self.manager_chart();
            chart.title().set_name("Managerial Performance — Sales");
            chart.x_axis().set_name("Manager");
            chart.y_axis().set_name("Sales");
            chart.set_width(720).set_height(360);
            sheet.insert_chart(1, 5, &chart)?;
        }
        debug!("{MANAGER_SHEET}: {} managers", managers.len());
        Ok(sheet)
    }

    /// Column chart of sales by manager, reading the manager sheet.
    fn manager_chart(&self) -> Chart {
        let last = u32::try_from(self.report.managers.len()).unwrap_or(u32::MAX);
        let mut chart = Chart::new(ChartType::Column);
        chart
            .add_series()
            .set_name("Sales by Manager")
            .set_categories(cells::sheet_range(MANAGER_SHEET, &cells::absolute_range(1, 0, last, 0)).as_str())
            .set_values(cells::sheet_range(MANAGER_SHEET, &cells::absolute_range(1, 1, last, 1)).as_str());
        chart
    }

    /// Pie chart of the top products, reading the products sheet.
    fn products_chart(&self, name: &str) -> Chart {
        let last = u32::try_from(self.report.top_products.len()).unwrap_or(u32::MAX);
        let mut chart = Chart::new(ChartType::Pie);
        chart
            .add_series()
            .set_name(name)
            .set_categories(cells::sheet_range(PRODUCTS_SHEET, &cells::absolute_range(1, 0, last, 0)).as_str())
            .set_values(cells::sheet_range(PRODUCTS_SHEET, &cells::absolute_range(1, 1, last, 1)).as_str())
            .set_data_label(ChartDataLabel::new().show_percentage());
        chart
    }

    fn category_sheet(&self) -> Result<Worksheet> {
        let mut sheet = Worksheet::new();
        sheet.set_name(CATEGORY_SHEET)?;
        let report = self.report;
        let years = &report.years;

        self.write_year_header(&mut sheet, 0, "Category \\ Year")?;
        for (i, category) in report.categories.iter().enumerate() {
            self.write_category_row(&mut sheet, row(i + 1)?, i)?;
            debug!("{CATEGORY_SHEET}: {} in row {}", category.name, i + 2);
        }
        sheet.set_column_width(0, 30)?;
        for j in 1..=years.len() {
            sheet.set_column_width(col(j)?, 15)?;
        }

        // Chart table: the top categories again, below the full table.
        let chart_header = row(report.categories.len() + 2)?;
        if years.is_empty() || report.top_categories.is_empty() {
            return Ok(sheet);
        }
        self.write_year_header(&mut sheet, chart_header, "Category")?;
        let mut chart = Chart::new(ChartType::Line);
        let year_range = cells::sheet_range(
            CATEGORY_SHEET,
            &cells::absolute_range(chart_header, 1, chart_header, years.len()),
        );
        for (k, &index) in report.top_categories.iter().enumerate() {
            let r = chart_header + 1 + row(k)?;
            self.write_category_row(&mut sheet, r, index)?;
            chart
                .add_series()
                .set_name(format!("={}", cells::sheet_range(CATEGORY_SHEET, &cells::absolute_cell(r, 0))).as_str())
                .set_categories(year_range.as_str())
                .set_values(cells::sheet_range(CATEGORY_SHEET, &cells::absolute_range(r, 1, r, years.len())).as_str());
        }
        chart.title().set_name("Top Categories — Yearly Trend");
        chart.x_axis().set_name("Year");
        chart.y_axis().set_name("Sales");
        chart.set_width(720).set_height(360);
        sheet.insert_chart(1, col(years.len() + 3)?, &chart)?;
        Ok(sheet)
    }

    fn write_year_header(&self, sheet: &mut Worksheet, r: u32, label: &str) -> Result<()> {
        sheet.write_string_with_format(r, 0, label, &self.formats.header)?;
        for (j, year) in self.report.years.iter().enumerate() {
            sheet.write_number_with_format(r, col(j + 1)?, f64::from(*year), &self.formats.header)?;
        }
        Ok(())
    }

    /// Writes category `index` in row `r`: its name, then one SUMIFS per year.
    fn write_category_row(&self, sheet: &mut Worksheet, r: u32, index: usize) -> Result<()> {
        let category = &self.report.categories[index];
        sheet.write_string(r, 0, &category.name)?;
        for (j, (year, sales)) in self.report.years.iter().zip(&category.by_year).enumerate() {
            let formula = cells::sumifs(
                &self.columns.sales,
                &[
                    (&self.columns.category, cells::criterion(&category.name)),
                    (&self.columns.year, year.to_string()),
                ],
            );
            sheet.write_formula_with_format(
                r,
                col(j + 1)?,
                cached(&formula, sales.to_f64()),
                &self.formats.money,
            )?;
        }
        Ok(())
    }

    fn products_sheet(&self) -> Result<Worksheet> {
        let mut sheet = Worksheet::new();
        sheet.set_name(PRODUCTS_SHEET)?;
        let products = &self.report.top_products;
        self.write_headers(
            &mut sheet,
            0,
            &[self.report.product_column, "Sales (calc)", "% of Total"],
        )?;
        sheet.set_column_width(0, 60)?;
        sheet.set_column_width(1, 18)?;
        sheet.set_column_width(2, 12)?;

        let last = row(products.len())?;
        let subtotal = cells::absolute_range(1, 1, last, 1);
        for (i, product) in products.iter().enumerate() {
            let r = row(i + 1)?;
            sheet.write_string(r, 0, &product.name)?;
            let sumif = cells::sumif(&self.columns.product, &product.name, &self.columns.sales);
            sheet.write_formula_with_format(
                r,
                1,
                cached(&sumif, product.sales.to_f64()),
                &self.formats.money,
            )?;
            let share = format!("=IFERROR({}/SUM({subtotal}),0)", cells::cell(r, 1));
            sheet.write_formula_with_format(r, 2, cached(&share, product.share), &self.formats.percent)?;
        }

        if !products.is_empty() {
            let mut chart = self.products_chart("Top Products Share");
            chart.title().set_name("Top Products (Cumulative Share)");
            chart.set_width(624).set_height(374);
            sheet.insert_chart(1, 4, &chart)?;
        }
        debug!("{PRODUCTS_SHEET}: {} products", products.len());
        Ok(sheet)
    }

    fn dashboard_sheet(&self) -> Result<Worksheet> {
        let mut sheet = Worksheet::new();
        sheet.set_name(DASHBOARD_SHEET)?;
        let report = self.report;
        let f = &self.formats;
        for c in 0..=4 {
            sheet.set_column_width(c, 22)?;
        }

        sheet.write_string_with_format(0, 0, "KPI", &f.kpi_title)?;
        sheet.write_string_with_format(0, 1, "Value", &f.kpi_title)?;

        sheet.write_string(1, 0, findings::total_sales_label(report))?;
        sheet.write_formula_with_format(
            1,
            1,
            cached(&cells::sum(&self.columns.sales), report.total_sales.to_f64()),
            &f.kpi_money,
        )?;

        #[allow(clippy::cast_precision_loss)]
        {
            sheet.write_string(2, 0, "Total Orders")?;
            sheet.write_formula_with_format(
                2,
                1,
                cached(
                    &cells::distinct_count(&self.columns.order_id),
                    report.total_orders as f64,
                ),
                &f.kpi_value,
            )?;

            sheet.write_string(3, 0, "Total Managers")?;
            sheet.write_formula_with_format(
                3,
                1,
                cached(
                    &cells::distinct_count(&self.columns.manager),
                    report.distinct_managers as f64,
                ),
                &f.kpi_value,
            )?;
        }

        sheet.write_string(4, 0, "Average Order Value")?;
        let aov = format!("=IFERROR({}/{},0)", cells::cell(1, 1), cells::cell(2, 1));
        sheet.write_formula_with_format(
            4,
            1,
            cached(&aov, report.average_order_value.to_f64()),
            &f.kpi_money,
        )?;

        if !report.managers.is_empty() {
            let mut chart = self.manager_chart();
            chart.title().set_name("Managerial Performance");
            chart.set_width(480).set_height(280);
            sheet.insert_chart(6, 0, &chart)?;
        }
        if !report.top_products.is_empty() {
            let mut chart = self.products_chart("Top Products");
            chart.set_width(400).set_height(300);
            sheet.insert_chart(6, 4, &chart)?;
        }

        self.write_headers(&mut sheet, YEAR_TABLE_ROW, &["Year", "Sales"])?;
        for (i, (year, sales)) in report.years.iter().zip(&report.sales_by_year).enumerate() {
            let r = YEAR_TABLE_ROW + 1 + row(i)?;
            sheet.write_number(r, 0, f64::from(*year))?;
            let formula = cells::sumifs(
                &self.columns.sales,
                &[(&self.columns.year, year.to_string())],
            );
            sheet.write_formula_with_format(r, 1, cached(&formula, sales.to_f64()), &f.money)?;
        }
        if !report.years.is_empty() {
            let last = YEAR_TABLE_ROW + row(report.years.len())?;
            let mut chart = Chart::new(ChartType::Line);
            chart
                .add_series()
                .set_name("Sales by Year")
                .set_categories(cells::sheet_range(DASHBOARD_SHEET, &cells::absolute_range(YEAR_TABLE_ROW + 1, 0, last, 0)).as_str())
                .set_values(cells::sheet_range(DASHBOARD_SHEET, &cells::absolute_range(YEAR_TABLE_ROW + 1, 1, last, 1)).as_str());
            chart.title().set_name("Sales by Year");
            chart.set_width(600).set_height(320);
            sheet.insert_chart(YEAR_TABLE_ROW, 3, &chart)?;
        }
        Ok(sheet)
    }

    fn findings_sheet(&self) -> Result<Worksheet> {
        let mut sheet = Worksheet::new();
        sheet.set_name(FINDINGS_SHEET)?;
        sheet.set_column_width(0, 120)?;
        for (i, line) in findings::findings(self.report, self.config).iter().enumerate() {
            let r = row(i)?;
            if line.ends_with(':') && !line.starts_with('-') {
                sheet.write_string_with_format(r, 0, line, &self.formats.section)?;
            } else if !line.is_empty() {
                sheet.write_string(r, 0, line)?;
            }
        }
        Ok(sheet)
    }

    fn write_headers(&self, sheet: &mut Worksheet, r: u32, headers: &[&str]) -> Result<()> {
        for (c, header) in headers.iter().enumerate() {
            sheet.write_string_with_format(r, col(c)?, *header, &self.formats.header)?;
        }
        Ok(())
    }
}

/// Compares names the way worksheet criteria do, ignoring case.
fn same_name(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// A formula with its computed value stored as the cached result.
fn cached(formula: &str, value: f64) -> Formula {
    Formula::new(formula).set_result(value.to_string())
}

fn row(index: usize) -> Result<u32> {
    u32::try_from(index).context("row index out of range")
}

fn col(index: usize) -> Result<u16> {
    u16::try_from(index).context("column index out of range")
}

#[cfg(test)]
mod tests {
    use calamine::{open_workbook_auto, Data, Reader};
    use tempfile::TempDir;

    use super::*;
    use crate::groups::Groups;

    fn write(path: &str, config: &Config) -> (TempDir, std::path::PathBuf) {
        let mut data = Dataset::from_path(path, None).unwrap();
        data.prepare(&config.product_groups()).unwrap();
        let report = Report::new(&data, config).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("report.xlsx");
        ReportWriter::new(&data, &report, config)
            .unwrap()
            .save(&out)
            .unwrap();
        (dir, out)
    }

    fn number(cell: Option<&Data>) -> f64 {
        match cell {
            Some(Data::Float(f)) => *f,
            #[allow(clippy::cast_precision_loss)]
            Some(Data::Int(i)) => *i as f64,
            Some(Data::String(s)) => s.parse().unwrap(),
            other => panic!("expected a number, got {other:?}"),
        }
    }

    #[test]
    fn save_fn_writes_sheets_in_order() {
        let (_dir, out) = write("testdata/toy.csv", &Config::default());
        let workbook = open_workbook_auto(&out).unwrap();
        assert_eq!(workbook.sheet_names(), SHEET_NAMES.map(str::to_string).to_vec());
    }

    #[test]
    fn save_fn_copies_data_with_derived_columns() {
        let (_dir, out) = write("testdata/toy.csv", &Config::default());
        let mut workbook = open_workbook_auto(&out).unwrap();
        let data = workbook.worksheet_range(DATA_SHEET).unwrap();
        assert_eq!(
            data.get_value((0, 8)),
            Some(&Data::String("Year".to_string()))
        );
        assert_eq!(
            data.get_value((0, 9)),
            Some(&Data::String("Month".to_string()))
        );
        assert_eq!(number(data.get_value((2, 5))), 200.0);
        assert_eq!(number(data.get_value((2, 8))), 2014.0);
    }

    #[test]
    fn save_fn_writes_manager_formulas_with_cached_values() {
        let (_dir, out) = write("testdata/toy.csv", &Config::default());
        let mut workbook = open_workbook_auto(&out).unwrap();
        let values = workbook.worksheet_range(MANAGER_SHEET).unwrap();
        assert_eq!(values.get_value((1, 0)), Some(&Data::String("A".to_string())));
        assert_eq!(values.get_value((2, 0)), Some(&Data::String("B".to_string())));
        assert_eq!(number(values.get_value((1, 1))), 100.0);
        assert_eq!(number(values.get_value((2, 3))), 1.0);
        assert_eq!(number(values.get_value((1, 3))), 2.0);
        assert_eq!(
            values.get_value((1, 2)),
            Some(&Data::String(r#"=SUMIF(Data!$E:$E,"=A",Data!$F:$F)"#.to_string()))
        );

        let formulas = workbook.worksheet_formula(MANAGER_SHEET).unwrap();
        let sumif = formulas.get_value((1, 1)).unwrap();
        assert!(sumif.contains(r#"SUMIF(Data!$E:$E,"=A",Data!$F:$F)"#), "{sumif}");
        let rank = formulas.get_value((2, 3)).unwrap();
        assert!(rank.contains("RANK(B3,$B$2:$B$3,0)"), "{rank}");
    }

    #[test]
    fn save_fn_writes_dashboard_kpis() {
        let (_dir, out) = write("testdata/toy.csv", &Config::default());
        let mut workbook = open_workbook_auto(&out).unwrap();
        let values = workbook.worksheet_range(DASHBOARD_SHEET).unwrap();
        assert_eq!(
            values.get_value((1, 0)),
            Some(&Data::String("Total Sales (2014)".to_string()))
        );
        assert_eq!(number(values.get_value((1, 1))), 300.0);
        assert_eq!(number(values.get_value((2, 1))), 2.0);
        assert_eq!(number(values.get_value((4, 1))), 150.0);
        let formulas = workbook.worksheet_formula(DASHBOARD_SHEET).unwrap();
        assert!(formulas
            .get_value((4, 1))
            .unwrap()
            .contains("IFERROR(B2/B3,0)"));
    }

    #[test]
    fn save_fn_pivots_categories_by_year() {
        let (_dir, out) = write("testdata/orders.csv", &Config::default());
        let mut workbook = open_workbook_auto(&out).unwrap();
        let values = workbook.worksheet_range(CATEGORY_SHEET).unwrap();
        assert_eq!(number(values.get_value((0, 1))), 2011.0);
        assert_eq!(number(values.get_value((0, 4))), 2014.0);
        assert_eq!(
            values.get_value((1, 0)),
            Some(&Data::String("Furniture".to_string()))
        );
        assert!((number(values.get_value((3, 4))) - 1083.99).abs() < 1e-9);
        let formulas = workbook.worksheet_formula(CATEGORY_SHEET).unwrap();
        let cell = formulas.get_value((3, 4)).unwrap();
        assert!(
            cell.contains(r#"SUMIFS(Data!$J:$J,Data!$F:$F,"=Technology",Data!$K:$K,2014)"#),
            "{cell}"
        );
    }

    #[test]
    fn save_fn_escapes_product_names_in_criteria() {
        let (_dir, out) = write("testdata/orders.csv", &Config::default());
        let mut workbook = open_workbook_auto(&out).unwrap();
        let values = workbook.worksheet_range(PRODUCTS_SHEET).unwrap();
        let row = (1..=10)
            .find(|r| {
                values.get_value((*r, 0))
                    == Some(&Data::String("Logitech \"Wireless\" Mouse*".to_string()))
            })
            .unwrap();
        let formulas = workbook.worksheet_formula(PRODUCTS_SHEET).unwrap();
        let cell = formulas.get_value((row, 1)).unwrap();
        assert!(cell.contains(r#""=Logitech ""Wireless"" Mouse~*""#), "{cell}");
    }

    #[test]
    fn save_fn_uses_product_group_column_when_grouped() {
        let mut config = Config::default();
        config.read_groups("testdata/groups").unwrap();
        let (_dir, out) = write("testdata/orders.csv", &config);
        let mut workbook = open_workbook_auto(&out).unwrap();
        let values = workbook.worksheet_range(PRODUCTS_SHEET).unwrap();
        assert_eq!(
            values.get_value((0, 0)),
            Some(&Data::String("Product Group".to_string()))
        );
        assert_eq!(
            values.get_value((1, 0)),
            Some(&Data::String("Phones".to_string()))
        );
    }

    #[test]
    fn save_fn_writes_findings_lines() {
        let (_dir, out) = write("testdata/toy.csv", &Config::default());
        let mut workbook = open_workbook_auto(&out).unwrap();
        let values = workbook.worksheet_range(FINDINGS_SHEET).unwrap();
        assert_eq!(
            values.get_value((0, 0)),
            Some(&Data::String("Executive Summary:".to_string()))
        );
    }

    #[test]
    fn workbook_fn_handles_empty_dataset() {
        let mut data = Dataset::new(
            crate::dataset::REQUIRED_COLUMNS.map(str::to_string).to_vec(),
            Vec::new(),
        );
        data.prepare(&Groups::default()).unwrap();
        let config = Config::default();
        let report = Report::new(&data, &config).unwrap();
        let dir = tempfile::tempdir().unwrap();
        ReportWriter::new(&data, &report, &config)
            .unwrap()
            .save(dir.path().join("empty.xlsx"))
            .unwrap();
    }
}
