//! A1-style cell references and the formula text built from them.
//!
//! Rows and columns are 0-based in every function signature, matching the
//! worksheet writer; they become 1-based only in the generated text.

/// Returns the column letters for 0-based column `index` (`0` is `A`, `26`
/// is `AA`).
///
/// # Examples
///
/// ```
/// # use salesbook::cells::column_name;
/// assert_eq!(column_name(0), "A");
/// assert_eq!(column_name(25), "Z");
/// assert_eq!(column_name(26), "AA");
/// assert_eq!(column_name(701), "ZZ");
/// assert_eq!(column_name(702), "AAA");
/// ```
#[must_use]
pub fn column_name(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        n -= 1;
        #[allow(clippy::cast_possible_truncation)]
        letters.push((b'A' + (n % 26) as u8) as char);
        n /= 26;
    }
    letters.iter().rev().collect()
}

/// Relative reference, e.g. `B2`.
#[must_use]
pub fn cell(row: u32, col: usize) -> String {
    format!("{}{}", column_name(col), row + 1)
}

/// Absolute reference, e.g. `$B$2`.
#[must_use]
pub fn absolute_cell(row: u32, col: usize) -> String {
    format!("${}${}", column_name(col), row + 1)
}

/// Absolute rectangular range, e.g. `$B$2:$B$9`.
#[must_use]
pub fn absolute_range(first_row: u32, first_col: usize, last_row: u32, last_col: usize) -> String {
    format!(
        "{}:{}",
        absolute_cell(first_row, first_col),
        absolute_cell(last_row, last_col)
    )
}

/// Absolute whole-column range, e.g. `$F:$F`.
#[must_use]
pub fn whole_column(col: usize) -> String {
    let name = column_name(col);
    format!("${name}:${name}")
}

/// Quotes a sheet name for use in a reference when it needs it.
///
/// ```
/// # use salesbook::cells::quote_sheet;
/// assert_eq!(quote_sheet("Data"), "Data");
/// assert_eq!(quote_sheet("Top Products"), "'Top Products'");
/// assert_eq!(quote_sheet("Bob's"), "'Bob''s'");
/// ```
#[must_use]
pub fn quote_sheet(name: &str) -> String {
    let plain = !name.is_empty()
        && !name.starts_with(|c: char| c.is_ascii_digit())
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        name.to_string()
    } else {
        format!("'{}'", name.replace('\'', "''"))
    }
}

/// Qualifies `range` with a sheet name: `'Top Products'!$A$2:$A$11`.
#[must_use]
pub fn sheet_range(sheet: &str, range: &str) -> String {
    format!("{}!{range}", quote_sheet(sheet))
}

/// A formula string literal, with embedded quotes doubled.
#[must_use]
pub fn string_literal(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// An exact-match criterion for `SUMIF`/`SUMIFS`/`COUNTIF`.
///
/// Criteria are otherwise read as patterns: a leading `<`, `>` or `=` is a
/// comparison and `*`, `?` are wildcards. The `=` prefix and `~` escapes make
/// the value match only itself. A blank value matches blank cells.
///
/// ```
/// # use salesbook::cells::criterion;
/// assert_eq!(criterion("Chris"), r#""=Chris""#);
/// assert_eq!(criterion("Mouse*"), r#""=Mouse~*""#);
/// assert_eq!(criterion(""), r#""=""#);
/// ```
#[must_use]
pub fn criterion(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 1);
    escaped.push('=');
    for ch in value.chars() {
        if matches!(ch, '*' | '?' | '~') {
            escaped.push('~');
        }
        escaped.push(ch);
    }
    string_literal(&escaped)
}

/// A column of the raw data sheet, as used by the formula builders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataColumn {
    sheet: String,
    col: usize,
    last_row: u32,
}

impl DataColumn {
    /// Column `col` of `sheet`, whose data occupies rows `1..=last_row`
    /// under a header in row 0.
    #[must_use]
    pub fn new(sheet: &str, col: usize, last_row: u32) -> Self {
        Self {
            sheet: sheet.to_string(),
            col,
            last_row,
        }
    }

    /// Whole-column reference: `Data!$F:$F`.
    #[must_use]
    pub fn whole(&self) -> String {
        sheet_range(&self.sheet, &whole_column(self.col))
    }

    /// Reference to the data rows only: `Data!$F$2:$F$101`.
    #[must_use]
    pub fn rows(&self) -> Option<String> {
        (self.last_row >= 1).then(|| {
            sheet_range(
                &self.sheet,
                &absolute_range(1, self.col, self.last_row, self.col),
            )
        })
    }
}

/// A criterion of a `SUMIFS`: a column and the condition text.
pub type Condition<'a> = (&'a DataColumn, String);

/// `=SUM(column)`.
#[must_use]
pub fn sum(column: &DataColumn) -> String {
    format!("=SUM({})", column.whole())
}

/// `=SUMIF(key_column, "=key", sum_column)`.
#[must_use]
pub fn sumif(key_column: &DataColumn, key: &str, sum_column: &DataColumn) -> String {
    format!(
        "=SUMIF({},{},{})",
        key_column.whole(),
        criterion(key),
        sum_column.whole()
    )
}

/// `=SUMIFS(sum_column, column1, condition1, ...)`.
#[must_use]
pub fn sumifs(sum_column: &DataColumn, conditions: &[Condition<'_>]) -> String {
    let mut formula = format!("=SUMIFS({}", sum_column.whole());
    for (column, condition) in conditions {
        formula.push(',');
        formula.push_str(&column.whole());
        formula.push(',');
        formula.push_str(condition);
    }
    formula.push(')');
    formula
}

/// Counts the distinct non-blank values of a column over its data rows.
/// With no data rows the formula is `=0`.
///
/// `COUNTIF` runs once per row, so recalculation time grows with the square
/// of the row count; tens of thousands of rows take Excel several seconds.
#[must_use]
pub fn distinct_count(column: &DataColumn) -> String {
    match column.rows() {
        Some(range) => format!("=SUMPRODUCT(({range}<>\"\")/COUNTIF({range},{range}&\"\"))"),
        None => "=0".to_string(),
    }
}

/// `=RANK(B2,$B$2:$B$9,0)`: rank 1 is the highest value.
#[must_use]
pub fn rank(row: u32, col: usize, first_row: u32, last_row: u32) -> String {
    format!(
        "=RANK({},{},0)",
        cell(row, col),
        absolute_range(first_row, col, last_row, col)
    )
}
