use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};

/// A single spreadsheet cell. `Empty` means the cell was absent or blank in
/// the source file; an explicit empty string (`Text("")`) is a distinct state
/// so that downstream fill policies can mark a column as "present but blank".
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Cell::Date(d) => Some(*d),
            Cell::DateTime(dt) => Some(dt.date()),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => write!(f, "{s}"),
            Cell::Int(i) => write!(f, "{i}"),
            // Integral floats render without the trailing ".0" so that a
            // numeric identifier column compares equal to its text form.
            Cell::Float(v) if v.fract() == 0.0 && v.abs() < i64::MAX as f64 => {
                write!(f, "{}", *v as i64)
            }
            Cell::Float(v) => write!(f, "{v}"),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Cell::DateTime(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// One data row. `index` is 0-based over the data rows; the spreadsheet row
/// number shown to users is `index + 2` (row 1 is the header).
#[derive(Debug, Clone)]
pub struct Row {
    pub index: usize,
    pub cells: Vec<Cell>,
}

impl Row {
    /// 1-based spreadsheet row number, accounting for the header row.
    pub fn sheet_row_number(&self) -> usize {
        self.index + 2
    }
}

/// An in-memory tabular upload: ordered headers and ordered data rows.
#[derive(Debug, Clone)]
pub struct Sheet {
    headers: Vec<String>,
    rows: Vec<Row>,
}

impl Sheet {
    pub fn new(headers: Vec<String>, rows: Vec<Row>) -> Self {
        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Row] {
        &mut self.rows
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Renames a header in place. Returns false when `from` is not present.
    pub fn rename_header(&mut self, from: &str, to: &str) -> bool {
        match self.column_index(from) {
            Some(idx) => {
                self.headers[idx] = to.to_string();
                true
            }
            None => false,
        }
    }

    pub fn cell<'a>(&self, row: &'a Row, column: &str) -> Option<&'a Cell> {
        self.column_index(column).and_then(|idx| row.cells.get(idx))
    }

    /// Stringified (header, value) pairs for one row, in column order.
    pub fn row_values(&self, row: &Row) -> Vec<(String, String)> {
        self.headers
            .iter()
            .zip(row.cells.iter())
            .map(|(h, c)| (h.clone(), c.to_string()))
            .collect()
    }
}
