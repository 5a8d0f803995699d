use std::collections::BTreeMap;

use cargadero_sheet::Sheet;
use serde::Serialize;

/// Per-column missing-cell report. `empty_columns` preserves spreadsheet
/// column order; `empty_cells` maps column name to the 1-based spreadsheet
/// row numbers (first data row = 2) whose cell was missing.
///
/// A non-empty report is terminal: the batch is rejected before any write
/// transaction is opened, which is far cheaper to diagnose than a mid-load
/// constraint failure.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub empty_columns: Vec<String>,
    pub empty_cells: BTreeMap<String, Vec<usize>>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.empty_columns.is_empty()
    }
}

/// Scans every column of every row for missing values.
pub fn scan_empty_cells(sheet: &Sheet) -> ValidationReport {
    let mut report = ValidationReport::default();

    for (col_idx, header) in sheet.headers().iter().enumerate() {
        let mut missing_rows = Vec::new();
        for row in sheet.rows() {
            let empty = row.cells.get(col_idx).map(|c| c.is_empty()).unwrap_or(true);
            if empty {
                missing_rows.push(row.sheet_row_number());
            }
        }
        if !missing_rows.is_empty() {
            report.empty_columns.push(header.clone());
            report.empty_cells.insert(header.clone(), missing_rows);
        }
    }

    report
}
