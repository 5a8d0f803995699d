use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use crate::errors::{ParseError, ReaderAttempt};
use crate::model::{Cell, Row, Sheet};

/// Parses an uploaded tabular payload, trying each known format in order:
/// first a spreadsheet workbook (xlsx/xls/ods), then delimited UTF-8 text.
/// When nothing matches, the per-reader failure messages are preserved so the
/// caller can report why the file was rejected.
pub fn parse_sheet(contents: &[u8]) -> Result<Sheet, ParseError> {
    let mut attempts = Vec::new();

    match read_workbook(contents) {
        Ok(sheet) => return Ok(sheet),
        Err(err) => attempts.push(ReaderAttempt::new("workbook", err.to_string())),
    }

    match read_delimited(contents) {
        Ok(sheet) => return Ok(sheet),
        Err(err) => attempts.push(ReaderAttempt::new("delimited", err.to_string())),
    }

    Err(ParseError::Malformed { attempts })
}

fn read_workbook(contents: &[u8]) -> Result<Sheet, ParseError> {
    let cursor = Cursor::new(contents.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor).map_err(|err| {
        ParseError::FormatMismatch {
            reader: "workbook",
            reason: err.to_string(),
        }
    })?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(ParseError::MissingHeader)?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|err| ParseError::FormatMismatch {
            reader: "workbook",
            reason: format!("worksheet '{sheet_name}' unreadable: {err}"),
        })?;

    let mut row_iter = range.rows();
    let header_row = row_iter.next().ok_or(ParseError::MissingHeader)?;
    let headers = header_row
        .iter()
        .enumerate()
        .map(|(idx, cell)| header_name(cell, idx))
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for raw in row_iter {
        let mut cells: Vec<Cell> = raw.iter().map(convert_cell).collect();
        cells.resize(headers.len(), Cell::Empty);
        if cells.iter().all(Cell::is_empty) {
            // Excel used-ranges often trail off into blank rows; those are
            // not data and would otherwise flood the completeness report.
            continue;
        }
        rows.push(Row {
            index: rows.len(),
            cells,
        });
    }

    Ok(Sheet::new(headers, rows))
}

fn header_name(cell: &Data, idx: usize) -> String {
    let name = match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Empty => String::new(),
        other => convert_cell(other).to_string(),
    };
    if name.is_empty() {
        format!("Columna{}", idx + 1)
    } else {
        name
    }
}

fn convert_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(s) if s.trim().is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Int(i) => Cell::Int(*i),
        Data::Float(f) => Cell::Float(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) if naive.time() == chrono::NaiveTime::MIN => Cell::Date(naive.date()),
            Some(naive) => Cell::DateTime(naive),
            None => Cell::Empty,
        },
        Data::DateTimeIso(s) => Cell::Text(s.clone()),
        Data::DurationIso(s) => Cell::Text(s.clone()),
        // Formula errors (#N/A and friends) read as missing values, the same
        // way a dataframe import would surface them.
        Data::Error(_) => Cell::Empty,
    }
}

fn read_delimited(contents: &[u8]) -> Result<Sheet, ParseError> {
    let text = std::str::from_utf8(contents).map_err(|_| ParseError::FormatMismatch {
        reader: "delimited",
        reason: "contents are not valid UTF-8 text".to_string(),
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .map_err(|err| ParseError::Csv {
            reader: "delimited",
            source: err,
        })?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.len() < 2 {
        // A single-column "CSV" is almost always an arbitrary text file; the
        // uploads this service receives are always multi-column.
        return Err(ParseError::FormatMismatch {
            reader: "delimited",
            reason: "no column delimiter found in header row".to_string(),
        });
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| ParseError::Csv {
            reader: "delimited",
            source: err,
        })?;
        let mut cells: Vec<Cell> = record
            .iter()
            .map(|field| {
                let trimmed = field.trim();
                if trimmed.is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(trimmed.to_string())
                }
            })
            .collect();
        cells.resize(headers.len(), Cell::Empty);
        if cells.iter().all(Cell::is_empty) {
            continue;
        }
        rows.push(Row {
            index: rows.len(),
            cells,
        });
    }

    Ok(Sheet::new(headers, rows))
}
