use cargadero_sheet::{Cell, Sheet};
use chrono::NaiveDate;

use crate::error::{LoadError, Result};
use crate::reconcile::{reconcile_column, DEFAULT_SIMILARITY_THRESHOLD};

/// Values that mean "no appointment" when they show up in the Cita column.
/// Exported sheets use a plain dash, Excel escapes it as `'-`, and dataframe
/// round-trips leave behind the literal strings "nan" and "None".
const CITA_BLANK_TOKENS: [&str; 5] = ["", "-", "'-", "nan", "None"];

/// Date formats accepted for the Fecha column, day-first convention.
const FECHA_FORMATS: [&str; 5] = ["%d/%m/%Y", "%d-%m-%Y", "%d/%m/%y", "%d-%m-%y", "%Y-%m-%d"];

/// Pre-insert cleanup of a logistics sheet, mirroring the load contract:
/// - the appointment column is fuzzy-matched and renamed to "Cita";
/// - blank-marker Cita cells become explicit empty text, so the completeness
///   scan treats the column as present-but-blank rather than missing;
/// - Fecha cells are coerced to dates day-first; unparseable dates become
///   missing cells and therefore surface in the completeness report.
pub fn prepare_logistics_sheet(sheet: &mut Sheet) -> Option<String> {
    let matched = reconcile_column(sheet, "Cita", DEFAULT_SIMILARITY_THRESHOLD);

    if let Some(cita_idx) = sheet.column_index("Cita") {
        for row in sheet.rows_mut() {
            if let Some(cell) = row.cells.get_mut(cita_idx) {
                if is_cita_blank(cell) {
                    *cell = Cell::Text(String::new());
                }
            }
        }
    }

    if let Some(fecha_idx) = sheet.column_index("Fecha") {
        for row in sheet.rows_mut() {
            if let Some(cell) = row.cells.get_mut(fecha_idx) {
                *cell = match parse_fecha_dayfirst(cell) {
                    Some(date) => Cell::Date(date),
                    None => Cell::Empty,
                };
            }
        }
    }

    matched
}

fn is_cita_blank(cell: &Cell) -> bool {
    match cell {
        Cell::Empty => true,
        Cell::Text(s) => CITA_BLANK_TOKENS.contains(&s.trim()),
        _ => false,
    }
}

/// Day-first date coercion. Already-typed date cells pass through; text is
/// tried against the accepted formats in order. `None` means unparseable.
pub fn parse_fecha_dayfirst(cell: &Cell) -> Option<NaiveDate> {
    if let Some(date) = cell.as_date() {
        return Some(date);
    }
    match cell {
        Cell::Text(s) => {
            let trimmed = s.trim();
            FECHA_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
        }
        _ => None,
    }
}

/// Normalizes an appointment-code cell: blank markers become `None`, anything
/// else must parse as a (possibly fractional) number and is truncated to an
/// integer. A failed parse names the offending value so the error is directly
/// actionable.
pub fn normalize_cita(cell: &Cell) -> Result<Option<i32>> {
    match cell {
        Cell::Int(i) => i32::try_from(*i)
            .map(Some)
            .map_err(|_| cita_out_of_range(&i.to_string())),
        Cell::Float(f) => Ok(Some(truncate_cita(*f, &cell.to_string())?)),
        cell if is_cita_blank(cell) => Ok(None),
        Cell::Text(s) => {
            let trimmed = s.trim();
            match trimmed.parse::<f64>() {
                Ok(value) => Ok(Some(truncate_cita(value, trimmed)?)),
                Err(err) => Err(LoadError::InvalidCita {
                    value: trimmed.to_string(),
                    reason: err.to_string(),
                }),
            }
        }
        other => Err(LoadError::InvalidCita {
            value: other.to_string(),
            reason: "el valor no es numérico".to_string(),
        }),
    }
}

fn cita_out_of_range(value: &str) -> LoadError {
    LoadError::InvalidCita {
        value: value.to_string(),
        reason: "el valor excede el rango de un entero".to_string(),
    }
}

/// Truncates a fractional appointment code to an integer. `as` would wrap or
/// saturate out-of-range values into a wrong but storable code, so the range
/// is checked first and the offending value is named instead.
fn truncate_cita(value: f64, raw: &str) -> Result<i32> {
    let truncated = value.trunc();
    if truncated < i32::MIN as f64 || truncated > i32::MAX as f64 || truncated.is_nan() {
        return Err(cita_out_of_range(raw));
    }
    Ok(truncated as i32)
}

/// Seller identifiers are coerced to their string form unconditionally so a
/// numerically-typed source column cannot drift into a different storage
/// representation between uploads.
pub fn normalize_seller_id(cell: &Cell) -> String {
    cell.to_string()
}
