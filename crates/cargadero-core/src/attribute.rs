use once_cell::sync::Lazy;
use regex::Regex;
use sqlx::postgres::PgDatabaseError;

use crate::error::LoadError;

pub const UNIDENTIFIED_COLUMN: &str = "No identificada";
pub const UNKNOWN_VALUE: &str = "Desconocido";

/// Driver error strings tend to quote the rejected value as `value '<token>'`.
static VALUE_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"value '([^']+)'").expect("valid attribution regex"));

/// Keyword fallbacks for logistics uploads: substrings that implicate a
/// column when neither the rejected value nor a column name shows up in the
/// error text verbatim.
pub const LOGISTICS_KEYWORDS: [(&str, &str); 5] = [
    ("sellerid", "Seller_ID"),
    ("placa", "Placa"),
    ("fecha", "Fecha"),
    ("date", "Fecha"),
    ("cita", "Cita"),
];

pub const PERSONNEL_KEYWORDS: [(&str, &str); 9] = [
    ("pickup", "PICKUP"),
    ("tipo", "TIPO"),
    ("placa", "PLACA"),
    ("date", "PLACA"),
    ("nombre", "NOMBRES"),
    ("documento", "DOCUMENTO"),
    ("cargo", "CARGO"),
    ("empresa", "EMPRESA"),
    ("ruc", "RUC"),
];

/// The column/value pair a storage or normalization error is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    pub column: String,
    pub value: String,
}

/// Attributes a row-level insertion error to the most likely column.
///
/// When the store reports structured constraint metadata (Postgres includes
/// the column for NOT NULL and check violations), that wins outright. The
/// text heuristics below are the fallback for the many error classes where
/// the driver only hands back a message.
pub fn attribute_insert_error(
    err: &LoadError,
    known_columns: &[(String, String)],
    keyword_fallbacks: &[(&str, &str)],
) -> Attribution {
    if let LoadError::Sqlx(sqlx::Error::Database(db_err)) = err {
        if let Some(pg) = db_err.try_downcast_ref::<PgDatabaseError>() {
            if let Some(column) = pg.column() {
                if let Some((name, value)) = known_columns
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(column))
                {
                    return Attribution {
                        column: name.clone(),
                        value: value.clone(),
                    };
                }
            }
        }
    }

    attribute_from_message(&err.to_string(), known_columns, keyword_fallbacks)
}

/// Best-effort attribution over an opaque error string, in priority order:
/// exact rejected-value match, then column-name occurrence, then domain
/// keyword fallback, then "unidentified". False attributions are possible and
/// acceptable; this is a diagnostic aid, not a correctness mechanism.
pub fn attribute_from_message(
    message: &str,
    known_columns: &[(String, String)],
    keyword_fallbacks: &[(&str, &str)],
) -> Attribution {
    let token = VALUE_TOKEN_RE
        .captures(message)
        .map(|captures| captures[1].to_string());

    if let Some(token) = &token {
        for (name, value) in known_columns {
            if value == token {
                return Attribution {
                    column: name.clone(),
                    value: token.clone(),
                };
            }
        }
    }

    let lowered = message.to_lowercase();

    for (name, value) in known_columns {
        if lowered.contains(&name.to_lowercase()) {
            return Attribution {
                column: name.clone(),
                value: value.clone(),
            };
        }
    }

    for (needle, column) in keyword_fallbacks {
        if lowered.contains(needle) {
            let value = known_columns
                .iter()
                .find(|(name, _)| name == column)
                .map(|(_, value)| value.clone())
                .unwrap_or_else(|| UNKNOWN_VALUE.to_string());
            return Attribution {
                column: (*column).to_string(),
                value,
            };
        }
    }

    Attribution {
        column: UNIDENTIFIED_COLUMN.to_string(),
        value: token.unwrap_or_else(|| UNKNOWN_VALUE.to_string()),
    }
}
