use chrono::{NaiveDate, NaiveTime};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Spreadsheet columns the logistics attribution heuristics know about.
pub const LOGISTICS_COLUMNS: [&str; 6] = ["Seller_ID", "Seller", "Placa", "Flujo", "Cita", "Fecha"];

/// Spreadsheet columns of a personnel upload, in insertion order.
pub const PERSONNEL_COLUMNS: [&str; 8] = [
    "PICKUP",
    "TIPO",
    "PLACA",
    "NOMBRES",
    "DOCUMENTO",
    "CARGO",
    "EMPRESA",
    "RUC",
];

/// Load metadata common to every row of one upload: the load date/time the
/// operator declared in the request form.
#[derive(Debug, Clone, Copy)]
pub struct BatchStamp {
    pub fecha_carga: NaiveDate,
    pub hora_carga: NaiveTime,
}

/// Diagnostic produced when a row fails at insertion time. Field names are
/// the wire contract consumed by the upload frontends. `fila_contenido` keeps
/// spreadsheet column order so the diagnostic reads like the sheet.
#[derive(Debug, Clone, Serialize)]
pub struct RowError {
    pub fila: usize,
    pub detalle: String,
    #[serde(serialize_with = "ordered_map")]
    pub fila_contenido: Vec<(String, String)>,
    pub columna_problematica: String,
    pub valor_problematico: String,
}

fn ordered_map<S>(pairs: &[(String, String)], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    let mut map = serializer.serialize_map(Some(pairs.len()))?;
    for (key, value) in pairs {
        map.serialize_entry(key, value)?;
    }
    map.end()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_error_keeps_sheet_column_order_on_the_wire() {
        let record = RowError {
            fila: 3,
            detalle: "detalle".to_string(),
            fila_contenido: vec![
                ("Fecha".to_string(), "01/08/2026".to_string()),
                ("Seller_ID".to_string(), "11".to_string()),
                ("Cita".to_string(), "5".to_string()),
            ],
            columna_problematica: "Cita".to_string(),
            valor_problematico: "5".to_string(),
        };

        let json = serde_json::to_string(&record).expect("serialize");
        let fecha = json.find("\"Fecha\"").expect("Fecha key");
        let seller = json.find("\"Seller_ID\"").expect("Seller_ID key");
        let cita = json.find("\"Cita\"").expect("Cita key");
        assert!(fecha < seller && seller < cita, "out of order: {json}");
    }
}
