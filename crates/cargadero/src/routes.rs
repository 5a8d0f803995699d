use std::collections::HashMap;

use axum::extract::{Multipart, Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use cargadero_core::loader::{
    execute_load, LoadFailure, LogisticsReplace, PersonnelReplace, ReplaceStrategy,
};
use cargadero_core::normalize::prepare_logistics_sheet;
use cargadero_core::query::{self, Pagination};
use cargadero_core::records::BatchStamp;
use cargadero_core::validate::{scan_empty_cells, ValidationReport};
use cargadero_sheet::{parse_sheet, Sheet};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::state::AppState;

const VALIDATION_MESSAGE: &str = "El archivo contiene campos vacíos en las siguientes columnas:";
const SUCCESS_MESSAGE: &str = "Todos los registros fueron insertados correctamente.";

pub async fn health() -> &'static str {
    "API corriendo"
}

#[derive(Serialize)]
struct ValidationRejected {
    status: u8,
    message: &'static str,
    #[serde(flatten)]
    report: ValidationReport,
}

#[derive(Serialize)]
struct LoadRejected {
    status: u8,
    #[serde(flatten)]
    failure: LoadFailure,
}

fn reject(message: impl Into<String>) -> Response {
    Json(json!({ "status": 0, "message": message.into() })).into_response()
}

fn success() -> Response {
    Json(json!({ "status": 1, "message": SUCCESS_MESSAGE })).into_response()
}

fn query_error(err: anyhow::Error) -> Response {
    warn!("read query failed: {err:#}");
    Json(json!({ "status": 0, "error": err.to_string() })).into_response()
}

/// Everything a multipart upload form carries: the file bytes plus the
/// remaining text fields keyed by field name.
struct UploadForm {
    file: Vec<u8>,
    fields: HashMap<String, String>,
}

async fn collect_upload(mut multipart: Multipart) -> anyhow::Result<UploadForm> {
    let mut file = None;
    let mut fields = HashMap::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            file = Some(field.bytes().await?.to_vec());
        } else {
            fields.insert(name, field.text().await?);
        }
    }

    let file = file.ok_or_else(|| anyhow::anyhow!("falta el campo 'file'"))?;
    Ok(UploadForm { file, fields })
}

impl UploadForm {
    fn text(&self, key: &str) -> anyhow::Result<&str> {
        self.fields
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| anyhow::anyhow!("falta el campo '{key}'"))
    }

    fn date(&self, key: &str) -> anyhow::Result<NaiveDate> {
        let raw = self.text(key)?;
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| anyhow::anyhow!("el campo '{key}' no es una fecha válida: '{raw}'"))
    }

    fn time(&self, key: &str) -> anyhow::Result<NaiveTime> {
        let raw = self.text(key)?;
        NaiveTime::parse_from_str(raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
            .map_err(|_| anyhow::anyhow!("el campo '{key}' no es una hora válida: '{raw}'"))
    }

    fn stamp(&self) -> anyhow::Result<BatchStamp> {
        Ok(BatchStamp {
            fecha_carga: self.date("fecha_carga")?,
            hora_carga: self.time("hora_carga")?,
        })
    }
}

fn parse_upload_sheet(file: &[u8]) -> Result<Sheet, Response> {
    parse_sheet(file).map_err(|err| reject(format!("No se pudo leer el archivo: {err}")))
}

async fn run_load(state: &AppState, strategy: &dyn ReplaceStrategy, sheet: &Sheet) -> Response {
    match execute_load(&state.pool, strategy, sheet).await {
        Ok(()) => success(),
        Err(failure) => Json(LoadRejected { status: 0, failure }).into_response(),
    }
}

/// Logistics upload: reconcile/normalize the sheet, block on missing cells,
/// then run the truncate-and-replace load.
pub async fn upload_excel(State(state): State<AppState>, multipart: Multipart) -> Response {
    let form = match collect_upload(multipart).await {
        Ok(form) => form,
        Err(err) => return reject(format!("Formulario inválido: {err}")),
    };

    let (stamp, nombre_flujo) = match (form.stamp(), form.text("nombre_flujo")) {
        (Ok(stamp), Ok(flujo)) => (stamp, flujo.to_string()),
        (Err(err), _) | (_, Err(err)) => return reject(format!("Formulario inválido: {err}")),
    };

    let mut sheet = match parse_upload_sheet(&form.file) {
        Ok(sheet) => sheet,
        Err(response) => return response,
    };

    prepare_logistics_sheet(&mut sheet);

    let report = scan_empty_cells(&sheet);
    if !report.is_clean() {
        return Json(ValidationRejected {
            status: 0,
            message: VALIDATION_MESSAGE,
            report,
        })
        .into_response();
    }

    let strategy = LogisticsReplace {
        nombre_flujo,
        stamp,
    };
    run_load(&state, &strategy, &sheet).await
}

/// Personnel upload: no normalization beyond the completeness scan; the
/// destination's constraints do the checking, scoped to (flujo, ruc).
pub async fn personal_excel(State(state): State<AppState>, multipart: Multipart) -> Response {
    let form = match collect_upload(multipart).await {
        Ok(form) => form,
        Err(err) => return reject(format!("Formulario inválido: {err}")),
    };

    let parsed = form.stamp().and_then(|stamp| {
        Ok((
            stamp,
            form.text("flujo")?.to_string(),
            form.text("ruc")?.to_string(),
        ))
    });
    let (stamp, flujo, ruc) = match parsed {
        Ok(parts) => parts,
        Err(err) => return reject(format!("Formulario inválido: {err}")),
    };

    let sheet = match parse_upload_sheet(&form.file) {
        Ok(sheet) => sheet,
        Err(response) => return response,
    };

    let report = scan_empty_cells(&sheet);
    if !report.is_clean() {
        return Json(ValidationRejected {
            status: 0,
            message: VALIDATION_MESSAGE,
            report,
        })
        .into_response();
    }

    let strategy = PersonnelReplace { flujo, ruc, stamp };
    run_load(&state, &strategy, &sheet).await
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_page")]
    page: u32,
    #[serde(default = "default_size")]
    size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_size() -> u32 {
    10
}

impl From<PageParams> for Pagination {
    fn from(params: PageParams) -> Self {
        Pagination {
            page: params.page,
            size: params.size,
        }
    }
}

pub async fn datos_actualizados(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Response {
    match query::latest_logistics_page(&state.pool, params.into(), "/datos-actualizados").await {
        Ok(Some((fecha, page))) => {
            Json(json!({ "status": 1, "fecha": fecha, "datos": page })).into_response()
        }
        Ok(None) => Json(json!({ "status": 0, "message": "No hay datos disponibles" })).into_response(),
        Err(err) => query_error(err),
    }
}

/// Today's logistics rows; `flujos` may repeat (`?flujos=a&flujos=b`).
pub async fn datos(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let flujos: Vec<String> = params
        .into_iter()
        .filter(|(key, _)| key == "flujos")
        .map(|(_, value)| value)
        .collect();

    match query::logistics_by_flows(&state.pool, &flujos).await {
        Ok(records) if records.is_empty() => {
            Json(json!({ "status": 0, "message": "No hay datos" })).into_response()
        }
        Ok(records) => Json(json!({ "datos": records })).into_response(),
        Err(err) => query_error(err),
    }
}

pub async fn datos_por_id(State(state): State<AppState>, Path(id_carga): Path<i64>) -> Response {
    match query::logistics_by_id(&state.pool, id_carga).await {
        Ok(records) if records.is_empty() => {
            Json(json!({ "status": 0, "message": "No hay datos" })).into_response()
        }
        Ok(records) => Json(json!({ "status": 1, "datos": records })).into_response(),
        Err(err) => query_error(err),
    }
}

pub async fn datos_personal(State(state): State<AppState>, Path(flujo): Path<String>) -> Response {
    match query::personnel_by_flow(&state.pool, &flujo).await {
        Ok(records) if records.is_empty() => {
            Json(json!({ "status": 0, "message": "No hay datos" })).into_response()
        }
        Ok(records) => Json(json!({ "datos": records })).into_response(),
        Err(err) => query_error(err),
    }
}

pub async fn datos_personal_por_id(
    State(state): State<AppState>,
    Path((id_carga, ruc)): Path<(i64, String)>,
) -> Response {
    match query::personnel_by_id_and_ruc(&state.pool, id_carga, &ruc).await {
        Ok(records) if records.is_empty() => {
            Json(json!({ "status": 0, "message": "No hay datos" })).into_response()
        }
        Ok(records) => Json(json!({ "status": 1, "datos": records })).into_response(),
        Err(err) => query_error(err),
    }
}

pub async fn datos_personal_paginado(
    State(state): State<AppState>,
    Path(ruc): Path<String>,
    Query(params): Query<PageParams>,
) -> Response {
    let base_url = format!("/datos-actualizados-personal/{ruc}");
    match query::personnel_page_by_ruc(&state.pool, &ruc, params.into(), &base_url).await {
        Ok(Some(page)) if page.data.is_empty() => {
            Json(json!({ "status": 0, "message": "No hay datos" })).into_response()
        }
        Ok(Some(page)) => Json(json!({ "status": 1, "datos": page })).into_response(),
        Ok(None) => Json(json!({ "status": 0, "message": "No hay datos" })).into_response(),
        Err(err) => query_error(err),
    }
}
