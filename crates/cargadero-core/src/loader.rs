use async_trait::async_trait;
use cargadero_sheet::{Row, Sheet};
use chrono::Local;
use serde::Serialize;
use sqlx::{PgConnection, Postgres, Transaction};
use tracing::{error, info, warn};

use crate::attribute::{attribute_insert_error, LOGISTICS_KEYWORDS, PERSONNEL_KEYWORDS};
use crate::db::DbPool;
use crate::error::{LoadError, Result};
use crate::normalize::{normalize_cita, normalize_seller_id, parse_fecha_dayfirst};
use crate::records::{BatchStamp, RowError, LOGISTICS_COLUMNS, PERSONNEL_COLUMNS};

/// Terminal outcome of a batch that did not commit. `errores` carries the
/// per-row diagnostics collected before the abort; since the load is
/// fail-fast, that is the single row that triggered it.
#[derive(Debug, Serialize)]
pub struct LoadFailure {
    pub message: String,
    pub errores: Vec<RowError>,
    pub detalle: String,
    pub trace: String,
}

impl LoadFailure {
    fn general(err: &LoadError) -> Self {
        Self {
            message: "Ocurrió un error y no se insertó nada.".to_string(),
            errores: Vec::new(),
            detalle: err.to_string(),
            trace: format!("{err:?}"),
        }
    }

    fn row(record: RowError, err: &LoadError) -> Self {
        Self {
            message: "Ocurrió un error y no se insertó nada.".to_string(),
            errores: vec![record],
            detalle: err.to_string(),
            trace: format!("{err:?}"),
        }
    }
}

/// One destination shape's replace semantics: how to clear the scope ahead of
/// the load, how to insert a single row, and what to do just before commit.
/// The orchestration in [`execute_load`] is shared; only the scope key and
/// the row mapping differ between the two shapes.
#[async_trait]
pub trait ReplaceStrategy: Send + Sync {
    /// Human-readable scope for logs.
    fn scope(&self) -> String;

    /// Columns the attributor may implicate, paired with this row's values.
    fn attribution_columns(&self, sheet: &Sheet, row: &Row) -> Vec<(String, String)>;

    fn keyword_fallbacks(&self) -> &'static [(&'static str, &'static str)];

    /// Deletes whatever previous data this load replaces.
    async fn clear_scope(&self, conn: &mut PgConnection) -> Result<()>;

    /// Normalizes and inserts one row.
    async fn insert_row(&self, conn: &mut PgConnection, sheet: &Sheet, row: &Row) -> Result<()>;

    /// Runs after every row inserted, before commit.
    async fn finalize(&self, conn: &mut PgConnection) -> Result<()> {
        Ok(())
    }
}

/// Drives a batch through the replace state machine: clear scope, insert rows
/// in sheet order, finalize, commit. The first row failure is attributed,
/// recorded, and aborts the whole batch; the transaction rolls back so the
/// destination never exposes a partial load. The connection returns to the
/// pool on every exit path.
pub async fn execute_load(
    pool: &DbPool,
    strategy: &dyn ReplaceStrategy,
    sheet: &Sheet,
) -> std::result::Result<(), LoadFailure> {
    let mut tx: Transaction<'_, Postgres> = pool.begin().await.map_err(|err| {
        let err = LoadError::from(err);
        error!(scope = %strategy.scope(), "could not open load transaction: {err}");
        let mut failure = LoadFailure::general(&err);
        failure.message = "No se pudo conectar a la base de datos.".to_string();
        failure
    })?;

    if let Err(err) = strategy.clear_scope(&mut tx).await {
        error!(scope = %strategy.scope(), "scope clear failed: {err}");
        rollback(tx).await;
        return Err(LoadFailure::general(&err));
    }

    for row in sheet.rows() {
        if let Err(err) = strategy.insert_row(&mut tx, sheet, row).await {
            let known = strategy.attribution_columns(sheet, row);
            let attribution = attribute_insert_error(&err, &known, strategy.keyword_fallbacks());
            let record = RowError {
                fila: row.sheet_row_number(),
                detalle: err.to_string(),
                fila_contenido: sheet.row_values(row),
                columna_problematica: attribution.column,
                valor_problematico: attribution.value,
            };
            error!(
                scope = %strategy.scope(),
                fila = record.fila,
                columna = %record.columna_problematica,
                "row insert failed: {err}"
            );
            rollback(tx).await;
            return Err(LoadFailure::row(record, &err));
        }
    }

    if let Err(err) = strategy.finalize(&mut tx).await {
        error!(scope = %strategy.scope(), "finalize failed: {err}");
        rollback(tx).await;
        return Err(LoadFailure::general(&err));
    }

    if let Err(err) = tx.commit().await {
        let err = LoadError::from(err);
        error!(scope = %strategy.scope(), "commit failed: {err}");
        return Err(LoadFailure::general(&err));
    }

    info!(scope = %strategy.scope(), rows = sheet.rows().len(), "batch committed");
    Ok(())
}

async fn rollback(tx: Transaction<'_, Postgres>) {
    if let Err(err) = tx.rollback().await {
        warn!("rollback failed: {err}");
    }
}

/// Full-replace semantics for logistics batches: exactly one "current" batch
/// exists at a time. Today's historial entries are purged first so a rerun of
/// the same calendar day stays idempotent, then the destination is truncated
/// outright. On success the freshly loaded rows are select-copied into the
/// historial before commit, so the historial only ever reflects committed
/// batches.
pub struct LogisticsReplace {
    pub nombre_flujo: String,
    pub stamp: BatchStamp,
}

#[async_trait]
impl ReplaceStrategy for LogisticsReplace {
    fn scope(&self) -> String {
        format!("logistica/{}", self.nombre_flujo)
    }

    fn attribution_columns(&self, sheet: &Sheet, row: &Row) -> Vec<(String, String)> {
        known_columns(sheet, row, &LOGISTICS_COLUMNS)
    }

    fn keyword_fallbacks(&self) -> &'static [(&'static str, &'static str)] {
        &LOGISTICS_KEYWORDS
    }

    async fn clear_scope(&self, conn: &mut PgConnection) -> Result<()> {
        let hoy = Local::now().date_naive();
        sqlx::query("DELETE FROM carga_historial WHERE fecha_backup::date = $1")
            .bind(hoy)
            .execute(&mut *conn)
            .await?;
        sqlx::query("TRUNCATE TABLE carga_logistica")
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn insert_row(&self, conn: &mut PgConnection, sheet: &Sheet, row: &Row) -> Result<()> {
        let fecha = sheet
            .cell(row, "Fecha")
            .and_then(parse_fecha_dayfirst)
            .ok_or(LoadError::EmptyDate)?;

        let cita = match sheet.cell(row, "Cita") {
            Some(cell) => normalize_cita(cell)?,
            None => None,
        };

        let seller_id = sheet
            .cell(row, "Seller_ID")
            .map(normalize_seller_id)
            .ok_or_else(|| LoadError::MissingColumn {
                name: "Seller_ID".to_string(),
            })?;

        let seller = text_cell(sheet, row, "Seller")?;
        let placa = text_cell(sheet, row, "Placa")?;
        let flujo = text_cell(sheet, row, "Flujo")?;

        sqlx::query(
            r#"
                INSERT INTO carga_logistica
                    (fecha, seller_id, seller, placa, flujo, cita, nombre_flujo, fecha_carga, hora_carga)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(fecha)
        .bind(&seller_id)
        .bind(&seller)
        .bind(&placa)
        .bind(&flujo)
        .bind(cita)
        .bind(&self.nombre_flujo)
        .bind(self.stamp.fecha_carga)
        .bind(self.stamp.hora_carga)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn finalize(&self, conn: &mut PgConnection) -> Result<()> {
        sqlx::query(
            r#"
                INSERT INTO carga_historial
                    (fecha, seller_id, seller, placa, flujo, cita, nombre_flujo, fecha_carga, hora_carga, id_carga)
                SELECT fecha, seller_id, seller, placa, flujo, cita, nombre_flujo, fecha_carga, hora_carga, id_carga
                FROM carga_logistica
            "#,
        )
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}

/// Scoped-replace semantics for personnel batches: only rows matching the
/// exact (flujo, RUC) pair are deleted before the load; every other scope's
/// rows are untouched. Values are inserted as read, with the destination's
/// own constraints doing the checking.
pub struct PersonnelReplace {
    pub flujo: String,
    pub ruc: String,
    pub stamp: BatchStamp,
}

#[async_trait]
impl ReplaceStrategy for PersonnelReplace {
    fn scope(&self) -> String {
        format!("personal/{}/{}", self.flujo, self.ruc)
    }

    fn attribution_columns(&self, sheet: &Sheet, row: &Row) -> Vec<(String, String)> {
        known_columns(sheet, row, &PERSONNEL_COLUMNS)
    }

    fn keyword_fallbacks(&self) -> &'static [(&'static str, &'static str)] {
        &PERSONNEL_KEYWORDS
    }

    async fn clear_scope(&self, conn: &mut PgConnection) -> Result<()> {
        sqlx::query("DELETE FROM carga_personal WHERE flujo = $1 AND ruc = $2")
            .bind(&self.flujo)
            .bind(&self.ruc)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    async fn insert_row(&self, conn: &mut PgConnection, sheet: &Sheet, row: &Row) -> Result<()> {
        let mut values = Vec::with_capacity(PERSONNEL_COLUMNS.len());
        for column in PERSONNEL_COLUMNS {
            values.push(text_cell(sheet, row, column)?);
        }

        sqlx::query(
            r#"
                INSERT INTO carga_personal
                    (pickup, tipo, placa, nombre, documento, cargo, empresa, ruc, fecha_carga, hora_carga, flujo)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(&values[0])
        .bind(&values[1])
        .bind(&values[2])
        .bind(&values[3])
        .bind(&values[4])
        .bind(&values[5])
        .bind(&values[6])
        .bind(&values[7])
        .bind(self.stamp.fecha_carga)
        .bind(self.stamp.hora_carga)
        .bind(&self.flujo)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }
}

fn known_columns(sheet: &Sheet, row: &Row, columns: &[&str]) -> Vec<(String, String)> {
    columns
        .iter()
        .filter_map(|name| {
            sheet
                .cell(row, name)
                .map(|cell| ((*name).to_string(), cell.to_string()))
        })
        .collect()
}

fn text_cell(sheet: &Sheet, row: &Row, column: &str) -> Result<String> {
    sheet
        .cell(row, column)
        .map(|cell| cell.to_string())
        .ok_or_else(|| LoadError::MissingColumn {
            name: column.to_string(),
        })
}
