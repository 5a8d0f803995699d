use anyhow::Result;
use chrono::{Local, NaiveDate, NaiveTime};
use serde::Serialize;

use crate::db::DbPool;

/// A committed logistics row as served by the read endpoints.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct LogisticsRecord {
    pub id_carga: i64,
    pub fecha: NaiveDate,
    pub seller_id: String,
    pub seller: String,
    pub placa: String,
    pub flujo: String,
    pub cita: Option<i32>,
    pub nombre_flujo: String,
    pub fecha_carga: NaiveDate,
    pub hora_carga: NaiveTime,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct PersonnelRecord {
    pub id_carga: i64,
    pub pickup: String,
    pub tipo: String,
    pub placa: String,
    pub nombre: String,
    pub documento: String,
    pub cargo: String,
    pub empresa: String,
    pub ruc: String,
    pub fecha_carga: NaiveDate,
    pub hora_carga: NaiveTime,
    pub flujo: String,
}

/// 1-based page request. Offsets are plain window arithmetic; `size` is
/// clamped to at least one row so a zero-size request cannot divide by zero.
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub page: u32,
    pub size: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, size: 10 }
    }
}

impl Pagination {
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            size: self.size.max(1),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.size as i64
    }

    pub fn total_pages(&self, total: i64) -> u32 {
        ((total + self.size as i64 - 1) / self.size as i64) as u32
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PageLink {
    pub url: Option<String>,
    pub label: String,
    pub active: bool,
}

/// One page of results plus the link metadata the frontends paginate with.
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub current_page: u32,
    pub per_page: u32,
    pub total: i64,
    pub links: Vec<PageLink>,
}

/// Builds the link list: a previous marker, one numbered entry per page with
/// exactly the requested page active, and a next marker. Boundary markers are
/// inert (`url: null`). Length is always `total_pages + 2`.
pub fn build_links(base_url: &str, pagination: Pagination, total_pages: u32) -> Vec<PageLink> {
    let Pagination { page, size } = pagination;
    let mut links = Vec::with_capacity(total_pages as usize + 2);

    links.push(PageLink {
        url: (page > 1).then(|| format!("{base_url}?page={}&size={size}", page - 1)),
        label: "«".to_string(),
        active: false,
    });

    for number in 1..=total_pages {
        links.push(PageLink {
            url: Some(format!("{base_url}?page={number}&size={size}")),
            label: number.to_string(),
            active: number == page,
        });
    }

    links.push(PageLink {
        url: (page < total_pages).then(|| format!("{base_url}?page={}&size={size}", page + 1)),
        label: "»".to_string(),
        active: false,
    });

    links
}

fn page_of<T>(data: Vec<T>, pagination: Pagination, total: i64, base_url: &str) -> Page<T> {
    let links = build_links(base_url, pagination, pagination.total_pages(total));
    Page {
        data,
        current_page: pagination.page,
        per_page: pagination.size,
        total,
        links,
    }
}

/// Paginated window over the most recent logistics load. Returns the load
/// date alongside the page, or `None` when the destination is empty.
pub async fn latest_logistics_page(
    pool: &DbPool,
    pagination: Pagination,
    base_url: &str,
) -> Result<Option<(NaiveDate, Page<LogisticsRecord>)>> {
    let pagination = pagination.normalized();

    let fecha: Option<NaiveDate> =
        sqlx::query_scalar("SELECT fecha_carga FROM carga_logistica ORDER BY fecha_carga DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;
    let Some(fecha) = fecha else {
        return Ok(None);
    };

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM carga_logistica WHERE fecha_carga = $1")
        .bind(fecha)
        .fetch_one(pool)
        .await?;

    let data = sqlx::query_as::<_, LogisticsRecord>(
        r#"
            SELECT id_carga, fecha, seller_id, seller, placa, flujo, cita,
                   nombre_flujo, fecha_carga, hora_carga
            FROM carga_logistica
            WHERE fecha_carga = $1
            ORDER BY id_carga
            OFFSET $2 LIMIT $3
        "#,
    )
    .bind(fecha)
    .bind(pagination.offset())
    .bind(pagination.size as i64)
    .fetch_all(pool)
    .await?;

    Ok(Some((fecha, page_of(data, pagination, total, base_url))))
}

/// Today's logistics rows, optionally filtered by a list of flow names.
pub async fn logistics_by_flows(pool: &DbPool, flows: &[String]) -> Result<Vec<LogisticsRecord>> {
    let hoy = Local::now().date_naive();
    let records = if flows.is_empty() {
        sqlx::query_as::<_, LogisticsRecord>(
            r#"
                SELECT id_carga, fecha, seller_id, seller, placa, flujo, cita,
                       nombre_flujo, fecha_carga, hora_carga
                FROM carga_logistica
                WHERE fecha_carga = $1
                ORDER BY id_carga
            "#,
        )
        .bind(hoy)
        .fetch_all(pool)
        .await?
    } else {
        sqlx::query_as::<_, LogisticsRecord>(
            r#"
                SELECT id_carga, fecha, seller_id, seller, placa, flujo, cita,
                       nombre_flujo, fecha_carga, hora_carga
                FROM carga_logistica
                WHERE fecha_carga = $1 AND flujo = ANY($2)
                ORDER BY id_carga
            "#,
        )
        .bind(hoy)
        .bind(flows)
        .fetch_all(pool)
        .await?
    };
    Ok(records)
}

/// Today's logistics rows for one load identifier.
pub async fn logistics_by_id(pool: &DbPool, id_carga: i64) -> Result<Vec<LogisticsRecord>> {
    let hoy = Local::now().date_naive();
    let records = sqlx::query_as::<_, LogisticsRecord>(
        r#"
            SELECT id_carga, fecha, seller_id, seller, placa, flujo, cita,
                   nombre_flujo, fecha_carga, hora_carga
            FROM carga_logistica
            WHERE fecha_carga = $1 AND id_carga = $2
        "#,
    )
    .bind(hoy)
    .bind(id_carga)
    .fetch_all(pool)
    .await?;
    Ok(records)
}

/// Today's personnel rows for one flow.
pub async fn personnel_by_flow(pool: &DbPool, flujo: &str) -> Result<Vec<PersonnelRecord>> {
    let hoy = Local::now().date_naive();
    let records = sqlx::query_as::<_, PersonnelRecord>(
        r#"
            SELECT id_carga, pickup, tipo, placa, nombre, documento, cargo,
                   empresa, ruc, fecha_carga, hora_carga, flujo
            FROM carga_personal
            WHERE fecha_carga = $1 AND flujo = $2
        "#,
    )
    .bind(hoy)
    .bind(flujo)
    .fetch_all(pool)
    .await?;
    Ok(records)
}

/// Personnel rows for one (load identifier, RUC) pair.
pub async fn personnel_by_id_and_ruc(
    pool: &DbPool,
    id_carga: i64,
    ruc: &str,
) -> Result<Vec<PersonnelRecord>> {
    let records = sqlx::query_as::<_, PersonnelRecord>(
        r#"
            SELECT id_carga, pickup, tipo, placa, nombre, documento, cargo,
                   empresa, ruc, fecha_carga, hora_carga, flujo
            FROM carga_personal
            WHERE id_carga = $1 AND ruc = $2
        "#,
    )
    .bind(id_carga)
    .bind(ruc)
    .fetch_all(pool)
    .await?;
    Ok(records)
}

/// Paginated personnel window for one RUC. Defaults to today's load; when
/// nothing was uploaded today, falls back to the most recent load date for
/// that RUC so the frontend always shows the freshest committed batch.
pub async fn personnel_page_by_ruc(
    pool: &DbPool,
    ruc: &str,
    pagination: Pagination,
    base_url: &str,
) -> Result<Option<Page<PersonnelRecord>>> {
    let pagination = pagination.normalized();
    let hoy = Local::now().date_naive();

    let today_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM carga_personal WHERE fecha_carga = $1 AND ruc = $2")
            .bind(hoy)
            .bind(ruc)
            .fetch_one(pool)
            .await?;

    let fecha = if today_count > 0 {
        hoy
    } else {
        let ultima: Option<NaiveDate> =
            sqlx::query_scalar("SELECT MAX(fecha_carga) FROM carga_personal WHERE ruc = $1")
                .bind(ruc)
                .fetch_one(pool)
                .await?;
        match ultima {
            Some(fecha) => fecha,
            None => return Ok(None),
        }
    };

    let total: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM carga_personal WHERE fecha_carga = $1 AND ruc = $2")
            .bind(fecha)
            .bind(ruc)
            .fetch_one(pool)
            .await?;

    let data = sqlx::query_as::<_, PersonnelRecord>(
        r#"
            SELECT id_carga, pickup, tipo, placa, nombre, documento, cargo,
                   empresa, ruc, fecha_carga, hora_carga, flujo
            FROM carga_personal
            WHERE fecha_carga = $1 AND ruc = $2
            ORDER BY id_carga
            OFFSET $3 LIMIT $4
        "#,
    )
    .bind(fecha)
    .bind(ruc)
    .bind(pagination.offset())
    .bind(pagination.size as i64)
    .fetch_all(pool)
    .await?;

    Ok(Some(page_of(data, pagination, total, base_url)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_is_window_arithmetic() {
        let p = Pagination { page: 1, size: 10 };
        assert_eq!(p.offset(), 0);
        let p = Pagination { page: 3, size: 25 };
        assert_eq!(p.offset(), 50);
    }

    #[test]
    fn total_pages_rounds_up() {
        let p = Pagination { page: 1, size: 10 };
        assert_eq!(p.total_pages(0), 0);
        assert_eq!(p.total_pages(1), 1);
        assert_eq!(p.total_pages(10), 1);
        assert_eq!(p.total_pages(11), 2);
        assert_eq!(p.total_pages(95), 10);
    }

    #[test]
    fn link_list_has_total_pages_plus_two_entries() {
        let p = Pagination { page: 2, size: 10 };
        let links = build_links("/datos-actualizados", p, 4);
        assert_eq!(links.len(), 6);
        assert_eq!(links.iter().filter(|l| l.active).count(), 1);
        let active = links.iter().find(|l| l.active).unwrap();
        assert_eq!(active.label, "2");
    }

    #[test]
    fn boundary_markers_are_inert() {
        let first = build_links("/x", Pagination { page: 1, size: 5 }, 3);
        assert_eq!(first.first().unwrap().url, None);
        assert_eq!(
            first.last().unwrap().url.as_deref(),
            Some("/x?page=2&size=5")
        );

        let last = build_links("/x", Pagination { page: 3, size: 5 }, 3);
        assert_eq!(
            last.first().unwrap().url.as_deref(),
            Some("/x?page=2&size=5")
        );
        assert_eq!(last.last().unwrap().url, None);
    }

    #[test]
    fn normalized_clamps_degenerate_requests() {
        let p = Pagination { page: 0, size: 0 }.normalized();
        assert_eq!(p.page, 1);
        assert_eq!(p.size, 1);
    }
}
