use std::env;

use anyhow::Result;
use cargadero_core::db::{self, DbPool};
use cargadero_core::loader::{execute_load, LogisticsReplace, PersonnelReplace};
use cargadero_core::normalize::prepare_logistics_sheet;
use cargadero_core::records::BatchStamp;
use cargadero_sheet::{parse_sheet, Sheet};
use chrono::{Local, NaiveTime};
use tokio::runtime::Runtime;

fn stamp() -> BatchStamp {
    BatchStamp {
        fecha_carga: Local::now().date_naive(),
        hora_carga: NaiveTime::from_hms_opt(8, 30, 0).expect("valid time"),
    }
}

fn logistics_sheet(csv: &str) -> Sheet {
    let mut sheet = parse_sheet(csv.as_bytes()).expect("parse logistics sheet");
    prepare_logistics_sheet(&mut sheet);
    sheet
}

async fn reset(pool: &DbPool) -> Result<()> {
    sqlx::query("TRUNCATE TABLE carga_logistica, carga_historial, carga_personal")
        .execute(pool)
        .await?;
    Ok(())
}

async fn count(pool: &DbPool, sql: &str) -> Result<i64> {
    Ok(sqlx::query_scalar(sql).fetch_one(pool).await?)
}

#[test]
fn loader_roundtrip() -> Result<()> {
    let database_url = match env::var("CARGADERO_TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping loader integration test because CARGADERO_TEST_DATABASE_URL is not set"
            );
            return Ok(());
        }
    };

    let rt = Runtime::new()?;
    rt.block_on(async move {
        let pool = db::connect(&database_url).await?;
        db::run_migrations(&pool).await?;
        reset(&pool).await?;

        // Initial logistics load commits and populates the historial.
        let sheet = logistics_sheet(
            "Fecha,Seller_ID,Seller,Placa,Flujo,Cita\n\
             01/08/2026,11,ACME,AAA-111,norte,5\n\
             01/08/2026,22,GLOBEX,BBB-222,sur,-\n",
        );
        let strategy = LogisticsReplace {
            nombre_flujo: "diario".to_string(),
            stamp: stamp(),
        };
        execute_load(&pool, &strategy, &sheet)
            .await
            .expect("first logistics load");

        assert_eq!(count(&pool, "SELECT COUNT(*) FROM carga_logistica").await?, 2);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM carga_historial").await?, 2);

        let cita: Option<i32> = sqlx::query_scalar(
            "SELECT cita FROM carga_logistica WHERE seller_id = '22'",
        )
        .fetch_one(&pool)
        .await?;
        assert_eq!(cita, None, "dash appointment must load as NULL");

        // Rerunning the same calendar day purges today's historial entries
        // first, so the audit copy does not double up.
        let rerun = logistics_sheet(
            "Fecha,Seller_ID,Seller,Placa,Flujo,Cita\n\
             02/08/2026,33,INITECH,CCC-333,norte,7\n",
        );
        execute_load(&pool, &strategy, &rerun)
            .await
            .expect("same-day rerun");
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM carga_logistica").await?, 1);
        assert_eq!(count(&pool, "SELECT COUNT(*) FROM carga_historial").await?, 1);

        // A failing row aborts the whole batch: the truncate and the rows
        // inserted before the failure all roll back, leaving the previous
        // committed batch in place.
        let failing = logistics_sheet(
            "Fecha,Seller_ID,Seller,Placa,Flujo,Cita\n\
             03/08/2026,44,HOOLI,DDD-444,norte,1\n\
             03/08/2026,55,UMBRELLA,PLACA-DEMASIADO-LARGA,norte,2\n",
        );
        let failure = execute_load(&pool, &strategy, &failing)
            .await
            .expect_err("oversized plate must abort the batch");
        assert_eq!(failure.errores.len(), 1);
        assert_eq!(failure.errores[0].fila, 3);
        assert!(!failure.detalle.is_empty());

        assert_eq!(
            count(&pool, "SELECT COUNT(*) FROM carga_logistica").await?,
            1,
            "previous batch must survive a rolled-back load"
        );
        let survivor: String =
            sqlx::query_scalar("SELECT seller_id FROM carga_logistica")
                .fetch_one(&pool)
                .await?;
        assert_eq!(survivor, "33");
        assert_eq!(
            count(&pool, "SELECT COUNT(*) FROM carga_historial").await?,
            1,
            "historial is never written for an aborted batch"
        );

        personnel_scope_isolation(&pool).await?;
        personnel_duplicate_attribution(&pool).await?;

        Ok(())
    })
}

async fn load_personnel(pool: &DbPool, flujo: &str, ruc: &str, csv: &str) -> Result<()> {
    let sheet = parse_sheet(csv.as_bytes()).expect("parse personnel sheet");
    let strategy = PersonnelReplace {
        flujo: flujo.to_string(),
        ruc: ruc.to_string(),
        stamp: stamp(),
    };
    execute_load(pool, &strategy, &sheet)
        .await
        .map_err(|failure| anyhow::anyhow!("personnel load failed: {}", failure.detalle))?;
    Ok(())
}

async fn personnel_scope_isolation(pool: &DbPool) -> Result<()> {
    let header = "PICKUP,TIPO,PLACA,NOMBRES,DOCUMENTO,CARGO,EMPRESA,RUC\n";

    load_personnel(
        pool,
        "A",
        "20100000001",
        &format!("{header}P1,CAMION,AAA-111,ANA,00000001,CHOFER,ACME,20100000001\n"),
    )
    .await?;
    load_personnel(
        pool,
        "A",
        "20100000002",
        &format!("{header}P2,CAMION,BBB-222,BETO,00000002,CHOFER,GLOBEX,20100000002\n"),
    )
    .await?;
    load_personnel(
        pool,
        "B",
        "20100000001",
        &format!("{header}P3,AUTO,CCC-333,CARLA,00000003,GUIA,ACME,20100000001\n"),
    )
    .await?;

    // Reloading (A, 20100000001) must leave (A, 20100000002) and
    // (B, 20100000001) untouched.
    load_personnel(
        pool,
        "A",
        "20100000001",
        &format!(
            "{header}P4,CAMION,DDD-444,DARIO,00000004,CHOFER,ACME,20100000001\n\
             P5,CAMION,EEE-555,ELSA,00000005,CHOFER,ACME,20100000001\n"
        ),
    )
    .await?;

    let in_scope: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM carga_personal WHERE flujo = 'A' AND ruc = '20100000001'",
    )
    .fetch_one(pool)
    .await?;
    assert_eq!(in_scope, 2, "scope was replaced by the new batch");

    let sibling_ruc: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM carga_personal WHERE flujo = 'A' AND ruc = '20100000002'",
    )
    .fetch_one(pool)
    .await?;
    assert_eq!(sibling_ruc, 1);

    let sibling_flow: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM carga_personal WHERE flujo = 'B' AND ruc = '20100000001'",
    )
    .fetch_one(pool)
    .await?;
    assert_eq!(sibling_flow, 1);

    Ok(())
}

async fn personnel_duplicate_attribution(pool: &DbPool) -> Result<()> {
    let csv = "PICKUP,TIPO,PLACA,NOMBRES,DOCUMENTO,CARGO,EMPRESA,RUC\n\
               P6,CAMION,FFF-666,FELIX,00000006,CHOFER,ACME,20100000009\n\
               P7,CAMION,GGG-777,GINA,00000006,CHOFER,ACME,20100000009\n";
    let sheet = parse_sheet(csv.as_bytes()).expect("parse personnel sheet");
    let strategy = PersonnelReplace {
        flujo: "A".to_string(),
        ruc: "20100000009".to_string(),
        stamp: stamp(),
    };

    let failure = execute_load(pool, &strategy, &sheet)
        .await
        .expect_err("duplicate documento must abort the batch");

    assert_eq!(failure.errores.len(), 1);
    let record = &failure.errores[0];
    assert_eq!(record.fila, 3);
    assert_eq!(record.columna_problematica, "DOCUMENTO");
    assert_eq!(record.valor_problematico, "00000006");

    let committed: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM carga_personal WHERE ruc = '20100000009'",
    )
    .fetch_one(pool)
    .await?;
    assert_eq!(committed, 0, "no row of the aborted batch may persist");

    Ok(())
}
