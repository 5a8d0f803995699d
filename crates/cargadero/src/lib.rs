pub mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

pub use state::AppState;

/// Builds the HTTP router. Separated from `main` so integration tests can
/// drive the service in-process.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::health))
        .route("/upload_excel", post(routes::upload_excel))
        .route("/personal_excel", post(routes::personal_excel))
        .route("/datos-actualizados", get(routes::datos_actualizados))
        .route("/datos", get(routes::datos))
        .route("/datos_actualizados/{id_carga}", get(routes::datos_por_id))
        .route("/datosPersonal/{flujo}", get(routes::datos_personal))
        .route(
            "/datos_actualizados_personal/{id_carga}/{ruc}",
            get(routes::datos_personal_por_id),
        )
        .route(
            "/datos-actualizados-personal/{ruc}",
            get(routes::datos_personal_paginado),
        )
        // Spreadsheet uploads routinely exceed the default multipart cap.
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
