// Handlers HTTP das páginas do dashboard
pub mod atendimentos;
pub mod clientes;
pub mod comissoes;
pub mod exportacao;
pub mod health;

pub use atendimentos::*;
pub use clientes::*;
pub use comissoes::*;
pub use exportacao::*;
pub use health::*;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use chrono::NaiveDate;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::utils::error::{AppError, AppResult};
use crate::utils::logging::log_validation_error;
use crate::utils::normalization::parse_date;
use crate::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/atendimentos",
            get(get_day_view).post(create_atendimento).patch(update_atendimento),
        )
        .route("/atendimentos/conferir", post(conferir_atendimentos))
        .route("/comissoes", get(get_comissoes))
        .route("/exportar", post(exportar))
        .route("/clientes", get(list_clientes).post(save_cliente))
        .route("/cache/invalidar", post(invalidate_cache))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Data opcional vinda de query string ou corpo, no formato da planilha
pub(crate) fn optional_date(field: &str, raw: Option<&str>) -> AppResult<Option<NaiveDate>> {
    match raw.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(None),
        Some(raw) => parse_date(raw).map(Some).ok_or_else(|| {
            log_validation_error(field, raw);
            AppError::ValidationError(format!("{}: invalid date '{}'", field, raw))
        }),
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use planilhas::{MemoryTable, TableRef};
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::services::{DashboardService, SheetNames, TableCache};
    use crate::AppState;

    pub fn sheets() -> SheetNames {
        SheetNames {
            atendimentos: TableRef::new("salao", "Atendimentos"),
            clientes: TableRef::new("salao", "Clientes"),
        }
    }

    fn values(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|r| r.iter().map(|c| c.to_string()).collect())
            .collect()
    }

    pub fn store() -> Arc<MemoryTable> {
        let names = sheets();
        Arc::new(
            MemoryTable::new()
                .with_sheet(
                    names.atendimentos,
                    values(&[
                        &["Cliente", "Data", "Serviço", "Profissional", "Valor", "Conferido", "Exportado"],
                        &["Ana Silva", "01/05/2024", "Escova", "Júlia", "80,00", "não", ""],
                        &["ana   silva", "01/05/2024", "Escova", "Júlia", "80,00", "não", ""],
                        &["Bia", "01/05/2024", "Corte", "Rita", "50", "sim", ""],
                    ]),
                )
                .with_sheet(names.clientes, values(&[&["Nome", "Telefone"], &["Ana Silva", "11 98888-7777"]])),
        )
    }

    pub fn router(store: Arc<MemoryTable>) -> Router {
        let dashboard = DashboardService::new(store, TableCache::new(60), sheets());
        super::build_router(Arc::new(AppState::new(dashboard)))
    }

    pub async fn send(router: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = router.oneshot(request.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}
