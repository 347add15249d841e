use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;
use serde::Deserialize;

use crate::handlers::optional_date;
use crate::services::export::ExportFilter;
use crate::services::workflow::ExportResult;
use crate::utils::error::AppResult;
use crate::AppState;

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct ExportRequest {
    pub inicio: Option<String>,
    pub fim: Option<String>,
    #[serde(default = "default_true")]
    pub somente_conferidos: bool,
    #[serde(default)]
    pub incluir_exportados: bool,
}

/// POST /exportar: arquivo contábil + contagem de linhas ignoradas
pub async fn exportar(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExportRequest>,
) -> AppResult<Json<ExportResult>> {
    let filter = ExportFilter {
        inicio: optional_date("inicio", request.inicio.as_deref())?,
        fim: optional_date("fim", request.fim.as_deref())?,
        only_conferred: request.somente_conferidos,
        skip_exported: !request.incluir_exportados,
    };

    Ok(Json(state.dashboard.export(filter).await?))
}
