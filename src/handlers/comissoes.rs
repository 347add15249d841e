use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Json;
use serde::Deserialize;

use crate::handlers::optional_date;
use crate::services::workflow::CommissionReport;
use crate::utils::error::AppResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub inicio: Option<String>,
    pub fim: Option<String>,
}

pub async fn get_comissoes(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PeriodQuery>,
) -> AppResult<Json<CommissionReport>> {
    let inicio = optional_date("inicio", query.inicio.as_deref())?;
    let fim = optional_date("fim", query.fim.as_deref())?;

    Ok(Json(state.dashboard.commissions(inicio, fim).await?))
}
