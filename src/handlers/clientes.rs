use std::sync::Arc;

use axum::extract::State;
use axum::response::Json;

use crate::services::dashboard::ClienteView;
use crate::services::workflow::{ClientSaved, NewClient};
use crate::utils::error::AppResult;
use crate::AppState;

pub async fn list_clientes(State(state): State<Arc<AppState>>) -> AppResult<Json<Vec<ClienteView>>> {
    Ok(Json(state.dashboard.clients().await?))
}

/// POST /clientes; `foto` opcional em base64, falha de upload não impede o cadastro
pub async fn save_cliente(
    State(state): State<Arc<AppState>>,
    Json(client): Json<NewClient>,
) -> AppResult<Json<ClientSaved>> {
    Ok(Json(state.dashboard.save_client(client).await?))
}
